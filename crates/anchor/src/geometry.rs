//! Affine transforms in the six-value PDF convention and small sizing helpers.
//!
//! A [`Matrix`] `[a, b, c, d, e, f]` maps `(x, y)` to
//! `(a*x + c*y + e, b*x + d*y + f)`. Nothing here guards against NaN or
//! infinite values; malformed inputs propagate silently.

use serde::{Deserialize, Serialize};

/// A 2x3 affine transform: `[a, b, c, d, e, f]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix(pub [f64; 6]);

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Self = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Matrix([a, b, c, d, e, f])
    }

    /// A pure translation by `(tx, ty)`.
    pub fn translation(tx: f64, ty: f64) -> Self {
        Matrix([1.0, 0.0, 0.0, 1.0, tx, ty])
    }

    /// Build a matrix from the first six values of a slice.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        let v: [f64; 6] = values.get(..6)?.try_into().ok()?;
        Some(Matrix(v))
    }

    /// Compose `self` with `other`: the result applies `self` first, then
    /// `other`.
    ///
    /// Composing a text matrix with the CTM (`tm.compose(&cm)`) yields the
    /// text-space to user-space transform.
    pub fn compose(&self, other: &Matrix) -> Matrix {
        let m = &self.0;
        let n = &other.0;
        Matrix([
            m[0] * n[0] + m[1] * n[2],
            m[0] * n[1] + m[1] * n[3],
            m[2] * n[0] + m[3] * n[2],
            m[2] * n[1] + m[3] * n[3],
            m[4] * n[0] + m[5] * n[2] + n[4],
            m[4] * n[1] + m[5] * n[3] + n[5],
        ])
    }

    /// Map a point through the transform.
    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        let m = &self.0;
        (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
    }

    /// Horizontal translation component (`e`).
    pub fn e(&self) -> f64 {
        self.0[4]
    }

    /// Vertical translation component (`f`).
    pub fn f(&self) -> f64 {
        self.0[5]
    }
}

/// Aspect-preserving size whose longest side is at most `max_size`.
///
/// Sizes already within the limit come back unchanged. The shorter side is
/// rounded to the nearest pixel and never drops below one.
pub fn fit_within(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    if width <= max_size && height <= max_size {
        return (width, height);
    }

    if width >= height {
        let scaled = (height as f64 * max_size as f64 / width as f64).round() as u32;
        (max_size, scaled.max(1))
    } else {
        let scaled = (width as f64 * max_size as f64 / height as f64).round() as u32;
        (scaled.max(1), max_size)
    }
}
