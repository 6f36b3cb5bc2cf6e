use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use parser::backend::{LopdfBackend, PdfBackend};

pub mod extract;
pub mod geometry;
pub mod images;
pub mod linearize;
pub mod merge;
pub mod parser;
pub mod prompt;
pub mod sanitize;
pub mod types;

pub use types::*;

#[derive(Debug, Error)]
pub enum AnchorError {
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("Document is encrypted")]
    Encrypted,
    #[error("Page not found: {0} (pages are 1-indexed)")]
    PageNotFound(u32),
    #[error("Malformed `{operator}` operator: {message}")]
    MalformedOperator { operator: String, message: String },
    #[error("Failed to extract page {page}: {source}")]
    Extraction {
        page: u32,
        #[source]
        source: Box<AnchorError>,
    },
    #[error("Image error: {0}")]
    Image(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Knobs for turning a page into anchor text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorOptions {
    /// Character budget for the linearized output.
    pub target_length: usize,
    /// Distance, in points, under which image placements are merged.
    pub tolerance: f64,
    /// Seed for the over-budget fill. `None` uses the thread RNG.
    pub seed: Option<u64>,
}

impl Default for AnchorOptions {
    fn default() -> Self {
        Self {
            target_length: linearize::DEFAULT_TARGET_LENGTH,
            tolerance: merge::DEFAULT_TOLERANCE,
            seed: None,
        }
    }
}

/// Sizing for page images that accompany anchor text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    /// Longest side in pixels.
    pub max_size: u32,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            max_size: images::DEFAULT_MAX_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// A loaded PDF, ready for per-page extraction.
///
/// Constructed via [`AnchorDocument::from_bytes`]. Every page call extracts
/// from scratch; nothing is cached between calls.
pub struct AnchorDocument {
    backend: LopdfBackend,
}

impl AnchorDocument {
    /// Parse PDF bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AnchorError> {
        Ok(AnchorDocument {
            backend: LopdfBackend::load_bytes(bytes)?,
        })
    }

    pub fn page_count(&self) -> usize {
        self.backend.page_count()
    }

    /// `(width, height)` of a 1-based page, in points.
    pub fn page_dimensions(&self, page: u32) -> Result<(f64, f64), AnchorError> {
        let page_id = *self
            .backend
            .pages()
            .get(&page)
            .ok_or(AnchorError::PageNotFound(page))?;
        self.backend.page_dimensions(page_id)
    }

    /// Raw extraction of a 1-based page; images are not merged.
    pub fn page_report(&self, page: u32) -> Result<PageReport, AnchorError> {
        extract::extract_page(&self.backend, page)
    }

    /// Extract, merge and linearize a 1-based page.
    pub fn anchor_text(&self, page: u32, options: &AnchorOptions) -> Result<String, AnchorError> {
        let report = self.page_report(page)?.merged(options.tolerance);

        let text = match options.seed {
            Some(seed) => linearize::linearize_report_with_rng(
                &report,
                options.target_length,
                &mut StdRng::seed_from_u64(seed),
            ),
            None => linearize::linearize_report(&report, options.target_length),
        };

        Ok(text)
    }
}

// ---------------------------------------------------------------------------
// Convenience free functions (stateless, re-parse each call)
// ---------------------------------------------------------------------------

/// Extract the unmerged [`PageReport`] of a 1-based page.
pub fn page_report(bytes: &[u8], page: u32) -> Result<PageReport, AnchorError> {
    AnchorDocument::from_bytes(bytes)?.page_report(page)
}

/// Anchor text for a 1-based page.
pub fn get_anchor_text(bytes: &[u8], page: u32, options: &AnchorOptions) -> Result<String, AnchorError> {
    AnchorDocument::from_bytes(bytes)?.anchor_text(page, options)
}
