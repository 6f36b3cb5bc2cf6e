//! Content-stream walker.
//!
//! Interprets a page's operators with a simplified PDF graphics and text
//! state machine and pushes what it sees into a [`ContentVisitor`]:
//!
//! ```text
//! ContentOp[] --walk_operations--> visit_operator (every operator)
//!                                 visit_text     (Tj, TJ, ', ")
//!                                 visit_image    (Do on an image)
//! ```
//!
//! The walker never touches lopdf directly; string operands are decoded
//! through [`PdfBackend::decode_text`]. A `Do` on a form XObject walks the
//! form's own content in place, under the form's matrix and resources.
//!
//! | Operator | Action |
//! |----------|--------|
//! | `q` / `Q` | Save / restore graphics state (CTM and text parameters) |
//! | `cm`     | Concatenate a matrix onto the CTM |
//! | `BT`     | Begin text object, reset text and line matrices |
//! | `Tf`     | Set font and size |
//! | `Tm`     | Set text matrix |
//! | `Td` / `TD` | Move to next line (`TD` also sets leading) |
//! | `T*`     | Move to next line using leading |
//! | `TL` `Tc` `Tw` `Tz` `Ts` | Leading, spacing, scaling, rise |
//! | `Tj` `TJ` `'` `"` | Show text |
//! | `Do`     | Paint an image, or walk a form |

use std::collections::BTreeMap;

use super::backend::{
    get_number_from_value, BackendFontInfo, ContentOp, PageId, PdfBackend, PdfValue, XObjectInfo,
};
use crate::geometry::Matrix;
use crate::AnchorError;

/// Approximate glyph advance as a fraction of the font size. No glyph
/// metrics are read, so every character advances by this much.
const APPROX_CHAR_WIDTH_RATIO: f64 = 0.5;

/// Deepest chain of nested form XObjects that is followed.
const MAX_FORM_DEPTH: usize = 12;

/// Receives positioned content while a page is walked.
pub trait ContentVisitor {
    /// A text-showing operator painted `text` with text matrix `tm` under
    /// CTM `cm`.
    fn visit_text(
        &mut self,
        text: &str,
        cm: &Matrix,
        tm: &Matrix,
        font: &BackendFontInfo,
        font_size: f64,
    );

    /// An image XObject was painted under CTM `cm`.
    fn visit_image(&mut self, name: &str, cm: &Matrix);

    /// Called for every operator before the walker applies it.
    fn visit_operator(&mut self, _operator: &str, _operands: &[PdfValue], _cm: &Matrix, _tm: &Matrix) {}
}

/// Text state parameters saved and restored with the graphics state.
#[derive(Debug, Clone)]
struct TextParams {
    font: BackendFontInfo,
    font_size: f64,
    /// Horizontal scaling factor (percent / 100).
    horiz_scale: f64,
    char_spacing: f64,
    word_spacing: f64,
    leading: f64,
    rise: f64,
}

impl Default for TextParams {
    fn default() -> Self {
        Self {
            font: BackendFontInfo::default(),
            font_size: 0.0,
            horiz_scale: 1.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// Mutable state tracked while walking a content stream.
#[derive(Debug, Clone, Default)]
struct WalkState {
    ctm: Matrix,
    params: TextParams,
    text_matrix: Matrix,
    line_matrix: Matrix,
    /// Saved `(ctm, params)` pairs pushed by `q`.
    stack: Vec<(Matrix, TextParams)>,
}

impl WalkState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            ..Self::default()
        }
    }

    /// Move to the start of a line offset by `(tx, ty)` from the current one.
    fn translate_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Matrix::translation(tx, ty).compose(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    /// Advance the text matrix horizontally by `dx` text-space units.
    fn advance_x(&mut self, dx: f64) {
        self.text_matrix = Matrix::translation(dx, 0.0).compose(&self.text_matrix);
    }

    /// Advance past `text` using the approximate glyph width.
    fn advance_after_show(&mut self, text: &str) {
        let p = &self.params;
        let mut dx = 0.0;
        for ch in text.chars() {
            dx += p.font_size * APPROX_CHAR_WIDTH_RATIO + p.char_spacing;
            if ch == ' ' {
                dx += p.word_spacing;
            }
        }
        self.advance_x(dx * p.horiz_scale);
    }

    /// Text matrix with the current rise applied.
    fn rendering_matrix(&self) -> Matrix {
        if self.params.rise == 0.0 {
            self.text_matrix
        } else {
            Matrix::translation(0.0, self.params.rise).compose(&self.text_matrix)
        }
    }
}

/// Read the six matrix operands of `cm` or `Tm`.
fn matrix_operands(op: &ContentOp) -> Result<Matrix, AnchorError> {
    let malformed = |message: String| AnchorError::MalformedOperator {
        operator: op.operator.clone(),
        message,
    };

    let values: Vec<f64> = op
        .operands
        .iter()
        .map(get_number_from_value)
        .collect::<Option<_>>()
        .ok_or_else(|| malformed("operands must be numbers".into()))?;

    Matrix::from_slice(&values)
        .ok_or_else(|| malformed(format!("expected 6 operands, got {}", values.len())))
}

fn first_number(op: &ContentOp) -> Option<f64> {
    op.operands.first().and_then(get_number_from_value)
}

fn two_numbers(op: &ContentOp) -> Option<(f64, f64)> {
    match op.operands.as_slice() {
        [a, b, ..] => Some((get_number_from_value(a)?, get_number_from_value(b)?)),
        _ => None,
    }
}

/// Walks content operators within one resource scope: the page itself, or
/// a form XObject invoked from it.
struct Walker<'a> {
    backend: &'a dyn PdfBackend,
    scope: PageId,
    fonts: Vec<BackendFontInfo>,
    /// Loaded on the first `Do`.
    xobjects: Option<BTreeMap<Vec<u8>, XObjectInfo>>,
    /// Forms being walked, outermost first.
    forms: Vec<PageId>,
    state: WalkState,
}

/// Fonts of `scope`. A scope whose fonts cannot be read still walks; its
/// text just has no font metadata.
fn scope_fonts(backend: &dyn PdfBackend, scope: PageId) -> Vec<BackendFontInfo> {
    backend.page_fonts(scope).unwrap_or_else(|e| {
        log::debug!("no fonts for {:?}: {}", scope, e);
        Vec::new()
    })
}

impl Walker<'_> {
    fn run(&mut self, ops: &[ContentOp], visitor: &mut dyn ContentVisitor) -> Result<(), AnchorError> {
        for op in ops {
            self.apply(op, visitor)?;
        }

        if !self.state.stack.is_empty() {
            log::debug!(
                "{:?} ended with {} unrestored q",
                self.scope,
                self.state.stack.len()
            );
        }

        Ok(())
    }

    fn decode(&self, operand: &PdfValue) -> String {
        match operand {
            PdfValue::Str(bytes) => self.backend.decode_text(&self.state.params.font, bytes),
            _ => String::new(),
        }
    }

    fn xobject(&mut self, name: &[u8]) -> Result<Option<XObjectInfo>, AnchorError> {
        if self.xobjects.is_none() {
            self.xobjects = Some(self.backend.page_xobjects(self.scope)?);
        }
        Ok(self.xobjects.as_ref().and_then(|map| map.get(name)).cloned())
    }

    /// `Do`: report images, walk forms, skip everything else.
    fn invoke_xobject(&mut self, name: &[u8], visitor: &mut dyn ContentVisitor) -> Result<(), AnchorError> {
        let display = String::from_utf8_lossy(name);

        let Some(info) = self.xobject(name)? else {
            log::debug!("ignoring Do on unknown XObject {}", display);
            return Ok(());
        };

        if info.is_image() {
            visitor.visit_image(&display, &self.state.ctm);
            return Ok(());
        }
        if !info.is_form() {
            log::debug!("ignoring Do on {} XObject {}", info.subtype, display);
            return Ok(());
        }

        let Some(id) = info.id else {
            log::debug!("ignoring direct form XObject {}", display);
            return Ok(());
        };
        if self.forms.contains(&id) {
            log::debug!("form {} invokes itself, skipping", display);
            return Ok(());
        }
        if self.forms.len() >= MAX_FORM_DEPTH {
            log::debug!("form {} nested deeper than {}, skipping", display, MAX_FORM_DEPTH);
            return Ok(());
        }

        let form = self.backend.form_xobject(id)?;
        let ops = self.backend.decode_content(&form.content)?;
        log::trace!("walking form {} ({} operators)", display, ops.len());

        let (scope, fonts, xobjects) = if form.has_resources {
            (id, scope_fonts(self.backend, id), None)
        } else {
            (self.scope, self.fonts.clone(), self.xobjects.clone())
        };
        let mut forms = self.forms.clone();
        forms.push(id);

        let mut inner = Walker {
            backend: self.backend,
            scope,
            fonts,
            xobjects,
            forms,
            state: WalkState {
                ctm: form.matrix.compose(&self.state.ctm),
                params: self.state.params.clone(),
                ..WalkState::default()
            },
        };
        inner.run(&ops, visitor)
    }

    fn show(&mut self, text: &str, visitor: &mut dyn ContentVisitor) {
        if text.is_empty() {
            return;
        }
        let tm = self.state.rendering_matrix();
        let p = &self.state.params;
        visitor.visit_text(text, &self.state.ctm, &tm, &p.font, p.font_size);
        self.state.advance_after_show(text);
    }

    /// `TJ`: strings interleaved with kerning adjustments, in thousandths of
    /// a text-space unit. Emitted as a single show at the array's start.
    fn show_array(&mut self, items: &[PdfValue], visitor: &mut dyn ContentVisitor) {
        let start = self.state.rendering_matrix();
        let mut buf = String::new();

        for item in items {
            match item {
                PdfValue::Str(_) => {
                    let fragment = self.decode(item);
                    self.state.advance_after_show(&fragment);
                    buf.push_str(&fragment);
                }
                other => {
                    let Some(adj) = get_number_from_value(other) else {
                        continue;
                    };
                    let p = &self.state.params;
                    let dx = -adj / 1000.0 * p.font_size * p.horiz_scale;

                    // A large enough jump reads as a word gap.
                    let gap_threshold = p.font_size * APPROX_CHAR_WIDTH_RATIO * p.horiz_scale * 0.3;
                    if dx > gap_threshold && !buf.is_empty() && !buf.ends_with(' ') {
                        buf.push(' ');
                    }
                    self.state.advance_x(dx);
                }
            }
        }

        if !buf.is_empty() {
            let p = &self.state.params;
            visitor.visit_text(&buf, &self.state.ctm, &start, &p.font, p.font_size);
        }
    }

    fn set_font(&mut self, op: &ContentOp) {
        let [name, size, ..] = op.operands.as_slice() else {
            return;
        };
        let key = match name {
            PdfValue::Name(n) | PdfValue::Str(n) => n.clone(),
            _ => return,
        };

        self.state.params.font = self
            .fonts
            .iter()
            .find(|f| f.name == key)
            .cloned()
            .unwrap_or_else(|| BackendFontInfo {
                name: key,
                ..BackendFontInfo::default()
            });
        self.state.params.font_size = get_number_from_value(size).unwrap_or(0.0);
    }

    fn apply(&mut self, op: &ContentOp, visitor: &mut dyn ContentVisitor) -> Result<(), AnchorError> {
        visitor.visit_operator(
            &op.operator,
            &op.operands,
            &self.state.ctm,
            &self.state.text_matrix,
        );

        match op.operator.as_str() {
            // -- Graphics state -----------------------------------------
            "q" => {
                let saved = (self.state.ctm, self.state.params.clone());
                self.state.stack.push(saved);
            }
            "Q" => match self.state.stack.pop() {
                Some((ctm, params)) => {
                    self.state.ctm = ctm;
                    self.state.params = params;
                }
                None => log::debug!("ignoring unbalanced Q in {:?}", self.scope),
            },
            "cm" => {
                let m = matrix_operands(op)?;
                self.state.ctm = m.compose(&self.state.ctm);
            }

            // -- Text objects and positioning ---------------------------
            "BT" => {
                self.state.text_matrix = Matrix::IDENTITY;
                self.state.line_matrix = Matrix::IDENTITY;
            }
            "ET" => {}
            "Tf" => self.set_font(op),
            "Tm" => {
                let m = matrix_operands(op)?;
                self.state.text_matrix = m;
                self.state.line_matrix = m;
            }
            "Td" => {
                if let Some((tx, ty)) = two_numbers(op) {
                    self.state.translate_line(tx, ty);
                }
            }
            "TD" => {
                if let Some((tx, ty)) = two_numbers(op) {
                    self.state.params.leading = -ty;
                    self.state.translate_line(tx, ty);
                }
            }
            "T*" => {
                let leading = self.state.params.leading;
                self.state.translate_line(0.0, -leading);
            }
            "TL" => {
                if let Some(v) = first_number(op) {
                    self.state.params.leading = v;
                }
            }
            "Tc" => {
                if let Some(v) = first_number(op) {
                    self.state.params.char_spacing = v;
                }
            }
            "Tw" => {
                if let Some(v) = first_number(op) {
                    self.state.params.word_spacing = v;
                }
            }
            "Tz" => {
                if let Some(v) = first_number(op) {
                    self.state.params.horiz_scale = v / 100.0;
                }
            }
            "Ts" => {
                if let Some(v) = first_number(op) {
                    self.state.params.rise = v;
                }
            }

            // -- XObjects -----------------------------------------------
            "Do" => match op.operands.first() {
                Some(PdfValue::Name(name)) => self.invoke_xobject(name, visitor)?,
                _ => log::debug!("ignoring Do without a name operand"),
            },

            // -- Showing text -------------------------------------------
            "Tj" => {
                if let Some(operand) = op.operands.first() {
                    let text = self.decode(operand);
                    self.show(&text, visitor);
                }
            }
            "TJ" => {
                if let Some(PdfValue::Array(items)) = op.operands.first() {
                    self.show_array(items, visitor);
                }
            }
            "'" => {
                let leading = self.state.params.leading;
                self.state.translate_line(0.0, -leading);
                if let Some(operand) = op.operands.first() {
                    let text = self.decode(operand);
                    self.show(&text, visitor);
                }
            }
            "\"" => {
                if let [aw, ac, string, ..] = op.operands.as_slice() {
                    if let Some(aw) = get_number_from_value(aw) {
                        self.state.params.word_spacing = aw;
                    }
                    if let Some(ac) = get_number_from_value(ac) {
                        self.state.params.char_spacing = ac;
                    }
                    let leading = self.state.params.leading;
                    self.state.translate_line(0.0, -leading);
                    let text = self.decode(string);
                    self.show(&text, visitor);
                }
            }

            _ => {}
        }

        Ok(())
    }
}

/// Walk pre-decoded operations whose resources live on `scope`, starting
/// from `initial_ctm`.
///
/// Fails on the first operator whose operands cannot be interpreted where
/// they matter for positioning (`cm`, `Tm`).
pub fn walk_operations(
    backend: &dyn PdfBackend,
    scope: PageId,
    ops: &[ContentOp],
    fonts: &[BackendFontInfo],
    initial_ctm: Matrix,
    visitor: &mut dyn ContentVisitor,
) -> Result<(), AnchorError> {
    let mut walker = Walker {
        backend,
        scope,
        fonts: fonts.to_vec(),
        xobjects: None,
        forms: Vec::new(),
        state: WalkState::new(initial_ctm),
    };
    walker.run(ops, visitor)
}

/// Fetch, decode and walk a page's content stream.
pub fn walk_page(
    backend: &dyn PdfBackend,
    page: PageId,
    visitor: &mut dyn ContentVisitor,
) -> Result<(), AnchorError> {
    let raw = backend.page_content(page)?;
    let ops = backend.decode_content(&raw)?;
    let fonts = scope_fonts(backend, page);
    walk_operations(backend, page, &ops, &fonts, Matrix::IDENTITY, visitor)
}
