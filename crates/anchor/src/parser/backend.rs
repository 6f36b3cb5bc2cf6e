use std::collections::{BTreeMap, BTreeSet};

use lopdf::{self, content::Content};

use crate::geometry::Matrix;
use crate::types::BoundingBox;
use crate::AnchorError;

// ---------------------------------------------------------------------------
// Type aliases
// ---------------------------------------------------------------------------

/// A page identifier mirroring `lopdf::ObjectId`: (object number, generation number).
pub type PageId = (u32, u16);

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Font information extracted from a page's resource dictionary.
#[derive(Debug, Clone, Default)]
pub struct BackendFontInfo {
    /// The font name key as it appears in the resource dictionary (e.g. `b"F1"`).
    pub name: Vec<u8>,
    /// Base font name from the font dictionary, if present.
    pub base_font: Option<String>,
    /// Encoding entry from the font dictionary, if present.
    pub encoding: Option<String>,
}

/// What a resource dictionary says about one XObject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XObjectInfo {
    /// `Subtype` name, e.g. `Image` or `Form`. Empty when missing.
    pub subtype: String,
    pub width: Option<i64>,
    pub height: Option<i64>,
    /// Object the entry points at, when it is an indirect reference.
    pub id: Option<PageId>,
}

impl XObjectInfo {
    pub fn is_image(&self) -> bool {
        self.subtype == "Image"
    }

    pub fn is_form(&self) -> bool {
        self.subtype == "Form"
    }
}

/// A form XObject ready to be walked.
#[derive(Debug, Clone, PartialEq)]
pub struct FormXObject {
    /// Decoded content stream.
    pub content: Vec<u8>,
    /// Form space to user space at the point of invocation.
    pub matrix: Matrix,
    /// Whether the form carries its own `Resources`; otherwise the invoking
    /// scope's resources apply.
    pub has_resources: bool,
}

/// A simplified, lopdf-independent representation of a PDF value.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Dict(Vec<(Vec<u8>, PdfValue)>),
    Reference(PageId),
}

/// A single content-stream operation (operator + operands).
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

impl ContentOp {
    pub fn new(operator: &str, operands: Vec<PdfValue>) -> Self {
        Self {
            operator: operator.to_string(),
            operands,
        }
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Extract an `f64` from a [`PdfValue`], accepting both `Integer` and `Real`.
pub fn get_number_from_value(val: &PdfValue) -> Option<f64> {
    match val {
        PdfValue::Integer(i) => Some(*i as f64),
        PdfValue::Real(f) => Some(*f as f64),
        _ => None,
    }
}

/// Convert a `lopdf::Object` into a [`PdfValue`].
///
/// Stream dictionaries are converted but the raw stream bytes are dropped.
pub fn convert_object(obj: &lopdf::Object) -> PdfValue {
    match obj {
        lopdf::Object::Null => PdfValue::Null,
        lopdf::Object::Boolean(b) => PdfValue::Bool(*b),
        lopdf::Object::Integer(i) => PdfValue::Integer(*i),
        lopdf::Object::Real(f) => PdfValue::Real(*f),
        lopdf::Object::Name(n) => PdfValue::Name(n.clone()),
        lopdf::Object::String(s, _) => PdfValue::Str(s.clone()),
        lopdf::Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        lopdf::Object::Dictionary(dict) => PdfValue::Dict(convert_dict(dict)),
        lopdf::Object::Stream(stream) => PdfValue::Dict(convert_dict(&stream.dict)),
        lopdf::Object::Reference(id) => PdfValue::Reference(*id),
    }
}

fn convert_dict(dict: &lopdf::Dictionary) -> Vec<(Vec<u8>, PdfValue)> {
    dict.iter()
        .map(|(k, v)| (k.clone(), convert_object(v)))
        .collect()
}

/// Best-effort decoding of raw PDF string bytes into a Rust `String`.
///
/// 1. UTF-16BE with BOM (`\xFE\xFF` prefix).
/// 2. Valid UTF-8.
/// 3. Latin-1, each byte mapped to its code point.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if let Some(payload) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let code_units: Vec<u16> = payload
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&code_units);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    bytes.iter().map(|&b| b as char).collect()
}

// ---------------------------------------------------------------------------
// PdfBackend trait
// ---------------------------------------------------------------------------

/// Abstraction over the PDF structure reader (currently backed by `lopdf`).
///
/// The extractor only talks to this trait, so tests drive it with mock
/// implementations that return pre-decoded operations.
///
/// Resource lookups take a *scope*: the page, or a form XObject that has
/// its own `Resources`.
pub trait PdfBackend {
    /// Return a mapping from 1-based page number to [`PageId`].
    fn pages(&self) -> BTreeMap<u32, PageId>;

    /// The page's MediaBox, corners as stored in the file.
    fn page_media_box(&self, page: PageId) -> Result<BoundingBox, AnchorError>;

    /// Every XObject in the scope's resource dictionary, keyed by name.
    fn page_xobjects(&self, scope: PageId) -> Result<BTreeMap<Vec<u8>, XObjectInfo>, AnchorError>;

    /// Font information for every font in the scope's resource dictionary.
    fn page_fonts(&self, scope: PageId) -> Result<Vec<BackendFontInfo>, AnchorError>;

    /// Return the decoded content stream bytes for a page.
    fn page_content(&self, page: PageId) -> Result<Vec<u8>, AnchorError>;

    /// Load a form XObject by object id.
    fn form_xobject(&self, id: PageId) -> Result<FormXObject, AnchorError>;

    /// Decode raw content-stream bytes into a sequence of [`ContentOp`]s.
    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, AnchorError>;

    /// Decode the string operand of a text-showing operator, using what is
    /// known about the current font's encoding.
    fn decode_text(&self, font: &BackendFontInfo, bytes: &[u8]) -> String;
}

// ---------------------------------------------------------------------------
// LopdfBackend
// ---------------------------------------------------------------------------

/// Concrete [`PdfBackend`] implementation backed by [`lopdf::Document`].
pub struct LopdfBackend {
    doc: lopdf::Document,
}

impl LopdfBackend {
    /// Parse a PDF from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self, AnchorError> {
        let doc =
            lopdf::Document::load_mem(data).map_err(|e| AnchorError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            return Err(AnchorError::Encrypted);
        }

        Ok(Self { doc })
    }

    /// Wrap an already loaded document.
    pub fn from_document(doc: lopdf::Document) -> Self {
        Self { doc }
    }

    /// Total number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Page `(width, height)` in points, from the MediaBox.
    pub fn page_dimensions(&self, page: PageId) -> Result<(f64, f64), AnchorError> {
        let media_box = self.page_media_box(page)?;
        Ok((media_box.width(), media_box.height()))
    }

    // -- private helpers ----------------------------------------------------

    /// Dictionary of a page, or of a form XObject's stream.
    fn scope_dict(&self, id: PageId) -> Result<&lopdf::Dictionary, AnchorError> {
        match self
            .doc
            .get_object(id)
            .map_err(|e| AnchorError::Parse(format!("cannot get object {:?}: {}", id, e)))?
        {
            lopdf::Object::Dictionary(dict) => Ok(dict),
            lopdf::Object::Stream(stream) => Ok(&stream.dict),
            other => Err(AnchorError::Parse(format!(
                "object {:?} is not a dictionary: {:?}",
                id, other
            ))),
        }
    }

    /// Look `key` up on `dict`, then on its ancestors in the page tree.
    ///
    /// A `Parent` chain that loops back on itself ends the search.
    fn find_inherited<'a>(
        &'a self,
        dict: &'a lopdf::Dictionary,
        key: &[u8],
    ) -> Option<&'a lopdf::Object> {
        let mut visited = BTreeSet::new();
        let mut current = dict;

        loop {
            if let Ok(obj) = current.get(key) {
                return Some(self.resolve(obj));
            }

            let parent_id = current.get(b"Parent").ok()?.as_reference().ok()?;
            if !visited.insert(parent_id) {
                log::debug!(
                    "page tree cycle at {:?} while looking up /{}",
                    parent_id,
                    String::from_utf8_lossy(key)
                );
                return None;
            }
            current = self.doc.get_object(parent_id).ok()?.as_dict().ok()?;
        }
    }

    /// Named sub-dictionary of the scope's resources, e.g. `Font`.
    fn resource_dict(&self, scope: PageId, kind: &[u8]) -> Result<Option<&lopdf::Dictionary>, AnchorError> {
        let dict = self.scope_dict(scope)?;
        Ok(self
            .find_inherited(dict, b"Resources")
            .and_then(|res| res.as_dict().ok())
            .and_then(|res| res.get(kind).ok())
            .and_then(|obj| self.resolve(obj).as_dict().ok()))
    }

    /// Follow a single level of reference indirection.
    fn resolve<'a>(&'a self, obj: &'a lopdf::Object) -> &'a lopdf::Object {
        match obj {
            lopdf::Object::Reference(id) => self.doc.get_object(*id).unwrap_or(obj),
            _ => obj,
        }
    }

    /// Convert a lopdf array to `f64` values.
    fn array_to_f64s(&self, objects: &[lopdf::Object]) -> Result<Vec<f64>, AnchorError> {
        objects
            .iter()
            .map(|obj| match self.resolve(obj) {
                lopdf::Object::Integer(i) => Ok(*i as f64),
                lopdf::Object::Real(f) => Ok(*f as f64),
                other => Err(AnchorError::Parse(format!(
                    "expected number in array, got {:?}",
                    other
                ))),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// PdfBackend implementation for LopdfBackend
// ---------------------------------------------------------------------------

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn page_media_box(&self, page: PageId) -> Result<BoundingBox, AnchorError> {
        let page_dict = self.scope_dict(page)?;
        let media_box = self
            .find_inherited(page_dict, b"MediaBox")
            .and_then(|obj| obj.as_array().ok())
            .ok_or_else(|| AnchorError::Parse("MediaBox not found for page".into()))?;

        let nums = self.array_to_f64s(media_box)?;
        if nums.len() < 4 {
            return Err(AnchorError::Parse(format!(
                "MediaBox has {} elements, expected 4",
                nums.len()
            )));
        }

        Ok(BoundingBox::from_rect([nums[0], nums[1], nums[2], nums[3]]))
    }

    fn page_xobjects(&self, scope: PageId) -> Result<BTreeMap<Vec<u8>, XObjectInfo>, AnchorError> {
        let mut xobjects = BTreeMap::new();

        let Some(xobject_dict) = self.resource_dict(scope, b"XObject")? else {
            return Ok(xobjects);
        };

        for (name, obj) in xobject_dict.iter() {
            let dict = match self.resolve(obj) {
                lopdf::Object::Stream(stream) => &stream.dict,
                lopdf::Object::Dictionary(dict) => dict,
                _ => continue,
            };

            let subtype = dict
                .get(b"Subtype")
                .ok()
                .and_then(|o| o.as_name().ok())
                .map(|n| String::from_utf8_lossy(n).into_owned())
                .unwrap_or_default();
            let width = dict.get(b"Width").ok().and_then(|o| o.as_i64().ok());
            let height = dict.get(b"Height").ok().and_then(|o| o.as_i64().ok());

            xobjects.insert(
                name.clone(),
                XObjectInfo {
                    subtype,
                    width,
                    height,
                    id: obj.as_reference().ok(),
                },
            );
        }

        Ok(xobjects)
    }

    fn page_fonts(&self, scope: PageId) -> Result<Vec<BackendFontInfo>, AnchorError> {
        let Some(font_dict) = self.resource_dict(scope, b"Font")? else {
            return Ok(Vec::new());
        };

        let fonts = font_dict
            .iter()
            .filter_map(|(name, obj)| Some((name, self.resolve(obj).as_dict().ok()?)))
            .map(|(name, dict)| BackendFontInfo {
                name: name.clone(),
                base_font: dict
                    .get(b"BaseFont")
                    .ok()
                    .and_then(|o| o.as_name().ok())
                    .map(|n| String::from_utf8_lossy(n).into_owned()),
                encoding: dict.get(b"Encoding").ok().and_then(|o| match o {
                    lopdf::Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
                    _ => None,
                }),
            })
            .collect();

        Ok(fonts)
    }

    fn page_content(&self, page: PageId) -> Result<Vec<u8>, AnchorError> {
        self.doc
            .get_page_content(page)
            .map_err(|e| AnchorError::Parse(format!("cannot get page content: {}", e)))
    }

    fn form_xobject(&self, id: PageId) -> Result<FormXObject, AnchorError> {
        let stream = self
            .doc
            .get_object(id)
            .and_then(|obj| obj.as_stream())
            .map_err(|e| AnchorError::Parse(format!("form XObject {:?}: {}", id, e)))?;

        let content = if stream.dict.has(b"Filter") {
            stream
                .decompressed_content()
                .map_err(|e| AnchorError::Parse(format!("form XObject {:?}: {}", id, e)))?
        } else {
            stream.content.clone()
        };

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|obj| self.resolve(obj).as_array().ok())
            .and_then(|arr| self.array_to_f64s(arr).ok())
            .and_then(|values| Matrix::from_slice(&values))
            .unwrap_or(Matrix::IDENTITY);

        Ok(FormXObject {
            content,
            matrix,
            has_resources: stream.dict.has(b"Resources"),
        })
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, AnchorError> {
        let content = Content::decode(data)
            .map_err(|e| AnchorError::Parse(format!("content stream decode error: {}", e)))?;

        Ok(content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect())
    }

    fn decode_text(&self, font: &BackendFontInfo, bytes: &[u8]) -> String {
        // Identity-H / Identity-V fonts usually carry 2-byte codes that
        // line up with UTF-16BE.
        let identity = font
            .encoding
            .as_deref()
            .is_some_and(|enc| enc.contains("Identity"));
        if identity && bytes.len() >= 2 && bytes.len().is_multiple_of(2) {
            let code_units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|c| u16::from_be_bytes([c[0], c[1]]))
                .collect();
            let decoded = String::from_utf16_lossy(&code_units);
            if !decoded.chars().all(|c| c == '\u{FFFD}' || c == '\0') {
                return decoded;
            }
        }

        decode_text_simple(bytes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
