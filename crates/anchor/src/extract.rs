//! Page extraction: walk one page and collect positioned text and images.

use crate::geometry::Matrix;
use crate::parser::backend::{BackendFontInfo, PdfBackend};
use crate::parser::walker::{walk_page, ContentVisitor};
use crate::types::{BoundingBox, ImageElement, PageReport, TextElement};
use crate::AnchorError;

/// Visitor that records every text show and every image placement.
#[derive(Default)]
struct PageCollector {
    text_elements: Vec<TextElement>,
    image_elements: Vec<ImageElement>,
}

impl PageCollector {
    fn into_report(self, mediabox: BoundingBox) -> PageReport {
        PageReport {
            mediabox,
            text_elements: self.text_elements,
            image_elements: self.image_elements,
        }
    }
}

impl ContentVisitor for PageCollector {
    fn visit_text(
        &mut self,
        text: &str,
        cm: &Matrix,
        tm: &Matrix,
        _font: &BackendFontInfo,
        _font_size: f64,
    ) {
        let user_space = tm.compose(cm);
        log::trace!("text at {:.1},{:.1}: {:?}", user_space.e(), user_space.f(), text);
        self.text_elements
            .push(TextElement::new(text, user_space.e(), user_space.f()));
    }

    fn visit_image(&mut self, name: &str, cm: &Matrix) {
        let bbox = image_bbox(cm);
        log::trace!(
            "image /{} at {:.1},{:.1} to {:.1},{:.1}",
            name,
            bbox.x0,
            bbox.y0,
            bbox.x1,
            bbox.y1
        );
        self.image_elements.push(ImageElement::new(name, bbox));
    }
}

/// The page-space rectangle an image occupies: the unit square mapped
/// through the CTM, normalized so `x0 <= x1` and `y0 <= y1`.
pub fn image_bbox(cm: &Matrix) -> BoundingBox {
    let (ax, ay) = cm.transform_point(0.0, 0.0);
    let (bx, by) = cm.transform_point(1.0, 1.0);
    BoundingBox::new(ax.min(bx), ay.min(by), ax.max(bx), ay.max(by))
}

/// Extract the [`PageReport`] of a 1-based page.
///
/// Any failure while reading the page's structure or walking its content
/// aborts the whole page; no partial report is returned.
pub fn extract_page(backend: &dyn PdfBackend, page_number: u32) -> Result<PageReport, AnchorError> {
    let page_id = *backend
        .pages()
        .get(&page_number)
        .ok_or(AnchorError::PageNotFound(page_number))?;

    let wrap = |source: AnchorError| AnchorError::Extraction {
        page: page_number,
        source: Box::new(source),
    };

    let mediabox = backend.page_media_box(page_id).map_err(wrap)?;

    let mut collector = PageCollector::default();
    walk_page(backend, page_id, &mut collector).map_err(wrap)?;

    log::debug!(
        "page {}: {} text elements, {} images",
        page_number,
        collector.text_elements.len(),
        collector.image_elements.len()
    );

    Ok(collector.into_report(mediabox))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::parser::backend::{
        decode_text_simple, ContentOp, FormXObject, PageId, PdfValue, XObjectInfo,
    };

    /// Single-page backend returning canned operations. Form content is the
    /// form's object number as one byte.
    struct MockBackend {
        ops: Vec<ContentOp>,
        xobjects: BTreeMap<Vec<u8>, XObjectInfo>,
        forms: BTreeMap<u8, Vec<ContentOp>>,
        media_box: Option<BoundingBox>,
    }

    impl MockBackend {
        fn new(ops: Vec<ContentOp>) -> Self {
            Self {
                ops,
                xobjects: BTreeMap::new(),
                forms: BTreeMap::new(),
                media_box: Some(BoundingBox::new(0.0, 0.0, 612.0, 792.0)),
            }
        }

        fn with_xobject(mut self, name: &str, subtype: &str) -> Self {
            self.xobjects.insert(
                name.as_bytes().to_vec(),
                XObjectInfo {
                    subtype: subtype.to_string(),
                    width: Some(10),
                    height: Some(10),
                    id: None,
                },
            );
            self
        }

        fn with_form(mut self, name: &str, number: u8, ops: Vec<ContentOp>) -> Self {
            self.xobjects.insert(
                name.as_bytes().to_vec(),
                XObjectInfo {
                    subtype: "Form".to_string(),
                    width: None,
                    height: None,
                    id: Some((number as u32, 0)),
                },
            );
            self.forms.insert(number, ops);
            self
        }
    }

    impl PdfBackend for MockBackend {
        fn pages(&self) -> BTreeMap<u32, PageId> {
            BTreeMap::from([(1, (3, 0))])
        }

        fn page_media_box(&self, _page: PageId) -> Result<BoundingBox, AnchorError> {
            self.media_box
                .ok_or_else(|| AnchorError::Parse("MediaBox not found for page".into()))
        }

        fn page_xobjects(
            &self,
            _page: PageId,
        ) -> Result<BTreeMap<Vec<u8>, XObjectInfo>, AnchorError> {
            Ok(self.xobjects.clone())
        }

        fn page_fonts(&self, _page: PageId) -> Result<Vec<BackendFontInfo>, AnchorError> {
            Ok(vec![])
        }

        fn page_content(&self, _page: PageId) -> Result<Vec<u8>, AnchorError> {
            Ok(vec![])
        }

        fn form_xobject(&self, id: PageId) -> Result<FormXObject, AnchorError> {
            Ok(FormXObject {
                content: vec![id.0 as u8],
                matrix: Matrix::IDENTITY,
                has_resources: false,
            })
        }

        fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>, AnchorError> {
            match data.first() {
                Some(n) => Ok(self.forms.get(n).cloned().unwrap_or_default()),
                None => Ok(self.ops.clone()),
            }
        }

        fn decode_text(&self, _font: &BackendFontInfo, data: &[u8]) -> String {
            decode_text_simple(data)
        }
    }

    fn nums(values: &[f32]) -> Vec<PdfValue> {
        values.iter().map(|v| PdfValue::Real(*v)).collect()
    }

    fn op(operator: &str, operands: Vec<PdfValue>) -> ContentOp {
        ContentOp::new(operator, operands)
    }

    fn name(n: &str) -> Vec<PdfValue> {
        vec![PdfValue::Name(n.as_bytes().to_vec())]
    }

    fn text(s: &str) -> Vec<PdfValue> {
        vec![PdfValue::Str(s.as_bytes().to_vec())]
    }

    #[test]
    fn test_text_position_combines_tm_and_cm() {
        let backend = MockBackend::new(vec![
            op("cm", nums(&[1.0, 0.0, 0.0, 1.0, 10.0, 20.0])),
            op("BT", vec![]),
            op("Tm", nums(&[1.0, 0.0, 0.0, 1.0, 100.0, 200.0])),
            op("Tj", text("Hello")),
            op("ET", vec![]),
        ]);

        let report = extract_page(&backend, 1).unwrap();
        assert_eq!(report.text_elements, vec![TextElement::new("Hello", 110.0, 220.0)]);
        assert!(report.image_elements.is_empty());
        assert_eq!(report.mediabox, BoundingBox::new(0.0, 0.0, 612.0, 792.0));
    }

    #[test]
    fn test_each_show_is_its_own_element() {
        let backend = MockBackend::new(vec![
            op("BT", vec![]),
            op("Tm", nums(&[1.0, 0.0, 0.0, 1.0, 0.0, 0.0])),
            op("Tj", text("one")),
            op("Tm", nums(&[1.0, 0.0, 0.0, 1.0, 0.0, 50.0])),
            op("Tj", text("two")),
            op("ET", vec![]),
        ]);

        let report = extract_page(&backend, 1).unwrap();
        let texts: Vec<&str> = report.text_elements.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two"]);
        assert_eq!(report.text_elements[1].y, 50.0);
    }

    #[test]
    fn test_image_bbox_from_cm() {
        let backend = MockBackend::new(vec![
            op("q", vec![]),
            op("cm", nums(&[200.0, 0.0, 0.0, 100.0, 50.0, 60.0])),
            op("Do", name("Im0")),
            op("Q", vec![]),
        ])
        .with_xobject("Im0", "Image");

        let report = extract_page(&backend, 1).unwrap();
        assert_eq!(
            report.image_elements,
            vec![ImageElement::new("Im0", BoundingBox::new(50.0, 60.0, 250.0, 160.0))]
        );
    }

    #[test]
    fn test_flipped_image_is_normalized() {
        let cm = Matrix::new(-100.0, 0.0, 0.0, -50.0, 300.0, 400.0);
        assert_eq!(image_bbox(&cm), BoundingBox::new(200.0, 350.0, 300.0, 400.0));
    }

    #[test]
    fn test_missing_and_non_image_xobjects_are_ignored() {
        let backend = MockBackend::new(vec![
            op("Do", name("Nope")),
            op("Do", name("Ps0")),
            op("Do", vec![PdfValue::Integer(3)]),
            op("Do", name("Im1")),
        ])
        .with_xobject("Ps0", "PS")
        .with_xobject("Im1", "Image");

        let report = extract_page(&backend, 1).unwrap();
        assert_eq!(report.image_elements.len(), 1);
        assert_eq!(report.image_elements[0].name, "Im1");
    }

    #[test]
    fn test_form_contents_are_collected() {
        let backend = MockBackend::new(vec![
            op("cm", nums(&[1.0, 0.0, 0.0, 1.0, 10.0, 20.0])),
            op("Do", name("Fm0")),
            op("BT", vec![]),
            op("Tj", text("page")),
            op("ET", vec![]),
        ])
        .with_xobject("Im0", "Image")
        .with_form(
            "Fm0",
            7,
            vec![
                op("BT", vec![]),
                op("Tm", nums(&[1.0, 0.0, 0.0, 1.0, 5.0, 5.0])),
                op("Tj", text("nested")),
                op("ET", vec![]),
                op("q", vec![]),
                op("cm", nums(&[10.0, 0.0, 0.0, 10.0, 0.0, 0.0])),
                op("Do", name("Im0")),
                op("Q", vec![]),
            ],
        );

        let report = extract_page(&backend, 1).unwrap();
        assert_eq!(
            report.text_elements,
            vec![
                TextElement::new("nested", 15.0, 25.0),
                TextElement::new("page", 10.0, 20.0),
            ]
        );
        assert_eq!(
            report.image_elements,
            vec![ImageElement::new("Im0", BoundingBox::new(10.0, 20.0, 20.0, 30.0))]
        );
    }

    #[test]
    fn test_page_not_found() {
        let backend = MockBackend::new(vec![]);
        assert!(matches!(
            extract_page(&backend, 2),
            Err(AnchorError::PageNotFound(2))
        ));
        assert!(matches!(
            extract_page(&backend, 0),
            Err(AnchorError::PageNotFound(0))
        ));
    }

    #[test]
    fn test_malformed_operator_fails_whole_page() {
        let backend = MockBackend::new(vec![
            op("BT", vec![]),
            op("Tj", text("before")),
            op("cm", nums(&[1.0, 0.0])),
        ]);

        match extract_page(&backend, 1) {
            Err(AnchorError::Extraction { page, source }) => {
                assert_eq!(page, 1);
                assert!(matches!(*source, AnchorError::MalformedOperator { .. }));
            }
            other => panic!("expected extraction error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_media_box_is_extraction_error() {
        let mut backend = MockBackend::new(vec![]);
        backend.media_box = None;
        assert!(matches!(
            extract_page(&backend, 1),
            Err(AnchorError::Extraction { page: 1, .. })
        ));
    }

    #[test]
    fn test_empty_page() {
        let report = extract_page(&MockBackend::new(vec![]), 1).unwrap();
        assert!(report.text_elements.is_empty());
        assert!(report.image_elements.is_empty());
    }
}
