use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in PDF points.
///
/// Corners are stored exactly as given; `x0 <= x1` and `y0 <= y1` are not
/// enforced, so code combining boxes must go through min/max.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BoundingBox {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        BoundingBox { x0, y0, x1, y1 }
    }

    /// Build a box from a raw `[llx, lly, urx, ury]` rectangle.
    pub fn from_rect(rect: [f64; 4]) -> Self {
        BoundingBox::new(rect[0], rect[1], rect[2], rect[3])
    }

    pub fn width(&self) -> f64 {
        (self.x1 - self.x0).abs()
    }

    pub fn height(&self) -> f64 {
        (self.y1 - self.y0).abs()
    }

    /// Smallest box enclosing both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// A run of text at its absolute user-space origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    pub text: String,
    pub x: f64,
    pub y: f64,
}

impl TextElement {
    pub fn new(text: impl Into<String>, x: f64, y: f64) -> Self {
        TextElement {
            text: text.into(),
            x,
            y,
        }
    }

    /// `true` when the text holds nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// One placed image XObject (or, after merging, a cluster of them).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageElement {
    pub name: String,
    pub bbox: BoundingBox,
}

impl ImageElement {
    pub fn new(name: impl Into<String>, bbox: BoundingBox) -> Self {
        ImageElement {
            name: name.into(),
            bbox,
        }
    }
}

/// Everything extracted from a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageReport {
    pub mediabox: BoundingBox,
    pub text_elements: Vec<TextElement>,
    pub image_elements: Vec<ImageElement>,
}

impl PageReport {
    /// A copy of this report with touching or overlapping images collapsed.
    pub fn merged(&self, tolerance: f64) -> PageReport {
        PageReport {
            mediabox: self.mediabox,
            text_elements: self.text_elements.clone(),
            image_elements: crate::merge::merge_image_elements(&self.image_elements, tolerance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_from_rect_keeps_order() {
        let b = BoundingBox::from_rect([10.0, 20.0, 0.0, 5.0]);
        assert_eq!(b, BoundingBox::new(10.0, 20.0, 0.0, 5.0));
        assert_eq!(b.width(), 10.0);
        assert_eq!(b.height(), 15.0);
    }

    #[test]
    fn test_bbox_union() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, -5.0, 20.0, 8.0);
        assert_eq!(a.union(&b), BoundingBox::new(0.0, -5.0, 20.0, 10.0));
    }

    #[test]
    fn test_text_element_blank() {
        assert!(TextElement::new("  \t\n", 0.0, 0.0).is_blank());
        assert!(TextElement::new("", 0.0, 0.0).is_blank());
        assert!(!TextElement::new(" a ", 0.0, 0.0).is_blank());
    }

    #[test]
    fn test_report_merged_leaves_text_untouched() {
        let report = PageReport {
            mediabox: BoundingBox::new(0.0, 0.0, 612.0, 792.0),
            text_elements: vec![TextElement::new("Hello", 1.0, 2.0)],
            image_elements: vec![
                ImageElement::new("Im1", BoundingBox::new(0.0, 0.0, 10.0, 10.0)),
                ImageElement::new("Im2", BoundingBox::new(10.0, 0.0, 20.0, 10.0)),
            ],
        };

        let merged = report.merged(0.5);
        assert_eq!(merged.mediabox, report.mediabox);
        assert_eq!(merged.text_elements, report.text_elements);
        assert_eq!(merged.image_elements.len(), 1);
        assert_eq!(merged.image_elements[0].name, "Im1+Im2");
    }

    #[test]
    fn test_report_serializes() {
        let report = PageReport {
            mediabox: BoundingBox::new(0.0, 0.0, 612.0, 792.0),
            text_elements: vec![TextElement::new("Hi", 1.0, 2.0)],
            image_elements: vec![],
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["mediabox"]["x1"], 612.0);
        assert_eq!(json["text_elements"][0]["text"], "Hi");
    }
}
