use std::io::Cursor;

use base64::Engine;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use crate::geometry::fit_within;
use crate::linearize::{linearize_report, DEFAULT_TARGET_LENGTH};
use crate::types::{BoundingBox, ImageElement, PageReport};
use crate::AnchorError;

/// Longest side, in pixels, of page images sent alongside anchor text.
pub const DEFAULT_MAX_SIZE: u32 = 1800;

/// Decode an encoded image (PNG) from memory.
pub fn load_image(bytes: &[u8]) -> Result<DynamicImage, AnchorError> {
    image::load_from_memory(bytes).map_err(|e| AnchorError::Image(e.to_string()))
}

/// Downscale `image` so its longest side is at most `max_size`, keeping the
/// aspect ratio. Images already small enough are returned as-is.
pub fn resize_if_needed(image: DynamicImage, max_size: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let (target_w, target_h) = fit_within(width, height, max_size);

    if (target_w, target_h) == (width, height) {
        return image;
    }

    log::debug!(
        "resizing image from {}x{} to {}x{}",
        width,
        height,
        target_w,
        target_h
    );
    image.resize_exact(target_w, target_h, FilterType::Lanczos3)
}

/// Convert to RGB8, encode as PNG and return the standard base64 text.
pub fn image_to_base64png(image: &DynamicImage) -> Result<String, AnchorError> {
    let rgb = DynamicImage::ImageRgb8(image.to_rgb8());

    let mut buf = Vec::new();
    rgb.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| AnchorError::Image(e.to_string()))?;

    Ok(base64::engine::general_purpose::STANDARD.encode(&buf))
}

/// Anchor text for a bare image: a page the size of the image holding one
/// full-page image element.
pub fn image_anchor_text(width: u32, height: u32) -> String {
    let (w, h) = (width as f64, height as f64);
    let bbox = BoundingBox::new(0.0, 0.0, w, h);
    let report = PageReport {
        mediabox: bbox,
        text_elements: Vec::new(),
        image_elements: vec![ImageElement::new("Image", bbox)],
    };
    linearize_report(&report, DEFAULT_TARGET_LENGTH)
}

/// `true` when `s` is padded, standard-alphabet base64.
pub fn is_base64(s: &str) -> bool {
    base64::engine::general_purpose::STANDARD.decode(s).is_ok()
}
