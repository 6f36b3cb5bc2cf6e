//! Render a [`PageReport`] as length-bounded anchor text.
//!
//! The output always starts with a `Page dimensions: WxH` header. When every
//! element fits in the budget they are emitted in extraction order (images,
//! then texts). Otherwise the spatially extreme elements are kept
//! unconditionally, the rest of the budget is filled from a shuffled pool,
//! and the selection is sorted by position.
//!
//! The report is linearized as given; merge its images first (see
//! [`PageReport::merged`]).

use std::cmp::Ordering;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::sanitize::cleanup_element_text;
use crate::types::PageReport;

/// Character budget used when the caller does not pick one.
pub const DEFAULT_TARGET_LENGTH: usize = 4000;

/// Budgets below this produce the header alone.
pub const MIN_LINEARIZE_LENGTH: usize = 20;

/// One renderable line plus the position it sorts by.
#[derive(Debug, Clone)]
struct Candidate {
    line: String,
    len: usize,
    position: (f64, f64),
}

impl Candidate {
    fn new(line: String, position: (f64, f64)) -> Self {
        let len = line.chars().count();
        Self {
            line,
            len,
            position,
        }
    }
}

/// `Page dimensions: {x1}x{y1}` header line.
pub fn header_line(report: &PageReport) -> String {
    format!(
        "Page dimensions: {:.1}x{:.1}\n",
        report.mediabox.x1, report.mediabox.y1
    )
}

/// Index of the first value that beats every earlier one under `better`.
///
/// Ties keep the earlier element, so the first extreme encountered wins.
fn first_extreme<I>(values: I, better: impl Fn(f64, f64) -> bool) -> Option<usize>
where
    I: IntoIterator<Item = (usize, f64)>,
{
    let mut best: Option<(usize, f64)> = None;
    for (idx, value) in values {
        match best {
            Some((_, current)) if !better(value, current) => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}

fn compare_positions(a: &(f64, f64), b: &(f64, f64)) -> Ordering {
    a.0.partial_cmp(&b.0)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
}

/// Linearize using the thread-local RNG for the fill step.
pub fn linearize_report(report: &PageReport, max_length: usize) -> String {
    linearize_report_with_rng(report, max_length, &mut rand::thread_rng())
}

/// Linearize with an explicit RNG, so callers can make the over-budget fill
/// reproducible.
pub fn linearize_report_with_rng<R: Rng + ?Sized>(
    report: &PageReport,
    max_length: usize,
    rng: &mut R,
) -> String {
    let mut result = header_line(report);

    if max_length < MIN_LINEARIZE_LENGTH {
        return result;
    }

    let images = &report.image_elements;
    let texts: Vec<_> = report
        .text_elements
        .iter()
        .filter(|t| !t.is_blank())
        .collect();

    // Images occupy candidate slots 0..images.len(), texts follow.
    let mut candidates: Vec<Candidate> = Vec::with_capacity(images.len() + texts.len());
    for image in images {
        let b = &image.bbox;
        let line = format!(
            "[Image {:.0}x{:.0} to {:.0}x{:.0}]\n",
            b.x0, b.y0, b.x1, b.y1
        );
        candidates.push(Candidate::new(line, (b.x0, b.y0)));
    }
    for text in &texts {
        let line = format!(
            "[{:.0}x{:.0}]{}\n",
            text.x,
            text.y,
            cleanup_element_text(&text.text)
        );
        candidates.push(Candidate::new(line, (text.x, text.y)));
    }

    let header_len = result.chars().count();
    let total_len = header_len + candidates.iter().map(|c| c.len).sum::<usize>();

    if total_len <= max_length {
        for candidate in &candidates {
            result.push_str(&candidate.line);
        }
        return result;
    }

    let offset = images.len();
    let lt = |a: f64, b: f64| a < b;
    let gt = |a: f64, b: f64| a > b;

    let mut edges: Vec<usize> = [
        first_extreme(images.iter().map(|e| e.bbox.x0).enumerate(), lt),
        first_extreme(images.iter().map(|e| e.bbox.x1).enumerate(), gt),
        first_extreme(images.iter().map(|e| e.bbox.y0).enumerate(), lt),
        first_extreme(images.iter().map(|e| e.bbox.y1).enumerate(), gt),
        first_extreme(texts.iter().map(|t| t.x).enumerate(), lt).map(|i| i + offset),
        first_extreme(texts.iter().map(|t| t.x).enumerate(), gt).map(|i| i + offset),
        first_extreme(texts.iter().map(|t| t.y).enumerate(), lt).map(|i| i + offset),
        first_extreme(texts.iter().map(|t| t.y).enumerate(), gt).map(|i| i + offset),
    ]
    .into_iter()
    .flatten()
    .collect();
    edges.sort_unstable();
    edges.dedup();

    let mut selected: Vec<&Candidate> = edges.iter().map(|&i| &candidates[i]).collect();
    let mut current_len = header_len + selected.iter().map(|c| c.len).sum::<usize>();
    log::trace!(
        "{} edge elements use {} of {} characters",
        selected.len(),
        current_len,
        max_length
    );

    let mut remaining: Vec<&Candidate> = candidates
        .iter()
        .enumerate()
        .filter(|(idx, _)| edges.binary_search(idx).is_err())
        .map(|(_, c)| c)
        .collect();
    remaining.shuffle(rng);

    for candidate in remaining {
        if current_len + candidate.len > max_length {
            break;
        }
        current_len += candidate.len;
        selected.push(candidate);
    }

    selected.sort_by(|a, b| compare_positions(&a.position, &b.position));

    for candidate in selected {
        result.push_str(&candidate.line);
    }

    result
}
