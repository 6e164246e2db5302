//! Text box layout shared by the raster and vector text passes.
//!
//! Glyph metrics are approximated with a fixed average advance so that line
//! breaking is deterministic and identical in every output format. Both the
//! SVG painter and the PDF text pass place runs at the coordinates computed
//! here.

use crate::element::TextAlign;

/// Average glyph advance as a fraction of the font size.
pub const AVERAGE_ADVANCE: f64 = 0.55;

/// Baseline offset from the top of a line, as a fraction of the font size.
pub const BASELINE_RATIO: f64 = 0.8;

/// Line height as a fraction of the font size.
pub const LINE_HEIGHT: f64 = 1.0;

/// One laid-out line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    /// Line content.
    pub text: String,
    /// Left edge of the run in box coordinates.
    pub x: f64,
    /// Baseline in box coordinates.
    pub baseline: f64,
    /// Estimated run width.
    pub width: f64,
}

/// Estimated width of a run at the given font size.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn measure(text: &str, font_size: f64) -> f64 {
    text.chars().count() as f64 * AVERAGE_ADVANCE * font_size
}

/// Lay out `text` inside a `width`×`height` box.
///
/// Explicit newlines always break. Words wrap greedily at `width`; a word
/// longer than a line is split between characters. Lines that would start
/// below `height` are dropped, but the first line is always kept. A
/// non-positive `width` or `height` disables wrapping or clipping
/// respectively.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn layout(
    text: &str,
    font_size: f64,
    width: f64,
    height: f64,
    align: TextAlign,
) -> Vec<TextLine> {
    if !(font_size.is_finite() && font_size > 0.0) || text.is_empty() {
        return Vec::new();
    }
    let line_height = font_size * LINE_HEIGHT;

    let mut runs = Vec::new();
    for paragraph in text.split('\n') {
        wrap_paragraph(paragraph.trim_end_matches('\r'), font_size, width, &mut runs);
    }

    runs.into_iter()
        .enumerate()
        .take_while(|(i, _)| {
            *i == 0 || height <= 0.0 || line_height * (*i as f64 + 1.0) <= height + 1e-9
        })
        .map(|(i, run)| {
            let run_width = measure(&run, font_size);
            let x = if width > 0.0 {
                match align {
                    TextAlign::Left | TextAlign::Justify => 0.0,
                    TextAlign::Center => (width - run_width) / 2.0,
                    TextAlign::Right => width - run_width,
                }
            } else {
                0.0
            };
            let baseline = line_height * i as f64 + font_size * BASELINE_RATIO;
            TextLine {
                text: run,
                x,
                baseline,
                width: run_width,
            }
        })
        .collect()
}

fn wrap_paragraph(paragraph: &str, font_size: f64, width: f64, out: &mut Vec<String>) {
    if width <= 0.0 {
        out.push(paragraph.to_string());
        return;
    }
    let advance = AVERAGE_ADVANCE * font_size;
    // At least one character per line so wrapping always makes progress.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let max_chars = ((width / advance).floor() as usize).max(1);

    let mut line = String::new();
    let mut line_len = 0usize;
    for word in paragraph.split(' ') {
        let word_len = word.chars().count();
        let needed = if line_len == 0 { word_len } else { line_len + 1 + word_len };
        if needed <= max_chars {
            if line_len > 0 {
                line.push(' ');
            }
            line.push_str(word);
            line_len = needed;
            continue;
        }
        if line_len > 0 {
            out.push(std::mem::take(&mut line));
            line_len = 0;
        }
        let mut chars: Vec<char> = word.chars().collect();
        while chars.len() > max_chars {
            let rest = chars.split_off(max_chars);
            out.push(chars.into_iter().collect());
            chars = rest;
        }
        line = chars.into_iter().collect();
        line_len = line.chars().count();
    }
    out.push(line);
}
