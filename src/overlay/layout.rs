use serde::Serialize;

use super::font::TextMeasurer;
use super::profile::LayoutMode;

pub const FONT_SIZE_MAX: u32 = 80;
pub const FONT_SIZE_MIN: u32 = 32;
pub const FONT_SIZE_STEP: u32 = 4;
pub const LINE_HEIGHT: f32 = 1.2;
pub const MAX_LINES: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LayoutFit {
    Fits,
    /// The minimum-size wrap needed more than two lines; these were dropped.
    Truncated { dropped: Vec<String> },
    /// Single-line mode could not fit even at the minimum size.
    Overflows,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextLayout {
    pub font_size: u32,
    pub lines: Vec<String>,
    pub fit: LayoutFit,
}

impl TextLayout {
    pub fn line_height(&self) -> f32 {
        self.font_size as f32 * LINE_HEIGHT
    }

    pub fn block_height(&self) -> f32 {
        self.lines.len() as f32 * self.line_height()
    }

    pub fn max_line_width(&self, measurer: &dyn TextMeasurer) -> f32 {
        self.lines
            .iter()
            .map(|line| measurer.measure(line, self.font_size as f32))
            .fold(0.0, f32::max)
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self.fit, LayoutFit::Truncated { .. })
    }
}

/// Candidate sizes, largest first.
pub fn font_sizes() -> impl Iterator<Item = u32> {
    (FONT_SIZE_MIN..=FONT_SIZE_MAX)
        .rev()
        .step_by(FONT_SIZE_STEP as usize)
}

pub fn layout_text(
    text: &str,
    measurer: &dyn TextMeasurer,
    max_width: f32,
    max_height: f32,
    mode: LayoutMode,
) -> TextLayout {
    let words = text.split_whitespace().collect::<Vec<_>>();
    let full = words.join(" ");

    for size in font_sizes() {
        let font_size = size as f32;
        if measurer.measure(&full, font_size) <= max_width {
            return TextLayout {
                font_size: size,
                lines: vec![full],
                fit: LayoutFit::Fits,
            };
        }
        if mode == LayoutMode::SingleLine {
            continue;
        }
        let lines = wrap_words(&words, measurer, font_size, max_width);
        let height = lines.len() as f32 * font_size * LINE_HEIGHT;
        if lines.len() <= MAX_LINES && height <= max_height {
            return TextLayout {
                font_size: size,
                lines,
                fit: LayoutFit::Fits,
            };
        }
    }

    match mode {
        LayoutMode::SingleLine => TextLayout {
            font_size: FONT_SIZE_MIN,
            lines: vec![full],
            fit: LayoutFit::Overflows,
        },
        LayoutMode::Wrap => {
            let mut lines = wrap_words(&words, measurer, FONT_SIZE_MIN as f32, max_width);
            let dropped = lines.split_off(MAX_LINES.min(lines.len()));
            let fit = if dropped.is_empty() {
                LayoutFit::Fits
            } else {
                LayoutFit::Truncated { dropped }
            };
            TextLayout {
                font_size: FONT_SIZE_MIN,
                lines,
                fit,
            }
        }
    }
}

/// Greedy wrap: a word that would overflow a non-empty line starts the next one.
/// A single word wider than `max_width` still gets a line of its own.
pub fn wrap_words(
    words: &[&str],
    measurer: &dyn TextMeasurer,
    font_size: f32,
    max_width: f32,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in words {
        let trial = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if measurer.measure(&trial, font_size) <= max_width || current.is_empty() {
            current = trial;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}
