use std::collections::HashMap;

use image::RgbaImage;
use tracing::debug;

use super::color::{Rgb, Rgba};
use super::profile::{ColorMode, TextArea};

/// Every 10th pixel of the flattened region (a 40 byte stride over RGBA).
pub const SAMPLE_EVERY: usize = 10;
pub const LIGHT_THRESHOLD: f64 = 128.0;
pub const WCAG_AA_CONTRAST: f64 = 4.5;
const QUANT_STEP: u8 = 32;
const SHADOW_ALPHA: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Palette {
    pub text: Rgb,
    pub stroke: Rgb,
    pub shadow: Rgba,
    pub backdrop: Rgba,
}

impl Palette {
    /// Black-on-light or white-on-dark, with the backdrop in the text's complement.
    pub fn for_tone(tone: Tone, backdrop_opacity: f32) -> Self {
        let (text, shadow) = match tone {
            Tone::Light => (Rgb::BLACK, Rgba::new(Rgb::BLACK, SHADOW_ALPHA)),
            Tone::Dark => (Rgb::WHITE, Rgba::new(Rgb::WHITE, SHADOW_ALPHA)),
        };
        Self {
            text,
            stroke: text.complement(),
            shadow,
            backdrop: Rgba::new(text.complement(), backdrop_opacity),
        }
    }
}

/// Colors supplied with the request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallerColors {
    pub text: Rgb,
    pub backdrop: Rgb,
    pub backdrop_opacity: f32,
}

pub fn analyze(
    canvas: &RgbaImage,
    area: &TextArea,
    mode: ColorMode,
    caller: &CallerColors,
) -> Palette {
    match mode {
        ColorMode::Brightness => {
            let samples = sample_region(canvas, area);
            let brightness = average_brightness(&samples);
            let tone = tone_for_brightness(brightness);
            debug!(
                "background brightness {:.1} over {} samples -> {:?}",
                brightness,
                samples.len(),
                tone
            );
            Palette::for_tone(tone, caller.backdrop_opacity)
        }
        ColorMode::Dominant => {
            let samples = sample_region(canvas, area);
            let dominant = dominant_color(&samples);
            let text = contrasting_text(dominant);
            let ratio = contrast_ratio(text, dominant);
            debug!(
                "dominant background {} -> text {} (contrast {:.2}, meets AA: {})",
                dominant,
                text,
                ratio,
                ratio >= WCAG_AA_CONTRAST
            );
            let tone = if text == Rgb::BLACK {
                Tone::Light
            } else {
                Tone::Dark
            };
            Palette::for_tone(tone, caller.backdrop_opacity)
        }
        ColorMode::Explicit => Palette {
            text: caller.text,
            stroke: caller.text.complement(),
            shadow: Rgba::new(Rgb::BLACK, SHADOW_ALPHA),
            backdrop: Rgba::new(caller.backdrop, caller.backdrop_opacity),
        },
    }
}

pub fn sample_region(canvas: &RgbaImage, area: &TextArea) -> Vec<[u8; 3]> {
    let (x0, y0, w, h) = area.pixel_bounds(canvas.width(), canvas.height());
    (y0..y0 + h)
        .flat_map(|y| (x0..x0 + w).map(move |x| (x, y)))
        .step_by(SAMPLE_EVERY)
        .map(|(x, y)| {
            let [r, g, b, _] = canvas.get_pixel(x, y).0;
            [r, g, b]
        })
        .collect()
}

pub fn average_brightness(samples: &[[u8; 3]]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let total: f64 = samples
        .iter()
        .map(|[r, g, b]| 0.299 * *r as f64 + 0.587 * *g as f64 + 0.114 * *b as f64)
        .sum();
    total / samples.len() as f64
}

pub fn tone_for_brightness(brightness: f64) -> Tone {
    if brightness > LIGHT_THRESHOLD {
        Tone::Light
    } else {
        Tone::Dark
    }
}

/// Most frequent bucket after flooring each channel to a multiple of 32.
/// Ties go to the bucket seen first.
pub fn dominant_color(samples: &[[u8; 3]]) -> Rgb {
    let mut index: HashMap<[u8; 3], usize> = HashMap::new();
    let mut counts: Vec<([u8; 3], usize)> = Vec::new();
    for sample in samples {
        let bucket = sample.map(|channel| channel / QUANT_STEP * QUANT_STEP);
        match index.get(&bucket) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                index.insert(bucket, counts.len());
                counts.push((bucket, 1));
            }
        }
    }
    let mut best: Option<([u8; 3], usize)> = None;
    for (bucket, count) in counts {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((bucket, count));
        }
    }
    best.map(|([r, g, b], _)| Rgb::new(r, g, b))
        .unwrap_or(Rgb::BLACK)
}

pub fn relative_luminance(color: Rgb) -> f64 {
    let linear = |channel: u8| {
        let c = channel as f64 / 255.0;
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    0.2126 * linear(color.r) + 0.7152 * linear(color.g) + 0.0722 * linear(color.b)
}

pub fn contrast_ratio(a: Rgb, b: Rgb) -> f64 {
    let la = relative_luminance(a);
    let lb = relative_luminance(b);
    (la.max(lb) + 0.05) / (la.min(lb) + 0.05)
}

/// White or black, whichever contrasts more with `background`. Never fails, even below AA.
pub fn contrasting_text(background: Rgb) -> Rgb {
    let white = contrast_ratio(Rgb::WHITE, background);
    let black = contrast_ratio(Rgb::BLACK, background);
    if white >= black { Rgb::WHITE } else { Rgb::BLACK }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::profile::CANVAS_SIZE;
    use image::Rgba as Pixel;

    fn solid(rgb: [u8; 3]) -> RgbaImage {
        RgbaImage::from_pixel(
            CANVAS_SIZE,
            CANVAS_SIZE,
            Pixel([rgb[0], rgb[1], rgb[2], 255]),
        )
    }

    fn caller() -> CallerColors {
        CallerColors {
            text: Rgb::new(0x11, 0x22, 0x33),
            backdrop: Rgb::new(0x40, 0x40, 0x40),
            backdrop_opacity: 0.9,
        }
    }

    #[test]
    fn brightness_picks_black_on_white_and_white_on_black() {
        let area = TextArea::BANNER;
        let light = analyze(&solid([255, 255, 255]), &area, ColorMode::Brightness, &caller());
        assert_eq!(light.text, Rgb::BLACK);
        assert_eq!(light.stroke, Rgb::WHITE);
        assert_eq!(light.shadow.rgb, Rgb::BLACK);

        let dark = analyze(&solid([0, 0, 0]), &area, ColorMode::Brightness, &caller());
        assert_eq!(dark.text, Rgb::WHITE);
        assert_eq!(dark.stroke, Rgb::BLACK);
        assert_eq!(dark.shadow.rgb, Rgb::WHITE);
        assert_eq!(dark.backdrop, Rgba::new(Rgb::BLACK, 0.9));
    }

    #[test]
    fn brightness_threshold_is_strictly_above_midpoint() {
        assert_eq!(tone_for_brightness(128.0), Tone::Dark);
        assert_eq!(tone_for_brightness(128.01), Tone::Light);
        assert_eq!(average_brightness(&[]), 0.0);
        let mid = average_brightness(&[[128, 128, 128]]);
        assert!((mid - 128.0).abs() < 1e-9);
    }

    #[test]
    fn samples_every_tenth_pixel_of_the_area() {
        let area = TextArea {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 3.0,
            padding_x: 0.0,
            padding_y: 0.0,
        };
        let mut canvas = solid([0, 0, 0]);
        for x in 0..10 {
            canvas.put_pixel(x, 1, Pixel([x as u8, 1, 0, 255]));
        }
        let samples = sample_region(&canvas, &area);
        assert_eq!(samples, vec![[0, 0, 0], [0, 1, 0], [0, 0, 0]]);
    }

    #[test]
    fn dominant_red_with_blue_minority() {
        let area = TextArea::BANNER;
        let mut canvas = solid([255, 0, 0]);
        let (x0, y0, w, h) = area.pixel_bounds(CANVAS_SIZE, CANVAS_SIZE);
        // Last tenth of the area's rows in blue.
        for y in (y0 + h - h / 10)..(y0 + h) {
            for x in x0..x0 + w {
                canvas.put_pixel(x, y, Pixel([0, 0, 255, 255]));
            }
        }
        let samples = sample_region(&canvas, &area);
        let dominant = dominant_color(&samples);
        assert_eq!(dominant, Rgb::new(224, 0, 0));

        let expected = if contrast_ratio(Rgb::WHITE, dominant) > contrast_ratio(Rgb::BLACK, dominant)
        {
            Rgb::WHITE
        } else {
            Rgb::BLACK
        };
        let palette = analyze(&canvas, &area, ColorMode::Dominant, &caller());
        assert_eq!(palette.text, expected);
        assert_eq!(palette.backdrop.rgb, expected.complement());
    }

    #[test]
    fn dominant_ties_prefer_first_bucket() {
        let samples = [[10, 10, 10], [250, 250, 250], [12, 12, 12], [240, 240, 240]];
        assert_eq!(dominant_color(&samples), Rgb::new(0, 0, 0));
        assert_eq!(dominant_color(&[]), Rgb::BLACK);
    }

    #[test]
    fn wcag_luminance_and_contrast() {
        assert!((relative_luminance(Rgb::WHITE) - 1.0).abs() < 1e-9);
        assert_eq!(relative_luminance(Rgb::BLACK), 0.0);
        assert!((contrast_ratio(Rgb::WHITE, Rgb::BLACK) - 21.0).abs() < 1e-9);
        assert_eq!(contrast_ratio(Rgb::BLACK, Rgb::WHITE), contrast_ratio(Rgb::WHITE, Rgb::BLACK));
        // Mid grey falls short of AA against both; the better one still wins.
        let grey = Rgb::new(118, 118, 118);
        let pick = contrasting_text(grey);
        assert!(contrast_ratio(pick, grey) >= contrast_ratio(pick.complement(), grey));
        assert_eq!(contrasting_text(Rgb::new(250, 250, 250)), Rgb::BLACK);
        assert_eq!(contrasting_text(Rgb::new(10, 10, 40)), Rgb::WHITE);
    }

    #[test]
    fn explicit_mode_uses_caller_colors() {
        let palette = analyze(&solid([255, 255, 255]), &TextArea::BANNER, ColorMode::Explicit, &caller());
        assert_eq!(palette.text, Rgb::new(0x11, 0x22, 0x33));
        assert_eq!(palette.backdrop, Rgba::new(Rgb::new(0x40, 0x40, 0x40), 0.9));
    }
}
