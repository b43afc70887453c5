mod analysis;
mod color;
mod font;
mod layout;
mod profile;
mod render;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::OverlayResult;

pub use analysis::{
    CallerColors, Palette, Tone, average_brightness, contrast_ratio, contrasting_text,
    dominant_color, relative_luminance, sample_region,
};
pub use color::{Rgb, Rgba};
pub use font::{
    EstimatedMetrics, FALLBACK_FAMILY, FontFamily, FontMetrics, FontRegistry, FontResolver,
    ResolvedFont, TextMeasurer, resolve_font,
};
pub use layout::{
    FONT_SIZE_MAX, FONT_SIZE_MIN, FONT_SIZE_STEP, LINE_HEIGHT, LayoutFit, MAX_LINES, TextLayout,
    layout_text,
};
pub use profile::{
    Alignment, CANVAS_SIZE, ColorMode, Decoration, LayoutMode, RenderProfile, TextArea,
    TextAreaPreset,
};
pub use render::{BlockGeometry, Rect, decode_canvas};

/// Measured against a zero width to detect a face that cannot draw anything.
const WIDTH_SAMPLE: &str = "Mg";

#[derive(Debug, Clone, PartialEq)]
pub struct StyleConfig {
    pub font_family: String,
    pub backdrop_color: String,
    pub backdrop_opacity: f32,
    pub text_color: String,
}

impl StyleConfig {
    pub fn caller_colors(&self) -> OverlayResult<CallerColors> {
        Ok(CallerColors {
            text: Rgb::parse_hex(&self.text_color)?,
            backdrop: Rgb::parse_hex(&self.backdrop_color)?,
            backdrop_opacity: self.backdrop_opacity.clamp(0.0, 1.0),
        })
    }
}

pub struct RenderedOverlay {
    pub png: Vec<u8>,
    pub layout: TextLayout,
    pub palette: Palette,
    pub geometry: BlockGeometry,
    pub font_family: String,
}

#[derive(Clone)]
pub struct OverlayRenderer {
    resolver: Arc<dyn FontResolver>,
    profile: RenderProfile,
}

impl OverlayRenderer {
    pub fn new(resolver: Arc<dyn FontResolver>, profile: RenderProfile) -> Self {
        Self { resolver, profile }
    }

    pub fn render_overlay(
        &self,
        image_bytes: &[u8],
        text: &str,
        style: &StyleConfig,
    ) -> OverlayResult<RenderedOverlay> {
        let caller = style.caller_colors()?;
        let canvas = decode_canvas(image_bytes)?;

        let mut font = resolve_font(self.resolver.as_ref(), &style.font_family)?;
        if font.measure(WIDTH_SAMPLE, FONT_SIZE_MAX as f32) <= 0.0 {
            warn!(
                "font '{}' measures zero width; falling back to {}",
                font.family, FALLBACK_FAMILY
            );
            font = ResolvedFont::fallback();
        }

        let area = self.profile.text_area;
        let palette = analysis::analyze(&canvas, &area, self.profile.color_mode, &caller);
        let layout = layout_text(
            text,
            &font,
            area.inner_width(),
            area.inner_height(),
            self.profile.layout_mode,
        );
        match &layout.fit {
            LayoutFit::Fits => {}
            LayoutFit::Truncated { dropped } => warn!(
                "caption truncated to {} lines; dropped {:?}",
                MAX_LINES, dropped
            ),
            LayoutFit::Overflows => warn!(
                "caption overflows the text area at {}px",
                layout.font_size
            ),
        }
        debug!(
            "layout: {}px, {} line(s), family '{}'",
            layout.font_size,
            layout.lines.len(),
            font.family
        );

        let scene = render::Scene {
            layout: &layout,
            font: &font,
            palette: &palette,
            profile: &self.profile,
        };
        let outcome = render::render_svg(&canvas, &scene)?;
        let png = render::rasterize_png(&outcome.svg, self.resolver.database())?;
        info!(
            "rendered overlay: {} bytes, {}px, {} line(s)",
            png.len(),
            layout.font_size,
            layout.lines.len()
        );

        Ok(RenderedOverlay {
            png,
            layout,
            palette,
            geometry: outcome.geometry,
            font_family: font.family,
        })
    }
}

impl std::fmt::Debug for OverlayRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayRenderer")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}
