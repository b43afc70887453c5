use serde::Deserialize;

pub const CANVAS_SIZE: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorMode {
    /// Average perceptual brightness picks black or white text.
    Brightness,
    /// Most frequent quantized color, then the higher WCAG contrast of white/black.
    Dominant,
    /// Use the caller's text and backdrop colors as-is.
    #[default]
    Explicit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutMode {
    SingleLine,
    #[default]
    Wrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Decoration {
    Stroke,
    Shadow,
    #[default]
    Backdrop,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alignment {
    #[default]
    Centered,
    LeftAligned,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextArea {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub padding_x: f32,
    pub padding_y: f32,
}

impl TextArea {
    pub const BANNER: TextArea = TextArea {
        x: 62.0,
        y: 312.0,
        width: 900.0,
        height: 400.0,
        padding_x: 48.0,
        padding_y: 32.0,
    };

    pub const LOWER_THIRD: TextArea = TextArea {
        x: 64.0,
        y: 680.0,
        width: 640.0,
        height: 280.0,
        padding_x: 32.0,
        padding_y: 24.0,
    };

    pub fn inner_width(&self) -> f32 {
        (self.width - self.padding_x * 2.0).max(1.0)
    }

    pub fn inner_height(&self) -> f32 {
        (self.height - self.padding_y * 2.0).max(1.0)
    }

    pub fn center_x(&self) -> f32 {
        self.x + self.width * 0.5
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height * 0.5
    }

    /// Integer pixel bounds clamped to the canvas, as `(x, y, w, h)`.
    pub fn pixel_bounds(&self, canvas_w: u32, canvas_h: u32) -> (u32, u32, u32, u32) {
        let x = (self.x.max(0.0) as u32).min(canvas_w);
        let y = (self.y.max(0.0) as u32).min(canvas_h);
        let w = (self.width.max(0.0) as u32).min(canvas_w - x);
        let h = (self.height.max(0.0) as u32).min(canvas_h - y);
        (x, y, w, h)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextAreaPreset {
    #[default]
    Banner,
    LowerThird,
}

impl TextAreaPreset {
    pub fn area(self) -> TextArea {
        match self {
            TextAreaPreset::Banner => TextArea::BANNER,
            TextAreaPreset::LowerThird => TextArea::LOWER_THIRD,
        }
    }
}

/// The deployed rendering variant. Chosen by configuration, never by the request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderProfile {
    pub color_mode: ColorMode,
    pub layout_mode: LayoutMode,
    pub decoration: Decoration,
    pub alignment: Alignment,
    pub text_area: TextArea,
}

impl Default for RenderProfile {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::default(),
            layout_mode: LayoutMode::default(),
            decoration: Decoration::default(),
            alignment: Alignment::default(),
            text_area: TextAreaPreset::default().area(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_fit_on_canvas() {
        for preset in [TextAreaPreset::Banner, TextAreaPreset::LowerThird] {
            let area = preset.area();
            assert!(area.x + area.width <= CANVAS_SIZE as f32);
            assert!(area.y + area.height <= CANVAS_SIZE as f32);
            assert_eq!(
                area.pixel_bounds(CANVAS_SIZE, CANVAS_SIZE),
                (
                    area.x as u32,
                    area.y as u32,
                    area.width as u32,
                    area.height as u32
                )
            );
        }
    }

    #[test]
    fn banner_inner_box() {
        let area = TextArea::BANNER;
        assert_eq!(area.inner_width(), 804.0);
        assert_eq!(area.inner_height(), 336.0);
        assert_eq!((area.center_x(), area.center_y()), (512.0, 512.0));
    }

    #[test]
    fn modes_parse_from_kebab_case() {
        #[derive(Deserialize)]
        struct Modes {
            color_mode: ColorMode,
            layout_mode: LayoutMode,
            decoration: Decoration,
            alignment: Alignment,
            text_area: TextAreaPreset,
        }
        let parsed: Modes = toml::from_str(
            r#"
color_mode = "dominant"
layout_mode = "single-line"
decoration = "shadow"
alignment = "left-aligned"
text_area = "lower-third"
"#,
        )
        .unwrap();
        assert_eq!(parsed.color_mode, ColorMode::Dominant);
        assert_eq!(parsed.layout_mode, LayoutMode::SingleLine);
        assert_eq!(parsed.decoration, Decoration::Shadow);
        assert_eq!(parsed.alignment, Alignment::LeftAligned);
        assert_eq!(parsed.text_area, TextAreaPreset::LowerThird);
    }
}
