use serde::{Deserialize, Serialize};

use crate::overlay::{Rgb, StyleConfig};

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct RenderRequest {
    pub(crate) image_url: Option<String>,
    pub(crate) text: Option<String>,
    pub(crate) style_config: Option<StyleConfigPayload>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct StyleConfigPayload {
    pub(crate) font_family: Option<String>,
    pub(crate) backdrop_color: Option<String>,
    pub(crate) backdrop_opacity: Option<f32>,
    pub(crate) text_color: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ValidRequest {
    pub(crate) image_url: String,
    pub(crate) text: String,
    pub(crate) style: StyleConfig,
}

impl RenderRequest {
    pub(crate) fn validate(self) -> Result<ValidRequest, String> {
        let image_url = required("imageUrl", self.image_url)?;
        if !crate::fetch::is_remote(&image_url) {
            return Err("imageUrl must be an http(s) URL".to_string());
        }
        let text = required("text", self.text)?;
        let style = self
            .style_config
            .ok_or_else(|| "styleConfig is required".to_string())?;

        let font_family = required("styleConfig.fontFamily", style.font_family)?;
        let backdrop_color = required("styleConfig.backdropColor", style.backdrop_color)?;
        let text_color = required("styleConfig.textColor", style.text_color)?;
        let backdrop_opacity = style
            .backdrop_opacity
            .ok_or_else(|| "styleConfig.backdropOpacity is required".to_string())?;
        if !backdrop_opacity.is_finite() || !(0.0..=1.0).contains(&backdrop_opacity) {
            return Err(format!(
                "styleConfig.backdropOpacity must be between 0 and 1, got {}",
                backdrop_opacity
            ));
        }
        for (field, value) in [
            ("styleConfig.backdropColor", &backdrop_color),
            ("styleConfig.textColor", &text_color),
        ] {
            if Rgb::parse_hex(value).is_err() {
                return Err(format!("{} is not a hex color: '{}'", field, value));
            }
        }

        Ok(ValidRequest {
            image_url,
            text,
            style: StyleConfig {
                font_family,
                backdrop_color,
                backdrop_opacity,
                text_color,
            },
        })
    }
}

fn required(field: &str, value: Option<String>) -> Result<String, String> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(format!("{} is required", field)),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
    pub(crate) kind: String,
}
