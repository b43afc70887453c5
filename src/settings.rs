use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::overlay::{
    Alignment, ColorMode, Decoration, LayoutMode, RenderProfile, TextAreaPreset,
};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

pub const API_KEY_ENV: &str = "CAPTION_OVERLAY_API_KEY";
pub const FONT_DIR_ENV: &str = "CAPTION_OVERLAY_FONT_DIR";

#[derive(Debug, Clone)]
pub struct Settings {
    pub font_dir: PathBuf,
    pub system_fonts: bool,
    pub color_mode: ColorMode,
    pub layout_mode: LayoutMode,
    pub decoration: Decoration,
    pub alignment: Alignment,
    pub text_area: TextAreaPreset,
    pub server_addr: String,
    pub api_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            font_dir: PathBuf::from("fonts"),
            system_fonts: false,
            color_mode: ColorMode::default(),
            layout_mode: LayoutMode::default(),
            decoration: Decoration::default(),
            alignment: Alignment::default(),
            text_area: TextAreaPreset::default(),
            server_addr: "127.0.0.1:8080".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    fonts: Option<FontSettings>,
    render: Option<RenderSettings>,
    server: Option<ServerSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSettings {
    dir: Option<String>,
    system_fonts: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct RenderSettings {
    color_mode: Option<ColorMode>,
    layout_mode: Option<LayoutMode>,
    decoration: Option<Decoration>,
    alignment: Option<Alignment>,
    text_area: Option<TextAreaPreset>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSettings {
    addr: Option<String>,
    api_key: Option<String>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    let mut settings = load_layers(&ordered_paths)?;
    settings.apply_env(|key| std::env::var(key).ok());
    Ok(settings)
}

/// Embedded defaults first, then each existing path in order; later files win.
fn load_layers(paths: &[PathBuf]) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse default settings")?;
    settings.merge(defaults);

    for path in paths {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }
    Ok(settings)
}

impl Settings {
    pub fn profile(&self) -> RenderProfile {
        RenderProfile {
            color_mode: self.color_mode,
            layout_mode: self.layout_mode,
            decoration: self.decoration,
            alignment: self.alignment,
            text_area: self.text_area.area(),
        }
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(fonts) = incoming.fonts {
            if let Some(dir) = fonts.dir {
                if !dir.trim().is_empty() {
                    self.font_dir = PathBuf::from(dir.trim());
                }
            }
            if let Some(system_fonts) = fonts.system_fonts {
                self.system_fonts = system_fonts;
            }
        }
        if let Some(render) = incoming.render {
            if let Some(mode) = render.color_mode {
                self.color_mode = mode;
            }
            if let Some(mode) = render.layout_mode {
                self.layout_mode = mode;
            }
            if let Some(decoration) = render.decoration {
                self.decoration = decoration;
            }
            if let Some(alignment) = render.alignment {
                self.alignment = alignment;
            }
            if let Some(preset) = render.text_area {
                self.text_area = preset;
            }
        }
        if let Some(server) = incoming.server {
            if let Some(addr) = server.addr {
                if !addr.trim().is_empty() {
                    self.server_addr = addr.trim().to_string();
                }
            }
            if let Some(key) = server.api_key {
                self.api_key = non_empty(key);
            }
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV).and_then(non_empty) {
            self.api_key = Some(key);
        }
        if let Some(dir) = lookup(FONT_DIR_ENV).and_then(non_empty) {
            self.font_dir = PathBuf::from(dir);
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
