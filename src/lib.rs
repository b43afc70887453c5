use anyhow::{Context, Result, anyhow};
use std::path::Path;
use std::sync::Arc;

pub mod error;
pub mod fetch;
pub mod logging;
pub mod overlay;
pub mod server;
pub mod settings;

#[cfg(test)]
mod test_util;

pub use error::{OverlayError, OverlayResult};
pub use fetch::{FetchFuture, HttpFetcher, ImageFetcher, load_image_source};
pub use overlay::{
    FontRegistry, FontResolver, LayoutFit, OverlayRenderer, RenderProfile, RenderedOverlay,
    StyleConfig, TextLayout,
};

#[derive(Debug, Clone)]
pub struct Config {
    pub image: Option<String>,
    pub text: Option<String>,
    pub output: String,
    pub style: StyleConfig,
    pub serve: bool,
    pub addr: Option<String>,
    pub settings_path: Option<String>,
}

pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;

    if config.serve {
        let addr = config
            .addr
            .clone()
            .unwrap_or_else(|| settings.server_addr.clone());
        server::run_server(settings, addr).await?;
        return Ok(String::new());
    }

    let image = config
        .image
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("--image is required unless --serve is set"))?;
    let text = config
        .text
        .as_deref()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| anyhow!("--text is required unless --serve is set"))?;

    let fetcher = HttpFetcher::new()?;
    let image_bytes = load_image_source(&fetcher, image).await?;

    let registry = if settings.system_fonts {
        FontRegistry::with_system_fonts(&settings.font_dir)
    } else {
        FontRegistry::new(&settings.font_dir)
    };
    let renderer = OverlayRenderer::new(Arc::new(registry), settings.profile());
    let rendered = renderer.render_overlay(&image_bytes, text, &config.style)?;

    std::fs::write(&config.output, &rendered.png)
        .with_context(|| format!("failed to write output: {}", config.output))?;
    Ok(format_summary(&config.output, &rendered))
}

fn format_summary(output: &str, rendered: &RenderedOverlay) -> String {
    let mut summary = format!(
        "{} ({}px, {} line(s), {})",
        output,
        rendered.layout.font_size,
        rendered.layout.lines.len(),
        rendered.font_family
    );
    if let LayoutFit::Truncated { dropped } = &rendered.layout.fit {
        summary.push_str(&format!("\ntruncated: {}", dropped.join(" ")));
    }
    summary
}
