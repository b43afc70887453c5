use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "caption-overlay",
    version,
    about = "Render a styled text caption over an image"
)]
struct Cli {
    /// Background image (local path or http(s) URL)
    #[arg(short = 'i', long = "image")]
    image: Option<String>,

    /// Caption text
    #[arg(short = 't', long = "text")]
    text: Option<String>,

    /// Output PNG path
    #[arg(short = 'o', long = "output", default_value = "overlay.png")]
    output: String,

    /// Inter, Poppins, Montserrat, Oswald or Product Sans
    #[arg(short = 'f', long = "font-family", default_value = "Inter")]
    font_family: String,

    /// Backdrop color (#RRGGBB)
    #[arg(long = "backdrop-color", default_value = "#000000")]
    backdrop_color: String,

    /// Backdrop opacity between 0 and 1
    #[arg(long = "backdrop-opacity", default_value_t = 0.6)]
    backdrop_opacity: f32,

    /// Text color (#RRGGBB)
    #[arg(long = "text-color", default_value = "#ffffff")]
    text_color: String,

    /// Run the HTTP server instead of rendering once
    #[arg(long = "serve")]
    serve: bool,

    /// Server listen address (overrides settings [server].addr)
    #[arg(long = "addr")]
    addr: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    caption_overlay::logging::init(cli.verbose)?;

    let output = caption_overlay::run(caption_overlay::Config {
        image: cli.image,
        text: cli.text,
        output: cli.output,
        style: caption_overlay::StyleConfig {
            font_family: cli.font_family,
            backdrop_color: cli.backdrop_color,
            backdrop_opacity: cli.backdrop_opacity,
            text_color: cli.text_color,
        },
        serve: cli.serve,
        addr: cli.addr,
        settings_path: cli.read_settings,
    })
    .await?;

    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
