use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, RgbaImage};
use resvg::render;
use std::io::Cursor;
use std::sync::Arc;
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::analysis::Palette;
use super::color::Rgba;
use super::font::ResolvedFont;
use super::layout::TextLayout;
use super::profile::{Alignment, CANVAS_SIZE, Decoration, RenderProfile, TextArea};
use crate::error::{OverlayError, OverlayResult};

pub const BACKDROP_RADIUS: f32 = 16.0;
pub const STROKE_WIDTH: f32 = 6.0;
pub const STROKE_MITER_LIMIT: f32 = 2.0;
pub const SHADOW_BLUR: f32 = 8.0;
pub const SHADOW_OFFSET_X: f32 = 2.0;
pub const SHADOW_OFFSET_Y: f32 = 2.0;

const SHADOW_FILTER_ID: &str = "text-shadow";

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.w <= self.x + self.w
            && other.y + other.h <= self.y + self.h
    }
}

/// Where the text block and its backdrop land on the canvas.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BlockGeometry {
    pub backdrop: Rect,
    pub text_bounds: Rect,
    pub text_x: f32,
    pub text_anchor: &'static str,
    pub line_ys: Vec<f32>,
}

pub fn block_geometry(
    layout: &TextLayout,
    text_width: f32,
    area: &TextArea,
    alignment: Alignment,
) -> BlockGeometry {
    let line_height = layout.line_height();
    let block_h = layout.block_height();
    let center_y = area.center_y();
    let start_y = center_y - block_h * 0.5 + line_height * 0.5;
    let line_ys = (0..layout.lines.len())
        .map(|idx| start_y + idx as f32 * line_height)
        .collect();

    let backdrop_w = text_width + area.padding_x * 2.0;
    let backdrop_h = block_h + area.padding_y * 2.0;
    let (text_x, text_anchor, text_left, backdrop_x) = match alignment {
        Alignment::Centered => {
            let center_x = area.center_x();
            (
                center_x,
                "middle",
                center_x - text_width * 0.5,
                center_x - backdrop_w * 0.5,
            )
        }
        Alignment::LeftAligned => {
            let left = area.x + area.padding_x;
            (left, "start", left, area.x)
        }
    };

    BlockGeometry {
        backdrop: Rect {
            x: backdrop_x,
            y: center_y - backdrop_h * 0.5,
            w: backdrop_w,
            h: backdrop_h,
        },
        text_bounds: Rect {
            x: text_left,
            y: center_y - block_h * 0.5,
            w: text_width,
            h: block_h,
        },
        text_x,
        text_anchor,
        line_ys,
    }
}

pub struct Scene<'a> {
    pub layout: &'a TextLayout,
    pub font: &'a ResolvedFont,
    pub palette: &'a Palette,
    pub profile: &'a RenderProfile,
}

pub struct RenderOutcome {
    pub svg: String,
    pub geometry: BlockGeometry,
}

/// Decodes the source image and stretches it onto the fixed-size canvas.
pub fn decode_canvas(image_bytes: &[u8]) -> OverlayResult<RgbaImage> {
    if let Some(kind) = infer::get(image_bytes) {
        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(OverlayError::decode(format!(
                "expected an image, got {}",
                kind.mime_type()
            )));
        }
    }
    let image = image::load_from_memory(image_bytes)
        .map_err(|err| OverlayError::decode(err.to_string()))?
        .to_rgba8();
    if image.dimensions() == (CANVAS_SIZE, CANVAS_SIZE) {
        return Ok(image);
    }
    Ok(image::imageops::resize(
        &image,
        CANVAS_SIZE,
        CANVAS_SIZE,
        FilterType::Triangle,
    ))
}

pub fn render_svg(canvas: &RgbaImage, scene: &Scene<'_>) -> OverlayResult<RenderOutcome> {
    let (width, height) = canvas.dimensions();
    let canvas_png = encode_png(canvas)?;
    let data_uri = format!("data:image/png;base64,{}", BASE64.encode(&canvas_png));

    let profile = scene.profile;
    let layout = scene.layout;
    let text_width = layout.max_line_width(scene.font);
    let geometry = block_geometry(layout, text_width, &profile.text_area, profile.alignment);

    let mut svg = String::new();
    svg.push_str(&format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = width,
        h = height
    ));
    svg.push_str(&format!(
        r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
        uri = data_uri,
        w = width,
        h = height
    ));

    let shadow = profile.decoration == Decoration::Shadow;
    if shadow {
        svg.push_str(&shadow_filter(scene.palette.shadow));
    }

    if profile.decoration == Decoration::Backdrop {
        let rect = geometry.backdrop;
        svg.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" rx="{r}" ry="{r}" fill="{fill}" fill-opacity="{opacity}"/>"#,
            x = rect.x,
            y = rect.y,
            w = rect.w,
            h = rect.h,
            r = BACKDROP_RADIUS,
            fill = scene.palette.backdrop.rgb,
            opacity = scene.palette.backdrop.alpha
        ));
    }

    let font_attrs = format!(
        r#"x="{x}" font-family="{family}" font-size="{size}" font-weight="{weight}" text-anchor="{anchor}" dominant-baseline="central""#,
        x = geometry.text_x,
        family = font_family_attr(&scene.font.family),
        size = layout.font_size,
        weight = scene.font.weight_attr(),
        anchor = geometry.text_anchor
    );
    for (line, y) in layout.lines.iter().zip(&geometry.line_ys) {
        let escaped = escape_xml(line);
        if profile.decoration == Decoration::Stroke {
            svg.push_str(&format!(
                r#"<text {attrs} y="{y}" fill="none" stroke="{stroke}" stroke-width="{width}" stroke-linejoin="round" stroke-miterlimit="{miter}">{text}</text>"#,
                attrs = font_attrs,
                y = y,
                stroke = scene.palette.stroke,
                width = STROKE_WIDTH,
                miter = STROKE_MITER_LIMIT,
                text = escaped
            ));
        }
        let filter = if shadow {
            format!(r#" filter="url(#{})""#, SHADOW_FILTER_ID)
        } else {
            String::new()
        };
        svg.push_str(&format!(
            r#"<text {attrs} y="{y}" fill="{fill}"{filter}>{text}</text>"#,
            attrs = font_attrs,
            y = y,
            fill = scene.palette.text,
            filter = filter,
            text = escaped
        ));
    }

    svg.push_str("</svg>");
    Ok(RenderOutcome { svg, geometry })
}

fn shadow_filter(color: Rgba) -> String {
    // Canvas-style blur radius is twice the Gaussian standard deviation.
    format!(
        r#"<defs><filter id="{id}" x="-50%" y="-50%" width="200%" height="200%"><feDropShadow dx="{dx}" dy="{dy}" stdDeviation="{std}" flood-color="{color}" flood-opacity="{opacity}"/></filter></defs>"#,
        id = SHADOW_FILTER_ID,
        dx = SHADOW_OFFSET_X,
        dy = SHADOW_OFFSET_Y,
        std = SHADOW_BLUR * 0.5,
        color = color.rgb,
        opacity = color.alpha
    )
}

pub fn rasterize_png(svg: &str, fontdb: Arc<fontdb::Database>) -> OverlayResult<Vec<u8>> {
    let options = Options {
        fontdb,
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options)
        .map_err(|err| OverlayError::render(format!("failed to parse SVG: {}", err)))?;
    let size = tree.size().to_int_size();
    let mut pixmap = Pixmap::new(size.width(), size.height())
        .ok_or_else(|| OverlayError::render("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);

    let data = pixmap
        .pixels()
        .iter()
        .flat_map(|pixel| {
            let color = pixel.demultiply();
            [color.red(), color.green(), color.blue(), color.alpha()]
        })
        .collect::<Vec<u8>>();
    let image = RgbaImage::from_raw(size.width(), size.height(), data)
        .ok_or_else(|| OverlayError::render("failed to build image buffer from SVG"))?;
    encode_png(&image)
}

pub fn encode_png(image: &RgbaImage) -> OverlayResult<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|err| OverlayError::render(format!("failed to encode PNG: {}", err)))?;
    Ok(bytes)
}

const GENERIC_FAMILIES: [&str; 5] = ["serif", "sans-serif", "monospace", "cursive", "fantasy"];

/// Named families are quoted; generic keywords must stay bare or they match nothing.
fn font_family_attr(family: &str) -> String {
    if GENERIC_FAMILIES
        .iter()
        .any(|generic| generic.eq_ignore_ascii_case(family))
    {
        family.to_ascii_lowercase()
    } else {
        escape_xml(&format!("'{}'", family))
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::analysis::{Palette, Tone};
    use crate::overlay::color::Rgb;
    use crate::overlay::font::{FontRegistry, FontResolver};
    use crate::overlay::layout::LayoutFit;

    fn layout(lines: &[&str], font_size: u32) -> TextLayout {
        TextLayout {
            font_size,
            lines: lines.iter().map(|line| line.to_string()).collect(),
            fit: LayoutFit::Fits,
        }
    }

    fn solid_canvas() -> RgbaImage {
        RgbaImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, image::Rgba([0x4a, 0x90, 0xa4, 255]))
    }

    #[test]
    fn centered_geometry_is_symmetric_about_area_center() {
        let area = TextArea::BANNER;
        let geometry = block_geometry(&layout(&["Hello World"], 80), 460.0, &area, Alignment::Centered);
        assert_eq!(geometry.text_anchor, "middle");
        assert_eq!(geometry.text_x, 512.0);
        assert_eq!(geometry.line_ys, vec![512.0]);
        assert_eq!(
            geometry.backdrop,
            Rect {
                x: 234.0,
                y: 432.0,
                w: 556.0,
                h: 160.0
            }
        );
        assert!(area_rect(&area).contains(&geometry.text_bounds));
    }

    #[test]
    fn two_lines_straddle_the_vertical_midpoint() {
        let area = TextArea::BANNER;
        let geometry = block_geometry(&layout(&["one", "two"], 50), 100.0, &area, Alignment::Centered);
        // line height 60, block 120: starts at 452, lines centered at 482 and 542.
        let close = |a: f32, b: f32| (a - b).abs() < 1e-3;
        assert_eq!(geometry.line_ys.len(), 2);
        assert!(close(geometry.line_ys[0], 482.0));
        assert!(close(geometry.line_ys[1], 542.0));
        assert!(close(geometry.text_bounds.y, 452.0));
        assert!(close(geometry.text_bounds.h, 120.0));
    }

    #[test]
    fn left_aligned_geometry_starts_at_area_edge() {
        let area = TextArea::LOWER_THIRD;
        let geometry = block_geometry(&layout(&["Caption"], 40), 200.0, &area, Alignment::LeftAligned);
        assert_eq!(geometry.text_anchor, "start");
        assert_eq!(geometry.text_x, area.x + area.padding_x);
        assert_eq!(geometry.backdrop.x, area.x);
        assert_eq!(geometry.text_bounds.x, area.x + area.padding_x);
        assert!(area_rect(&area).contains(&geometry.text_bounds));
    }

    fn area_rect(area: &TextArea) -> Rect {
        Rect {
            x: area.x,
            y: area.y,
            w: area.width,
            h: area.height,
        }
    }

    fn svg_for(decoration: Decoration, text: &str) -> String {
        let profile = RenderProfile {
            decoration,
            ..RenderProfile::default()
        };
        let palette = Palette::for_tone(Tone::Dark, 0.9);
        let font = ResolvedFont::fallback();
        let layout = layout(&[text], 64);
        let scene = Scene {
            layout: &layout,
            font: &font,
            palette: &palette,
            profile: &profile,
        };
        render_svg(&solid_canvas(), &scene).expect("svg").svg
    }

    #[test]
    fn backdrop_is_drawn_rounded_before_text() {
        let svg = svg_for(Decoration::Backdrop, "Hi");
        let rect = svg.find("<rect").expect("backdrop");
        let text = svg.find("<text").expect("text");
        assert!(rect < text);
        assert!(svg.contains(r#"rx="16""#));
        assert!(svg.contains(r##"fill="#000000" fill-opacity="0.9""##));
        assert!(!svg.contains("stroke="));
        assert!(svg.contains(r#"preserveAspectRatio="none""#));
    }

    #[test]
    fn stroke_pass_precedes_fill_pass() {
        let svg = svg_for(Decoration::Stroke, "Hi");
        let stroke = svg.find(r##"stroke="#000000""##).expect("stroke pass");
        let fill = svg.find(r##"fill="#ffffff""##).expect("fill pass");
        assert!(stroke < fill);
        assert!(svg.contains(r#"stroke-linejoin="round""#));
        assert!(svg.contains(r#"stroke-miterlimit="2""#));
        assert!(!svg.contains("<rect"));
    }

    #[test]
    fn shadow_uses_drop_shadow_filter() {
        let svg = svg_for(Decoration::Shadow, "Hi");
        assert!(svg.contains("<feDropShadow"));
        assert!(svg.contains(r#"stdDeviation="4""#));
        assert!(svg.contains(r#"filter="url(#text-shadow)""#));
        assert!(!svg.contains("<rect"));
    }

    #[test]
    fn plain_text_has_no_decoration() {
        let svg = svg_for(Decoration::None, "Hi");
        assert!(!svg.contains("<rect"));
        assert!(!svg.contains("<filter"));
        assert!(!svg.contains("stroke="));
    }

    #[test]
    fn caption_text_is_escaped() {
        let svg = svg_for(Decoration::None, "Tom & <Jerry>");
        assert!(svg.contains("Tom &amp; &lt;Jerry&gt;"));
    }

    #[test]
    fn generic_families_stay_unquoted() {
        assert_eq!(font_family_attr("sans-serif"), "sans-serif");
        assert_eq!(font_family_attr("Serif"), "serif");
        assert_eq!(font_family_attr("Product Sans"), "&apos;Product Sans&apos;");
        assert_eq!(font_family_attr("Tom's"), "&apos;Tom&apos;s&apos;");

        let svg = svg_for(Decoration::None, "Hi");
        assert!(svg.contains(r#"font-family="sans-serif""#));
    }

    #[test]
    fn fallback_family_draws_with_system_fonts() {
        let db = FontRegistry::with_system_fonts("/nonexistent").database();
        if db.is_empty() {
            eprintln!("no system font available; skipping");
            return;
        }
        let svg = svg_for(Decoration::None, "Hello World");
        let png = rasterize_png(&svg, db).expect("png");
        let image = image::load_from_memory(&png).expect("decode").to_rgba8();
        let white = image
            .pixels()
            .filter(|pixel| pixel.0[..3].iter().all(|channel| *channel > 200))
            .count();
        assert!(white > 0, "fallback caption left no white pixels");
    }

    #[test]
    fn rasterized_backdrop_blends_over_background() {
        let svg = svg_for(Decoration::Backdrop, "Hi");
        let png = rasterize_png(&svg, Arc::new(fontdb::Database::new())).expect("png");
        let image = image::load_from_memory(&png).expect("decode").to_rgba8();
        assert_eq!(image.dimensions(), (CANVAS_SIZE, CANVAS_SIZE));
        let outside = image.get_pixel(4, 4).0;
        assert_eq!(outside, [0x4a, 0x90, 0xa4, 255]);
        // Black at 0.9 over the teal background.
        let inside = image.get_pixel(512, 512).0;
        let expected = [7.4f32, 14.4, 16.4];
        for (channel, want) in inside.iter().zip(expected) {
            assert!((*channel as f32 - want).abs() <= 2.0, "{:?}", inside);
        }
    }

    #[test]
    fn decode_rejects_non_images() {
        let err = decode_canvas(b"definitely not an image").unwrap_err();
        assert_eq!(err.kind(), "decode_failed");
        let err = decode_canvas(b"%PDF-1.7\n").unwrap_err();
        assert!(err.to_string().contains("application/pdf"));
    }

    #[test]
    fn decode_stretches_to_canvas() {
        let small = RgbaImage::from_pixel(16, 8, image::Rgba([1, 2, 3, 255]));
        let png = encode_png(&small).expect("png");
        let canvas = decode_canvas(&png).expect("canvas");
        assert_eq!(canvas.dimensions(), (CANVAS_SIZE, CANVAS_SIZE));
        assert_eq!(canvas.get_pixel(1000, 1000).0, [1, 2, 3, 255]);
    }
}
