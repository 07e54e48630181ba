//! Diagnostic overlay of the inferred grid, crop regions and classifier results.

use anyhow::{Context, Result};
use image::RgbaImage;
use roster_state::{Bounds, CellDebug, CellDimensions, GridCell};
use std::fmt::Write as _;
use std::io::Cursor;
#[cfg(not(feature = "svg"))]
use tracing::warn;

use crate::regions::{ratios, region_in_cell, CellRatio};

const CELL_COLOR: &str = "#00ff66";
const PI_COLOR: &str = "#ff8800";
const LABEL_COLOR: &str = "#ffffff";

/// Crop regions drawn for every cell, each in its own colour
const REGION_COLORS: [(CellRatio, &str); 4] = [
    (ratios::CLASS_ICON, "#ff3333"),
    (ratios::STAR_ROW, "#ffee00"),
    (ratios::ASCENSION_ICON, "#ff00ff"),
    (ratios::PORTRAIT, "#00ccff"),
];

/// Render the debug overlay onto the screenshot and return it PNG-encoded.
/// With no cells the input bytes are returned untouched.
pub fn draw_debug_image(
    image_bytes: &[u8],
    cells: &[GridCell],
    cell_dims: &CellDimensions,
) -> Result<Vec<u8>> {
    if cells.is_empty() {
        return Ok(image_bytes.to_vec());
    }

    let mut canvas = image::load_from_memory(image_bytes)
        .context("Failed to decode screenshot for debug overlay")?
        .to_rgba8();
    let (w, h) = canvas.dimensions();

    let svg = build_overlay_svg(w, h, cells, cell_dims);
    if let Some(overlay) = render_overlay(&svg, w, h) {
        image::imageops::overlay(&mut canvas, &overlay, 0, 0);
    }

    paste_thumbnails(&mut canvas, cells, cell_dims);

    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .context("Failed to encode debug image")?;
    Ok(out)
}

fn build_overlay_svg(w: u32, h: u32, cells: &[GridCell], cell_dims: &CellDimensions) -> String {
    let font_size = (cell_dims.width * 0.11).max(8.0);
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
    );

    for cell in cells {
        push_rect(&mut svg, cell.bounds(), CELL_COLOR, 2.0);
        for (ratio, color) in &REGION_COLORS {
            push_rect(&mut svg, &region_in_cell(cell.bounds(), ratio), color, 1.0);
        }
        push_rect(&mut svg, cell.pi_bounds(), PI_COLOR, 1.0);

        let b = cell.bounds();
        for (i, line) in cell_labels(cell).iter().enumerate() {
            let _ = write!(
                svg,
                r#"<text x="{:.1}" y="{:.1}" font-family="sans-serif" font-size="{:.1}" fill="{}" stroke="black" stroke-width="0.5">{}</text>"#,
                b.x + 2.0,
                b.y + font_size * (i as f64 + 1.0),
                font_size,
                LABEL_COLOR,
                escape_xml(line)
            );
        }
    }

    svg.push_str("</svg>");
    svg
}

fn push_rect(svg: &mut String, r: &Bounds, color: &str, stroke_width: f64) {
    let _ = write!(
        svg,
        r#"<rect x="{:.1}" y="{:.1}" width="{:.1}" height="{:.1}" fill="none" stroke="{}" stroke-width="{}"/>"#,
        r.x, r.y, r.width, r.height, color, stroke_width
    );
}

fn cell_labels(cell: &GridCell) -> Vec<String> {
    let mut lines = vec![format!("PI {}", cell.power_rating())];
    if let Some(class) = cell.class {
        lines.push(class.to_string());
    }
    if let Some(stars) = cell.stars {
        let asc = if cell.is_ascended == Some(true) { " A" } else { "" };
        lines.push(format!("{}*{}", stars, asc));
    }
    match (cell.rank, cell.sig_level) {
        (Some(r), Some(s)) => lines.push(format!("R{} S{}", r, s)),
        (Some(r), None) => lines.push(format!("R{}", r)),
        (None, Some(s)) => lines.push(format!("S{}", s)),
        (None, None) => {}
    }
    match (&cell.champion_name, cell.champion_debug()) {
        (Some(name), _) => lines.push(name.clone()),
        (None, Some(CellDebug::Champion { best_match: Some(name), min_distance, .. })) => {
            lines.push(format!("? {} ({})", name, min_distance))
        }
        _ => {}
    }
    lines
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Class icon crop at the bottom-left of the cell, best-match reference at the top-right.
fn paste_thumbnails(canvas: &mut RgbaImage, cells: &[GridCell], cell_dims: &CellDimensions) {
    let thumb_size = ((cell_dims.width * 0.35) as u32).max(16);

    for cell in cells {
        let b = cell.bounds();
        if let Some(CellDebug::Class {
            thumbnail: Some(icon),
            ..
        }) = cell.class_debug()
        {
            image::imageops::overlay(
                canvas,
                icon.as_ref(),
                b.x as i64,
                (b.bottom() + 2.0) as i64,
            );
        }
        if let Some(CellDebug::Champion {
            thumbnail: Some(portrait),
            ..
        }) = cell.champion_debug()
        {
            let thumb = image::imageops::resize(
                portrait.as_ref(),
                thumb_size,
                thumb_size,
                image::imageops::FilterType::Triangle,
            );
            image::imageops::overlay(
                canvas,
                &thumb,
                (b.right() - thumb_size as f64) as i64,
                b.y as i64,
            );
        }
    }
}

#[cfg(feature = "svg")]
fn render_overlay(svg: &str, w: u32, h: u32) -> Option<RgbaImage> {
    use resvg::tiny_skia::{Pixmap, Transform};
    use resvg::usvg;

    let mut options = usvg::Options::default();
    options.fontdb_mut().load_system_fonts();
    let tree = usvg::Tree::from_data(svg.as_bytes(), &options).ok()?;

    let mut pixmap = Pixmap::new(w, h)?;
    resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());

    let mut rgba = pixmap.data().to_vec();
    unpremultiply_rgba(&mut rgba);
    RgbaImage::from_raw(w, h, rgba)
}

#[cfg(not(feature = "svg"))]
fn render_overlay(_svg: &str, _w: u32, _h: u32) -> Option<RgbaImage> {
    warn!("SVG support disabled; debug overlay shows thumbnails only. Enable feature \"svg\".");
    None
}

#[cfg(feature = "svg")]
fn unpremultiply_rgba(data: &mut [u8]) {
    for pixel in data.chunks_mut(4) {
        let alpha = pixel[3];
        if alpha == 0 {
            pixel[0] = 0;
            pixel[1] = 0;
            pixel[2] = 0;
            continue;
        }
        let a = alpha as u32;
        for c in pixel.iter_mut().take(3) {
            *c = ((*c as u32 * 255 + a / 2) / a).min(255) as u8;
        }
    }
}
