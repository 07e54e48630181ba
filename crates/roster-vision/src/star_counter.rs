use image::RgbaImage;
use roster_state::{Bounds, CellDebug};
use tracing::debug;

use crate::classify::{Classification, Outcome};
use crate::regions::{crop_clamped, ratios, region_in_cell};

/// Star count reported when the strip cannot be analysed
pub const FALLBACK_STARS: u8 = 6;

/// Grayscale level above which a pixel counts as part of a star glyph
const BRIGHT_THRESHOLD: u8 = 120;

/// Bright-span ratio cutoffs, highest first. Uncalibrated; tune against real screenshots.
const STAR_LADDER: [(f64, u8); 6] = [
    (0.90, 7),
    (0.75, 6),
    (0.60, 5),
    (0.45, 4),
    (0.30, 3),
    (0.15, 2),
];

/// Estimate the star count from how wide the bright star glyphs spread across the star row.
/// The region is clamped to the image rather than rejected.
pub fn count_stars(image: &RgbaImage, cell: &Bounds) -> Outcome<u8> {
    let region = region_in_cell(cell, &ratios::STAR_ROW);
    let Some(strip) = crop_clamped(image, &region) else {
        return Outcome::failed("star row outside image");
    };

    let gray = image::imageops::grayscale(&strip);
    let (w, h) = gray.dimensions();

    let is_bright_col = |x: u32| (0..h).any(|y| gray.get_pixel(x, y)[0] > BRIGHT_THRESHOLD);
    let left = (0..w).find(|&x| is_bright_col(x));
    let right = (0..w).rev().find(|&x| is_bright_col(x));

    let content_width = match (left, right) {
        (Some(l), Some(r)) => r - l,
        _ => 0,
    };
    let ratio = content_width as f64 / w as f64;
    let stars = stars_for_ratio(ratio);

    debug!(
        "Stars at ({:.0},{:.0}): span {}/{} -> {}",
        cell.x, cell.y, content_width, w, stars
    );

    Outcome {
        result: Classification::Found(stars),
        debug: Some(CellDebug::Star {
            ratio,
            content_width,
        }),
    }
}

pub fn stars_for_ratio(ratio: f64) -> u8 {
    STAR_LADDER
        .iter()
        .find(|(cutoff, _)| ratio > *cutoff)
        .map_or(1, |&(_, stars)| stars)
}

/// Collapse a star classification: anything but a found value becomes the fallback.
pub fn stars_or_fallback(result: Classification<u8>) -> u8 {
    match result {
        Classification::Found(stars) => stars,
        Classification::NotFound | Classification::Failed(_) => FALLBACK_STARS,
    }
}
