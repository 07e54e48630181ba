use image::RgbaImage;
use roster_state::{Bounds, CellDebug};
use tracing::debug;

use crate::classify::{Classification, Outcome};
use crate::metrics::rgb_to_hsl;
use crate::regions::{crop_clamped, ratios, region_in_cell};

/// Hue window (degrees) of the gold ascension badge
const GOLD_HUE: std::ops::RangeInclusive<f64> = 25.0..=65.0;
const MIN_SATURATION: f64 = 0.20;
const MIN_LIGHTNESS: f64 = 0.20;

/// Detect the gold ascension badge from the mean colour of the badge region.
pub fn detect_ascension(image: &RgbaImage, cell: &Bounds) -> Outcome<bool> {
    let region = region_in_cell(cell, &ratios::ASCENSION_ICON);
    let Some(badge) = crop_clamped(image, &region) else {
        return Outcome::failed("ascension region outside image");
    };

    let avg = mean_rgb(&badge);
    let (h, s, l) = rgb_to_hsl(avg[0], avg[1], avg[2]);
    let ascended = is_gold(h, s, l);

    debug!(
        "Ascension at ({:.0},{:.0}): hsl({:.0}, {:.2}, {:.2}) -> {}",
        cell.x, cell.y, h, s, l, ascended
    );

    Outcome {
        result: Classification::Found(ascended),
        debug: Some(CellDebug::Ascension {
            avg_color: avg,
            hsl: [h, s, l],
        }),
    }
}

pub fn is_gold(hue: f64, saturation: f64, lightness: f64) -> bool {
    GOLD_HUE.contains(&hue) && saturation > MIN_SATURATION && lightness > MIN_LIGHTNESS
}

/// Collapse an ascension classification: unknown means not ascended.
pub fn ascended_or_default(result: Classification<bool>) -> bool {
    result.into_option().unwrap_or(false)
}

fn mean_rgb(img: &RgbaImage) -> [f64; 3] {
    let n = (img.width() * img.height()) as f64;
    let mut sum = [0.0f64; 3];
    for px in img.pixels() {
        for c in 0..3 {
            sum[c] += px[c] as f64;
        }
    }
    if n == 0.0 {
        return sum;
    }
    sum.map(|v| v / n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_gold_badge() {
        let image = RgbaImage::from_pixel(100, 100, Rgba([255, 200, 50, 255]));
        let cell = Bounds::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(
            detect_ascension(&image, &cell).result,
            Classification::Found(true)
        );
    }

    #[test]
    fn test_gray_card() {
        let image = RgbaImage::from_pixel(100, 100, Rgba([128, 128, 128, 255]));
        let cell = Bounds::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(
            detect_ascension(&image, &cell).result,
            Classification::Found(false)
        );
    }

    #[test]
    fn test_blue_badge_is_not_gold() {
        assert!(!is_gold(220.0, 0.8, 0.5));
        assert!(!is_gold(45.0, 0.1, 0.5));
        assert!(!is_gold(45.0, 0.8, 0.1));
        assert!(is_gold(45.0, 0.8, 0.5));
    }

    #[test]
    fn test_default_on_failure() {
        let image = RgbaImage::new(10, 10);
        let cell = Bounds::new(100.0, 100.0, 50.0, 50.0);
        let outcome = detect_ascension(&image, &cell);
        assert!(matches!(outcome.result, Classification::Failed(_)));
        assert!(!ascended_or_default(outcome.result));
    }
}
