use image::RgbaImage;
use roster_state::Bounds;

/// Sub-rectangle of a cell expressed as fractions of the cell's width and height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellRatio {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Well-known regions inside a roster card. All values are empirical and tunable.
pub mod ratios {
    use super::CellRatio;

    /// Class icon, just left of the power rating at the bottom of the card.
    pub const CLASS_ICON: CellRatio = CellRatio {
        x: 0.06,
        y: 0.82,
        width: 0.15,
        height: 0.13,
    };

    /// Row of star glyphs above the power rating.
    pub const STAR_ROW: CellRatio = CellRatio {
        x: 0.10,
        y: 0.70,
        width: 0.80,
        height: 0.08,
    };

    /// Ascension badge in the top-right corner.
    pub const ASCENSION_ICON: CellRatio = CellRatio {
        x: 0.78,
        y: 0.02,
        width: 0.16,
        height: 0.08,
    };

    /// Champion portrait.
    pub const PORTRAIT: CellRatio = CellRatio {
        x: 0.08,
        y: 0.12,
        width: 0.84,
        height: 0.56,
    };

    /// Portrait area of a catalog reference image (relative to the whole reference image).
    pub const REFERENCE_PORTRAIT: CellRatio = CellRatio {
        x: 0.10,
        y: 0.05,
        width: 0.80,
        height: 0.80,
    };
}

/// Absolute pixel rectangle of a ratio region inside a cell
pub fn region_in_cell(cell: &Bounds, ratio: &CellRatio) -> Bounds {
    Bounds {
        x: cell.x + cell.width * ratio.x,
        y: cell.y + cell.height * ratio.y,
        width: cell.width * ratio.width,
        height: cell.height * ratio.height,
    }
}

/// Crop `rect` from the image only if it lies entirely inside it.
pub fn crop_strict(img: &RgbaImage, rect: &Bounds) -> Option<RgbaImage> {
    let (w, h) = (img.width() as f64, img.height() as f64);
    if rect.x < 0.0 || rect.y < 0.0 || rect.right() > w || rect.bottom() > h {
        return None;
    }

    let x = rect.x.floor() as u32;
    let y = rect.y.floor() as u32;
    let rw = (rect.width.round() as u32).min(img.width() - x);
    let rh = (rect.height.round() as u32).min(img.height() - y);
    if rw == 0 || rh == 0 {
        return None;
    }

    Some(image::imageops::crop_imm(img, x, y, rw, rh).to_image())
}

/// Crop `rect` after clamping it to the image bounds.
/// Returns `None` when nothing of the rectangle is left.
pub fn crop_clamped(img: &RgbaImage, rect: &Bounds) -> Option<RgbaImage> {
    let (w, h) = (img.width() as f64, img.height() as f64);
    let x0 = rect.x.max(0.0).min(w);
    let y0 = rect.y.max(0.0).min(h);
    let x1 = rect.right().max(0.0).min(w);
    let y1 = rect.bottom().max(0.0).min(h);

    let x = x0.floor() as u32;
    let y = y0.floor() as u32;
    let rw = (x1 - x0).round() as u32;
    let rh = (y1 - y0).round() as u32;
    let rw = rw.min(img.width().saturating_sub(x));
    let rh = rh.min(img.height().saturating_sub(y));
    if rw == 0 || rh == 0 {
        return None;
    }

    Some(image::imageops::crop_imm(img, x, y, rw, rh).to_image())
}
