use image::RgbaImage;
use roster_data::ChampionClass;
use roster_state::{Bounds, CellDebug};
use std::sync::Arc;
use tracing::debug;

use crate::class_icons::{normalize_icon, ClassIconBank};
use crate::classify::{Classification, Outcome};
use crate::metrics::rmse;
use crate::regions::{crop_strict, ratios, region_in_cell};

/// Largest RMSE still accepted as a class match
pub const MAX_CLASS_RMSE: f64 = 80.0;

/// Identify the class icon of a cell by RMSE against the icon bank.
/// A class region reaching outside the image yields no result.
pub fn match_class(
    image: &RgbaImage,
    cell: &Bounds,
    bank: &ClassIconBank,
) -> Outcome<ChampionClass> {
    let region = region_in_cell(cell, &ratios::CLASS_ICON);
    let Some(crop) = crop_strict(image, &region) else {
        return Outcome::failed("class icon region outside image");
    };
    let icon = normalize_icon(&crop);

    let mut best: Option<(ChampionClass, f64)> = None;
    for (class, reference) in bank.iter() {
        let score = rmse(icon.as_raw(), reference.as_raw());
        if best.map_or(true, |(_, s)| score < s) {
            best = Some((class, score));
        }
    }

    debug!("Class match at ({:.0},{:.0}): {:?}", cell.x, cell.y, best);

    Outcome {
        result: accept_class(best),
        debug: Some(CellDebug::Class {
            best_match: best.map(|(c, _)| c),
            min_rmse: best.map_or(f64::INFINITY, |(_, s)| s),
            thumbnail: Some(Arc::new(icon)),
        }),
    }
}

/// Apply the RMSE acceptance threshold to the best bank match.
pub fn accept_class(best: Option<(ChampionClass, f64)>) -> Classification<ChampionClass> {
    match best {
        Some((class, score)) if score <= MAX_CLASS_RMSE => Classification::Found(class),
        _ => Classification::NotFound,
    }
}
