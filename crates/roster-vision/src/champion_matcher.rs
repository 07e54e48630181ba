use anyhow::{Context, Result};
use image::RgbaImage;
use roster_state::{Bounds, CellDebug};
use std::sync::Arc;
use tracing::debug;

use crate::classify::{Classification, Outcome};
use crate::phash::{block_hash, hash_distance};
use crate::regions::{crop_clamped, crop_strict, ratios, region_in_cell};

/// Standard size for portrait hashing (both references and crops are resized to this)
pub const PORTRAIT_SIZE: u32 = 128;

/// Largest hash distance (in bits) still accepted as a champion match
pub const MAX_HASH_DISTANCE: u32 = 20;

/// Reference portrait, cropped, resized and hashed
#[derive(Debug, Clone)]
pub struct ProcessedReference {
    pub hash: String,
    pub portrait: Arc<RgbaImage>,
}

impl ProcessedReference {
    /// Build from an image that already shows only the portrait.
    pub fn from_portrait(portrait: &RgbaImage) -> Self {
        let resized = resize_portrait(portrait);
        Self {
            hash: block_hash(&resized),
            portrait: Arc::new(resized),
        }
    }
}

/// Decode a downloaded reference image, crop its portrait area, resize and hash it.
pub fn process_reference(raw: &[u8]) -> Result<ProcessedReference> {
    let img = image::load_from_memory(raw)
        .context("Failed to decode reference image")?
        .to_rgba8();
    let full = Bounds::new(0.0, 0.0, img.width() as f64, img.height() as f64);
    let region = region_in_cell(&full, &ratios::REFERENCE_PORTRAIT);
    let portrait = crop_clamped(&img, &region).context("Reference image is empty")?;
    Ok(ProcessedReference::from_portrait(&portrait))
}

fn resize_portrait(img: &RgbaImage) -> RgbaImage {
    image::imageops::resize(
        img,
        PORTRAIT_SIZE,
        PORTRAIT_SIZE,
        image::imageops::FilterType::Triangle,
    )
}

/// Match a cell's portrait against reference portraits by perceptual hash distance.
/// Returns the best match within `MAX_HASH_DISTANCE`; a portrait region reaching
/// outside the image yields no result.
pub fn match_champion<'a, I>(image: &RgbaImage, cell: &Bounds, candidates: I) -> Outcome<String>
where
    I: IntoIterator<Item = (&'a str, &'a ProcessedReference)>,
{
    let region = region_in_cell(cell, &ratios::PORTRAIT);
    let Some(crop) = crop_strict(image, &region) else {
        return Outcome::failed("portrait region outside image");
    };
    let hash = block_hash(&resize_portrait(&crop));

    let mut best: Option<(&'a str, &'a ProcessedReference, u32)> = None;
    for (name, reference) in candidates {
        let distance = hash_distance(&hash, &reference.hash);
        if best.map_or(true, |(_, _, d)| distance < d) {
            best = Some((name, reference, distance));
        }
    }

    let Some((name, reference, distance)) = best else {
        return Outcome {
            result: Classification::NotFound,
            debug: None,
        };
    };

    debug!(
        "Champion at ({:.0},{:.0}): best {} (distance {})",
        cell.x, cell.y, name, distance
    );

    let result = if distance <= MAX_HASH_DISTANCE {
        Classification::Found(name.to_string())
    } else {
        Classification::NotFound
    };

    Outcome {
        result,
        debug: Some(CellDebug::Champion {
            best_match: Some(name.to_string()),
            min_distance: distance,
            thumbnail: Some(reference.portrait.clone()),
        }),
    }
}
