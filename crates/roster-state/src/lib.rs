use image::RgbaImage;
use roster_data::ChampionClass;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Axis-aligned rectangle in source-image pixel space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }
}

/// Width and height shared by every cell of a grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CellDimensions {
    pub width: f64,
    pub height: f64,
}

/// Diagnostics attached to a cell by one classifier. Only the debug renderer reads these.
#[derive(Debug, Clone)]
pub enum CellDebug {
    Class {
        best_match: Option<ChampionClass>,
        min_rmse: f64,
        thumbnail: Option<Arc<RgbaImage>>,
    },
    Star {
        ratio: f64,
        content_width: u32,
    },
    Ascension {
        avg_color: [f64; 3],
        hsl: [f64; 3],
    },
    Champion {
        best_match: Option<String>,
        min_distance: u32,
        thumbnail: Option<Arc<RgbaImage>>,
    },
}

/// One champion card of the roster grid.
///
/// Geometry and power rating are fixed at creation; every other field starts
/// empty and is filled in at most once by the classifiers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridCell {
    bounds: Bounds,
    pi_bounds: Bounds,
    power_rating: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sig_level: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stars: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_ascended: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<ChampionClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub champion_name: Option<String>,
    #[serde(skip)]
    pub debug: Vec<CellDebug>,
}

impl GridCell {
    pub fn new(bounds: Bounds, pi_bounds: Bounds, power_rating: u32) -> Self {
        Self {
            bounds,
            pi_bounds,
            power_rating,
            rank: None,
            sig_level: None,
            stars: None,
            is_ascended: None,
            class: None,
            champion_name: None,
            debug: Vec::new(),
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Bounding box of the power-rating text this cell was anchored on
    pub fn pi_bounds(&self) -> &Bounds {
        &self.pi_bounds
    }

    pub fn power_rating(&self) -> u32 {
        self.power_rating
    }

    pub fn class_debug(&self) -> Option<&CellDebug> {
        self.debug.iter().find(|d| matches!(d, CellDebug::Class { .. }))
    }

    pub fn champion_debug(&self) -> Option<&CellDebug> {
        self.debug
            .iter()
            .find(|d| matches!(d, CellDebug::Champion { .. }))
    }
}

/// Grid geometry inferred from the power-rating labels, cells in row-major order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterGrid {
    pub cells: Vec<GridCell>,
    pub avg_column_spacing: f64,
    pub cell_dimensions: CellDimensions,
}
