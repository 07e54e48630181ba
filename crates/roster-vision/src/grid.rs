use regex::Regex;
use roster_state::{Bounds, CellDimensions, GridCell, RosterGrid};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::debug;

/// Power ratings are 4-6 digit numbers; anything at or below this is a rank, sig level or stray digit.
pub const MIN_POWER_RATING: u32 = 300;

/// Anchors further apart than this start a new column. Fixed in pixels, not scaled to the image.
pub const COLUMN_TOLERANCE_PX: f64 = 50.0;

/// Column count assumed when fewer than two columns were detected
const DEFAULT_COLUMN_COUNT: f64 = 7.0;

/// An icon glyph fused with the number is roughly square, so its width is
/// approximated by the text box height times this factor.
const ICON_SHIFT_RATIO: f64 = 1.15;

const CELL_WIDTH_RATIO: f64 = 0.93;
const CELL_HEIGHT_RATIO: f64 = 1.16;
const CELL_X_OFFSET_RATIO: f64 = 0.20;
const CELL_Y_OFFSET_RATIO: f64 = 0.065;

/// Rank/sig labels must be centred within this fraction of the cell width from the power rating.
const LABEL_ALIGN_RATIO: f64 = 0.6;
/// Rank/sig labels must end below this fraction of the cell height.
const LABEL_TOP_RATIO: f64 = 0.2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// One text run reported by the text-detection service.
/// By convention the first detection of a batch spans the whole image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextDetection {
    #[serde(alias = "description")]
    pub text: String,
    #[serde(alias = "vertices")]
    pub quad: [Vertex; 4],
}

impl TextDetection {
    /// Axis-aligned box of (x0, y0)-(x1, y1)
    pub fn from_rect(text: impl Into<String>, x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            text: text.into(),
            quad: [
                Vertex { x: x0, y: y0 },
                Vertex { x: x1, y: y0 },
                Vertex { x: x1, y: y1 },
                Vertex { x: x0, y: y1 },
            ],
        }
    }

    /// Axis-aligned bounding box of the quad
    pub fn bounds(&self) -> Bounds {
        let min_x = self.quad.iter().map(|v| v.x).fold(f64::INFINITY, f64::min);
        let max_x = self.quad.iter().map(|v| v.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = self.quad.iter().map(|v| v.y).fold(f64::INFINITY, f64::min);
        let max_y = self.quad.iter().map(|v| v.y).fold(f64::NEG_INFINITY, f64::max);
        Bounds::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("No power ratings found to anchor grid")]
    NoPowerRatings,
}

#[derive(Debug, Clone)]
struct Candidate {
    power_rating: u32,
    pi_bounds: Bounds,
    anchor_x: f64,
}

/// Numeric value of a text run after dropping every non-digit; 0 if nothing is left.
/// Saturates at `u32::MAX` instead of overflowing.
pub fn parse_power_rating(text: &str) -> u32 {
    text.chars()
        .filter_map(|c| c.to_digit(10))
        .fold(0u32, |acc, d| acc.saturating_mul(10).saturating_add(d))
}

pub fn is_power_rating(text: &str) -> bool {
    parse_power_rating(text) > MIN_POWER_RATING
}

/// Left edge of the power-rating text, shifted past a class icon that OCR fused onto the number.
fn anchor_x(detection: &TextDetection, bounds: &Bounds) -> f64 {
    let has_prefix = detection
        .text
        .trim()
        .chars()
        .next()
        .is_some_and(|c| !c.is_ascii_digit());
    if has_prefix {
        bounds.x + bounds.height * ICON_SHIFT_RATIO
    } else {
        bounds.x
    }
}

fn find_candidates(detections: &[TextDetection]) -> Vec<Candidate> {
    detections
        .iter()
        .skip(1)
        .filter_map(|d| {
            if !is_power_rating(&d.text) {
                return None;
            }
            let power_rating = parse_power_rating(&d.text);
            let pi_bounds = d.bounds();
            Some(Candidate {
                power_rating,
                anchor_x: anchor_x(d, &pi_bounds),
                pi_bounds,
            })
        })
        .collect()
}

/// Group anchors into columns. A new column starts when an anchor is more than
/// `tolerance` past the last accepted column, not the previous raw anchor.
pub fn cluster_columns(anchors: &[f64], tolerance: f64) -> Vec<f64> {
    let mut sorted = anchors.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut columns: Vec<f64> = Vec::new();
    for x in sorted {
        match columns.last() {
            Some(&last) if x - last <= tolerance => {}
            _ => columns.push(x),
        }
    }
    columns
}

fn column_spacing(columns: &[f64], image_width: u32) -> f64 {
    match (columns.first(), columns.last()) {
        (Some(first), Some(last)) if columns.len() >= 2 => {
            (last - first) / (columns.len() - 1) as f64
        }
        _ => image_width as f64 / DEFAULT_COLUMN_COUNT,
    }
}

fn rank_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)rank\s*(\d+)").ok()).as_ref()
}

fn sig_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)sig[.\s]*(\d+)").ok()).as_ref()
}

fn capture_number(re: Option<&Regex>, text: &str) -> Option<u32> {
    re?.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Rank and sig level from the text sitting above the power rating inside the cell.
fn extract_labels(
    detections: &[TextDetection],
    cell: &Bounds,
    pi_bounds: &Bounds,
) -> (Option<u32>, Option<u32>) {
    let pi_center = pi_bounds.center_x();
    let min_bottom = cell.y + cell.height * LABEL_TOP_RATIO;

    let text = detections
        .iter()
        .filter(|d| {
            let b = d.bounds();
            (b.center_x() - pi_center).abs() < cell.width * LABEL_ALIGN_RATIO
                && b.bottom() > min_bottom
                && b.bottom() < pi_bounds.y
        })
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    (
        capture_number(rank_regex(), &text),
        capture_number(sig_regex(), &text),
    )
}

/// Row-major order: cells whose tops are within half a cell height share a row.
fn sort_row_major(cells: Vec<GridCell>, cell_height: f64) -> Vec<GridCell> {
    let mut by_y = cells;
    by_y.sort_by(|a, b| a.bounds().y.total_cmp(&b.bounds().y));

    let mut rows: Vec<Vec<GridCell>> = Vec::new();
    for cell in by_y {
        match rows.last_mut() {
            Some(row) if cell.bounds().y - row[0].bounds().y <= cell_height / 2.0 => {
                row.push(cell)
            }
            _ => rows.push(vec![cell]),
        }
    }

    rows.into_iter()
        .flat_map(|mut row| {
            row.sort_by(|a, b| a.bounds().x.total_cmp(&b.bounds().x));
            row
        })
        .collect()
}

/// Infer the roster grid from the power-rating labels among the OCR detections.
///
/// `image_width` is only used when fewer than two columns could be told apart.
pub fn estimate_grid(
    detections: &[TextDetection],
    image_width: u32,
) -> Result<RosterGrid, GridError> {
    let candidates = find_candidates(detections);
    if candidates.is_empty() {
        return Err(GridError::NoPowerRatings);
    }

    let anchors: Vec<f64> = candidates.iter().map(|c| c.anchor_x).collect();
    let columns = cluster_columns(&anchors, COLUMN_TOLERANCE_PX);
    let avg_column_spacing = column_spacing(&columns, image_width);

    let cell_dimensions = CellDimensions {
        width: avg_column_spacing * CELL_WIDTH_RATIO,
        height: avg_column_spacing * CELL_HEIGHT_RATIO,
    };

    debug!(
        "Grid: {} power rating(s), {} column(s), spacing {:.1}px, cell {:.0}x{:.0}",
        candidates.len(),
        columns.len(),
        avg_column_spacing,
        cell_dimensions.width,
        cell_dimensions.height
    );

    let cells = candidates
        .iter()
        .map(|c| {
            let bounds = Bounds {
                x: c.anchor_x - avg_column_spacing * CELL_X_OFFSET_RATIO,
                y: c.pi_bounds.bottom() - cell_dimensions.height
                    + cell_dimensions.height * CELL_Y_OFFSET_RATIO,
                width: cell_dimensions.width,
                height: cell_dimensions.height,
            };
            let (rank, sig_level) = extract_labels(detections, &bounds, &c.pi_bounds);

            let mut cell = GridCell::new(bounds, c.pi_bounds, c.power_rating);
            cell.rank = rank;
            cell.sig_level = sig_level;
            cell
        })
        .collect();

    Ok(RosterGrid {
        cells: sort_row_major(cells, cell_dimensions.height),
        avg_column_spacing,
        cell_dimensions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_block() -> TextDetection {
        TextDetection::from_rect("everything", 0.0, 0.0, 700.0, 900.0)
    }

    #[test]
    fn test_candidate_filtering() {
        assert!(is_power_rating("4523"));
        assert!(is_power_rating("T12,345"));
        assert!(is_power_rating("301"));
        assert!(!is_power_rating("300"));
        assert!(!is_power_rating("Rank 5"));
        assert!(!is_power_rating("Sig"));
        assert!(!is_power_rating(""));
        assert_eq!(parse_power_rating("abc"), 0);
    }

    #[test]
    fn test_label_regexes_compile() {
        assert_eq!(capture_number(rank_regex(), "RANK 5"), Some(5));
        assert_eq!(capture_number(sig_regex(), "Sig. 120"), Some(120));
        assert_eq!(capture_number(None, "Rank 5"), None);
    }

    #[test]
    fn test_long_digit_runs_saturate() {
        assert_eq!(parse_power_rating("4294967295"), u32::MAX);
        assert_eq!(parse_power_rating("123456789012345678901"), u32::MAX);
        assert!(is_power_rating("123456789012345678901"));

        let detections = vec![
            full_block(),
            TextDetection::from_rect("123456789012345678901", 400.0, 300.0, 500.0, 340.0),
        ];
        let grid = estimate_grid(&detections, 700).unwrap();
        assert_eq!(grid.cells.len(), 1);
        assert_eq!(grid.cells[0].power_rating(), u32::MAX);
    }

    #[test]
    fn test_first_detection_is_never_a_candidate() {
        let detections = vec![TextDetection::from_rect("98765", 0.0, 0.0, 700.0, 900.0)];
        assert!(matches!(
            estimate_grid(&detections, 700),
            Err(GridError::NoPowerRatings)
        ));
    }

    #[test]
    fn test_cluster_columns() {
        let columns = cluster_columns(&[302.0, 100.0, 500.0, 105.0, 300.0], 50.0);
        assert_eq!(columns, vec![100.0, 300.0, 500.0]);
    }

    #[test]
    fn test_cluster_columns_against_accepted_column() {
        // 160 is within 50 of the raw anchor 140 but not of the accepted column at 100
        let columns = cluster_columns(&[100.0, 140.0, 160.0], 50.0);
        assert_eq!(columns, vec![100.0, 160.0]);
    }

    #[test]
    fn test_single_clean_cell() {
        let detections = vec![
            full_block(),
            TextDetection::from_rect("4523", 400.0, 300.0, 500.0, 340.0),
        ];
        let grid = estimate_grid(&detections, 700).unwrap();

        assert_eq!(grid.avg_column_spacing, 100.0);
        assert_eq!(grid.cells.len(), 1);
        let cell = &grid.cells[0];
        assert_eq!(cell.power_rating(), 4523);
        assert_eq!(cell.rank, None);
        assert_eq!(cell.sig_level, None);

        let b = cell.bounds();
        assert!((b.width - 93.0).abs() < 1e-9);
        assert!((b.height - 116.0).abs() < 1e-9);
        assert!((b.x - 380.0).abs() < 1e-9);
        assert!((b.y - (340.0 - 116.0 + 116.0 * 0.065)).abs() < 1e-9);
        assert_eq!(*cell.pi_bounds(), Bounds::new(400.0, 300.0, 100.0, 40.0));
    }

    #[test]
    fn test_icon_prefixed_text_shifts_anchor() {
        let detections = vec![
            full_block(),
            TextDetection::from_rect("T4523", 400.0, 300.0, 500.0, 340.0),
        ];
        let grid = estimate_grid(&detections, 700).unwrap();
        let cell = &grid.cells[0];
        assert_eq!(cell.power_rating(), 4523);
        // anchor 400 + 40 * 1.15 = 446, cell starts 0.2 * spacing left of it
        assert!((cell.bounds().x - (446.0 - 20.0)).abs() < 1e-9);
    }

    #[test]
    fn test_rank_and_sig_extraction() {
        let detections = vec![
            full_block(),
            TextDetection::from_rect("4523", 400.0, 300.0, 500.0, 340.0),
            TextDetection::from_rect("Rank 3", 400.0, 260.0, 470.0, 278.0),
            TextDetection::from_rect("SIG. 40", 410.0, 280.0, 480.0, 296.0),
            // too high: ends above the top fifth of the cell
            TextDetection::from_rect("Rank 9", 400.0, 200.0, 470.0, 240.0),
            // too far sideways
            TextDetection::from_rect("Sig 99", 600.0, 270.0, 680.0, 290.0),
        ];
        let grid = estimate_grid(&detections, 700).unwrap();
        let cell = &grid.cells[0];
        assert_eq!(cell.rank, Some(3));
        assert_eq!(cell.sig_level, Some(40));
    }

    #[test]
    fn test_row_major_order() {
        let detections = vec![
            full_block(),
            TextDetection::from_rect("5000", 300.0, 460.0, 380.0, 490.0),
            TextDetection::from_rect("4000", 100.0, 465.0, 180.0, 495.0),
            TextDetection::from_rect("2000", 300.0, 200.0, 380.0, 230.0),
            TextDetection::from_rect("1000", 100.0, 205.0, 180.0, 235.0),
        ];
        let grid = estimate_grid(&detections, 700).unwrap();

        assert_eq!(grid.avg_column_spacing, 200.0);
        let ratings: Vec<u32> = grid.cells.iter().map(|c| c.power_rating()).collect();
        assert_eq!(ratings, vec![1000, 2000, 4000, 5000]);
    }

    #[test]
    fn test_detection_deserialize() {
        let json = r#"{"description": "Rank 4", "vertices": [
            {"x": 1, "y": 2}, {"x": 10}, {"x": 10, "y": 12}, {"y": 12}
        ]}"#;
        let d: TextDetection = serde_json::from_str(json).unwrap();
        assert_eq!(d.text, "Rank 4");
        assert_eq!(d.bounds(), Bounds::new(0.0, 0.0, 10.0, 12.0));
    }
}
