use image::RgbaImage;
use roster_data::{ChampionCatalog, ChampionClass};
use roster_state::{CellDimensions, GridCell};
use roster_vision::star_counter::FALLBACK_STARS;
use roster_vision::{
    ascended_or_default, count_stars, detect_ascension, draw_debug_image, estimate_grid,
    match_champion, match_class, stars_or_fallback, ClassIconBank,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::catalog_cache::{RawImageStore, ReferenceCatalog, ReferenceEntry};
use crate::config::ScannerConfig;
use crate::error::ScanError;
use crate::fetch::ImageFetcher;
use crate::ocr::TextDetector;

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    pub debug_mode: bool,
}

/// Recognized roster grid, plus the debug overlay when requested
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanOutput {
    pub grid: Vec<GridCell>,
    pub cell_dimensions: CellDimensions,
    #[serde(skip)]
    pub debug_image: Option<Vec<u8>>,
}

/// Long-lived recognition service: owns the class icons and the reference
/// portrait cache, and runs screenshots through OCR → grid → classifiers.
pub struct RosterScanner<D, C, F> {
    detector: D,
    icons: Arc<ClassIconBank>,
    references: Arc<ReferenceCatalog<C, F>>,
    ocr_timeout: Duration,
}

impl<D, C, F> RosterScanner<D, C, F>
where
    D: TextDetector,
    C: ChampionCatalog + 'static,
    F: ImageFetcher + 'static,
{
    /// Load the class icons and prepare the reference cache directory.
    /// Must complete before the first `process` call.
    pub async fn initialize(
        config: &ScannerConfig,
        detector: D,
        catalog: C,
        fetcher: F,
    ) -> anyhow::Result<Self> {
        let icons_dir: PathBuf = config.class_icons_dir();
        let icons = tokio::task::spawn_blocking(move || ClassIconBank::load(&icons_dir)).await?;

        let store = RawImageStore::new(&config.cache_dir);
        store.ensure_dir().await?;
        let references = ReferenceCatalog::new(catalog, fetcher, store, config.download_timeout());

        info!(
            "Roster scanner ready: {} class icon(s), cache at {}",
            icons.len(),
            config.cache_dir.display()
        );

        Ok(Self::from_parts(
            detector,
            icons,
            Arc::new(references),
            config.ocr_timeout(),
        ))
    }

    pub fn from_parts(
        detector: D,
        icons: ClassIconBank,
        references: Arc<ReferenceCatalog<C, F>>,
        ocr_timeout: Duration,
    ) -> Self {
        Self {
            detector,
            icons: Arc::new(icons),
            references,
            ocr_timeout,
        }
    }

    pub fn references(&self) -> &Arc<ReferenceCatalog<C, F>> {
        &self.references
    }

    /// Recognize every champion cell of a roster screenshot.
    ///
    /// Fails only when the screenshot has no text or no power ratings at all;
    /// per-cell problems leave the affected fields empty or at their defaults.
    pub async fn process(
        &self,
        image_bytes: &[u8],
        options: ScanOptions,
    ) -> Result<ScanOutput, ScanError> {
        let started = Instant::now();

        let detect = self.detector.detect_text(image_bytes);
        let detections = tokio::time::timeout(self.ocr_timeout, detect)
            .await
            .map_err(|_| ScanError::Timeout(self.ocr_timeout))?
            .map_err(ScanError::Ocr)?;
        if detections.is_empty() {
            return Err(ScanError::NoTextDetected);
        }
        debug!("OCR returned {} detection(s)", detections.len());

        let bytes = image_bytes.to_vec();
        let image: Arc<RgbaImage> = Arc::new(
            tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
                .await??
                .to_rgba8(),
        );

        let grid = estimate_grid(&detections, image.width())?;
        let cell_dimensions = grid.cell_dimensions;
        let mut cells = grid.cells;

        self.classify_cells(&image, &mut cells).await;

        let classes: BTreeSet<ChampionClass> = cells.iter().filter_map(|c| c.class).collect();
        let references = self.prefetch_references(&classes).await;

        self.identify_champions(&image, &mut cells, &references).await;

        let debug_image = if options.debug_mode {
            self.render_debug(image_bytes, &cells, cell_dimensions).await
        } else {
            None
        };

        info!(
            "Processed roster: {} cell(s), {} classified, {} identified in {:?}",
            cells.len(),
            cells.iter().filter(|c| c.class.is_some()).count(),
            cells.iter().filter(|c| c.champion_name.is_some()).count(),
            started.elapsed()
        );

        Ok(ScanOutput {
            grid: cells,
            cell_dimensions,
            debug_image,
        })
    }

    /// Class, stars and ascension for every cell, all cells in parallel.
    async fn classify_cells(&self, image: &Arc<RgbaImage>, cells: &mut [GridCell]) {
        let handles: Vec<_> = cells
            .iter()
            .map(|cell| {
                let image = Arc::clone(image);
                let icons = Arc::clone(&self.icons);
                let bounds = *cell.bounds();
                tokio::task::spawn_blocking(move || {
                    (
                        match_class(&image, &bounds, &icons),
                        count_stars(&image, &bounds),
                        detect_ascension(&image, &bounds),
                    )
                })
            })
            .collect();

        for (cell, handle) in cells.iter_mut().zip(handles) {
            match handle.await {
                Ok((class, stars, ascension)) => {
                    cell.class = class.result.into_option();
                    cell.stars = Some(stars_or_fallback(stars.result));
                    cell.is_ascended = Some(ascended_or_default(ascension.result));
                    let debug = [class.debug, stars.debug, ascension.debug];
                    cell.debug.extend(debug.into_iter().flatten());
                }
                Err(e) => {
                    warn!("Classification task failed for cell at {:?}: {}", cell.bounds(), e);
                    cell.stars = Some(FALLBACK_STARS);
                    cell.is_ascended = Some(false);
                }
            }
        }
    }

    /// Reference portraits for each distinct class, one lookup per class, all classes in parallel.
    async fn prefetch_references(
        &self,
        classes: &BTreeSet<ChampionClass>,
    ) -> HashMap<ChampionClass, Arc<Vec<Arc<ReferenceEntry>>>> {
        let handles: Vec<_> = classes
            .iter()
            .map(|&class| {
                let references = Arc::clone(&self.references);
                (
                    class,
                    tokio::spawn(async move { references.get_by_class(class).await }),
                )
            })
            .collect();

        let mut by_class = HashMap::new();
        for (class, handle) in handles {
            let entries = match handle.await {
                Ok(Ok(entries)) => entries,
                Ok(Err(e)) => {
                    warn!("Reference lookup for {} failed: {:#}", class, e);
                    Vec::new()
                }
                Err(e) => {
                    warn!("Reference task for {} failed: {}", class, e);
                    Vec::new()
                }
            };
            by_class.insert(class, Arc::new(entries));
        }
        by_class
    }

    /// Champion identity for every cell with a known class, all cells in parallel.
    async fn identify_champions(
        &self,
        image: &Arc<RgbaImage>,
        cells: &mut [GridCell],
        references: &HashMap<ChampionClass, Arc<Vec<Arc<ReferenceEntry>>>>,
    ) {
        let handles: Vec<_> = cells
            .iter()
            .map(|cell| {
                let entries = cell.class.and_then(|class| references.get(&class)).cloned()?;
                let image = Arc::clone(image);
                let bounds = *cell.bounds();
                Some(tokio::task::spawn_blocking(move || {
                    match_champion(
                        &image,
                        &bounds,
                        entries.iter().map(|e| (e.name(), &e.reference)),
                    )
                }))
            })
            .collect();

        for (cell, handle) in cells.iter_mut().zip(handles) {
            let Some(handle) = handle else {
                continue;
            };
            match handle.await {
                Ok(outcome) => {
                    if let Some(name) = outcome.result.into_option() {
                        cell.champion_name = Some(name);
                    }
                    cell.debug.extend(outcome.debug);
                }
                Err(e) => warn!("Champion task failed for cell at {:?}: {}", cell.bounds(), e),
            }
        }
    }

    async fn render_debug(
        &self,
        image_bytes: &[u8],
        cells: &[GridCell],
        cell_dimensions: CellDimensions,
    ) -> Option<Vec<u8>> {
        let bytes = image_bytes.to_vec();
        let cells = cells.to_vec();
        let rendered = tokio::task::spawn_blocking(move || {
            draw_debug_image(&bytes, &cells, &cell_dimensions)
        })
        .await;

        match rendered {
            Ok(Ok(png)) => Some(png),
            Ok(Err(e)) => {
                warn!("Debug rendering failed: {:#}", e);
                None
            }
            Err(e) => {
                warn!("Debug rendering task failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::RecordedDetections;
    use anyhow::{anyhow, Result};
    use image::Rgba;
    use roster_data::{ChampionImages, ChampionRecord, JsonCatalog};
    use roster_state::Bounds;
    use roster_vision::regions::{ratios, region_in_cell};
    use roster_vision::TextDetection;
    use std::io::Cursor;
    use std::sync::Mutex;

    const TECH_BLUE: [u8; 3] = [40, 80, 220];
    const MUTANT_YELLOW: [u8; 3] = [230, 200, 30];

    struct MapFetcher(HashMap<String, Vec<u8>>);

    impl ImageFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.0.get(url).cloned().ok_or_else(|| anyhow!("404 {}", url))
        }
    }

    struct SlowDetector;

    impl TextDetector for SlowDetector {
        async fn detect_text(&self, _image: &[u8]) -> Result<Vec<TextDetection>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }
    }

    fn checker(u: f64, v: f64, invert: bool) -> Rgba<u8> {
        let on = ((u * 8.0) as u32 + (v * 8.0) as u32) % 2 == 0;
        if on != invert {
            Rgba([230, 180, 60, 255])
        } else {
            Rgba([20, 40, 90, 255])
        }
    }

    fn paint(img: &mut RgbaImage, rect: &Bounds, f: impl Fn(f64, f64) -> Rgba<u8>) {
        for y in 0..img.height() {
            for x in 0..img.width() {
                let (cx, cy) = (x as f64 + 0.5, y as f64 + 0.5);
                if cx >= rect.x && cx < rect.right() && cy >= rect.y && cy < rect.bottom() {
                    let u = (cx - rect.x) / rect.width;
                    let v = (cy - rect.y) / rect.height;
                    img.put_pixel(x, y, f(u, v));
                }
            }
        }
    }

    fn encode(img: RgbaImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn reference_png(invert: bool) -> Vec<u8> {
        let mut img = RgbaImage::from_pixel(200, 200, Rgba([0, 0, 0, 255]));
        let full = Bounds::new(0.0, 0.0, 200.0, 200.0);
        paint(&mut img, &region_in_cell(&full, &ratios::REFERENCE_PORTRAIT), |u, v| {
            checker(u, v, invert)
        });
        encode(img)
    }

    /// One roster card whose power rating box is (400,300)-(500,340) in a 700px wide
    /// screenshot: the grid falls back to 100px column spacing, so the cell is
    /// 93x116 at (380, 231.54).
    fn screenshot() -> Vec<u8> {
        let cell = Bounds::new(380.0, 340.0 - 116.0 + 116.0 * 0.065, 93.0, 116.0);
        let mut img = RgbaImage::from_pixel(700, 400, Rgba([40, 40, 40, 255]));
        paint(&mut img, &region_in_cell(&cell, &ratios::PORTRAIT), |u, v| {
            checker(u, v, false)
        });
        paint(&mut img, &region_in_cell(&cell, &ratios::CLASS_ICON), |_, _| {
            Rgba([TECH_BLUE[0], TECH_BLUE[1], TECH_BLUE[2], 255])
        });
        paint(&mut img, &region_in_cell(&cell, &ratios::STAR_ROW), |_, _| {
            Rgba([250, 230, 120, 255])
        });
        paint(&mut img, &region_in_cell(&cell, &ratios::ASCENSION_ICON), |_, _| {
            Rgba([255, 200, 50, 255])
        });
        encode(img)
    }

    fn detections() -> Vec<TextDetection> {
        vec![
            TextDetection::from_rect("Rank 3\n4523", 0.0, 0.0, 700.0, 400.0),
            TextDetection::from_rect("4523", 400.0, 300.0, 500.0, 340.0),
            TextDetection::from_rect("Rank 3", 400.0, 260.0, 470.0, 278.0),
        ]
    }

    fn record(name: &str, class: ChampionClass, url: &str) -> ChampionRecord {
        ChampionRecord {
            name: name.into(),
            class,
            images: ChampionImages {
                p_128: None,
                full_primary: Some(url.into()),
            },
        }
    }

    fn catalog() -> JsonCatalog {
        JsonCatalog::from_records([
            record("Vision", ChampionClass::Tech, "https://cdn/vision.png"),
            record("Ultron", ChampionClass::Tech, "https://cdn/ultron.png"),
            record("Wolverine", ChampionClass::Mutant, "https://cdn/wolverine.png"),
        ])
    }

    /// Records every class it is queried for
    struct RecordingCatalog {
        inner: JsonCatalog,
        lookups: Arc<Mutex<Vec<ChampionClass>>>,
    }

    impl ChampionCatalog for RecordingCatalog {
        async fn find_by_class(&self, class: ChampionClass) -> Result<Vec<ChampionRecord>> {
            self.lookups.lock().unwrap().push(class);
            self.inner.find_by_class(class).await
        }
    }

    fn scanner<D: TextDetector>(
        detector: D,
        cache_dir: &std::path::Path,
    ) -> RosterScanner<D, JsonCatalog, MapFetcher> {
        scanner_with(detector, catalog(), cache_dir)
    }

    fn scanner_with<D: TextDetector, C: ChampionCatalog + 'static>(
        detector: D,
        catalog: C,
        cache_dir: &std::path::Path,
    ) -> RosterScanner<D, C, MapFetcher> {
        let fetcher = MapFetcher(HashMap::from([
            ("https://cdn/ultron.png".to_string(), reference_png(false)),
            ("https://cdn/vision.png".to_string(), reference_png(true)),
        ]));
        let references = ReferenceCatalog::new(
            catalog,
            fetcher,
            RawImageStore::new(cache_dir),
            Duration::from_secs(5),
        );
        let solid = |c: [u8; 3]| RgbaImage::from_pixel(32, 32, Rgba([c[0], c[1], c[2], 255]));
        let icons = ClassIconBank::from_images([
            (ChampionClass::Tech, solid(TECH_BLUE)),
            (ChampionClass::Mutant, solid(MUTANT_YELLOW)),
        ]);
        RosterScanner::from_parts(
            detector,
            icons,
            Arc::new(references),
            Duration::from_millis(200),
        )
    }

    #[tokio::test]
    async fn test_single_card_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = scanner(RecordedDetections::new(detections()), dir.path());

        let output = scanner
            .process(&screenshot(), ScanOptions { debug_mode: true })
            .await
            .unwrap();

        assert_eq!(output.grid.len(), 1);
        let cell = &output.grid[0];
        assert_eq!(cell.power_rating(), 4523);
        assert_eq!(cell.rank, Some(3));
        assert_eq!(cell.sig_level, None);
        assert_eq!(cell.class, Some(ChampionClass::Tech));
        assert_eq!(cell.stars, Some(7));
        assert_eq!(cell.is_ascended, Some(true));
        assert_eq!(cell.champion_name.as_deref(), Some("Ultron"));

        let debug_png = output.debug_image.expect("debug image requested");
        let decoded = image::load_from_memory(&debug_png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (700, 400));

        // only the TECH class was looked up
        assert_eq!(scanner.references().cached_count(), 2);
    }

    #[tokio::test]
    async fn test_no_debug_image_unless_requested() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = scanner(RecordedDetections::new(detections()), dir.path());
        let output = scanner
            .process(&screenshot(), ScanOptions::default())
            .await
            .unwrap();
        assert!(output.debug_image.is_none());
    }

    #[tokio::test]
    async fn test_no_text_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = scanner(RecordedDetections::new(Vec::new()), dir.path());
        let err = scanner
            .process(&screenshot(), ScanOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::NoTextDetected));
    }

    #[tokio::test]
    async fn test_no_power_ratings_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let detections = vec![
            TextDetection::from_rect("Rank 3 Sig 20", 0.0, 0.0, 700.0, 400.0),
            TextDetection::from_rect("Rank 3", 400.0, 260.0, 470.0, 278.0),
            TextDetection::from_rect("Sig 20", 400.0, 280.0, 470.0, 298.0),
        ];
        let scanner = scanner(RecordedDetections::new(detections), dir.path());
        let err = scanner
            .process(&screenshot(), ScanOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::NoPowerRatings));
        assert_eq!(err.to_string(), "No power ratings found to anchor grid");
    }

    #[tokio::test]
    async fn test_ocr_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = scanner(SlowDetector, dir.path());
        let err = scanner
            .process(&screenshot(), ScanOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ScanError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_cells_outside_image_degrade() {
        let dir = tempfile::tempdir().unwrap();
        // power rating in the bottom-right corner: most crop regions fall outside the image
        let detections = vec![
            TextDetection::from_rect("all", 0.0, 0.0, 700.0, 400.0),
            TextDetection::from_rect("T9000", 680.0, 385.0, 700.0, 400.0),
        ];
        let scanner = scanner(RecordedDetections::new(detections), dir.path());
        let output = scanner
            .process(&screenshot(), ScanOptions::default())
            .await
            .unwrap();

        let cell = &output.grid[0];
        assert_eq!(cell.power_rating(), 9000);
        assert_eq!(cell.class, None);
        assert_eq!(cell.champion_name, None);
        assert!(cell.stars.is_some());
        assert!(cell.is_ascended.is_some());
    }

    #[tokio::test]
    async fn test_one_catalog_lookup_per_distinct_class() {
        // three cards 150px apart: TECH, MUTANT, TECH
        let pi_lefts = [100.0, 250.0, 400.0];
        let colors = [TECH_BLUE, MUTANT_YELLOW, TECH_BLUE];

        let mut img = RgbaImage::from_pixel(600, 400, Rgba([40, 40, 40, 255]));
        for (left, color) in pi_lefts.iter().zip(colors) {
            let cell = Bounds::new(left - 30.0, 340.0 - 174.0 + 174.0 * 0.065, 139.5, 174.0);
            paint(&mut img, &region_in_cell(&cell, &ratios::CLASS_ICON), |_, _| {
                Rgba([color[0], color[1], color[2], 255])
            });
        }
        let mut detections = vec![TextDetection::from_rect("all", 0.0, 0.0, 600.0, 400.0)];
        for (left, text) in pi_lefts.iter().zip(["4523", "5120", "3900"]) {
            detections.push(TextDetection::from_rect(text, *left, 300.0, left + 100.0, 340.0));
        }

        let dir = tempfile::tempdir().unwrap();
        let lookups = Arc::new(Mutex::new(Vec::new()));
        let catalog = RecordingCatalog {
            inner: catalog(),
            lookups: lookups.clone(),
        };
        let scanner = scanner_with(RecordedDetections::new(detections), catalog, dir.path());

        let output = scanner
            .process(&encode(img), ScanOptions::default())
            .await
            .unwrap();

        let classes: Vec<_> = output.grid.iter().map(|c| c.class).collect();
        assert_eq!(
            classes,
            vec![
                Some(ChampionClass::Tech),
                Some(ChampionClass::Mutant),
                Some(ChampionClass::Tech)
            ]
        );

        let mut seen = lookups.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![ChampionClass::Tech, ChampionClass::Mutant]);
    }
}
