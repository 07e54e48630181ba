//! CPU-side stages of roster screenshot recognition: grid inference from OCR
//! boxes and the per-cell classifiers.

pub mod ascension;
pub mod champion_matcher;
pub mod class_icons;
pub mod class_matcher;
pub mod classify;
pub mod debug_render;
pub mod grid;
pub mod metrics;
pub mod phash;
pub mod regions;
pub mod star_counter;

pub use ascension::{ascended_or_default, detect_ascension};
pub use champion_matcher::{match_champion, process_reference, ProcessedReference};
pub use class_icons::ClassIconBank;
pub use class_matcher::match_class;
pub use classify::{Classification, Outcome};
pub use debug_render::draw_debug_image;
pub use grid::{estimate_grid, GridError, TextDetection, Vertex};
pub use star_counter::{count_stars, stars_or_fallback};
