pub mod catalog_cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod ocr;
pub mod pipeline;

pub use catalog_cache::{RawImageStore, ReferenceCatalog, ReferenceEntry};
pub use config::ScannerConfig;
pub use error::ScanError;
pub use fetch::{HttpFetcher, ImageFetcher};
pub use ocr::{CloudVisionDetector, Detector, RecordedDetections, TextDetector};
pub use pipeline::{RosterScanner, ScanOptions, ScanOutput};

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roster_scan=debug,roster_vision=debug".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
