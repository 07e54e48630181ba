use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable consulted when no Vision API key is configured
pub const VISION_KEY_ENV: &str = "ROSTER_SCAN_VISION_KEY";

/// Scanner settings, loaded from an optional JSON file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Holds `champions.json` and `class_icons/<class>.png`
    pub data_dir: PathBuf,
    /// Raw reference downloads, kept across runs
    pub cache_dir: PathBuf,
    pub ocr_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub vision_api_key: Option<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            cache_dir: std::env::temp_dir().join("roster_scan_cache"),
            ocr_timeout_secs: 30,
            download_timeout_secs: 15,
            vision_api_key: None,
        }
    }
}

impl ScannerConfig {
    /// Load from `path`, or fall back to defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    pub fn class_icons_dir(&self) -> PathBuf {
        self.data_dir.join("class_icons")
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn vision_api_key(&self) -> Option<String> {
        self.vision_api_key
            .clone()
            .or_else(|| std::env::var(VISION_KEY_ENV).ok())
            .filter(|k| !k.is_empty())
    }
}
