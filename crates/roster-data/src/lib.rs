use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::str::FromStr;

/// Champion class, as shown by the class icon next to a champion's power rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChampionClass {
    Cosmic,
    Tech,
    Mutant,
    Skill,
    Science,
    Mystic,
    Superior,
}

impl ChampionClass {
    pub const ALL: [ChampionClass; 7] = [
        ChampionClass::Cosmic,
        ChampionClass::Tech,
        ChampionClass::Mutant,
        ChampionClass::Skill,
        ChampionClass::Science,
        ChampionClass::Mystic,
        ChampionClass::Superior,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChampionClass::Cosmic => "COSMIC",
            ChampionClass::Tech => "TECH",
            ChampionClass::Mutant => "MUTANT",
            ChampionClass::Skill => "SKILL",
            ChampionClass::Science => "SCIENCE",
            ChampionClass::Mystic => "MYSTIC",
            ChampionClass::Superior => "SUPERIOR",
        }
    }

    /// File name of the class icon inside `class_icons/`.
    pub fn icon_file(&self) -> String {
        format!("{}.png", self.as_str().to_lowercase())
    }
}

impl fmt::Display for ChampionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChampionClass {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_uppercase();
        match ChampionClass::ALL.iter().find(|c| c.as_str() == upper) {
            Some(class) => Ok(*class),
            None => bail!("Unknown champion class: {}", s),
        }
    }
}

/// Reference image URLs for a champion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChampionImages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_128: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_primary: Option<String>,
}

/// Champion record as stored in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChampionRecord {
    pub name: String,
    pub class: ChampionClass,
    #[serde(default)]
    pub images: ChampionImages,
}

impl ChampionRecord {
    /// URL of the reference portrait: the 128px variant when present,
    /// otherwise the full primary image. Empty URLs count as absent.
    pub fn reference_url(&self) -> Option<&str> {
        non_empty(&self.images.p_128).or_else(|| non_empty(&self.images.full_primary))
    }
}

fn non_empty(url: &Option<String>) -> Option<&str> {
    url.as_deref().filter(|u| !u.is_empty())
}

/// Source of champion records, queried one class at a time.
pub trait ChampionCatalog: Send + Sync {
    fn find_by_class(
        &self,
        class: ChampionClass,
    ) -> impl Future<Output = Result<Vec<ChampionRecord>>> + Send;
}

/// Raw champions.json file format
#[derive(Debug, Deserialize)]
struct ChampionsFile {
    #[allow(dead_code)]
    #[serde(default)]
    version: Option<String>,
    champions: Vec<ChampionRecord>,
}

/// Champion catalog backed by a `champions.json` file
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    by_class: HashMap<ChampionClass, Vec<ChampionRecord>>,
}

impl JsonCatalog {
    /// Load champion data from the data directory
    pub fn load(data_dir: &Path) -> Result<Self> {
        let champions_path = data_dir.join("champions.json");
        if !champions_path.exists() {
            tracing::warn!(
                "No champions.json found at {}. Champion identification disabled.",
                champions_path.display()
            );
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(&champions_path).context("Failed to read champions.json")?;
        let catalog = Self::from_json(&content)?;
        tracing::info!("Loaded {} champions", catalog.len());
        Ok(catalog)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let file: ChampionsFile =
            serde_json::from_str(content).context("Failed to parse champions.json")?;
        Ok(Self::from_records(file.champions))
    }

    pub fn from_records(records: impl IntoIterator<Item = ChampionRecord>) -> Self {
        let mut by_class: HashMap<ChampionClass, Vec<ChampionRecord>> = HashMap::new();
        for record in records {
            by_class.entry(record.class).or_default().push(record);
        }
        Self { by_class }
    }

    pub fn len(&self) -> usize {
        self.by_class.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChampionCatalog for JsonCatalog {
    async fn find_by_class(&self, class: ChampionClass) -> Result<Vec<ChampionRecord>> {
        Ok(self.by_class.get(&class).cloned().unwrap_or_default())
    }
}
