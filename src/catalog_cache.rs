use anyhow::{anyhow, Context, Result};
use roster_data::{ChampionCatalog, ChampionClass, ChampionRecord};
use roster_vision::{process_reference, ProcessedReference};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::fetch::ImageFetcher;

/// Champion record with its processed reference portrait
#[derive(Debug, Clone)]
pub struct ReferenceEntry {
    pub record: ChampionRecord,
    pub reference: ProcessedReference,
}

impl ReferenceEntry {
    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn perceptual_hash(&self) -> &str {
        &self.reference.hash
    }
}

/// Lowercase the name and replace everything outside `[a-z0-9]` with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Unprocessed reference downloads on disk, one file per champion.
///
/// Files are never invalidated: only the raw bytes are stored, so crop and
/// hash settings can change without downloading again.
#[derive(Debug, Clone)]
pub struct RawImageStore {
    dir: PathBuf,
}

impl RawImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create cache dir {}", self.dir.display()))
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.img", sanitize_name(name)))
    }

    pub async fn read(&self, name: &str) -> Option<Vec<u8>> {
        let path = self.path_for(name);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to read cached image {}: {}", path.display(), e);
                None
            }
        }
    }

    pub async fn write(&self, name: &str, bytes: &[u8]) {
        let path = self.path_for(name);
        if let Err(e) = tokio::fs::write(&path, bytes).await {
            warn!("Failed to cache image {}: {}", path.display(), e);
        }
    }

    pub async fn remove(&self, name: &str) {
        let path = self.path_for(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove cached image {}: {}", path.display(), e),
        }
    }
}

type EntrySlot = Arc<OnceCell<Arc<ReferenceEntry>>>;

/// Reference portraits per class, resolved at most once per champion for the
/// lifetime of the cache. Concurrent requests for the same champion share a
/// single download.
pub struct ReferenceCatalog<C, F> {
    catalog: C,
    fetcher: F,
    store: RawImageStore,
    download_timeout: Duration,
    entries: Mutex<HashMap<String, EntrySlot>>,
}

impl<C, F> ReferenceCatalog<C, F>
where
    C: ChampionCatalog + 'static,
    F: ImageFetcher + 'static,
{
    pub fn new(catalog: C, fetcher: F, store: RawImageStore, download_timeout: Duration) -> Self {
        Self {
            catalog,
            fetcher,
            store,
            download_timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Reference entries for every champion of `class` that could be resolved.
    /// Champions that fail are logged and left out.
    pub async fn get_by_class(
        self: &Arc<Self>,
        class: ChampionClass,
    ) -> Result<Vec<Arc<ReferenceEntry>>> {
        let records = self
            .catalog
            .find_by_class(class)
            .await
            .with_context(|| format!("Failed to query catalog for {}", class))?;

        let handles: Vec<_> = records
            .into_iter()
            .map(|record| {
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    let name = record.name.clone();
                    (name, this.resolve(record).await)
                })
            })
            .collect();

        let mut entries = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok((_, Ok(entry))) => entries.push(entry),
                Ok((name, Err(e))) => warn!("Skipping reference for {}: {:#}", name, e),
                Err(e) => warn!("Reference task failed: {}", e),
            }
        }

        info!("Reference catalog for {}: {} champion(s) ready", class, entries.len());
        Ok(entries)
    }

    /// Number of champions resolved so far
    pub fn cached_count(&self) -> usize {
        self.entries
            .lock()
            .map(|m| m.values().filter(|slot| slot.initialized()).count())
            .unwrap_or(0)
    }

    async fn resolve(&self, record: ChampionRecord) -> Result<Arc<ReferenceEntry>> {
        let slot = {
            let mut entries = self
                .entries
                .lock()
                .map_err(|_| anyhow!("reference cache lock poisoned"))?;
            entries.entry(record.name.clone()).or_default().clone()
        };

        let entry = slot.get_or_try_init(|| self.load_entry(&record)).await?;
        Ok(entry.clone())
    }

    /// Raw bytes from disk when they still decode, otherwise a fresh download.
    /// Only bytes that processed successfully are written to disk.
    async fn load_entry(&self, record: &ChampionRecord) -> Result<Arc<ReferenceEntry>> {
        if let Some(cached) = self.store.read(&record.name).await {
            match process_raw(cached).await {
                Ok((reference, _)) => {
                    debug!("Using cached reference image for {}", record.name);
                    return Ok(entry(record, reference));
                }
                Err(e) => {
                    warn!("Discarding cached image for {}: {:#}", record.name, e);
                    self.store.remove(&record.name).await;
                }
            }
        }

        let url = record
            .reference_url()
            .ok_or_else(|| anyhow!("no reference image URL"))?;
        let bytes = tokio::time::timeout(self.download_timeout, self.fetcher.fetch(url))
            .await
            .map_err(|_| anyhow!("download timed out after {:?}", self.download_timeout))??;

        let (reference, bytes) = process_raw(bytes).await?;
        self.store.write(&record.name, &bytes).await;
        Ok(entry(record, reference))
    }
}

/// Process reference bytes off the async runtime, handing the bytes back on success.
async fn process_raw(raw: Vec<u8>) -> Result<(ProcessedReference, Vec<u8>)> {
    tokio::task::spawn_blocking(move || process_reference(&raw).map(|r| (r, raw))).await?
}

fn entry(record: &ChampionRecord, reference: ProcessedReference) -> Arc<ReferenceEntry> {
    Arc::new(ReferenceEntry {
        record: record.clone(),
        reference,
    })
}
