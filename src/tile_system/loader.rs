use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use bevy::log::{debug, warn};
use crossbeam_channel::{Receiver, Sender};
use image::RgbaImage;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::error::TileError;
use crate::events::{emit, EventSender, ViewerEvent};
use crate::map_source::MapCatalog;
use crate::tile_system::cache::TileCache;
use crate::tile_system::downloader::TileFetcher;
use crate::tile_system::types::TileKey;

/// Result of an asynchronous step, marshaled back to the consumer thread.
/// Each carries the generation that was current when it was started.
#[derive(Debug)]
enum Completion {
    DiskRead {
        key: TileKey,
        generation: u64,
        result: Result<RgbaImage, TileError>,
    },
    Download {
        key: TileKey,
        generation: u64,
        result: Result<RgbaImage, TileError>,
    },
}

/// Drives the disk → network chain for tiles missing from the cache.
///
/// All bookkeeping (`reading`, `loading`) lives on the consumer thread; the
/// Tokio runtime only performs I/O and decoding and reports back through a
/// channel that [`TileLoader::apply_completions`] drains.
pub struct TileLoader {
    catalog: MapCatalog,
    cache_root: PathBuf,
    fetcher: Arc<dyn TileFetcher>,
    runtime: Handle,
    /// Tiles with a disk read in flight
    reading: HashSet<TileKey>,
    /// Tiles with a network fetch in flight
    loading: HashMap<TileKey, AbortHandle>,
    completions_tx: Sender<Completion>,
    completions_rx: Receiver<Completion>,
    events: EventSender,
}

impl TileLoader {
    pub fn new(
        catalog: MapCatalog,
        cache_root: impl Into<PathBuf>,
        fetcher: Arc<dyn TileFetcher>,
        runtime: Handle,
        events: EventSender,
    ) -> Self {
        let (completions_tx, completions_rx) = crossbeam_channel::unbounded();
        Self {
            catalog,
            cache_root: cache_root.into(),
            fetcher,
            runtime,
            reading: HashSet::new(),
            loading: HashMap::new(),
            completions_tx,
            completions_rx,
            events,
        }
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Start acquiring a tile that is not in the memory cache. Never blocks.
    ///
    /// Disk first; a disk miss is turned into a network fetch once the read
    /// completes, unless one is already in flight.
    pub fn request(&mut self, key: &TileKey, generation: u64) {
        if !key.is_valid() || self.reading.contains(key) || self.loading.contains_key(key) {
            return;
        }
        let Some(source) = self.catalog.get(&key.source) else {
            return;
        };

        let path = key.cache_path(&self.cache_root, &source.format);
        let tx = self.completions_tx.clone();
        let key = key.clone();
        self.reading.insert(key.clone());
        self.runtime.spawn(async move {
            let result = read_tile(&path).await;
            let _ = tx.send(Completion::DiskRead {
                key,
                generation,
                result,
            });
        });
    }

    /// Apply every completion that has arrived so far, in arrival order.
    /// Returns how many were applied.
    pub fn apply_completions(&mut self, cache: &mut TileCache, generation: u64) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.apply(completion, cache, generation);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, completion: Completion, cache: &mut TileCache, current: u64) {
        match completion {
            Completion::DiskRead {
                key,
                generation,
                result,
            } => {
                self.reading.remove(&key);
                match result {
                    Ok(image) => {
                        debug!("{}: loaded from disk", key);
                        // Results of a superseded generation keep their own
                        // stamp and are first in line for the next purge
                        cache.put(key, image, generation.min(current));
                        emit(&self.events, ViewerEvent::Repaint);
                    }
                    Err(err) => {
                        if generation != current {
                            debug!("{}: disk miss for superseded generation, not fetching", key);
                            return;
                        }
                        if self.loading.contains_key(&key) {
                            return;
                        }
                        debug!("{}: not on disk ({}), fetching", key, err);
                        self.start_download(key, current);
                    }
                }
            }
            Completion::Download {
                key,
                generation,
                result,
            } => {
                // After a generation change the set was already cleared and
                // may hold a fresh request for the same key
                if generation == current && self.loading.remove(&key).is_some() {
                    emit(&self.events, ViewerEvent::Loading(self.loading.len()));
                }
                match result {
                    Ok(image) => {
                        cache.put(key, image, generation.min(current));
                        emit(&self.events, ViewerEvent::Repaint);
                    }
                    Err(err) => debug!("{}: download failed: {}", key, err),
                }
            }
        }
    }

    fn start_download(&mut self, key: TileKey, generation: u64) {
        let Some(source) = self.catalog.get(&key.source) else {
            return;
        };
        let url = source.tile_url(key.x, key.y, key.zoom);
        let path = key.cache_path(&self.cache_root, &source.format);
        let fetcher = self.fetcher.clone();
        let tx = self.completions_tx.clone();
        let task_key = key.clone();

        let handle = self.runtime.spawn(async move {
            let result = download_tile(fetcher.as_ref(), &url, &path).await;
            let _ = tx.send(Completion::Download {
                key: task_key,
                generation,
                result,
            });
        });

        self.loading.insert(key, handle.abort_handle());
        emit(&self.events, ViewerEvent::Loading(self.loading.len()));
    }

    /// Abort every outstanding network fetch and clear the loading set.
    /// Disk reads are left to finish.
    pub fn cancel_all(&mut self) {
        if self.loading.is_empty() {
            return;
        }
        for (_, handle) in self.loading.drain() {
            handle.abort();
        }
        emit(&self.events, ViewerEvent::Loading(0));
    }

    pub fn loading_count(&self) -> usize {
        self.loading.len()
    }

    pub fn is_loading(&self, key: &TileKey) -> bool {
        self.loading.contains_key(key)
    }

    pub fn is_reading(&self, key: &TileKey) -> bool {
        self.reading.contains(key)
    }
}

/// Read and decode a tile from the disk cache. A file that does not decode is
/// removed so the next attempt fetches a fresh copy.
async fn read_tile(path: &Path) -> Result<RgbaImage, TileError> {
    let bytes = tokio::fs::read(path).await?;
    match decode(bytes).await {
        Ok(image) => Ok(image),
        Err(err) => {
            warn!("Failed to load cached tile {}: {}", path.display(), err);
            let _ = tokio::fs::remove_file(path).await;
            Err(err)
        }
    }
}

/// Fetch a tile, store it in the disk cache and decode it. A failed write
/// only costs the disk copy; the decoded tile is still returned.
async fn download_tile(fetcher: &dyn TileFetcher, url: &str, path: &Path) -> Result<RgbaImage, TileError> {
    let bytes = fetcher.fetch(url).await?;
    if let Err(err) = store_tile(path, &bytes).await {
        warn!("Failed to cache tile: {:#}", err);
    }
    decode(bytes).await
}

async fn store_tile(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let folder = path.parent().context("tile path has no parent directory")?;

    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o755);
    builder
        .create(folder)
        .await
        .with_context(|| format!("creating tile download directory {}", folder.display()))?;

    // Write beside the target and rename, so an aborted fetch never leaves a
    // truncated tile behind
    let partial = PartialFile::new(path);
    tokio::fs::write(&partial.path, bytes)
        .await
        .with_context(|| format!("writing {}", partial.path.display()))?;
    tokio::fs::rename(&partial.path, path)
        .await
        .with_context(|| format!("renaming {} to {}", partial.path.display(), path.display()))?;
    partial.commit();
    Ok(())
}

/// `<y>.part` beside a tile being stored. Removed on drop unless committed,
/// which also covers a download task aborted mid-write.
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn new(target: &Path) -> Self {
        Self {
            path: target.with_extension("part"),
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

async fn decode(bytes: Vec<u8>) -> Result<RgbaImage, TileError> {
    tokio::task::spawn_blocking(move || image::load_from_memory(&bytes).map(|img| img.into_rgba8()))
        .await
        .map_err(|err| TileError::Decode(err.to_string()))?
        .map_err(TileError::from)
}
