use std::collections::HashMap;
use std::sync::Arc;

use bevy::log::debug;
use image::RgbaImage;

use crate::resources::constants::{CACHE_MAX_AGE, CACHE_PURGE_THRESHOLD};
use crate::tile_system::types::{TileImage, TileKey};

/// A decoded tile plus the generation it was last painted (or inserted) in
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub image: TileImage,
    pub last_used_generation: u64,
}

/// Memory-resident decoded tiles.
///
/// There is no per-access bookkeeping beyond a generation stamp: painting a
/// tile refreshes its stamp, and [`TileCache::purge`] drops everything that
/// has not been painted for a couple of generations once the cache grows past
/// its threshold.
#[derive(Debug)]
pub struct TileCache {
    tiles: HashMap<TileKey, CacheEntry>,
    purge_threshold: usize,
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TileCache {
    /// Create a new empty tile cache
    pub fn new() -> Self {
        Self::with_threshold(CACHE_PURGE_THRESHOLD)
    }

    pub fn with_threshold(purge_threshold: usize) -> Self {
        Self {
            tiles: HashMap::new(),
            purge_threshold,
        }
    }

    /// Get a tile without touching its generation
    pub fn get(&self, key: &TileKey) -> Option<&TileImage> {
        self.tiles.get(key).map(|entry| &entry.image)
    }

    /// Get a tile that is about to be painted, refreshing its generation
    pub fn touch(&mut self, key: &TileKey, generation: u64) -> Option<TileImage> {
        let entry = self.tiles.get_mut(key)?;
        entry.last_used_generation = entry.last_used_generation.max(generation);
        Some(entry.image.clone())
    }

    /// Insert a decoded tile, replacing any previous image for the key
    pub fn put(&mut self, key: TileKey, image: RgbaImage, generation: u64) {
        self.tiles.insert(
            key,
            CacheEntry {
                image: Arc::new(image),
                last_used_generation: generation,
            },
        );
    }

    pub fn entry(&self, key: &TileKey) -> Option<&CacheEntry> {
        self.tiles.get(key)
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.tiles.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Drop stale entries if the cache is over its threshold. Runs after a
    /// full redraw, so everything visible has already been touched.
    /// Returns the number of entries removed.
    pub fn purge(&mut self, current_generation: u64) -> usize {
        if self.tiles.len() <= self.purge_threshold {
            return 0;
        }

        debug!("Purging tiles");
        let before = self.tiles.len();
        self.tiles.retain(|_, entry| {
            current_generation.saturating_sub(entry.last_used_generation) <= CACHE_MAX_AGE
        });
        let removed = before - self.tiles.len();
        debug!("Removed {} tiles, left {}", removed, self.tiles.len());
        removed
    }
}
