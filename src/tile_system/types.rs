use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;

use crate::resources::constants::max_tile_index;

/// A decoded tile, shared between the cache and any frame that paints it
pub type TileImage = Arc<RgbaImage>;

/// Identifies one tile of one map source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Map source id
    pub source: Arc<str>,
    /// Zoom level (0-24)
    pub zoom: u8,
    /// Column, 0 at the antimeridian
    pub x: u32,
    /// Row, 0 at the northern edge
    pub y: u32,
}

impl TileKey {
    pub fn new(source: impl Into<Arc<str>>, zoom: u8, x: u32, y: u32) -> Self {
        Self {
            source: source.into(),
            zoom,
            x,
            y,
        }
    }

    /// Path of this tile below the cache root: `<source>/<zoom>/<x>/<y>.<format>`
    pub fn relative_path(&self, format: &str) -> PathBuf {
        let mut path = PathBuf::from(&*self.source);
        path.push(self.zoom.to_string());
        path.push(self.x.to_string());
        path.push(format!("{}.{}", self.y, format));
        path
    }

    /// Absolute location of this tile in the disk cache
    pub fn cache_path(&self, cache_root: &Path, format: &str) -> PathBuf {
        cache_root.join(self.relative_path(format))
    }

    /// The tile `levels` zoom levels up that covers this one, if any
    pub fn ancestor(&self, levels: u8) -> Option<TileKey> {
        if levels > self.zoom || levels >= 32 {
            return None;
        }
        Some(Self {
            source: self.source.clone(),
            zoom: self.zoom - levels,
            x: self.x >> levels,
            y: self.y >> levels,
        })
    }

    pub fn is_valid(&self) -> bool {
        let max = max_tile_index(self.zoom);
        self.x <= max && self.y <= max
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.source, self.zoom, self.x, self.y)
    }
}

/// Inclusive rectangle of tile indices at one zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRange {
    pub zoom: u8,
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl TileRange {
    /// Tiles row by row, top-left first
    pub fn keys(&self, source: &Arc<str>) -> impl Iterator<Item = TileKey> {
        let source = source.clone();
        let TileRange {
            zoom,
            min_x,
            max_x,
            min_y,
            max_y,
        } = *self;
        (min_y..=max_y).flat_map(move |y| {
            let source = source.clone();
            (min_x..=max_x).map(move |x| TileKey::new(source.clone(), zoom, x, y))
        })
    }
}
