use std::time::Duration;

/// Edge length of a tile in pixels
pub const TILE_SIZE: u32 = 256;
pub const MIN_ZOOM_LEVEL: u8 = 0; // Whole world in one tile
pub const MAX_ZOOM_LEVEL: u8 = 24;

/// Pixel step for a single arrow-key nudge
pub const PAN_STEP: i64 = 64;

/// A release closer than this to the press point is a tap, not a drag
pub const TAP_THRESHOLD: i64 = 5;
pub const CURSOR_MARKER_LIFETIME: Duration = Duration::from_secs(5);

/// Purge runs only once the cache holds more entries than this
pub const CACHE_PURGE_THRESHOLD: usize = 500;
/// Entries older than this many generations are dropped by a purge
pub const CACHE_MAX_AGE: u64 = 2;

/// Largest ancestor scale consulted by pyramid fallback (8 levels up)
pub const MAX_FALLBACK_SCALE: u32 = 256;

/// Half the equatorial circumference in Web-Mercator metres
pub const EQUATOR_HALFLENGTH: f64 = 20037508.34;

pub const DEFAULT_MAX_CONNS_PER_HOST: usize = 5;
pub const DEFAULT_USER_AGENT: &str = concat!("tileview/", env!("CARGO_PKG_VERSION"));

/// World edge length in pixels at the given zoom (256 · 2^zoom)
pub fn world_size(zoom: u8) -> i64 {
    (TILE_SIZE as i64) << zoom
}

/// Highest valid tile index on either axis at the given zoom
pub fn max_tile_index(zoom: u8) -> u32 {
    ((1u64 << zoom) - 1) as u32
}
