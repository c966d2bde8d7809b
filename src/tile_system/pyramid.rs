use image::{imageops, ImageBuffer, RgbaImage};

use crate::resources::constants::{MAX_FALLBACK_SCALE, TILE_SIZE};
use crate::tile_system::cache::TileCache;
use crate::tile_system::types::{TileImage, TileKey};

/// Build a placeholder for `key` from the nearest cached ancestor.
///
/// Walks up one zoom level at a time (scale 2, 4, ... 256) and stops at the
/// first ancestor present in the cache. The quarter/sixteenth/... of the
/// ancestor that covers `key` is cropped and blown up to a full tile with
/// nearest-neighbour sampling. The ancestor counts as painted, so its
/// generation is refreshed.
pub fn pyramid_fallback(cache: &mut TileCache, key: &TileKey, generation: u64) -> Option<RgbaImage> {
    let mut levels = 1u8;
    while (1u32 << levels) <= MAX_FALLBACK_SCALE {
        let ancestor_key = key.ancestor(levels)?;
        if let Some(ancestor) = cache.touch(&ancestor_key, generation) {
            if let Some(placeholder) = upscale_region(&ancestor, key, levels) {
                return Some(placeholder);
            }
        }
        levels += 1;
    }
    None
}

/// Crop the part of `ancestor` covering `key` and scale it to a full tile
fn upscale_region(ancestor: &TileImage, key: &TileKey, levels: u8) -> Option<RgbaImage> {
    let scale = 1u32 << levels;
    // Servers occasionally hand out tiles that are not 256px; crop relative
    // to the actual ancestor size
    let size = ancestor.width().min(ancestor.height()) / scale;
    if size == 0 {
        return None;
    }

    let left = (key.x % scale) * size;
    let top = (key.y % scale) * size;
    let region = imageops::crop_imm(&**ancestor, left, top, size, size).to_image();

    Some(ImageBuffer::from_fn(TILE_SIZE, TILE_SIZE, |px, py| {
        *region.get_pixel(px * size / TILE_SIZE, py * size / TILE_SIZE)
    }))
}
