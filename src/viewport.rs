use std::sync::Arc;
use std::time::Instant;

use crate::resources::constants::{
    max_tile_index, world_size, CURSOR_MARKER_LIFETIME, EQUATOR_HALFLENGTH, MAX_ZOOM_LEVEL,
    MIN_ZOOM_LEVEL, PAN_STEP, TAP_THRESHOLD, TILE_SIZE,
};
use crate::tile_system::types::{TileKey, TileRange};
use crate::utils::projection::{reproject_pixel, Projection};

/// Direction of a single keyboard nudge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanDirection {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy)]
struct DragState {
    /// Center plus the pointer position at press time
    anchor_x: i64,
    anchor_y: i64,
    press_x: i64,
    press_y: i64,
}

/// A tapped point, kept in max-zoom pixel space so it survives zooming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorMarker {
    pub x: i64,
    pub y: i64,
    pub expires_at: Instant,
}

/// Scale bar for the current zoom and latitude
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleBar {
    pub width_px: u32,
    pub label: String,
}

/// Zoom, center and generation of the visible map.
///
/// The center is always expressed in the pixel space of the current zoom
/// level (world size `256 · 2^zoom`). Every zoom or source change advances
/// the generation so asynchronous work started earlier can be recognised as
/// stale.
#[derive(Debug, Clone)]
pub struct ViewportState {
    zoom: u8,
    center_x: i64,
    center_y: i64,
    source_id: Arc<str>,
    generation: u64,
    drag: Option<DragState>,
    marker: Option<CursorMarker>,
}

impl ViewportState {
    pub fn new(source_id: impl Into<Arc<str>>, zoom: u8, center_x: i64, center_y: i64) -> Self {
        Self {
            zoom: zoom.clamp(MIN_ZOOM_LEVEL, MAX_ZOOM_LEVEL),
            center_x,
            center_y,
            source_id: source_id.into(),
            generation: 0,
            drag: None,
            marker: None,
        }
    }

    /// Viewport centered on the middle of the world
    pub fn centered(source_id: impl Into<Arc<str>>, zoom: u8) -> Self {
        let zoom = zoom.clamp(MIN_ZOOM_LEVEL, MAX_ZOOM_LEVEL);
        let half = world_size(zoom) / 2;
        Self::new(source_id, zoom, half, half)
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn center(&self) -> (i64, i64) {
        (self.center_x, self.center_y)
    }

    pub fn source_id(&self) -> &Arc<str> {
        &self.source_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn marker(&self) -> Option<&CursorMarker> {
        self.marker.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn nudge(&mut self, direction: PanDirection) {
        match direction {
            PanDirection::Left => self.center_x -= PAN_STEP,
            PanDirection::Right => self.center_x += PAN_STEP,
            PanDirection::Up => self.center_y -= PAN_STEP,
            PanDirection::Down => self.center_y += PAN_STEP,
        }
    }

    pub fn begin_drag(&mut self, x: i64, y: i64) {
        self.drag = Some(DragState {
            anchor_x: self.center_x + x,
            anchor_y: self.center_y + y,
            press_x: x,
            press_y: y,
        });
    }

    /// Follow the pointer while the button is held. Returns false when no
    /// drag is in progress.
    pub fn drag_to(&mut self, x: i64, y: i64) -> bool {
        let Some(drag) = self.drag else {
            return false;
        };
        self.center_x = drag.anchor_x - x;
        self.center_y = drag.anchor_y - y;
        true
    }

    /// Finish a drag. A release within the tap threshold of the press point
    /// drops a cursor marker there and returns true.
    pub fn end_drag(&mut self, x: i64, y: i64, viewport: (u32, u32), now: Instant) -> bool {
        let Some(drag) = self.drag.take() else {
            return false;
        };
        if (x - drag.press_x).abs() >= TAP_THRESHOLD || (y - drag.press_y).abs() >= TAP_THRESHOLD {
            return false;
        }

        let to_max_zoom = 1i64 << (MAX_ZOOM_LEVEL - self.zoom);
        let half_w = viewport.0 as i64 / 2;
        let half_h = viewport.1 as i64 / 2;
        // Any earlier marker and its deadline are replaced
        self.marker = Some(CursorMarker {
            x: (x - half_w + self.center_x) * to_max_zoom,
            y: (y - half_h + self.center_y) * to_max_zoom,
            expires_at: now + CURSOR_MARKER_LIFETIME,
        });
        true
    }

    /// Clear an expired marker. Returns true when the marker went away.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.marker {
            Some(marker) if now >= marker.expires_at => {
                self.marker = None;
                true
            }
            _ => false,
        }
    }

    /// Step one zoom level in or out, keeping the world point under `anchor`
    /// (an offset from the viewport center) in place. Returns false without
    /// touching anything at the zoom limits.
    pub fn zoom_step(&mut self, anchor: Option<(i64, i64)>, zoom_in: bool) -> bool {
        if zoom_in && self.zoom >= MAX_ZOOM_LEVEL {
            return false;
        }
        if !zoom_in && self.zoom <= MIN_ZOOM_LEVEL {
            return false;
        }

        let (dx, dy) = anchor.unwrap_or((0, 0));
        if zoom_in {
            self.zoom += 1;
            self.center_x = (self.center_x + dx) * 2 - dx;
            self.center_y = (self.center_y + dy) * 2 - dy;
        } else {
            self.zoom -= 1;
            self.center_x = (self.center_x + dx).div_euclid(2) - dx;
            self.center_y = (self.center_y + dy).div_euclid(2) - dy;
        }
        // Marker survives in max-zoom space; a drag in progress does not
        self.drag = None;
        self.generation += 1;
        true
    }

    /// Switch to another map source, reprojecting the center when the
    /// projections differ
    pub fn set_source(&mut self, source_id: impl Into<Arc<str>>, from: Projection, to: Projection) {
        if from != to {
            let (x, y) = reproject_pixel(from, to, self.zoom, self.center_x, self.center_y);
            self.center_x = x;
            self.center_y = y;
        }
        self.source_id = source_id.into();
        self.drag = None;
        self.generation += 1;
    }

    /// Tiles touched by a `width`×`height` viewport, or `None` when the
    /// viewport lies entirely outside the world
    pub fn visible_range(&self, width: u32, height: u32) -> Option<TileRange> {
        let (min_x, max_x) = axis_range(self.center_x, width, self.zoom)?;
        let (min_y, max_y) = axis_range(self.center_y, height, self.zoom)?;
        Some(TileRange {
            zoom: self.zoom,
            min_x,
            max_x,
            min_y,
            max_y,
        })
    }

    /// Top-left screen position of a tile at the current zoom
    pub fn tile_screen_position(&self, key: &TileKey, width: u32, height: u32) -> (i64, i64) {
        let tile = TILE_SIZE as i64;
        (
            key.x as i64 * tile + width as i64 / 2 - self.center_x,
            key.y as i64 * tile + height as i64 / 2 - self.center_y,
        )
    }

    pub fn marker_screen_position(&self, width: u32, height: u32) -> Option<(i64, i64)> {
        let marker = self.marker?;
        let to_max_zoom = 1i64 << (MAX_ZOOM_LEVEL - self.zoom);
        Some((
            marker.x.div_euclid(to_max_zoom) + width as i64 / 2 - self.center_x,
            marker.y.div_euclid(to_max_zoom) + height as i64 / 2 - self.center_y,
        ))
    }

    /// Round ground distance (1, 2 or 5 × 10^n metres) and its pixel length
    /// at the center row
    pub fn scale_bar(&self) -> ScaleBar {
        let half = world_size(self.zoom) as f64 / 2.0;
        // Mercator stretch at this row is cosh of the planar y in radians
        let stretch = (std::f64::consts::PI * (half - self.center_y as f64).abs() / half).cosh();
        let metres_per_px = EQUATOR_HALFLENGTH / half / stretch;

        let mut distance = 10f64.powi((metres_per_px * 100.0).log10().floor() as i32);
        let mut width = distance / metres_per_px;
        if width <= 20.0 {
            distance *= 5.0;
            width *= 5.0;
        } else if width <= 50.0 {
            distance *= 2.0;
            width *= 2.0;
        }

        let label = if distance >= 1000.0 {
            format!("{} km", distance / 1000.0)
        } else {
            format!("{} m", distance)
        };
        ScaleBar {
            width_px: width.floor() as u32,
            label,
        }
    }
}

fn axis_range(center: i64, extent: u32, zoom: u8) -> Option<(u32, u32)> {
    let tile = TILE_SIZE as i64;
    let half = extent as i64 / 2;
    let last = max_tile_index(zoom) as i64;

    let min = if center > half { (center - half) / tile } else { 0 };
    let far = center + half;
    if far < 0 || min > last {
        return None;
    }
    let max = (far / tile).min(last);
    Some((min as u32, max as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn zoom_round_trip_without_anchor() {
        let mut viewport = ViewportState::new("osm", 10, 131_072, 87_381);
        for _ in 0..5 {
            assert!(viewport.zoom_step(None, true));
        }
        for _ in 0..5 {
            assert!(viewport.zoom_step(None, false));
        }
        assert_eq!(viewport.center(), (131_072, 87_381));
        assert_eq!(viewport.zoom(), 10);

        // Out then in loses at most the odd pixel
        viewport.zoom_step(None, false);
        viewport.zoom_step(None, true);
        let (x, y) = viewport.center();
        assert!((x - 131_072).abs() <= 1 && (y - 87_381).abs() <= 1);
    }

    #[test]
    fn zoom_keeps_anchor_point_fixed() {
        let mut viewport = ViewportState::new("osm", 3, 1000, 1000);
        viewport.zoom_step(Some((100, -50)), true);
        // World point under the anchor was (1100, 950) at zoom 3
        assert_eq!(viewport.center(), (2100, 1950));
        viewport.zoom_step(Some((100, -50)), false);
        assert_eq!(viewport.center(), (1000, 1000));
    }

    #[test]
    fn zoom_is_clamped() {
        let mut top = ViewportState::new("osm", 24, 10, 10);
        assert!(!top.zoom_step(None, true));
        assert_eq!((top.zoom(), top.generation(), top.center()), (24, 0, (10, 10)));

        let mut bottom = ViewportState::new("osm", 0, 128, 128);
        assert!(!bottom.zoom_step(Some((5, 5)), false));
        assert_eq!((bottom.zoom(), bottom.generation()), (0, 0));
    }

    #[test]
    fn generation_strictly_increases() {
        let mut viewport = ViewportState::centered("osm", 2);
        viewport.zoom_step(None, true);
        viewport.zoom_step(None, false);
        viewport.set_source("yandex", Projection::SphericalMercator, Projection::EllipsoidalMercator);
        assert_eq!(viewport.generation(), 3);
    }

    #[test]
    fn reprojection_round_trip() {
        let start = (2_200_000, 1_340_000);
        let mut viewport = ViewportState::new("osm", 14, start.0, start.1);
        viewport.set_source("yandex", Projection::SphericalMercator, Projection::EllipsoidalMercator);
        assert_eq!(viewport.center().0, start.0);
        assert_ne!(viewport.center().1, start.1);

        viewport.set_source("osm", Projection::EllipsoidalMercator, Projection::SphericalMercator);
        let (x, y) = viewport.center();
        assert!((x - start.0).abs() <= 1 && (y - start.1).abs() <= 1, "{:?}", (x, y));
    }

    #[test]
    fn same_projection_switch_keeps_center() {
        let mut viewport = ViewportState::new("osm", 5, 4000, 3000);
        viewport.set_source("other", Projection::SphericalMercator, Projection::SphericalMercator);
        assert_eq!(viewport.center(), (4000, 3000));
        assert_eq!(&**viewport.source_id(), "other");
    }

    #[test]
    fn nudge_and_drag_move_center() {
        let mut viewport = ViewportState::new("osm", 5, 4000, 3000);
        viewport.nudge(PanDirection::Right);
        viewport.nudge(PanDirection::Up);
        assert_eq!(viewport.center(), (4064, 2936));

        viewport.begin_drag(100, 100);
        assert!(viewport.drag_to(130, 90));
        assert_eq!(viewport.center(), (4034, 2946));
        assert!(!viewport.end_drag(130, 90, (800, 600), Instant::now()));
        assert!(!viewport.drag_to(0, 0));
        assert!(viewport.marker().is_none());
    }

    #[test]
    fn tap_drops_marker_that_expires() {
        let now = Instant::now();
        let mut viewport = ViewportState::new("osm", 22, 1000, 1000);
        viewport.begin_drag(410, 300);
        assert!(viewport.end_drag(412, 303, (800, 600), now));

        let marker = *viewport.marker().unwrap();
        // (412 - 400 + 1000) · 4
        assert_eq!((marker.x, marker.y), (4048, 4012));
        assert_eq!(viewport.marker_screen_position(800, 600), Some((412, 303)));

        // Stays put on screen relative to the world after zooming out
        viewport.zoom_step(None, false);
        assert_eq!(viewport.marker_screen_position(800, 600), Some((406, 301)));

        assert!(!viewport.tick(now + Duration::from_secs(4)));
        assert!(viewport.tick(now + CURSOR_MARKER_LIFETIME));
        assert!(viewport.marker().is_none());
    }

    #[test]
    fn visible_range_at_zoom_zero() {
        let viewport = ViewportState::new("osm", 0, 128, 128);
        let range = viewport.visible_range(256, 256).unwrap();
        assert_eq!((range.min_x, range.max_x, range.min_y, range.max_y), (0, 0, 0, 0));
        assert_eq!(viewport.tile_screen_position(&TileKey::new("osm", 0, 0, 0), 256, 256), (0, 0));
    }

    #[test]
    fn visible_range_is_clamped_to_world() {
        let viewport = ViewportState::new("osm", 2, 900, 100);
        let range = viewport.visible_range(800, 600).unwrap();
        // x: (900-400)/256 = 1 .. min((900+400)/256, 3) = 3
        // y: 0 .. (100+300)/256 = 1
        assert_eq!((range.min_x, range.max_x, range.min_y, range.max_y), (1, 3, 0, 1));

        let outside = ViewportState::new("osm", 1, 2000, 200);
        assert!(outside.visible_range(800, 600).is_none());
        let before = ViewportState::new("osm", 1, -500, 200);
        assert!(before.visible_range(800, 600).is_none());
    }

    #[test]
    fn scale_bar_at_equator() {
        // Zoom 3, center row on the equator: ~19568 m/px
        let viewport = ViewportState::centered("osm", 3);
        let bar = viewport.scale_bar();
        // 1000 km is 51 px, wide enough to keep
        assert_eq!(bar.label, "1000 km");
        assert_eq!(bar.width_px, 51);
    }

    #[test]
    fn scale_bar_picks_round_multiple() {
        let viewport = ViewportState::centered("osm", 10);
        let bar = viewport.scale_bar();
        // ~152.87 m/px: 10 km is 65 px
        assert_eq!(bar.label, "10 km");
        assert_eq!(bar.width_px, 65);
    }
}
