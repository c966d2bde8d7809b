use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bevy::log::{debug, info};
use bevy::prelude::Resource;
use crossbeam_channel::Receiver;
use tokio::runtime::Handle;

use crate::error::ConfigError;
use crate::events::{emit, EventSender, ViewerEvent};
use crate::map_source::{MapCatalog, MapSource};
use crate::resources::constants::{MAX_ZOOM_LEVEL, MIN_ZOOM_LEVEL};
use crate::resources::settings::Settings;
use crate::tile_system::{pyramid_fallback, HttpFetcher, TileCache, TileFetcher, TileImage, TileKey, TileLoader};
use crate::utils::projection::lonlat_to_pixel;
use crate::viewport::{PanDirection, ScaleBar, ViewportState};

/// One tile of a frame, positioned in viewport pixels
#[derive(Debug, Clone)]
pub struct PlacedTile {
    pub key: TileKey,
    /// Top-left corner relative to the viewport's top-left
    pub x: i64,
    pub y: i64,
    pub image: TileImage,
    /// Upscaled from a coarser ancestor while the real tile loads
    pub placeholder: bool,
}

/// Everything the shell needs to paint one frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub tiles: Vec<PlacedTile>,
    pub marker: Option<(i64, i64)>,
    pub crosshair: (i64, i64),
    pub scale_bar: ScaleBar,
}

/// Owns the viewport, the tile cache and the loader, and is the only thing
/// that mutates them. Lives on the consumer thread.
#[derive(Resource)]
pub struct MapViewer {
    catalog: MapCatalog,
    viewport: ViewportState,
    cache: TileCache,
    loader: TileLoader,
    events: EventSender,
    size: (u32, u32),
}

impl MapViewer {
    /// Fails when the viewport's source is not in the catalog
    pub fn new(
        catalog: MapCatalog,
        viewport: ViewportState,
        cache_root: impl Into<PathBuf>,
        fetcher: Arc<dyn TileFetcher>,
        runtime: Handle,
    ) -> Result<(Self, Receiver<ViewerEvent>), ConfigError> {
        if catalog.get(viewport.source_id()).is_none() {
            return Err(ConfigError::UnknownDefaultMap(viewport.source_id().to_string()));
        }

        let (events, receiver) = crossbeam_channel::unbounded();
        let loader = TileLoader::new(catalog.clone(), cache_root, fetcher, runtime, events.clone());
        let viewer = Self {
            catalog,
            viewport,
            cache: TileCache::new(),
            loader,
            events,
            size: (0, 0),
        };
        Ok((viewer, receiver))
    }

    /// Viewer over the real HTTP client, starting where the settings say
    pub fn from_settings(
        settings: &Settings,
        catalog: MapCatalog,
        runtime: Handle,
    ) -> Result<(Self, Receiver<ViewerEvent>), ConfigError> {
        let source = catalog.default_source(settings.viewer.default_map.as_deref())?;
        let zoom = settings
            .viewer
            .zoom
            .unwrap_or(MIN_ZOOM_LEVEL)
            .clamp(MIN_ZOOM_LEVEL, MAX_ZOOM_LEVEL);

        let viewport = match (settings.viewer.center_lon, settings.viewer.center_lat) {
            (Some(lon), Some(lat)) => {
                let (x, y) = lonlat_to_pixel(source.projection, zoom, lon, lat);
                ViewportState::new(source.id.as_str(), zoom, x, y)
            }
            _ => ViewportState::centered(source.id.as_str(), zoom),
        };
        debug!("Starting with map '{}' at zoom {}", source.title, zoom);

        let fetcher = Arc::new(HttpFetcher::new(&settings.network)?);
        Self::new(catalog, viewport, settings.paths.cache.clone(), fetcher, runtime)
    }

    pub fn catalog(&self) -> &MapCatalog {
        &self.catalog
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn zoom(&self) -> u8 {
        self.viewport.zoom()
    }

    pub fn generation(&self) -> u64 {
        self.viewport.generation()
    }

    pub fn loading_count(&self) -> usize {
        self.loader.loading_count()
    }

    /// The active map source
    pub fn source(&self) -> Option<&MapSource> {
        self.catalog.get(self.viewport.source_id())
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Lines worth logging once the app's logger is up
    pub fn startup_summary(&self) -> Vec<String> {
        let title = self
            .source()
            .map(|source| source.title.as_str())
            .unwrap_or_default();
        vec![
            format!("Cache directory: {}", self.loader.cache_root().display()),
            format!("Loaded {} map sources", self.catalog.len()),
            format!("Starting with map '{}' at zoom {}", title, self.viewport.zoom()),
        ]
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.size != (width, height) {
            self.size = (width, height);
            emit(&self.events, ViewerEvent::Repaint);
        }
    }

    pub fn nudge(&mut self, direction: PanDirection) {
        self.viewport.nudge(direction);
        emit(&self.events, ViewerEvent::Repaint);
    }

    pub fn press(&mut self, x: i64, y: i64) {
        self.viewport.begin_drag(x, y);
    }

    pub fn motion(&mut self, x: i64, y: i64) {
        if self.viewport.drag_to(x, y) {
            emit(&self.events, ViewerEvent::Repaint);
        }
    }

    pub fn release(&mut self, x: i64, y: i64, now: Instant) {
        if self.viewport.end_drag(x, y, self.size, now) {
            emit(&self.events, ViewerEvent::Repaint);
        }
    }

    /// Zoom one level, keeping the point at `anchor` (offset from the
    /// viewport center) under the cursor. No-op at the zoom limits.
    pub fn change_zoom(&mut self, anchor: Option<(i64, i64)>, zoom_in: bool) -> bool {
        if !self.viewport.zoom_step(anchor, zoom_in) {
            return false;
        }
        self.loader.cancel_all();
        debug!("Zoom {} (generation {})", self.viewport.zoom(), self.viewport.generation());
        emit(&self.events, ViewerEvent::ZoomChanged(self.viewport.zoom()));
        true
    }

    /// Switch the active map source. Unknown ids are ignored.
    pub fn change_map(&mut self, id: &str) -> bool {
        let Some(next) = self.catalog.get(id) else {
            debug!("Ignoring unknown map source '{}'", id);
            return false;
        };
        let Some(current) = self.catalog.get(self.viewport.source_id()) else {
            return false;
        };

        self.viewport
            .set_source(next.id.as_str(), current.projection, next.projection);
        self.loader.cancel_all();
        info!("Map changed to '{}'", next.title);
        emit(&self.events, ViewerEvent::MapChanged(next.title.clone()));
        true
    }

    /// Apply finished disk reads and downloads. Call once per frame.
    pub fn apply_completions(&mut self) -> usize {
        self.loader
            .apply_completions(&mut self.cache, self.viewport.generation())
    }

    /// Expire the cursor marker when its time is up
    pub fn tick(&mut self, now: Instant) {
        if self.viewport.tick(now) {
            emit(&self.events, ViewerEvent::Repaint);
        }
    }

    /// Lay out the visible tiles, starting acquisition of every missing one
    /// and substituting an upscaled ancestor where one is cached. Purges the
    /// cache afterwards.
    pub fn draw(&mut self) -> Frame {
        let (width, height) = self.size;
        let generation = self.viewport.generation();
        let mut tiles = Vec::new();

        if let Some(range) = self.viewport.visible_range(width, height) {
            let source = self.viewport.source_id().clone();
            for key in range.keys(&source) {
                let (x, y) = self.viewport.tile_screen_position(&key, width, height);

                if let Some(image) = self.cache.touch(&key, generation) {
                    tiles.push(PlacedTile {
                        key,
                        x,
                        y,
                        image,
                        placeholder: false,
                    });
                    continue;
                }

                self.loader.request(&key, generation);
                if let Some(placeholder) = pyramid_fallback(&mut self.cache, &key, generation) {
                    tiles.push(PlacedTile {
                        key,
                        x,
                        y,
                        image: Arc::new(placeholder),
                        placeholder: true,
                    });
                }
            }
        }

        // Everything painted above was refreshed to the current generation
        self.cache.purge(generation);

        Frame {
            width,
            height,
            tiles,
            marker: self.viewport.marker_screen_position(width, height),
            crosshair: (width as i64 / 2, height as i64 / 2),
            scale_bar: self.viewport.scale_bar(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TileError;
    use crate::map_source::UrlTemplate;
    use crate::utils::projection::Projection;
    use async_trait::async_trait;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    fn png() -> Vec<u8> {
        let image = RgbaImage::from_pixel(256, 256, Rgba([10, 20, 30, 255]));
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png).unwrap();
        bytes
    }

    struct GatedFetcher {
        calls: AtomicUsize,
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl TileFetcher for GatedFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, TileError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| TileError::Transport(e.to_string()))?;
            Ok(png())
        }
    }

    fn catalog() -> MapCatalog {
        MapCatalog::from_sources([
            MapSource::new(
                "osm",
                "OpenStreetMap",
                "png",
                Projection::SphericalMercator,
                UrlTemplate::new("https://tile.test/{z}/{x}/{y}.png", Vec::new()),
            ),
            MapSource::new(
                "yandex",
                "Yandex",
                "png",
                Projection::EllipsoidalMercator,
                UrlTemplate::new("https://ya.test/{x}/{y}/{z}", Vec::new()),
            ),
        ])
        .unwrap()
    }

    struct Harness {
        _runtime: tokio::runtime::Runtime,
        dir: tempfile::TempDir,
        viewer: MapViewer,
        events: Receiver<ViewerEvent>,
        fetcher: Arc<GatedFetcher>,
        gate: Arc<Semaphore>,
    }

    fn harness(viewport: ViewportState) -> Harness {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let gate = Arc::new(Semaphore::new(0));
        let fetcher = Arc::new(GatedFetcher {
            calls: AtomicUsize::new(0),
            gate: gate.clone(),
        });
        let (mut viewer, events) =
            MapViewer::new(catalog(), viewport, dir.path(), fetcher.clone(), runtime.handle().clone()).unwrap();
        viewer.resize(800, 600);
        Harness {
            _runtime: runtime,
            dir,
            viewer,
            events,
            fetcher,
            gate,
        }
    }

    fn wait_for(viewer: &mut MapViewer, done: impl Fn(&MapViewer) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            viewer.apply_completions();
            if done(viewer) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn unknown_start_source_is_rejected() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let fetcher = Arc::new(GatedFetcher {
            calls: AtomicUsize::new(0),
            gate: Arc::new(Semaphore::new(0)),
        });
        let result = MapViewer::new(
            catalog(),
            ViewportState::centered("missing", 0),
            "cache",
            fetcher,
            runtime.handle().clone(),
        );
        assert!(matches!(result, Err(ConfigError::UnknownDefaultMap(_))));
    }

    #[test]
    fn zoom_change_cancels_loading_and_notifies() {
        let mut h = harness(ViewportState::centered("osm", 2));
        h.viewer.draw();
        assert!(wait_for(&mut h.viewer, |v| v.loading_count() == 16));

        assert!(h.viewer.change_zoom(None, true));
        assert_eq!(h.viewer.loading_count(), 0);
        assert_eq!(h.viewer.generation(), 1);

        let events: Vec<_> = h.events.try_iter().collect();
        assert_eq!(events.last(), Some(&ViewerEvent::ZoomChanged(3)));
        assert!(events.contains(&ViewerEvent::Loading(0)));
    }

    #[test]
    fn startup_summary_names_cache_sources_and_default_map() {
        let h = harness(ViewportState::centered("yandex", 4));
        let lines = h.viewer.startup_summary();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], format!("Cache directory: {}", h.dir.path().display()));
        assert_eq!(lines[1], "Loaded 2 map sources");
        assert_eq!(lines[2], "Starting with map 'Yandex' at zoom 4");
    }

    #[test]
    fn zoom_limit_is_silent() {
        let mut h = harness(ViewportState::centered("osm", 0));
        h.events.try_iter().count();
        assert!(!h.viewer.change_zoom(Some((10, 10)), false));
        assert_eq!(h.viewer.generation(), 0);
        assert!(h.events.try_recv().is_err());
    }

    #[test]
    fn map_change_reprojects_and_notifies() {
        let mut h = harness(ViewportState::new("osm", 14, 2_200_000, 1_340_000));
        h.viewer.draw();
        assert!(wait_for(&mut h.viewer, |v| v.loading_count() > 0));

        assert!(h.viewer.change_map("yandex"));
        assert_eq!(h.viewer.loading_count(), 0);
        assert_eq!(h.viewer.source().unwrap().id, "yandex");
        assert_ne!(h.viewer.viewport().center().1, 1_340_000);
        assert_eq!(
            h.events.try_iter().last(),
            Some(ViewerEvent::MapChanged("Yandex".to_string()))
        );

        assert!(h.viewer.change_map("osm"));
        let (x, y) = h.viewer.viewport().center();
        assert!((x - 2_200_000).abs() <= 1 && (y - 1_340_000).abs() <= 1);
        assert_eq!(h.viewer.generation(), 2);
    }

    #[test]
    fn unknown_map_is_ignored() {
        let mut h = harness(ViewportState::centered("osm", 1));
        h.events.try_iter().count();
        assert!(!h.viewer.change_map("nope"));
        assert_eq!(h.viewer.generation(), 0);
        assert!(h.events.try_recv().is_err());
    }

    #[test]
    fn repeated_draws_issue_one_request_per_tile() {
        let mut h = harness(ViewportState::new("osm", 0, 128, 128));
        h.viewer.resize(256, 256);
        h.viewer.draw();
        h.viewer.draw();
        assert!(wait_for(&mut h.viewer, |v| v.loading_count() == 1));
        h.viewer.draw();
        h.viewer.draw();
        std::thread::sleep(Duration::from_millis(50));
        h.viewer.apply_completions();
        assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);

        h.gate.add_permits(1);
        assert!(wait_for(&mut h.viewer, |v| v.loading_count() == 0));
        let frame = h.viewer.draw();
        assert_eq!(frame.tiles.len(), 1);
        assert!(!frame.tiles[0].placeholder);
        assert!(h.dir.path().join("osm/0/0/0.png").exists());
    }

    #[test]
    fn missing_tiles_fall_back_to_cached_ancestor() {
        let mut h = harness(ViewportState::new("osm", 0, 128, 128));
        h.viewer.resize(256, 256);
        h.viewer.draw();
        h.gate.add_permits(1);
        assert!(wait_for(&mut h.viewer, |v| v.cache().len() == 1 && v.loading_count() == 0));

        // Zoom in: the four children are missing, the root stands in for them
        h.viewer.change_zoom(None, true);
        let frame = h.viewer.draw();
        assert_eq!(frame.tiles.len(), 4);
        assert!(frame.tiles.iter().all(|tile| tile.placeholder));
        assert_eq!(frame.tiles[0].key, TileKey::new("osm", 1, 0, 0));
        assert_eq!(
            h.viewer.cache().entry(&TileKey::new("osm", 0, 0, 0)).unwrap().last_used_generation,
            1
        );
    }

    #[test]
    fn tap_marker_shows_until_expiry() {
        let mut h = harness(ViewportState::centered("osm", 3));
        let now = Instant::now();
        h.viewer.press(400, 300);
        h.viewer.release(401, 301, now);
        assert_eq!(h.viewer.draw().marker, Some((401, 301)));

        h.events.try_iter().count();
        h.viewer.tick(now + Duration::from_secs(6));
        assert_eq!(h.events.try_recv(), Ok(ViewerEvent::Repaint));
        assert_eq!(h.viewer.draw().marker, None);
    }
}
