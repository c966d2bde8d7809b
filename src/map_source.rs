//! Map source registry.
//!
//! Every `*.toml` file in the maps directory describes one tile provider; the
//! file stem is its id. The catalog is resolved once at startup and never
//! reloaded, so the rest of the viewer only ever sees an immutable table.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use bevy::log::debug;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::utils::projection::Projection;

/// Produces the download URL for a tile of one map source
pub trait TileUrl: Send + Sync {
    fn url(&self, x: u32, y: u32, zoom: u8) -> String;
}

impl<F> TileUrl for F
where
    F: Fn(u32, u32, u8) -> String + Send + Sync,
{
    fn url(&self, x: u32, y: u32, zoom: u8) -> String {
        self(x, y, zoom)
    }
}

/// URL pattern with `{x}`, `{y}`, `{-y}`, `{z}`, `{q}` and `{s}` placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    pattern: String,
    subdomains: Vec<String>,
}

impl UrlTemplate {
    pub fn new(pattern: impl Into<String>, subdomains: Vec<String>) -> Self {
        Self {
            pattern: pattern.into(),
            subdomains,
        }
    }
}

impl TileUrl for UrlTemplate {
    fn url(&self, x: u32, y: u32, zoom: u8) -> String {
        let flipped_y = ((1u64 << zoom) - 1).saturating_sub(y as u64);
        let mut url = self
            .pattern
            .replace("{x}", &x.to_string())
            .replace("{-y}", &flipped_y.to_string())
            .replace("{y}", &y.to_string())
            .replace("{z}", &zoom.to_string());
        if url.contains("{q}") {
            url = url.replace("{q}", &quadkey(x, y, zoom));
        }
        if !self.subdomains.is_empty() {
            // A given tile always maps to the same mirror
            let index = (x as usize + y as usize) % self.subdomains.len();
            url = url.replace("{s}", &self.subdomains[index]);
        }
        url
    }
}

/// Bing-style quadtree key, one base-4 digit per zoom level
pub fn quadkey(x: u32, y: u32, zoom: u8) -> String {
    (1..=zoom)
        .rev()
        .map(|level| {
            let mask = 1u32 << (level - 1);
            let mut digit = b'0';
            if x & mask != 0 {
                digit += 1;
            }
            if y & mask != 0 {
                digit += 2;
            }
            digit as char
        })
        .collect()
}

/// One tile provider, immutable after load
#[derive(Clone)]
pub struct MapSource {
    pub id: String,
    pub title: String,
    /// File extension of the tiles, e.g. `png`
    pub format: String,
    pub projection: Projection,
    /// Optional accelerator key name (letter, digit or F1-F12)
    pub key: Option<String>,
    url: Arc<dyn TileUrl>,
}

impl MapSource {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        format: impl Into<String>,
        projection: Projection,
        url: impl TileUrl + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            format: format.into(),
            projection,
            key: None,
            url: Arc::new(url),
        }
    }

    pub fn tile_url(&self, x: u32, y: u32, zoom: u8) -> String {
        self.url.url(x, y, zoom)
    }
}

impl fmt::Debug for MapSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapSource")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("format", &self.format)
            .field("projection", &self.projection)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// On-disk shape of a map source file
#[derive(Debug, Deserialize)]
struct MapSourceFile {
    title: String,
    format: String,
    projection: u32,
    url: String,
    #[serde(default)]
    subdomains: Vec<String>,
    key: Option<String>,
}

/// The resolved, read-only table of map sources, ordered by id
#[derive(Debug, Clone)]
pub struct MapCatalog {
    sources: Arc<BTreeMap<String, MapSource>>,
}

impl MapCatalog {
    /// Build a catalog from already-constructed sources. Fails when empty.
    pub fn from_sources(sources: impl IntoIterator<Item = MapSource>) -> Result<Self, ConfigError> {
        let sources: BTreeMap<String, MapSource> = sources
            .into_iter()
            .map(|source| (source.id.clone(), source))
            .collect();
        if sources.is_empty() {
            return Err(ConfigError::EmptyCatalog(Default::default()));
        }
        Ok(Self {
            sources: Arc::new(sources),
        })
    }

    /// Load every `*.toml` map source in `dir`. Any unreadable or malformed
    /// entry aborts the load.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let entries = fs::read_dir(dir).map_err(|source| ConfigError::MapsDir {
            path: dir.to_path_buf(),
            source,
        })?;

        debug!("Loading maps");
        let mut sources = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|source| ConfigError::MapsDir {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            let contents = fs::read_to_string(&path).map_err(|err| ConfigError::MapSource {
                id: id.to_string(),
                reason: err.to_string(),
            })?;
            let source = parse_source(id, &contents)?;
            debug!("  {} ({})", source.id, source.title);
            sources.insert(source.id.clone(), source);
        }

        if sources.is_empty() {
            return Err(ConfigError::EmptyCatalog(dir.to_path_buf()));
        }
        debug!("Loaded {} map sources", sources.len());
        Ok(Self {
            sources: Arc::new(sources),
        })
    }

    pub fn get(&self, id: &str) -> Option<&MapSource> {
        self.sources.get(id)
    }

    /// Sources in presentation order
    pub fn iter(&self) -> impl Iterator<Item = &MapSource> {
        self.sources.values()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Pick the startup source: the configured one, else the first by id
    pub fn default_source(&self, preferred: Option<&str>) -> Result<&MapSource, ConfigError> {
        match preferred {
            Some(id) => self
                .get(id)
                .ok_or_else(|| ConfigError::UnknownDefaultMap(id.to_string())),
            None => self
                .sources
                .values()
                .next()
                .ok_or_else(|| ConfigError::EmptyCatalog(Default::default())),
        }
    }
}

fn parse_source(id: &str, contents: &str) -> Result<MapSource, ConfigError> {
    if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
        return Err(ConfigError::MapSource {
            id: id.to_string(),
            reason: "id is not usable as a directory name".to_string(),
        });
    }
    let file: MapSourceFile = toml::from_str(contents).map_err(|err| ConfigError::MapSource {
        id: id.to_string(),
        reason: err.to_string(),
    })?;
    let projection =
        Projection::from_epsg(file.projection).ok_or_else(|| ConfigError::UnknownProjection {
            id: id.to_string(),
            code: file.projection,
        })?;
    if file.format.is_empty() || file.format.contains(['/', '\\', '.']) {
        return Err(ConfigError::MapSource {
            id: id.to_string(),
            reason: format!("bad tile format '{}'", file.format),
        });
    }

    let mut source = MapSource::new(
        id,
        file.title,
        file.format,
        projection,
        UrlTemplate::new(file.url, file.subdomains),
    );
    source.key = file.key;
    Ok(source)
}
