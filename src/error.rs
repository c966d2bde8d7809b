use std::path::PathBuf;

use thiserror::Error;

/// Startup errors. Any of these aborts the viewer before a window is shown.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Settings file could not be read
    #[error("failed to read settings file {path}: {source}")]
    ReadSettings {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Settings file is not valid TOML or misses a required section
    #[error("invalid settings file {path}: {source}")]
    ParseSettings {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// Maps directory could not be listed
    #[error("failed to open maps directory {path}: {source}")]
    MapsDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A single map-source entry is unreadable or malformed
    #[error("invalid map source '{id}': {reason}")]
    MapSource { id: String, reason: String },
    /// Projection code other than 3857 or 3395
    #[error("unknown projection EPSG:{code} for map source '{id}'")]
    UnknownProjection { id: String, code: u32 },
    /// No map sources were found
    #[error("no map sources found in {0}")]
    EmptyCatalog(PathBuf),
    /// `default_map` names a source that does not exist
    #[error("default map source '{0}' is not in the catalog")]
    UnknownDefaultMap(String),
    /// HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Per-tile failures. These never surface to the user; the tile just stays
/// absent until the next redraw retries it.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// Tile wasn't found (404)
    #[error("tile not found")]
    NotFound,
    /// Server answered with a non-success status
    #[error("HTTP status {0}")]
    Http(u16),
    /// Connection, TLS or body transfer failure
    #[error("transport error: {0}")]
    Transport(String),
    /// Bytes were present but not a decodable image
    #[error("decode error: {0}")]
    Decode(String),
    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TileError {
    fn from(err: std::io::Error) -> Self {
        TileError::Io(err.to_string())
    }
}

impl From<image::ImageError> for TileError {
    fn from(err: image::ImageError) -> Self {
        TileError::Decode(err.to_string())
    }
}
