pub mod cache;
pub mod downloader;
pub mod loader;
pub mod pyramid;
pub mod types;

// Re-export main types
pub use cache::{CacheEntry, TileCache};
pub use downloader::{HttpFetcher, TileFetcher};
pub use loader::TileLoader;
pub use pyramid::pyramid_fallback;
pub use types::{TileImage, TileKey, TileRange};
