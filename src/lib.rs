//! Tile cache, asynchronous tile acquisition and viewport state for a
//! slippy-map viewer. The Bevy shell in `main.rs` drives [`MapViewer`].

pub mod error;
pub mod events;
pub mod map_source;
pub mod resources;
pub mod tile_system;
pub mod utils;
pub mod viewer;
pub mod viewport;

pub use error::{ConfigError, TileError};
pub use events::ViewerEvent;
pub use map_source::{MapCatalog, MapSource};
pub use resources::settings::Settings;
pub use viewer::{Frame, MapViewer, PlacedTile};
pub use viewport::{PanDirection, ViewportState};
