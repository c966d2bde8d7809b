use bevy::prelude::*;

/// Marker component for the sprite the map frame is blitted into
#[derive(Component)]
pub struct MapSprite;

/// Status labels along the edges of the window
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusText {
    /// Outstanding downloads
    Loading,
    Zoom,
    /// Title of the active map
    Map,
    /// Scale bar label
    Scale,
}
