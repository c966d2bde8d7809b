use bevy::prelude::*;

use crate::systems::render::{pump_viewer, redraw_map};

/// Repaints the map sprite whenever the viewer asked for it
pub struct MapPlugin;

impl Plugin for MapPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, redraw_map.after(pump_viewer));
    }
}
