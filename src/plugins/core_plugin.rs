use bevy::prelude::*;
use tileview::ViewerEvent;

use crate::systems::render::pump_viewer;
use crate::systems::setup::{log_startup, setup};
use crate::systems::window::sync_viewport_size;

/// Core plugin: camera and canvas setup, and the hand-off between the
/// viewer core and Bevy's event queue
pub struct CorePlugin;

impl Plugin for CorePlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<ViewerEvent>()
            .add_systems(Startup, (setup, log_startup))
            .add_systems(Update, (sync_viewport_size, pump_viewer).chain());
    }
}
