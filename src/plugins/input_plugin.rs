use bevy::prelude::*;

use crate::systems::input::{keyboard_navigation, map_accelerators, mouse_drag, mouse_wheel_zoom};
use crate::systems::render::pump_viewer;

/// Keyboard and mouse handling. Runs before the viewer is pumped so the
/// notifications it triggers are forwarded in the same frame.
pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (keyboard_navigation, map_accelerators, mouse_drag, mouse_wheel_zoom).before(pump_viewer),
        );
    }
}
