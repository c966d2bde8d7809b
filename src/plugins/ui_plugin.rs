use bevy::prelude::*;
use bevy::time::common_conditions::on_timer;

use crate::systems::render::pump_viewer;
use crate::systems::setup::setup;
use crate::systems::ui::{setup_ui, update_scale_text, update_status_text};

/// Plugin for the status labels
pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_ui.after(setup))
            .add_systems(
                Update,
                (
                    update_status_text.after(pump_viewer),
                    // The scale only changes with zoom or vertical panning
                    update_scale_text.run_if(on_timer(std::time::Duration::from_millis(250))),
                ),
            );
    }
}
