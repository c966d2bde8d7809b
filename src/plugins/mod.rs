mod core_plugin;
mod input_plugin;
mod map_plugin;
mod ui_plugin;

use bevy::app::PluginGroupBuilder;
use bevy::prelude::*;
use core_plugin::CorePlugin;
use input_plugin::InputPlugin;
use map_plugin::MapPlugin;
use ui_plugin::UiPlugin;

/// Consolidated plugin struct that groups all application plugins
pub struct AppPlugins;

impl PluginGroup for AppPlugins {
    fn build(self) -> PluginGroupBuilder {
        PluginGroupBuilder::start::<Self>()
            .add(CorePlugin)
            .add(InputPlugin)
            .add(MapPlugin)
            .add(UiPlugin)
    }
}
