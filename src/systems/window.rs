use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use tileview::MapViewer;

/// Keep the viewer's viewport size in step with the window
pub fn sync_viewport_size(windows: Query<&Window, With<PrimaryWindow>>, mut viewer: ResMut<MapViewer>) {
    if let Ok(window) = windows.get_single() {
        let size = (window.width() as u32, window.height() as u32);
        // Only touch the resource on change so it is not marked dirty every frame
        if viewer.size() != size {
            viewer.resize(size.0, size.1);
        }
    }
}
