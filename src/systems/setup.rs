use bevy::prelude::*;
use image::RgbaImage;
use tileview::MapViewer;

use crate::components::MapSprite;
use crate::systems::render::{create_image_from_rgba8, MapCanvas};

/// Spawn the 2D camera and the sprite every map frame is blitted into
pub fn setup(mut commands: Commands, mut images: ResMut<Assets<Image>>) {
    commands.spawn(Camera2d);

    // Real size is set on the first redraw, once the window size is known
    let handle = images.add(create_image_from_rgba8(RgbaImage::new(1, 1)));
    commands.spawn((Sprite::from_image(handle.clone()), Transform::default(), MapSprite));
    commands.insert_resource(MapCanvas { handle, dirty: true });
}

/// Configuration is loaded before `LogPlugin` installs its subscriber, so the
/// startup facts are reported from here
pub fn log_startup(viewer: Res<MapViewer>) {
    for line in viewer.startup_summary() {
        info!("{}", line);
    }
}
