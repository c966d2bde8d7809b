use std::time::Instant;

use bevy::prelude::*;
use bevy::render::render_asset::RenderAssetUsages;
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use tileview::resources::ViewerEventReceiver;
use tileview::{Frame, MapViewer, ViewerEvent};

use crate::components::MapSprite;

const BACKGROUND: Rgba<u8> = Rgba([224, 224, 224, 255]);
const CROSSHAIR: Rgba<u8> = Rgba([40, 40, 40, 255]);
const MARKER: Rgba<u8> = Rgba([220, 30, 30, 255]);
const SCALE_BAR: Rgba<u8> = Rgba([0, 0, 0, 255]);

const CROSSHAIR_ARM: i64 = 8;
const MARKER_RADIUS: i64 = 5;
/// Scale bar baseline, measured from the bottom-left corner
const SCALE_BAR_LEFT: i64 = 10;
const SCALE_BAR_BOTTOM: i64 = 12;

/// Texture the composed map frame is written into
#[derive(Resource)]
pub struct MapCanvas {
    pub handle: Handle<Image>,
    /// Set when the viewer asked for a repaint since the last redraw
    pub dirty: bool,
}

/// Apply finished tile loads, expire the marker and forward the viewer's
/// notifications into Bevy's event queue
pub fn pump_viewer(
    mut viewer: ResMut<MapViewer>,
    receiver: Res<ViewerEventReceiver>,
    mut canvas: ResMut<MapCanvas>,
    mut events: EventWriter<ViewerEvent>,
) {
    viewer.apply_completions();
    viewer.tick(Instant::now());

    for event in receiver.0.try_iter() {
        // Loading counts only change the label
        if !matches!(event, ViewerEvent::Loading(_)) {
            canvas.dirty = true;
        }
        events.send(event);
    }
}

/// Draw the visible tiles into the map sprite when a repaint is pending
pub fn redraw_map(
    mut viewer: ResMut<MapViewer>,
    mut canvas: ResMut<MapCanvas>,
    mut images: ResMut<Assets<Image>>,
    mut sprites: Query<&mut Sprite, With<MapSprite>>,
) {
    if !canvas.dirty {
        return;
    }
    let (width, height) = viewer.size();
    if width == 0 || height == 0 {
        return;
    }
    canvas.dirty = false;

    let frame = viewer.draw();
    let placeholders = frame.tiles.iter().filter(|tile| tile.placeholder).count();
    debug!(
        "Redraw {}x{}: {} tiles, {} placeholders",
        width,
        height,
        frame.tiles.len(),
        placeholders
    );

    images.insert(&canvas.handle, create_image_from_rgba8(compose_frame(&frame)));
    for mut sprite in &mut sprites {
        sprite.custom_size = Some(Vec2::new(width as f32, height as f32));
    }
}

/// Paint a frame: tiles, center crosshair, cursor marker and scale bar
pub fn compose_frame(frame: &Frame) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(frame.width, frame.height, BACKGROUND);

    for tile in &frame.tiles {
        imageops::overlay(&mut canvas, &*tile.image, tile.x, tile.y);
    }

    let (cx, cy) = frame.crosshair;
    for d in -CROSSHAIR_ARM..=CROSSHAIR_ARM {
        put_pixel(&mut canvas, cx + d, cy, CROSSHAIR);
        put_pixel(&mut canvas, cx, cy + d, CROSSHAIR);
    }

    if let Some((mx, my)) = frame.marker {
        for dy in -MARKER_RADIUS..=MARKER_RADIUS {
            for dx in -MARKER_RADIUS..=MARKER_RADIUS {
                if dx * dx + dy * dy <= MARKER_RADIUS * MARKER_RADIUS {
                    put_pixel(&mut canvas, mx + dx, my + dy, MARKER);
                }
            }
        }
    }

    let baseline = frame.height as i64 - SCALE_BAR_BOTTOM;
    let end = SCALE_BAR_LEFT + frame.scale_bar.width_px as i64;
    for x in SCALE_BAR_LEFT..=end {
        put_pixel(&mut canvas, x, baseline, SCALE_BAR);
        put_pixel(&mut canvas, x, baseline + 1, SCALE_BAR);
    }
    // End ticks
    for dy in -4..=1 {
        put_pixel(&mut canvas, SCALE_BAR_LEFT, baseline + dy, SCALE_BAR);
        put_pixel(&mut canvas, end, baseline + dy, SCALE_BAR);
    }

    canvas
}

/// Clipped pixel write
fn put_pixel(canvas: &mut RgbaImage, x: i64, y: i64, colour: Rgba<u8>) {
    if x >= 0 && y >= 0 && x < canvas.width() as i64 && y < canvas.height() as i64 {
        canvas.put_pixel(x as u32, y as u32, colour);
    }
}

/// Wrap a composed frame into a Bevy texture
pub fn create_image_from_rgba8(pixels: RgbaImage) -> Image {
    Image::from_dynamic(
        DynamicImage::ImageRgba8(pixels),
        true,
        RenderAssetUsages::default(),
    )
}
