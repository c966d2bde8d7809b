use bevy::prelude::*;
use tileview::{MapViewer, ViewerEvent};

use crate::components::StatusText;

fn loading_label(count: usize) -> String {
    if count == 0 {
        String::new()
    } else {
        format!("Loading {} tiles", count)
    }
}

fn zoom_label(zoom: u8) -> String {
    format!("Zoom: {}", zoom)
}

/// Sets up the status labels with the viewer's starting state
pub fn setup_ui(mut commands: Commands, viewer: Res<MapViewer>) {
    let title = viewer.source().map(|source| source.title.clone()).unwrap_or_default();
    let labels = [
        (StatusText::Loading, loading_label(viewer.loading_count()), Val::Px(10.0), Val::Auto, Val::Px(10.0), Val::Auto),
        (StatusText::Zoom, zoom_label(viewer.zoom()), Val::Auto, Val::Px(10.0), Val::Px(10.0), Val::Auto),
        (StatusText::Map, title, Val::Auto, Val::Px(10.0), Val::Auto, Val::Px(10.0)),
        (
            StatusText::Scale,
            viewer.viewport().scale_bar().label,
            Val::Px(10.0),
            Val::Auto,
            Val::Auto,
            Val::Px(18.0),
        ),
    ];

    for (kind, text, left, right, top, bottom) in labels {
        commands.spawn((
            Text::new(text),
            TextFont {
                font_size: 14.0,
                ..default()
            },
            // Position absolutely
            Node {
                position_type: PositionType::Absolute,
                left,
                right,
                top,
                bottom,
                ..default()
            },
            // Add background color for readability
            BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.5)),
            kind,
        ));
    }
}

/// Updates the labels from the viewer's notifications
pub fn update_status_text(mut events: EventReader<ViewerEvent>, mut labels: Query<(&mut Text, &StatusText)>) {
    for event in events.read() {
        let (target, value) = match event {
            ViewerEvent::Loading(count) => (StatusText::Loading, loading_label(*count)),
            ViewerEvent::ZoomChanged(zoom) => (StatusText::Zoom, zoom_label(*zoom)),
            ViewerEvent::MapChanged(title) => (StatusText::Map, title.clone()),
            ViewerEvent::Repaint => continue,
        };
        for (mut text, kind) in &mut labels {
            if *kind == target {
                *text = Text::new(value.clone());
            }
        }
    }
}

/// Updates the scale bar label for the current zoom and latitude
pub fn update_scale_text(viewer: Res<MapViewer>, mut labels: Query<(&mut Text, &StatusText)>) {
    let label = viewer.viewport().scale_bar().label;
    for (mut text, kind) in &mut labels {
        if *kind == StatusText::Scale && text.0 != label {
            *text = Text::new(label.clone());
        }
    }
}
