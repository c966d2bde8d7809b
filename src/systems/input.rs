use std::time::Instant;

use bevy::input::mouse::MouseWheel;
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use tileview::{MapViewer, PanDirection};

const LETTER_KEYS: [KeyCode; 26] = [
    KeyCode::KeyA, KeyCode::KeyB, KeyCode::KeyC, KeyCode::KeyD, KeyCode::KeyE, KeyCode::KeyF,
    KeyCode::KeyG, KeyCode::KeyH, KeyCode::KeyI, KeyCode::KeyJ, KeyCode::KeyK, KeyCode::KeyL,
    KeyCode::KeyM, KeyCode::KeyN, KeyCode::KeyO, KeyCode::KeyP, KeyCode::KeyQ, KeyCode::KeyR,
    KeyCode::KeyS, KeyCode::KeyT, KeyCode::KeyU, KeyCode::KeyV, KeyCode::KeyW, KeyCode::KeyX,
    KeyCode::KeyY, KeyCode::KeyZ,
];

const DIGIT_KEYS: [KeyCode; 10] = [
    KeyCode::Digit0, KeyCode::Digit1, KeyCode::Digit2, KeyCode::Digit3, KeyCode::Digit4,
    KeyCode::Digit5, KeyCode::Digit6, KeyCode::Digit7, KeyCode::Digit8, KeyCode::Digit9,
];

const FUNCTION_KEYS: [KeyCode; 12] = [
    KeyCode::F1, KeyCode::F2, KeyCode::F3, KeyCode::F4, KeyCode::F5, KeyCode::F6,
    KeyCode::F7, KeyCode::F8, KeyCode::F9, KeyCode::F10, KeyCode::F11, KeyCode::F12,
];

/// Resolve a map source accelerator name: a letter, a digit or F1-F12
pub fn key_code_for(name: &str) -> Option<KeyCode> {
    let name = name.trim().to_ascii_uppercase();
    let bytes = name.as_bytes();
    match bytes {
        [c @ b'A'..=b'Z'] => Some(LETTER_KEYS[(c - b'A') as usize]),
        [c @ b'0'..=b'9'] => Some(DIGIT_KEYS[(c - b'0') as usize]),
        [b'F', ..] => {
            let n: usize = name[1..].parse().ok()?;
            FUNCTION_KEYS.get(n.checked_sub(1)?).copied()
        }
        _ => None,
    }
}

/// Arrow keys pan by a fixed step, PageUp/PageDown (and +/-) zoom around
/// the center
pub fn keyboard_navigation(keys: Res<ButtonInput<KeyCode>>, mut viewer: ResMut<MapViewer>) {
    let nudges = [
        (KeyCode::ArrowLeft, PanDirection::Left),
        (KeyCode::ArrowRight, PanDirection::Right),
        (KeyCode::ArrowUp, PanDirection::Up),
        (KeyCode::ArrowDown, PanDirection::Down),
    ];
    for (key, direction) in nudges {
        if keys.just_pressed(key) {
            viewer.nudge(direction);
        }
    }

    if keys.any_just_pressed([KeyCode::PageUp, KeyCode::Equal, KeyCode::NumpadAdd]) {
        viewer.change_zoom(None, true);
    }
    if keys.any_just_pressed([KeyCode::PageDown, KeyCode::Minus, KeyCode::NumpadSubtract]) {
        viewer.change_zoom(None, false);
    }
}

/// Switch map source when its accelerator key is pressed
pub fn map_accelerators(keys: Res<ButtonInput<KeyCode>>, mut viewer: ResMut<MapViewer>) {
    if keys.get_just_pressed().next().is_none() {
        return;
    }

    let target = viewer
        .catalog()
        .iter()
        .find(|source| {
            source
                .key
                .as_deref()
                .and_then(key_code_for)
                .is_some_and(|code| keys.just_pressed(code))
        })
        .map(|source| source.id.clone());

    if let Some(id) = target {
        viewer.change_map(&id);
    }
}

/// Left button drags the map; a click without movement drops the marker
pub fn mouse_drag(
    buttons: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut cursor_moved: EventReader<CursorMoved>,
    mut last_pointer: Local<Vec2>,
    mut viewer: ResMut<MapViewer>,
) {
    let Ok(window) = windows.get_single() else {
        return;
    };
    if let Some(position) = window.cursor_position() {
        *last_pointer = position;
    }

    if buttons.just_pressed(MouseButton::Left) {
        viewer.press(last_pointer.x as i64, last_pointer.y as i64);
    }

    // Only the latest position of this frame matters
    if let Some(moved) = cursor_moved.read().last() {
        *last_pointer = moved.position;
        if viewer.viewport().is_dragging() {
            viewer.motion(moved.position.x as i64, moved.position.y as i64);
        }
    }

    if buttons.just_released(MouseButton::Left) {
        viewer.release(last_pointer.x as i64, last_pointer.y as i64, Instant::now());
    }
}

/// Scroll wheel zooms, keeping the point under the cursor in place
pub fn mouse_wheel_zoom(
    mut wheel: EventReader<MouseWheel>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut viewer: ResMut<MapViewer>,
) {
    let Ok(window) = windows.get_single() else {
        return;
    };

    for event in wheel.read() {
        if event.y == 0.0 {
            continue;
        }
        // Anchor is the cursor's offset from the viewport center
        let anchor = window.cursor_position().map(|position| {
            (
                position.x as i64 - window.width() as i64 / 2,
                position.y as i64 - window.height() as i64 / 2,
            )
        });
        viewer.change_zoom(anchor, event.y > 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accelerator_names() {
        assert_eq!(key_code_for("o"), Some(KeyCode::KeyO));
        assert_eq!(key_code_for("Y"), Some(KeyCode::KeyY));
        assert_eq!(key_code_for("7"), Some(KeyCode::Digit7));
        assert_eq!(key_code_for("F1"), Some(KeyCode::F1));
        assert_eq!(key_code_for("f12"), Some(KeyCode::F12));
        assert_eq!(key_code_for("F13"), None);
        assert_eq!(key_code_for("F0"), None);
        assert_eq!(key_code_for("ctrl"), None);
        assert_eq!(key_code_for(""), None);
    }
}
