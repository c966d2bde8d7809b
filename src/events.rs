use bevy::prelude::Event;
use crossbeam_channel::Sender;

/// Notifications emitted by the viewer core, in the order the state changed
#[derive(Event, Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    /// Number of tiles with an outstanding network fetch
    Loading(usize),
    ZoomChanged(u8),
    /// Title of the newly active map source
    MapChanged(String),
    /// Something visible changed and the map should be drawn again
    Repaint,
}

pub type EventSender = Sender<ViewerEvent>;

/// Send without caring whether anybody is still listening
pub(crate) fn emit(sender: &EventSender, event: ViewerEvent) {
    let _ = sender.send(event);
}
