use bevy::prelude::*;
use crossbeam_channel::Receiver;
use tokio::runtime::Runtime;

use crate::events::ViewerEvent;

/// Keeps the Tokio runtime that performs tile I/O alive for the app's lifetime
#[derive(Resource)]
pub struct TokioRuntime(pub Runtime);

/// Receiving end of the viewer's notification channel
#[derive(Resource)]
pub struct ViewerEventReceiver(pub Receiver<ViewerEvent>);
