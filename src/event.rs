// MIT License - Copyright (c) 2026 Peter Wright
// Panel event channel

use crate::state::PanelState;

/// All events that can be emitted by the panel.
///
/// Users subscribe via `panel.subscribe()` to receive a
/// `tokio::sync::broadcast::Receiver<PanelEvent>`. State changes are sent
/// while the panel lock is held, so they arrive in the exact order the
/// transitions were applied.
#[derive(Debug, Clone)]
pub enum PanelEvent {
    /// The panel moved from one state to another. Never emitted for a
    /// transition into the same state.
    StateChanged {
        old: PanelState,
        new: PanelState,
    },
    /// A command was rejected because the supplied code did not match.
    /// The panel state is unchanged.
    CommandRejected {
        command: &'static str,
    },
    /// An external action or indicator invocation failed. The local state
    /// transition completed regardless.
    ActionFailed {
        action: String,
    },
}

/// Type alias for the broadcast sender.
pub type EventSender = tokio::sync::broadcast::Sender<PanelEvent>;

/// Type alias for the broadcast receiver.
pub type EventReceiver = tokio::sync::broadcast::Receiver<PanelEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::broadcast::channel(capacity)
}
