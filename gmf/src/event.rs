//! The event packet posted to a pipeline's callback on every element state change.

use std::sync::Arc;

use crate::element::ElementState;

/// The kind of thing an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    /// An element (or the owning pipeline) transitioned state.
    StateChanged,
    /// An element posted an application-defined notification.
    Custom,
}

/// The sub-state an event carries, mirroring [`ElementState`] plus `None` and `Custom`
/// for events that do not correspond to a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SubState {
    /// No particular sub-state (used by `Custom` events).
    None,
    /// Mirrors [`ElementState::Opening`].
    Opening,
    /// Mirrors [`ElementState::Running`].
    Running,
    /// Mirrors [`ElementState::Paused`].
    Paused,
    /// Mirrors [`ElementState::Finished`].
    Finished,
    /// Mirrors [`ElementState::Stopped`].
    Stopped,
    /// Mirrors [`ElementState::Error`].
    Error,
    /// An application-defined custom notification.
    Custom,
}

impl From<ElementState> for SubState {
    fn from(state: ElementState) -> Self {
        match state {
            ElementState::None => SubState::None,
            ElementState::Opening => SubState::Opening,
            ElementState::Running => SubState::Running,
            ElementState::Paused => SubState::Paused,
            ElementState::Finished => SubState::Finished,
            ElementState::Stopped => SubState::Stopped,
            ElementState::Error => SubState::Error,
        }
    }
}

/// An event packet: `{from, type, sub-state, payload, size}` in the external-interfaces
/// terms, represented here with an owned payload instead of a raw pointer/size pair.
#[derive(Debug, Clone)]
pub struct Event {
    /// The tag of the element (or pipeline) that raised the event.
    pub from: String,
    /// The event's kind.
    pub event_type: EventType,
    /// The sub-state the event reports.
    pub sub_state: SubState,
    /// Caller-defined payload bytes, empty for most state-change events.
    pub payload: Vec<u8>,
}

impl Event {
    /// A `StateChanged` event with no payload.
    pub fn state_changed(from: impl Into<String>, sub_state: SubState) -> Self {
        Event { from: from.into(), event_type: EventType::StateChanged, sub_state, payload: Vec::new() }
    }

    /// A `Custom` event carrying an application-defined payload.
    pub fn custom(from: impl Into<String>, payload: Vec<u8>) -> Self {
        Event { from: from.into(), event_type: EventType::Custom, sub_state: SubState::Custom, payload }
    }
}

/// A handler invoked from the task thread; it must not block, since doing so would stall
/// the worker loop that raised the event.
pub type EventCallback = Arc<dyn Fn(&Event) + Send + Sync>;
