use std::fmt;

use crate::error::SessionError;

/// Session state changes an application can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    Disconnected,
    Subscribed,
    Published,
    Error,
}

impl EventKind {
    pub const COUNT: usize = 5;

    fn index(self) -> usize {
        match self {
            EventKind::Connected => 0,
            EventKind::Disconnected => 1,
            EventKind::Subscribed => 2,
            EventKind::Published => 3,
            EventKind::Error => 4,
        }
    }
}

/// Receives `None` for plain state changes and the failing status for [`EventKind::Error`].
pub type EventCallback = Box<dyn FnMut(Option<SessionError>) + Send>;

/// One optional callback per [`EventKind`]. Registering again replaces the previous one.
#[derive(Default)]
pub struct EventDispatch {
    slots: [Option<EventCallback>; EventKind::COUNT],
}

impl EventDispatch {
    pub fn register(&mut self, kind: EventKind, callback: EventCallback) {
        self.slots[kind.index()] = Some(callback);
    }

    /// Invoke the callback for `kind` on the current task, if one is registered.
    pub fn dispatch(&mut self, kind: EventKind, status: Option<SessionError>) {
        if let Some(callback) = self.slots[kind.index()].as_mut() {
            callback(status);
        }
    }
}

impl fmt::Debug for EventDispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| i)
            .collect();

        f.debug_struct("EventDispatch")
            .field("registered", &registered)
            .finish()
    }
}
