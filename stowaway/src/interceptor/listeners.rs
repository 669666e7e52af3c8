use stowaway_core::{Progress, TransportError};

use super::response::ResponseState;

/// Kinds of events a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`RequestEvent::ReadyStateChange`].
    ReadyStateChange,
    /// [`RequestEvent::Progress`].
    Progress,
    /// [`RequestEvent::Load`].
    Load,
    /// [`RequestEvent::Error`].
    Error,
    /// [`RequestEvent::Timeout`].
    Timeout,
    /// [`RequestEvent::Abort`].
    Abort,
}

/// Events delivered to caller listeners.
#[derive(Debug)]
pub enum RequestEvent<'a> {
    /// The ready state changed.
    ReadyStateChange(&'a ResponseState),
    /// Part of the body arrived.
    Progress(Progress),
    /// The session completed successfully.
    Load(&'a ResponseState),
    /// The session failed.
    Error(&'a TransportError),
    /// The transport timed out.
    Timeout,
    /// The session was aborted.
    Abort,
}

impl RequestEvent<'_> {
    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            RequestEvent::ReadyStateChange(_) => EventKind::ReadyStateChange,
            RequestEvent::Progress(_) => EventKind::Progress,
            RequestEvent::Load(_) => EventKind::Load,
            RequestEvent::Error(_) => EventKind::Error,
            RequestEvent::Timeout => EventKind::Timeout,
            RequestEvent::Abort => EventKind::Abort,
        }
    }
}

/// A caller listener.
pub type Listener = Box<dyn FnMut(&RequestEvent<'_>) + Send>;

/// Listeners kept in registration order.
#[derive(Default)]
pub(crate) struct Listeners {
    entries: Vec<(EventKind, Listener)>,
}

impl Listeners {
    pub(crate) fn add(&mut self, kind: EventKind, listener: Listener) {
        self.entries.push((kind, listener));
    }

    pub(crate) fn emit(&mut self, event: &RequestEvent<'_>) {
        let kind = event.kind();
        for (_, listener) in self.entries.iter_mut().filter(|(k, _)| *k == kind) {
            listener(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
