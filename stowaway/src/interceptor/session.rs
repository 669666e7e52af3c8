use http::Method;

use crate::hooks::SessionInfo;

/// Per-session mutable state, reset by every `open`.
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub(crate) method: Method,
    pub(crate) identifier: String,
    pub(crate) opened: bool,
    pub(crate) sent: bool,
    pub(crate) cache_eligible: Option<bool>,
    /// Identifier after mangling, set once the cache is consulted.
    pub(crate) cache_identifier: Option<String>,
    pub(crate) pending_cache_write: bool,
}

impl Session {
    pub(crate) fn opened(method: Method, identifier: String) -> Self {
        Self {
            method,
            identifier,
            opened: true,
            ..Self::default()
        }
    }

    pub(crate) fn info(&self) -> SessionInfo<'_> {
        SessionInfo {
            method: &self.method,
            identifier: &self.identifier,
            cache_eligible: self.cache_eligible,
            pending_cache_write: self.pending_cache_write,
        }
    }
}
