//! Per-client transport choice.

use crate::transport::Transport;
use std::fmt;
use std::sync::Arc;

/// Which backend a client instance uses. Fixed at construction.
#[derive(Clone, Default)]
pub enum TransportPreference {
    /// The platform transport owned by the client.
    #[default]
    Default,
    /// A caller-supplied, externally-owned transport. When set, it serves every request
    /// issued by the client.
    Alternate(Arc<dyn Transport>),
}

impl fmt::Debug for TransportPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportPreference::Default => f.write_str("Default"),
            TransportPreference::Alternate(t) => write!(f, "Alternate({})", t.name()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Default,
    Alternate,
}

/// Resolves the active transport for a client instance.
///
/// Pure lookup; the preference is read-only for the lifetime of the selector.
#[derive(Clone)]
pub struct TransportSelector {
    preference: TransportPreference,
    default: Arc<dyn Transport>,
}

impl TransportSelector {
    pub fn new(preference: TransportPreference, default: Arc<dyn Transport>) -> Self {
        Self { preference, default }
    }

    pub fn resolve(&self) -> TransportKind {
        match self.preference {
            TransportPreference::Default => TransportKind::Default,
            TransportPreference::Alternate(_) => TransportKind::Alternate,
        }
    }

    /// The transport that serves requests for this instance.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        match &self.preference {
            TransportPreference::Default => &self.default,
            TransportPreference::Alternate(t) => t,
        }
    }

    pub fn preference(&self) -> &TransportPreference {
        &self.preference
    }
}

impl fmt::Debug for TransportSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSelector")
            .field("preference", &self.preference)
            .field("active", &self.transport().name())
            .finish()
    }
}
