//! Error types and handling
//!
//! Domain errors are split into the four kinds the orchestrator distinguishes:
//! user-input errors, external-system errors, concurrent-state errors (carried
//! as sentinel kinds so callers can match without string parsing), and internal
//! invariant violations, which simply propagate as [`AlcaError::Internal`].

use thiserror::Error;

/// Sentinel kinds for concurrent-state errors that orchestration code needs to
/// match on without parsing error strings (container not running, missing
/// state, and so on).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    /// The container exists but is not running (e.g. `exec` requested on a stopped container).
    NotRunning,
    /// No container could be found for this project.
    NotFound,
    /// No project configuration file could be located.
    ConfigNotFound,
    /// No persisted project state exists yet.
    StateNotFound,
}

impl std::fmt::Display for StateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotRunning => "not-running",
            Self::NotFound => "not-found",
            Self::ConfigNotFound => "config-not-found",
            Self::StateNotFound => "state-not-found",
        };
        write!(f, "{s}")
    }
}

/// Domain errors for Alcatraz.
#[derive(Error, Debug)]
pub enum AlcaError {
    /// User-input errors: missing configuration, unknown template, bad flag,
    /// an orphan selection out of range. Reported with a single actionable
    /// sentence and a non-zero exit; no stack trace.
    #[error("{message}")]
    UserInput { message: String },

    /// External-system errors: runtime CLI missing or failing, sync daemon
    /// unreachable, privilege escalation failed. Wrapped with the failing
    /// subsystem's name and captured output where available.
    #[error("{subsystem}: {message}")]
    ExternalSystem { subsystem: String, message: String },

    /// Concurrent-state errors mapped to a small, matchable sentinel set.
    #[error("{kind}: {message}")]
    State { kind: StateKind, message: String },

    /// Internal invariant violations: a malformed diff, a state file that
    /// parses but violates its schema. These abort; there is no auto-recovery.
    #[error("internal invariant violation: {0}")]
    Internal(String),

    /// I/O errors bubbled up from the real filesystem.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors on persisted documents.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AlcaError {
    pub fn user_input(message: impl Into<String>) -> Self {
        Self::UserInput {
            message: message.into(),
        }
    }

    pub fn external(subsystem: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalSystem {
            subsystem: subsystem.into(),
            message: message.into(),
        }
    }

    pub fn state(kind: StateKind, message: impl Into<String>) -> Self {
        Self::State {
            kind,
            message: message.into(),
        }
    }

    /// Returns the sentinel [`StateKind`] carried by this error, if any.
    pub fn state_kind(&self) -> Option<StateKind> {
        match self {
            Self::State { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// True if this error represents "missing state", which several commands
    /// (notably `down`) treat as a no-op rather than a failure. Recovery from
    /// this condition lives solely in the command orchestrator, per the
    /// propagation policy: components never recover, they return.
    pub fn is_missing_state(&self) -> bool {
        matches!(
            self.state_kind(),
            Some(StateKind::StateNotFound) | Some(StateKind::NotFound)
        )
    }
}

/// Convenience type alias for Results with [`AlcaError`].
pub type Result<T> = std::result::Result<T, AlcaError>;
