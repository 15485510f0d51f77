use ractor::ActorId;
use thiserror::Error;

/// Exit reason a child actor sends when asked to terminate gracefully.
///
/// A child that stops with this reason is treated as a "shutdown exit" by
/// the restart engine (not restarted for `Transient`/`Intrinsic` children).
pub const EXIT_SHUTDOWN: &str = "shutdown";

/// Reason fragment attached to supervisor-issued brutal kills.
pub(crate) const TERMINATED_BY_SUPERVISOR: &str = "TerminatedBySupervisor";

/// Possible errors from the supervisor's own logic.
#[derive(Error, Debug, Clone)]
pub enum SupervisorError {
    /// Too many restarts inside the configured window. The supervisor
    /// terminates its remaining children and exits abnormally with this
    /// reason.
    #[error("exit-from={supervisor},reason=ReachedMaxRestartIntensity")]
    ReachedMaxRestartIntensity {
        /// Name (or id rendering) of the supervisor that melted down.
        supervisor: String,
    },

    /// Two initial child specs share a key. Reported to the spawner as a
    /// startup failure; a running supervisor never sees this.
    #[error("duplicate child key '{0}' in initial specs")]
    DuplicateInitialKey(String),
}

/// How a monitored child was observed to terminate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiedReason {
    /// The child stopped itself without an exit reason.
    Normal,
    /// The child honored a graceful-exit request (reason [`EXIT_SHUTDOWN`]).
    Shutdown,
    /// The child's handler returned an error or panicked.
    Exception(String),
    /// The supervisor brutally killed the child.
    KilledBy {
        /// The supervisor that issued the kill.
        killer: ActorId,
        /// Reason attached to the kill.
        reason: String,
    },
    /// The child stopped with a reason this supervisor does not recognize.
    Unknown(String),
}

/// Coarse classification of a [`DiedReason`], the input to the restart
/// decision matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// A clean, voluntary exit.
    Normal,
    /// A graceful exit requested by a supervisor.
    Shutdown,
    /// Everything else: exceptions, kills, unrecognized reasons.
    Abnormal,
}

impl DiedReason {
    /// Classify this reason for the restart decision matrix.
    pub fn kind(&self) -> ExitKind {
        match self {
            DiedReason::Normal => ExitKind::Normal,
            DiedReason::Shutdown => ExitKind::Shutdown,
            DiedReason::Exception(_) | DiedReason::KilledBy { .. } | DiedReason::Unknown(_) => {
                ExitKind::Abnormal
            }
        }
    }

    /// Reason for a supervisor-issued brutal kill.
    pub(crate) fn killed_by(killer: ActorId) -> Self {
        DiedReason::KilledBy {
            killer,
            reason: TERMINATED_BY_SUPERVISOR.to_string(),
        }
    }

    /// Classify a graceful-stop reason reported by the runtime.
    pub(crate) fn from_stop_reason(reason: Option<String>) -> Self {
        match reason.as_deref() {
            None => DiedReason::Normal,
            Some(EXIT_SHUTDOWN) => DiedReason::Shutdown,
            Some(other) => DiedReason::Unknown(other.to_string()),
        }
    }
}

impl std::fmt::Display for DiedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiedReason::Normal => write!(f, "normal"),
            DiedReason::Shutdown => write!(f, "shutdown"),
            DiedReason::Exception(msg) => write!(f, "exception: {msg}"),
            DiedReason::KilledBy { killer, reason } => {
                write!(f, "killed-by={killer},reason={reason}")
            }
            DiedReason::Unknown(reason) => write!(f, "unknown: {reason}"),
        }
    }
}
