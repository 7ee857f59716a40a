//! Stage-layer error types.
//!
//! Only contract violations and routing failures are errors.  Expected
//! outcomes such as a missed ride are diagnostics returned as `String` from
//! [`Stage::set_arrived`](crate::Stage::set_arrived).

use thiserror::Error;

use tp_core::{ModeSet, Tick};

/// The router found no feasible stage sequence under the trip's mode
/// constraints.  Recoverable: the owner decides between retry and abort.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("no connection between edge '{from}' and edge '{to}' for modes '{modes}' (agent '{agent}')")]
pub struct UnroutableTrip {
    pub agent: String,
    pub from:  String,
    pub to:    String,
    pub modes: ModeSet,
}

/// Errors produced by `tp-stage`.
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Unroutable(#[from] UnroutableTrip),

    /// A time-based query or transition was made before the stage departed.
    #[error("time {now} precedes the stage's departure at {departed}")]
    BeforeDeparture { now: Tick, departed: Tick },

    /// The caller broke an ordering contract (e.g. boarding a stage that is
    /// not waiting for a vehicle).
    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("stage already arrived at {arrived}; second arrival at {now}")]
    DoubleArrival { arrived: Tick, now: Tick },
}

impl StageError {
    /// `true` for the two contract-violation kinds raised by time and
    /// ordering checks.
    pub fn is_precondition(&self) -> bool {
        matches!(self, StageError::BeforeDeparture { .. } | StageError::Precondition(_))
    }
}

pub type StageResult<T> = Result<T, StageError>;
