//! Network-subsystem error type.

use thiserror::Error;

use tp_core::{EdgeId, ModeSet, StopId};

/// Errors produced by `tp-network`.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("no route from {from} to {to} for modes '{modes}'")]
    NoRoute { from: EdgeId, to: EdgeId, modes: ModeSet },

    #[error("unknown edge '{0}'")]
    UnknownEdge(String),

    #[error("unknown stop '{0}'")]
    UnknownStop(String),

    #[error("stop {stop} of line '{line}' is not on the line's route (or out of order)")]
    StopNotOnRoute { line: String, stop: StopId },

    #[error("line '{0}' has a non-positive speed")]
    InvalidLineSpeed(String),
}

pub type NetworkResult<T> = Result<T, NetworkError>;
