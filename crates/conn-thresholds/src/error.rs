//! Error types for threshold operations.
//!
//! All errors implement `std::error::Error` via `thiserror`.

use thiserror::Error;

use crate::types::{ConnId, Direction, Metric};

/// Result type alias for threshold operations.
pub type ThresholdResult<T> = Result<T, ThresholdError>;

/// Result type alias for counting engine calls.
pub type EngineResult<T> = Result<T, EngineError>;

/// Failures reported by the counting engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The engine has no record of the connection (e.g. it already went away).
    #[error("Connection {conn} not known to the counting engine")]
    UnknownConnection {
        /// The connection.
        conn: ConnId,
    },

    /// The engine refused to arm the watch value.
    #[error("Engine rejected arming {metric} {direction} threshold {value} on {conn}: {message}")]
    ArmRejected {
        /// The connection.
        conn: ConnId,
        /// Watched counter.
        metric: Metric,
        /// Watched direction.
        direction: Direction,
        /// Value that was being armed.
        value: u64,
        /// Engine supplied reason.
        message: String,
    },
}

impl EngineError {
    /// Creates an unknown connection error.
    pub fn unknown_connection(conn: ConnId) -> Self {
        Self::UnknownConnection { conn }
    }

    /// Creates an arm rejection error.
    pub fn arm_rejected(
        conn: ConnId,
        metric: Metric,
        direction: Direction,
        value: u64,
        message: impl Into<String>,
    ) -> Self {
        Self::ArmRejected {
            conn,
            metric,
            direction,
            value,
            message: message.into(),
        }
    }
}

/// Errors returned by the public threshold API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThresholdError {
    /// Zero is reserved for "nothing armed" and cannot be registered.
    #[error("Invalid {metric} threshold for {conn}: threshold must be positive")]
    InvalidThreshold {
        /// The connection.
        conn: ConnId,
        /// Requested metric.
        metric: Metric,
    },

    /// Delete of a value that is not pending.
    #[error("No pending {metric} {direction} threshold {threshold} on {conn}")]
    NotPending {
        /// The connection.
        conn: ConnId,
        /// Requested metric.
        metric: Metric,
        /// Requested direction.
        direction: Direction,
        /// The threshold value.
        threshold: u64,
    },

    /// The counting engine failed while re-arming.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ThresholdError {
    /// Creates an invalid threshold error.
    pub fn invalid_threshold(conn: ConnId, metric: Metric) -> Self {
        Self::InvalidThreshold { conn, metric }
    }

    /// Creates a not pending error.
    pub fn not_pending(conn: ConnId, metric: Metric, direction: Direction, threshold: u64) -> Self {
        Self::NotPending {
            conn,
            metric,
            direction,
            threshold,
        }
    }

    /// Returns true if the bookkeeping itself was updated and only the engine
    /// call failed.
    pub fn is_engine_failure(&self) -> bool {
        matches!(self, Self::Engine(_))
    }
}
