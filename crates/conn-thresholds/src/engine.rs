//! Counting engine interface.
//!
//! The engine keeps live byte and packet counters for every connection and
//! can watch exactly one value per (connection, metric, direction). When a
//! counter reaches the watched value it raises an [`EngineCrossing`] once.
//! Arming [`NO_THRESHOLD`](crate::NO_THRESHOLD) stops watching.

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::types::{ConnId, Direction, Metric};

/// Operations the threshold orchestrator needs from the counting engine.
///
/// Implementations are called synchronously from the event path and must
/// not block.
pub trait EngineGateway: Send + Sync {
    /// Returns the byte threshold currently armed for a direction.
    fn current_bytes(&self, conn: ConnId, direction: Direction) -> EngineResult<u64>;

    /// Arms a byte threshold for a direction.
    fn arm_bytes(&self, conn: ConnId, value: u64, direction: Direction) -> EngineResult<()>;

    /// Returns the packet threshold currently armed for a direction.
    fn current_packets(&self, conn: ConnId, direction: Direction) -> EngineResult<u64>;

    /// Arms a packet threshold for a direction.
    fn arm_packets(&self, conn: ConnId, value: u64, direction: Direction) -> EngineResult<()>;

    /// Returns the armed value for any metric.
    fn current(&self, conn: ConnId, metric: Metric, direction: Direction) -> EngineResult<u64> {
        match metric {
            Metric::Bytes => self.current_bytes(conn, direction),
            Metric::Packets => self.current_packets(conn, direction),
        }
    }

    /// Arms a value for any metric.
    fn arm(&self, conn: ConnId, metric: Metric, value: u64, direction: Direction) -> EngineResult<()> {
        match metric {
            Metric::Bytes => self.arm_bytes(conn, value, direction),
            Metric::Packets => self.arm_packets(conn, value, direction),
        }
    }
}

/// Low-level crossing notification raised by the counting engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineCrossing {
    /// The connection.
    pub conn: ConnId,
    /// Counter that crossed.
    pub metric: Metric,
    /// The armed value that was reached.
    pub threshold: u64,
    /// Direction of the counter.
    pub direction: Direction,
}

impl EngineCrossing {
    pub fn new(conn: ConnId, metric: Metric, threshold: u64, direction: Direction) -> Self {
        Self {
            conn,
            metric,
            threshold,
            direction,
        }
    }

    /// Creates a byte crossing.
    pub fn bytes(conn: ConnId, threshold: u64, direction: Direction) -> Self {
        Self::new(conn, Metric::Bytes, threshold, direction)
    }

    /// Creates a packet crossing.
    pub fn packets(conn: ConnId, threshold: u64, direction: Direction) -> Self {
        Self::new(conn, Metric::Packets, threshold, direction)
    }
}
