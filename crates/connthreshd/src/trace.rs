//! JSON-lines trace format.
//!
//! One record per line. Blank lines and lines starting with `#` are skipped.
//!
//! ```text
//! {"type":"packet","conn":1,"is_orig":true,"bytes":120}
//! {"type":"set_threshold","conn":1,"metric":"bytes","is_orig":false,"value":4096}
//! {"type":"delete_threshold","conn":1,"metric":"bytes","is_orig":false,"value":4096}
//! {"type":"close","conn":1}
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use conn_thresholds::{ConnId, Metric, ThresholdCrossed};

/// A malformed trace line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid trace record at line {line}: {message}")]
pub struct TraceError {
    /// 1-based line number.
    pub line: usize,
    /// Parser error message.
    pub message: String,
}

/// One event of a replayed trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceRecord {
    /// A packet seen on a connection.
    Packet {
        conn: ConnId,
        is_orig: bool,
        #[serde(default)]
        bytes: u64,
    },
    /// Policy registers a threshold.
    SetThreshold {
        conn: ConnId,
        metric: Metric,
        is_orig: bool,
        value: u64,
    },
    /// Policy deletes a threshold.
    DeleteThreshold {
        conn: ConnId,
        metric: Metric,
        is_orig: bool,
        value: u64,
    },
    /// The connection was torn down.
    Close { conn: ConnId },
}

impl TraceRecord {
    /// The connection the record refers to.
    pub fn conn(&self) -> ConnId {
        match *self {
            Self::Packet { conn, .. }
            | Self::SetThreshold { conn, .. }
            | Self::DeleteThreshold { conn, .. }
            | Self::Close { conn } => conn,
        }
    }
}

/// Parses one trace line. Returns `Ok(None)` for blank and comment lines.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<TraceRecord>, TraceError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    serde_json::from_str(line).map(Some).map_err(|e| TraceError {
        line: line_no,
        message: e.to_string(),
    })
}

/// Output line written for every published crossing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub event: String,
    pub conn: ConnId,
    pub threshold: u64,
    pub is_orig: bool,
}

impl From<ThresholdCrossed> for NotificationRecord {
    fn from(crossed: ThresholdCrossed) -> Self {
        Self {
            event: crossed.name().to_string(),
            conn: crossed.conn,
            threshold: crossed.threshold,
            is_orig: crossed.is_orig(),
        }
    }
}
