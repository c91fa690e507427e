//! Connection threshold types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Armed value meaning "nothing is being watched".
pub const NO_THRESHOLD: u64 = 0;

/// Identity of a connection owned by the surrounding system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnId(pub u64);

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C{:x}", self.0)
    }
}

impl From<u64> for ConnId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Counter a threshold is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Payload bytes.
    Bytes,
    /// Packets.
    Packets,
}

impl Metric {
    /// Both metrics, in table order.
    pub const ALL: [Metric; 2] = [Metric::Bytes, Metric::Packets];

    /// Returns the metric name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bytes => "bytes",
            Self::Packets => "packets",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Bytes => 0,
            Self::Packets => 1,
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bytes" | "byte" => Ok(Self::Bytes),
            "packets" | "packet" | "pkts" => Ok(Self::Packets),
            _ => Err(format!("Unknown threshold metric: {}", s)),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Traffic direction of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Traffic sent by the connection originator.
    #[serde(alias = "orig")]
    Originator,
    /// Traffic sent by the responder.
    #[serde(alias = "resp")]
    Responder,
}

impl Direction {
    /// Both directions, in table order.
    pub const ALL: [Direction; 2] = [Direction::Originator, Direction::Responder];

    /// Returns true for the originator direction.
    pub fn is_orig(self) -> bool {
        matches!(self, Self::Originator)
    }

    /// Returns the short direction name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Originator => "orig",
            Self::Responder => "resp",
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Originator => 0,
            Self::Responder => 1,
        }
    }
}

impl From<bool> for Direction {
    fn from(is_orig: bool) -> Self {
        if is_orig {
            Self::Originator
        } else {
            Self::Responder
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orig" | "originator" => Ok(Self::Originator),
            "resp" | "responder" => Ok(Self::Responder),
            _ => Err(format!("Unknown direction: {}", s)),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
