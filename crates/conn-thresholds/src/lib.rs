//! Per-connection byte and packet thresholds.
//!
//! Policy code registers any number of thresholds per connection, metric
//! (bytes, packets) and direction (originator, responder) and is notified
//! once when the connection's counters reach each of them. Counting is done
//! by an external engine that can watch a single value per
//! (connection, metric, direction); this crate decides which value that is.
//!
//! - [`ThresholdOrch`]: public set/delete API, rearm logic, crossing handler
//! - [`EngineGateway`]: trait implemented by the counting engine
//! - [`ThresholdSet`] / [`ConnectionThresholdState`]: pending thresholds
//! - [`ThresholdCrossed`]: notification delivered to subscribers
//!
//! # Event flow
//!
//! ```text
//! policy ── set_*/delete_* ──> ThresholdOrch ── rearm ──> EngineGateway
//!                                   ▲                          │
//!                                   └── handle_crossing <──────┘
//!                                   │
//!                                   └── ThresholdCrossed ──> subscribers
//! ```
//!
//! # Example
//!
//! ```ignore
//! use conn_thresholds::{ConnId, Direction, ThresholdOrch, ThresholdOrchConfig};
//!
//! let mut orch = ThresholdOrch::new(engine, ThresholdOrchConfig::default());
//! let mut crossings = orch.subscribe();
//!
//! orch.set_bytes_threshold(ConnId(1), 1_000_000, Direction::Originator)?;
//!
//! // Later, for every crossing the engine raises:
//! orch.handle_crossing(crossing);
//! ```

mod conn_table;
mod engine;
mod error;
mod notify;
mod orch;
mod threshold_set;
mod types;

pub use conn_table::ConnTable;
pub use engine::{EngineCrossing, EngineGateway};
pub use error::{EngineError, EngineResult, ThresholdError, ThresholdResult};
pub use notify::{Notifier, ThresholdCrossed};
pub use orch::{ThresholdOrch, ThresholdOrchConfig, ThresholdOrchStats};
pub use threshold_set::{ConnectionThresholdState, ThresholdSet};
pub use types::{ConnId, Direction, Metric, NO_THRESHOLD};
