//! # connthreshd - Connection Threshold Replay Daemon
//!
//! Replays JSON-lines packet traces through a simulated counting engine and
//! the [`conn_thresholds::ThresholdOrch`], printing every published
//! `bytes_threshold_crossed` / `packets_threshold_crossed` notification.
//!
//! ## Responsibilities
//! - Load daemon configuration (orch settings, default thresholds)
//! - Simulate the counting engine's one-watch-per-slot behavior
//! - Install default thresholds when a connection is first seen
//! - Route engine crossings through the orch's crossing handler
//! - Apply policy set/delete records and connection teardown from the trace

pub mod config;
pub mod replay;
pub mod sim_engine;
pub mod trace;

pub use config::{ConfigError, DaemonConfig, DefaultThreshold};
pub use replay::{ReplayError, ReplayStats, Replayer};
pub use sim_engine::{ConnCounters, SimEngine};
pub use trace::{parse_line, NotificationRecord, TraceError, TraceRecord};
