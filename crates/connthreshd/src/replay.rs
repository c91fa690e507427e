//! Trace replay driver.
//!
//! Feeds trace records through the simulated engine and the threshold orch.
//! Every crossing the engine raises is routed through
//! [`ThresholdOrch::handle_crossing`] before anything else sees it, so
//! subscribers only ever get crossings of thresholds that were pending.

use std::io::{self, BufRead};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use conn_thresholds::{ConnId, Direction, Metric, ThresholdCrossed, ThresholdOrch};

use crate::config::{DaemonConfig, DefaultThreshold};
use crate::sim_engine::SimEngine;
use crate::trace::{parse_line, TraceError, TraceRecord};

/// Result type alias for replays.
pub type ReplayResult<T> = Result<T, ReplayError>;

/// Errors that abort a replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Reading the trace failed.
    #[error("Failed to read trace: {0}")]
    Io(#[from] io::Error),

    /// A trace line could not be parsed.
    #[error(transparent)]
    Trace(#[from] TraceError),
}

/// Counters collected while replaying.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    /// Trace records applied.
    pub records: u64,
    /// Packets counted by the engine.
    pub packets: u64,
    /// Connections seen for the first time.
    pub connections_opened: u64,
    /// Connections torn down.
    pub connections_closed: u64,
    /// Crossings raised by the engine.
    pub engine_crossings: u64,
    /// Notifications published by the orch.
    pub notifications: u64,
    /// Set/delete requests that failed.
    pub api_errors: u64,
}

/// Drives a [`ThresholdOrch`] from trace records.
#[derive(Debug)]
pub struct Replayer {
    engine: Arc<SimEngine>,
    orch: ThresholdOrch,
    defaults: Vec<DefaultThreshold>,
    stats: ReplayStats,
}

impl Replayer {
    /// Creates a replayer with a fresh simulated engine.
    pub fn new(config: DaemonConfig) -> Self {
        let engine = Arc::new(SimEngine::new());
        let orch = ThresholdOrch::new(engine.clone(), config.orch);
        Self {
            engine,
            orch,
            defaults: config.default_thresholds,
            stats: ReplayStats::default(),
        }
    }

    /// Subscribes to published crossing notifications.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ThresholdCrossed> {
        self.orch.subscribe()
    }

    pub fn orch(&self) -> &ThresholdOrch {
        &self.orch
    }

    pub fn engine(&self) -> &SimEngine {
        &self.engine
    }

    pub fn stats(&self) -> &ReplayStats {
        &self.stats
    }

    /// Replays a whole trace. Stops at the first unreadable or malformed line.
    pub fn run<R: BufRead>(&mut self, reader: R) -> ReplayResult<ReplayStats> {
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if let Some(record) = parse_line(idx + 1, &line)? {
                self.apply(record);
            }
        }

        info!(
            records = self.stats.records,
            packets = self.stats.packets,
            notifications = self.stats.notifications,
            "Trace replay complete"
        );
        Ok(self.stats.clone())
    }

    /// Applies one record and returns the notifications it published.
    pub fn apply(&mut self, record: TraceRecord) -> Vec<ThresholdCrossed> {
        self.stats.records += 1;

        match record {
            TraceRecord::Packet {
                conn,
                is_orig,
                bytes,
            } => self.packet(conn, Direction::from(is_orig), bytes),
            TraceRecord::SetThreshold {
                conn,
                metric,
                is_orig,
                value,
            } => {
                self.ensure_open(conn);
                self.set(conn, metric, value, Direction::from(is_orig));
                Vec::new()
            }
            TraceRecord::DeleteThreshold {
                conn,
                metric,
                is_orig,
                value,
            } => {
                self.ensure_open(conn);
                if let Err(e) = self.orch.delete_threshold(conn, metric, value, Direction::from(is_orig)) {
                    self.stats.api_errors += 1;
                    warn!(%conn, "delete_{}_threshold failed: {}", metric, e);
                }
                Vec::new()
            }
            TraceRecord::Close { conn } => {
                self.close(conn);
                Vec::new()
            }
        }
    }

    fn packet(&mut self, conn: ConnId, direction: Direction, bytes: u64) -> Vec<ThresholdCrossed> {
        self.ensure_open(conn);

        let crossings = match self.engine.record_packet(conn, direction, bytes) {
            Ok(crossings) => crossings,
            Err(e) => {
                warn!(%conn, "Engine dropped packet: {}", e);
                return Vec::new();
            }
        };
        self.stats.packets += 1;
        self.stats.engine_crossings += crossings.len() as u64;

        let published: Vec<_> = crossings
            .into_iter()
            .filter_map(|crossing| self.orch.handle_crossing(crossing))
            .collect();
        self.stats.notifications += published.len() as u64;
        published
    }

    fn set(&mut self, conn: ConnId, metric: Metric, value: u64, direction: Direction) {
        if let Err(e) = self.orch.set_threshold(conn, metric, value, direction) {
            self.stats.api_errors += 1;
            warn!(%conn, "set_{}_threshold failed: {}", metric, e);
        }
    }

    /// Opens a connection in the engine on first sight and installs the
    /// configured default thresholds.
    fn ensure_open(&mut self, conn: ConnId) {
        if !self.engine.open(conn) {
            return;
        }
        self.stats.connections_opened += 1;
        debug!(%conn, defaults = self.defaults.len(), "New connection");

        for default in self.defaults.clone() {
            self.set(conn, default.metric, default.value, default.direction);
        }
    }

    fn close(&mut self, conn: ConnId) {
        self.orch.remove_connection(conn);
        if self.engine.close(conn).is_some() {
            self.stats.connections_closed += 1;
            debug!(%conn, "Connection closed");
        }
    }
}
