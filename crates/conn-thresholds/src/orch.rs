//! ThresholdOrch implementation.
//!
//! Keeps every registered threshold per connection and makes sure the
//! counting engine always watches the smallest pending one.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::conn_table::ConnTable;
use crate::engine::{EngineCrossing, EngineGateway};
use crate::error::{ThresholdError, ThresholdResult};
use crate::notify::{Notifier, ThresholdCrossed};
use crate::types::{ConnId, Direction, Metric, NO_THRESHOLD};

/// Configuration for ThresholdOrch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdOrchConfig {
    /// Return rearm failures from `delete_*` instead of only logging them.
    ///
    /// Off by default: a delete reports whether the threshold was pending,
    /// while `set_*` always reports the rearm outcome.
    pub propagate_delete_rearm_errors: bool,
}

impl ThresholdOrchConfig {
    /// Sets whether delete reports rearm failures.
    pub fn with_propagate_delete_rearm_errors(mut self, propagate: bool) -> Self {
        self.propagate_delete_rearm_errors = propagate;
        self
    }
}

/// Statistics for ThresholdOrch operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThresholdOrchStats {
    /// Thresholds newly added to a set.
    pub thresholds_set: u64,
    /// Thresholds removed by an explicit delete.
    pub thresholds_deleted: u64,
    /// Set or delete requests rejected (zero value, not pending).
    pub rejected: u64,
    /// Arm commands sent to the engine.
    pub engine_writes: u64,
    /// Rearms that found the engine already watching the minimum.
    pub rearms_skipped: u64,
    /// Crossing notifications published.
    pub crossings_published: u64,
    /// Engine crossings for values that were no longer pending.
    pub stale_crossings: u64,
    /// Failed engine calls.
    pub engine_errors: u64,
}

/// ThresholdOrch - per-connection byte and packet thresholds.
///
/// The engine can watch one value per (connection, metric, direction);
/// this orch multiplexes any number of thresholds onto that slot. The armed
/// value always equals the minimum pending threshold of the matching set,
/// or [`NO_THRESHOLD`] when the set is empty. [`rearm`](Self::rearm) is the
/// only code path that writes it.
pub struct ThresholdOrch {
    config: ThresholdOrchConfig,
    engine: Arc<dyn EngineGateway>,
    table: ConnTable,
    notifier: Notifier,
    stats: ThresholdOrchStats,
}

impl fmt::Debug for ThresholdOrch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThresholdOrch")
            .field("config", &self.config)
            .field("connections", &self.table.len())
            .field("subscribers", &self.notifier.subscriber_count())
            .field("stats", &self.stats)
            .finish()
    }
}

impl ThresholdOrch {
    /// Creates a new ThresholdOrch on top of a counting engine.
    pub fn new(engine: Arc<dyn EngineGateway>, config: ThresholdOrchConfig) -> Self {
        Self {
            config,
            engine,
            table: ConnTable::new(),
            notifier: Notifier::new(),
            stats: ThresholdOrchStats::default(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ThresholdOrchConfig {
        &self.config
    }

    /// Returns the statistics.
    pub fn stats(&self) -> &ThresholdOrchStats {
        &self.stats
    }

    /// Subscribes to `bytes_threshold_crossed` and
    /// `packets_threshold_crossed` notifications.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ThresholdCrossed> {
        self.notifier.subscribe()
    }

    /// Registers a byte threshold.
    pub fn set_bytes_threshold(
        &mut self,
        conn: ConnId,
        threshold: u64,
        direction: Direction,
    ) -> ThresholdResult<()> {
        self.set_threshold(conn, Metric::Bytes, threshold, direction)
    }

    /// Registers a packet threshold.
    pub fn set_packets_threshold(
        &mut self,
        conn: ConnId,
        threshold: u64,
        direction: Direction,
    ) -> ThresholdResult<()> {
        self.set_threshold(conn, Metric::Packets, threshold, direction)
    }

    /// Removes a pending byte threshold.
    pub fn delete_bytes_threshold(
        &mut self,
        conn: ConnId,
        threshold: u64,
        direction: Direction,
    ) -> ThresholdResult<()> {
        self.delete_threshold(conn, Metric::Bytes, threshold, direction)
    }

    /// Removes a pending packet threshold.
    pub fn delete_packets_threshold(
        &mut self,
        conn: ConnId,
        threshold: u64,
        direction: Direction,
    ) -> ThresholdResult<()> {
        self.delete_threshold(conn, Metric::Packets, threshold, direction)
    }

    /// Registers a threshold and re-arms the engine if it became the new
    /// minimum.
    ///
    /// Zero is rejected without touching any state. Registering a value
    /// that is already pending succeeds. The result of the rearm is
    /// returned as is.
    pub fn set_threshold(
        &mut self,
        conn: ConnId,
        metric: Metric,
        threshold: u64,
        direction: Direction,
    ) -> ThresholdResult<()> {
        let Some(value) = NonZeroU64::new(threshold) else {
            self.stats.rejected += 1;
            warn!(%conn, %metric, %direction, "Rejecting zero threshold");
            return Err(ThresholdError::invalid_threshold(conn, metric));
        };

        if self
            .table
            .get_or_create(conn)
            .set_mut(metric, direction)
            .insert(value)
        {
            self.stats.thresholds_set += 1;
            debug!(%conn, %metric, %direction, threshold, "Threshold registered");
        }

        self.rearm(conn, metric, direction)
    }

    /// Removes a pending threshold and re-arms the engine.
    ///
    /// Fails with [`ThresholdError::NotPending`] when the value is not in
    /// the set. A rearm failure is only returned when
    /// [`ThresholdOrchConfig::propagate_delete_rearm_errors`] is set.
    pub fn delete_threshold(
        &mut self,
        conn: ConnId,
        metric: Metric,
        threshold: u64,
        direction: Direction,
    ) -> ThresholdResult<()> {
        let removed = self
            .table
            .get_or_create(conn)
            .set_mut(metric, direction)
            .remove(threshold);

        if !removed {
            self.stats.rejected += 1;
            debug!(%conn, %metric, %direction, threshold, "Delete of threshold that is not pending");
            return Err(ThresholdError::not_pending(conn, metric, direction, threshold));
        }

        self.stats.thresholds_deleted += 1;
        debug!(%conn, %metric, %direction, threshold, "Threshold deleted");

        match self.rearm(conn, metric, direction) {
            Err(e) if self.config.propagate_delete_rearm_errors => Err(e),
            _ => Ok(()),
        }
    }

    /// Points the engine at the smallest pending threshold.
    ///
    /// Does nothing when the engine already watches that value, so calling
    /// it repeatedly without a set mutation in between writes at most once.
    pub fn rearm(&mut self, conn: ConnId, metric: Metric, direction: Direction) -> ThresholdResult<()> {
        let target = self
            .table
            .get(conn)
            .map_or(NO_THRESHOLD, |state| state.set(metric, direction).minimum());

        let current = match self.engine.current(conn, metric, direction) {
            Ok(current) => current,
            Err(e) => {
                self.stats.engine_errors += 1;
                warn!(%conn, %metric, %direction, "Failed to read armed threshold: {}", e);
                return Err(e.into());
            }
        };

        if target == current {
            self.stats.rearms_skipped += 1;
            debug!(%conn, %metric, %direction, armed = current, "Engine already armed");
            return Ok(());
        }

        self.stats.engine_writes += 1;
        if let Err(e) = self.engine.arm(conn, metric, target, direction) {
            self.stats.engine_errors += 1;
            warn!(%conn, %metric, %direction, target, "Failed to arm threshold: {}", e);
            return Err(e.into());
        }

        debug!(%conn, %metric, %direction, from = current, to = target, "Threshold re-armed");
        Ok(())
    }

    /// Handles a low-level crossing raised by the engine.
    ///
    /// A pending value is retired and the engine is advanced to the next
    /// minimum before the public notification is handed to subscribers. A
    /// crossing for a value that is no longer pending publishes nothing;
    /// the rearm still runs. Returns the published notification, if any.
    pub fn handle_crossing(&mut self, crossing: EngineCrossing) -> Option<ThresholdCrossed> {
        let EngineCrossing {
            conn,
            metric,
            threshold,
            direction,
        } = crossing;

        let retired = self
            .table
            .get_mut(conn)
            .is_some_and(|state| state.set_mut(metric, direction).remove(threshold));

        // Failures are logged and counted by rearm itself
        let _ = self.rearm(conn, metric, direction);

        if !retired {
            self.stats.stale_crossings += 1;
            debug!(%conn, %metric, %direction, threshold, "Ignoring crossing of threshold that is not pending");
            return None;
        }

        let event = ThresholdCrossed {
            conn,
            metric,
            threshold,
            direction,
        };
        let delivered = self.notifier.publish(event);
        self.stats.crossings_published += 1;
        info!(%conn, %metric, %direction, threshold, delivered, "{}", event.name());

        Some(event)
    }

    /// Discards all threshold state of a connection that went away.
    ///
    /// The engine is not contacted; its slots die with the connection.
    pub fn remove_connection(&mut self, conn: ConnId) -> bool {
        let removed = self.table.remove(conn).is_some();
        if removed {
            debug!(%conn, "Connection threshold state discarded");
        }
        removed
    }

    /// Pending thresholds for a tuple, in ascending order.
    pub fn pending_thresholds(&self, conn: ConnId, metric: Metric, direction: Direction) -> Vec<u64> {
        self.table
            .get(conn)
            .map(|state| state.set(metric, direction).iter().collect())
            .unwrap_or_default()
    }

    /// Returns true if the connection has threshold state attached.
    pub fn has_state(&self, conn: ConnId) -> bool {
        self.table.contains(conn)
    }

    /// Number of connections with threshold state attached.
    pub fn connection_count(&self) -> usize {
        self.table.len()
    }
}
