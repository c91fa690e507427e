//! Integration tests for ThresholdOrch against a counting engine mock
//!
//! The mock keeps live counters and one armed slot per
//! (connection, metric, direction), and raises a crossing once when a
//! counter reaches the armed value, like the real counting engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use conn_thresholds::{
    ConnId, Direction, EngineCrossing, EngineError, EngineGateway, EngineResult, Metric,
    ThresholdCrossed, ThresholdOrch, ThresholdOrchConfig, NO_THRESHOLD,
};
use pretty_assertions::assert_eq;

type Slot = (ConnId, Metric, Direction);

/// Mock counting engine for testing
#[derive(Default)]
pub struct MockEngine {
    /// Live counters per slot
    counters: Arc<Mutex<HashMap<Slot, u64>>>,
    /// Armed value per slot
    armed: Arc<Mutex<HashMap<Slot, u64>>>,
    /// Every arm command in order
    arm_log: Arc<Mutex<Vec<(Slot, u64)>>>,
    /// Connections the engine has torn down
    closed: Arc<Mutex<Vec<ConnId>>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds traffic and returns the crossings it triggers.
    pub fn count(&self, conn: ConnId, direction: Direction, bytes: u64) -> Vec<EngineCrossing> {
        let mut crossings = Vec::new();
        let mut counters = self.counters.lock().unwrap();
        let mut armed = self.armed.lock().unwrap();

        for (metric, amount) in [(Metric::Bytes, bytes), (Metric::Packets, 1)] {
            let slot = (conn, metric, direction);
            let counter = counters.entry(slot).or_insert(0);
            *counter += amount;

            if let Some(value) = armed.get_mut(&slot) {
                if *value != NO_THRESHOLD && *counter >= *value {
                    crossings.push(EngineCrossing::new(conn, metric, *value, direction));
                    *value = NO_THRESHOLD;
                }
            }
        }

        crossings
    }

    pub fn close(&self, conn: ConnId) {
        self.closed.lock().unwrap().push(conn);
    }

    pub fn armed(&self, conn: ConnId, metric: Metric, direction: Direction) -> u64 {
        self.armed
            .lock()
            .unwrap()
            .get(&(conn, metric, direction))
            .copied()
            .unwrap_or(NO_THRESHOLD)
    }

    pub fn arm_count(&self) -> usize {
        self.arm_log.lock().unwrap().len()
    }

    fn check_open(&self, conn: ConnId) -> EngineResult<()> {
        if self.closed.lock().unwrap().contains(&conn) {
            return Err(EngineError::unknown_connection(conn));
        }
        Ok(())
    }

    fn current(&self, slot: Slot) -> EngineResult<u64> {
        self.check_open(slot.0)?;
        Ok(self.armed.lock().unwrap().get(&slot).copied().unwrap_or(NO_THRESHOLD))
    }

    fn arm(&self, slot: Slot, value: u64) -> EngineResult<()> {
        self.check_open(slot.0)?;
        self.arm_log.lock().unwrap().push((slot, value));
        self.armed.lock().unwrap().insert(slot, value);
        Ok(())
    }
}

impl EngineGateway for MockEngine {
    fn current_bytes(&self, conn: ConnId, direction: Direction) -> EngineResult<u64> {
        self.current((conn, Metric::Bytes, direction))
    }

    fn arm_bytes(&self, conn: ConnId, value: u64, direction: Direction) -> EngineResult<()> {
        self.arm((conn, Metric::Bytes, direction), value)
    }

    fn current_packets(&self, conn: ConnId, direction: Direction) -> EngineResult<u64> {
        self.current((conn, Metric::Packets, direction))
    }

    fn arm_packets(&self, conn: ConnId, value: u64, direction: Direction) -> EngineResult<()> {
        self.arm((conn, Metric::Packets, direction), value)
    }
}

const ORIG: Direction = Direction::Originator;
const RESP: Direction = Direction::Responder;

fn setup() -> (Arc<MockEngine>, ThresholdOrch) {
    let engine = Arc::new(MockEngine::new());
    let orch = ThresholdOrch::new(engine.clone(), ThresholdOrchConfig::default());
    (engine, orch)
}

/// Feeds traffic through the engine and the orch, returning what was published.
fn send(
    engine: &MockEngine,
    orch: &mut ThresholdOrch,
    conn: ConnId,
    direction: Direction,
    bytes: u64,
) -> Vec<ThresholdCrossed> {
    engine
        .count(conn, direction, bytes)
        .into_iter()
        .filter_map(|crossing| orch.handle_crossing(crossing))
        .collect()
}

fn crossed(conn: ConnId, metric: Metric, threshold: u64, direction: Direction) -> ThresholdCrossed {
    ThresholdCrossed {
        conn,
        metric,
        threshold,
        direction,
    }
}

#[test]
fn test_thresholds_fire_in_ascending_order() {
    let (engine, mut orch) = setup();
    let c = ConnId(1);

    orch.set_bytes_threshold(c, 300, ORIG).unwrap();
    orch.set_bytes_threshold(c, 100, ORIG).unwrap();
    assert_eq!(engine.armed(c, Metric::Bytes, ORIG), 100);

    assert!(send(&engine, &mut orch, c, ORIG, 60).is_empty());
    assert_eq!(
        send(&engine, &mut orch, c, ORIG, 60),
        vec![crossed(c, Metric::Bytes, 100, ORIG)]
    );
    assert_eq!(engine.armed(c, Metric::Bytes, ORIG), 300);

    assert_eq!(
        send(&engine, &mut orch, c, ORIG, 500),
        vec![crossed(c, Metric::Bytes, 300, ORIG)]
    );
    assert_eq!(engine.armed(c, Metric::Bytes, ORIG), NO_THRESHOLD);

    // Nothing left to fire
    assert!(send(&engine, &mut orch, c, ORIG, 10_000).is_empty());
    assert_eq!(orch.stats().crossings_published, 2);
}

#[test]
fn test_each_threshold_notifies_once() {
    let (engine, mut orch) = setup();
    let mut rx = orch.subscribe();
    let c = ConnId(2);

    orch.set_packets_threshold(c, 2, RESP).unwrap();
    orch.set_packets_threshold(c, 3, RESP).unwrap();

    for _ in 0..10 {
        send(&engine, &mut orch, c, RESP, 1);
    }

    let mut received = Vec::new();
    while let Ok(event) = rx.try_recv() {
        received.push(event);
    }
    assert_eq!(
        received,
        vec![
            crossed(c, Metric::Packets, 2, RESP),
            crossed(c, Metric::Packets, 3, RESP),
        ]
    );
}

#[test]
fn test_direction_and_metric_independence() {
    let (engine, mut orch) = setup();
    let c = ConnId(3);

    orch.set_bytes_threshold(c, 1000, ORIG).unwrap();
    orch.set_bytes_threshold(c, 50, RESP).unwrap();
    orch.set_packets_threshold(c, 2, ORIG).unwrap();
    orch.set_packets_threshold(c, 7, RESP).unwrap();

    let events = send(&engine, &mut orch, c, RESP, 60);
    assert_eq!(events, vec![crossed(c, Metric::Bytes, 50, RESP)]);

    let events = send(&engine, &mut orch, c, ORIG, 10);
    assert!(events.is_empty());
    let events = send(&engine, &mut orch, c, ORIG, 10);
    assert_eq!(events, vec![crossed(c, Metric::Packets, 2, ORIG)]);

    assert_eq!(orch.pending_thresholds(c, Metric::Bytes, ORIG), vec![1000]);
    assert_eq!(orch.pending_thresholds(c, Metric::Bytes, RESP), Vec::<u64>::new());
    assert_eq!(orch.pending_thresholds(c, Metric::Packets, ORIG), Vec::<u64>::new());
    assert_eq!(orch.pending_thresholds(c, Metric::Packets, RESP), vec![7]);
    assert_eq!(engine.armed(c, Metric::Bytes, ORIG), 1000);
    assert_eq!(engine.armed(c, Metric::Packets, RESP), 7);
}

#[test]
fn test_connections_are_independent() {
    let (engine, mut orch) = setup();
    let a = ConnId(10);
    let b = ConnId(11);

    orch.set_bytes_threshold(a, 100, ORIG).unwrap();
    orch.set_bytes_threshold(b, 100, ORIG).unwrap();

    assert_eq!(
        send(&engine, &mut orch, a, ORIG, 100),
        vec![crossed(a, Metric::Bytes, 100, ORIG)]
    );
    assert_eq!(orch.pending_thresholds(b, Metric::Bytes, ORIG), vec![100]);
    assert_eq!(engine.armed(b, Metric::Bytes, ORIG), 100);
}

#[test]
fn test_deleted_threshold_never_fires() {
    let (engine, mut orch) = setup();
    let c = ConnId(4);

    orch.set_bytes_threshold(c, 100, ORIG).unwrap();
    orch.set_bytes_threshold(c, 200, ORIG).unwrap();
    orch.delete_bytes_threshold(c, 100, ORIG).unwrap();
    assert_eq!(engine.armed(c, Metric::Bytes, ORIG), 200);

    assert!(send(&engine, &mut orch, c, ORIG, 150).is_empty());
    assert_eq!(
        send(&engine, &mut orch, c, ORIG, 50),
        vec![crossed(c, Metric::Bytes, 200, ORIG)]
    );
}

#[test]
fn test_late_crossing_after_delete() {
    let (engine, mut orch) = setup();
    let mut rx = orch.subscribe();
    let c = ConnId(5);

    orch.set_bytes_threshold(c, 100, ORIG).unwrap();
    // Engine fires, but the policy deletes before the crossing is handled
    let pending = engine.count(c, ORIG, 100);
    orch.delete_bytes_threshold(c, 100, ORIG).unwrap();

    for crossing in pending {
        assert_eq!(orch.handle_crossing(crossing), None);
    }
    assert!(rx.try_recv().is_err());
    assert_eq!(orch.stats().stale_crossings, 1);
}

#[test]
fn test_no_redundant_engine_writes() {
    let (engine, mut orch) = setup();
    let c = ConnId(6);

    orch.set_bytes_threshold(c, 100, ORIG).unwrap();
    orch.set_bytes_threshold(c, 500, ORIG).unwrap();
    orch.set_bytes_threshold(c, 400, ORIG).unwrap();
    orch.set_bytes_threshold(c, 100, ORIG).unwrap();
    orch.delete_bytes_threshold(c, 400, ORIG).unwrap();

    assert_eq!(engine.arm_count(), 1);
    assert_eq!(engine.armed(c, Metric::Bytes, ORIG), 100);
}

#[test]
fn test_subscriber_sees_retired_state() {
    let (engine, mut orch) = setup();
    let mut rx = orch.subscribe();
    let c = ConnId(7);

    orch.set_packets_threshold(c, 1, ORIG).unwrap();
    orch.set_packets_threshold(c, 4, ORIG).unwrap();
    send(&engine, &mut orch, c, ORIG, 1);

    let event = rx.try_recv().unwrap();
    assert_eq!(event.threshold, 1);
    assert_eq!(orch.pending_thresholds(c, Metric::Packets, ORIG), vec![4]);
    assert_eq!(engine.armed(c, Metric::Packets, ORIG), 4);
}

#[test]
fn test_set_fails_after_engine_dropped_connection() {
    let (engine, mut orch) = setup();
    let c = ConnId(8);
    engine.close(c);

    let err = orch.set_bytes_threshold(c, 100, ORIG).unwrap_err();
    assert!(err.is_engine_failure());

    // Delete still reports success from set membership alone
    assert!(orch.delete_bytes_threshold(c, 100, ORIG).is_ok());
    assert!(orch.delete_bytes_threshold(c, 100, ORIG).is_err());
}

#[test]
fn test_connection_teardown_discards_state() {
    let (engine, mut orch) = setup();
    let c = ConnId(9);

    orch.set_bytes_threshold(c, 100, ORIG).unwrap();
    orch.set_packets_threshold(c, 3, RESP).unwrap();
    assert_eq!(orch.connection_count(), 1);

    assert!(orch.remove_connection(c));
    engine.close(c);

    assert!(!orch.has_state(c));
    assert_eq!(orch.pending_thresholds(c, Metric::Bytes, ORIG), Vec::<u64>::new());
}
