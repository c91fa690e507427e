//! Simulated counting engine.
//!
//! Keeps byte and packet counters per connection and direction plus one
//! armed slot per (metric, direction). A slot fires once when its counter
//! reaches the armed value and is cleared afterwards, so every arming yields
//! at most one crossing.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use conn_thresholds::{
    ConnId, Direction, EngineCrossing, EngineError, EngineGateway, EngineResult, Metric,
    NO_THRESHOLD,
};

/// Counters and armed slots of one connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnCounters {
    /// Counter values, indexed by metric then direction.
    counters: [[u64; 2]; 2],
    /// Armed values, indexed by metric then direction.
    armed: [[u64; 2]; 2],
}

fn slot(metric: Metric, direction: Direction) -> (usize, usize) {
    let m = match metric {
        Metric::Bytes => 0,
        Metric::Packets => 1,
    };
    let d = match direction {
        Direction::Originator => 0,
        Direction::Responder => 1,
    };
    (m, d)
}

impl ConnCounters {
    /// Returns a counter value.
    pub fn counter(&self, metric: Metric, direction: Direction) -> u64 {
        let (m, d) = slot(metric, direction);
        self.counters[m][d]
    }

    /// Returns an armed value.
    pub fn armed(&self, metric: Metric, direction: Direction) -> u64 {
        let (m, d) = slot(metric, direction);
        self.armed[m][d]
    }

    fn add(&mut self, conn: ConnId, metric: Metric, direction: Direction, amount: u64) -> Option<EngineCrossing> {
        let (m, d) = slot(metric, direction);
        self.counters[m][d] = self.counters[m][d].saturating_add(amount);

        let armed = self.armed[m][d];
        if armed == NO_THRESHOLD || self.counters[m][d] < armed {
            return None;
        }

        self.armed[m][d] = NO_THRESHOLD;
        Some(EngineCrossing::new(conn, metric, armed, direction))
    }
}

/// In-memory counting engine.
#[derive(Debug, Default)]
pub struct SimEngine {
    conns: DashMap<ConnId, ConnCounters>,
}

impl SimEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a connection. Returns false if it was already tracked.
    pub fn open(&self, conn: ConnId) -> bool {
        match self.conns.entry(conn) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(ConnCounters::default());
                true
            }
        }
    }

    /// Stops tracking a connection.
    pub fn close(&self, conn: ConnId) -> Option<ConnCounters> {
        self.conns.remove(&conn).map(|(_, counters)| counters)
    }

    pub fn is_open(&self, conn: ConnId) -> bool {
        self.conns.contains_key(&conn)
    }

    /// Counts one packet of `bytes` payload bytes and returns the crossings
    /// it raises.
    pub fn record_packet(
        &self,
        conn: ConnId,
        direction: Direction,
        bytes: u64,
    ) -> EngineResult<Vec<EngineCrossing>> {
        let mut entry = self
            .conns
            .get_mut(&conn)
            .ok_or_else(|| EngineError::unknown_connection(conn))?;

        let crossings: Vec<_> = [(Metric::Bytes, bytes), (Metric::Packets, 1)]
            .into_iter()
            .filter_map(|(metric, amount)| entry.add(conn, metric, direction, amount))
            .collect();

        for crossing in &crossings {
            debug!(%conn, metric = %crossing.metric, %direction, threshold = crossing.threshold, "Engine crossing");
        }
        Ok(crossings)
    }

    /// Returns a snapshot of a connection's counters.
    pub fn counters(&self, conn: ConnId) -> Option<ConnCounters> {
        self.conns.get(&conn).map(|entry| entry.value().clone())
    }

    fn read(&self, conn: ConnId, metric: Metric, direction: Direction) -> EngineResult<u64> {
        self.conns
            .get(&conn)
            .map(|entry| entry.armed(metric, direction))
            .ok_or_else(|| EngineError::unknown_connection(conn))
    }

    fn write(&self, conn: ConnId, metric: Metric, direction: Direction, value: u64) -> EngineResult<()> {
        let mut entry = self
            .conns
            .get_mut(&conn)
            .ok_or_else(|| EngineError::unknown_connection(conn))?;
        let (m, d) = slot(metric, direction);
        entry.armed[m][d] = value;
        Ok(())
    }
}

impl EngineGateway for SimEngine {
    fn current_bytes(&self, conn: ConnId, direction: Direction) -> EngineResult<u64> {
        self.read(conn, Metric::Bytes, direction)
    }

    fn arm_bytes(&self, conn: ConnId, value: u64, direction: Direction) -> EngineResult<()> {
        self.write(conn, Metric::Bytes, direction, value)
    }

    fn current_packets(&self, conn: ConnId, direction: Direction) -> EngineResult<u64> {
        self.read(conn, Metric::Packets, direction)
    }

    fn arm_packets(&self, conn: ConnId, value: u64, direction: Direction) -> EngineResult<()> {
        self.write(conn, Metric::Packets, direction, value)
    }
}
