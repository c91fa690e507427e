//! Side table of per-connection threshold state.
//!
//! Connections are owned by the surrounding system, so their threshold state
//! lives here keyed by [`ConnId`]. Lookups never create entries; the only
//! entry point that does is [`ConnTable::get_or_create`], which mirrors the
//! lazy attach of state on first use by the public API.

use std::collections::HashMap;

use crate::threshold_set::ConnectionThresholdState;
use crate::types::ConnId;

/// Map from connection to its threshold state.
#[derive(Debug, Clone, Default)]
pub struct ConnTable {
    inner: HashMap<ConnId, ConnectionThresholdState>,
}

impl ConnTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of connections that have state attached.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns true if state exists for the connection.
    pub fn contains(&self, conn: ConnId) -> bool {
        self.inner.contains_key(&conn)
    }

    /// Returns the state for a connection. **Never creates entries.**
    pub fn get(&self, conn: ConnId) -> Option<&ConnectionThresholdState> {
        self.inner.get(&conn)
    }

    /// Returns the mutable state for a connection. **Never creates entries.**
    pub fn get_mut(&mut self, conn: ConnId) -> Option<&mut ConnectionThresholdState> {
        self.inner.get_mut(&conn)
    }

    /// Returns the state for a connection, attaching empty state first if
    /// none exists. Calling it on a connection that already has state is a
    /// no-op.
    pub fn get_or_create(&mut self, conn: ConnId) -> &mut ConnectionThresholdState {
        self.inner.entry(conn).or_default()
    }

    /// Discards a connection's state. Returns it if it was present.
    pub fn remove(&mut self, conn: ConnId) -> Option<ConnectionThresholdState> {
        self.inner.remove(&conn)
    }

    /// Iterates over the connections that have state attached.
    pub fn connections(&self) -> impl Iterator<Item = ConnId> + '_ {
        self.inner.keys().copied()
    }
}
