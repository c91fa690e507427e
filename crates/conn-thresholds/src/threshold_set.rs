//! Pending threshold sets for a single connection.

use std::collections::BTreeSet;
use std::num::NonZeroU64;

use crate::types::{Direction, Metric, NO_THRESHOLD};

/// Pending thresholds for one (connection, metric, direction) tuple.
///
/// Values are stored as [`NonZeroU64`] so the set can never hold the
/// [`NO_THRESHOLD`] sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThresholdSet {
    values: BTreeSet<NonZeroU64>,
}

impl ThresholdSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a threshold. Returns false if it was already pending.
    pub fn insert(&mut self, value: NonZeroU64) -> bool {
        self.values.insert(value)
    }

    /// Removes a threshold. Returns true iff it was pending.
    pub fn remove(&mut self, value: u64) -> bool {
        match NonZeroU64::new(value) {
            Some(v) => self.values.remove(&v),
            None => false,
        }
    }

    /// Returns true if the value is pending.
    pub fn contains(&self, value: u64) -> bool {
        NonZeroU64::new(value).is_some_and(|v| self.values.contains(&v))
    }

    /// Returns the smallest pending threshold, or [`NO_THRESHOLD`] when empty.
    pub fn minimum(&self) -> u64 {
        self.values.first().map_or(NO_THRESHOLD, |v| v.get())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pending values in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.values.iter().map(|v| v.get())
    }
}

/// The four threshold sets attached to one connection.
///
/// Indexed by metric and direction through [`set`](Self::set) and
/// [`set_mut`](Self::set_mut).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionThresholdState {
    sets: [[ThresholdSet; 2]; 2],
}

impl ConnectionThresholdState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the set for a metric and direction.
    pub fn set(&self, metric: Metric, direction: Direction) -> &ThresholdSet {
        &self.sets[metric.index()][direction.index()]
    }

    /// Returns the mutable set for a metric and direction.
    pub fn set_mut(&mut self, metric: Metric, direction: Direction) -> &mut ThresholdSet {
        &mut self.sets[metric.index()][direction.index()]
    }

    /// Returns true if no threshold is pending in any of the four sets.
    pub fn is_empty(&self) -> bool {
        self.sets.iter().flatten().all(ThresholdSet::is_empty)
    }

    /// Total number of pending thresholds across all four sets.
    pub fn pending_count(&self) -> usize {
        self.sets.iter().flatten().map(ThresholdSet::len).sum()
    }
}
