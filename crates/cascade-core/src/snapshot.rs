use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-epoch count of actors per state per process, recorded after each
/// synchronous update. One realization produces an ordered sequence of
/// these, indexed by epoch number (epoch 0 = initial seeding).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSnapshot {
    counts: BTreeMap<String, BTreeMap<String, usize>>,
}

impl EpochSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_count(&mut self, process: &str, state: &str, count: usize) {
        self.counts
            .entry(process.to_string())
            .or_default()
            .insert(state.to_string(), count);
    }

    pub fn increment(&mut self, process: &str, state: &str) {
        *self
            .counts
            .entry(process.to_string())
            .or_default()
            .entry(state.to_string())
            .or_insert(0) += 1;
    }

    /// Count for one (process, state) column; 0 if never recorded.
    pub fn count(&self, process: &str, state: &str) -> usize {
        self.counts
            .get(process)
            .and_then(|states| states.get(state))
            .copied()
            .unwrap_or(0)
    }

    /// All (process, state) columns present in this snapshot, in a stable
    /// sorted order.
    pub fn columns(&self) -> Vec<(String, String)> {
        self.counts
            .iter()
            .flat_map(|(process, states)| {
                states
                    .keys()
                    .map(move |state| (process.clone(), state.clone()))
            })
            .collect()
    }

    pub fn processes(&self) -> impl Iterator<Item = &str> {
        self.counts.keys().map(String::as_str)
    }

    /// Total actors recorded for one process.
    pub fn total(&self, process: &str) -> usize {
        self.counts
            .get(process)
            .map(|states| states.values().sum())
            .unwrap_or(0)
    }
}

/// Result of one synchronous network update.
#[derive(Clone, Debug)]
pub struct StepOutcome {
    pub snapshot: EpochSnapshot,
    /// Number of actors that changed state in any process this epoch.
    /// Zero means the simulation reached a fixed point.
    pub changes: usize,
}
