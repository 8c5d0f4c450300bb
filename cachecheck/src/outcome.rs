use std::fmt::{Display, Formatter};

use serde::Serialize;

/// What the cache did for one access
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
pub enum AccessOutcome {
    Hit,
    Miss,
    MissWithEviction,
}

impl AccessOutcome {
    /// The label both simulators print, `hit`, `miss`, or `miss eviction`
    pub fn label(self) -> &'static str {
        match self {
            AccessOutcome::Hit => "hit",
            AccessOutcome::Miss => "miss",
            AccessOutcome::MissWithEviction => "miss eviction",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "hit" => Some(AccessOutcome::Hit),
            "miss" => Some(AccessOutcome::Miss),
            "miss eviction" => Some(AccessOutcome::MissWithEviction),
            _ => None,
        }
    }
}

impl Display for AccessOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The five counters reported at the end of a run, in reference output order
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize)]
pub struct RunStatistics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub dirty_bytes_resident: u64,
    pub dirty_bytes_evicted: u64,
}

impl RunStatistics {
    pub fn as_array(&self) -> [u64; 5] {
        [
            self.hits,
            self.misses,
            self.evictions,
            self.dirty_bytes_resident,
            self.dirty_bytes_evicted,
        ]
    }

    pub fn from_array(values: [u64; 5]) -> Self {
        let [hits, misses, evictions, dirty_bytes_resident, dirty_bytes_evicted] = values;
        Self {
            hits,
            misses,
            evictions,
            dirty_bytes_resident,
            dirty_bytes_evicted,
        }
    }
}

impl Display for RunStatistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "hits:{} misses:{} evictions:{} dirty_bytes_in_cache:{} dirty_bytes_evicted:{}",
            self.hits, self.misses, self.evictions, self.dirty_bytes_resident, self.dirty_bytes_evicted
        )
    }
}

/// Everything one simulator reported for one trace
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize)]
pub struct RunObservation {
    pub outcomes: Vec<AccessOutcome>,
    pub stats: RunStatistics,
}
