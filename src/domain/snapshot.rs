//! Immutable metrics snapshot.
//!
//! Loading is fallible and happens once; gathering is infallible and can be
//! repeated any number of times, always yielding the same families.

use crate::domain::ports::Gatherer;
use prometheus::proto::MetricFamily;
use std::sync::Arc;

/// The complete set of metric families delivered by one run.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    families: Arc<[MetricFamily]>,
}

impl Snapshot {
    pub fn new(families: Vec<MetricFamily>) -> Self {
        Self {
            families: families.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Total number of series across all families.
    pub fn series_count(&self) -> usize {
        self.families.iter().map(|f| f.metric.len()).sum()
    }
}

impl Gatherer for Snapshot {
    fn gather(&self) -> &[MetricFamily] {
        &self.families
    }
}
