use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::ModuleMetrics;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub slot: String,
    pub module_id: String,
    pub batches_processed: u64,
    pub frames_processed: u64,
    pub frames_emitted: u64,
    pub errors_count: u64,
    pub avg_latency_us: u64,
}

impl MetricsSnapshot {
    /// Input frames per output frame, the average segment length of a
    /// segmenting module. `None` before the first output.
    pub fn frames_per_output(&self) -> Option<f64> {
        (self.frames_emitted > 0).then(|| self.frames_processed as f64 / self.frames_emitted as f64)
    }
}

/// Metrics of every module slot of a chain, keyed by slot name
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    metrics: HashMap<String, Arc<ModuleMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, slot: impl Into<String>, metrics: Arc<ModuleMetrics>) {
        self.metrics.insert(slot.into(), metrics);
    }

    /// Snapshots ordered by slot name
    pub fn snapshot(&self) -> Vec<MetricsSnapshot> {
        let mut snapshot: Vec<MetricsSnapshot> = self
            .metrics
            .iter()
            .map(|(slot, metrics)| MetricsSnapshot {
                slot: slot.clone(),
                module_id: metrics.module_id().to_string(),
                batches_processed: metrics.batches_processed(),
                frames_processed: metrics.frames_processed(),
                frames_emitted: metrics.frames_emitted(),
                errors_count: metrics.errors_count(),
                avg_latency_us: metrics.avg_latency_us(),
            })
            .collect();
        snapshot.sort_by(|a, b| a.slot.cmp(&b.slot));
        snapshot
    }

    pub fn get_module_metrics(&self, slot: &str) -> Option<Arc<ModuleMetrics>> {
        self.metrics.get(slot).cloned()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}
