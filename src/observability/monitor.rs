use std::fmt::Write;

use super::{MetricsCollector, MetricsSnapshot};

/// Text report over a chain's metrics: one row per slot with frames in and
/// out, so segmenting modules show how many input frames each segment took.
pub struct ChainMonitor {
    collector: MetricsCollector,
}

impl ChainMonitor {
    pub fn new(collector: MetricsCollector) -> Self {
        Self { collector }
    }

    pub fn generate_report(&self) -> String {
        let snapshot = self.collector.snapshot();
        let (first, last) = match (snapshot.first(), snapshot.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return "No modules registered".to_string(),
        };

        let mut report = String::from("=== Chain Metrics ===\n");
        let _ = writeln!(
            report,
            "{:<14} {:>10} {:>10} {:>8} {:>8} {:>6} {:>10}",
            "slot", "in", "out", "in/out", "batches", "errors", "latency"
        );
        for metrics in &snapshot {
            report.push_str(&Self::row(metrics));
        }

        let errors: u64 = snapshot.iter().map(|m| m.errors_count).sum();
        let _ = write!(
            report,
            "chain: {} frames in, {} frames out, {} error{}",
            first.frames_processed,
            last.frames_emitted,
            errors,
            if errors == 1 { "" } else { "s" }
        );
        report
    }

    fn row(metrics: &MetricsSnapshot) -> String {
        let ratio = metrics
            .frames_per_output()
            .map(|r| format!("{:.1}", r))
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{:<14} {:>10} {:>10} {:>8} {:>8} {:>6} {:>8}us\n",
            metrics.slot,
            metrics.frames_processed,
            metrics.frames_emitted,
            ratio,
            metrics.batches_processed,
            metrics.errors_count,
            metrics.avg_latency_us
        )
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }
}
