use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Counters of one module slot in a chain. Shared with monitors through an
/// `Arc`, so every counter is atomic.
#[derive(Debug)]
pub struct ModuleMetrics {
    module_id: String,
    batches_processed: AtomicU64,
    frames_processed: AtomicU64,
    /// Frames handed downstream, segments for a segmenting module
    frames_emitted: AtomicU64,
    errors_count: AtomicU64,
    total_latency_us: AtomicU64,
    latency_samples: AtomicU64,
}

impl ModuleMetrics {
    pub fn new(module_id: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            batches_processed: AtomicU64::new(0),
            frames_processed: AtomicU64::new(0),
            frames_emitted: AtomicU64::new(0),
            errors_count: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            latency_samples: AtomicU64::new(0),
        }
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn batches_processed(&self) -> u64 {
        self.batches_processed.load(Ordering::Relaxed)
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed.load(Ordering::Relaxed)
    }

    pub fn frames_emitted(&self) -> u64 {
        self.frames_emitted.load(Ordering::Relaxed)
    }

    pub fn errors_count(&self) -> u64 {
        self.errors_count.load(Ordering::Relaxed)
    }

    pub fn record_batch(&self, frames: usize) {
        self.batches_processed.fetch_add(1, Ordering::Relaxed);
        self.frames_processed.fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub fn record_emitted(&self, frames: usize) {
        self.frames_emitted.fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn start_processing(&self) -> Instant {
        Instant::now()
    }

    /// Latency includes everything downstream of the module
    pub fn finish_processing(&self, start: Instant) {
        let latency_us = start.elapsed().as_micros() as u64;
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_latency_us(&self) -> u64 {
        let samples = self.latency_samples.load(Ordering::Relaxed);
        if samples == 0 {
            return 0;
        }
        self.total_latency_us.load(Ordering::Relaxed) / samples
    }

    pub fn reset(&self) {
        self.batches_processed.store(0, Ordering::Relaxed);
        self.frames_processed.store(0, Ordering::Relaxed);
        self.frames_emitted.store(0, Ordering::Relaxed);
        self.errors_count.store(0, Ordering::Relaxed);
        self.total_latency_us.store(0, Ordering::Relaxed);
        self.latency_samples.store(0, Ordering::Relaxed);
    }
}
