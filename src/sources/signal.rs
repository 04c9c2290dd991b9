use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::f64::consts::PI;

use crate::core::{OwnedBatch, StreamDescriptor};
use crate::engine::FrameSource;

/// Sine tone switched on during given intervals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Burst {
    /// Start in ms
    pub start: f64,
    /// Length in ms
    pub length: f64,
}

/// Mono test signal: silence, with a sine tone during every burst
pub struct SignalSource {
    sample_rate: f64,
    block_size: usize,
    duration_ms: f64,
    frequency: f64,
    amplitude: f64,
    bursts: Vec<Burst>,
    position: usize,
}

impl Default for SignalSource {
    fn default() -> Self {
        Self::new(48000.0, 1024, 1000.0)
    }
}

impl SignalSource {
    pub fn new(sample_rate: f64, block_size: usize, duration_ms: f64) -> Self {
        Self {
            sample_rate,
            block_size: block_size.max(1),
            duration_ms,
            frequency: 440.0,
            amplitude: 1.0,
            bursts: Vec::new(),
            position: 0,
        }
    }

    pub fn with_burst(mut self, start: f64, length: f64) -> Self {
        self.bursts.push(Burst { start, length });
        self
    }

    pub fn with_frequency(mut self, frequency: f64) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Read `sample_rate`, `block_size`, `duration_ms`, `frequency`,
    /// `amplitude` and `bursts` (`[[start, length], ...]`) from a JSON object
    pub fn configure(&mut self, config: &Value) {
        if let Some(sr) = config["sample_rate"].as_f64() {
            self.sample_rate = sr;
        }
        if let Some(size) = config["block_size"].as_u64() {
            self.block_size = (size as usize).max(1);
        }
        if let Some(duration) = config["duration_ms"].as_f64() {
            self.duration_ms = duration;
        }
        if let Some(freq) = config["frequency"].as_f64() {
            self.frequency = freq;
        }
        if let Some(amplitude) = config["amplitude"].as_f64() {
            self.amplitude = amplitude;
        }
        if let Some(bursts) = config["bursts"].as_array() {
            self.bursts = bursts
                .iter()
                .filter_map(|b| {
                    Some(Burst {
                        start: b.get(0)?.as_f64()?,
                        length: b.get(1)?.as_f64()?,
                    })
                })
                .collect();
        }
        self.position = 0;
    }

    pub fn total_samples(&self) -> usize {
        (self.duration_ms * self.sample_rate / 1000.0).round().max(0.0) as usize
    }

    /// Restart from the first sample
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    fn sample(&self, index: usize) -> f32 {
        let ms = index as f64 * 1000.0 / self.sample_rate;
        if self.bursts.iter().any(|b| ms >= b.start && ms < b.start + b.length) {
            let t = index as f64 / self.sample_rate;
            (self.amplitude * (2.0 * PI * self.frequency * t).sin()) as f32
        } else {
            0.0
        }
    }
}

#[async_trait]
impl FrameSource for SignalSource {
    fn descriptor(&self) -> StreamDescriptor {
        StreamDescriptor::new(1, 1, self.sample_rate)
            .with_labels(["Signal"])
            .with_max_frames(self.block_size as u32)
    }

    async fn next_batch(&mut self) -> Result<Option<OwnedBatch>> {
        let total = self.total_samples();
        if self.position >= total {
            return Ok(None);
        }

        let n = self.block_size.min(total - self.position);
        let samples: Vec<f32> = (self.position..self.position + n).map(|i| self.sample(i)).collect();
        let time = self.position as f64 * 1000.0 / self.sample_rate;
        self.position += n;

        Ok(Some(OwnedBatch::new(time, 1.0, samples, 1)))
    }

    fn end_time(&self) -> f64 {
        self.duration_ms
    }
}
