use serde::{Deserialize, Serialize};

/// Borrowed block of `count` contiguous frames of `row_size` values each.
/// Owned by the caller for the duration of one call.
#[derive(Debug, Clone, Copy)]
pub struct FrameBatch<'a> {
    /// Time of the first frame in ms
    pub time: f64,
    pub weight: f64,
    pub values: &'a [f32],
    pub row_size: usize,
    pub count: usize,
    /// Spacing in ms between consecutive frames of the batch
    pub period: f64,
}

impl<'a> FrameBatch<'a> {
    pub fn new(time: f64, weight: f64, values: &'a [f32], row_size: usize, count: usize) -> Self {
        Self {
            time,
            weight,
            values,
            row_size,
            count,
            period: 0.0,
        }
    }

    /// One frame
    pub fn single(time: f64, weight: f64, values: &'a [f32]) -> Self {
        Self::new(time, weight, values, values.len(), 1)
    }

    pub fn with_period(mut self, period: f64) -> Self {
        self.period = period;
        self
    }

    pub fn frame_time(&self, index: usize) -> f64 {
        self.time + index as f64 * self.period
    }

    pub fn frame(&self, index: usize) -> &'a [f32] {
        let start = index * self.row_size;
        &self.values[start..start + self.row_size]
    }

    /// (time, values) of every frame, in order
    pub fn frames(&self) -> impl Iterator<Item = (f64, &'a [f32])> + '_ {
        (0..self.count).map(move |i| (self.frame_time(i), self.frame(i)))
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Owned frame, as recorded by sinks and exchanged with async hosts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Time in ms
    pub time: f64,
    pub weight: f64,
    pub values: Vec<f32>,
}

impl Frame {
    pub fn new(time: f64, weight: f64, values: Vec<f32>) -> Self {
        Self { time, weight, values }
    }
}

/// Owned version of [`FrameBatch`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnedBatch {
    pub time: f64,
    pub weight: f64,
    pub values: Vec<f32>,
    pub row_size: usize,
    pub count: usize,
}

impl OwnedBatch {
    pub fn new(time: f64, weight: f64, values: Vec<f32>, row_size: usize) -> Self {
        let count = if row_size > 0 { values.len() / row_size } else { 0 };
        Self {
            time,
            weight,
            values,
            row_size,
            count,
        }
    }

    pub fn as_batch(&self) -> FrameBatch<'_> {
        FrameBatch::new(self.time, self.weight, &self.values, self.row_size, self.count)
    }
}
