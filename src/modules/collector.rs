use anyhow::Result;

use crate::core::{Frame, FrameBatch, Receiver, StreamDescriptor};

/// Terminal receiver that records everything it is handed
#[derive(Debug, Clone, Default)]
pub struct Collector {
    descriptor: Option<StreamDescriptor>,
    frames: Vec<Frame>,
    negotiations: usize,
    resets: usize,
    finalized: Option<f64>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last negotiated descriptor
    pub fn descriptor(&self) -> Option<&StreamDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Recorded frames, leaving the collector empty
    pub fn take_frames(&mut self) -> Vec<Frame> {
        std::mem::take(&mut self.frames)
    }

    /// Value `column` of every recorded frame
    pub fn column(&self, column: usize) -> Vec<f32> {
        self.frames
            .iter()
            .filter_map(|f| f.values.get(column).copied())
            .collect()
    }

    pub fn times(&self) -> Vec<f64> {
        self.frames.iter().map(|f| f.time).collect()
    }

    pub fn negotiations(&self) -> usize {
        self.negotiations
    }

    pub fn resets(&self) -> usize {
        self.resets
    }

    /// End time of the last finalize, if any
    pub fn finalized(&self) -> Option<f64> {
        self.finalized
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.finalized = None;
    }
}

impl Receiver for Collector {
    fn stream_attributes(&mut self, descriptor: &StreamDescriptor) -> Result<()> {
        self.descriptor = Some(descriptor.clone());
        self.negotiations += 1;
        Ok(())
    }

    fn frames(&mut self, batch: &FrameBatch<'_>) -> Result<()> {
        self.frames
            .extend(batch.frames().map(|(time, values)| Frame::new(time, batch.weight, values.to_vec())));
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.resets += 1;
        self.finalized = None;
        Ok(())
    }

    fn finalize(&mut self, input_end: f64) -> Result<()> {
        self.finalized = Some(input_end);
        Ok(())
    }
}
