use anyhow::Result;
use featstream_macros::StreamModule;

use crate::buffers::RingBuffer;
use crate::core::{
    frame_period, Attribute, AttributeSet, Diagnostics, FrameBatch, Module, Receiver, StreamDescriptor, StreamError,
};
use crate::registry::Registered;

/// Cuts a sample stream into overlapping windows of `size` samples, one
/// every `hop` samples. Each window is a frame of `size` rows, timed at its
/// first sample.
#[derive(StreamModule)]
#[module_meta(name = "Slice", category = "Framing")]
pub struct Slice {
    attrs: AttributeSet,
    diag: Diagnostics,
    history: RingBuffer<f32>,
    window: Vec<f32>,
    size: usize,
    hop: usize,
    sample_period: f64,
    /// Samples left before the next window is complete
    countdown: usize,
}

impl Default for Slice {
    fn default() -> Self {
        Self {
            attrs: AttributeSet::new()
                .with(
                    Attribute::int("size", 512)
                        .range(Some(1.0), None)
                        .describe("window length in samples")
                        .renegotiates(),
                )
                .with(
                    Attribute::int("hop", 256)
                        .range(Some(1.0), None)
                        .describe("samples between window starts")
                        .renegotiates(),
                ),
            diag: Diagnostics::default(),
            history: RingBuffer::new(0, 0),
            window: Vec::new(),
            size: 0,
            hop: 0,
            sample_period: 0.0,
            countdown: 0,
        }
    }
}

impl Slice {
    pub fn new() -> Self {
        Self::default()
    }

    fn emit(&mut self, time: f64, weight: f64, next: &mut dyn Receiver) -> Result<()> {
        self.history.copy_to(&mut self.window);
        let start = time - (self.size - 1) as f64 * self.sample_period;
        next.frames(&FrameBatch::single(start, weight, &self.window))
    }
}

impl Module for Slice {
    fn name(&self) -> &str {
        Self::ID
    }

    fn attributes(&self) -> &AttributeSet {
        &self.attrs
    }

    fn attributes_mut(&mut self) -> &mut AttributeSet {
        &mut self.attrs
    }

    fn set_diagnostics(&mut self, diagnostics: Diagnostics) {
        self.diag = diagnostics.for_module(Self::ID);
    }

    fn setup(&mut self, input: &StreamDescriptor) -> Result<StreamDescriptor> {
        if input.height != 1 || input.frame_rate <= 0.0 {
            return Err(self.diag.error(StreamError::UnsupportedShape {
                module: Self::ID.to_string(),
                reason: format!(
                    "expects a sampled stream of height 1, got height {} at {} Hz",
                    input.height, input.frame_rate
                ),
            }));
        }

        self.attrs.sanitize(&self.diag);
        self.attrs.take_dirty();
        let size = self.attrs.i64("size")?.max(1) as usize;
        let hop = self.attrs.i64("hop")?.max(1) as usize;
        let sample_period = frame_period(input.frame_rate);

        let width = input.width as usize;
        let reallocated = self.history.resize(width, size);
        if reallocated {
            self.window = vec![0.0; width * size];
        }
        // a partly filled window survives renegotiation of the same framing
        if reallocated || hop != self.hop || sample_period != self.sample_period {
            self.countdown = size;
            self.history.clear();
        }
        self.size = size;
        self.hop = hop;
        self.sample_period = sample_period;

        Ok(StreamDescriptor {
            has_time_tags: input.has_time_tags,
            frame_rate: input.frame_rate / self.hop as f64,
            offset: input.offset,
            width: input.width,
            height: self.size as u32,
            labels: input.labels.clone(),
            has_var_size: false,
            domain: self.size as f64 / input.frame_rate,
            max_frames: 1,
        })
    }

    fn process(&mut self, batch: &FrameBatch<'_>, next: &mut dyn Receiver) -> Result<()> {
        for (time, frame) in batch.frames() {
            self.history.push(frame);
            self.countdown -= 1;
            if self.countdown == 0 {
                self.emit(time, batch.weight, next)?;
                self.countdown = self.hop;
            }
        }
        Ok(())
    }

    fn reset(&mut self, next: &mut dyn Receiver) -> Result<()> {
        self.history.clear();
        self.countdown = self.size;
        next.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AttrValue;
    use crate::modules::Collector;

    #[test]
    fn test_rejects_frame_streams() {
        let mut slice = Slice::new();
        assert!(slice.setup(&StreamDescriptor::new(1, 4, 100.0)).is_err());
        assert!(slice.setup(&StreamDescriptor::new(1, 1, 0.0)).is_err());
    }

    #[test]
    fn test_renegotiation_keeps_partial_window() {
        let mut slice = Slice::new();
        slice.set_attribute("size", AttrValue::Int(4), false).unwrap();
        slice.set_attribute("hop", AttrValue::Int(4), false).unwrap();
        let input = StreamDescriptor::new(1, 1, 1000.0);
        slice.setup(&input).unwrap();

        let mut sink = Collector::new();
        slice
            .process(&FrameBatch::new(0.0, 1.0, &[1.0, 2.0, 3.0], 1, 3).with_period(1.0), &mut sink)
            .unwrap();
        slice.setup(&input).unwrap();
        slice.process(&FrameBatch::single(3.0, 1.0, &[4.0]), &mut sink).unwrap();

        assert_eq!(sink.frames().len(), 1);
        assert_eq!(sink.frames()[0].values, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(sink.frames()[0].time, 0.0);

        // new hop restarts framing
        slice.set_attribute("hop", AttrValue::Int(2), false).unwrap();
        slice
            .process(&FrameBatch::new(4.0, 1.0, &[5.0, 6.0], 1, 2).with_period(1.0), &mut sink)
            .unwrap();
        slice.setup(&input).unwrap();
        slice
            .process(&FrameBatch::new(6.0, 1.0, &[7.0, 8.0, 9.0], 1, 3).with_period(1.0), &mut sink)
            .unwrap();
        assert_eq!(sink.frames().len(), 1);
    }

    #[test]
    fn test_windows_every_hop() {
        let mut slice = Slice::new();
        slice.set_attribute("size", AttrValue::Int(4), false).unwrap();
        slice.set_attribute("hop", AttrValue::Int(2), false).unwrap();
        let out = slice.setup(&StreamDescriptor::new(1, 1, 1000.0)).unwrap();
        assert_eq!(out.height, 4);
        assert_eq!(out.frame_rate, 500.0);
        assert_eq!(out.domain, 0.004);

        let samples: Vec<f32> = (0..8).map(|i| i as f32).collect();
        let mut sink = Collector::new();
        slice
            .process(&FrameBatch::new(0.0, 1.0, &samples, 1, 8).with_period(1.0), &mut sink)
            .unwrap();

        let frames = sink.frames();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].values, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(frames[0].time, 0.0);
        assert_eq!(frames[1].values, vec![2.0, 3.0, 4.0, 5.0]);
        assert_eq!(frames[2].time, 4.0);
    }
}
