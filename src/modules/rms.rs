use anyhow::Result;
use featstream_macros::StreamModule;

use crate::core::{AttributeSet, Diagnostics, FrameBatch, Module, Receiver, StreamDescriptor, StreamError};
use crate::registry::Registered;

/// Root mean square of every column over the rows of a frame
#[derive(StreamModule, Default)]
#[module_meta(name = "RMS", category = "Features")]
pub struct Rms {
    attrs: AttributeSet,
    diag: Diagnostics,
    width: usize,
    height: usize,
    out: Vec<f32>,
}

impl Rms {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for Rms {
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
        input.validate().map_err(|e| {
            self.diag.error(StreamError::UnsupportedShape {
                module: Self::ID.to_string(),
                reason: e.message(),
            })
        })?;

        self.width = input.width as usize;
        self.height = input.height as usize;

        Ok(StreamDescriptor {
            height: 1,
            domain: 0.0,
            has_var_size: false,
            ..input.clone()
        })
    }

    fn process(&mut self, batch: &FrameBatch<'_>, next: &mut dyn Receiver) -> Result<()> {
        self.out.clear();
        for (_, frame) in batch.frames() {
            for col in 0..self.width {
                let sum: f64 = frame
                    .iter()
                    .skip(col)
                    .step_by(self.width)
                    .map(|v| *v as f64 * *v as f64)
                    .sum();
                self.out.push((sum / self.height as f64).sqrt() as f32);
            }
        }

        let out = FrameBatch::new(batch.time, batch.weight, &self.out, self.width, batch.count).with_period(batch.period);
        next.frames(&out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::Collector;

    #[test]
    fn test_rms_per_column() {
        let mut rms = Rms::new();
        let out = rms.setup(&StreamDescriptor::new(2, 2, 10.0)).unwrap();
        assert_eq!(out.height, 1);
        assert_eq!(out.width, 2);

        // rows [3, 1] and [4, 1]
        let values = [3.0, 1.0, 4.0, 1.0];
        let mut sink = Collector::new();
        rms.process(&FrameBatch::single(0.0, 1.0, &values), &mut sink).unwrap();

        let frame = &sink.frames()[0];
        assert!((frame.values[0] - 12.5f32.sqrt()).abs() < 1e-6);
        assert_eq!(frame.values[1], 1.0);
    }
}
