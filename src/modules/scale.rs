use anyhow::Result;
use featstream_macros::StreamModule;

use crate::core::{Attribute, AttributeSet, Diagnostics, FrameBatch, Module, Receiver, StreamDescriptor};
use crate::registry::Registered;

/// Applies a gain in dB to every value
#[derive(StreamModule)]
#[module_meta(name = "Scale", category = "Processors")]
pub struct Scale {
    attrs: AttributeSet,
    diag: Diagnostics,
    gain_linear: f32,
    scratch: Vec<f32>,
}

impl Default for Scale {
    fn default() -> Self {
        Self {
            attrs: AttributeSet::new().with(
                Attribute::float("gain_db", 0.0)
                    .range(Some(-60.0), Some(20.0))
                    .describe("gain in dB"),
            ),
            diag: Diagnostics::default(),
            gain_linear: 1.0,
            scratch: Vec::new(),
        }
    }
}

impl Scale {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gain_linear(&self) -> f32 {
        self.gain_linear
    }

    fn update_gain(&mut self) -> Result<()> {
        self.attrs.sanitize(&self.diag);
        let gain_db = self.attrs.f64("gain_db")?;
        // Convert dB to linear
        self.gain_linear = 10_f64.powf(gain_db / 20.0) as f32;
        Ok(())
    }
}

impl Module for Scale {
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
        self.attrs.take_dirty();
        self.update_gain()?;
        Ok(input.clone())
    }

    fn process(&mut self, batch: &FrameBatch<'_>, next: &mut dyn Receiver) -> Result<()> {
        if self.attrs.take_dirty() {
            self.update_gain()?;
        }

        self.scratch.clear();
        self.scratch.extend(batch.values.iter().map(|v| v * self.gain_linear));

        let out = FrameBatch {
            values: &self.scratch,
            ..*batch
        };
        next.frames(&out)
    }
}
