use anyhow::Result;
use featstream_macros::StreamModule;
use log::info;

use crate::core::{Attribute, AttributeSet, Diagnostics, FrameBatch, Module, Receiver, StreamDescriptor};
use crate::registry::Registered;

/// Pass-through that logs every frame it sees
#[derive(StreamModule)]
#[module_meta(name = "Print", category = "Sinks")]
pub struct Print {
    attrs: AttributeSet,
    diag: Diagnostics,
    labels: Vec<String>,
}

impl Default for Print {
    fn default() -> Self {
        Self {
            attrs: AttributeSet::new().with(Attribute::text("label", "Output").describe("prefix of every logged line")),
            diag: Diagnostics::default(),
            labels: Vec::new(),
        }
    }
}

impl Print {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Module for Print {
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
        self.labels = input.labels.clone();
        info!(
            "[{}] stream {}x{} @ {} Hz, labels {:?}",
            self.attrs.text("label")?,
            input.width,
            input.height,
            input.frame_rate,
            input.labels
        );
        Ok(input.clone())
    }

    fn process(&mut self, batch: &FrameBatch<'_>, next: &mut dyn Receiver) -> Result<()> {
        let label = self.attrs.text("label")?;
        for (time, frame) in batch.frames() {
            if self.labels.is_empty() {
                info!("[{}] {:.3} ms: {:?}", label, time, frame);
            } else {
                let named: Vec<String> = frame
                    .iter()
                    .enumerate()
                    .map(|(i, v)| match self.labels.get(i) {
                        Some(name) if !name.is_empty() => format!("{}={:.4}", name, v),
                        _ => format!("{:.4}", v),
                    })
                    .collect();
                info!("[{}] {:.3} ms: {}", label, time, named.join(", "));
            }
        }
        next.frames(batch)
    }

    fn finalize(&mut self, input_end: f64, next: &mut dyn Receiver) -> Result<()> {
        info!("[{}] end of input at {:.3} ms", self.attrs.text("label")?, input_end);
        next.finalize(input_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::Collector;

    #[test]
    fn test_print_passthrough() {
        let mut print = Print::new();
        print.configure(&serde_json::json!({"label": "segments"})).unwrap();
        let desc = StreamDescriptor::new(2, 1, 10.0).with_labels(["a", "b"]);
        assert_eq!(print.setup(&desc).unwrap(), desc);

        let mut sink = Collector::new();
        let values = [1.0, 2.0, 3.0, 4.0];
        print
            .process(&FrameBatch::new(5.0, 1.0, &values, 2, 2).with_period(100.0), &mut sink)
            .unwrap();

        assert_eq!(sink.frames().len(), 2);
        assert_eq!(sink.frames()[1].time, 105.0);
        assert_eq!(sink.frames()[1].values, vec![3.0, 4.0]);
    }
}
