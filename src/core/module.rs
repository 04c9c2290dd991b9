use super::{AttrValue, AttributeSet, Diagnostics, FrameBatch, StreamDescriptor};
use anyhow::Result;
use serde_json::Value;

/// Downstream end of a module: whatever receives its negotiated shape and
/// its frames. Implemented by the next module's link in a chain and by
/// terminal sinks.
pub trait Receiver {
    fn stream_attributes(&mut self, descriptor: &StreamDescriptor) -> Result<()>;

    fn frames(&mut self, batch: &FrameBatch<'_>) -> Result<()>;

    fn reset(&mut self) -> Result<()>;

    fn finalize(&mut self, input_end: f64) -> Result<()>;
}

/// Lifecycle every processing unit implements.
///
/// Operations run synchronously inside one call stack: a module either
/// produces frames into `next` before returning or buffers them for a later
/// call. Returning an error aborts the current call for the whole chain.
pub trait Module: Send {
    /// Registry id of the module type
    fn name(&self) -> &str;

    fn attributes(&self) -> &AttributeSet;

    fn attributes_mut(&mut self) -> &mut AttributeSet;

    /// Connect the module to its host's diagnostics channel
    fn set_diagnostics(&mut self, diagnostics: Diagnostics);

    /// Compute the output shape for `input`, adjusting internal buffers.
    /// Must fail before anything is forwarded when `input` cannot be honoured.
    fn setup(&mut self, input: &StreamDescriptor) -> Result<StreamDescriptor>;

    /// Consume the frames of `batch`, emitting results into `next`
    fn process(&mut self, batch: &FrameBatch<'_>, next: &mut dyn Receiver) -> Result<()>;

    /// Negotiate the stream shape: set up, then forward the output
    /// descriptor downstream before returning it.
    fn negotiate(&mut self, input: &StreamDescriptor, next: &mut dyn Receiver) -> Result<StreamDescriptor> {
        let output = self.setup(input)?;
        next.stream_attributes(&output)?;
        self.attributes_mut().clear_renegotiation();
        Ok(output)
    }

    /// Clear running state, keeping the negotiated shape
    fn reset(&mut self, next: &mut dyn Receiver) -> Result<()> {
        next.reset()
    }

    /// End of input: flush or drop pending output, then forward
    fn finalize(&mut self, input_end: f64, next: &mut dyn Receiver) -> Result<()> {
        next.finalize(input_end)
    }

    /// Apply a JSON object of attribute values
    fn configure(&mut self, config: &Value) -> Result<()> {
        self.attributes_mut().apply_json(config)?;
        Ok(())
    }

    /// Set one attribute, `silent` suppressing renegotiation
    fn set_attribute(&mut self, name: &str, value: AttrValue, silent: bool) -> Result<()> {
        self.attributes_mut().set(name, value, silent)?;
        Ok(())
    }

    fn attribute(&self, name: &str) -> Option<&AttrValue> {
        self.attributes().get(name)
    }
}
