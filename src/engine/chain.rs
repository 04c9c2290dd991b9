use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use super::ChainState;
use crate::core::{
    to_status, AttrValue, Diagnostic, Diagnostics, FrameBatch, Module, Receiver, StreamDescriptor, StreamError,
};
use crate::modules::Collector;
use crate::observability::{ChainMonitor, MetricsCollector, ModuleMetrics};
use crate::registry;

/// The part of a chain downstream of one module. Receiving on a link runs
/// the first module of the remaining slice with the rest of the slice as
/// its own downstream; an empty link hands over to the terminal receiver.
struct Link<'a> {
    modules: &'a mut [Box<dyn Module>],
    metrics: &'a [Arc<ModuleMetrics>],
    /// Metrics of the module feeding this link, credited with its output
    upstream: Option<&'a ModuleMetrics>,
    sink: &'a mut dyn Receiver,
    output: &'a mut Option<StreamDescriptor>,
}

impl<'a> Link<'a> {
    /// First module of the link, its metrics and the link downstream of it
    fn split(&mut self) -> Option<(&mut Box<dyn Module>, Option<&'a ModuleMetrics>, Link<'_>)> {
        let metrics = self.metrics;
        let (module, rest) = self.modules.split_first_mut()?;
        let own = metrics.first().map(Arc::as_ref);
        let next = Link {
            modules: rest,
            metrics: metrics.get(1..).unwrap_or(&[]),
            upstream: own,
            sink: &mut *self.sink,
            output: &mut *self.output,
        };
        Some((module, own, next))
    }
}

impl Receiver for Link<'_> {
    fn stream_attributes(&mut self, descriptor: &StreamDescriptor) -> Result<()> {
        match self.split() {
            Some((module, _, mut next)) => {
                let produced = module.negotiate(descriptor, &mut next)?;
                debug!(
                    "{} negotiated {}x{} @ {} Hz -> {}x{} @ {} Hz",
                    module.name(),
                    descriptor.width,
                    descriptor.height,
                    descriptor.frame_rate,
                    produced.width,
                    produced.height,
                    produced.frame_rate
                );
                Ok(())
            }
            None => {
                *self.output = Some(descriptor.clone());
                self.sink.stream_attributes(descriptor)
            }
        }
    }

    fn frames(&mut self, batch: &FrameBatch<'_>) -> Result<()> {
        if let Some(upstream) = self.upstream {
            upstream.record_emitted(batch.count);
        }
        match self.split() {
            Some((module, Some(metrics), mut next)) => {
                let start = metrics.start_processing();
                let result = module.process(batch, &mut next);
                metrics.finish_processing(start);
                match &result {
                    Ok(()) => metrics.record_batch(batch.count),
                    Err(_) => metrics.record_error(),
                }
                result
            }
            Some((module, None, mut next)) => module.process(batch, &mut next),
            None => self.sink.frames(batch),
        }
    }

    fn reset(&mut self) -> Result<()> {
        match self.split() {
            Some((module, _, mut next)) => module.reset(&mut next),
            None => self.sink.reset(),
        }
    }

    fn finalize(&mut self, input_end: f64) -> Result<()> {
        match self.split() {
            Some((module, _, mut next)) => module.finalize(input_end, &mut next),
            None => self.sink.finalize(input_end),
        }
    }
}

/// Linear sequence of modules ending in a terminal receiver.
///
/// The chain enforces the lifecycle every module relies on: frames are only
/// accepted after a successful negotiation, must match the negotiated
/// frame size, and stop after finalize until the next reset or
/// negotiation. Any failure moves the chain to [`ChainState::Error`].
pub struct Chain<R: Receiver = Collector> {
    modules: Vec<Box<dyn Module>>,
    metrics: Vec<Arc<ModuleMetrics>>,
    sink: R,
    state: ChainState,
    input: Option<StreamDescriptor>,
    output: Option<StreamDescriptor>,
    diagnostics: Diagnostics,
    diagnostics_rx: crossbeam_channel::Receiver<Diagnostic>,
}

impl Chain<Collector> {
    /// Chain recording its output in a [`Collector`]
    pub fn new() -> Self {
        Self::with_sink(Collector::new())
    }

    /// Build a chain from `{"modules": [{"type": id, "config": {...}}, ...]}`.
    /// When the document also carries an `"input"` descriptor the chain is
    /// negotiated right away.
    pub fn from_json(config: &Value) -> Result<Self> {
        let modules = config["modules"].as_array().ok_or_else(|| StreamError::Config {
            reason: "chain config must have a \"modules\" array".to_string(),
        })?;

        let mut chain = Self::new();
        for (index, module_config) in modules.iter().enumerate() {
            let id = module_config["type"]
                .as_str()
                .ok_or_else(|| StreamError::Config {
                    reason: format!("module {} missing type", index),
                })?;
            chain
                .add(id, &module_config["config"])
                .with_context(|| format!("module {} ({})", index, id))?;
        }

        if let Some(input) = config.get("input") {
            let input: StreamDescriptor = serde_json::from_value(input.clone()).map_err(|e| StreamError::Config {
                reason: format!("invalid input descriptor: {}", e),
            })?;
            chain.negotiate(&input)?;
        }
        Ok(chain)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Value = serde_json::from_str(&text).map_err(|e| StreamError::Config {
            reason: format!("{}: {}", path.display(), e),
        })?;
        Self::from_json(&config)
    }
}

impl Default for Chain<Collector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Receiver> Chain<R> {
    pub fn with_sink(sink: R) -> Self {
        let (diagnostics, diagnostics_rx) = Diagnostics::channel();
        Self {
            modules: Vec::new(),
            metrics: Vec::new(),
            sink,
            state: ChainState::Unconfigured,
            input: None,
            output: None,
            diagnostics: diagnostics.for_module("chain"),
            diagnostics_rx,
        }
    }

    /// Append a module. The chain has to be negotiated again afterwards.
    pub fn push(&mut self, mut module: Box<dyn Module>) -> &mut Self {
        module.set_diagnostics(self.diagnostics.clone());
        let slot = self.modules.len();
        self.metrics.push(Arc::new(ModuleMetrics::new(module.name())));
        debug!("chain slot {}: {}", slot, module.name());
        self.modules.push(module);
        self.invalidate();
        self
    }

    /// Append a registered module type configured from a JSON object
    pub fn add(&mut self, id: &str, config: &Value) -> Result<&mut Self> {
        let mut module = registry::create(id).map_err(|e| self.diagnostics.error(e))?;
        module.configure(config)?;
        Ok(self.push(module))
    }

    fn invalidate(&mut self) {
        self.state = ChainState::Unconfigured;
        self.input = None;
        self.output = None;
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn module(&self, index: usize) -> Option<&dyn Module> {
        self.modules.get(index).map(|m| m.as_ref())
    }

    pub fn state(&self) -> &ChainState {
        &self.state
    }

    pub fn input_descriptor(&self) -> Option<&StreamDescriptor> {
        self.input.as_ref()
    }

    /// Descriptor the terminal receiver accepted last
    pub fn output_descriptor(&self) -> Option<&StreamDescriptor> {
        self.output.as_ref()
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut R {
        &mut self.sink
    }

    pub fn into_sink(self) -> R {
        self.sink
    }

    /// Receiving end of the warnings and errors raised by the chain and its
    /// modules. It holds at most [`crate::core::DIAGNOSTICS_CAPACITY`] undrained messages.
    pub fn diagnostics(&self) -> &crossbeam_channel::Receiver<Diagnostic> {
        &self.diagnostics_rx
    }

    /// Diagnostics published since the previous drain
    pub fn drain_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics_rx.try_iter().collect()
    }

    pub fn metrics(&self) -> MetricsCollector {
        let mut collector = MetricsCollector::new();
        for (slot, metrics) in self.metrics.iter().enumerate() {
            collector.register(format!("{:02}:{}", slot, metrics.module_id()), metrics.clone());
        }
        collector
    }

    pub fn monitor(&self) -> ChainMonitor {
        ChainMonitor::new(self.metrics())
    }

    /// Set an attribute of the module at `index`. A non-silent change of an
    /// attribute that reshapes the output renegotiates before the next
    /// frames.
    pub fn set_attribute(&mut self, index: usize, name: &str, value: AttrValue, silent: bool) -> Result<()> {
        let count = self.modules.len();
        let module = self
            .modules
            .get_mut(index)
            .ok_or_else(|| anyhow!("module index {} out of range for {} modules", index, count))?;
        module.set_attribute(name, value, silent)
    }

    pub fn attribute(&self, index: usize, name: &str) -> Option<&AttrValue> {
        self.modules.get(index).and_then(|m| m.attribute(name))
    }

    fn link(&mut self) -> Link<'_> {
        Link {
            modules: &mut self.modules,
            metrics: &self.metrics,
            upstream: None,
            sink: &mut self.sink,
            output: &mut self.output,
        }
    }

    fn fail(&mut self, err: anyhow::Error) -> anyhow::Error {
        self.state = ChainState::Error {
            message: format!("{:#}", err),
        };
        err
    }

    fn invalid_state(&self, operation: &str) -> anyhow::Error {
        self.diagnostics.error(StreamError::InvalidState {
            operation: operation.to_string(),
            state: self.state.name().to_string(),
        })
    }

    /// Negotiate the whole chain for `input`, returning the descriptor the
    /// terminal receiver accepted.
    pub fn negotiate(&mut self, input: &StreamDescriptor) -> Result<StreamDescriptor> {
        if let Err(e) = input.validate() {
            self.output = None;
            let err = self.diagnostics.error(e);
            return Err(self.fail(err));
        }

        self.output = None;
        let result = self.link().stream_attributes(input);
        match (result, self.output.clone()) {
            (Ok(()), Some(output)) => {
                self.input = Some(input.clone());
                self.state = ChainState::Configured;
                info!(
                    "chain of {} modules negotiated: {}x{} @ {} Hz -> {}x{} @ {} Hz",
                    self.modules.len(),
                    input.width,
                    input.height,
                    input.frame_rate,
                    output.width,
                    output.height,
                    output.frame_rate
                );
                Ok(output)
            }
            (Ok(()), None) => {
                let err = anyhow!("negotiation did not reach the end of the chain");
                Err(self.fail(err))
            }
            (Err(err), _) => {
                self.output = None;
                self.input = None;
                Err(self.fail(err))
            }
        }
    }

    fn needs_renegotiation(&self) -> bool {
        self.modules.iter().any(|m| m.attributes().needs_renegotiation())
    }

    /// Push a batch of frames through the chain
    pub fn process(&mut self, batch: &FrameBatch<'_>) -> Result<()> {
        if !self.state.accepts_frames() {
            return Err(self.invalid_state("process"));
        }

        if self.needs_renegotiation() {
            if let Some(input) = self.input.clone() {
                info!("attribute change requires renegotiation");
                self.negotiate(&input)?;
            }
        }

        let (frame_size, period) = match &self.input {
            Some(input) => (input.frame_size(), input.frame_period()),
            None => return Err(self.invalid_state("process")),
        };
        if batch.count > 0 && (batch.row_size != frame_size || batch.values.len() < frame_size * batch.count) {
            let err = self.diagnostics.error(StreamError::FrameSizeMismatch {
                expected: frame_size,
                got: batch.row_size,
            });
            return Err(self.fail(err));
        }

        let batch = FrameBatch { period, ..*batch };
        match self.link().frames(&batch) {
            Ok(()) => {
                self.state = ChainState::Streaming;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Convenience form of [`Chain::process`] over raw values
    pub fn process_values(&mut self, time: f64, weight: f64, values: &[f32], row_size: usize, count: usize) -> Result<()> {
        self.process(&FrameBatch::new(time, weight, values, row_size, count))
    }

    /// Clear running state everywhere, keeping the negotiated shapes
    pub fn reset(&mut self) -> Result<()> {
        if self.output.is_none() || self.input.is_none() {
            return Err(self.invalid_state("reset"));
        }
        match self.link().reset() {
            Ok(()) => {
                self.state = ChainState::Configured;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// End of input at `input_end` ms
    pub fn finalize(&mut self, input_end: f64) -> Result<()> {
        if !self.state.can_transition_to(&ChainState::Finalized) {
            return Err(self.invalid_state("finalize"));
        }
        match self.link().finalize(input_end) {
            Ok(()) => {
                self.state = ChainState::Finalized;
                info!("chain finalized at {} ms", input_end);
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// [`Chain::negotiate`] with an integer status: 0 on success, the
    /// negative error code otherwise
    #[allow(clippy::too_many_arguments)]
    pub fn negotiate_status(
        &mut self,
        has_time_tags: bool,
        frame_rate: f64,
        offset: f64,
        width: u32,
        height: u32,
        labels: &[&str],
        has_var_size: bool,
        domain: f64,
        max_frames: u32,
    ) -> i32 {
        let input = StreamDescriptor {
            has_time_tags,
            frame_rate,
            offset,
            width,
            height,
            labels: labels.iter().map(|l| l.to_string()).collect(),
            has_var_size,
            domain,
            max_frames,
        };
        to_status(&self.negotiate(&input))
    }

    pub fn process_status(&mut self, time: f64, weight: f64, values: &[f32], row_size: usize, count: usize) -> i32 {
        to_status(&self.process_values(time, weight, values, row_size, count))
    }

    pub fn reset_status(&mut self) -> i32 {
        to_status(&self.reset())
    }

    pub fn finalize_status(&mut self, input_end: f64) -> i32 {
        to_status(&self.finalize(input_end))
    }
}
