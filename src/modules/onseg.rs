use anyhow::Result;
use featstream_macros::StreamModule;
use log::debug;

use super::{segment_output, with_segment_outputs};
use crate::core::{Attribute, AttributeSet, Diagnostics, FrameBatch, Module, Receiver, StreamDescriptor, StreamError};
use crate::registry::Registered;
use crate::segment::{OdfMode, OnsetParams, OnsetSegmenter, Segment, SegmentEngine, Segmenter};

/// Segments the stream at detected onsets and reports statistics over each
/// segment. Segments end at the next onset, when the smoothed energy drops
/// below `off_threshold`, or at the end of input.
#[derive(StreamModule)]
#[module_meta(name = "Onset Segmentation", category = "Segmentation")]
pub struct Onseg {
    attrs: AttributeSet,
    diag: Diagnostics,
    engine: SegmentEngine,
    detector: OnsetSegmenter,
    allocations: usize,
}

impl Default for Onseg {
    fn default() -> Self {
        let defaults = OnsetParams::default();
        let attrs = AttributeSet::new()
            .with(
                Attribute::int_list("columns")
                    .describe("input columns fed to onset detection, empty for all")
                    .renegotiates(),
            )
            .with(
                Attribute::int("filter_size", 3)
                    .range(Some(1.0), None)
                    .describe("frames averaged before detection")
                    .renegotiates(),
            )
            .with(Attribute::choice("odf_mode", &OdfMode::NAMES, OdfMode::NAMES[0]).describe("onset detection function"))
            .with(Attribute::float("threshold", defaults.threshold).describe("detection function value that marks an onset"))
            .with(
                Attribute::float("off_threshold", defaults.off_threshold)
                    .describe("mean smoothed energy below which a segment ends"),
            )
            .with(
                Attribute::float("min_interval", defaults.min_interval)
                    .range(Some(0.0), None)
                    .describe("minimum time between onsets in ms"),
            )
            .with(
                Attribute::float("min_duration", defaults.min_duration)
                    .range(Some(0.0), None)
                    .describe("minimum segment duration in ms"),
            )
            .with(
                Attribute::float("max_duration", defaults.max_duration)
                    .range(Some(0.0), None)
                    .describe("maximum segment duration in ms, 0 for unbounded"),
            )
            .with(Attribute::float("offset", defaults.offset).describe("added to onset times in ms"))
            .with(Attribute::bool("start_is_onset", defaults.start_is_onset).describe("first frame opens a segment"));

        Self {
            attrs: with_segment_outputs(attrs),
            diag: Diagnostics::default(),
            engine: SegmentEngine::new(),
            detector: OnsetSegmenter::new(defaults, Vec::new(), 1, 0.0),
            allocations: 0,
        }
    }
}

impl Onseg {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times negotiation had to rebuild detector or output buffers
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Delay in ms subtracted from detected onset times
    pub fn latency(&self) -> f64 {
        self.detector.latency()
    }

    pub fn is_on(&self) -> bool {
        self.detector.is_on()
    }

    pub fn last_segment(&self) -> Option<Segment> {
        self.engine.last_segment()
    }

    fn read_params(&self) -> Result<OnsetParams, StreamError> {
        Ok(OnsetParams {
            mode: OdfMode::from_index(self.attrs.choice("odf_mode")?),
            threshold: self.attrs.f64("threshold")?,
            off_threshold: self.attrs.f64("off_threshold")?,
            min_interval: self.attrs.f64("min_interval")?,
            min_duration: self.attrs.f64("min_duration")?,
            max_duration: self.attrs.f64("max_duration")?,
            offset: self.attrs.f64("offset")?,
            start_is_onset: self.attrs.bool("start_is_onset")?,
        })
    }

    /// Requested columns that exist in a frame `width` values wide
    fn select_columns(&self, width: usize) -> Result<Vec<usize>, StreamError> {
        let requested = self.attrs.i64_list("columns")?;
        let mut columns = Vec::with_capacity(requested.len());
        for &c in requested {
            if c >= 0 && (c as usize) < width {
                columns.push(c as usize);
            } else {
                self.diag
                    .warning(format!("column {} ignored, input has {} columns", c, width));
            }
        }
        if columns.is_empty() {
            columns = (0..width).collect();
        }
        Ok(columns)
    }

    fn refresh(&mut self) -> Result<()> {
        if self.attrs.take_dirty() {
            self.attrs.sanitize(&self.diag);
            let params = self.read_params()?;
            self.detector.set_params(params);
        }
        Ok(())
    }
}

impl Module for Onseg {
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

        self.attrs.sanitize(&self.diag);
        self.attrs.take_dirty();

        let columns = self.select_columns(input.width as usize)?;
        let filter_size = self.attrs.i64("filter_size")?.max(1) as usize;
        let params = self.read_params()?;
        let output = segment_output(&self.attrs)?;

        let restarted = self.detector.reshape(columns, filter_size, input.frame_period());
        self.detector.set_params(params);
        let reallocated = self.engine.configure(input, output);
        if restarted {
            // segment in progress belonged to the old detector shape
            self.engine.reset();
        }
        if restarted || reallocated {
            self.allocations += 1;
        }

        debug!(
            "onset segmentation negotiated: filter {} frames, latency {} ms, {} output columns",
            filter_size,
            self.detector.latency(),
            self.engine.output_width()
        );
        Ok(self.engine.describe(input, 0.0))
    }

    fn process(&mut self, batch: &FrameBatch<'_>, next: &mut dyn Receiver) -> Result<()> {
        self.refresh()?;
        self.engine.process(&mut self.detector, batch, next)
    }

    fn reset(&mut self, next: &mut dyn Receiver) -> Result<()> {
        self.detector.reset();
        self.engine.reset();
        next.reset()
    }

    fn finalize(&mut self, input_end: f64, next: &mut dyn Receiver) -> Result<()> {
        self.engine.finalize(&mut self.detector, input_end, next)
    }
}
