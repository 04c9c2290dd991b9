use anyhow::Result;
use featstream_macros::StreamModule;
use log::debug;

use super::{segment_output, with_segment_outputs};
use crate::core::{
    AttrValue, Attribute, AttributeSet, Diagnostics, FrameBatch, Module, Receiver, StreamDescriptor, StreamError,
};
use crate::registry::Registered;
use crate::segment::{FixedChop, Segment, SegmentEngine, SegmentOutput, Segmenter, TimeList};

/// Smallest non-zero chop size in ms on streams without a frame rate
const MIN_UNTIMED_SIZE: f64 = 1.0;

/// Chops the stream into fixed-size segments, or into explicitly listed
/// segments when `times` is not empty, and reports statistics per segment.
#[derive(StreamModule)]
#[module_meta(name = "Chop", category = "Segmentation")]
pub struct Chop {
    attrs: AttributeSet,
    diag: Diagnostics,
    engine: SegmentEngine,
    policy: ChopPolicy,
    /// Boundary configuration of the last negotiation
    boundaries: Option<Boundaries>,
    /// Smallest non-zero size for the negotiated input
    min_size: f64,
    allocations: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct Boundaries {
    offset: f64,
    size: f64,
    times: Vec<f64>,
    durations: Vec<f64>,
}

impl Boundaries {
    fn policy(&self) -> ChopPolicy {
        if self.times.is_empty() {
            ChopPolicy::Fixed(FixedChop::new(self.offset, self.size))
        } else {
            ChopPolicy::List(TimeList::new(&self.times, &self.durations, self.offset))
        }
    }

    /// Same segmentation apart from a live size change
    fn same_layout(&self, other: &Boundaries) -> bool {
        self.offset == other.offset && self.times == other.times && self.durations == other.durations
    }
}

#[derive(Debug, Clone)]
enum ChopPolicy {
    Fixed(FixedChop),
    List(TimeList),
}

impl Segmenter for ChopPolicy {
    fn reset(&mut self) {
        match self {
            ChopPolicy::Fixed(p) => p.reset(),
            ChopPolicy::List(p) => p.reset(),
        }
    }

    fn advance(&mut self, time: f64, frame: &[f32], closed: &mut Vec<Segment>) -> bool {
        match self {
            ChopPolicy::Fixed(p) => p.advance(time, frame, closed),
            ChopPolicy::List(p) => p.advance(time, frame, closed),
        }
    }

    fn finalize(&mut self, input_end: f64, closed: &mut Vec<Segment>) {
        match self {
            ChopPolicy::Fixed(p) => p.finalize(input_end, closed),
            ChopPolicy::List(p) => p.finalize(input_end, closed),
        }
    }

    fn next_boundary(&self) -> f64 {
        match self {
            ChopPolicy::Fixed(p) => p.next_boundary(),
            ChopPolicy::List(p) => p.next_boundary(),
        }
    }
}

impl Default for Chop {
    fn default() -> Self {
        let attrs = AttributeSet::new()
            .with(
                Attribute::float("offset", 0.0)
                    .describe("time of the first segment start in ms")
                    .renegotiates(),
            )
            .with(
                Attribute::float("size", 242.0)
                    .range(Some(0.0), None)
                    .describe("chop size in ms, 0 chops once at the end of input, at least one frame period otherwise"),
            )
            .with(
                Attribute::float_list("times")
                    .describe("explicit segment start times in ms, empty for fixed-size chopping")
                    .renegotiates(),
            )
            .with(
                Attribute::float_list("durations")
                    .range(Some(0.0), None)
                    .describe("durations of the listed segments in ms")
                    .renegotiates(),
            );

        Self {
            attrs: with_segment_outputs(attrs),
            diag: Diagnostics::default(),
            engine: SegmentEngine::new(),
            policy: ChopPolicy::Fixed(FixedChop::new(0.0, 0.0)),
            boundaries: None,
            min_size: MIN_UNTIMED_SIZE,
            allocations: 0,
        }
    }
}

impl Chop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times negotiation had to rebuild the output buffers
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    pub fn next_boundary(&self) -> f64 {
        self.policy.next_boundary()
    }

    pub fn last_segment(&self) -> Option<Segment> {
        self.engine.last_segment()
    }

    /// Raise a non-zero size below one frame period to the period
    fn floor_size(&mut self) -> Result<f64, StreamError> {
        let size = self.attrs.f64("size")?;
        if size > 0.0 && size < self.min_size {
            self.diag.warning(format!(
                "size {} ms is below one frame period, corrected to {} ms",
                size, self.min_size
            ));
            self.attrs.set("size", AttrValue::Float(self.min_size), true)?;
            return Ok(self.min_size);
        }
        Ok(size)
    }

    fn read_boundaries(&self, size: f64) -> Result<Boundaries, StreamError> {
        Ok(Boundaries {
            offset: self.attrs.f64("offset")?,
            size,
            times: self.attrs.f64_list("times")?.to_vec(),
            durations: self.attrs.f64_list("durations")?.to_vec(),
        })
    }

    /// Apply attributes changed while streaming
    fn refresh(&mut self) -> Result<()> {
        if !self.attrs.take_dirty() {
            return Ok(());
        }
        self.attrs.sanitize(&self.diag);
        let size = self.floor_size()?;
        self.attrs.take_dirty();
        if let ChopPolicy::Fixed(chop) = &mut self.policy {
            chop.set_size(size);
        }
        if let Some(boundaries) = &mut self.boundaries {
            boundaries.size = size;
        }
        Ok(())
    }
}

impl Module for Chop {
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

        self.min_size = if input.frame_rate > 0.0 {
            input.frame_period()
        } else {
            MIN_UNTIMED_SIZE
        };
        self.attrs.sanitize(&self.diag);
        let size = self.floor_size()?;
        self.attrs.take_dirty();
        let boundaries = self.read_boundaries(size)?;
        let output: SegmentOutput = segment_output(&self.attrs)?;

        match &self.boundaries {
            Some(previous) if previous.same_layout(&boundaries) => {
                if let ChopPolicy::Fixed(chop) = &mut self.policy {
                    chop.set_size(boundaries.size);
                }
            }
            _ => {
                self.policy = boundaries.policy();
                self.engine.reset();
            }
        }

        // new output columns keep the segment timer running
        if self.engine.configure(input, output) {
            self.allocations += 1;
        }

        let frame_rate = match &self.policy {
            ChopPolicy::Fixed(chop) if chop.size() > 0.0 => 1000.0 / chop.size(),
            ChopPolicy::Fixed(_) => 0.0,
            ChopPolicy::List(_) => 0.0,
        };
        debug!(
            "chop negotiated: {} values in, {} columns out, {}",
            input.frame_size(),
            self.engine.output_width(),
            if boundaries.times.is_empty() {
                format!("size {} ms", boundaries.size)
            } else {
                format!("{} listed segments", boundaries.times.len())
            }
        );
        self.boundaries = Some(boundaries);

        Ok(self.engine.describe(input, frame_rate))
    }

    fn process(&mut self, batch: &FrameBatch<'_>, next: &mut dyn Receiver) -> Result<()> {
        self.refresh()?;
        self.engine.process(&mut self.policy, batch, next)
    }

    fn reset(&mut self, next: &mut dyn Receiver) -> Result<()> {
        self.policy.reset();
        self.engine.reset();
        next.reset()
    }

    fn finalize(&mut self, input_end: f64, next: &mut dyn Receiver) -> Result<()> {
        self.engine.finalize(&mut self.policy, input_end, next)
    }
}
