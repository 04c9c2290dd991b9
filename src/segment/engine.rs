use anyhow::Result;
use log::debug;

use super::{Segment, Segmenter};
use crate::core::{FrameBatch, Receiver, StreamDescriptor};
use crate::temporal::{StatFlags, TempMod};

/// Columns of a segment frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SegmentOutput {
    /// Leading segment duration column in ms
    pub duration: bool,
    /// Number of frames aggregated into the segment
    pub count: bool,
    pub stats: StatFlags,
}

impl SegmentOutput {
    fn leading(&self) -> usize {
        self.duration as usize + self.count as usize
    }
}

/// Drives a [`Segmenter`] over incoming frames, aggregates the frames inside
/// segments and emits one frame per closed segment, timed at its start.
#[derive(Debug, Default)]
pub struct SegmentEngine {
    output: SegmentOutput,
    stats: TempMod,
    closed: Vec<Segment>,
    out: Vec<f32>,
    weight: f64,
    segment_index: u64,
    last_segment: Option<Segment>,
}

impl SegmentEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapt to an input shape. Returns true when buffers were reallocated.
    ///
    /// The open segment survives a change of output columns. Its frames are
    /// dropped only when the input width changes.
    pub fn configure(&mut self, input: &StreamDescriptor, output: SegmentOutput) -> bool {
        let frame_size = input.frame_size();
        let shape_changed = self.output != output || self.stats.width() != frame_size;

        self.output = output;
        self.stats.configure(output.stats, frame_size);
        if shape_changed {
            self.out = vec![0.0; self.output_width()];
            debug!("segment engine reallocated: {} input values -> {} output columns", frame_size, self.out.len());
        }
        shape_changed
    }

    pub fn output(&self) -> SegmentOutput {
        self.output
    }

    pub fn output_width(&self) -> usize {
        self.output.leading() + self.stats.num_values()
    }

    /// Output descriptor for segments emitted at `frame_rate`
    pub fn describe(&self, input: &StreamDescriptor, frame_rate: f64) -> StreamDescriptor {
        let mut labels = Vec::with_capacity(self.output_width());
        if self.output.duration {
            labels.push("Duration".to_string());
        }
        if self.output.count {
            labels.push("Count".to_string());
        }

        let width = input.width.max(1) as usize;
        let element_labels: Vec<String> = (0..input.frame_size())
            .map(|e| input.label(e % width).unwrap_or("").to_string())
            .collect();
        labels.extend(self.stats.labels(&element_labels));

        StreamDescriptor {
            has_time_tags: true,
            frame_rate,
            offset: input.offset,
            width: self.output_width() as u32,
            height: 1,
            labels,
            has_var_size: false,
            domain: 0.0,
            max_frames: 1,
        }
    }

    pub fn reset(&mut self) {
        self.stats.reset();
        self.closed.clear();
        self.segment_index = 0;
        self.last_segment = None;
    }

    /// Segments emitted since the last reset
    pub fn segments_emitted(&self) -> u64 {
        self.segment_index
    }

    pub fn last_segment(&self) -> Option<Segment> {
        self.last_segment
    }

    /// Frames aggregated into the open segment so far
    pub fn pending_count(&self) -> u64 {
        self.stats.count()
    }

    pub fn process<S>(&mut self, segmenter: &mut S, batch: &FrameBatch<'_>, next: &mut dyn Receiver) -> Result<()>
    where
        S: Segmenter + ?Sized,
    {
        self.weight = batch.weight;
        for (time, frame) in batch.frames() {
            let mut closed = std::mem::take(&mut self.closed);
            closed.clear();
            let inside = segmenter.advance(time, frame, &mut closed);

            let emitted = self.emit_all(&closed, next);
            self.closed = closed;
            emitted?;

            if inside {
                self.stats.input(frame);
            }
        }
        Ok(())
    }

    /// Flush the segments the policy still reports, then forward finalize
    pub fn finalize<S>(&mut self, segmenter: &mut S, input_end: f64, next: &mut dyn Receiver) -> Result<()>
    where
        S: Segmenter + ?Sized,
    {
        let mut closed = std::mem::take(&mut self.closed);
        closed.clear();
        segmenter.finalize(input_end, &mut closed);

        let emitted = self.emit_all(&closed, next);
        self.closed = closed;
        emitted?;

        // frames after the last reported segment are not carried over
        self.stats.reset();
        next.finalize(input_end)
    }

    fn emit_all(&mut self, segments: &[Segment], next: &mut dyn Receiver) -> Result<()> {
        for segment in segments {
            self.emit(*segment, next)?;
        }
        Ok(())
    }

    fn emit(&mut self, segment: Segment, next: &mut dyn Receiver) -> Result<()> {
        debug_assert!(segment.duration >= 0.0, "segment ends before it starts: {:?}", segment);

        let count = self.stats.count();
        let mut i = 0;
        if self.output.duration {
            self.out[i] = segment.duration as f32;
            i += 1;
        }
        if self.output.count {
            self.out[i] = count as f32;
            i += 1;
        }

        let written = self.stats.get_values(&mut self.out[i..], true);
        // a segment without frames reports neutral statistics
        self.out[i + written..].fill(0.0);

        self.segment_index += 1;
        self.last_segment = Some(segment);
        next.frames(&FrameBatch::single(segment.start, self.weight, &self.out))
    }
}
