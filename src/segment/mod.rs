// Segmentation: boundary policies plus the engine that pairs them with a
// temporal aggregator and emits one frame per segment.

pub mod engine;
pub mod fixed;
pub mod onset;
pub mod timelist;

pub use engine::{SegmentEngine, SegmentOutput};
pub use fixed::FixedChop;
pub use onset::{OdfMode, OnsetParams, OnsetSegmenter};
pub use timelist::{clean_time_list, TimeList};

use serde::{Deserialize, Serialize};

/// One reported segment, times in ms
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub duration: f64,
}

impl Segment {
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    /// Segment spanning `[start, end)`
    pub fn between(start: f64, end: f64) -> Self {
        Self {
            start,
            duration: end - start,
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Stateful decision function mapping a stream of frames to segments.
///
/// For each frame the policy first closes every segment that ended at or
/// before the frame (catching up through any number of boundaries), then
/// says whether the frame itself belongs to an open segment.
pub trait Segmenter: Send {
    /// Clear all state, back to the beginning of the stream
    fn reset(&mut self);

    /// Push the segments closed by a frame at `time` into `closed` and
    /// return whether the frame is inside a segment.
    fn advance(&mut self, time: f64, frame: &[f32], closed: &mut Vec<Segment>) -> bool;

    /// End of input at `input_end`: push the remaining segments that should
    /// be reported, with the pending one clipped to `input_end`.
    fn finalize(&mut self, input_end: f64, closed: &mut Vec<Segment>);

    /// Time of the next scheduled boundary, `+inf` when none is known
    fn next_boundary(&self) -> f64;
}
