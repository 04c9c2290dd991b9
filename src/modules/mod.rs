pub mod chop;
pub mod collector;
pub mod onseg;
pub mod print;
pub mod rms;
pub mod scale;
pub mod slice;

pub use chop::Chop;
pub use collector::Collector;
pub use onseg::Onseg;
pub use print::Print;
pub use rms::Rms;
pub use scale::Scale;
pub use slice::Slice;

use crate::core::{Attribute, AttributeSet, StreamError};
use crate::segment::SegmentOutput;
use crate::temporal::StatFlags;

/// Output columns shared by the segmenting modules
fn with_segment_outputs(attrs: AttributeSet) -> AttributeSet {
    attrs
        .with(Attribute::bool("duration", true).describe("output segment duration in ms").renegotiates())
        .with(Attribute::bool("count", false).describe("output number of frames in the segment").renegotiates())
        .with(Attribute::bool("min", false).describe("output segment minimum per column").renegotiates())
        .with(Attribute::bool("max", false).describe("output segment maximum per column").renegotiates())
        .with(Attribute::bool("mean", true).describe("output segment mean per column").renegotiates())
        .with(Attribute::bool("stddev", false).describe("output segment standard deviation per column").renegotiates())
}

fn segment_output(attrs: &AttributeSet) -> Result<SegmentOutput, StreamError> {
    Ok(SegmentOutput {
        duration: attrs.bool("duration")?,
        count: attrs.bool("count")?,
        stats: StatFlags {
            min: attrs.bool("min")?,
            max: attrs.bool("max")?,
            mean: attrs.bool("mean")?,
            stddev: attrs.bool("stddev")?,
        },
    })
}
