use serde::{Deserialize, Serialize};

use super::StreamError;

/// Negotiated shape, rate and units of the frames flowing between two
/// modules. Replaced wholesale on every negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Frames carry explicit times instead of a regular rate
    pub has_time_tags: bool,

    /// Frames per second
    pub frame_rate: f64,

    /// Time offset in ms applied to emitted times
    pub offset: f64,

    /// Columns per frame
    pub width: u32,

    /// Rows per frame
    pub height: u32,

    /// Column names, at most `width` entries
    #[serde(default)]
    pub labels: Vec<String>,

    pub has_var_size: bool,

    /// Physical span of one frame (seconds, Hz, ...)
    pub domain: f64,

    /// Largest number of frames passed in one call
    pub max_frames: u32,
}

impl StreamDescriptor {
    /// Regular stream of `width` x `height` frames at `frame_rate` Hz
    pub fn new(width: u32, height: u32, frame_rate: f64) -> Self {
        Self {
            has_time_tags: false,
            frame_rate,
            offset: 0.0,
            width,
            height,
            labels: Vec::new(),
            has_var_size: false,
            domain: 0.0,
            max_frames: 1,
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_frames(mut self, max_frames: u32) -> Self {
        self.max_frames = max_frames;
        self
    }

    pub fn with_domain(mut self, domain: f64) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_time_tags(mut self, has_time_tags: bool) -> Self {
        self.has_time_tags = has_time_tags;
        self
    }

    /// Values per frame
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Frame period in ms, 0 for irregular streams
    pub fn frame_period(&self) -> f64 {
        frame_period(self.frame_rate)
    }

    pub fn label(&self, column: usize) -> Option<&str> {
        self.labels.get(column).map(String::as_str).filter(|l| !l.is_empty())
    }

    /// Structural checks every module relies on
    pub fn validate(&self) -> Result<(), StreamError> {
        let fail = |reason: String| {
            Err(StreamError::Config {
                reason: format!("stream descriptor: {}", reason),
            })
        };

        if self.width == 0 || self.height == 0 {
            return fail(format!("empty frame shape {}x{}", self.width, self.height));
        }
        if !self.frame_rate.is_finite() || self.frame_rate < 0.0 {
            return fail(format!("frame rate {} is not a finite positive value", self.frame_rate));
        }
        if self.labels.len() > self.width as usize {
            return fail(format!("{} labels for {} columns", self.labels.len(), self.width));
        }
        Ok(())
    }
}

/// Period in ms of a frame rate in Hz, 0 when the rate is not positive
pub fn frame_period(frame_rate: f64) -> f64 {
    if frame_rate > 0.0 {
        1000.0 / frame_rate
    } else {
        0.0
    }
}
