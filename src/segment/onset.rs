// Onset-driven segmentation
//
// The selected columns of each frame are smoothed by a moving average over
// the last `filter_size` frames. The onset detection function (ODF)
// compares the smoothed frame with the previous smoothed frame. An onset
// fires when the ODF exceeds the threshold outside the debounce interval,
// or unconditionally once the open segment reaches its maximum duration.
// A segment ends when the smoothed energy falls below the off threshold,
// but never before it lasted `min_duration`.

use serde::{Deserialize, Serialize};

use super::{Segment, Segmenter};
use crate::buffers::RingBuffer;

/// Guard for logarithms and normalisation
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OdfMode {
    /// Mean signed difference
    #[default]
    Mean,
    /// Mean squared difference
    MeanSquare,
    /// Root of the mean squared difference
    Rms,
    /// Kullback-Leibler divergence of the normalised frames
    KullbackLeibler,
}

impl OdfMode {
    pub const NAMES: [&'static str; 4] = ["mean", "square", "rms", "kullbackleibler"];

    pub fn from_index(index: usize) -> Self {
        match index {
            1 => OdfMode::MeanSquare,
            2 => OdfMode::Rms,
            3 => OdfMode::KullbackLeibler,
            _ => OdfMode::Mean,
        }
    }

    /// Detection function of `current` against `reference`; 0 for empty
    /// frames or frames without energy to normalise.
    pub fn compute(self, current: &[f32], reference: &[f32]) -> f64 {
        let n = current.len().min(reference.len());
        if n == 0 {
            return 0.0;
        }
        let pairs = current.iter().zip(reference).map(|(c, r)| (*c as f64, *r as f64));

        match self {
            OdfMode::Mean => pairs.map(|(c, r)| c - r).sum::<f64>() / n as f64,
            OdfMode::MeanSquare => pairs.map(|(c, r)| (c - r) * (c - r)).sum::<f64>() / n as f64,
            OdfMode::Rms => (pairs.map(|(c, r)| (c - r) * (c - r)).sum::<f64>() / n as f64).sqrt(),
            OdfMode::KullbackLeibler => {
                let sum_c: f64 = current.iter().map(|v| (*v as f64).max(0.0)).sum();
                let sum_r: f64 = reference.iter().map(|v| (*v as f64).max(0.0)).sum();
                if sum_c < EPSILON || sum_r < EPSILON {
                    return 0.0;
                }
                pairs
                    .map(|(c, r)| {
                        let p = c.max(0.0) / sum_c;
                        let q = r.max(0.0) / sum_r;
                        if p < EPSILON {
                            0.0
                        } else {
                            p * (p / q.max(EPSILON)).ln()
                        }
                    })
                    .sum()
            }
        }
    }
}

/// Detection parameters, times in ms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnsetParams {
    pub mode: OdfMode,
    pub threshold: f64,
    /// Smoothed energy below which an open segment ends
    pub off_threshold: f64,
    /// Debounce interval after an onset
    pub min_interval: f64,
    /// Shortest segment the off threshold may end
    pub min_duration: f64,
    /// Longest segment before a forced onset, 0 for unbounded
    pub max_duration: f64,
    /// Added to every reported time
    pub offset: f64,
    /// The first frame opens a segment
    pub start_is_onset: bool,
}

impl Default for OnsetParams {
    fn default() -> Self {
        Self {
            mode: OdfMode::Mean,
            threshold: 5.0,
            off_threshold: f64::NEG_INFINITY,
            min_interval: 50.0,
            min_duration: 0.0,
            max_duration: 0.0,
            offset: 0.0,
            start_is_onset: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OnsetSegmenter {
    params: OnsetParams,
    /// Columns of the input frame fed to the detector
    columns: Vec<usize>,
    history: RingBuffer<f32>,
    selected: Vec<f32>,
    smoothed: Vec<f32>,
    previous: Vec<f32>,
    has_previous: bool,
    /// Filter delay in ms subtracted from detection times
    latency: f64,
    on: bool,
    segment_start: f64,
    last_onset: f64,
    last_odf: f64,
    seen_frame: bool,
}

impl OnsetSegmenter {
    /// Detector over `columns` of the input, smoothing over `filter_size`
    /// frames spaced `frame_period` ms apart.
    pub fn new(params: OnsetParams, columns: Vec<usize>, filter_size: usize, frame_period: f64) -> Self {
        let filter_size = filter_size.max(1);
        let width = columns.len();
        let mut segmenter = Self {
            params,
            columns,
            history: RingBuffer::new(width, filter_size),
            selected: vec![0.0; width],
            smoothed: vec![0.0; width],
            previous: vec![0.0; width],
            has_previous: false,
            latency: 0.0,
            on: false,
            segment_start: 0.0,
            last_onset: f64::NEG_INFINITY,
            last_odf: 0.0,
            seen_frame: false,
        };
        segmenter.set_latency(filter_size, frame_period);
        segmenter
    }

    /// Adapt to a new column selection or filter length. Returns true when
    /// detection had to restart; an unchanged shape keeps the running state.
    pub fn reshape(&mut self, columns: Vec<usize>, filter_size: usize, frame_period: f64) -> bool {
        let filter_size = filter_size.max(1);
        let width = columns.len();
        let reallocated = self.history.resize(width, filter_size);
        let restarted = reallocated || columns != self.columns;
        if restarted {
            self.columns = columns;
            self.selected = vec![0.0; width];
            self.smoothed = vec![0.0; width];
            self.previous = vec![0.0; width];
            self.reset();
        }
        self.set_latency(filter_size, frame_period);
        restarted
    }

    fn set_latency(&mut self, filter_size: usize, frame_period: f64) {
        self.latency = 0.5 * (filter_size - 1) as f64 * frame_period;
    }

    /// Parameters that can change without restarting detection
    pub fn set_params(&mut self, params: OnsetParams) {
        self.params = params;
    }

    pub fn params(&self) -> &OnsetParams {
        &self.params
    }

    pub fn latency(&self) -> f64 {
        self.latency
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Detection function of the last frame
    pub fn last_odf(&self) -> f64 {
        self.last_odf
    }

    fn detect(&mut self, frame: &[f32]) -> f64 {
        for (dst, &col) in self.selected.iter_mut().zip(&self.columns) {
            *dst = frame.get(col).copied().unwrap_or(0.0);
        }
        self.history.push(&self.selected);
        self.history.mean_into(&mut self.smoothed);

        let odf = if self.has_previous {
            self.params.mode.compute(&self.smoothed, &self.previous)
        } else {
            0.0
        };
        self.previous.copy_from_slice(&self.smoothed);
        self.has_previous = true;
        odf
    }

    fn energy(&self) -> f64 {
        if self.smoothed.is_empty() {
            return 0.0;
        }
        self.smoothed.iter().map(|v| *v as f64).sum::<f64>() / self.smoothed.len() as f64
    }
}

impl Segmenter for OnsetSegmenter {
    fn reset(&mut self) {
        self.history.clear();
        self.has_previous = false;
        self.on = false;
        self.segment_start = 0.0;
        self.last_onset = f64::NEG_INFINITY;
        self.last_odf = 0.0;
        self.seen_frame = false;
    }

    fn advance(&mut self, time: f64, frame: &[f32], closed: &mut Vec<Segment>) -> bool {
        let odf = self.detect(frame);
        self.last_odf = odf;

        let mark = time - self.latency + self.params.offset;
        let first = !self.seen_frame;
        self.seen_frame = true;

        let debounced = mark >= self.last_onset + self.params.min_interval && mark > self.last_onset;
        let forced = self.on && self.params.max_duration > 0.0 && mark >= self.segment_start + self.params.max_duration;
        let onset = (odf > self.params.threshold && debounced)
            || forced
            || (first && self.params.start_is_onset);

        if onset {
            if self.on {
                closed.push(Segment::between(self.segment_start, mark));
            }
            self.on = true;
            self.segment_start = mark;
            self.last_onset = mark;
            return true;
        }

        if self.on
            && self.energy() < self.params.off_threshold
            && mark - self.segment_start >= self.params.min_duration
        {
            closed.push(Segment::between(self.segment_start, mark));
            self.on = false;
        }
        self.on
    }

    fn finalize(&mut self, input_end: f64, closed: &mut Vec<Segment>) {
        let end = input_end - self.latency + self.params.offset;
        if self.on && end >= self.segment_start && end - self.segment_start >= self.params.min_duration {
            closed.push(Segment::between(self.segment_start, end));
        }
        self.on = false;
    }

    fn next_boundary(&self) -> f64 {
        if self.on && self.params.max_duration > 0.0 {
            self.segment_start + self.params.max_duration
        } else {
            f64::INFINITY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector(params: OnsetParams) -> OnsetSegmenter {
        OnsetSegmenter::new(params, vec![0], 1, 5.0)
    }

    fn feed(seg: &mut OnsetSegmenter, frames: &[(f64, f32)]) -> Vec<f64> {
        let mut onsets = Vec::new();
        let mut closed = Vec::new();
        for &(t, v) in frames {
            let was_start = seg.segment_start;
            let was_on = seg.is_on();
            seg.advance(t, &[v], &mut closed);
            if seg.is_on() && (!was_on || seg.segment_start != was_start) {
                onsets.push(seg.segment_start);
            }
        }
        onsets
    }

    fn spikes(at: &[f64], until: f64) -> Vec<(f64, f32)> {
        (0..=(until / 5.0) as usize)
            .map(|i| {
                let t = i as f64 * 5.0;
                (t, if at.contains(&t) { 1.0 } else { 0.0 })
            })
            .collect()
    }

    #[test]
    fn test_debounce_suppresses_close_spikes() {
        let mut seg = detector(OnsetParams {
            threshold: 0.5,
            min_interval: 50.0,
            ..OnsetParams::default()
        });
        let onsets = feed(&mut seg, &spikes(&[10.0, 40.0, 65.0], 100.0));
        assert_eq!(onsets, vec![10.0, 65.0]);
    }

    #[test]
    fn test_off_threshold_respects_min_duration() {
        let mut seg = detector(OnsetParams {
            threshold: 0.5,
            off_threshold: 0.5,
            min_interval: 0.0,
            min_duration: 20.0,
            ..OnsetParams::default()
        });
        let mut closed = Vec::new();
        let frames = [(0.0, 0.0), (5.0, 1.0), (10.0, 0.0), (15.0, 0.0), (25.0, 0.0), (30.0, 0.0)];
        for (t, v) in frames {
            seg.advance(t, &[v], &mut closed);
        }
        // energy drops at 10 but the segment only ends once it lasted 20 ms
        assert_eq!(closed, vec![Segment::between(5.0, 25.0)]);
        assert!(!seg.is_on());
    }

    #[test]
    fn test_max_duration_forces_boundaries() {
        let mut seg = detector(OnsetParams {
            threshold: 0.5,
            max_duration: 20.0,
            start_is_onset: true,
            ..OnsetParams::default()
        });
        let mut closed = Vec::new();
        for i in 0..10 {
            seg.advance(i as f64 * 5.0, &[0.0], &mut closed);
        }
        assert_eq!(closed, vec![Segment::between(0.0, 20.0), Segment::between(20.0, 40.0)]);
        assert_eq!(seg.next_boundary(), 60.0);
    }

    #[test]
    fn test_latency_compensates_filter_delay() {
        let mut seg = OnsetSegmenter::new(
            OnsetParams {
                threshold: 0.1,
                ..OnsetParams::default()
            },
            vec![0],
            5,
            10.0,
        );
        assert_eq!(seg.latency(), 20.0);

        let mut closed = Vec::new();
        for i in 0..20 {
            let t = i as f64 * 10.0;
            seg.advance(t, &[if t >= 100.0 { 1.0 } else { 0.0 }], &mut closed);
        }
        // fires at 100 with the smoothed step, reported 20 ms earlier
        assert!(seg.is_on());
        assert_eq!(seg.segment_start, 80.0);
    }

    #[test]
    fn test_finalize_drops_short_segment() {
        let mut seg = detector(OnsetParams {
            threshold: 0.5,
            min_duration: 100.0,
            ..OnsetParams::default()
        });
        let mut closed = Vec::new();
        seg.advance(0.0, &[0.0], &mut closed);
        seg.advance(5.0, &[1.0], &mut closed);
        seg.finalize(50.0, &mut closed);
        assert!(closed.is_empty());
    }

    #[test]
    fn test_odf_modes() {
        let cur = [2.0f32, 4.0];
        let reference = [1.0f32, 1.0];
        assert_eq!(OdfMode::Mean.compute(&cur, &reference), 2.0);
        assert_eq!(OdfMode::MeanSquare.compute(&cur, &reference), 5.0);
        assert_eq!(OdfMode::Rms.compute(&cur, &reference), 5.0f64.sqrt());
        assert_eq!(OdfMode::KullbackLeibler.compute(&cur, &cur), 0.0);
        assert!(OdfMode::KullbackLeibler.compute(&[1.0, 0.0], &[0.5, 0.5]) > 0.0);
        assert_eq!(OdfMode::KullbackLeibler.compute(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_reshape_keeps_state_when_unchanged() {
        let mut seg = detector(OnsetParams::default());
        assert!(!seg.reshape(vec![0], 1, 5.0));
        assert!(seg.reshape(vec![0, 1], 3, 5.0));
        assert_eq!(seg.latency(), 5.0);
    }
}
