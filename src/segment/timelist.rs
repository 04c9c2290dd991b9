use super::{Segment, Segmenter};

/// Clean a user supplied list of segment start times and durations.
///
/// Start times that do not advance past the previously kept one are
/// dropped together with their duration. A missing (or non-positive)
/// duration is filled with the gap to the next kept start, a given one is
/// clipped so it never overlaps the next segment, and the last segment
/// without a duration extends to `+inf`.
pub fn clean_time_list(times: &[f64], durations: &[f64]) -> Vec<Segment> {
    let mut kept: Vec<(f64, Option<f64>)> = Vec::with_capacity(times.len());
    for (i, &start) in times.iter().enumerate() {
        if !start.is_finite() {
            continue;
        }
        if let Some((last, _)) = kept.last() {
            if start <= *last {
                continue;
            }
        }
        let duration = durations.get(i).copied().filter(|d| *d > 0.0);
        kept.push((start, duration));
    }

    let mut segments = Vec::with_capacity(kept.len());
    for (i, &(start, duration)) in kept.iter().enumerate() {
        let gap = kept.get(i + 1).map(|(next, _)| next - start).unwrap_or(f64::INFINITY);
        let duration = duration.map_or(gap, |d| d.min(gap));
        segments.push(Segment::new(start, duration));
    }
    segments
}

/// Segments at explicit times, shifted by `offset`. Frames between two
/// listed segments are outside any segment.
#[derive(Debug, Clone)]
pub struct TimeList {
    segments: Vec<Segment>,
    /// Index of the first segment not yet closed
    current: usize,
}

impl TimeList {
    pub fn new(times: &[f64], durations: &[f64], offset: f64) -> Self {
        let segments = clean_time_list(times, durations)
            .into_iter()
            .map(|s| Segment::new(s.start + offset, s.duration))
            .collect();
        Self { segments, current: 0 }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl Segmenter for TimeList {
    fn reset(&mut self) {
        self.current = 0;
    }

    fn advance(&mut self, time: f64, _frame: &[f32], closed: &mut Vec<Segment>) -> bool {
        while let Some(segment) = self.segments.get(self.current) {
            if time < segment.start {
                return false;
            }
            if time < segment.end() {
                return true;
            }
            closed.push(*segment);
            self.current += 1;
        }
        false
    }

    fn finalize(&mut self, input_end: f64, closed: &mut Vec<Segment>) {
        while let Some(segment) = self.segments.get(self.current) {
            if segment.end() <= input_end {
                closed.push(*segment);
            } else if segment.start < input_end {
                closed.push(Segment::between(segment.start, input_end));
            }
            // segments starting after the end of input are dropped
            if segment.start >= input_end {
                break;
            }
            self.current += 1;
        }
        self.current = self.segments.len();
    }

    fn next_boundary(&self) -> f64 {
        self.segments
            .get(self.current)
            .map(Segment::end)
            .unwrap_or(f64::INFINITY)
    }
}
