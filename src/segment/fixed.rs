use super::{Segment, Segmenter};

/// Boundary every `size` ms starting at `offset`. A size of 0 means a single
/// segment closed at the end of the stream.
#[derive(Debug, Clone)]
pub struct FixedChop {
    offset: f64,
    size: f64,
    segment_start: f64,
    next_boundary: f64,
}

impl FixedChop {
    pub fn new(offset: f64, size: f64) -> Self {
        let mut chop = Self {
            offset,
            size: size.max(0.0),
            segment_start: offset,
            next_boundary: f64::INFINITY,
        };
        chop.reset();
        chop
    }

    pub fn size(&self) -> f64 {
        self.size
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Change the chop size on a running stream. The boundary already
    /// scheduled stays in place; the new size applies from there on. A
    /// stream chopped at end only schedules its first boundary from the
    /// current segment start.
    pub fn set_size(&mut self, size: f64) {
        let size = size.max(0.0);
        if size == self.size {
            return;
        }
        self.size = size;
        if size == 0.0 {
            self.next_boundary = f64::INFINITY;
        } else if self.next_boundary.is_infinite() {
            self.next_boundary = self.segment_start + size;
        }
    }

    fn close_until(&mut self, time: f64, closed: &mut Vec<Segment>) {
        while time >= self.next_boundary {
            closed.push(Segment::between(self.segment_start, self.next_boundary));
            self.segment_start = self.next_boundary;
            let next = self.next_boundary + self.size;
            if next <= self.next_boundary {
                // size below the resolution of the boundary time
                self.next_boundary = f64::INFINITY;
                break;
            }
            self.next_boundary = next;
        }
    }
}

impl Segmenter for FixedChop {
    fn reset(&mut self) {
        self.segment_start = self.offset;
        self.next_boundary = if self.size > 0.0 {
            self.offset + self.size
        } else {
            f64::INFINITY
        };
    }

    fn advance(&mut self, time: f64, _frame: &[f32], closed: &mut Vec<Segment>) -> bool {
        if time < self.offset {
            return false;
        }
        self.close_until(time, closed);
        true
    }

    fn finalize(&mut self, input_end: f64, closed: &mut Vec<Segment>) {
        self.close_until(input_end, closed);
        if input_end > self.segment_start {
            closed.push(Segment::between(self.segment_start, input_end));
        }
        // nothing is pending any more
        self.segment_start = f64::INFINITY;
        self.next_boundary = f64::INFINITY;
    }

    fn next_boundary(&self) -> f64 {
        self.next_boundary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(chop: &mut FixedChop, times: impl Iterator<Item = f64>, end: f64) -> Vec<Segment> {
        let mut closed = Vec::new();
        for t in times {
            chop.advance(t, &[], &mut closed);
        }
        chop.finalize(end, &mut closed);
        closed
    }

    #[test]
    fn test_chop_242_over_one_second() {
        let mut chop = FixedChop::new(0.0, 242.0);
        let segments = run(&mut chop, (0..100).map(|i| i as f64 * 10.0), 1000.0);

        let starts: Vec<f64> = segments.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0.0, 242.0, 484.0, 726.0, 968.0]);
        assert_eq!(segments[4], Segment::between(968.0, 1000.0));
    }

    #[test]
    fn test_zero_size_chops_at_end_only() {
        let mut chop = FixedChop::new(0.0, 0.0);
        let segments = run(&mut chop, (0..10).map(|i| i as f64 * 100.0), 1000.0);
        assert_eq!(segments, vec![Segment::between(0.0, 1000.0)]);
    }

    #[test]
    fn test_frames_before_offset_are_outside() {
        let mut chop = FixedChop::new(50.0, 100.0);
        let mut closed = Vec::new();
        assert!(!chop.advance(10.0, &[], &mut closed));
        assert!(chop.advance(60.0, &[], &mut closed));
        assert_eq!(chop.next_boundary(), 150.0);
    }

    #[test]
    fn test_finalize_catches_up_with_pending_boundaries() {
        let mut chop = FixedChop::new(0.0, 100.0);
        let segments = run(&mut chop, [0.0, 10.0].into_iter(), 250.0);
        assert_eq!(
            segments,
            vec![
                Segment::between(0.0, 100.0),
                Segment::between(100.0, 200.0),
                Segment::between(200.0, 250.0),
            ]
        );
    }

    #[test]
    fn test_finalize_on_boundary_drops_empty_tail() {
        let mut chop = FixedChop::new(0.0, 100.0);
        let segments = run(&mut chop, [0.0, 50.0].into_iter(), 100.0);
        assert_eq!(segments, vec![Segment::between(0.0, 100.0)]);
    }

    #[test]
    fn test_size_change_applies_after_scheduled_boundary() {
        let mut chop = FixedChop::new(0.0, 100.0);
        let mut closed = Vec::new();
        chop.advance(10.0, &[], &mut closed);
        chop.set_size(50.0);
        assert_eq!(chop.next_boundary(), 100.0);

        chop.advance(160.0, &[], &mut closed);
        assert_eq!(closed, vec![Segment::between(0.0, 100.0), Segment::between(100.0, 150.0)]);
        assert_eq!(chop.next_boundary(), 200.0);
    }

    #[test]
    fn test_unresolvable_size_stops_chopping() {
        let mut chop = FixedChop::new(1e12, 1e-6);
        let mut closed = Vec::new();
        chop.advance(2e12, &[], &mut closed);

        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].start, 1e12);
        assert!(chop.next_boundary().is_infinite());
    }

    #[test]
    fn test_boundaries_only_move_forward() {
        let mut chop = FixedChop::new(0.0, 30.0);
        let mut closed = Vec::new();
        let mut last = chop.next_boundary();
        for i in 0..50 {
            chop.advance(i as f64 * 7.0, &[], &mut closed);
            assert!(chop.next_boundary() >= last);
            last = chop.next_boundary();
        }
    }
}
