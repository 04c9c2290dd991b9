// Running per-column statistics over the frames of one segment
//
// Each column keeps min, max, sum, sum of squares and a count, so input is
// O(1) per value regardless of segment length. Reading with reset zeroes the
// accumulators in the same call: a frame can never be counted in two
// consecutive segments.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stat {
    Min,
    Max,
    Mean,
    StdDev,
}

impl Stat {
    /// Output order
    pub const ALL: [Stat; 4] = [Stat::Min, Stat::Max, Stat::Mean, Stat::StdDev];

    /// Suffix appended to column labels
    pub fn suffix(self) -> &'static str {
        match self {
            Stat::Min => "Min",
            Stat::Max => "Max",
            Stat::Mean => "Mean",
            Stat::StdDev => "StdDev",
        }
    }
}

/// Which statistics are reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatFlags {
    pub min: bool,
    pub max: bool,
    pub mean: bool,
    pub stddev: bool,
}

impl StatFlags {
    pub fn all() -> Self {
        Self {
            min: true,
            max: true,
            mean: true,
            stddev: true,
        }
    }

    pub fn is_enabled(&self, stat: Stat) -> bool {
        match stat {
            Stat::Min => self.min,
            Stat::Max => self.max,
            Stat::Mean => self.mean,
            Stat::StdDev => self.stddev,
        }
    }

    /// Enabled statistics in output order
    pub fn enabled(self) -> impl Iterator<Item = Stat> {
        Stat::ALL.into_iter().filter(move |s| self.is_enabled(*s))
    }

    pub fn count(&self) -> usize {
        self.enabled().count()
    }
}

/// Accumulators of one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    min: f64,
    max: f64,
    sum: f64,
    sum_sq: f64,
    count: u64,
}

impl Default for ColumnStats {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum: 0.0,
            sum_sq: 0.0,
            count: 0,
        }
    }
}

impl ColumnStats {
    pub fn input(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += value;
        self.sum_sq += value * value;
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// None when nothing was accumulated
    pub fn value(&self, stat: Stat) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        Some(match stat {
            Stat::Min => self.min,
            Stat::Max => self.max,
            Stat::Mean => mean,
            // cancellation can leave a tiny negative variance
            Stat::StdDev => (self.sum_sq / n - mean * mean).max(0.0).sqrt(),
        })
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Temporal aggregator over all columns of a stream
#[derive(Debug, Clone, Default)]
pub struct TempMod {
    flags: StatFlags,
    columns: Vec<ColumnStats>,
}

impl TempMod {
    pub fn new(flags: StatFlags, width: usize) -> Self {
        Self {
            flags,
            columns: vec![ColumnStats::default(); width],
        }
    }

    pub fn flags(&self) -> StatFlags {
        self.flags
    }

    /// Reconfigure; returns true if the column storage was reallocated
    pub fn configure(&mut self, flags: StatFlags, width: usize) -> bool {
        self.flags = flags;
        if self.columns.len() == width {
            return false;
        }
        self.columns = vec![ColumnStats::default(); width];
        true
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Values produced per read
    pub fn num_values(&self) -> usize {
        self.columns.len() * self.flags.count()
    }

    /// Frames accumulated since the last reset
    pub fn count(&self) -> u64 {
        self.columns.first().map(ColumnStats::count).unwrap_or(0)
    }

    /// Accumulate one frame. Extra values beyond the configured width are
    /// ignored.
    pub fn input(&mut self, values: &[f32]) {
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.input(*value as f64);
        }
    }

    /// Write up to `out.len()` values, per column in the order min, max,
    /// mean, stddev (enabled ones only). Writes nothing when no frame was
    /// accumulated. With `reset`, accumulators are zeroed in the same call.
    pub fn get_values(&mut self, out: &mut [f32], reset: bool) -> usize {
        let mut written = 0;
        if self.count() > 0 {
            'columns: for column in &self.columns {
                for stat in self.flags.enabled() {
                    if written == out.len() {
                        break 'columns;
                    }
                    out[written] = column.value(stat).unwrap_or(0.0) as f32;
                    written += 1;
                }
            }
        }
        if reset {
            self.reset();
        }
        written
    }

    pub fn reset(&mut self) {
        for column in &mut self.columns {
            column.reset();
        }
    }

    /// Output column names: upstream label + statistic suffix, or the bare
    /// suffix for unlabeled columns
    pub fn labels(&self, input_labels: &[String]) -> Vec<String> {
        let mut labels = Vec::with_capacity(self.num_values());
        for i in 0..self.columns.len() {
            let base = input_labels.get(i).map(String::as_str).unwrap_or("");
            for stat in self.flags.enabled() {
                labels.push(format!("{}{}", base, stat.suffix()));
            }
        }
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mean_std() -> StatFlags {
        StatFlags {
            mean: true,
            stddev: true,
            ..StatFlags::default()
        }
    }

    #[test]
    fn test_mean_and_stddev() {
        let mut agg = TempMod::new(mean_std(), 1);
        for v in [1.0, 2.0, 3.0, 4.0] {
            agg.input(&[v]);
        }

        let mut out = [0.0f32; 2];
        assert_eq!(agg.get_values(&mut out, true), 2);
        assert!((out[0] - 2.5).abs() < 1e-6);
        assert!((out[1] - 1.25f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_empty_aggregator_reports_nothing() {
        let mut agg = TempMod::new(StatFlags::all(), 3);
        let mut out = [7.0f32; 12];
        assert_eq!(agg.get_values(&mut out, false), 0);
        assert_eq!(out, [7.0; 12]);
    }

    #[test]
    fn test_read_with_reset_starts_a_new_window() {
        let mut agg = TempMod::new(StatFlags::all(), 1);
        agg.input(&[10.0]);
        let mut out = [0.0f32; 4];
        agg.get_values(&mut out, true);
        assert_eq!(agg.count(), 0);

        agg.input(&[2.0]);
        agg.get_values(&mut out, false);
        assert_eq!(out, [2.0, 2.0, 2.0, 0.0]);
        assert_eq!(agg.count(), 1);
    }

    #[test]
    fn test_limit_truncates_output() {
        let mut agg = TempMod::new(StatFlags::all(), 2);
        agg.input(&[1.0, 5.0]);
        let mut out = [0.0f32; 3];
        assert_eq!(agg.get_values(&mut out, false), 3);
        assert_eq!(out, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_constant_input_has_zero_stddev() {
        let mut agg = TempMod::new(mean_std(), 1);
        for _ in 0..1000 {
            agg.input(&[0.1]);
        }
        let mut out = [0.0f32; 2];
        agg.get_values(&mut out, false);
        assert!(out[1] >= 0.0);
        assert!(out[1] < 1e-3);
    }

    #[test]
    fn test_labels() {
        let agg = TempMod::new(
            StatFlags {
                min: true,
                mean: true,
                ..StatFlags::default()
            },
            2,
        );
        let labels = agg.labels(&["Loudness".to_string()]);
        assert_eq!(labels, vec!["LoudnessMin", "LoudnessMean", "Min", "Mean"]);
    }

    #[test]
    fn test_labels_use_full_statistic_names() {
        let agg = TempMod::new(StatFlags::all(), 1);
        let labels = agg.labels(&["Pitch".to_string()]);
        assert_eq!(labels, vec!["PitchMin", "PitchMax", "PitchMean", "PitchStdDev"]);
    }
}
