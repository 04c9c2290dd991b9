pub mod aggregator;

pub use aggregator::{ColumnStats, Stat, StatFlags, TempMod};
