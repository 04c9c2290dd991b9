pub mod signal;

pub use signal::{Burst, SignalSource};
