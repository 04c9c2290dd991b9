pub mod chain;
pub mod runner;
pub mod state;

pub use chain::Chain;
pub use runner::{drive, Command, FrameSource, StreamRunner};
pub use state::ChainState;
