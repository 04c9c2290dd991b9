pub mod buffers;
pub mod core;
pub mod engine;
pub mod modules;
pub mod observability;
pub mod registry;
pub mod segment;
pub mod sources;
pub mod temporal;

pub use crate::core::{AttrValue, Frame, FrameBatch, Module, OwnedBatch, Receiver, StreamDescriptor, StreamError};
pub use crate::engine::{Chain, ChainState, StreamRunner};
