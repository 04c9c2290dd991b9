pub mod attribute;
pub mod descriptor;
pub mod diagnostics;
pub mod error;
pub mod frame;
pub mod module;

pub use attribute::{AttrValue, Attribute, AttributeSchema, AttributeSet};
pub use descriptor::{frame_period, StreamDescriptor};
pub use diagnostics::{Diagnostic, Diagnostics, Severity, DIAGNOSTICS_CAPACITY};
pub use error::{status_code, to_status, StreamError};
pub use frame::{Frame, FrameBatch, OwnedBatch};
pub use module::{Module, Receiver};
