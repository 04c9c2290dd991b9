// Error types for the streaming contract
//
// Every lifecycle operation returns `anyhow::Result`. Failures that belong to
// the contract itself are raised as `StreamError`, which carries a stable
// negative status code for hosts that speak the integer interface.

use std::fmt;

/// Contract-level failures with stable status codes
#[derive(Debug, Clone, PartialEq)]
pub enum StreamError {
    /// Operation called in a lifecycle state that does not allow it
    InvalidState { operation: String, state: String },

    /// Upstream shape the module cannot honour
    UnsupportedShape { module: String, reason: String },

    /// Frame row size does not match the negotiated frame size
    FrameSizeMismatch { expected: usize, got: usize },

    /// Attribute name not declared by the module
    UnknownAttribute { name: String },

    /// Value of the wrong type for the attribute
    AttributeType { name: String, expected: String },

    /// Value outside an enum's choices or otherwise unusable
    InvalidAttribute { name: String, reason: String },

    /// No module registered under that id
    UnknownModule { id: String },

    /// Malformed chain or module configuration
    Config { reason: String },
}

impl StreamError {
    /// Negative status code reported through the integer interface
    pub fn code(&self) -> i32 {
        match self {
            StreamError::InvalidState { .. } => -2,
            StreamError::UnsupportedShape { .. } => -3,
            StreamError::FrameSizeMismatch { .. } => -4,
            StreamError::UnknownAttribute { .. } => -5,
            StreamError::AttributeType { .. } => -6,
            StreamError::InvalidAttribute { .. } => -7,
            StreamError::UnknownModule { .. } => -8,
            StreamError::Config { .. } => -9,
        }
    }

    pub fn message(&self) -> String {
        match self {
            StreamError::InvalidState { operation, state } => {
                format!("{} is not allowed in state {}", operation, state)
            }
            StreamError::UnsupportedShape { module, reason } => {
                format!("{} cannot accept input: {}", module, reason)
            }
            StreamError::FrameSizeMismatch { expected, got } => {
                format!("frame size mismatch: expected {} values per frame, got {}", expected, got)
            }
            StreamError::UnknownAttribute { name } => format!("unknown attribute '{}'", name),
            StreamError::AttributeType { name, expected } => {
                format!("attribute '{}' expects a {} value", name, expected)
            }
            StreamError::InvalidAttribute { name, reason } => {
                format!("invalid value for attribute '{}': {}", name, reason)
            }
            StreamError::UnknownModule { id } => format!("unknown module type: {}", id),
            StreamError::Config { reason } => format!("invalid configuration: {}", reason),
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message(), self.code())
    }
}

impl std::error::Error for StreamError {}

/// Status code of an error: the `StreamError` code when there is one in the
/// chain of causes, `-1` for anything else.
pub fn status_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<StreamError>())
        .map(StreamError::code)
        .unwrap_or(-1)
}

/// Integer status of an operation result: 0 on success
pub fn to_status<T>(result: &anyhow::Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(e) => status_code(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_codes_are_negative() {
        let errors = [
            StreamError::InvalidState { operation: "process".into(), state: "Unconfigured".into() },
            StreamError::UnsupportedShape { module: "slice".into(), reason: "height".into() },
            StreamError::FrameSizeMismatch { expected: 2, got: 3 },
            StreamError::UnknownAttribute { name: "x".into() },
            StreamError::AttributeType { name: "x".into(), expected: "bool".into() },
            StreamError::InvalidAttribute { name: "x".into(), reason: "bad".into() },
            StreamError::UnknownModule { id: "x".into() },
            StreamError::Config { reason: "x".into() },
        ];
        for e in errors {
            assert!(e.code() < 0, "{}", e);
        }
    }

    #[test]
    fn test_status_code_through_context() {
        let result: anyhow::Result<()> = Err(StreamError::FrameSizeMismatch { expected: 4, got: 2 })
            .context("while processing");
        assert_eq!(to_status(&result), -4);

        let other: anyhow::Result<()> = Err(anyhow::anyhow!("plain failure"));
        assert_eq!(to_status(&other), -1);

        assert_eq!(to_status(&Ok::<_, anyhow::Error>(())), 0);
    }
}
