use serde::{Deserialize, Serialize};

/// Lifecycle of a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ChainState {
    /// No successful negotiation yet
    #[default]
    Unconfigured,
    /// Negotiated, no frames since the last negotiation or reset
    Configured,
    Streaming,
    /// End of input delivered
    Finalized,
    /// A call failed; the chain must be negotiated again, or reset if
    /// an output shape is still known
    Error { message: String },
}

impl ChainState {
    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: &ChainState) -> bool {
        use ChainState::*;

        matches!(
            (self, target),
            // Any state may fail
            (_, Error { .. }) |

            // Negotiation is always allowed
            (_, Configured) |

            // Frames
            (Configured, Streaming) |
            (Streaming, Streaming) |

            // End of input
            (Configured, Finalized) |
            (Streaming, Finalized)
        )
    }

    /// Frames may be pushed in this state
    pub fn accepts_frames(&self) -> bool {
        matches!(self, ChainState::Configured | ChainState::Streaming)
    }

    /// Get human-readable state name
    pub fn name(&self) -> &str {
        match self {
            Self::Unconfigured => "Unconfigured",
            Self::Configured => "Configured",
            Self::Streaming => "Streaming",
            Self::Finalized => "Finalized",
            Self::Error { .. } => "Error",
        }
    }
}
