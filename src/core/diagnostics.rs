use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use super::StreamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Parameter was corrected, the stream continues
    Warning,
    /// Current operation aborted
    Error,
}

/// One message on the diagnostics channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub module: String,
    pub message: String,
}

/// Messages held for the host before new ones are dropped
pub const DIAGNOSTICS_CAPACITY: usize = 256;

/// Handle a module uses to report warnings and errors to its host.
///
/// Messages always go to the `log` facade. When the handle is connected
/// (see [`Diagnostics::channel`]) they are also published on a bounded
/// crossbeam channel. A host that stops draining loses the newest messages,
/// never blocks the stream.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    module: String,
    tx: Option<Sender<Diagnostic>>,
}

impl Diagnostics {
    /// Connected handle plus the receiving end for the host
    pub fn channel() -> (Self, Receiver<Diagnostic>) {
        Self::with_capacity(DIAGNOSTICS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, Receiver<Diagnostic>) {
        let (tx, rx) = bounded(capacity.max(1));
        (
            Self {
                module: String::new(),
                tx: Some(tx),
            },
            rx,
        )
    }

    /// Same channel, tagged with a module name
    pub fn for_module(&self, module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            tx: self.tx.clone(),
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn warning(&self, message: impl Into<String>) {
        let message = message.into();
        warn!("[{}] {}", self.module, message);
        self.publish(Severity::Warning, message);
    }

    /// Report a fatal error and hand it back for propagation with `?`
    pub fn error(&self, err: StreamError) -> anyhow::Error {
        error!("[{}] {}", self.module, err);
        self.publish(Severity::Error, err.message());
        err.into()
    }

    fn publish(&self, severity: Severity, message: String) {
        if let Some(tx) = &self.tx {
            let diagnostic = Diagnostic {
                severity,
                module: self.module.clone(),
                message,
            };
            match tx.try_send(diagnostic) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                Err(TrySendError::Full(dropped)) => {
                    debug!("[{}] diagnostics channel full, dropped: {}", self.module, dropped.message);
                }
            }
        }
    }
}
