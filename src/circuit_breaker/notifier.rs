use super::types::CircuitState;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Delivers state transitions to an optional observer.
///
/// Sends never block and never fail the breaker: when the receiver is full
/// the notification is dropped and logged, when it has gone away the
/// notification is discarded. Keeping up is the receiver's job.
#[derive(Debug, Clone, Default)]
pub struct StateChangeNotifier {
    sender: Option<mpsc::Sender<CircuitState>>,
}

impl StateChangeNotifier {
    pub fn new(sender: mpsc::Sender<CircuitState>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    /// A notifier with nobody listening
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Create a notifier together with the receiving end of its channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<CircuitState>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Push `state` to the observer, if any
    pub fn notify(&self, breaker: &str, state: CircuitState) {
        let Some(sender) = &self.sender else {
            return;
        };

        match sender.try_send(state) {
            Ok(()) => {}
            Err(TrySendError::Full(state)) => {
                warn!(
                    breaker = %breaker,
                    state = %state,
                    "State change receiver is full, dropping notification"
                );
            }
            Err(TrySendError::Closed(state)) => {
                debug!(
                    breaker = %breaker,
                    state = %state,
                    "State change receiver closed, discarding notification"
                );
            }
        }
    }
}
