//! Session events for front ends

use crate::state::UiState;
use faucet_common::{Address, TxHash};
use tokio::sync::broadcast;
use tracing::trace;

/// Event types published by a coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    /// UI state changed; carries the new snapshot
    StateChanged(UiState),
    /// Claim passed the pre-check and was handed to the gateway
    ClaimSubmitted { account: Address },
    /// Claim mined successfully
    ClaimConfirmed { tx_hash: TxHash },
    /// Claim refused or reverted
    ClaimFailed { reason: String },
    /// A transient message expired
    MessageCleared { id: u64 },
}

/// Event subscriber handle
pub struct EventSubscriber {
    receiver: broadcast::Receiver<CoordinatorEvent>,
}

impl EventSubscriber {
    /// Receive next event; `None` once the coordinator is gone.
    ///
    /// A subscriber that falls behind skips the events it missed.
    pub async fn recv(&mut self) -> Option<CoordinatorEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive
    pub fn try_recv(&mut self) -> Option<CoordinatorEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

/// Event publisher
#[derive(Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<CoordinatorEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn publish(&self, event: CoordinatorEvent) {
        if self.sender.send(event).is_err() {
            trace!("No event subscribers");
        }
    }
}
