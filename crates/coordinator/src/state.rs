//! Session state as a front end renders it

use faucet_common::{Address, Amount};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Success,
    Error,
}

/// Transient banner message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    /// Generation counter; a clear timer only removes the message it was armed for
    pub id: u64,
    pub kind: MessageKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    Disconnected,
    Connected,
    Claiming,
}

/// Everything the UI shows.
///
/// Balance and eligibility fields only change from completed chain reads;
/// `loading` and `message` are the only optimistic fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct UiState {
    pub address: Option<Address>,
    pub token_balance: Amount,
    pub eligible: bool,
    pub remaining_allowance: Amount,
    pub last_claim_at: u64,
    pub loading: bool,
    pub message: Option<Message>,
}

impl UiState {
    pub fn phase(&self) -> SessionPhase {
        match (self.address, self.loading) {
            (None, _) => SessionPhase::Disconnected,
            (Some(_), true) => SessionPhase::Claiming,
            (Some(_), false) => SessionPhase::Connected,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.address.is_some()
    }

    /// Whether the claim action should be offered
    pub fn can_request(&self) -> bool {
        self.is_connected() && self.eligible && !self.loading
    }

    /// Drop everything read for a previous account
    pub(crate) fn reset_chain_fields(&mut self) {
        self.token_balance = 0;
        self.eligible = false;
        self.remaining_allowance = 0;
        self.last_claim_at = 0;
    }
}
