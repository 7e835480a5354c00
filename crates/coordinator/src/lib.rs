//! Claim coordinator for the token faucet client.
//!
//! A [`ClaimCoordinator`] owns one user session: it drives the gateway
//! through connect, eligibility re-check, claim submission and refresh, and
//! exposes the resulting [`UiState`] by snapshot and by event stream.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod state;

pub use config::CoordinatorConfig;
pub use coordinator::ClaimCoordinator;
pub use error::{format_wait, CoordinatorError, CoordinatorResult, IneligibleReason};
pub use events::{CoordinatorEvent, EventPublisher, EventSubscriber};
pub use state::{Message, MessageKind, SessionPhase, UiState};
