//! Claim coordinator: sequences connect, eligibility check, claim
//! submission and refresh for one user session, and keeps `UiState`
//! consistent with what the chain reports.

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, CoordinatorResult, IneligibleReason};
use crate::events::{CoordinatorEvent, EventPublisher, EventSubscriber};
use crate::state::{Message, MessageKind, UiState};
use faucet_common::utils::metrics::ClientMetrics;
use faucet_common::{Address, TxHash};
use faucet_gateway::{ChainGateway, ClaimEligibility, GatewayError, GatewayResult};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Resolves once the session is closed
async fn session_closed(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closed| *closed).await;
}

/// Clears `loading` if a claim future is dropped before it finishes
struct LoadingGuard {
    state: Arc<RwLock<UiState>>,
    armed: bool,
}

impl LoadingGuard {
    fn new(state: Arc<RwLock<UiState>>) -> Self {
        Self { state, armed: true }
    }

    async fn release(mut self) {
        self.state.write().await.loading = false;
        self.armed = false;
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut state) = self.state.try_write() {
            state.loading = false;
            return;
        }
        // Lock is busy; reset once it frees up
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let state = self.state.clone();
            handle.spawn(async move {
                state.write().await.loading = false;
            });
        }
    }
}

/// One user session against a chain gateway
pub struct ClaimCoordinator {
    gateway: Arc<dyn ChainGateway>,
    config: CoordinatorConfig,
    state: Arc<RwLock<UiState>>,
    events: EventPublisher,
    metrics: Option<Arc<ClientMetrics>>,
    shutdown: watch::Sender<bool>,
    message_timer: Mutex<Option<JoinHandle<()>>>,
    next_message_id: AtomicU64,
}

impl ClaimCoordinator {
    pub fn new(gateway: Arc<dyn ChainGateway>, config: CoordinatorConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            gateway,
            events: EventPublisher::new(config.event_capacity),
            config,
            state: Arc::new(RwLock::new(UiState::default())),
            metrics: None,
            shutdown,
            message_timer: Mutex::new(None),
            next_message_id: AtomicU64::new(0),
        }
    }

    /// Record claim and read outcomes into `metrics`
    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn snapshot(&self) -> UiState {
        self.state.read().await.clone()
    }

    pub fn subscribe(&self) -> EventSubscriber {
        self.events.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Authorize with the wallet and load the account's chain state.
    ///
    /// Safe to call again: re-authorizes and re-reads. On failure the
    /// session keeps its previous state and shows a connection message.
    pub async fn connect(&self) -> CoordinatorResult<Address> {
        self.ensure_open()?;

        let address = match self.cancellable(self.gateway.connect()).await {
            Ok(address) => address,
            Err(CoordinatorError::SessionClosed) => return Err(CoordinatorError::SessionClosed),
            Err(e) => {
                warn!("Wallet connection failed: {}", e);
                self.show_message(MessageKind::Error, e.to_string(), self.config.connection_message_ttl())
                    .await;
                return Err(e);
            }
        };

        {
            let mut state = self.state.write().await;
            if state.address != Some(address) {
                state.reset_chain_fields();
            }
            state.address = Some(address);
        }
        info!("Session connected: {}", address);
        self.publish_state().await;

        self.refresh_account(address, self.config.connection_message_ttl())
            .await?;
        Ok(address)
    }

    /// Re-read balance and eligibility for the connected account
    pub async fn refresh(&self) -> CoordinatorResult<UiState> {
        self.ensure_open()?;
        let address = self
            .state
            .read()
            .await
            .address
            .ok_or(CoordinatorError::NotConnected)?;
        self.refresh_account(address, self.config.message_ttl())
            .await?;
        Ok(self.snapshot().await)
    }

    /// Claim tokens for the connected account.
    ///
    /// Eligibility is re-read from the chain first; an ineligible account
    /// never reaches `submit_claim`. Resolves once the claim is mined and
    /// the state has been refreshed.
    pub async fn request_claim(&self) -> CoordinatorResult<TxHash> {
        self.ensure_open()?;

        // Test-and-set of `loading` under one lock
        let target = {
            let mut state = self.state.write().await;
            let current = state.address;
            match current {
                None => Err(CoordinatorError::NotConnected),
                Some(_) if state.loading => Err(CoordinatorError::ClaimInFlight),
                Some(address) => {
                    state.loading = true;
                    Ok(address)
                }
            }
        };

        let address = match target {
            Ok(address) => address,
            Err(CoordinatorError::ClaimInFlight) => {
                debug!("Claim rejected: another claim is in flight");
                self.record(|m| m.record_claim_rejected_locally());
                return Err(CoordinatorError::ClaimInFlight);
            }
            Err(e) => {
                self.record(|m| m.record_claim_rejected_locally());
                self.show_message(MessageKind::Error, e.to_string(), self.config.message_ttl())
                    .await;
                return Err(e);
            }
        };
        let guard = LoadingGuard::new(self.state.clone());
        self.publish_state().await;

        let outcome = self.run_claim(address).await;

        guard.release().await;

        match outcome {
            Ok(tx_hash) => {
                info!("Claim confirmed for {}: {}", address, tx_hash);
                self.events.publish(CoordinatorEvent::ClaimConfirmed { tx_hash });
                self.show_message(
                    MessageKind::Success,
                    format!("Tokens requested — tx: {}", tx_hash),
                    self.config.message_ttl(),
                )
                .await;
                // Post-claim state always comes from the chain
                if let Err(e) = self.refresh_account(address, self.config.message_ttl()).await {
                    warn!("Refresh after claim failed: {}", e);
                }
                Ok(tx_hash)
            }
            Err(CoordinatorError::SessionClosed) => {
                info!("Session closed while a claim was pending");
                Err(CoordinatorError::SessionClosed)
            }
            Err(e) => {
                warn!("Claim failed for {}: {}", address, e);
                self.events.publish(CoordinatorEvent::ClaimFailed {
                    reason: e.to_string(),
                });
                self.show_message(MessageKind::Error, e.to_string(), self.config.message_ttl())
                    .await;
                Err(e)
            }
        }
    }

    /// Cancel any pending confirmation wait and message timers
    pub fn shutdown(&self) {
        if !self.shutdown.send_replace(true) {
            info!("Shutting down claim session");
        }
        self.abort_message_timer();
    }

    async fn run_claim(&self, address: Address) -> CoordinatorResult<TxHash> {
        let eligibility = match self.cancellable(self.gateway.eligibility(address)).await {
            Ok(eligibility) => eligibility,
            Err(e) => {
                self.record_read_error(&e);
                return Err(e);
            }
        };
        self.apply_eligibility(address, &eligibility).await;

        if !eligibility.eligible {
            let reason = self.diagnose(address, &eligibility).await?;
            self.record(|m| m.record_claim_rejected_locally());
            return Err(CoordinatorError::Ineligible(reason));
        }

        self.record(|m| m.record_claim_submitted());
        self.events
            .publish(CoordinatorEvent::ClaimSubmitted { account: address });
        info!("Submitting claim for {}", address);
        let started = Instant::now();

        match self.cancellable(self.gateway.submit_claim()).await {
            Ok(tx_hash) => {
                self.record(|m| m.record_claim_confirmed(started.elapsed()));
                Ok(tx_hash)
            }
            Err(CoordinatorError::Gateway(GatewayError::Reverted { reason })) => {
                self.record(|m| m.record_claim_reverted(reason.label()));
                Err(GatewayError::Reverted { reason }.into())
            }
            Err(CoordinatorError::SessionClosed) => Err(CoordinatorError::SessionClosed),
            Err(e) => {
                self.record(|m| m.record_claim_failed());
                Err(e)
            }
        }
    }

    /// Explain an ineligible pre-check
    async fn diagnose(
        &self,
        address: Address,
        eligibility: &ClaimEligibility,
    ) -> CoordinatorResult<IneligibleReason> {
        if eligibility.remaining_allowance == 0 {
            return Ok(IneligibleReason::LifetimeLimitReached);
        }
        if self.cancellable(self.gateway.is_paused()).await? {
            return Ok(IneligibleReason::Paused);
        }

        let now = self.cancellable(self.gateway.chain_time()).await?;
        match eligibility.next_claim_at(self.config.cooldown_secs) {
            Some(next) if next > now => {
                debug!("{} in cooldown for another {}s", address, next - now);
                Ok(IneligibleReason::CooldownActive {
                    retry_in_secs: next - now,
                })
            }
            _ => {
                debug!("{} refused without a known cause", address);
                Ok(IneligibleReason::NotEligible)
            }
        }
    }

    async fn refresh_account(&self, address: Address, error_ttl: Duration) -> CoordinatorResult<()> {
        let reads = async {
            tokio::try_join!(
                self.gateway.token_balance(address),
                self.gateway.eligibility(address)
            )
        };

        match self.cancellable(reads).await {
            Ok((balance, eligibility)) => {
                self.record(|m| m.record_refresh(true));
                let changed = {
                    let mut state = self.state.write().await;
                    // A reconnect to another account may have raced this read
                    if state.address != Some(address) {
                        false
                    } else {
                        state.token_balance = balance;
                        state.eligible = eligibility.eligible;
                        state.remaining_allowance = eligibility.remaining_allowance;
                        state.last_claim_at = eligibility.last_claim_at;
                        true
                    }
                };
                if changed {
                    debug!("Refreshed {}: balance {}, eligible {}", address, balance, eligibility.eligible);
                    self.publish_state().await;
                }
                Ok(())
            }
            Err(CoordinatorError::SessionClosed) => Err(CoordinatorError::SessionClosed),
            Err(e) => {
                self.record_read_error(&e);
                warn!("Refresh failed for {}: {}", address, e);
                self.show_message(MessageKind::Error, e.to_string(), error_ttl).await;
                Err(e)
            }
        }
    }

    async fn apply_eligibility(&self, address: Address, eligibility: &ClaimEligibility) {
        {
            let mut state = self.state.write().await;
            if state.address != Some(address) {
                return;
            }
            state.eligible = eligibility.eligible;
            state.remaining_allowance = eligibility.remaining_allowance;
            state.last_claim_at = eligibility.last_claim_at;
        }
        self.publish_state().await;
    }

    /// Run a gateway call unless the session closes first
    async fn cancellable<T, F>(&self, call: F) -> CoordinatorResult<T>
    where
        F: Future<Output = GatewayResult<T>>,
    {
        tokio::select! {
            result = call => result.map_err(CoordinatorError::from),
            _ = session_closed(self.shutdown.subscribe()) => Err(CoordinatorError::SessionClosed),
        }
    }

    fn ensure_open(&self) -> CoordinatorResult<()> {
        if self.is_closed() {
            Err(CoordinatorError::SessionClosed)
        } else {
            Ok(())
        }
    }

    async fn publish_state(&self) {
        let snapshot = self.snapshot().await;
        self.events.publish(CoordinatorEvent::StateChanged(snapshot));
    }

    /// Show a message and arm its auto-clear timer
    async fn show_message(&self, kind: MessageKind, text: String, ttl: Duration) {
        if self.is_closed() {
            return;
        }
        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.write().await.message = Some(Message { id, kind, text });
        self.publish_state().await;

        let state = self.state.clone();
        let events = self.events.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let snapshot = {
                let mut state = state.write().await;
                if state.message.as_ref().map(|m| m.id) != Some(id) {
                    return;
                }
                state.message = None;
                state.clone()
            };
            events.publish(CoordinatorEvent::MessageCleared { id });
            events.publish(CoordinatorEvent::StateChanged(snapshot));
        });

        let mut slot = self
            .message_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.replace(timer) {
            previous.abort();
        }
    }

    fn abort_message_timer(&self) {
        let mut slot = self
            .message_timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(timer) = slot.take() {
            timer.abort();
        }
    }

    fn record<F: FnOnce(&ClientMetrics)>(&self, f: F) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }

    fn record_read_error(&self, err: &CoordinatorError) {
        if matches!(err, CoordinatorError::Gateway(e) if e.is_retryable()) {
            self.record(|m| m.record_refresh(false));
        }
    }
}

impl Drop for ClaimCoordinator {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
        self.abort_message_timer();
    }
}
