//! Claim sessions against the simulated chain

use faucet_common::utils::logging::init_test_logging;
use faucet_common::utils::metrics::ClientMetrics;
use faucet_common::Address;
use faucet_coordinator::{
    ClaimCoordinator, CoordinatorConfig, CoordinatorError, CoordinatorEvent, IneligibleReason,
    MessageKind, SessionPhase, UiState,
};
use faucet_gateway::sim::{CLAIM_AMOUNT, COOLDOWN_SECS, LIFETIME_LIMIT, MAX_SUPPLY};
use faucet_gateway::{ChainGateway, GatewayError, RevertReason, SimulatedGateway};
use std::sync::Arc;
use std::time::Duration;

fn owner() -> Address {
    Address([0x0a; 20])
}

fn user() -> Address {
    Address([0x0b; 20])
}

fn session(gateway: SimulatedGateway) -> (Arc<SimulatedGateway>, ClaimCoordinator) {
    init_test_logging();
    let gateway = Arc::new(gateway);
    let chain: Arc<dyn ChainGateway> = gateway.clone();
    (gateway, ClaimCoordinator::new(chain, CoordinatorConfig::default()))
}

fn user_session() -> (Arc<SimulatedGateway>, ClaimCoordinator) {
    session(SimulatedGateway::new(owner(), vec![user()]))
}

fn message_text(state: &UiState) -> Option<&str> {
    state.message.as_ref().map(|m| m.text.as_str())
}

/// Chain fields only, without the transient message
fn chain_view(state: &UiState) -> UiState {
    UiState {
        message: None,
        ..state.clone()
    }
}

#[tokio::test(start_paused = true)]
async fn test_no_wallet_keeps_session_disconnected() {
    let (gateway, coordinator) = user_session();
    gateway.set_wallet_present(false);

    let err = coordinator.connect().await.unwrap_err();
    assert_eq!(err, CoordinatorError::Gateway(GatewayError::NoWallet));

    let state = coordinator.snapshot().await;
    assert_eq!(state.phase(), SessionPhase::Disconnected);
    assert_eq!(message_text(&state), Some("No injected wallet found"));

    // Connection errors stay up for 6 s
    tokio::time::sleep(Duration::from_millis(5_900)).await;
    assert!(coordinator.snapshot().await.message.is_some());
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(coordinator.snapshot().await.message.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_connect_loads_chain_state() {
    let (_gateway, coordinator) = user_session();

    assert_eq!(coordinator.connect().await, Ok(user()));
    let state = coordinator.snapshot().await;
    assert_eq!(state.phase(), SessionPhase::Connected);
    assert_eq!(state.token_balance, 0);
    assert!(state.eligible);
    assert_eq!(state.remaining_allowance, LIFETIME_LIMIT);
    assert!(state.can_request());
    assert!(state.message.is_none());

    // Reconnecting re-authorizes and re-reads
    assert_eq!(coordinator.connect().await, Ok(user()));
    assert_eq!(coordinator.snapshot().await, state);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_is_idempotent() {
    let (_gateway, coordinator) = user_session();
    coordinator.connect().await.unwrap();
    coordinator.request_claim().await.unwrap();

    let first = coordinator.refresh().await.unwrap();
    let second = coordinator.refresh().await.unwrap();
    assert_eq!(chain_view(&first), chain_view(&second));
}

#[tokio::test(start_paused = true)]
async fn test_refresh_requires_connection() {
    let (_gateway, coordinator) = user_session();
    assert_eq!(coordinator.refresh().await, Err(CoordinatorError::NotConnected));
}

#[tokio::test(start_paused = true)]
async fn test_claim_updates_state_from_chain() {
    let (gateway, coordinator) = user_session();
    coordinator.connect().await.unwrap();

    let tx_hash = coordinator.request_claim().await.unwrap();

    let state = coordinator.snapshot().await;
    assert_eq!(state.phase(), SessionPhase::Connected);
    assert_eq!(state.token_balance, CLAIM_AMOUNT);
    assert!(!state.eligible);
    assert!(!state.can_request());
    assert_eq!(state.remaining_allowance, LIFETIME_LIMIT - CLAIM_AMOUNT);
    assert_eq!(state.last_claim_at, gateway.chain_time().await.unwrap());

    let message = state.message.unwrap();
    assert_eq!(message.kind, MessageKind::Success);
    assert_eq!(message.text, format!("Tokens requested — tx: {}", tx_hash));

    tokio::time::sleep(Duration::from_millis(4_001)).await;
    assert!(coordinator.snapshot().await.message.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_claim_requires_connection() {
    let (gateway, coordinator) = user_session();

    assert_eq!(coordinator.request_claim().await, Err(CoordinatorError::NotConnected));
    assert_eq!(gateway.read_count(), 0);
    assert_eq!(gateway.submission_count(), 0);

    let state = coordinator.snapshot().await;
    assert_eq!(message_text(&state), Some("Connect your wallet first"));
    assert!(!state.loading);

    tokio::time::sleep(Duration::from_millis(4_001)).await;
    assert!(coordinator.snapshot().await.message.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_claim_rejected_without_chain_call() {
    let (gateway, coordinator) = session(
        SimulatedGateway::new(owner(), vec![user()])
            .with_confirmation_delay(Duration::from_secs(12)),
    );
    let coordinator = Arc::new(coordinator);
    coordinator.connect().await.unwrap();

    let first = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.request_claim().await }
    });
    while gateway.submission_count() == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(coordinator.snapshot().await.phase(), SessionPhase::Claiming);

    let reads = gateway.read_count();
    assert_eq!(coordinator.request_claim().await, Err(CoordinatorError::ClaimInFlight));
    assert_eq!(gateway.read_count(), reads);
    assert_eq!(gateway.submission_count(), 1);

    assert!(first.await.unwrap().is_ok());
    let state = coordinator.snapshot().await;
    assert!(!state.loading);
    assert_eq!(state.token_balance, CLAIM_AMOUNT);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_claim_releases_session() {
    let (gateway, coordinator) = session(
        SimulatedGateway::new(owner(), vec![user()])
            .with_confirmation_delay(Duration::from_secs(60)),
    );
    coordinator.connect().await.unwrap();

    let abandoned = tokio::time::timeout(Duration::from_secs(5), coordinator.request_claim()).await;
    assert!(abandoned.is_err());
    assert_eq!(gateway.submission_count(), 1);

    tokio::task::yield_now().await;
    let state = coordinator.snapshot().await;
    assert!(!state.loading);
    assert_eq!(state.phase(), SessionPhase::Connected);

    // The abandoned transaction was never mined
    assert!(coordinator.request_claim().await.is_ok());
    assert_eq!(gateway.submission_count(), 2);
    assert_eq!(coordinator.snapshot().await.token_balance, CLAIM_AMOUNT);
}

#[tokio::test(start_paused = true)]
async fn test_unexplained_refusal_is_not_reported_as_cooldown() {
    let (gateway, coordinator) = user_session();
    {
        let chain = gateway.chain();
        let mut chain = chain.lock().await;
        let claims_per_account = LIFETIME_LIMIT / CLAIM_AMOUNT;
        let accounts = MAX_SUPPLY / LIFETIME_LIMIT;
        for _ in 0..claims_per_account {
            for i in 0..accounts {
                let mut bytes = [0xc0; 20];
                bytes[..8].copy_from_slice(&(i as u64).to_be_bytes());
                chain.request_tokens(&Address(bytes)).1.unwrap();
            }
            chain.advance_time(COOLDOWN_SECS);
        }
        assert_eq!(chain.total_supply(), MAX_SUPPLY);
    }
    coordinator.connect().await.unwrap();

    let state = coordinator.snapshot().await;
    assert!(!state.eligible);
    assert_eq!(state.remaining_allowance, LIFETIME_LIMIT);
    assert_eq!(state.last_claim_at, 0);

    assert_eq!(
        coordinator.request_claim().await,
        Err(CoordinatorError::Ineligible(IneligibleReason::NotEligible))
    );
    assert_eq!(gateway.submission_count(), 0);
    assert_eq!(
        message_text(&coordinator.snapshot().await),
        Some("Cannot claim: this account is not eligible right now")
    );
}

#[tokio::test(start_paused = true)]
async fn test_second_claim_within_cooldown_is_not_submitted() {
    let (gateway, coordinator) = user_session();
    coordinator.connect().await.unwrap();
    coordinator.request_claim().await.unwrap();

    let err = coordinator.request_claim().await.unwrap_err();
    assert_eq!(
        err,
        CoordinatorError::Ineligible(IneligibleReason::CooldownActive {
            retry_in_secs: COOLDOWN_SECS
        })
    );
    assert_eq!(gateway.submission_count(), 1);

    let state = coordinator.snapshot().await;
    assert!(!state.loading);
    assert_eq!(
        message_text(&state),
        Some("Cannot claim yet: cooldown active, try again in 24h 0m")
    );

    gateway.advance_time(COOLDOWN_SECS).await;
    coordinator.request_claim().await.unwrap();
    assert_eq!(coordinator.snapshot().await.token_balance, 2 * CLAIM_AMOUNT);
}

#[tokio::test(start_paused = true)]
async fn test_revert_after_passing_precheck() {
    // Another session of the same account claims while ours is pending
    let (gateway, coordinator) = session(
        SimulatedGateway::new(owner(), vec![user()])
            .with_confirmation_delay(Duration::from_secs(12)),
    );
    let other = SimulatedGateway::with_chain(gateway.chain(), vec![user()]);
    let coordinator = Arc::new(coordinator);
    coordinator.connect().await.unwrap();

    let pending = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.request_claim().await }
    });
    while gateway.submission_count() == 0 {
        tokio::task::yield_now().await;
    }
    other.submit_claim().await.unwrap();

    let err = pending.await.unwrap().unwrap_err();
    assert_eq!(
        err,
        CoordinatorError::Gateway(GatewayError::Reverted {
            reason: RevertReason::CooldownActive
        })
    );

    let state = coordinator.snapshot().await;
    assert!(!state.loading);
    assert_eq!(message_text(&state), Some("Transaction reverted: Faucet: cooldown active"));
    // No refresh after a failure: balance is still the pre-claim read
    assert_eq!(state.token_balance, 0);
}

#[tokio::test(start_paused = true)]
async fn test_lifetime_limit_after_ten_claims() {
    let (gateway, coordinator) = user_session();
    coordinator.connect().await.unwrap();

    for _ in 0..10 {
        coordinator.request_claim().await.unwrap();
        gateway.advance_time(COOLDOWN_SECS).await;
    }

    let err = coordinator.request_claim().await.unwrap_err();
    assert_eq!(err, CoordinatorError::Ineligible(IneligibleReason::LifetimeLimitReached));
    assert_eq!(gateway.submission_count(), 10);

    let state = coordinator.snapshot().await;
    assert_eq!(state.token_balance, LIFETIME_LIMIT);
    assert_eq!(state.remaining_allowance, 0);
    assert!(!state.eligible);
}

#[tokio::test(start_paused = true)]
async fn test_paused_faucet() {
    let (gateway, coordinator) = user_session();
    let admin = SimulatedGateway::with_chain(gateway.chain(), vec![owner()]);
    coordinator.connect().await.unwrap();

    admin.set_paused(true).await.unwrap();
    assert_eq!(
        coordinator.request_claim().await,
        Err(CoordinatorError::Ineligible(IneligibleReason::Paused))
    );
    assert_eq!(gateway.submission_count(), 0);

    admin.set_paused(false).await.unwrap();
    assert!(coordinator.request_claim().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_read_failure_leaves_state_untouched() {
    let (gateway, coordinator) = user_session();
    coordinator.connect().await.unwrap();
    let before = coordinator.snapshot().await;

    gateway.set_network_available(false);
    let err = coordinator.refresh().await.unwrap_err();
    assert!(matches!(err, CoordinatorError::Gateway(GatewayError::Read(_))));

    let err = coordinator.request_claim().await.unwrap_err();
    assert!(matches!(err, CoordinatorError::Gateway(GatewayError::Read(_))));

    let after = coordinator.snapshot().await;
    assert_eq!(chain_view(&after), chain_view(&before));
    assert_eq!(after.phase(), SessionPhase::Connected);
    assert_eq!(after.message.map(|m| m.kind), Some(MessageKind::Error));
}

#[tokio::test(start_paused = true)]
async fn test_older_timer_does_not_clear_newer_message() {
    let (gateway, coordinator) = user_session();

    // 4 s message at t=0
    coordinator.request_claim().await.unwrap_err();
    tokio::time::sleep(Duration::from_secs(3)).await;

    // 6 s message at t=3
    gateway.set_wallet_present(false);
    coordinator.connect().await.unwrap_err();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(
        message_text(&coordinator.snapshot().await),
        Some("No injected wallet found")
    );

    tokio::time::sleep(Duration::from_millis(4_100)).await;
    assert!(coordinator.snapshot().await.message.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_confirmation() {
    let (gateway, coordinator) = session(
        SimulatedGateway::new(owner(), vec![user()])
            .with_confirmation_delay(Duration::from_secs(60)),
    );
    let coordinator = Arc::new(coordinator);
    coordinator.connect().await.unwrap();

    let pending = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.request_claim().await }
    });
    while gateway.submission_count() == 0 {
        tokio::task::yield_now().await;
    }

    coordinator.shutdown();
    assert_eq!(pending.await.unwrap(), Err(CoordinatorError::SessionClosed));
    assert!(!coordinator.snapshot().await.loading);
    assert_eq!(gateway.token_balance(user()).await, Ok(0));

    assert_eq!(coordinator.connect().await, Err(CoordinatorError::SessionClosed));
    assert_eq!(coordinator.request_claim().await, Err(CoordinatorError::SessionClosed));
}

#[tokio::test(start_paused = true)]
async fn test_events_follow_the_claim() {
    let (_gateway, coordinator) = user_session();
    coordinator.connect().await.unwrap();
    let mut events = coordinator.subscribe();

    let tx_hash = coordinator.request_claim().await.unwrap();

    let mut seen = Vec::new();
    while let Some(event) = events.try_recv() {
        seen.push(event);
    }
    let submitted = seen
        .iter()
        .position(|e| matches!(e, CoordinatorEvent::ClaimSubmitted { account } if *account == user()));
    let confirmed = seen
        .iter()
        .position(|e| *e == CoordinatorEvent::ClaimConfirmed { tx_hash });
    assert!(submitted.is_some());
    assert!(submitted < confirmed);

    match seen.last() {
        Some(CoordinatorEvent::StateChanged(state)) => assert_eq!(state.token_balance, CLAIM_AMOUNT),
        other => panic!("expected a final state change, got {:?}", other),
    }

    tokio::time::sleep(Duration::from_millis(4_001)).await;
    let mut cleared = false;
    while let Some(event) = events.try_recv() {
        cleared |= matches!(event, CoordinatorEvent::MessageCleared { .. });
    }
    assert!(cleared);
}

#[tokio::test(start_paused = true)]
async fn test_metrics_are_recorded() {
    let metrics = Arc::new(ClientMetrics::new().unwrap());
    let gateway = Arc::new(SimulatedGateway::new(owner(), vec![user()]));
    let chain: Arc<dyn ChainGateway> = gateway.clone();
    let coordinator =
        ClaimCoordinator::new(chain, CoordinatorConfig::default()).with_metrics(metrics.clone());

    coordinator.connect().await.unwrap();
    coordinator.request_claim().await.unwrap();
    coordinator.request_claim().await.unwrap_err();

    assert_eq!(metrics.claims_submitted_total.get(), 1.0);
    assert_eq!(metrics.claims_confirmed_total.get(), 1.0);
    assert_eq!(metrics.claims_rejected_locally_total.get(), 1.0);
    assert_eq!(metrics.claim_confirmation_time.get_sample_count(), 1);
    assert!(metrics.gather().unwrap().contains("faucet_claims_confirmed_total 1"));
}
