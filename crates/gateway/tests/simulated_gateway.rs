//! Faucet rules through the `ChainGateway` interface of the simulated backend

use faucet_common::Address;
use faucet_gateway::sim::{CLAIM_AMOUNT, COOLDOWN_SECS, LIFETIME_LIMIT};
use faucet_gateway::{ChainGateway, GatewayError, RevertReason, SimulatedGateway};
use std::sync::Arc;

fn owner() -> Address {
    Address([0x01; 20])
}

fn user() -> Address {
    Address([0x02; 20])
}

fn reason(err: GatewayError) -> RevertReason {
    match err {
        GatewayError::Reverted { reason } => reason,
        other => panic!("expected a revert, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cooldown_blocks_second_claim() {
    let gateway = SimulatedGateway::new(owner(), vec![user()]);

    gateway.submit_claim().await.unwrap();
    assert_eq!(gateway.token_balance(user()).await, Ok(CLAIM_AMOUNT));

    let err = gateway.submit_claim().await.unwrap_err();
    assert_eq!(reason(err), RevertReason::CooldownActive);
    assert_eq!(gateway.token_balance(user()).await, Ok(CLAIM_AMOUNT));

    gateway.advance_time(COOLDOWN_SECS).await;
    gateway.submit_claim().await.unwrap();
    assert_eq!(gateway.token_balance(user()).await, Ok(2 * CLAIM_AMOUNT));
}

#[tokio::test]
async fn test_ten_claims_then_lifetime_limit() {
    let gateway = SimulatedGateway::new(owner(), vec![user()]);
    assert_eq!(gateway.remaining_allowance(user()).await, Ok(LIFETIME_LIMIT));

    for _ in 0..10 {
        gateway.submit_claim().await.unwrap();
        gateway.advance_time(COOLDOWN_SECS).await;
    }

    let err = gateway.submit_claim().await.unwrap_err();
    assert_eq!(reason(err), RevertReason::LifetimeLimitReached);
    assert_eq!(gateway.total_claimed(user()).await, Ok(LIFETIME_LIMIT));
}

#[tokio::test]
async fn test_no_remaining_allowance_means_cannot_claim() {
    let gateway = SimulatedGateway::new(owner(), vec![user()]);
    for _ in 0..10 {
        gateway.submit_claim().await.unwrap();
        gateway.advance_time(COOLDOWN_SECS).await;
    }

    let eligibility = gateway.eligibility(user()).await.unwrap();
    assert_eq!(eligibility.remaining_allowance, 0);
    assert!(!eligibility.eligible);
}

#[tokio::test]
async fn test_owner_pause_and_unpause() {
    let chain = SimulatedGateway::new(owner(), vec![owner()]).chain();
    let admin = SimulatedGateway::with_chain(chain.clone(), vec![owner()]);
    let member = SimulatedGateway::with_chain(chain, vec![user()]);

    let err = member.set_paused(true).await.unwrap_err();
    assert!(matches!(reason(err), RevertReason::Other(_)));
    assert_eq!(member.is_paused().await, Ok(false));

    admin.set_paused(true).await.unwrap();
    assert_eq!(member.is_paused().await, Ok(true));
    assert_eq!(member.can_claim(user()).await, Ok(false));
    assert_eq!(reason(member.submit_claim().await.unwrap_err()), RevertReason::Paused);

    admin.set_paused(false).await.unwrap();
    member.submit_claim().await.unwrap();
    assert_eq!(member.token_balance(user()).await, Ok(CLAIM_AMOUNT));
}

#[tokio::test]
async fn test_injected_as_trait_object() {
    let gateway: Arc<dyn ChainGateway> = Arc::new(SimulatedGateway::new(owner(), vec![user()]));
    assert_eq!(gateway.connect().await, Ok(user()));
    assert_eq!(gateway.token_decimals().await, Ok(18));

    let before = gateway.chain_time().await.unwrap();
    let hash = gateway.submit_claim().await.unwrap();
    assert_ne!(hash.to_string(), "");

    let eligibility = gateway.eligibility(user()).await.unwrap();
    assert_eq!(eligibility.last_claim_at, before);
    assert_eq!(eligibility.next_claim_at(COOLDOWN_SECS), Some(before + COOLDOWN_SECS));
}
