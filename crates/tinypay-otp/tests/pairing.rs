//! End-to-end phone/watch scenarios over the in-memory link.

use std::sync::Arc;
use std::time::Duration;

use tinypay_otp::store::MemoryStore;
use tinypay_otp::sync::{verify_convergence, MemoryEndpoint, MemoryLink, Transport};
use tinypay_otp::{
    generate, ApplicationContext, CoreError, DeviceConfig, DeviceRole, PeerDevice, StateChange,
    SyncSnapshot,
};
use tokio::sync::broadcast;

type Device = PeerDevice<Arc<MemoryStore>, MemoryEndpoint>;

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(50);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

async fn pair() -> (Device, Device) {
    init_tracing();
    let (phone_link, watch_link) = MemoryLink::pair();
    let phone = PeerDevice::open(
        DeviceConfig::for_role(DeviceRole::Phone),
        Arc::new(MemoryStore::new()),
        phone_link,
    )
    .await
    .unwrap();
    let watch = PeerDevice::open(
        DeviceConfig::for_role(DeviceRole::Watch),
        Arc::new(MemoryStore::new()),
        watch_link,
    )
    .await
    .unwrap();
    (phone, watch)
}

/// Receive one context on `device` and apply it.
async fn pump(device: &Device) -> tinypay_otp::sync::ReconcileOutcome {
    let context = tokio::time::timeout(WAIT, device.transport().recv())
        .await
        .expect("timed out waiting for peer")
        .unwrap();
    device.handle_incoming(&context).await.unwrap()
}

async fn assert_nothing_pending(device: &Device) {
    assert_eq!(device.transport().recv_timeout(QUIET).await.unwrap(), None);
}

async fn wait_for(
    events: &mut broadcast::Receiver<StateChange>,
    predicate: impl Fn(&StateChange) -> bool,
) -> StateChange {
    tokio::time::timeout(WAIT, async {
        loop {
            let change = events.recv().await.unwrap();
            if predicate(&change) {
                return change;
            }
        }
    })
    .await
    .expect("timed out waiting for state change")
}

#[tokio::test]
async fn test_new_root_reaches_watch() {
    let (phone, watch) = pair().await;

    phone.submit_root("secret123", "0xpayer").await.unwrap();
    let outcome = pump(&watch).await;

    assert!(matches!(outcome.changes[0], StateChange::ChainReplaced { cursor: 998, .. }));
    let watch_state = watch.state().await;
    assert_eq!(watch_state.chain(), Some(&generate("secret123")));
    assert_eq!(watch_state.cursor(), 998);
    assert_eq!(watch_state.payer_address(), "0xpayer");
    assert!(verify_convergence(&phone.state().await, &watch_state).is_converged());

    // Both devices show the same code.
    assert_eq!(
        phone.current_code().await.unwrap(),
        watch.current_code().await.unwrap()
    );
}

#[tokio::test]
async fn test_phone_consumes_watch_follows() {
    let (phone, watch) = pair().await;
    phone.submit_root("secret123", "0xpayer").await.unwrap();
    pump(&watch).await;

    phone.consume_one().await.unwrap();
    let outcome = pump(&watch).await;

    assert_eq!(
        outcome.changes,
        vec![StateChange::CursorAdvanced { from: 998, to: 997 }]
    );
    assert_eq!(watch.state().await.cursor(), 997);
}

#[tokio::test]
async fn test_watch_consumes_phone_follows_without_echo() {
    let (phone, watch) = pair().await;
    phone.submit_root("secret123", "0xpayer").await.unwrap();
    pump(&watch).await;

    for _ in 0..3 {
        watch.consume_one().await.unwrap();
    }
    pump(&phone).await;
    assert_eq!(phone.state().await.cursor(), 995);

    // Reconciliation never replies.
    assert_nothing_pending(&watch).await;
}

#[tokio::test]
async fn test_rapid_consumption_coalesces_to_latest() {
    let (phone, watch) = pair().await;
    phone.submit_root("secret123", "0xpayer").await.unwrap();
    pump(&watch).await;

    for _ in 0..5 {
        phone.consume_one().await.unwrap();
    }

    let outcome = pump(&watch).await;
    assert_eq!(
        outcome.changes,
        vec![StateChange::CursorAdvanced { from: 998, to: 993 }]
    );
    assert_nothing_pending(&watch).await;
}

#[tokio::test]
async fn test_consume_while_unreachable_then_reconnect() {
    let (phone, watch) = pair().await;
    phone.submit_root("secret123", "0xpayer").await.unwrap();
    pump(&watch).await;

    let link = phone.transport().link();
    link.set_reachable(false);

    assert_eq!(phone.consume_one().await.unwrap(), 997);
    assert_eq!(phone.consume_one().await.unwrap(), 996);
    assert_nothing_pending(&watch).await;
    assert_eq!(watch.state().await.cursor(), 998);

    link.set_reachable(true);
    pump(&watch).await;
    assert!(verify_convergence(&phone.state().await, &watch.state().await).is_converged());
}

#[tokio::test]
async fn test_both_consume_offline_converge_to_minimum() {
    let (phone, watch) = pair().await;
    phone.submit_root("secret123", "0xpayer").await.unwrap();
    pump(&watch).await;

    let link = phone.transport().link();
    link.set_reachable(false);
    for _ in 0..3 {
        phone.consume_one().await.unwrap();
    }
    for _ in 0..2 {
        watch.consume_one().await.unwrap();
    }
    link.set_reachable(true);

    pump(&watch).await;
    pump(&phone).await;

    assert_eq!(phone.state().await.cursor(), 995);
    assert_eq!(watch.state().await.cursor(), 995);
}

#[tokio::test]
async fn test_new_root_supersedes_more_consumed_peer() {
    let (phone, watch) = pair().await;
    phone.submit_root("first", "0xpayer").await.unwrap();
    pump(&watch).await;

    for _ in 0..20 {
        watch.consume_one().await.unwrap();
    }
    pump(&phone).await;
    assert_eq!(phone.state().await.cursor(), 978);

    phone.submit_root("second", "0xpayer").await.unwrap();
    pump(&watch).await;

    let watch_state = watch.state().await;
    assert_eq!(watch_state.chain(), Some(&generate("second")));
    assert_eq!(watch_state.cursor(), 998);
}

#[tokio::test]
async fn test_address_change_propagates() {
    let (phone, watch) = pair().await;
    phone.submit_root("secret123", "0xold").await.unwrap();
    pump(&watch).await;

    assert!(phone.set_payer_address("0xnew").await.unwrap());
    assert!(!phone.set_payer_address("0xnew").await.unwrap());
    pump(&watch).await;

    assert_eq!(watch.state().await.payer_address(), "0xnew");
    assert!(watch.payment_code().await.unwrap().to_string().starts_with("addr:0xnew otp:0x"));
}

#[tokio::test]
async fn test_replayed_announcement_is_idempotent() {
    let (phone, watch) = pair().await;
    phone.submit_root("secret123", "0xpayer").await.unwrap();
    let announcement = watch.transport().recv().await.unwrap();

    watch.handle_incoming(&announcement).await.unwrap();
    for _ in 0..4 {
        watch.consume_one().await.unwrap();
    }

    let mut events = watch.subscribe();
    let outcome = watch.handle_incoming(&announcement).await.unwrap();
    assert!(!outcome.changed());
    assert_eq!(watch.state().await.cursor(), 994);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_malformed_payload_applies_what_it_can() {
    let (_phone, watch) = pair().await;
    let mut events = watch.subscribe();

    let mut context = SyncSnapshot::full(&{
        let mut state = tinypay_otp::ChainState::new();
        state.initialize(generate("remote"), "0xremote", 1.0);
        state
    })
    .to_context();
    context.insert("hashDict", serde_json::json!({"0": "zz"}));

    let outcome = watch.handle_incoming(&context).await.unwrap();
    let state = watch.state().await;
    assert!(!state.is_ready());
    assert_eq!(state.payer_address(), "0xremote");
    assert_eq!(
        outcome.changes,
        vec![StateChange::AddressChanged { address: "0xremote".into() }]
    );
    assert_eq!(
        events.recv().await.unwrap(),
        StateChange::AddressChanged { address: "0xremote".into() }
    );
}

#[tokio::test]
async fn test_empty_payload_is_noop() {
    let (phone, watch) = pair().await;
    phone.submit_root("secret123", "0xpayer").await.unwrap();
    pump(&watch).await;

    let before = watch.state().await;
    let outcome = watch.handle_incoming(&ApplicationContext::new()).await.unwrap();
    assert!(!outcome.changed());
    assert_eq!(watch.state().await, before);
}

#[tokio::test]
async fn test_exhaustion_requires_new_root() {
    let (phone, _watch) = pair().await;
    phone.submit_root("secret123", "0xpayer").await.unwrap();

    for _ in 0..998 {
        phone.consume_one().await.unwrap();
    }
    assert_eq!(phone.current_code().await.unwrap().index, 0);

    let err = phone.consume_one().await.unwrap_err();
    assert_eq!(err.as_core(), Some(&CoreError::AlreadyExhausted));
    assert_eq!(phone.state().await.cursor(), 0);
    let err = phone.current_code().await.unwrap_err();
    assert_eq!(err.as_core(), Some(&CoreError::IndexExhausted));

    phone.submit_root("fresh", "0xpayer").await.unwrap();
    assert_eq!(phone.current_code().await.unwrap().index, 998);
}

#[tokio::test]
async fn test_announce_catches_up_restarted_peer() {
    let (phone, watch) = pair().await;
    phone.submit_root("secret123", "0xpayer").await.unwrap();
    pump(&watch).await;

    for _ in 0..7 {
        watch.consume_one().await.unwrap();
    }
    // The phone missed those updates.
    assert!(phone.transport().recv_timeout(QUIET).await.unwrap().is_some());
    assert_eq!(phone.state().await.cursor(), 998);

    watch.announce().await.unwrap();
    pump(&phone).await;
    assert_eq!(phone.state().await.cursor(), 991);
}

#[tokio::test]
async fn test_publish_full_restores_peer_without_chain() {
    let (phone, watch) = pair().await;
    phone.submit_root("secret123", "0xpayer").await.unwrap();
    // Watch never saw the announcement.
    let _ = watch.transport().recv().await.unwrap();
    phone.consume_one().await.unwrap();
    let _ = watch.transport().recv().await.unwrap();
    assert!(!watch.state().await.is_ready());

    phone.publish_full().await.unwrap();
    pump(&watch).await;
    assert!(verify_convergence(&phone.state().await, &watch.state().await).is_converged());
    assert_eq!(watch.state().await.cursor(), 997);
}

#[tokio::test]
async fn test_chain_survives_consumption_before_first_delivery() {
    let (phone, watch) = pair().await;
    phone.submit_root("secret123", "0xpayer").await.unwrap();
    phone.consume_one().await.unwrap();

    // Only the latest context is delivered; it must still carry the chain.
    pump(&watch).await;
    let watch_state = watch.state().await;
    assert!(watch_state.is_ready());
    assert_eq!(watch_state.cursor(), 997);
    assert!(verify_convergence(&phone.state().await, &watch_state).is_converged());
    assert_nothing_pending(&watch).await;
}

#[tokio::test]
async fn test_resubmitted_root_resets_both_devices() {
    let (phone, watch) = pair().await;
    phone.submit_root("secret123", "0xpayer").await.unwrap();
    pump(&watch).await;

    for _ in 0..100 {
        watch.consume_one().await.unwrap();
    }
    pump(&phone).await;
    assert_eq!(phone.state().await.cursor(), 898);

    phone.submit_root("secret123", "0xpayer").await.unwrap();
    assert_eq!(phone.state().await.cursor(), 998);
    pump(&watch).await;
    assert_eq!(watch.state().await.cursor(), 998);

    // A later announcement from the watch keeps the reset.
    watch.announce().await.unwrap();
    pump(&phone).await;
    assert_eq!(phone.state().await.cursor(), 998);
    assert!(verify_convergence(&phone.state().await, &watch.state().await).is_converged());
}

#[tokio::test]
async fn test_inbound_pumps_run_in_background() {
    let (phone, watch) = pair().await;
    let phone = Arc::new(phone);
    let watch = Arc::new(watch);

    let mut watch_events = watch.subscribe();
    let mut phone_events = phone.subscribe();

    let watch_pump = tokio::spawn({
        let watch = Arc::clone(&watch);
        async move { watch.run_inbound().await }
    });
    let phone_pump = tokio::spawn({
        let phone = Arc::clone(&phone);
        async move { phone.run_inbound().await }
    });

    phone.submit_root("secret123", "0xpayer").await.unwrap();
    wait_for(&mut watch_events, |c| matches!(c, StateChange::ChainReplaced { .. })).await;

    watch.consume_one().await.unwrap();
    wait_for(&mut phone_events, |c| {
        matches!(c, StateChange::CursorAdvanced { to: 997, .. })
    })
    .await;
    assert_eq!(phone.state().await.cursor(), 997);

    watch_pump.abort();
    phone_pump.abort();
}

#[tokio::test]
async fn test_inbound_pump_ends_when_peer_dropped() {
    init_tracing();
    let (phone_link, watch_link) = MemoryLink::pair();
    let watch = PeerDevice::open(
        DeviceConfig::for_role(DeviceRole::Watch),
        MemoryStore::new(),
        watch_link,
    )
    .await
    .unwrap();

    phone_link
        .update_context(SyncSnapshot::address("0xlast").to_context())
        .await
        .unwrap();
    drop(phone_link);

    // The last context is still applied before the pump stops.
    tokio::time::timeout(WAIT, watch.run_inbound())
        .await
        .expect("pump did not stop")
        .unwrap();
    assert_eq!(watch.state().await.payer_address(), "0xlast");
}
