//! Integration test: SummaryStreamClient <-> Hub-Sim
//!
//! Drives the client through the scripted transport:
//! subscribe -> connect (bypass) -> feed registration -> batch dispatch -> close

use chrono::NaiveDate;
use deltastream_client::{DispatchObserver, StreamConfig, StreamError, SummaryStreamClient};
use deltastream_core::{DecodeError, MarketUpdate, SubscriptionId, SummaryBatch};
use deltastream_ports::{ConnectionState, CookieSet};
use hub_sim::{ConnectBehavior, ScriptedSolver, SimConnection, SimConnectionFactory, SimProxy, SolverCall};
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const FEED_ACTION: &str = "SubscribeToSummaryDeltas";
const FEED_EVENT: &str = "updateSummaryState";

struct Harness {
    client: SummaryStreamClient,
    factory: SimConnectionFactory,
    solver: Arc<ScriptedSolver>,
}

impl Harness {
    fn connection(&self) -> Arc<SimConnection> {
        self.factory.connection()
    }

    fn proxy(&self) -> Arc<SimProxy> {
        self.factory.connection().proxy()
    }

    fn push(&self, markets: &[&str]) {
        let deltas = markets.iter().map(|market| update(market)).collect();
        self.proxy()
            .push_summary(FEED_EVENT, &SummaryBatch::new(deltas).with_nonce(1));
    }
}

#[derive(Default)]
struct CountingObserver {
    malformed: AtomicUsize,
    failures: Mutex<Vec<(SubscriptionId, String)>>,
}

impl DispatchObserver for CountingObserver {
    fn on_malformed_payload(&self, _error: &DecodeError) {
        self.malformed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_callback_failure(&self, id: SubscriptionId, market: &str, _reason: &str) {
        self.failures.lock().push((id, market.to_string()));
    }
}

fn config() -> StreamConfig {
    StreamConfig::default().with_reconnect_backoff(
        Duration::from_millis(10),
        Duration::from_millis(50),
        2.0,
    )
}

fn cookies() -> CookieSet {
    CookieSet::new().with("cf_clearance", "solved")
}

fn harness(behavior: ConnectBehavior) -> Harness {
    build(behavior, ScriptedSolver::granting(cookies()), None)
}

fn build(
    behavior: ConnectBehavior,
    solver: ScriptedSolver,
    observer: Option<Arc<dyn DispatchObserver>>,
) -> Harness {
    let _ = env_logger::try_init();

    let factory = SimConnectionFactory::new(behavior);
    let solver = Arc::new(solver);
    let client = match observer {
        Some(observer) => SummaryStreamClient::with_observer(
            config(),
            Arc::new(factory.clone()),
            solver.clone(),
            observer,
        ),
        None => SummaryStreamClient::with_collaborators(
            config(),
            Arc::new(factory.clone()),
            solver.clone(),
        ),
    };

    Harness {
        client,
        factory,
        solver,
    }
}

fn update(market: &str) -> MarketUpdate {
    let day = |y, m, d| {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap()
    };
    MarketUpdate {
        market_name: market.to_string(),
        high: dec!(4.4),
        low: dec!(6.6),
        volume: dec!(8.8),
        last: dec!(5.5),
        base_volume: dec!(2.2),
        timestamp: day(2016, 1, 1),
        bid: dec!(3.3),
        ask: dec!(1.1),
        open_buy_orders: 10,
        open_sell_orders: 20,
        prev_day: dec!(7.7),
        created: day(2017, 1, 1),
        display_market_name: None,
    }
}

fn collector() -> (
    Arc<Mutex<Vec<MarketUpdate>>>,
    impl Fn(&MarketUpdate) + Send + Sync + 'static,
) {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    (received, move |update: &MarketUpdate| {
        sink.lock().push(update.clone())
    })
}

/// Poll until `condition` holds, giving background tasks time to run
async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

#[tokio::test]
async fn test_market_subscription_receives_exact_market() {
    let h = harness(ConnectBehavior::Connect);
    let (received, callback) = collector();

    h.client.subscribe_to_market("X", callback).await.unwrap();
    h.push(&["X"]);

    {
        let received = received.lock();
        assert_eq!(received.len(), 1);
        let got = &received[0];
        assert_eq!(*got, update("X"));
        assert_eq!(got.market(), "X");
        assert_eq!(got.ask, dec!(1.1));
        assert_eq!(got.bid, dec!(3.3));
        assert_eq!(got.last, dec!(5.5));
        assert_eq!(got.high, dec!(4.4));
        assert_eq!(got.low, dec!(6.6));
        assert_eq!(got.volume, dec!(8.8));
        assert_eq!(got.base_volume, dec!(2.2));
        assert_eq!(got.open_buy_orders, 10);
        assert_eq!(got.open_sell_orders, 20);
    }

    // Another market must not reach the "X" subscription
    h.push(&["Y"]);
    assert_eq!(received.lock().len(), 1);
}

#[tokio::test]
async fn test_market_filter_is_case_sensitive() {
    let h = harness(ConnectBehavior::Connect);
    let (received, callback) = collector();

    h.client.subscribe_to_market("BTC-ETH", callback).await.unwrap();
    h.push(&["btc-eth", "BTC-ETH2"]);

    assert!(received.lock().is_empty());
}

#[tokio::test]
async fn test_wildcard_receives_every_record() {
    let h = harness(ConnectBehavior::Connect);
    let (received, callback) = collector();

    h.client.subscribe_to_all_markets(callback).await.unwrap();
    h.push(&["X", "Y"]);

    let markets: Vec<String> = received
        .lock()
        .iter()
        .map(|update| update.market_name.clone())
        .collect();
    assert_eq!(markets, vec!["X", "Y"]);
}

#[tokio::test]
async fn test_single_feed_registration_for_many_subscribes() {
    let h = harness(ConnectBehavior::Connect);

    let a = h.client.subscribe_to_market("X", |_| {}).await.unwrap();
    let b = h.client.subscribe_to_market("Y", |_| {}).await.unwrap();
    let c = h.client.subscribe_to_all_markets(|_| {}).await.unwrap();

    assert!(a != b && b != c && a != c);
    assert_eq!(h.proxy().invocation_count(FEED_ACTION), 1);
    assert_eq!(h.proxy().handler_count(FEED_EVENT), 1);
    assert_eq!(h.factory.create_count(), 1);
    assert_eq!(h.connection().start_count(), 1);
    assert_eq!(h.connection().hub_names(), vec!["coreHub"]);
    assert_eq!(h.client.subscription_count(), 3);
    assert!(h.client.is_feed_registered());
    assert_eq!(h.client.connection_state(), ConnectionState::Connected);
}

#[tokio::test]
async fn test_feed_registered_again_after_full_close() {
    let h = harness(ConnectBehavior::Connect);

    let id = h.client.subscribe_to_market("X", |_| {}).await.unwrap();
    h.client.unsubscribe(id).await;
    assert!(!h.client.is_feed_registered());

    let (received, callback) = collector();
    h.client.subscribe_to_market("X", callback).await.unwrap();
    h.push(&["X"]);

    assert_eq!(h.proxy().invocation_count(FEED_ACTION), 2);
    assert_eq!(h.proxy().handler_count(FEED_EVENT), 1);
    assert_eq!(received.lock().len(), 1);
}

#[tokio::test]
async fn test_empty_and_malformed_payloads_fire_nothing() {
    let observer = Arc::new(CountingObserver::default());
    let h = build(
        ConnectBehavior::Connect,
        ScriptedSolver::granting(cookies()),
        Some(observer.clone()),
    );
    let (received, callback) = collector();

    h.client.subscribe_to_all_markets(callback).await.unwrap();
    h.proxy().push_text(FEED_EVENT, "");
    h.proxy().push_text(FEED_EVENT, "{\"Deltas\": [");
    h.proxy().push(FEED_EVENT, Vec::new());

    assert!(received.lock().is_empty());
    assert_eq!(observer.malformed.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_batch_as_json_text_is_delivered() {
    let h = harness(ConnectBehavior::Connect);
    let (received, callback) = collector();

    h.client.subscribe_to_market("X", callback).await.unwrap();
    let text = serde_json::to_string(&SummaryBatch::new(vec![update("X")])).unwrap();
    h.proxy().push_text(FEED_EVENT, &text);

    assert_eq!(*received.lock(), vec![update("X")]);
}

#[tokio::test]
async fn test_stop_on_last_unsubscribe_only() {
    let h = harness(ConnectBehavior::Connect);

    let a = h.client.subscribe_to_market("X", |_| {}).await.unwrap();
    let b = h.client.subscribe_to_market("Y", |_| {}).await.unwrap();

    h.client.unsubscribe(a).await;
    assert_eq!(h.connection().stop_count(), 0);
    assert_eq!(h.client.connection_state(), ConnectionState::Connected);

    // Unknown and repeated ids are ignored
    h.client.unsubscribe(a).await;
    h.client.unsubscribe(SubscriptionId::new(999)).await;
    assert_eq!(h.connection().stop_count(), 0);

    h.client.unsubscribe(b).await;
    assert_eq!(h.connection().stop_count(), 1);
    assert_eq!(
        h.connection().last_stop_timeout(),
        Some(Duration::from_secs(5))
    );
    assert_eq!(h.client.connection_state(), ConnectionState::Disconnected);
    assert_eq!(h.client.subscription_count(), 0);
}

#[tokio::test]
async fn test_unsubscribe_all_stops() {
    let h = harness(ConnectBehavior::Connect);

    h.client.subscribe_to_market("X", |_| {}).await.unwrap();
    h.client.subscribe_to_all_markets(|_| {}).await.unwrap();
    h.client.unsubscribe_all().await;

    assert_eq!(h.connection().stop_count(), 1);
    assert_eq!(h.client.subscription_count(), 0);

    h.client.unsubscribe_all().await;
    assert_eq!(h.connection().stop_count(), 1);
}

#[tokio::test]
async fn test_dispose_stops_and_is_idempotent() {
    let h = harness(ConnectBehavior::Connect);
    let id = h.client.subscribe_to_market("X", |_| {}).await.unwrap();

    h.client.dispose().await;
    h.client.dispose().await;

    assert!(h.client.is_disposed());
    assert_eq!(h.connection().stop_count(), 1);
    assert_eq!(h.connection().closed_handler_count(), 0);
    assert_eq!(h.client.subscription_count(), 0);

    // Operations after dispose
    h.client.unsubscribe(id).await;
    h.client.unsubscribe_all().await;
    let result = h.client.subscribe_to_market("X", |_| {}).await;
    assert_eq!(result, Err(StreamError::Disposed));
    assert_eq!(h.connection().start_count(), 1);
}

#[tokio::test]
async fn test_concurrent_dispose() {
    let h = harness(ConnectBehavior::Connect);
    h.client.subscribe_to_all_markets(|_| {}).await.unwrap();

    let first = h.client.clone();
    let second = h.client.clone();
    tokio::join!(first.dispose(), second.dispose());

    assert_eq!(h.connection().stop_count(), 1);
}

#[tokio::test]
async fn test_challenge_bypass_on_refused_connect() {
    let h = harness(ConnectBehavior::RequireCookies);

    let result = h.client.subscribe_to_market("X", |_| {}).await;

    assert!(result.is_ok());
    assert_eq!(
        h.solver.calls(),
        vec![SolverCall {
            address: "https://socket.bittrex.com/".to_string(),
            identity: StreamConfig::default().bypass_identity,
            timeout_secs: 10,
        }]
    );
    assert_eq!(h.connection().cookies(), Some(cookies()));
    assert_eq!(h.connection().start_count(), 2);
    assert_eq!(h.proxy().invocation_count(FEED_ACTION), 1);
}

#[tokio::test]
async fn test_no_cookies_fails_subscribe() {
    let h = build(
        ConnectBehavior::RequireCookies,
        ScriptedSolver::refusing(),
        None,
    );

    let result = h.client.subscribe_to_market("X", |_| {}).await;

    assert!(matches!(result, Err(StreamError::ChallengeFailed { .. })));
    assert_eq!(h.solver.call_count(), 1);
    assert_eq!(h.connection().start_count(), 1);
    assert_eq!(h.client.subscription_count(), 0);
    assert_eq!(h.client.connection_state(), ConnectionState::Disconnected);
    assert_eq!(h.proxy().invocation_count(FEED_ACTION), 0);
}

#[tokio::test]
async fn test_still_refused_after_bypass_fails_subscribe() {
    let h = harness(ConnectBehavior::Refuse);

    let result = h.client.subscribe_to_all_markets(|_| {}).await;

    assert!(matches!(result, Err(StreamError::Connection(_))));
    assert_eq!(h.connection().start_count(), 2);
    assert_eq!(h.client.subscription_count(), 0);
}

#[tokio::test]
async fn test_transport_errors_fail_subscribe() {
    let h = harness(ConnectBehavior::Fail("no route to host".to_string()));
    let result = h.client.subscribe_to_market("X", |_| {}).await;
    assert!(matches!(result, Err(StreamError::Transport(_))));
    assert_eq!(h.client.subscription_count(), 0);

    let h = harness(ConnectBehavior::Connect);
    h.factory.fail_creation(Some("factory down"));
    let result = h.client.subscribe_to_market("X", |_| {}).await;
    assert!(matches!(result, Err(StreamError::Transport(_))));
    assert_eq!(h.client.subscription_count(), 0);
}

#[tokio::test]
async fn test_feed_registration_failure_rolls_back() {
    let h = harness(ConnectBehavior::Connect);
    h.proxy().fail_action(FEED_ACTION, "rejected");

    let result = h.client.subscribe_to_market("X", |_| {}).await;
    assert!(matches!(result, Err(StreamError::FeedRegistration(_))));
    assert_eq!(h.client.subscription_count(), 0);
    assert_eq!(h.connection().stop_count(), 1);
    assert_eq!(h.proxy().handler_count(FEED_EVENT), 0);

    h.proxy().clear_failures();
    let (received, callback) = collector();
    h.client.subscribe_to_market("X", callback).await.unwrap();
    h.push(&["X"]);
    assert_eq!(received.lock().len(), 1);
}

#[tokio::test]
async fn test_connect_settled_by_background_notification() {
    let h = harness(ConnectBehavior::Connect);
    h.connection().set_settle_delay(Some(Duration::from_millis(20)));

    h.client.subscribe_to_all_markets(|_| {}).await.unwrap();

    assert_eq!(h.client.connection_state(), ConnectionState::Connected);
    assert_eq!(h.solver.call_count(), 0);
}

#[tokio::test]
async fn test_reconnect_after_unexpected_close() {
    let h = harness(ConnectBehavior::Connect);
    let (received, callback) = collector();
    let id = h.client.subscribe_to_market("X", callback).await.unwrap();

    h.connection().drop_connection();

    let connection = h.connection();
    let proxy = h.proxy();
    let client = h.client.clone();
    assert!(
        wait_until(|| {
            connection.start_count() == 2
                && proxy.invocation_count(FEED_ACTION) == 2
                && client.connection_state() == ConnectionState::Connected
        })
        .await
    );

    // The earlier subscription still delivers over the restored connection
    assert!(h.client.is_subscribed(id));
    h.push(&["X"]);
    assert_eq!(received.lock().len(), 1);
    assert_eq!(h.proxy().handler_count(FEED_EVENT), 1);
}

#[tokio::test]
async fn test_reconnect_retries_until_connected() {
    let h = harness(ConnectBehavior::Connect);
    h.client.subscribe_to_all_markets(|_| {}).await.unwrap();

    h.connection().set_behavior(ConnectBehavior::Fail("down".to_string()));
    h.connection().drop_connection();

    let connection = h.connection();
    assert!(wait_until(|| connection.start_count() >= 4).await);
    assert_eq!(h.client.connection_state(), ConnectionState::Reconnecting);
    assert_eq!(h.client.subscription_count(), 1);

    connection.set_behavior(ConnectBehavior::Connect);
    let client = h.client.clone();
    assert!(wait_until(|| client.connection_state() == ConnectionState::Connected).await);

    let proxy = h.proxy();
    assert!(wait_until(|| proxy.invocation_count(FEED_ACTION) == 2).await);
}

#[tokio::test]
async fn test_dispose_cancels_reconnect() {
    let h = harness(ConnectBehavior::Connect);
    h.client.subscribe_to_all_markets(|_| {}).await.unwrap();

    h.connection().set_behavior(ConnectBehavior::Fail("down".to_string()));
    h.connection().drop_connection();

    let connection = h.connection();
    assert!(wait_until(|| connection.start_count() >= 2).await);

    h.client.dispose().await;
    let starts = connection.start_count();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(connection.start_count(), starts);
    assert_eq!(h.client.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_no_reconnect_without_subscriptions() {
    let h = harness(ConnectBehavior::Connect);
    let id = h.client.subscribe_to_all_markets(|_| {}).await.unwrap();
    h.client.unsubscribe(id).await;

    h.connection().drop_connection();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(h.connection().start_count(), 1);
    assert_eq!(h.client.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_panicking_callback_is_isolated() {
    let observer = Arc::new(CountingObserver::default());
    let h = build(
        ConnectBehavior::Connect,
        ScriptedSolver::granting(cookies()),
        Some(observer.clone()),
    );
    let (received, callback) = collector();

    let bad = h
        .client
        .subscribe_to_market("X", |_| panic!("callback failed"))
        .await
        .unwrap();
    h.client.subscribe_to_all_markets(callback).await.unwrap();

    h.push(&["X", "Y"]);

    assert_eq!(received.lock().len(), 2);
    assert_eq!(*observer.failures.lock(), vec![(bad, "X".to_string())]);
    assert_eq!(h.client.subscription_count(), 2);
}

#[tokio::test]
async fn test_callback_can_unsubscribe_itself() {
    let h = harness(ConnectBehavior::Connect);
    let calls = Arc::new(AtomicUsize::new(0));
    let own_id: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

    let client = h.client.clone();
    let counter = Arc::clone(&calls);
    let slot = Arc::clone(&own_id);
    let id = h
        .client
        .subscribe_to_market("X", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = *slot.lock() {
                client.unsubscribe_in_background(id);
            }
        })
        .await
        .unwrap();
    *own_id.lock() = Some(id);

    h.push(&["X", "X"]);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!h.client.is_subscribed(id));

    let connection = h.connection();
    assert!(wait_until(|| connection.stop_count() == 1).await);
}

#[tokio::test]
async fn test_callback_can_subscribe_during_dispatch() {
    let h = harness(ConnectBehavior::Connect);
    let (received, late_callback) = collector();
    let late_callback = Arc::new(Mutex::new(Some(late_callback)));

    let client = h.client.clone();
    h.client
        .subscribe_to_market("X", move |_| {
            if let Some(callback) = late_callback.lock().take() {
                let client = client.clone();
                tokio::spawn(async move {
                    let _ = client.subscribe_to_market("Y", callback).await;
                });
            }
        })
        .await
        .unwrap();

    h.push(&["X"]);
    let client = h.client.clone();
    assert!(wait_until(|| client.subscription_count() == 2).await);

    h.push(&["Y"]);
    assert_eq!(received.lock().len(), 1);
    assert_eq!(h.proxy().invocation_count(FEED_ACTION), 1);
}
