//! Subscription multiplexer over a single persistent connection.
//!
//! One connection task owns the socket; subscribers attach and detach
//! through a shared registry keyed by subscription identifier. Callers
//! never block on network I/O: outbound control messages go through an
//! unbounded channel drained by the connection task.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex as TokioMutex};
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{WsError, WsResult};
use crate::subscription::{message_identifier, Subscription, PONG_IDENTIFIER};

/// Subscriber callback, invoked with each parsed push message.
pub type Callback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// WebSocket URL.
    pub url: String,
    /// Application-level heartbeat interval.
    pub ping_interval: Duration,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
}

impl WsConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ping_interval: Duration::from_secs(50),
            reconnect_delay: Duration::from_secs(5),
        }
    }
}

/// Connection lifecycle state, owned by the connection task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
    Closing,
}

struct Subscriber {
    id: u64,
    callback: Callback,
}

struct Entry {
    /// Canonical subscription for the identifier; used for re-subscribe
    /// after reconnect and for the final unsubscribe.
    subscription: Subscription,
    /// Subscribers in registration order.
    subscribers: Vec<Subscriber>,
}

struct Pending {
    subscription: Subscription,
    callback: Callback,
    id: u64,
}

#[derive(Default)]
struct Registry {
    active: HashMap<String, Entry>,
    /// Subscribes issued before the connection was ready, FIFO.
    queued: Vec<Pending>,
    next_id: u64,
}

impl Registry {
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

struct Inner {
    config: WsConfig,
    state: RwLock<ConnectionState>,
    state_tx: watch::Sender<ConnectionState>,
    state_rx: watch::Receiver<ConnectionState>,
    registry: Mutex<Registry>,
    outbound_tx: mpsc::UnboundedSender<String>,
    /// Consumed by the connection task; held in a mutex so the task can
    /// keep it across reconnects.
    outbound_rx: TokioMutex<mpsc::UnboundedReceiver<String>>,
    shutdown: CancellationToken,
}

impl Inner {
    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
        self.state_tx.send_replace(state);
    }

    fn send_raw(&self, text: String) -> WsResult<()> {
        self.outbound_tx
            .send(text)
            .map_err(|_| WsError::SendFailed("connection task stopped".to_string()))
    }

    fn send_control(&self, method: &str, subscription: &Subscription) -> WsResult<()> {
        let msg = serde_json::to_string(&serde_json::json!({
            "method": method,
            "subscription": subscription,
        }))?;
        self.send_raw(msg)
    }

    fn subscribe(
        &self,
        subscription: Subscription,
        callback: Callback,
        subscription_id: Option<u64>,
    ) -> WsResult<u64> {
        let mut registry = self.registry.lock();
        let id = subscription_id.unwrap_or_else(|| registry.allocate_id());

        if *self.state.read() != ConnectionState::Ready {
            debug!(id, identifier = %subscription.identifier(), "queueing subscription until ready");
            registry.queued.push(Pending {
                subscription,
                callback,
                id,
            });
            return Ok(id);
        }

        self.activate(&mut registry, subscription, callback, id)?;
        Ok(id)
    }

    /// Register a subscriber and send the subscribe control message if
    /// this is the first subscriber for the identifier. Caller holds
    /// the registry lock.
    fn activate(
        &self,
        registry: &mut Registry,
        subscription: Subscription,
        callback: Callback,
        id: u64,
    ) -> WsResult<()> {
        let identifier = subscription.identifier();

        if subscription.is_singleton()
            && registry
                .active
                .get(&identifier)
                .is_some_and(|e| !e.subscribers.is_empty())
        {
            return Err(WsError::DuplicateSingletonSubscription(identifier));
        }

        let entry = registry
            .active
            .entry(identifier)
            .or_insert_with(|| Entry {
                subscription: subscription.clone(),
                subscribers: Vec::new(),
            });
        let first = entry.subscribers.is_empty();
        entry.subscribers.push(Subscriber { id, callback });

        if first {
            self.send_control("subscribe", &subscription)?;
        }
        Ok(())
    }

    fn unsubscribe(&self, subscription: &Subscription, subscription_id: u64) -> WsResult<bool> {
        if *self.state.read() != ConnectionState::Ready {
            return Err(WsError::NotConnected);
        }

        let mut registry = self.registry.lock();
        let identifier = subscription.identifier();

        let Some(entry) = registry.active.get_mut(&identifier) else {
            return Ok(false);
        };

        let before = entry.subscribers.len();
        entry.subscribers.retain(|s| s.id != subscription_id);
        let removed = entry.subscribers.len() != before;

        if removed && entry.subscribers.is_empty() {
            registry.active.remove(&identifier);
            self.send_control("unsubscribe", subscription)?;
        }
        Ok(removed)
    }

    /// Transition to Ready: re-send the subscribe message for every
    /// registered identifier, then flush the pending queue in FIFO
    /// order preserving the ids handed out at queue time.
    fn on_ready(&self) {
        // Ready becomes visible only under the registry lock, so a
        // concurrent subscribe cannot race the restore loop into
        // sending a duplicate subscribe message.
        let mut registry = self.registry.lock();
        self.set_state(ConnectionState::Ready);
        for entry in registry.active.values() {
            if let Err(e) = self.send_control("subscribe", &entry.subscription) {
                warn!(error = %e, "failed to re-send subscription");
            }
        }

        let pending = std::mem::take(&mut registry.queued);
        for p in pending {
            let identifier = p.subscription.identifier();
            if let Err(e) = self.activate(&mut registry, p.subscription, p.callback, p.id) {
                warn!(id = p.id, %identifier, error = %e, "dropping queued subscription");
            }
        }
    }

    fn dispatch(&self, text: &str) {
        let msg: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "discarding malformed message");
                return;
            }
        };

        // Subscribe/unsubscribe ACK; nothing routes on it.
        if msg.get("channel").and_then(Value::as_str) == Some("subscriptionResponse") {
            debug!("subscription acknowledged");
            return;
        }

        let Some(identifier) = message_identifier(&msg) else {
            warn!(
                channel = msg.get("channel").and_then(serde_json::Value::as_str).unwrap_or("<none>"),
                "unrecognized message"
            );
            return;
        };

        if identifier == PONG_IDENTIFIER {
            debug!("heartbeat pong");
            return;
        }

        // Snapshot under the lock; callbacks run outside it.
        let callbacks: Vec<Callback> = {
            let registry = self.registry.lock();
            match registry.active.get(&identifier) {
                Some(entry) => entry
                    .subscribers
                    .iter()
                    .map(|s| Arc::clone(&s.callback))
                    .collect(),
                None => {
                    warn!(%identifier, "message for feed with no subscribers");
                    return;
                }
            }
        };

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(&msg))).is_err() {
                error!(%identifier, "subscriber callback panicked");
            }
        }
    }

    async fn drive(
        &self,
        stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    ) -> WsResult<()> {
        let (mut write, mut read) = stream.split();

        let mut outbound = self.outbound_rx.lock().await;
        // Control messages queued for the previous connection are stale;
        // on_ready below regenerates the full subscribe set.
        while outbound.try_recv().is_ok() {}

        self.on_ready();

        let mut ping = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.ping_interval,
            self.config.ping_interval,
        );

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    self.set_state(ConnectionState::Closing);
                    if let Err(e) = write.send(Message::Close(None)).await {
                        debug!(error = %e, "close frame failed");
                    }
                    return Ok(());
                }

                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.dispatch(&text),
                    Some(Ok(Message::Ping(data))) => write.send(Message::Pong(data)).await?,
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (f.code.into(), f.reason.to_string()))
                            .unwrap_or((1000, "normal close".to_string()));
                        return Err(WsError::ConnectionClosed { code, reason });
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        return Err(WsError::ConnectionClosed {
                            code: 1006,
                            reason: "stream ended".to_string(),
                        });
                    }
                    _ => {}
                },

                out = outbound.recv() => {
                    if let Some(text) = out {
                        write.send(Message::Text(text)).await?;
                    }
                }

                _ = ping.tick() => {
                    write.send(Message::Text(r#"{"method":"ping"}"#.to_string())).await?;
                }
            }
        }
    }
}

/// Handle to the multiplexer. Cheap to clone; all clones share one
/// registry and one connection task.
#[derive(Clone)]
pub struct WsManager {
    inner: Arc<Inner>,
}

impl WsManager {
    pub fn new(config: WsConfig) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(Inner {
                config,
                state: RwLock::new(ConnectionState::Disconnected),
                state_tx,
                state_rx,
                registry: Mutex::new(Registry::default()),
                outbound_tx,
                outbound_rx: TokioMutex::new(outbound_rx),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    /// Watch channel tracking connection state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_rx.clone()
    }

    /// Attach a subscriber.
    ///
    /// Returns the subscriber id used for [`unsubscribe`]. When the
    /// connection is not ready the subscription is queued and flushed
    /// on the next Ready transition with the same id. Pass an explicit
    /// `subscription_id` only to reuse an id from a previous attach.
    ///
    /// [`unsubscribe`]: WsManager::unsubscribe
    pub fn subscribe<F>(
        &self,
        subscription: Subscription,
        callback: F,
        subscription_id: Option<u64>,
    ) -> WsResult<u64>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner
            .subscribe(subscription, Arc::new(callback), subscription_id)
    }

    /// Detach the subscriber with the given id.
    ///
    /// Sends the unsubscribe control message when the last subscriber
    /// for the identifier detaches. Returns whether a removal occurred.
    pub fn unsubscribe(
        &self,
        subscription: &Subscription,
        subscription_id: u64,
    ) -> WsResult<bool> {
        self.inner.unsubscribe(subscription, subscription_id)
    }

    /// Request cooperative shutdown: the connection task sends a close
    /// frame, stops the heartbeat and exits instead of reconnecting.
    pub fn shutdown(&self) {
        info!("websocket shutdown requested");
        self.inner.shutdown.cancel();
    }

    /// Run the connection loop until shutdown.
    ///
    /// Connect failures and dropped connections are logged and retried
    /// after the configured delay; they never surface to subscribers.
    pub async fn run(&self) {
        crate::init_crypto();
        loop {
            if self.inner.shutdown.is_cancelled() {
                self.inner.set_state(ConnectionState::Disconnected);
                return;
            }

            self.inner.set_state(ConnectionState::Connecting);
            info!(url = %self.inner.config.url, "connecting");

            match connect_async_tls_with_config(&self.inner.config.url, None, true, None).await {
                Ok((stream, _response)) => {
                    info!("websocket connected");
                    match self.inner.drive(stream).await {
                        Ok(()) => info!("websocket connection closed"),
                        Err(e) => error!(error = %e, "websocket connection error"),
                    }
                }
                Err(e) => error!(error = %e, "websocket connect failed"),
            }

            self.inner.set_state(ConnectionState::Disconnected);
            if self.inner.shutdown.is_cancelled() {
                return;
            }

            warn!(
                delay_ms = self.inner.config.reconnect_delay.as_millis() as u64,
                "reconnecting after delay"
            );
            tokio::select! {
                () = tokio::time::sleep(self.inner.config.reconnect_delay) => {}
                () = self.inner.shutdown.cancelled() => {
                    self.inner.set_state(ConnectionState::Disconnected);
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager() -> WsManager {
        WsManager::new(WsConfig::new("wss://example.invalid/ws"))
    }

    fn ready_manager() -> WsManager {
        let m = manager();
        m.inner.on_ready();
        m
    }

    async fn next_outbound(m: &WsManager) -> Option<String> {
        m.inner.outbound_rx.lock().await.try_recv().ok()
    }

    fn counter_callback() -> (Arc<AtomicUsize>, impl Fn(&Value) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move |_: &Value| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_subscribe_before_ready_queues() {
        let m = manager();
        let (count, cb) = counter_callback();
        let id = m
            .subscribe(Subscription::L2Book { coin: "BTC".into() }, cb, None)
            .unwrap();

        // Nothing on the wire and nothing dispatched while queued.
        assert!(next_outbound(&m).await.is_none());
        m.inner
            .dispatch(&json!({"channel": "l2Book", "data": {"coin": "BTC"}}).to_string());
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // Ready flushes the queue preserving the original id.
        m.inner.on_ready();
        let wire = next_outbound(&m).await.unwrap();
        assert!(wire.contains(r#""method":"subscribe""#));
        assert!(wire.contains(r#""coin":"BTC""#));

        m.inner
            .dispatch(&json!({"channel": "l2Book", "data": {"coin": "BTC"}}).to_string());
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // The queued id is live for unsubscribe.
        assert!(m
            .unsubscribe(&Subscription::L2Book { coin: "BTC".into() }, id)
            .unwrap());
    }

    #[tokio::test]
    async fn test_case_variants_share_one_feed() {
        let m = ready_manager();
        let (c1, cb1) = counter_callback();
        let (c2, cb2) = counter_callback();

        m.subscribe(Subscription::L2Book { coin: "BTC".into() }, cb1, None)
            .unwrap();
        m.subscribe(Subscription::L2Book { coin: "btc".into() }, cb2, None)
            .unwrap();

        // One subscribe on the wire for both subscribers.
        assert!(next_outbound(&m).await.is_some());
        assert!(next_outbound(&m).await.is_none());

        m.inner
            .dispatch(&json!({"channel": "l2Book", "data": {"coin": "BTC"}}).to_string());
        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert_eq!(c2.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_duplicate_singleton_rejected() {
        let m = ready_manager();
        let (_, cb1) = counter_callback();
        let (_, cb2) = counter_callback();

        m.subscribe(Subscription::UserEvents, cb1, None).unwrap();
        let err = m.subscribe(Subscription::UserEvents, cb2, None).unwrap_err();
        assert!(matches!(err, WsError::DuplicateSingletonSubscription(_)));
    }

    #[tokio::test]
    async fn test_unsubscribe_requires_ready() {
        let m = manager();
        let err = m
            .unsubscribe(&Subscription::AllMids, 0)
            .unwrap_err();
        assert!(matches!(err, WsError::NotConnected));
    }

    #[tokio::test]
    async fn test_unsubscribe_unknown_id_is_false() {
        let m = ready_manager();
        let (_, cb) = counter_callback();
        let id = m
            .subscribe(Subscription::Trades { coin: "ETH".into() }, cb, None)
            .unwrap();
        let _ = next_outbound(&m).await;

        assert!(!m
            .unsubscribe(&Subscription::Trades { coin: "ETH".into() }, id + 1000)
            .unwrap());
        assert!(!m.unsubscribe(&Subscription::AllMids, 0).unwrap());
        // No unsubscribe went out.
        assert!(next_outbound(&m).await.is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe_last_subscriber_sends_wire_message() {
        let m = ready_manager();
        let (_, cb1) = counter_callback();
        let (_, cb2) = counter_callback();
        let sub = Subscription::Trades { coin: "BTC".into() };

        let id1 = m.subscribe(sub.clone(), cb1, None).unwrap();
        let id2 = m.subscribe(sub.clone(), cb2, None).unwrap();
        let _ = next_outbound(&m).await;

        // First detach leaves a subscriber: no wire message.
        assert!(m.unsubscribe(&sub, id1).unwrap());
        assert!(next_outbound(&m).await.is_none());

        // Last detach releases the feed.
        assert!(m.unsubscribe(&sub, id2).unwrap());
        let wire = next_outbound(&m).await.unwrap();
        assert!(wire.contains(r#""method":"unsubscribe""#));
    }

    #[tokio::test]
    async fn test_pong_dropped_silently() {
        let m = ready_manager();
        let (count, cb) = counter_callback();
        m.subscribe(Subscription::AllMids, cb, None).unwrap();

        m.inner.dispatch(&json!({"channel": "pong"}).to_string());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_callback_panic_is_isolated() {
        let m = ready_manager();
        let (count, cb) = counter_callback();

        m.subscribe(Subscription::AllMids, |_: &Value| panic!("boom"), None)
            .unwrap();
        m.subscribe(Subscription::AllMids, cb, None).unwrap();

        m.inner
            .dispatch(&json!({"channel": "allMids", "data": {"mids": {}}}).to_string());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reconnect_restores_subscriptions() {
        let m = ready_manager();
        let (_, cb) = counter_callback();
        let sub = Subscription::Candle { coin: "BTC".into(), interval: "1m".into() };
        let id = m.subscribe(sub.clone(), cb, None).unwrap();
        let _ = next_outbound(&m).await;

        // Connection dropped, then a new one comes up.
        m.inner.set_state(ConnectionState::Disconnected);
        m.inner.on_ready();

        let wire = next_outbound(&m).await.unwrap();
        assert!(wire.contains(r#""method":"subscribe""#));
        assert!(wire.contains(r#""interval":"1m""#));
        // Exactly one subscribe per registered identifier, no duplicates.
        assert!(next_outbound(&m).await.is_none());

        // Ids survive the reconnect.
        assert!(m.unsubscribe(&sub, id).unwrap());
    }

    #[tokio::test]
    async fn test_queue_flush_is_fifo() {
        let m = manager();
        let order = Arc::new(Mutex::new(Vec::new()));

        for coin in ["AAA", "BBB", "CCC"] {
            let order = Arc::clone(&order);
            let coin_owned = coin.to_string();
            m.subscribe(
                Subscription::Trades { coin: coin.into() },
                move |_: &Value| order.lock().push(coin_owned.clone()),
                None,
            )
            .unwrap();
        }
        m.inner.on_ready();

        // Subscribe messages went out in registration order.
        let mut sent = Vec::new();
        while let Some(wire) = next_outbound(&m).await {
            sent.push(wire);
        }
        assert_eq!(sent.len(), 3);
        assert!(sent[0].contains("AAA"));
        assert!(sent[1].contains("BBB"));
        assert!(sent[2].contains("CCC"));
    }

    #[tokio::test]
    async fn test_queued_duplicate_singleton_dropped_on_flush() {
        let m = manager();
        let (c1, cb1) = counter_callback();
        let (c2, cb2) = counter_callback();

        m.subscribe(Subscription::OrderUpdates, cb1, None).unwrap();
        m.subscribe(Subscription::OrderUpdates, cb2, None).unwrap();
        m.inner.on_ready();

        m.inner
            .dispatch(&json!({"channel": "orderUpdates", "data": []}).to_string());
        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert_eq!(c2.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_user_channel_routes_to_user_events() {
        let m = ready_manager();
        let (count, cb) = counter_callback();
        m.subscribe(Subscription::UserEvents, cb, None).unwrap();

        m.inner
            .dispatch(&json!({"channel": "user", "data": {"fills": []}}).to_string());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_state_watch_observes_transitions() {
        let m = manager();
        let rx = m.watch_state();
        assert_eq!(*rx.borrow(), ConnectionState::Disconnected);

        m.inner.on_ready();
        assert_eq!(*rx.borrow(), ConnectionState::Ready);
        assert_eq!(m.state(), ConnectionState::Ready);
    }
}
