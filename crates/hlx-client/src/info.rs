//! Info endpoint queries and websocket subscription wiring.

use serde_json::{json, Value};
use tracing::info;

use hlx_core::{AssetResolver, Meta, Network, SpotMeta};
use hlx_ws::{Subscription, WsConfig, WsError, WsManager};

use crate::error::ClientResult;
use crate::http::HttpClient;

/// Read-only client for the `/info` endpoint, with optional websocket
/// subscription support.
pub struct InfoClient {
    http: HttpClient,
    resolver: AssetResolver,
    ws: Option<WsManager>,
}

impl InfoClient {
    /// Connect to a network, fetching both metadata snapshots.
    pub async fn new(network: Network) -> ClientResult<Self> {
        Self::with_snapshots(network, None, None, false).await
    }

    /// Construct with injected metadata snapshots; only missing
    /// snapshots are fetched. With `enable_ws` a websocket manager is
    /// created (the caller drives it via [`WsManager::run`]).
    pub async fn with_snapshots(
        network: Network,
        meta: Option<Meta>,
        spot_meta: Option<SpotMeta>,
        enable_ws: bool,
    ) -> ClientResult<Self> {
        let http = HttpClient::new(network.api_url())?;

        let meta = match meta {
            Some(m) => m,
            None => fetch_meta(&http).await?,
        };
        let spot_meta = match spot_meta {
            Some(m) => m,
            None => fetch_spot_meta(&http).await?,
        };
        let resolver = AssetResolver::from_meta(&meta, Some(&spot_meta));
        info!(
            network = %network,
            "info client initialized"
        );

        let ws = enable_ws.then(|| WsManager::new(WsConfig::new(network.ws_url())));
        Ok(Self { http, resolver, ws })
    }

    pub fn resolver(&self) -> &AssetResolver {
        &self.resolver
    }

    /// Websocket manager, when constructed with `enable_ws`.
    pub fn ws(&self) -> Option<&WsManager> {
        self.ws.as_ref()
    }

    pub async fn meta(&self) -> ClientResult<Meta> {
        fetch_meta(&self.http).await
    }

    pub async fn spot_meta(&self) -> ClientResult<SpotMeta> {
        fetch_spot_meta(&self.http).await
    }

    /// Clearinghouse state (balances, positions) for a user.
    pub async fn user_state(&self, user: &str) -> ClientResult<Value> {
        self.http
            .post("/info", &json!({"type": "clearinghouseState", "user": user}))
            .await
    }

    pub async fn user_fills(&self, user: &str) -> ClientResult<Value> {
        self.http
            .post("/info", &json!({"type": "userFills", "user": user}))
            .await
    }

    pub async fn user_fills_by_time(
        &self,
        user: &str,
        start_time: u64,
        end_time: Option<u64>,
    ) -> ClientResult<Value> {
        let body = with_time_window(
            json!({"type": "userFillsByTime", "user": user}),
            Some(start_time),
            end_time,
        );
        self.http.post("/info", &body).await
    }

    pub async fn meta_and_asset_ctxs(&self) -> ClientResult<Value> {
        self.http
            .post("/info", &json!({"type": "metaAndAssetCtxs"}))
            .await
    }

    pub async fn spot_meta_and_asset_ctxs(&self) -> ClientResult<Value> {
        self.http
            .post("/info", &json!({"type": "spotMetaAndAssetCtxs"}))
            .await
    }

    pub async fn funding_history(
        &self,
        name: &str,
        start_time: u64,
        end_time: Option<u64>,
    ) -> ClientResult<Value> {
        let coin = self.resolver.name_to_coin(name)?;
        let body = with_time_window(
            json!({"type": "fundingHistory", "coin": coin}),
            Some(start_time),
            end_time,
        );
        self.http.post("/info", &body).await
    }

    pub async fn user_funding_history(
        &self,
        user: &str,
        start_time: u64,
        end_time: Option<u64>,
    ) -> ClientResult<Value> {
        let body = with_time_window(
            json!({"type": "userFunding", "user": user}),
            Some(start_time),
            end_time,
        );
        self.http.post("/info", &body).await
    }

    /// Current order book snapshot for a symbol.
    pub async fn l2_snapshot(&self, name: &str) -> ClientResult<Value> {
        let coin = self.resolver.name_to_coin(name)?;
        self.http
            .post("/info", &json!({"type": "l2Book", "coin": coin}))
            .await
    }

    /// Past orders for a user, optionally bounded to a time window.
    pub async fn historical_orders(
        &self,
        user: &str,
        start_time: Option<u64>,
        end_time: Option<u64>,
    ) -> ClientResult<Value> {
        let body = with_time_window(
            json!({"type": "historicalOrders", "user": user}),
            start_time,
            end_time,
        );
        self.http.post("/info", &body).await
    }

    /// Attach a websocket subscriber, canonicalizing display symbols
    /// (e.g. "PURR/USDC") to the coin names the feed uses.
    pub fn subscribe<F>(&self, subscription: Subscription, callback: F) -> ClientResult<u64>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let ws = self.ws.as_ref().ok_or(WsError::NotConnected)?;
        let subscription = self.canonicalize(subscription)?;
        Ok(ws.subscribe(subscription, callback, None)?)
    }

    /// Detach a websocket subscriber.
    pub fn unsubscribe(&self, subscription: Subscription, id: u64) -> ClientResult<bool> {
        let ws = self.ws.as_ref().ok_or(WsError::NotConnected)?;
        let subscription = self.canonicalize(subscription)?;
        Ok(ws.unsubscribe(&subscription, id)?)
    }

    fn canonicalize(&self, subscription: Subscription) -> ClientResult<Subscription> {
        Ok(match subscription {
            Subscription::L2Book { coin } => Subscription::L2Book {
                coin: self.resolver.name_to_coin(&coin)?.to_string(),
            },
            Subscription::Trades { coin } => Subscription::Trades {
                coin: self.resolver.name_to_coin(&coin)?.to_string(),
            },
            Subscription::Candle { coin, interval } => Subscription::Candle {
                coin: self.resolver.name_to_coin(&coin)?.to_string(),
                interval,
            },
            other => other,
        })
    }
}

/// Attach optional `startTime`/`endTime` bounds to a query body.
fn with_time_window(mut body: Value, start_time: Option<u64>, end_time: Option<u64>) -> Value {
    if let Some(start) = start_time {
        body["startTime"] = json!(start);
    }
    if let Some(end) = end_time {
        body["endTime"] = json!(end);
    }
    body
}

async fn fetch_meta(http: &HttpClient) -> ClientResult<Meta> {
    let value = http.post("/info", &json!({"type": "meta"})).await?;
    Ok(serde_json::from_value(value).map_err(|e| {
        hlx_signing::SigningError::Serialization(format!("meta snapshot: {e}"))
    })?)
}

async fn fetch_spot_meta(http: &HttpClient) -> ClientResult<SpotMeta> {
    let value = http.post("/info", &json!({"type": "spotMeta"})).await?;
    Ok(serde_json::from_value(value).map_err(|e| {
        hlx_signing::SigningError::Serialization(format!("spotMeta snapshot: {e}"))
    })?)
}
