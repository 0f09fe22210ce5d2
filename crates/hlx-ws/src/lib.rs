//! Realtime subscription multiplexer.
//!
//! Maintains one persistent websocket and fans inbound push messages
//! out to registered subscribers:
//! - identifier-keyed registry ("BTC" and "btc" share one feed)
//! - subscriptions survive reconnects; subscriber ids are stable
//! - application-level heartbeat (50 s ping, pong dropped silently)
//! - fixed-delay reconnection with cooperative shutdown

pub mod error;
pub mod manager;
pub mod subscription;

pub use error::{WsError, WsResult};
pub use manager::{Callback, ConnectionState, WsConfig, WsManager};
pub use subscription::{message_identifier, Subscription, PONG_IDENTIFIER};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
