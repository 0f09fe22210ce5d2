//! HTTP clients for the info and exchange endpoints.
//!
//! [`InfoClient`] covers read-only queries and websocket subscription
//! wiring; [`ExchangeClient`] signs and submits actions. Both are thin
//! forwarding layers: all validation and signing happens synchronously
//! in `hlx-core`/`hlx-signing` before a request leaves the process.

pub mod error;
pub mod exchange;
pub mod http;
pub mod info;

pub use error::{ClientError, ClientResult};
pub use exchange::{ExchangeClient, DEFAULT_SLIPPAGE};
pub use http::HttpClient;
pub use info::InfoClient;
