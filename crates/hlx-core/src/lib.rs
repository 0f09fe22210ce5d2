//! Core domain types for the hlx exchange client.
//!
//! This crate provides the fundamental pieces shared by the signing and
//! websocket layers:
//! - `float_to_wire` and friends: lossless fixed-point wire encoding
//! - `Cloid`, `OrderRequest`, `OrderType`: order domain types
//! - `AssetResolver`: symbol to asset-index mapping built from metadata
//! - `Network`: endpoint and chain-id constants

pub mod error;
pub mod float;
pub mod meta;
pub mod network;
pub mod types;

pub use error::{CoreError, Result};
pub use float::{float_to_int, float_to_int_for_hashing, float_to_usd_int, float_to_wire};
pub use meta::{AssetInfo, AssetResolver, Meta, SpotAssetInfo, SpotMeta, TokenInfo,
    SPOT_ASSET_OFFSET};
pub use network::Network;
pub use types::{BuilderInfo, Cloid, OrderRequest, OrderType, Tif, TpSl};
