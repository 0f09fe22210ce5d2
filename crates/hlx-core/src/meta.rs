//! Asset-metadata resolver.
//!
//! Maps trading symbols to the asset indices the wire protocol expects.
//! Built once from an externally fetched (or injected) metadata snapshot
//! and passed by reference to the codec; no global mutable state.

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Offset added to spot universe indices so spot and perp markets sharing
/// a symbol namespace stay distinguishable on the wire.
pub const SPOT_ASSET_OFFSET: u32 = 10_000;

/// One perpetual universe entry from the `meta` snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetInfo {
    pub name: String,
    #[serde(rename = "szDecimals", default)]
    pub sz_decimals: u32,
}

/// Perpetual metadata snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub universe: Vec<AssetInfo>,
}

/// One spot universe entry from the `spotMeta` snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotAssetInfo {
    /// Spot coin name as the protocol knows it (e.g. "@1" or "PURR/USDC").
    pub name: String,
    /// Base and quote token indices into `SpotMeta::tokens`.
    pub tokens: [usize; 2],
    pub index: u32,
}

/// Token entry from the `spotMeta` snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
}

/// Spot metadata snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotMeta {
    pub universe: Vec<SpotAssetInfo>,
    pub tokens: Vec<TokenInfo>,
}

/// Symbol to asset-index and symbol to canonical-coin mappings.
#[derive(Debug, Clone, Default)]
pub struct AssetResolver {
    coin_to_asset: HashMap<String, u32>,
    name_to_coin: HashMap<String, String>,
}

impl AssetResolver {
    /// Build the mappings from metadata snapshots.
    pub fn from_meta(meta: &Meta, spot_meta: Option<&SpotMeta>) -> Self {
        let mut resolver = Self::default();
        resolver.apply_meta(meta);
        if let Some(spot) = spot_meta {
            resolver.apply_spot_meta(spot);
        }
        resolver
    }

    /// Register perpetual assets: symbol maps to its universe index.
    pub fn apply_meta(&mut self, meta: &Meta) {
        for (index, asset) in meta.universe.iter().enumerate() {
            self.coin_to_asset.insert(asset.name.clone(), index as u32);
            self.name_to_coin.insert(asset.name.clone(), asset.name.clone());
        }
    }

    /// Register spot assets: symbol maps to `SPOT_ASSET_OFFSET + index`,
    /// and the "BASE/QUOTE" display name maps to the spot coin name.
    pub fn apply_spot_meta(&mut self, spot_meta: &SpotMeta) {
        for spot in &spot_meta.universe {
            self.coin_to_asset
                .insert(spot.name.clone(), spot.index + SPOT_ASSET_OFFSET);
            self.name_to_coin.insert(spot.name.clone(), spot.name.clone());

            let [base, quote] = spot.tokens;
            if let (Some(base), Some(quote)) =
                (spot_meta.tokens.get(base), spot_meta.tokens.get(quote))
            {
                let pair = format!("{}/{}", base.name, quote.name);
                self.name_to_coin.entry(pair).or_insert_with(|| spot.name.clone());
            }
        }
    }

    /// Resolve a symbol to its wire asset index.
    pub fn name_to_asset(&self, name: &str) -> Result<u32> {
        let coin = self.name_to_coin(name)?;
        self.coin_to_asset
            .get(coin)
            .copied()
            .ok_or_else(|| CoreError::UnknownSymbol(name.to_string()))
    }

    /// Resolve a symbol to the canonical coin name the protocol expects.
    pub fn name_to_coin(&self, name: &str) -> Result<&str> {
        self.name_to_coin
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| CoreError::UnknownSymbol(name.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.coin_to_asset.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meta() -> Meta {
        Meta {
            universe: vec![
                AssetInfo { name: "BTC".into(), sz_decimals: 5 },
                AssetInfo { name: "ETH".into(), sz_decimals: 4 },
            ],
        }
    }

    fn sample_spot_meta() -> SpotMeta {
        SpotMeta {
            universe: vec![SpotAssetInfo {
                name: "@1".into(),
                tokens: [0, 1],
                index: 1,
            }],
            tokens: vec![
                TokenInfo { name: "PURR".into() },
                TokenInfo { name: "USDC".into() },
            ],
        }
    }

    #[test]
    fn test_perp_assets_use_universe_index() {
        let resolver = AssetResolver::from_meta(&sample_meta(), None);
        assert_eq!(resolver.name_to_asset("BTC").unwrap(), 0);
        assert_eq!(resolver.name_to_asset("ETH").unwrap(), 1);
    }

    #[test]
    fn test_spot_assets_are_offset() {
        let resolver = AssetResolver::from_meta(&sample_meta(), Some(&sample_spot_meta()));
        assert_eq!(resolver.name_to_asset("@1").unwrap(), SPOT_ASSET_OFFSET + 1);
    }

    #[test]
    fn test_spot_pair_name_maps_to_coin() {
        let resolver = AssetResolver::from_meta(&sample_meta(), Some(&sample_spot_meta()));
        assert_eq!(resolver.name_to_coin("PURR/USDC").unwrap(), "@1");
        assert_eq!(
            resolver.name_to_asset("PURR/USDC").unwrap(),
            SPOT_ASSET_OFFSET + 1
        );
    }

    #[test]
    fn test_unknown_symbol_errors() {
        let resolver = AssetResolver::from_meta(&sample_meta(), None);
        assert!(matches!(
            resolver.name_to_asset("DOGE"),
            Err(CoreError::UnknownSymbol(_))
        ));
    }

    #[test]
    fn test_snapshot_deserializes() {
        let json = r#"{"universe":[{"name":"BTC","szDecimals":5}]}"#;
        let meta: Meta = serde_json::from_str(json).unwrap();
        assert_eq!(meta.universe[0].name, "BTC");
    }
}
