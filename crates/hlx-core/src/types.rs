//! Order domain types and client order identifiers.

use crate::error::{CoreError, Result};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Time-in-force for limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tif {
    /// Good-til-cancelled.
    #[serde(rename = "Gtc")]
    Gtc,
    /// Immediate-or-cancel.
    #[serde(rename = "Ioc")]
    Ioc,
    /// Add-liquidity-only.
    #[serde(rename = "Alo")]
    Alo,
}

impl fmt::Display for Tif {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gtc => write!(f, "Gtc"),
            Self::Ioc => write!(f, "Ioc"),
            Self::Alo => write!(f, "Alo"),
        }
    }
}

impl std::str::FromStr for Tif {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Gtc" => Ok(Self::Gtc),
            "Ioc" => Ok(Self::Ioc),
            "Alo" => Ok(Self::Alo),
            other => Err(CoreError::InvalidOrderType(other.to_string())),
        }
    }
}

/// Take-profit or stop-loss marker for trigger orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TpSl {
    Tp,
    Sl,
}

/// Order type.
///
/// A sum type rather than a loosely-typed object so the codec's match is
/// exhaustive: adding a channel kind without wire encoding is a compile
/// error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderType {
    /// Resting or immediate limit order.
    Limit { tif: Tif },
    /// Conditional order; `trigger_px` is re-encoded through the wire
    /// encoder before signing.
    Trigger {
        trigger_px: f64,
        is_market: bool,
        tpsl: TpSl,
    },
}

/// A caller's order request. Immutable once constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    /// Symbol, e.g. "BTC" or "PURR/USDC".
    pub coin: String,
    pub is_buy: bool,
    pub sz: f64,
    pub limit_px: f64,
    pub order_type: OrderType,
    pub reduce_only: bool,
    /// Client-supplied order id for idempotent tracking.
    pub cloid: Option<Cloid>,
}

/// Builder fee descriptor attached to an order action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuilderInfo {
    /// Builder address. Lowercased before signing; the remote protocol
    /// is case-sensitive on this field.
    #[serde(rename = "b")]
    pub address: String,
    /// Fee in tenths of a basis point.
    #[serde(rename = "f")]
    pub fee_bps: u64,
}

/// Client order id: a 16-byte value whose canonical textual form is
/// `0x` followed by 32 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cloid([u8; 16]);

impl Cloid {
    /// Build from an integer, zero-padded big-endian.
    pub fn from_int(value: u128) -> Self {
        Self(value.to_be_bytes())
    }

    /// Parse the canonical hex form. Fails unless the string starts with
    /// `0x` and decodes to exactly 16 bytes.
    pub fn from_hex(raw: &str) -> Result<Self> {
        let Some(hex_part) = raw.strip_prefix("0x") else {
            return Err(CoreError::InvalidCloid(format!("{raw}: missing 0x prefix")));
        };
        let bytes = hex::decode(hex_part)
            .map_err(|_| CoreError::InvalidCloid(format!("{raw}: not a hex string")))?;
        let bytes: [u8; 16] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidCloid(format!("{raw}: not 16 bytes")))?;
        Ok(Self(bytes))
    }

    /// Generate a random id (uuid v4 bytes).
    pub fn random() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    /// Canonical wire form.
    pub fn to_raw(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Cloid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_raw())
    }
}

impl Serialize for Cloid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_raw())
    }
}

impl<'de> Deserialize<'de> for Cloid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Cloid::from_hex(&raw).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cloid_from_int_zero_pads() {
        let cloid = Cloid::from_int(255);
        assert_eq!(cloid.to_raw(), "0x000000000000000000000000000000ff");
    }

    #[test]
    fn test_cloid_from_hex_round_trip() {
        let raw = "0x0de3e244a8f44fc28a6b7bc852d66d19";
        let cloid = Cloid::from_hex(raw).unwrap();
        assert_eq!(cloid.to_raw(), raw);
    }

    #[test]
    fn test_cloid_rejects_non_hex() {
        assert!(matches!(
            Cloid::from_hex("not-hex"),
            Err(CoreError::InvalidCloid(_))
        ));
    }

    #[test]
    fn test_cloid_rejects_wrong_length() {
        assert!(matches!(
            Cloid::from_hex("0xff"),
            Err(CoreError::InvalidCloid(_))
        ));
    }

    #[test]
    fn test_cloid_random_unique() {
        assert_ne!(Cloid::random(), Cloid::random());
    }

    #[test]
    fn test_cloid_serializes_as_string() {
        let cloid = Cloid::from_int(1);
        let json = serde_json::to_string(&cloid).unwrap();
        assert_eq!(json, "\"0x00000000000000000000000000000001\"");
    }

    #[test]
    fn test_tif_wire_names() {
        assert_eq!(serde_json::to_string(&Tif::Gtc).unwrap(), "\"Gtc\"");
        assert_eq!(serde_json::to_string(&TpSl::Tp).unwrap(), "\"tp\"");
    }

    #[test]
    fn test_tif_parse() {
        assert_eq!("Ioc".parse::<Tif>().unwrap(), Tif::Ioc);
        assert!(matches!(
            "ioc".parse::<Tif>(),
            Err(CoreError::InvalidOrderType(_))
        ));
    }
}
