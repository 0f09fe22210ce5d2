//! Subscription identity resolution.
//!
//! Every subscription and every inbound push message maps to a string
//! identifier; the multiplexer keys its registry on these. Coin and
//! user discriminators are lowercased so "BTC" and "btc" collapse into
//! one feed; candle intervals are part of the identity and pass through
//! unmodified ("1m" and "1M" are different feeds).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A subscription request, serialized verbatim into the
/// `{"method":"subscribe","subscription":…}` control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Subscription {
    AllMids,
    L2Book { coin: String },
    Trades { coin: String },
    UserEvents,
    UserFills { user: String },
    Candle { coin: String, interval: String },
    OrderUpdates,
    UserFundings { user: String },
    UserNonFundingLedgerUpdates { user: String },
}

impl Subscription {
    /// Registry identifier for this subscription.
    pub fn identifier(&self) -> String {
        match self {
            Subscription::AllMids => "allMids".to_string(),
            Subscription::L2Book { coin } => format!("l2Book:{}", coin.to_lowercase()),
            Subscription::Trades { coin } => format!("trades:{}", coin.to_lowercase()),
            Subscription::UserEvents => "userEvents".to_string(),
            Subscription::UserFills { user } => format!("userFills:{}", user.to_lowercase()),
            Subscription::Candle { coin, interval } => {
                format!("candle:{},{}", coin.to_lowercase(), interval)
            }
            Subscription::OrderUpdates => "orderUpdates".to_string(),
            Subscription::UserFundings { user } => {
                format!("userFundings:{}", user.to_lowercase())
            }
            Subscription::UserNonFundingLedgerUpdates { user } => {
                format!("userNonFundingLedgerUpdates:{}", user.to_lowercase())
            }
        }
    }

    /// Whether this identifier admits at most one subscriber.
    pub fn is_singleton(&self) -> bool {
        matches!(
            self,
            Subscription::UserEvents | Subscription::OrderUpdates
        )
    }
}

/// Identifier used for the heartbeat reply; recognized and dropped by
/// the multiplexer.
pub const PONG_IDENTIFIER: &str = "pong";

/// Resolve an inbound push message to its registry identifier.
///
/// Returns `None` for unrecognized channels and for trade batches with
/// no entries (an empty batch names no coin, so it routes nowhere).
pub fn message_identifier(msg: &Value) -> Option<String> {
    let channel = msg.get("channel")?.as_str()?;
    let data = msg.get("data");

    match channel {
        "pong" => Some(PONG_IDENTIFIER.to_string()),
        "allMids" => Some("allMids".to_string()),
        // The push channel for user events is "user".
        "user" => Some("userEvents".to_string()),
        "orderUpdates" => Some("orderUpdates".to_string()),
        "l2Book" => {
            let coin = data?.get("coin")?.as_str()?;
            Some(format!("l2Book:{}", coin.to_lowercase()))
        }
        "trades" => {
            let trades = data?.as_array()?;
            let coin = trades.first()?.get("coin")?.as_str()?;
            Some(format!("trades:{}", coin.to_lowercase()))
        }
        "userFills" => {
            let user = data?.get("user")?.as_str()?;
            Some(format!("userFills:{}", user.to_lowercase()))
        }
        "candle" => {
            let candle = data?;
            let coin = candle.get("s")?.as_str()?;
            let interval = candle.get("i")?.as_str()?;
            Some(format!("candle:{},{}", coin.to_lowercase(), interval))
        }
        "userFundings" => {
            let user = data?.get("user")?.as_str()?;
            Some(format!("userFundings:{}", user.to_lowercase()))
        }
        "userNonFundingLedgerUpdates" => {
            let user = data?.get("user")?.as_str()?;
            Some(format!(
                "userNonFundingLedgerUpdates:{}",
                user.to_lowercase()
            ))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identifier_lowercases_coin() {
        let a = Subscription::L2Book { coin: "BTC".into() };
        let b = Subscription::L2Book { coin: "btc".into() };
        assert_eq!(a.identifier(), b.identifier());
        assert_eq!(a.identifier(), "l2Book:btc");
    }

    #[test]
    fn test_candle_interval_is_case_sensitive() {
        let a = Subscription::Candle { coin: "ETH".into(), interval: "1m".into() };
        let b = Subscription::Candle { coin: "ETH".into(), interval: "1M".into() };
        assert_ne!(a.identifier(), b.identifier());
        assert_eq!(a.identifier(), "candle:eth,1m");
    }

    #[test]
    fn test_singletons() {
        assert!(Subscription::UserEvents.is_singleton());
        assert!(Subscription::OrderUpdates.is_singleton());
        assert!(!Subscription::AllMids.is_singleton());
        assert!(!Subscription::Trades { coin: "BTC".into() }.is_singleton());
    }

    #[test]
    fn test_subscription_wire_form() {
        let sub = Subscription::Candle { coin: "BTC".into(), interval: "15m".into() };
        assert_eq!(
            serde_json::to_value(&sub).unwrap(),
            json!({"type": "candle", "coin": "BTC", "interval": "15m"})
        );
        assert_eq!(
            serde_json::to_value(Subscription::AllMids).unwrap(),
            json!({"type": "allMids"})
        );
    }

    #[test]
    fn test_message_identifier_user_channel() {
        let msg = json!({"channel": "user", "data": {"fills": []}});
        assert_eq!(message_identifier(&msg).as_deref(), Some("userEvents"));
    }

    #[test]
    fn test_message_identifier_l2_book() {
        let msg = json!({"channel": "l2Book", "data": {"coin": "BTC", "levels": []}});
        assert_eq!(message_identifier(&msg).as_deref(), Some("l2Book:btc"));
    }

    #[test]
    fn test_message_identifier_trades_takes_first_coin() {
        let msg = json!({"channel": "trades", "data": [{"coin": "ETH", "px": "1800.5"}]});
        assert_eq!(message_identifier(&msg).as_deref(), Some("trades:eth"));
    }

    #[test]
    fn test_message_identifier_empty_trades_is_none() {
        let msg = json!({"channel": "trades", "data": []});
        assert_eq!(message_identifier(&msg), None);
    }

    #[test]
    fn test_message_identifier_candle() {
        let msg = json!({"channel": "candle", "data": {"s": "BTC", "i": "1m", "o": "1"}});
        assert_eq!(message_identifier(&msg).as_deref(), Some("candle:btc,1m"));
    }

    #[test]
    fn test_message_identifier_pong() {
        let msg = json!({"channel": "pong"});
        assert_eq!(message_identifier(&msg).as_deref(), Some(PONG_IDENTIFIER));
    }

    #[test]
    fn test_message_identifier_unknown_channel() {
        let msg = json!({"channel": "somethingElse", "data": {}});
        assert_eq!(message_identifier(&msg), None);
    }

    #[test]
    fn test_message_identifier_missing_channel() {
        assert_eq!(message_identifier(&json!({"data": {}})), None);
    }
}
