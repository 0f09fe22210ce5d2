//! Canonical wire representation of order actions.
//!
//! The typed-data digest is computed over the msgpack encoding of these
//! structs, so field names, field order and optional-key omission must
//! match the remote hasher exactly. `Option<T>` fields use
//! `skip_serializing_if`: the remote side omits missing keys rather than
//! encoding nil.

use hlx_core::{float_to_wire, BuilderInfo, OrderRequest, OrderType, Result, Tif, TpSl};
use serde::Serialize;

/// On-wire order record. Derived deterministically from an
/// `OrderRequest` plus its asset index; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderWire {
    /// Asset index.
    #[serde(rename = "a")]
    pub asset: u32,

    #[serde(rename = "b")]
    pub is_buy: bool,

    /// Limit price, canonical decimal string.
    #[serde(rename = "p")]
    pub limit_px: String,

    /// Size, canonical decimal string.
    #[serde(rename = "s")]
    pub sz: String,

    #[serde(rename = "r")]
    pub reduce_only: bool,

    #[serde(rename = "t")]
    pub order_type: OrderTypeWire,

    /// Client order id, canonical hex form.
    #[serde(rename = "c", skip_serializing_if = "Option::is_none")]
    pub cloid: Option<String>,
}

/// Order type wire variant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OrderTypeWire {
    Limit { limit: LimitWire },
    Trigger { trigger: TriggerWire },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LimitWire {
    pub tif: Tif,
}

/// Field order matters: isMarket, triggerPx, tpsl is what the remote
/// hasher expects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggerWire {
    #[serde(rename = "isMarket")]
    pub is_market: bool,

    #[serde(rename = "triggerPx")]
    pub trigger_px: String,

    pub tpsl: TpSl,
}

/// Action envelope of kind "order".
///
/// Field order is fixed (type, orders, grouping, builder); it is part of
/// the signed content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderAction {
    #[serde(rename = "type")]
    pub kind: String,

    pub orders: Vec<OrderWire>,

    /// Conditional-order grouping. "na" = no conditional grouping.
    pub grouping: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub builder: Option<BuilderInfo>,
}

/// Encode an order type into its wire variant. A trigger price is
/// re-encoded through the numeric wire encoder; precision failures
/// propagate.
pub fn order_type_to_wire(order_type: &OrderType) -> Result<OrderTypeWire> {
    match order_type {
        OrderType::Limit { tif } => Ok(OrderTypeWire::Limit {
            limit: LimitWire { tif: *tif },
        }),
        OrderType::Trigger { trigger_px, is_market, tpsl } => Ok(OrderTypeWire::Trigger {
            trigger: TriggerWire {
                is_market: *is_market,
                trigger_px: float_to_wire(*trigger_px)?,
                tpsl: *tpsl,
            },
        }),
    }
}

/// Build the wire record for one order.
///
/// The asset index comes from the caller's metadata resolver; price and
/// size go through the lossless wire encoder and any precision failure
/// is returned before the order can be signed.
pub fn order_request_to_order_wire(order: &OrderRequest, asset: u32) -> Result<OrderWire> {
    Ok(OrderWire {
        asset,
        is_buy: order.is_buy,
        limit_px: float_to_wire(order.limit_px)?,
        sz: float_to_wire(order.sz)?,
        reduce_only: order.reduce_only,
        order_type: order_type_to_wire(&order.order_type)?,
        cloid: order.cloid.as_ref().map(|c| c.to_raw()),
    })
}

/// Wrap an ordered sequence of order wires into an "order" action.
///
/// The builder address is lowercased here, before signing; the remote
/// protocol is case-sensitive on this field for signature purposes.
pub fn order_wires_to_order_action(
    order_wires: Vec<OrderWire>,
    builder: Option<BuilderInfo>,
) -> OrderAction {
    OrderAction {
        kind: "order".to_string(),
        orders: order_wires,
        grouping: "na".to_string(),
        builder: builder.map(|b| BuilderInfo {
            address: b.address.to_lowercase(),
            fee_bps: b.fee_bps,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlx_core::{Cloid, CoreError};

    fn limit_order(px: f64, sz: f64) -> OrderRequest {
        OrderRequest {
            coin: "BTC".into(),
            is_buy: true,
            sz,
            limit_px: px,
            order_type: OrderType::Limit { tif: Tif::Gtc },
            reduce_only: false,
            cloid: None,
        }
    }

    #[test]
    fn test_order_wire_from_request() {
        let wire = order_request_to_order_wire(&limit_order(105.0, 0.2), 3).unwrap();
        assert_eq!(wire.asset, 3);
        assert!(wire.is_buy);
        assert_eq!(wire.limit_px, "105");
        assert_eq!(wire.sz, "0.2");
        assert!(wire.cloid.is_none());
    }

    #[test]
    fn test_order_wire_includes_cloid() {
        let mut order = limit_order(1.0, 1.0);
        order.cloid = Some(Cloid::from_int(255));
        let wire = order_request_to_order_wire(&order, 0).unwrap();
        assert_eq!(
            wire.cloid.as_deref(),
            Some("0x000000000000000000000000000000ff")
        );
    }

    #[test]
    fn test_order_wire_precision_failure_propagates() {
        let result = order_request_to_order_wire(&limit_order(1.123_456_785, 1.0), 0);
        assert!(matches!(result, Err(CoreError::Precision { .. })));
    }

    #[test]
    fn test_trigger_price_is_reencoded() {
        let order_type = OrderType::Trigger {
            trigger_px: 1800.50,
            is_market: true,
            tpsl: TpSl::Sl,
        };
        let wire = order_type_to_wire(&order_type).unwrap();
        let json = serde_json::to_string(&wire).unwrap();
        assert_eq!(
            json,
            r#"{"trigger":{"isMarket":true,"triggerPx":"1800.5","tpsl":"sl"}}"#
        );
    }

    #[test]
    fn test_limit_wire_serialization() {
        let wire = order_type_to_wire(&OrderType::Limit { tif: Tif::Ioc }).unwrap();
        assert_eq!(
            serde_json::to_string(&wire).unwrap(),
            r#"{"limit":{"tif":"Ioc"}}"#
        );
    }

    #[test]
    fn test_order_action_grouping_and_field_order() {
        let wire = order_request_to_order_wire(&limit_order(105.0, 0.2), 0).unwrap();
        let action = order_wires_to_order_action(vec![wire], None);
        assert_eq!(action.grouping, "na");

        let json = serde_json::to_string(&action).unwrap();
        assert!(json.starts_with(r#"{"type":"order""#));
        assert!(!json.contains("builder"));
    }

    #[test]
    fn test_builder_address_lowercased() {
        let wire = order_request_to_order_wire(&limit_order(1.0, 1.0), 0).unwrap();
        let builder = BuilderInfo {
            address: "0xABCDef0123456789abcdef0123456789ABCDEF01".into(),
            fee_bps: 10,
        };
        let action = order_wires_to_order_action(vec![wire], Some(builder));
        assert_eq!(
            action.builder.unwrap().address,
            "0xabcdef0123456789abcdef0123456789abcdef01"
        );
    }
}
