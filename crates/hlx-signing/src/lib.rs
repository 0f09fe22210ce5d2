//! Action codec and request-signing pipeline.
//!
//! Turns caller order requests into the canonical wire representation,
//! computes the typed-data digest for each action kind and produces the
//! (r, s, v) signature the remote settlement system verifies. The whole
//! pipeline is pure and synchronous: a signature is a deterministic
//! function of its inputs, and every precision or key failure surfaces
//! before anything touches the network.

pub mod error;
pub mod key;
pub mod nonce;
pub mod request;
pub mod sign;
pub mod wire;

pub use error::{SigningError, SigningResult};
pub use key::{load_signer, load_signer_checked};
pub use nonce::{timestamp_ms, Clock, NonceManager, SystemClock};
pub use request::SignedRequest;
pub use sign::{
    action_hash, sign_agent, sign_approve_builder_fee, sign_convert_to_multi_sig_user_action,
    sign_l1_action, sign_multi_sig_action, sign_spot_transfer_action,
    sign_usd_class_transfer_action, sign_usd_transfer_action, sign_withdraw_from_bridge_action,
    ApproveAgent, ApproveBuilderFee, ConvertToMultiSigUser, Signature, SpotTransfer,
    UsdClassTransfer, UsdTransfer, WithdrawFromBridge,
};
pub use wire::{
    order_request_to_order_wire, order_type_to_wire, order_wires_to_order_action, LimitWire,
    OrderAction, OrderTypeWire, OrderWire, TriggerWire,
};
