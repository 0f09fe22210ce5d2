//! Typed-data digests and signatures for every action kind.
//!
//! Two families of actions exist:
//! - L1 actions (orders, cancels, multisig wrappers): the action is
//!   msgpack-hashed together with the nonce and optional vault address,
//!   and the resulting hash is signed as the `connectionId` of a phantom
//!   `Agent` struct.
//! - User-signed actions (transfers, approvals): the payload itself is
//!   the typed-data struct.
//!
//! Every kind carries its own domain name; version is always "1" and the
//! chain id follows the configured network.

use crate::error::{SigningError, SigningResult};
use alloy::primitives::{keccak256, Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy::sol;
use alloy::sol_types::{Eip712Domain, SolStruct};
use hlx_core::Network;
use serde::{Deserialize, Serialize};

sol! {
    /// Phantom struct whose `connectionId` carries the action hash.
    #[derive(Debug)]
    struct Agent {
        string source;
        bytes32 connectionId;
    }

    #[derive(Debug)]
    struct UsdTransfer {
        string destination;
        string amount;
        uint64 time;
    }

    #[derive(Debug)]
    struct SpotTransfer {
        string destination;
        string token;
        string amount;
        uint64 time;
    }

    #[derive(Debug)]
    struct UsdClassTransfer {
        string amount;
        bool toPerp;
        uint64 nonce;
    }

    #[derive(Debug)]
    struct WithdrawFromBridge {
        string destination;
        string amount;
        uint64 time;
    }

    #[derive(Debug)]
    struct ApproveAgent {
        address agentAddress;
        string agentName;
        uint64 nonce;
    }

    #[derive(Debug)]
    struct ApproveBuilderFee {
        string maxFeeRate;
        address builder;
        uint64 nonce;
    }

    #[derive(Debug)]
    struct ConvertToMultiSigUser {
        string signers;
        uint64 nonce;
    }
}

/// An (r, s, v) signature in the JSON form the remote endpoint expects:
/// 0x-prefixed 32-byte hex components and v as 27/28.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub r: String,
    pub s: String,
    pub v: u64,
}

impl From<alloy::primitives::PrimitiveSignature> for Signature {
    fn from(sig: alloy::primitives::PrimitiveSignature) -> Self {
        Self {
            r: format!("0x{}", hex::encode(sig.r().to_be_bytes::<32>())),
            s: format!("0x{}", hex::encode(sig.s().to_be_bytes::<32>())),
            v: if sig.v() { 28 } else { 27 },
        }
    }
}

/// Compute the hash covering an L1 action.
///
/// `keccak256(msgpack_named(action) || nonce_be8 || vault_tag)` where the
/// vault tag is `0x00` when absent and `0x01` plus the 20 address bytes
/// when present.
pub fn action_hash<A: Serialize>(
    action: &A,
    vault_address: Option<Address>,
    nonce: u64,
) -> SigningResult<B256> {
    let mut data = rmp_serde::to_vec_named(action)
        .map_err(|e| SigningError::Serialization(e.to_string()))?;
    data.extend_from_slice(&nonce.to_be_bytes());
    match vault_address {
        None => data.push(0x00),
        Some(addr) => {
            data.push(0x01);
            data.extend_from_slice(addr.as_slice());
        }
    }
    Ok(keccak256(&data))
}

fn signing_domain(name: &str, network: Network) -> Eip712Domain {
    Eip712Domain::new(
        Some(name.to_string().into()),
        Some("1".into()),
        Some(U256::from(network.chain_id())),
        Some(Address::ZERO),
        None,
    )
}

fn agent_source(network: Network) -> &'static str {
    if network.is_mainnet() {
        "a"
    } else {
        "b"
    }
}

fn sign_typed<T: SolStruct>(
    signer: &PrivateKeySigner,
    payload: &T,
    domain_name: &str,
    network: Network,
) -> SigningResult<Signature> {
    let domain = signing_domain(domain_name, network);
    let signing_hash = payload.eip712_signing_hash(&domain);
    let sig = signer.sign_hash_sync(&signing_hash)?;
    Ok(sig.into())
}

fn sign_agent_hash(
    signer: &PrivateKeySigner,
    connection_id: B256,
    domain_name: &str,
    network: Network,
) -> SigningResult<Signature> {
    let agent = Agent {
        source: agent_source(network).to_string(),
        connectionId: connection_id,
    };
    sign_typed(signer, &agent, domain_name, network)
}

/// Sign an L1 action (orders, cancels, leverage changes, ...).
///
/// The nonce must be the same millisecond timestamp submitted alongside
/// the action; the remote system enforces per-key nonce ordering.
pub fn sign_l1_action<A: Serialize>(
    signer: &PrivateKeySigner,
    action: &A,
    vault_address: Option<Address>,
    nonce: u64,
    network: Network,
) -> SigningResult<Signature> {
    let connection_id = action_hash(action, vault_address, nonce)?;
    sign_agent_hash(signer, connection_id, "Exchange", network)
}

/// Sign a USD transfer.
pub fn sign_usd_transfer_action(
    signer: &PrivateKeySigner,
    action: &UsdTransfer,
    network: Network,
) -> SigningResult<Signature> {
    sign_typed(signer, action, "UsdTransfer", network)
}

/// Sign a spot token transfer.
pub fn sign_spot_transfer_action(
    signer: &PrivateKeySigner,
    action: &SpotTransfer,
    network: Network,
) -> SigningResult<Signature> {
    sign_typed(signer, action, "SpotTransfer", network)
}

/// Sign a transfer between the spot and perp balance classes.
pub fn sign_usd_class_transfer_action(
    signer: &PrivateKeySigner,
    action: &UsdClassTransfer,
    network: Network,
) -> SigningResult<Signature> {
    sign_typed(signer, action, "UsdClassTransfer", network)
}

/// Sign a withdrawal through the bridge.
pub fn sign_withdraw_from_bridge_action(
    signer: &PrivateKeySigner,
    action: &WithdrawFromBridge,
    network: Network,
) -> SigningResult<Signature> {
    sign_typed(signer, action, "WithdrawFromBridge", network)
}

/// Sign an agent-wallet approval.
pub fn sign_agent(
    signer: &PrivateKeySigner,
    action: &ApproveAgent,
    network: Network,
) -> SigningResult<Signature> {
    sign_typed(signer, action, "ApproveAgent", network)
}

/// Sign a builder-fee approval.
pub fn sign_approve_builder_fee(
    signer: &PrivateKeySigner,
    action: &ApproveBuilderFee,
    network: Network,
) -> SigningResult<Signature> {
    sign_typed(
        signer,
        action,
        "HyperliquidTransaction:ApproveBuilderFee",
        network,
    )
}

/// Sign a conversion of the account into a multisig user.
pub fn sign_convert_to_multi_sig_user_action(
    signer: &PrivateKeySigner,
    action: &ConvertToMultiSigUser,
    network: Network,
) -> SigningResult<Signature> {
    sign_typed(signer, action, "ConvertToMultiSigUser", network)
}

/// Sign a multisig-wrapped action.
///
/// The nonce is caller-supplied: co-signers coordinate it out-of-band,
/// so this is the one kind that never stamps its own timestamp.
pub fn sign_multi_sig_action<A: Serialize>(
    signer: &PrivateKeySigner,
    action: &A,
    network: Network,
    vault_address: Option<Address>,
    nonce: u64,
) -> SigningResult<Signature> {
    let connection_id = action_hash(action, vault_address, nonce)?;
    sign_agent_hash(signer, connection_id, "MultiSig", network)
}
