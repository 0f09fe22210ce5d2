//! Exchange endpoint client: order submission, transfers, approvals.
//!
//! Every method stamps one nonce, signs the action and posts the signed
//! envelope to `/exchange`. There is no retry policy: a failed action
//! must not be silently resubmitted with a fresh nonce.

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use serde_json::{json, Value};
use tracing::{debug, info};

use hlx_core::{
    AssetResolver, BuilderInfo, Cloid, CoreError, Meta, Network, OrderRequest, OrderType,
    SpotMeta, Tif, SPOT_ASSET_OFFSET,
};
use hlx_signing::{
    order_request_to_order_wire, order_wires_to_order_action, sign_agent,
    sign_approve_builder_fee, sign_convert_to_multi_sig_user_action, sign_l1_action,
    sign_multi_sig_action, sign_spot_transfer_action, sign_usd_class_transfer_action,
    sign_usd_transfer_action, sign_withdraw_from_bridge_action, ApproveAgent, ApproveBuilderFee,
    ConvertToMultiSigUser, NonceManager, OrderAction, Signature, SignedRequest, SigningError,
    SpotTransfer, UsdClassTransfer, UsdTransfer, WithdrawFromBridge,
};

use crate::error::ClientResult;
use crate::http::HttpClient;

/// Default slippage tolerance for market orders (5%).
pub const DEFAULT_SLIPPAGE: f64 = 0.05;

/// Signing client for the `/exchange` endpoint.
pub struct ExchangeClient {
    http: HttpClient,
    signer: PrivateKeySigner,
    network: Network,
    vault_address: Option<Address>,
    resolver: AssetResolver,
    nonces: NonceManager,
}

impl ExchangeClient {
    /// Construct with injected metadata snapshots; only missing
    /// snapshots are fetched.
    pub async fn new(
        signer: PrivateKeySigner,
        network: Network,
        vault_address: Option<Address>,
        meta: Option<Meta>,
        spot_meta: Option<SpotMeta>,
    ) -> ClientResult<Self> {
        let http = HttpClient::new(network.api_url())?;

        let meta = match meta {
            Some(m) => m,
            None => {
                let value = http.post("/info", &json!({"type": "meta"})).await?;
                serde_json::from_value(value)
                    .map_err(|e| SigningError::Serialization(format!("meta snapshot: {e}")))?
            }
        };
        let spot_meta = match spot_meta {
            Some(m) => m,
            None => {
                let value = http.post("/info", &json!({"type": "spotMeta"})).await?;
                serde_json::from_value(value)
                    .map_err(|e| SigningError::Serialization(format!("spotMeta snapshot: {e}")))?
            }
        };
        let resolver = AssetResolver::from_meta(&meta, Some(&spot_meta));
        info!(network = %network, address = %signer.address(), "exchange client initialized");

        Ok(Self {
            http,
            signer,
            network,
            vault_address,
            resolver,
            nonces: NonceManager::with_system_clock(),
        })
    }

    /// Address the client signs with.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Submit one order.
    pub async fn order(
        &self,
        order: OrderRequest,
        builder: Option<BuilderInfo>,
    ) -> ClientResult<Value> {
        self.bulk_orders(vec![order], builder).await
    }

    /// Submit a batch of orders as one atomic action.
    pub async fn bulk_orders(
        &self,
        orders: Vec<OrderRequest>,
        builder: Option<BuilderInfo>,
    ) -> ClientResult<Value> {
        let action = self.build_order_action(&orders, builder)?;
        let nonce = self.nonces.next();
        let signature =
            sign_l1_action(&self.signer, &action, self.vault_address, nonce, self.network)?;
        let action = serde_json::to_value(&action)
            .map_err(|e| SigningError::Serialization(e.to_string()))?;
        self.post_action(action, signature, nonce).await
    }

    fn build_order_action(
        &self,
        orders: &[OrderRequest],
        builder: Option<BuilderInfo>,
    ) -> ClientResult<OrderAction> {
        let wires = orders
            .iter()
            .map(|order| {
                let asset = self.resolver.name_to_asset(&order.coin)?;
                order_request_to_order_wire(order, asset)
            })
            .collect::<Result<Vec<_>, CoreError>>()?;
        Ok(order_wires_to_order_action(wires, builder))
    }

    /// Aggressive IOC buy/sell priced off the top of the book with a
    /// slippage allowance.
    pub async fn market_open(
        &self,
        name: &str,
        is_buy: bool,
        sz: f64,
        px: Option<f64>,
        slippage: Option<f64>,
        cloid: Option<Cloid>,
        builder: Option<BuilderInfo>,
    ) -> ClientResult<Value> {
        let slippage = slippage.unwrap_or(DEFAULT_SLIPPAGE);
        let limit_px = self.slippage_price(name, is_buy, slippage, px).await?;

        let order = OrderRequest {
            coin: name.to_string(),
            is_buy,
            sz,
            limit_px,
            order_type: OrderType::Limit { tif: Tif::Ioc },
            reduce_only: false,
            cloid,
        };
        self.order(order, builder).await
    }

    /// Close (part of) an open position with an aggressive reduce-only
    /// IOC order. Size defaults to the full position.
    pub async fn market_close(
        &self,
        name: &str,
        sz: Option<f64>,
        px: Option<f64>,
        slippage: Option<f64>,
        cloid: Option<Cloid>,
        builder: Option<BuilderInfo>,
    ) -> ClientResult<Value> {
        let slippage = slippage.unwrap_or(DEFAULT_SLIPPAGE);
        let coin = self.resolver.name_to_coin(name)?.to_string();

        let user = format!("0x{}", hex::encode(self.signer.address()));
        let state = self
            .http
            .post("/info", &json!({"type": "clearinghouseState", "user": user}))
            .await?;

        let szi = position_size(&state, &coin)
            .ok_or_else(|| CoreError::UnknownSymbol(format!("no open position for {name}")))?;
        let is_buy = szi < 0.0;
        let sz = sz.unwrap_or_else(|| szi.abs());
        let limit_px = self.slippage_price(name, is_buy, slippage, px).await?;

        let order = OrderRequest {
            coin: coin.clone(),
            is_buy,
            sz,
            limit_px,
            order_type: OrderType::Limit { tif: Tif::Ioc },
            reduce_only: true,
            cloid,
        };
        self.order(order, builder).await
    }

    /// Resolve the aggressive limit price for a market order: the top
    /// book level (or an explicit override) pushed by the slippage
    /// fraction, then rounded to 5 significant figures and the venue's
    /// decimal cap (6 for perps, 8 for spot).
    async fn slippage_price(
        &self,
        name: &str,
        is_buy: bool,
        slippage: f64,
        px: Option<f64>,
    ) -> ClientResult<f64> {
        let coin = self.resolver.name_to_coin(name)?.to_string();
        let asset = self.resolver.name_to_asset(name)?;

        let px = match px {
            Some(p) => p,
            None => self.book_price(&coin, is_buy).await?,
        };
        let px = if is_buy {
            px * (1.0 + slippage)
        } else {
            px * (1.0 - slippage)
        };

        let decimals = if asset >= SPOT_ASSET_OFFSET { 8 } else { 6 };
        Ok(round_price(px, decimals))
    }

    /// Top-of-book price from a fresh L2 snapshot: level side 0 for
    /// buys, side 1 for sells.
    async fn book_price(&self, coin: &str, is_buy: bool) -> ClientResult<f64> {
        let book = self
            .http
            .post("/info", &json!({"type": "l2Book", "coin": coin}))
            .await?;
        top_of_book(&book, is_buy)
            .ok_or_else(|| CoreError::UnknownSymbol(format!("no book liquidity for {coin}")).into())
    }

    /// Send USDC to another address.
    pub async fn usd_transfer(&self, destination: &str, amount: &str) -> ClientResult<Value> {
        let nonce = self.nonces.next();
        let payload = UsdTransfer {
            destination: destination.to_string(),
            amount: amount.to_string(),
            time: nonce,
        };
        let signature = sign_usd_transfer_action(&self.signer, &payload, self.network)?;
        let action = json!({
            "type": "usdSend",
            "destination": destination,
            "amount": amount,
            "time": nonce,
        });
        self.post_action(action, signature, nonce).await
    }

    /// Send a spot token to another address.
    pub async fn spot_transfer(
        &self,
        destination: &str,
        token: &str,
        amount: &str,
    ) -> ClientResult<Value> {
        let nonce = self.nonces.next();
        let payload = SpotTransfer {
            destination: destination.to_string(),
            token: token.to_string(),
            amount: amount.to_string(),
            time: nonce,
        };
        let signature = sign_spot_transfer_action(&self.signer, &payload, self.network)?;
        let action = json!({
            "type": "spotSend",
            "destination": destination,
            "token": token,
            "amount": amount,
            "time": nonce,
        });
        self.post_action(action, signature, nonce).await
    }

    /// Move USDC between the spot and perp balance classes.
    pub async fn usd_class_transfer(&self, amount: &str, to_perp: bool) -> ClientResult<Value> {
        let nonce = self.nonces.next();
        let payload = UsdClassTransfer {
            amount: amount.to_string(),
            toPerp: to_perp,
            nonce,
        };
        let signature = sign_usd_class_transfer_action(&self.signer, &payload, self.network)?;
        let action = json!({
            "type": "usdClassTransfer",
            "amount": amount,
            "toPerp": to_perp,
            "nonce": nonce,
        });
        self.post_action(action, signature, nonce).await
    }

    /// Withdraw USDC through the bridge.
    pub async fn withdraw_from_bridge(
        &self,
        destination: &str,
        amount: &str,
    ) -> ClientResult<Value> {
        let nonce = self.nonces.next();
        let payload = WithdrawFromBridge {
            destination: destination.to_string(),
            amount: amount.to_string(),
            time: nonce,
        };
        let signature = sign_withdraw_from_bridge_action(&self.signer, &payload, self.network)?;
        let action = json!({
            "type": "withdraw3",
            "destination": destination,
            "amount": amount,
            "time": nonce,
        });
        self.post_action(action, signature, nonce).await
    }

    /// Authorize an agent wallet to sign on this account's behalf.
    pub async fn approve_agent(
        &self,
        agent_address: Address,
        agent_name: &str,
    ) -> ClientResult<Value> {
        let nonce = self.nonces.next();
        let payload = ApproveAgent {
            agentAddress: agent_address,
            agentName: agent_name.to_string(),
            nonce,
        };
        let signature = sign_agent(&self.signer, &payload, self.network)?;
        let action = json!({
            "type": "approveAgent",
            "agentAddress": format!("0x{}", hex::encode(agent_address)),
            "agentName": agent_name,
            "nonce": nonce,
        });
        self.post_action(action, signature, nonce).await
    }

    /// Approve a maximum builder fee for a builder address.
    pub async fn approve_builder_fee(
        &self,
        max_fee_rate: &str,
        builder: Address,
    ) -> ClientResult<Value> {
        let nonce = self.nonces.next();
        let payload = ApproveBuilderFee {
            maxFeeRate: max_fee_rate.to_string(),
            builder,
            nonce,
        };
        let signature = sign_approve_builder_fee(&self.signer, &payload, self.network)?;
        let action = json!({
            "type": "approveBuilderFee",
            "maxFeeRate": max_fee_rate,
            "builder": format!("0x{}", hex::encode(builder)),
            "nonce": nonce,
        });
        self.post_action(action, signature, nonce).await
    }

    /// Convert this account into a multisig user. `signers` is the
    /// JSON-encoded signer set as the protocol expects it.
    pub async fn convert_to_multi_sig_user(&self, signers: &str) -> ClientResult<Value> {
        let nonce = self.nonces.next();
        let payload = ConvertToMultiSigUser {
            signers: signers.to_string(),
            nonce,
        };
        let signature = sign_convert_to_multi_sig_user_action(&self.signer, &payload, self.network)?;
        let action = json!({
            "type": "convertToMultiSigUser",
            "signers": signers,
            "nonce": nonce,
        });
        self.post_action(action, signature, nonce).await
    }

    /// Submit a multisig-wrapped action with the co-signers' collected
    /// signatures. The nonce is the one the co-signers signed over.
    pub async fn multi_sig(
        &self,
        multi_sig_user: Address,
        inner_action: Value,
        signatures: Vec<Signature>,
        nonce: u64,
    ) -> ClientResult<Value> {
        let action = json!({
            "type": "multiSig",
            "multiSigUser": format!("0x{}", hex::encode(multi_sig_user)),
            "outerSigner": format!("0x{}", hex::encode(self.signer.address())),
            "action": inner_action,
            "signatures": signatures,
        });
        let signature =
            sign_multi_sig_action(&self.signer, &action, self.network, self.vault_address, nonce)?;
        self.post_action(action, signature, nonce).await
    }

    async fn post_action(
        &self,
        action: Value,
        signature: Signature,
        nonce: u64,
    ) -> ClientResult<Value> {
        let vault = self
            .vault_address
            .map(|a| format!("0x{}", hex::encode(a)));
        let request = SignedRequest::new(action, signature, nonce, vault);
        debug!(nonce, "posting signed action");
        self.http.post("/exchange", &request).await
    }
}

/// Signed position size for a coin out of a clearinghouse state
/// response; `None` when no position is open.
fn position_size(state: &Value, coin: &str) -> Option<f64> {
    state
        .get("assetPositions")?
        .as_array()?
        .iter()
        .filter_map(|p| p.get("position"))
        .find(|p| p.get("coin").and_then(Value::as_str) == Some(coin))?
        .get("szi")?
        .as_str()?
        .parse()
        .ok()
}

/// First level price on one side of an L2 book snapshot; `None` when
/// that side is empty.
fn top_of_book(book: &Value, is_buy: bool) -> Option<f64> {
    let side = if is_buy { 0 } else { 1 };
    book.get("levels")?
        .get(side)?
        .get(0)?
        .get("px")?
        .as_str()?
        .parse()
        .ok()
}

/// Round to 5 significant figures, then to the venue's decimal cap.
fn round_price(px: f64, decimals: u32) -> f64 {
    let sig = format!("{px:.4e}").parse::<f64>().unwrap_or(px);
    let factor = 10f64.powi(decimals as i32);
    (sig * factor).round() / factor
}
