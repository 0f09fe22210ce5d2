//! Signed request envelope.

use serde::Serialize;
use serde_json::Value;

use crate::sign::Signature;

/// The JSON body posted to the action endpoint.
///
/// Field names and the omission of an absent `vaultAddress` key are
/// part of the wire contract.
#[derive(Debug, Clone, Serialize)]
pub struct SignedRequest {
    pub action: Value,
    pub signature: Signature,
    pub nonce: u64,

    #[serde(rename = "vaultAddress", skip_serializing_if = "Option::is_none")]
    pub vault_address: Option<String>,
}

impl SignedRequest {
    /// Assemble the envelope for a signed action.
    ///
    /// Class transfers carry the account qualifier inside the action
    /// itself, so the envelope-level vault address is always dropped for
    /// them; sending it would fail signature verification.
    pub fn new(
        action: Value,
        signature: Signature,
        nonce: u64,
        vault_address: Option<String>,
    ) -> Self {
        let is_class_transfer = action
            .get("type")
            .and_then(Value::as_str)
            .is_some_and(|t| t == "usdClassTransfer");

        Self {
            action,
            signature,
            nonce,
            vault_address: if is_class_transfer {
                None
            } else {
                vault_address
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dummy_signature() -> Signature {
        Signature {
            r: format!("0x{}", "11".repeat(32)),
            s: format!("0x{}", "22".repeat(32)),
            v: 27,
        }
    }

    #[test]
    fn test_vault_address_omitted_when_none() {
        let req = SignedRequest::new(json!({"type": "order"}), dummy_signature(), 1, None);
        let body = serde_json::to_string(&req).unwrap();
        assert!(!body.contains("vaultAddress"));
    }

    #[test]
    fn test_vault_address_serialized_when_present() {
        let req = SignedRequest::new(
            json!({"type": "order"}),
            dummy_signature(),
            1,
            Some("0xabc".into()),
        );
        let body = serde_json::to_string(&req).unwrap();
        assert!(body.contains(r#""vaultAddress":"0xabc""#));
    }

    #[test]
    fn test_class_transfer_drops_vault_address() {
        let req = SignedRequest::new(
            json!({"type": "usdClassTransfer", "amount": "5", "toPerp": true}),
            dummy_signature(),
            1,
            Some("0xabc".into()),
        );
        assert!(req.vault_address.is_none());
    }

    #[test]
    fn test_envelope_field_names() {
        let req = SignedRequest::new(json!({"type": "order"}), dummy_signature(), 42, None);
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(body["nonce"], 42);
        assert_eq!(body["signature"]["v"], 27);
        assert!(body["signature"]["r"].as_str().unwrap().starts_with("0x"));
    }
}
