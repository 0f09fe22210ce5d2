//! Private key loading.

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use zeroize::Zeroizing;

use crate::error::{SigningError, SigningResult};

/// Parse a hex-encoded secp256k1 private key into a local signer.
///
/// Accepts an optional `0x` prefix and surrounding whitespace. The
/// decoded key bytes are zeroized on drop; the hex input is the
/// caller's responsibility.
pub fn load_signer(hex_key: &str) -> SigningResult<PrivateKeySigner> {
    let trimmed = hex_key.trim();
    let stripped = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    let secret = Zeroizing::new(
        hex::decode(stripped).map_err(|e| SigningError::InvalidKey(format!("bad hex: {e}")))?,
    );

    PrivateKeySigner::from_slice(&secret)
        .map_err(|e| SigningError::InvalidKey(e.to_string()))
}

/// Load a signer and verify it controls the expected address.
///
/// Catches a mixed-up key/address pair before any action is signed
/// against the wrong account.
pub fn load_signer_checked(
    hex_key: &str,
    expected: Address,
) -> SigningResult<PrivateKeySigner> {
    let signer = load_signer(hex_key)?;
    if signer.address() != expected {
        return Err(SigningError::InvalidKey(format!(
            "key controls {}, expected {}",
            signer.address(),
            expected
        )));
    }
    Ok(signer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    // Well-known test private key (DO NOT use in production)
    const TEST_PRIVATE_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const TEST_ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

    #[test]
    fn test_load_with_prefix() {
        let signer = load_signer(TEST_PRIVATE_KEY).unwrap();
        assert_eq!(signer.address(), Address::from_str(TEST_ADDRESS).unwrap());
    }

    #[test]
    fn test_load_without_prefix() {
        let signer = load_signer(&TEST_PRIVATE_KEY[2..]).unwrap();
        assert_eq!(signer.address(), Address::from_str(TEST_ADDRESS).unwrap());
    }

    #[test]
    fn test_load_trims_whitespace() {
        let padded = format!("  {TEST_PRIVATE_KEY}\n");
        assert!(load_signer(&padded).is_ok());
    }

    #[test]
    fn test_load_rejects_bad_hex() {
        assert!(matches!(
            load_signer("0xzz"),
            Err(SigningError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_load_rejects_wrong_length() {
        assert!(matches!(
            load_signer("0xdeadbeef"),
            Err(SigningError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_checked_load_matches() {
        let expected = Address::from_str(TEST_ADDRESS).unwrap();
        assert!(load_signer_checked(TEST_PRIVATE_KEY, expected).is_ok());
    }

    #[test]
    fn test_checked_load_mismatch() {
        let wrong = Address::repeat_byte(0x01);
        assert!(matches!(
            load_signer_checked(TEST_PRIVATE_KEY, wrong),
            Err(SigningError::InvalidKey(_))
        ));
    }
}
