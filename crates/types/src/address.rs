//! EVM wallet address handling.
//!
//! Addresses are 20-byte values rendered as `0x`-prefixed hex. Checksum
//! casing is cosmetic, so all comparisons here are case-insensitive and the
//! normalized form is lowercase.

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a wallet address string.
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("address must start with '0x'")]
    InvalidPrefix,
    #[error("address must be {expected} characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("address payload is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
}

/// Number of raw bytes in an EVM address.
pub const ADDRESS_BYTES: usize = 20;
/// Expected string length of an encoded address (`0x` + 40 hex chars).
pub const ADDRESS_STRING_LENGTH: usize = 2 + ADDRESS_BYTES * 2;

/// Validate a wallet address string and return its lowercase normal form.
pub fn normalize_address(address: &str) -> Result<String, AddressError> {
    if !address.starts_with("0x") && !address.starts_with("0X") {
        return Err(AddressError::InvalidPrefix);
    }

    if address.len() != ADDRESS_STRING_LENGTH {
        return Err(AddressError::InvalidLength {
            expected: ADDRESS_STRING_LENGTH,
            actual: address.len(),
        });
    }

    let payload = &address[2..];
    hex::decode(payload)?;

    Ok(format!("0x{}", payload.to_lowercase()))
}

/// Decode a wallet address string into its raw bytes.
pub fn decode_address(address: &str) -> Result<[u8; ADDRESS_BYTES], AddressError> {
    let normalized = normalize_address(address)?;
    let decoded = hex::decode(&normalized[2..])?;
    let mut bytes = [0u8; ADDRESS_BYTES];
    bytes.copy_from_slice(&decoded);
    Ok(bytes)
}

/// Render raw address bytes in the normalized lowercase form.
pub fn encode_address(bytes: &[u8; ADDRESS_BYTES]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Case-insensitive address equality.
pub fn addresses_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Shorten an address for user-visible output: `0x1234…cdef`.
///
/// Full addresses never appear in responses or user-facing log lines; this
/// is the only form echoed back.
pub fn redact_address(address: &str) -> String {
    if address.len() <= 10 {
        return address.to_string();
    }
    format!("{}…{}", &address[..6], &address[address.len() - 4..])
}

/// Check whether the provided string is a valid wallet address.
pub fn is_valid_address(address: &str) -> bool {
    normalize_address(address).is_ok()
}

/// Convenience wrapper for serialising addresses as strings in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletAddress(pub String);

impl WalletAddress {
    /// Parse and normalize a wallet address string.
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        normalize_address(address).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn redacted(&self) -> String {
        redact_address(&self.0)
    }
}

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
