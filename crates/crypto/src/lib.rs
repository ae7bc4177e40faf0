//! Personal-message signature verification.
//!
//! Implements the EIP-191 `personal_sign` scheme: the wallet signs
//! `"\x19Ethereum Signed Message:\n" + len(message) + message` with its
//! secp256k1 key, and we recover the signing address from the 65-byte
//! r‖s‖v signature. Verification succeeds iff the recovered address equals
//! the claimed one under case-insensitive comparison.
//!
//! Nothing in this module errors outward: malformed input of any shape
//! yields `false`.

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};
use tokengate_types::addresses_match;
use tracing::debug;

/// Byte length of an r‖s‖v recoverable signature.
pub const SIGNATURE_BYTES: usize = 65;

/// Keccak256 digest of a message under the EIP-191 personal-sign prefix.
pub fn personal_message_digest(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n");
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

/// Derive the EVM address for a secp256k1 public key: the low 20 bytes of
/// the keccak256 hash of the uncompressed point without its `0x04` prefix.
pub fn address_of_key(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    let digest = Keccak256::digest(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&digest[12..]))
}

/// Recover the address that signed `message` under the personal-sign
/// scheme. Returns `None` for anything that is not a well-formed
/// recoverable signature.
pub fn recover_personal_signer(message: &str, signature_hex: &str) -> Option<String> {
    let raw = hex::decode(signature_hex.trim_start_matches("0x")).ok()?;
    if raw.len() != SIGNATURE_BYTES {
        return None;
    }

    let mut signature = Signature::from_slice(&raw[..64]).ok()?;

    // Wallets emit v as 27/28; raw recovery ids are 0/1.
    let v = raw[64];
    let recovery_byte = if v >= 27 { v - 27 } else { v };
    let mut recovery_id = RecoveryId::from_byte(recovery_byte)?;

    // High-s signatures are accepted from wallets but must be normalized
    // before recovery, flipping the y parity alongside.
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recovery_id = RecoveryId::from_byte(recovery_byte ^ 1)?;
    }

    let digest = personal_message_digest(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id).ok()?;
    Some(address_of_key(&key))
}

/// Verify that `signature_hex` was produced over `message` by the key
/// controlling `claimed_address`.
pub fn verify_personal_signature(message: &str, signature_hex: &str, claimed_address: &str) -> bool {
    match recover_personal_signer(message, signature_hex) {
        Some(recovered) => addresses_match(&recovered, claimed_address),
        None => {
            debug!("signature recovery failed for claimed address {claimed_address}");
            false
        }
    }
}

/// Produce a personal-sign signature with a local key. Wallet-side helper,
/// used for fixtures and dev tooling; the service itself only verifies.
pub fn sign_personal_message(
    message: &str,
    key: &SigningKey,
) -> Result<String, k256::ecdsa::Error> {
    let digest = personal_message_digest(message);
    let (signature, recovery_id) = key.sign_prehash_recoverable(&digest)?;

    let mut raw = [0u8; SIGNATURE_BYTES];
    raw[..64].copy_from_slice(&signature.to_bytes());
    raw[64] = recovery_id.to_byte() + 27;
    Ok(format!("0x{}", hex::encode(raw)))
}
