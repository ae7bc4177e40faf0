//! Minimal ABI encoding for the two balance queries this service makes.

use tokengate_types::address::decode_address;

use crate::ChainError;

/// `balanceOf(address)` — ERC-721 / ERC-20 style.
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];
/// `balanceOfBatch(address[],uint256[])` — ERC-1155.
pub const BALANCE_OF_BATCH_SELECTOR: [u8; 4] = [0x4e, 0x12, 0x73, 0xf4];

fn address_word(address: &str) -> Result<[u8; 32], ChainError> {
    let bytes =
        decode_address(address).map_err(|err| ChainError::InvalidAddress(err.to_string()))?;
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(&bytes);
    Ok(word)
}

fn uint_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Calldata for `balanceOf(owner)`.
pub fn encode_balance_of(owner: &str) -> Result<Vec<u8>, ChainError> {
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&BALANCE_OF_SELECTOR);
    data.extend_from_slice(&address_word(owner)?);
    Ok(data)
}

/// Calldata for `balanceOfBatch([owner; n], token_ids)`.
///
/// ERC-1155 requires the two arrays to have equal length, so the single
/// owner is repeated once per queried token id.
pub fn encode_balance_of_batch(owner: &str, token_ids: &[u64]) -> Result<Vec<u8>, ChainError> {
    let owner_word = address_word(owner)?;
    let n = token_ids.len() as u64;

    let mut data = Vec::with_capacity(4 + 32 * (4 + 2 * token_ids.len()));
    data.extend_from_slice(&BALANCE_OF_BATCH_SELECTOR);
    // Head: offsets of the two dynamic arrays relative to the args start.
    data.extend_from_slice(&uint_word(0x40));
    data.extend_from_slice(&uint_word(0x40 + 32 * (1 + n)));
    // accounts[]
    data.extend_from_slice(&uint_word(n));
    for _ in token_ids {
        data.extend_from_slice(&owner_word);
    }
    // ids[]
    data.extend_from_slice(&uint_word(n));
    for id in token_ids {
        data.extend_from_slice(&uint_word(*id));
    }
    Ok(data)
}

fn decode_word_u128(word: &[u8]) -> u128 {
    // Balances above u128::MAX saturate; qualification only needs nonzero.
    if word[..16].iter().any(|b| *b != 0) {
        return u128::MAX;
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..32]);
    u128::from_be_bytes(low)
}

/// Decode the single uint256 word returned by `balanceOf`.
pub fn decode_balance(return_data: &[u8]) -> Result<u128, ChainError> {
    if return_data.len() < 32 {
        return Err(ChainError::MalformedResponse(format!(
            "balanceOf returned {} bytes, expected 32",
            return_data.len()
        )));
    }
    Ok(decode_word_u128(&return_data[..32]))
}

/// Decode the `uint256[]` returned by `balanceOfBatch`.
pub fn decode_balance_batch(return_data: &[u8], expected: usize) -> Result<Vec<u128>, ChainError> {
    // offset word + length word + one word per element
    let needed = 32 * (2 + expected);
    if return_data.len() < needed {
        return Err(ChainError::MalformedResponse(format!(
            "balanceOfBatch returned {} bytes, expected at least {needed}",
            return_data.len()
        )));
    }

    let len = decode_word_u128(&return_data[32..64]) as usize;
    if len != expected {
        return Err(ChainError::MalformedResponse(format!(
            "balanceOfBatch returned {len} balances, expected {expected}"
        )));
    }

    let mut balances = Vec::with_capacity(expected);
    for i in 0..expected {
        let start = 64 + 32 * i;
        balances.push(decode_word_u128(&return_data[start..start + 32]));
    }
    Ok(balances)
}

/// Parse the `0x`-prefixed hex return blob of an `eth_call`.
pub fn decode_hex_blob(result: &str) -> Result<Vec<u8>, ChainError> {
    hex::decode(result.trim_start_matches("0x"))
        .map_err(|err| ChainError::MalformedResponse(format!("return data is not hex: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: &str = "0x00000000000000000000000000000000000000aa";

    #[test]
    fn balance_of_calldata_layout() {
        let data = encode_balance_of(OWNER).unwrap();
        assert_eq!(data.len(), 36);
        assert_eq!(&data[..4], &BALANCE_OF_SELECTOR);
        // Address is right-aligned in its word.
        assert_eq!(data[4..16], [0u8; 12]);
        assert_eq!(data[35], 0xaa);
    }

    #[test]
    fn balance_of_batch_calldata_layout() {
        let data = encode_balance_of_batch(OWNER, &[1, 7]).unwrap();
        assert_eq!(&data[..4], &BALANCE_OF_BATCH_SELECTOR);
        let words: Vec<&[u8]> = data[4..].chunks(32).collect();
        // head
        assert_eq!(decode_word_u128(words[0]), 0x40);
        assert_eq!(decode_word_u128(words[1]), 0x40 + 32 * 3);
        // accounts[]
        assert_eq!(decode_word_u128(words[2]), 2);
        assert_eq!(words[3][31], 0xaa);
        assert_eq!(words[4][31], 0xaa);
        // ids[]
        assert_eq!(decode_word_u128(words[5]), 2);
        assert_eq!(decode_word_u128(words[6]), 1);
        assert_eq!(decode_word_u128(words[7]), 7);
    }

    #[test]
    fn rejects_bad_owner_address() {
        assert!(matches!(
            encode_balance_of("0x1234"),
            Err(ChainError::InvalidAddress(_))
        ));
    }

    #[test]
    fn decodes_single_balance() {
        let mut word = [0u8; 32];
        word[31] = 3;
        assert_eq!(decode_balance(&word).unwrap(), 3);
        assert!(decode_balance(&[0u8; 12]).is_err());
    }

    #[test]
    fn decodes_batch_balances() {
        let mut blob = Vec::new();
        let mut offset = [0u8; 32];
        offset[31] = 0x20;
        blob.extend_from_slice(&offset);
        let mut len = [0u8; 32];
        len[31] = 2;
        blob.extend_from_slice(&len);
        let mut first = [0u8; 32];
        first[31] = 0;
        blob.extend_from_slice(&first);
        let mut second = [0u8; 32];
        second[31] = 5;
        blob.extend_from_slice(&second);

        let balances = decode_balance_batch(&blob, 2).unwrap();
        assert_eq!(balances, vec![0, 5]);
    }

    #[test]
    fn batch_length_mismatch_is_malformed() {
        let mut blob = vec![0u8; 96];
        blob[63] = 1; // claims one element, body has one word
        assert!(decode_balance_batch(&blob, 2).is_err());
    }

    #[test]
    fn empty_revert_style_return_is_malformed() {
        // A reverted eth_call surfaces as "0x": no data to decode.
        let blob = decode_hex_blob("0x").unwrap();
        assert!(decode_balance(&blob).is_err());
    }

    #[test]
    fn saturates_huge_balances() {
        let word = [0xffu8; 32];
        assert_eq!(decode_balance(&word).unwrap(), u128::MAX);
    }
}
