//! Address encoding and script destinations
//!
//! Address format: "RH" + Base58(pubkey_hash[0:20] + checksum[0:4]), where the
//! checksum is the first four bytes of the double BLAKE3 hash of the key hash.
//! Only pay-to-pubkey-hash scripts resolve to an address; anything else has
//! no destination and can never match a burn address.

use crate::constants::CHAIN_NAME;
use crate::crypto::double_hash;
use thiserror::Error;

/// Length of the key hash carried by scripts and addresses
pub const KEY_HASH_LEN: usize = 20;

const OP_DUP: u8 = 0x76;
const OP_HASH: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;

/// Address errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address prefix")]
    InvalidPrefix,
    #[error("Invalid base58 encoding")]
    InvalidEncoding,
    #[error("Invalid address length: {0}")]
    InvalidLength(usize),
    #[error("Invalid checksum")]
    InvalidChecksum,
}

/// Build the standard pay-to-pubkey-hash script for a key hash
pub fn p2pkh_script(key_hash: &[u8; KEY_HASH_LEN]) -> Vec<u8> {
    let mut script = Vec::with_capacity(KEY_HASH_LEN + 5);
    script.extend_from_slice(&[OP_DUP, OP_HASH, KEY_HASH_LEN as u8]);
    script.extend_from_slice(key_hash);
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

/// Extract the key hash paid to by a script, if it is pay-to-pubkey-hash
pub fn extract_destination(script: &[u8]) -> Option<[u8; KEY_HASH_LEN]> {
    if script.len() != KEY_HASH_LEN + 5 {
        return None;
    }
    if script[0] != OP_DUP || script[1] != OP_HASH || script[2] as usize != KEY_HASH_LEN {
        return None;
    }
    if script[KEY_HASH_LEN + 3] != OP_EQUALVERIFY || script[KEY_HASH_LEN + 4] != OP_CHECKSIG {
        return None;
    }

    let mut key_hash = [0u8; KEY_HASH_LEN];
    key_hash.copy_from_slice(&script[3..3 + KEY_HASH_LEN]);
    Some(key_hash)
}

/// Encode a key hash as an RH address
pub fn encode_address(key_hash: &[u8; KEY_HASH_LEN]) -> String {
    let checksum = double_hash(key_hash);

    let mut payload = Vec::with_capacity(KEY_HASH_LEN + 4);
    payload.extend_from_slice(key_hash);
    payload.extend_from_slice(&checksum.0[0..4]);

    format!("{}{}", CHAIN_NAME, bs58::encode(payload).into_string())
}

/// Decode an RH address back to its key hash
pub fn decode_address(address: &str) -> Result<[u8; KEY_HASH_LEN], AddressError> {
    let encoded = address
        .strip_prefix(CHAIN_NAME)
        .ok_or(AddressError::InvalidPrefix)?;

    let decoded = bs58::decode(encoded)
        .into_vec()
        .map_err(|_| AddressError::InvalidEncoding)?;

    if decoded.len() != KEY_HASH_LEN + 4 {
        return Err(AddressError::InvalidLength(decoded.len()));
    }

    let (key_bytes, checksum) = decoded.split_at(KEY_HASH_LEN);
    let expected = double_hash(key_bytes);
    if checksum != &expected.0[0..4] {
        return Err(AddressError::InvalidChecksum);
    }

    let mut key_hash = [0u8; KEY_HASH_LEN];
    key_hash.copy_from_slice(key_bytes);
    Ok(key_hash)
}
