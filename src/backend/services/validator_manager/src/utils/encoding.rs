//! Textual encodings used by the root chain: cb58 identifiers and bech32
//! addresses.

use alloy_primitives::Address;
use bech32::FromBase32;
use sha2::{Digest, Sha256};

const CHECKSUM_LEN: usize = 4;
const NODE_ID_PREFIX: &str = "NodeID-";
pub const NODE_ID_LEN: usize = 20;

fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let digest = Sha256::digest(payload);
    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[digest.len() - CHECKSUM_LEN..]);
    out
}

/// Encode bytes as cb58: base58 over the payload followed by the last four
/// bytes of its SHA-256 digest.
pub fn encode_cb58(payload: &[u8]) -> String {
    let mut buf = Vec::with_capacity(payload.len() + CHECKSUM_LEN);
    buf.extend_from_slice(payload);
    buf.extend_from_slice(&checksum(payload));
    bs58::encode(buf).into_string()
}

pub fn decode_cb58(encoded: &str) -> Result<Vec<u8>, String> {
    let raw = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| format!("invalid base58 '{}': {}", encoded, e))?;
    if raw.len() < CHECKSUM_LEN {
        return Err(format!("cb58 value '{}' is too short", encoded));
    }
    let (payload, check) = raw.split_at(raw.len() - CHECKSUM_LEN);
    if checksum(payload) != check {
        return Err(format!("cb58 checksum mismatch for '{}'", encoded));
    }
    Ok(payload.to_vec())
}

/// Parse `NodeID-<cb58>` into its 20 raw bytes.
pub fn parse_node_id(value: &str) -> Result<[u8; NODE_ID_LEN], String> {
    let body = value
        .trim()
        .strip_prefix(NODE_ID_PREFIX)
        .ok_or_else(|| format!("node id '{}' must start with '{}'", value, NODE_ID_PREFIX))?;
    let payload = decode_cb58(body)?;
    if payload.len() != NODE_ID_LEN {
        return Err(format!(
            "node id '{}' decodes to {} bytes, expected {}",
            value,
            payload.len(),
            NODE_ID_LEN
        ));
    }
    let mut id = [0u8; NODE_ID_LEN];
    id.copy_from_slice(&payload);
    Ok(id)
}

pub fn format_node_id(id: &[u8; NODE_ID_LEN]) -> String {
    format!("{}{}", NODE_ID_PREFIX, encode_cb58(id))
}

/// Parse a root-chain address such as `P-avax1...` into the 20-byte short
/// address the validator manager expects. The chain alias is optional.
pub fn parse_root_chain_address(value: &str) -> Result<Address, String> {
    let trimmed = value.trim();
    let bech = match trimmed.split_once('-') {
        Some((_, rest)) => rest,
        None => trimmed,
    };
    let (_hrp, data, _variant) =
        bech32::decode(bech).map_err(|e| format!("invalid bech32 address '{}': {}", value, e))?;
    let bytes = Vec::<u8>::from_base32(&data)
        .map_err(|e| format!("invalid bech32 payload in '{}': {}", value, e))?;
    if bytes.len() != 20 {
        return Err(format!(
            "address '{}' decodes to {} bytes, expected 20",
            value,
            bytes.len()
        ));
    }
    Ok(Address::from_slice(&bytes))
}

/// Decode a hex string of an exact length, with or without `0x`.
pub fn decode_hex_exact(value: &str, expected: usize, what: &str) -> Result<Vec<u8>, String> {
    let stripped = value.trim().trim_start_matches("0x");
    let bytes = hex::decode(stripped).map_err(|e| format!("invalid {} hex: {}", what, e))?;
    if bytes.len() != expected {
        return Err(format!(
            "{} must be {} bytes, got {}",
            what,
            expected,
            bytes.len()
        ));
    }
    Ok(bytes)
}
