//! Minimal ABI helpers for the fixed whitelist interface: keccak-256
//! selectors plus single-word argument encoding and return decoding.

use anyhow::{bail, Result};
use sha3::{Digest, Keccak256};
use shared::domain::Address;

pub const WORD_LEN: usize = 32;

/// First four bytes of the keccak-256 hash of the canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = Keccak256::digest(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

pub fn call_no_args(signature: &str) -> Vec<u8> {
    selector(signature).to_vec()
}

pub fn call_with_address(signature: &str, address: Address) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend_from_slice(&encode_address(address));
    data
}

/// Left-pads the 20-byte address into a 32-byte word.
pub fn encode_address(address: Address) -> [u8; WORD_LEN] {
    let mut word = [0u8; WORD_LEN];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

pub fn decode_u64(data: &[u8]) -> Result<u64> {
    let word = single_word(data)?;
    if word[..24].iter().any(|b| *b != 0) {
        bail!("uint return value exceeds u64 range");
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(tail))
}

pub fn decode_bool(data: &[u8]) -> Result<bool> {
    let word = single_word(data)?;
    if word[..31].iter().any(|b| *b != 0) {
        bail!("malformed bool return value");
    }
    match word[31] {
        0 => Ok(false),
        1 => Ok(true),
        other => bail!("malformed bool return value: {other}"),
    }
}

fn single_word(data: &[u8]) -> Result<&[u8]> {
    if data.len() != WORD_LEN {
        bail!(
            "expected a single {WORD_LEN}-byte return word, got {} bytes",
            data.len()
        );
    }
    Ok(data)
}
