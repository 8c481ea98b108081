//! The vault's custom block hash.
//!
//! A hex-string message is zero-padded on the right to whole 28-byte blocks.
//! Each block is cut into four 7-byte sub-blocks chained by a single bit:
//! the first bit of a sub-block is XOR-flipped with the last bit of its
//! predecessor (the chain starts from the last bit of the block's final
//! sub-block). Every modified sub-block is keccak-256 digested and truncated
//! to 6 hex characters; the concatenated sub-digests are hashed once more
//! and truncated to 32 hex characters.

#[macro_use]
extern crate failure;
extern crate serialize;
extern crate tiny_keccak;

use tiny_keccak::{Hasher, Keccak};

use failure::Error;
use serialize::{from_hex, Serialize};

const SUB_BLOCK_LEN: usize = 7;
const BLOCK_LEN: usize = 4 * SUB_BLOCK_LEN;
const BLOCK_HEX_LEN: usize = 2 * BLOCK_LEN;
const SUB_DIGEST_HEX_LEN: usize = 6;
const DIGEST_HEX_LEN: usize = 32;

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut digest = [0; 32];
    hasher.finalize(&mut digest);
    digest
}

fn sub_block_digest(sub: &[u8], prev_last_bit: u8) -> (String, u8) {
    debug_assert_eq!(sub.len(), SUB_BLOCK_LEN);
    let first_bit = (sub[0] >> 7) & 1;
    let mut modified = [0; SUB_BLOCK_LEN];
    modified.copy_from_slice(sub);
    modified[0] = (sub[0] & 0x7f) | ((prev_last_bit ^ first_bit) << 7);
    let digest = keccak256(&modified)[..SUB_DIGEST_HEX_LEN / 2].to_hex();
    (digest, sub[SUB_BLOCK_LEN - 1] & 1)
}

/// Concatenated sub-block digests of whole 28-byte blocks.
pub fn block_digest(data: &[u8]) -> Result<String, Error> {
    if data.is_empty() || data.len() % BLOCK_LEN != 0 {
        bail!(
            "block input must be a non-empty multiple of {} bytes, got {}",
            BLOCK_LEN,
            data.len()
        );
    }
    let mut digest = String::with_capacity(data.len() / SUB_BLOCK_LEN * SUB_DIGEST_HEX_LEN);
    for block in data.chunks(BLOCK_LEN) {
        // the chain seed is the last bit of the block's last sub-block
        let mut prev_last_bit = block[BLOCK_LEN - 1] & 1;
        for sub in block.chunks(SUB_BLOCK_LEN) {
            let (sub_digest, last_bit) = sub_block_digest(sub, prev_last_bit);
            digest.push_str(&sub_digest);
            prev_last_bit = last_bit;
        }
    }
    Ok(digest)
}

/// The full hash: 32 lowercase hex characters over a hex-string message.
/// Inputs are zero-padded on the right to a multiple of 56 hex characters.
pub fn toyhash(input: &str) -> Result<String, Error> {
    let mut data = input.to_string();
    if data.len() % BLOCK_HEX_LEN != 0 {
        let target = (data.len() / BLOCK_HEX_LEN + 1) * BLOCK_HEX_LEN;
        while data.len() < target {
            data.push('0');
        }
    }
    let bytes = from_hex(&data).map_err(|e| format_err!("invalid hex input: {}", e))?;

    let mut sub_digests = String::new();
    for block in bytes.chunks(BLOCK_LEN) {
        sub_digests.push_str(&block_digest(block)?);
    }
    let inner =
        from_hex(&sub_digests).map_err(|e| format_err!("invalid sub-digest hex: {}", e))?;
    Ok(keccak256(&inner).to_hex()[..DIGEST_HEX_LEN].to_string())
}

#[test]
fn keccak256_known_vectors() {
    assert_eq!(
        "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470",
        keccak256(b"").to_hex()
    );
    assert_eq!(
        "4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45",
        keccak256(b"abc").to_hex()
    );
}

#[test]
fn empty_message_hashes_the_empty_digest_string() {
    // no blocks at all: the final keccak runs over zero bytes
    assert_eq!("c5d2460186f7233c927e7db2dcc703c0", toyhash("").unwrap());
}

#[test]
fn zero_block_digest() {
    assert_eq!(
        "dfcbe0dfcbe0dfcbe0dfcbe0",
        block_digest(&[0; 28]).unwrap()
    );
    assert_eq!(
        "f14d1c78b5d45be62e4f5e1f2cc9c8af",
        toyhash(&"0".repeat(56)).unwrap()
    );
}

#[test]
fn short_input_is_zero_padded_on_the_right() {
    assert_eq!(toyhash("ab").unwrap(), toyhash(&format!("ab{}", "0".repeat(54))).unwrap());
    assert_eq!("78e17ede6208cb7ee9090bc92a96d21d", toyhash("ab").unwrap());
}

#[test]
fn deposit_preimage_vector() {
    // salt(8B) ‖ receiver(20B) ‖ amount(8B) of the repository's deposit
    let preimage = "2942164490202799c40ae171869ef802090144bdc4511c6d2855d3f300038d7ea4c68000";
    assert_eq!(
        "73195a139c01b88bcb4c28801eb01918",
        toyhash(preimage).unwrap()
    );
}

#[test]
fn chain_bit_flips_the_first_bit() {
    // a set first bit with a clear chain bit digests identically to a clear
    // first bit with a set chain bit
    let (a, last_a) = sub_block_digest(&[0x80, 0, 0, 0, 0, 0, 0x01], 0);
    let (b, last_b) = sub_block_digest(&[0x00, 0, 0, 0, 0, 0, 0x01], 1);
    assert_eq!("21b4e1", a);
    assert_eq!(a, b);
    assert_eq!(1, last_a);
    assert_eq!(1, last_b);
    // and the unmodified zero sub-block digests differently
    let (c, _) = sub_block_digest(&[0; 7], 0);
    assert_eq!("dfcbe0", c);
}

#[test]
fn rejects_invalid_input() {
    assert!(toyhash("zz").is_err());
    assert!(block_digest(&[0; 27]).is_err());
    assert!(block_digest(&[]).is_err());
}
