//! Calldata formatting for the vault's `withdraw` entry point.
//!
//! Pure formatting: a 4-byte selector (keccak-256 of the canonical function
//! signature, truncated) followed by 32-byte argument words. Addresses and
//! fixed-width unsigned integers are left-padded, fixed-length byte arrays
//! right-padded.

#[macro_use]
extern crate failure;
extern crate serialize;
extern crate tiny_keccak;

use tiny_keccak::{Hasher, Keccak};

use failure::Error;
use serialize::{from_hex, Serialize};

const WORD_HEX_LEN: usize = 64;
const ADDRESS_HEX_LEN: usize = 40;
const BYTES8_HEX_LEN: usize = 16;

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut digest = [0; 32];
    hasher.finalize(&mut digest);
    digest
}

/// First 4 bytes of keccak-256 of the signature, as 8 hex characters.
pub fn function_selector(signature: &str) -> String {
    keccak256(signature.as_bytes())[..4].to_hex()
}

pub fn strip_0x(s: &str) -> &str {
    if s.starts_with("0x") || s.starts_with("0X") {
        &s[2..]
    } else {
        s
    }
}

// Normalizes a hex argument to an exact nibble width, lowercase.
fn normalize_hex(s: &str, hex_len: usize) -> Result<String, Error> {
    let stripped = strip_0x(s).to_lowercase();
    if stripped.len() > hex_len {
        bail!("argument {} longer than {} hex characters", s, hex_len);
    }
    let padded = format!("{:0>width$}", stripped, width = hex_len);
    from_hex(&padded).map_err(|e| format_err!("invalid hex argument {}: {}", s, e))?;
    Ok(padded)
}

fn left_pad_word(h: &str) -> String {
    format!("{:0>width$}", h, width = WORD_HEX_LEN)
}

fn right_pad_word(h: &str) -> String {
    format!("{:0<width$}", h, width = WORD_HEX_LEN)
}

/// `address`: 20 bytes, left-padded to a word.
pub fn encode_address(address: &str) -> Result<String, Error> {
    Ok(left_pad_word(&normalize_hex(address, ADDRESS_HEX_LEN)?))
}

/// `bytes8`: fixed-length bytes, right-padded to a word.
pub fn encode_bytes8(bytes: &str) -> Result<String, Error> {
    Ok(right_pad_word(&normalize_hex(bytes, BYTES8_HEX_LEN)?))
}

/// `uint64`: left-padded to a word.
pub fn encode_uint64(value: u64) -> String {
    left_pad_word(&format!("{:016x}", value))
}

/// Calldata for `withdraw(address,bytes8,uint64)`:
/// `0x` + selector + the three argument words.
pub fn withdraw_calldata(receiver: &str, salt: &str, amount_wei: u64) -> Result<String, Error> {
    Ok(format!(
        "0x{}{}{}{}",
        function_selector("withdraw(address,bytes8,uint64)"),
        encode_address(receiver)?,
        encode_bytes8(salt)?,
        encode_uint64(amount_wei),
    ))
}

/// The block-hash preimage bound to a withdrawal:
/// `salt(8B) ‖ receiver(20B) ‖ amount(8B)`, lowercase hex without `0x`.
pub fn toyhash_preimage(salt: &str, receiver: &str, amount_wei: u64) -> Result<String, Error> {
    Ok(format!(
        "{}{}{:016x}",
        normalize_hex(salt, BYTES8_HEX_LEN)?,
        normalize_hex(receiver, ADDRESS_HEX_LEN)?,
        amount_wei,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECEIVER: &str = "0xc40ae171869eF802090144Bdc4511C6D2855D3f3";
    const SALT: &str = "0x2942164490202799";
    const AMOUNT: u64 = 1_000_000_000_000_000;

    #[test]
    fn withdraw_selector() {
        assert_eq!("b421b368", function_selector("withdraw(address,bytes8,uint64)"));
    }

    #[test]
    fn word_padding_rules() {
        assert_eq!(
            "000000000000000000000000c40ae171869ef802090144bdc4511c6d2855d3f3",
            encode_address(RECEIVER).unwrap()
        );
        assert_eq!(
            "2942164490202799000000000000000000000000000000000000000000000000",
            encode_bytes8(SALT).unwrap()
        );
        assert_eq!(
            "00000000000000000000000000000000000000000000000000038d7ea4c68000",
            encode_uint64(AMOUNT)
        );
    }

    #[test]
    fn full_withdraw_calldata() {
        let expected = format!(
            "0xb421b368{}{}{}",
            "000000000000000000000000c40ae171869ef802090144bdc4511c6d2855d3f3",
            "2942164490202799000000000000000000000000000000000000000000000000",
            "00000000000000000000000000000000000000000000000000038d7ea4c68000",
        );
        assert_eq!(expected, withdraw_calldata(RECEIVER, SALT, AMOUNT).unwrap());
    }

    #[test]
    fn preimage_concatenates_the_segments() {
        assert_eq!(
            "2942164490202799c40ae171869ef802090144bdc4511c6d2855d3f300038d7ea4c68000",
            toyhash_preimage(SALT, RECEIVER, AMOUNT).unwrap()
        );
    }

    #[test]
    fn rejects_oversized_and_invalid_arguments() {
        assert!(encode_address("0xzz").is_err());
        assert!(encode_bytes8("0x112233445566778899").is_err());
        assert!(toyhash_preimage("0xnope", RECEIVER, AMOUNT).is_err());
    }
}
