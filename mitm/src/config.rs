use aes::{BLOCK_SIZE, KEY_SIZE};
use failure::Error;

use crate::errors::MitmError;
use crate::key::{SUFFIX_BITS_MAX, SUFFIX_LEN};

/// Every run-scoped input of the engine, supplied explicitly by the caller.
/// The engine itself carries no baked-in puzzle constants.
#[derive(Clone, Debug)]
pub struct Config {
    /// Fixed leading key segment of the first (encrypting) stage.
    pub left_prefix: Vec<u8>,
    /// Fixed leading key segment of the second (outer) stage.
    pub right_prefix: Vec<u8>,
    /// Fixed middle key segment shared by both stages.
    pub middle: Vec<u8>,
    /// The known plaintext, unpadded.
    pub plaintext: Vec<u8>,
    /// The known two-stage ciphertext of the padded plaintext.
    pub ciphertext: Vec<u8>,
    /// Bucket keys are the first `truncation_len` bytes of an intermediate
    /// block, 1..=BLOCK_SIZE. Shorter keys mean fuller buckets.
    pub truncation_len: usize,
    /// Width of the enumerated suffix space in bits, 1..=24. The suffix
    /// encoding itself is always 3 big-endian bytes.
    pub suffix_bits: u32,
    /// Worker threads per phase.
    pub workers: usize,
}

impl Config {
    pub fn suffix_space(&self) -> u32 {
        1 << self.suffix_bits
    }

    /// Contiguous ascending shards of `0..suffix_space()`, one per worker.
    pub fn shard_ranges(&self) -> Vec<(u32, u32)> {
        let space = self.suffix_space();
        let workers = self.workers as u32;
        let chunk = (space + workers - 1) / workers;
        (0..workers)
            .map(|i| {
                let start = (i * chunk).min(space);
                let end = (start + chunk).min(space);
                (start, end)
            })
            .filter(|(start, end)| start < end)
            .collect()
    }

    pub fn validate(&self) -> Result<(), Error> {
        for prefix in &[&self.left_prefix, &self.right_prefix] {
            let total = prefix.len() + self.middle.len() + SUFFIX_LEN;
            if total != KEY_SIZE {
                return Err(MitmError::KeyLengthMismatch {
                    expected: KEY_SIZE,
                    actual: total,
                }
                .into());
            }
        }
        if self.truncation_len == 0 || self.truncation_len > BLOCK_SIZE {
            return Err(MitmError::InvalidTruncationLength {
                max: BLOCK_SIZE,
                got: self.truncation_len,
            }
            .into());
        }
        if self.suffix_bits == 0 || self.suffix_bits > SUFFIX_BITS_MAX {
            return Err(MitmError::InvalidSuffixWidth {
                max: SUFFIX_BITS_MAX,
                got: self.suffix_bits,
            }
            .into());
        }
        if self.workers == 0 {
            return Err(MitmError::NoWorkers.into());
        }
        // A ciphertext of any other length can never verify, so treat the
        // mismatch as a configuration error rather than searching 2^24
        // candidates for nothing.
        let padded_len = self.plaintext.len() / BLOCK_SIZE * BLOCK_SIZE + BLOCK_SIZE;
        if self.ciphertext.len() != padded_len {
            return Err(MitmError::CiphertextLengthMismatch {
                ciphertext: self.ciphertext.len(),
                padded: padded_len,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
pub fn test_config() -> Config {
    let plaintext = b"attack at dawn".to_vec();
    Config {
        left_prefix: vec![0xa1; 8],
        right_prefix: vec![0xb2; 8],
        middle: vec![0xc3; 5],
        ciphertext: vec![0; aes::pad(&plaintext).len()],
        plaintext,
        truncation_len: 8,
        suffix_bits: 8,
        workers: 2,
    }
}

#[test]
fn validate_accepts_well_formed_config() {
    assert!(test_config().validate().is_ok());
}

#[test]
fn validate_rejects_bad_segment_lengths() {
    let mut cfg = test_config();
    cfg.middle.push(0);
    assert!(cfg.validate().is_err());

    let mut cfg = test_config();
    cfg.right_prefix.pop();
    assert!(cfg.validate().is_err());
}

#[test]
fn validate_rejects_bad_tunables() {
    let mut cfg = test_config();
    cfg.truncation_len = 0;
    assert!(cfg.validate().is_err());
    cfg.truncation_len = aes::BLOCK_SIZE + 1;
    assert!(cfg.validate().is_err());

    let mut cfg = test_config();
    cfg.suffix_bits = 0;
    assert!(cfg.validate().is_err());
    cfg.suffix_bits = 25;
    assert!(cfg.validate().is_err());

    let mut cfg = test_config();
    cfg.workers = 0;
    assert!(cfg.validate().is_err());
}

#[test]
fn validate_rejects_ciphertext_length_mismatch() {
    let mut cfg = test_config();
    cfg.ciphertext.pop();
    assert!(cfg.validate().is_err());
}

#[test]
fn shards_cover_the_space_in_order() {
    let mut cfg = test_config();
    cfg.suffix_bits = 10;
    cfg.workers = 3;
    let ranges = cfg.shard_ranges();
    assert_eq!(ranges[0].0, 0);
    assert_eq!(ranges.last().unwrap().1, cfg.suffix_space());
    for pair in ranges.windows(2) {
        assert_eq!(pair[0].1, pair[1].0);
    }
    // more workers than candidates still covers everything exactly once
    let mut cfg = test_config();
    cfg.suffix_bits = 1;
    cfg.workers = 7;
    let ranges = cfg.shard_ranges();
    let total: u32 = ranges.iter().map(|(s, e)| e - s).sum();
    assert_eq!(total, 2);
}
