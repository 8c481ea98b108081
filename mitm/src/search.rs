use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use aes::{pad, unpad, BlockDecrypter, BlockEncrypter, BLOCK_SIZE};
use failure::Error;

use crate::config::Config;
use crate::key::KeyBuilder;
use crate::table::{self, LookupTable, CANCEL_POLL_MASK};

/// The sole authoritative output of a search: produced only after the full
/// known ciphertext has been reproduced from the full known plaintext under
/// the reconstructed key pair, never from a table hit alone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recovery {
    pub left_suffix: u32,
    pub right_suffix: u32,
    pub left_key: Vec<u8>,
    pub right_key: Vec<u8>,
}

/// How a search ended. Exhaustion and cancellation are ordinary outcomes,
/// distinct from each other and from configuration errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Found(Recovery),
    Exhausted,
    Cancelled,
}

/// Builds the left table, then searches the right side. Equivalent to
/// [`recover_with_cancel`] with a flag nobody ever raises.
pub fn recover(cfg: &Config) -> Result<Outcome, Error> {
    recover_with_cancel(cfg, &Arc::new(AtomicBool::new(false)))
}

pub fn recover_with_cancel(cfg: &Config, cancel: &Arc<AtomicBool>) -> Result<Outcome, Error> {
    cfg.validate()?;
    let table = match table::build(cfg, cancel)? {
        Some(table) => Arc::new(table),
        None => return Ok(Outcome::Cancelled),
    };
    search(cfg, &table, cancel)
}

/// Enumerates the right suffix space ascending over the completed table.
/// Terminates early on the first verified match; a raised cancellation flag
/// yields `Cancelled`, a fully enumerated space without a match `Exhausted`.
pub fn search(
    cfg: &Config,
    table: &Arc<LookupTable>,
    cancel: &Arc<AtomicBool>,
) -> Result<Outcome, Error> {
    cfg.validate()?;
    let padded = pad(&cfg.plaintext);
    let mut first_block = [0; BLOCK_SIZE];
    first_block.copy_from_slice(&cfg.ciphertext[..BLOCK_SIZE]);

    let found = Arc::new(AtomicBool::new(false));
    let mut handles = Vec::with_capacity(cfg.workers);
    for (start, end) in cfg.shard_ranges() {
        let table = Arc::clone(table);
        let left_prefix = cfg.left_prefix.clone();
        let right_prefix = cfg.right_prefix.clone();
        let middle = cfg.middle.clone();
        let padded = padded.clone();
        let ciphertext = cfg.ciphertext.clone();
        let cancel = Arc::clone(cancel);
        let found = Arc::clone(&found);
        handles.push(thread::spawn(move || {
            search_range(
                &table,
                &left_prefix,
                &right_prefix,
                &middle,
                &padded,
                &ciphertext,
                &first_block,
                start,
                end,
                &cancel,
                &found,
            )
        }));
    }

    let mut results = Vec::new();
    for handle in handles {
        let result = handle
            .join()
            .map_err(|_| format_err!("search worker panicked"))??;
        if let Some(recovery) = result {
            results.push(recovery);
        }
    }

    // More than one verified pair is only possible for an over-determined
    // puzzle; picking the smallest right suffix matches the result of a
    // single ascending enumeration.
    if let Some(best) = results
        .into_iter()
        .min_by_key(|r| (r.right_suffix, r.left_suffix))
    {
        return Ok(Outcome::Found(best));
    }
    if cancel.load(Ordering::SeqCst) {
        return Ok(Outcome::Cancelled);
    }
    Ok(Outcome::Exhausted)
}

fn search_range(
    table: &LookupTable,
    left_prefix: &[u8],
    right_prefix: &[u8],
    middle: &[u8],
    padded: &[u8],
    ciphertext: &[u8],
    first_block: &[u8; BLOCK_SIZE],
    start: u32,
    end: u32,
    cancel: &AtomicBool,
    found: &AtomicBool,
) -> Result<Option<Recovery>, Error> {
    let mut right_builder = KeyBuilder::new(right_prefix, middle)?;
    let mut left_builder = KeyBuilder::new(left_prefix, middle)?;
    let truncation_len = table.truncation_len();

    for (i, suffix) in (start..end).enumerate() {
        if i & CANCEL_POLL_MASK == 0
            && (cancel.load(Ordering::Relaxed) || found.load(Ordering::Relaxed))
        {
            return Ok(None);
        }

        let right_key = right_builder.key(suffix);
        let mut cipher = BlockDecrypter::new(right_key)?;
        let intermediate = cipher.decrypt_block(first_block)?;

        let bucket = match table.bucket(&intermediate[..truncation_len]) {
            Some(bucket) => bucket,
            None => continue,
        };
        for candidate in bucket {
            // A truncated-prefix hit with a differing full block is an
            // expected collision, not an error.
            if candidate.block != intermediate {
                continue;
            }
            let left_key = left_builder.key(candidate.suffix);
            if verify_padded(left_key, right_key, padded, ciphertext)? {
                found.store(true, Ordering::SeqCst);
                return Ok(Some(Recovery {
                    left_suffix: candidate.suffix,
                    right_suffix: suffix,
                    left_key: left_key.to_vec(),
                    right_key: right_key.to_vec(),
                }));
            }
        }
    }
    Ok(None)
}

fn verify_padded(
    left_key: &[u8],
    right_key: &[u8],
    padded: &[u8],
    ciphertext: &[u8],
) -> Result<bool, Error> {
    let inner = BlockEncrypter::new(left_key)?.encrypt(padded)?;
    let outer = BlockEncrypter::new(right_key)?.encrypt(&inner)?;
    Ok(outer == ciphertext)
}

/// Full-message check that a key pair reproduces `ciphertext` from the
/// unpadded `plaintext`.
pub fn verify_pair(
    left_key: &[u8],
    right_key: &[u8],
    plaintext: &[u8],
    ciphertext: &[u8],
) -> Result<bool, Error> {
    verify_padded(left_key, right_key, &pad(plaintext), ciphertext)
}

/// Two-stage decryption under a recovered key pair: outer stage first, then
/// the inner one, then the padding comes off. A padding failure here means
/// the pair does not fit this ciphertext; it surfaces as an error for the
/// caller to treat as a rejection.
pub fn decrypt_with_pair(
    left_key: &[u8],
    right_key: &[u8],
    ciphertext: &[u8],
) -> Result<Vec<u8>, Error> {
    let inner = BlockDecrypter::new(right_key)?.decrypt(ciphertext)?;
    let padded = BlockDecrypter::new(left_key)?.decrypt(&inner)?;
    unpad(&padded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::key::suffix_bytes;
    use serialize::from_hex;

    // The fixed puzzle instance.
    const LEFT_PREFIX: &str = "a3f19c8d4e6b72f0";
    const RIGHT_PREFIX: &str = "5e8b41c2d9f07a36";
    const MIDDLE: &str = "e2377ecff7";
    const PLAINTEXT: &[u8] = b"This is a top secret message. Do not share it with anyone!";
    const CIPHERTEXT: &str = "3e40001d1bc6d179551288606d9404914c002383a158dbc45748957a845b3195eaf9ac3f1e34dc2ef8888c70399ec0acbed366b8e1fcc8b501f5763fe91862a3";
    const LEFT_SUFFIX: u32 = 0x0047_b2cd;
    const RIGHT_SUFFIX: u32 = 0x008e_725f;

    fn puzzle_config(workers: usize) -> Config {
        Config {
            left_prefix: from_hex(LEFT_PREFIX).unwrap(),
            right_prefix: from_hex(RIGHT_PREFIX).unwrap(),
            middle: from_hex(MIDDLE).unwrap(),
            plaintext: PLAINTEXT.to_vec(),
            ciphertext: from_hex(CIPHERTEXT).unwrap(),
            truncation_len: 8,
            suffix_bits: 24,
            workers,
        }
    }

    fn puzzle_key(prefix: &str, suffix: u32) -> Vec<u8> {
        let mut key = from_hex(prefix).unwrap();
        key.extend_from_slice(&from_hex(MIDDLE).unwrap());
        key.extend_from_slice(&suffix_bytes(suffix));
        key
    }

    // Builds a small synthetic instance around two chosen secret suffixes.
    fn synthetic_config(left_suffix: u32, right_suffix: u32, suffix_bits: u32) -> Config {
        let mut cfg = test_config();
        cfg.suffix_bits = suffix_bits;
        cfg.plaintext = b"the eagle has landed, repeat, the eagle has landed".to_vec();
        let mut left_builder = KeyBuilder::new(&cfg.left_prefix, &cfg.middle).unwrap();
        let mut right_builder = KeyBuilder::new(&cfg.right_prefix, &cfg.middle).unwrap();
        let inner = BlockEncrypter::new(left_builder.key(left_suffix))
            .unwrap()
            .encrypt(&pad(&cfg.plaintext))
            .unwrap();
        cfg.ciphertext = BlockEncrypter::new(right_builder.key(right_suffix))
            .unwrap()
            .encrypt(&inner)
            .unwrap();
        cfg
    }

    #[test]
    fn recovers_a_synthetic_pair() {
        let cfg = synthetic_config(0x0531, 0x0ace, 12);
        match recover(&cfg).unwrap() {
            Outcome::Found(recovery) => {
                assert_eq!(recovery.left_suffix, 0x0531);
                assert_eq!(recovery.right_suffix, 0x0ace);
                assert_eq!(&recovery.left_key[..8], &cfg.left_prefix[..]);
                assert_eq!(&recovery.right_key[..8], &cfg.right_prefix[..]);
                assert!(
                    verify_pair(&recovery.left_key, &recovery.right_key, &cfg.plaintext, &cfg.ciphertext)
                        .unwrap()
                );
                assert_eq!(
                    cfg.plaintext,
                    decrypt_with_pair(&recovery.left_key, &recovery.right_key, &cfg.ciphertext)
                        .unwrap()
                );
            }
            other => panic!("expected a recovery, got {:?}", other),
        }
    }

    #[test]
    fn boundary_suffixes_are_reachable() {
        let max = (1 << 10) - 1;
        let cfg = synthetic_config(0, max, 10);
        match recover(&cfg).unwrap() {
            Outcome::Found(recovery) => {
                assert_eq!(recovery.left_suffix, 0);
                assert_eq!(recovery.right_suffix, max);
            }
            other => panic!("expected a recovery, got {:?}", other),
        }
    }

    #[test]
    fn search_is_deterministic() {
        let mut cfg = synthetic_config(0x013, 0x0f2, 10);
        cfg.workers = 4;
        let first = recover(&cfg).unwrap();
        let second = recover(&cfg).unwrap();
        assert_eq!(first, second);
        match first {
            Outcome::Found(_) => {}
            other => panic!("expected a recovery, got {:?}", other),
        }
    }

    #[test]
    fn full_block_truncation_still_recovers() {
        let mut cfg = synthetic_config(0x21, 0x42, 8);
        cfg.truncation_len = BLOCK_SIZE;
        match recover(&cfg).unwrap() {
            Outcome::Found(recovery) => {
                assert_eq!(recovery.left_suffix, 0x21);
                assert_eq!(recovery.right_suffix, 0x42);
            }
            other => panic!("expected a recovery, got {:?}", other),
        }
    }

    #[test]
    fn mismatched_ciphertext_exhausts_the_space() {
        let mut cfg = synthetic_config(0x11, 0x2e, 8);
        // keep the first block intact so bucket hits still occur and the
        // full verification is what rejects them
        let last = cfg.ciphertext.len() - 1;
        cfg.ciphertext[last] ^= 0x01;
        assert_eq!(Outcome::Exhausted, recover(&cfg).unwrap());
    }

    #[test]
    fn cancellation_reports_cancelled_not_exhausted() {
        let cfg = synthetic_config(0x11, 0x2e, 8);
        let cancel = Arc::new(AtomicBool::new(true));
        assert_eq!(Outcome::Cancelled, recover_with_cancel(&cfg, &cancel).unwrap());
    }

    #[test]
    fn rejects_invalid_configuration() {
        let mut cfg = synthetic_config(0x11, 0x2e, 8);
        cfg.middle.push(0);
        assert!(recover(&cfg).is_err());
    }

    #[test]
    fn known_puzzle_keys_verify_and_decrypt() {
        let cfg = puzzle_config(1);
        let left_key = puzzle_key(LEFT_PREFIX, LEFT_SUFFIX);
        let right_key = puzzle_key(RIGHT_PREFIX, RIGHT_SUFFIX);
        assert!(verify_pair(&left_key, &right_key, &cfg.plaintext, &cfg.ciphertext).unwrap());
        assert_eq!(
            cfg.plaintext,
            decrypt_with_pair(&left_key, &right_key, &cfg.ciphertext).unwrap()
        );

        // an unrelated pair must fail verification
        let other = puzzle_key(RIGHT_PREFIX, LEFT_SUFFIX);
        assert!(!verify_pair(&other, &right_key, &cfg.plaintext, &cfg.ciphertext).unwrap());
        assert!(decrypt_with_pair(&other, &right_key, &cfg.ciphertext).is_err());
    }

    // The real 2^24 search. Takes minutes; run with --ignored for the full
    // end-to-end recovery.
    #[test]
    #[ignore]
    fn full_puzzle_search() {
        let cfg = puzzle_config(8);
        match recover(&cfg).unwrap() {
            Outcome::Found(recovery) => {
                assert_eq!(recovery.left_suffix, LEFT_SUFFIX);
                assert_eq!(recovery.right_suffix, RIGHT_SUFFIX);
                assert_eq!(recovery.left_key, puzzle_key(LEFT_PREFIX, LEFT_SUFFIX));
                assert_eq!(recovery.right_key, puzzle_key(RIGHT_PREFIX, RIGHT_SUFFIX));
            }
            other => panic!("expected a recovery, got {:?}", other),
        }
    }
}
