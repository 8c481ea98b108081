use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use aes::{pad, BlockEncrypter, BLOCK_SIZE};
use failure::Error;

use crate::config::Config;
use crate::key::KeyBuilder;

/// Workers poll the cancellation flag once per this many candidates.
pub(crate) const CANCEL_POLL_MASK: usize = 0xfff;

/// One enumerated left-side candidate: the full intermediate block and the
/// suffix that produced it. Immutable once inserted.
pub struct Candidate {
    pub block: [u8; BLOCK_SIZE],
    pub suffix: u32,
}

/// The left-side lookup table: buckets of candidates keyed by a truncated
/// prefix of their intermediate block. Built once, read-only afterwards,
/// discarded with the run. This is the dominant memory cost of a search.
pub struct LookupTable {
    buckets: HashMap<Vec<u8>, Vec<Candidate>>,
    truncation_len: usize,
    entries: usize,
}

impl LookupTable {
    fn with_truncation(truncation_len: usize) -> LookupTable {
        LookupTable {
            buckets: HashMap::new(),
            truncation_len,
            entries: 0,
        }
    }

    fn insert(&mut self, block: [u8; BLOCK_SIZE], suffix: u32) {
        self.buckets
            .entry(block[..self.truncation_len].to_vec())
            .or_insert_with(Vec::new)
            .push(Candidate { block, suffix });
        self.entries += 1;
    }

    /// Appends a shard built over a later suffix range. Calling this in
    /// ascending shard order keeps every bucket sorted by suffix.
    fn merge(&mut self, other: LookupTable) {
        debug_assert_eq!(self.truncation_len, other.truncation_len);
        self.entries += other.entries;
        for (key, mut candidates) in other.buckets {
            self.buckets
                .entry(key)
                .or_insert_with(Vec::new)
                .append(&mut candidates);
        }
    }

    pub fn bucket(&self, truncated_prefix: &[u8]) -> Option<&[Candidate]> {
        self.buckets.get(truncated_prefix).map(|b| &b[..])
    }

    pub fn truncation_len(&self) -> usize {
        self.truncation_len
    }

    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn buckets(&self) -> impl Iterator<Item = (&[u8], &[Candidate])> {
        self.buckets.iter().map(|(k, v)| (&k[..], &v[..]))
    }
}

/// Enumerates the full left suffix space ascending, encrypting the first
/// block of the padded plaintext under every candidate key. There is no
/// early termination: the table must be complete before searching starts.
/// `Ok(None)` means the build observed the cancellation flag.
pub fn build(cfg: &Config, cancel: &Arc<AtomicBool>) -> Result<Option<LookupTable>, Error> {
    let padded = pad(&cfg.plaintext);
    let mut reference = [0; BLOCK_SIZE];
    reference.copy_from_slice(&padded[..BLOCK_SIZE]);

    let mut handles = Vec::with_capacity(cfg.workers);
    for (start, end) in cfg.shard_ranges() {
        let prefix = cfg.left_prefix.clone();
        let middle = cfg.middle.clone();
        let truncation_len = cfg.truncation_len;
        let cancel = Arc::clone(cancel);
        handles.push(thread::spawn(move || {
            build_range(&prefix, &middle, &reference, truncation_len, start, end, &cancel)
        }));
    }

    let mut table = LookupTable::with_truncation(cfg.truncation_len);
    let mut cancelled = false;
    for handle in handles {
        let shard = handle
            .join()
            .map_err(|_| format_err!("table build worker panicked"))??;
        match shard {
            Some(shard) => table.merge(shard),
            None => cancelled = true,
        }
    }
    if cancelled {
        return Ok(None);
    }
    Ok(Some(table))
}

fn build_range(
    prefix: &[u8],
    middle: &[u8],
    reference: &[u8; BLOCK_SIZE],
    truncation_len: usize,
    start: u32,
    end: u32,
    cancel: &AtomicBool,
) -> Result<Option<LookupTable>, Error> {
    let mut builder = KeyBuilder::new(prefix, middle)?;
    let mut table = LookupTable::with_truncation(truncation_len);
    for (i, suffix) in (start..end).enumerate() {
        if i & CANCEL_POLL_MASK == 0 && cancel.load(Ordering::Relaxed) {
            return Ok(None);
        }
        let mut cipher = BlockEncrypter::new(builder.key(suffix))?;
        table.insert(cipher.encrypt_block(reference)?, suffix);
    }
    Ok(Some(table))
}

#[cfg(test)]
fn built(cfg: &Config) -> LookupTable {
    build(cfg, &Arc::new(AtomicBool::new(false)))
        .unwrap()
        .unwrap()
}

#[test]
fn table_is_complete_and_buckets_agree_with_their_key() {
    let mut cfg = crate::config::test_config();
    cfg.suffix_bits = 10;
    cfg.truncation_len = 1;
    cfg.workers = 3;
    let table = built(&cfg);

    assert_eq!(table.entries(), cfg.suffix_space() as usize);
    let mut seen = 0;
    for (key, candidates) in table.buckets() {
        for candidate in candidates {
            assert_eq!(key, &candidate.block[..table.truncation_len()]);
            seen += 1;
        }
    }
    assert_eq!(seen, table.entries());
}

#[test]
fn bucket_entries_stay_in_ascending_suffix_order() {
    let mut cfg = crate::config::test_config();
    cfg.suffix_bits = 10;
    cfg.truncation_len = 1;
    cfg.workers = 4;
    let table = built(&cfg);
    for (_, candidates) in table.buckets() {
        for pair in candidates.windows(2) {
            assert!(pair[0].suffix < pair[1].suffix);
        }
    }
}

#[test]
fn full_block_truncation_degenerates_to_exact_lookup() {
    let mut cfg = crate::config::test_config();
    cfg.suffix_bits = 10;
    cfg.truncation_len = BLOCK_SIZE;
    let table = built(&cfg);
    assert_eq!(table.bucket_count(), table.entries());
    for (_, candidates) in table.buckets() {
        assert_eq!(candidates.len(), 1);
    }
}

#[test]
fn worker_count_does_not_change_the_table() {
    let mut cfg = crate::config::test_config();
    cfg.suffix_bits = 9;
    cfg.truncation_len = 2;
    cfg.workers = 1;
    let single = built(&cfg);
    cfg.workers = 5;
    let sharded = built(&cfg);

    assert_eq!(single.entries(), sharded.entries());
    assert_eq!(single.bucket_count(), sharded.bucket_count());
    for (key, candidates) in single.buckets() {
        let other = sharded.bucket(key).unwrap();
        assert_eq!(candidates.len(), other.len());
        for (a, b) in candidates.iter().zip(other) {
            assert_eq!(a.suffix, b.suffix);
            assert_eq!(a.block, b.block);
        }
    }
}

#[test]
fn build_honours_cancellation() {
    let cfg = crate::config::test_config();
    let cancel = Arc::new(AtomicBool::new(true));
    assert!(build(&cfg, &cancel).unwrap().is_none());
}
