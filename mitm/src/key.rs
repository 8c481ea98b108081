use aes::KEY_SIZE;
use failure::Error;

use crate::errors::MitmError;

/// Width of the enumerated key suffix. The wire encoding is fixed even when
/// a run restricts the enumeration to fewer bits.
pub const SUFFIX_LEN: usize = 3;
pub const SUFFIX_BITS_MAX: u32 = (SUFFIX_LEN * 8) as u32;

/// Big-endian 24-bit encoding of a suffix counter.
pub fn suffix_bytes(suffix: u32) -> [u8; SUFFIX_LEN] {
    debug_assert!(suffix < (1 << SUFFIX_BITS_MAX));
    let b = suffix.to_be_bytes();
    [b[1], b[2], b[3]]
}

/// Builds `prefix ‖ middle ‖ suffix` keys. The fixed segments are validated
/// and written once at construction; enumerating a candidate only patches
/// the trailing suffix bytes, so the hot loops never allocate here.
pub struct KeyBuilder {
    key: [u8; KEY_SIZE],
}

impl KeyBuilder {
    pub fn new(prefix: &[u8], middle: &[u8]) -> Result<KeyBuilder, Error> {
        let total = prefix.len() + middle.len() + SUFFIX_LEN;
        if total != KEY_SIZE {
            return Err(MitmError::KeyLengthMismatch {
                expected: KEY_SIZE,
                actual: total,
            }
            .into());
        }
        let mut key = [0; KEY_SIZE];
        key[..prefix.len()].copy_from_slice(prefix);
        key[prefix.len()..prefix.len() + middle.len()].copy_from_slice(middle);
        Ok(KeyBuilder { key })
    }

    pub fn key(&mut self, suffix: u32) -> &[u8; KEY_SIZE] {
        self.key[KEY_SIZE - SUFFIX_LEN..].copy_from_slice(&suffix_bytes(suffix));
        &self.key
    }
}

#[test]
fn suffix_bytes_are_big_endian() {
    assert_eq!([0x47, 0xb2, 0xcd], suffix_bytes(0x0047_b2cd));
    assert_eq!([0, 0, 0], suffix_bytes(0));
    assert_eq!([0xff, 0xff, 0xff], suffix_bytes(0x00ff_ffff));
}

#[test]
fn keys_concatenate_the_segments() {
    let mut builder = KeyBuilder::new(&[1, 2, 3, 4, 5, 6, 7, 8], &[9, 10, 11, 12, 13]).unwrap();
    assert_eq!(
        &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 0xaa, 0xbb, 0xcc],
        builder.key(0x00aa_bbcc)
    );
}

#[test]
fn distinct_suffixes_give_distinct_keys() {
    let mut builder = KeyBuilder::new(&[0; 8], &[0; 5]).unwrap();
    let a = *builder.key(0);
    let b = *builder.key(1);
    let max = *builder.key((1 << SUFFIX_BITS_MAX) - 1);
    assert_ne!(a, b);
    assert_ne!(a, max);
    assert_ne!(b, max);
    assert_eq!(a.len(), KEY_SIZE);
}

#[test]
fn rejects_segment_length_mismatch() {
    assert!(KeyBuilder::new(&[0; 8], &[0; 4]).is_err());
    assert!(KeyBuilder::new(&[0; 9], &[0; 5]).is_err());
    assert!(KeyBuilder::new(&[0; 13], &[]).is_ok());
}
