//! AES-128 ECB block primitives and the byte-count padding scheme.
//!
//! Everything here is deliberately single-block oriented: the multi-block
//! helpers run plain ECB over already aligned input and never touch padding.
//! Padding is applied and stripped explicitly by the caller via [`pad`] and
//! [`unpad`].

#[macro_use]
extern crate failure;
extern crate openssl;

use openssl::symm::{Cipher, Crypter, Mode};

use failure::Error;

pub const BLOCK_SIZE: usize = 16;
pub const KEY_SIZE: usize = 16;

#[derive(Debug, Fail)]
pub enum AesError {
    #[fail(display = "invalid padding")]
    InvalidPadding,

    #[fail(display = "key must be {} bytes, got {}", _0, _1)]
    InvalidKeyLength(usize, usize),

    #[fail(display = "input length must be a multiple of {}, got {}", _0, _1)]
    UnalignedInput(usize, usize),
}

fn ecb_crypter(key: &[u8], mode: Mode) -> Result<Crypter, Error> {
    if key.len() != KEY_SIZE {
        return Err(AesError::InvalidKeyLength(KEY_SIZE, key.len()).into());
    }
    let mut crypter = Crypter::new(Cipher::aes_128_ecb(), mode, key, None)?;
    crypter.pad(false);
    Ok(crypter)
}

// With padding disabled an ECB Crypter emits every full input block from
// `update` alone, so a single context can be reused for any number of
// independent blocks under the same key.
fn process_block(crypter: &mut Crypter, block: &[u8; BLOCK_SIZE]) -> Result<[u8; BLOCK_SIZE], Error> {
    let mut buffer = [0; 2 * BLOCK_SIZE];
    let count = crypter.update(block, &mut buffer)?;
    debug_assert_eq!(count, BLOCK_SIZE);
    let mut out = [0; BLOCK_SIZE];
    out.copy_from_slice(&buffer[..BLOCK_SIZE]);
    Ok(out)
}

fn process_aligned(crypter: &mut Crypter, data: &[u8]) -> Result<Vec<u8>, Error> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(AesError::UnalignedInput(BLOCK_SIZE, data.len()).into());
    }
    let mut out = vec![0; data.len() + BLOCK_SIZE];
    let count = crypter.update(data, &mut out)?;
    debug_assert_eq!(count, data.len());
    out.truncate(data.len());
    Ok(out)
}

/// A reusable AES-128 ECB encryption context for a fixed key.
pub struct BlockEncrypter(Crypter);

impl BlockEncrypter {
    pub fn new(key: &[u8]) -> Result<BlockEncrypter, Error> {
        Ok(BlockEncrypter(ecb_crypter(key, Mode::Encrypt)?))
    }

    /// Encrypts one independent block. No chaining, no IV.
    pub fn encrypt_block(&mut self, block: &[u8; BLOCK_SIZE]) -> Result<[u8; BLOCK_SIZE], Error> {
        process_block(&mut self.0, block)
    }

    /// Raw ECB over block-aligned input. Padding is the caller's business.
    pub fn encrypt(&mut self, data: &[u8]) -> Result<Vec<u8>, Error> {
        process_aligned(&mut self.0, data)
    }
}

/// A reusable AES-128 ECB decryption context for a fixed key.
pub struct BlockDecrypter(Crypter);

impl BlockDecrypter {
    pub fn new(key: &[u8]) -> Result<BlockDecrypter, Error> {
        Ok(BlockDecrypter(ecb_crypter(key, Mode::Decrypt)?))
    }

    pub fn decrypt_block(&mut self, block: &[u8; BLOCK_SIZE]) -> Result<[u8; BLOCK_SIZE], Error> {
        process_block(&mut self.0, block)
    }

    pub fn decrypt(&mut self, data: &[u8]) -> Result<Vec<u8>, Error> {
        process_aligned(&mut self.0, data)
    }
}

/// Appends between 1 and `BLOCK_SIZE` padding bytes, each equal to the
/// number of bytes appended. Already aligned input gains a full block.
pub fn pad(u: &[u8]) -> Vec<u8> {
    let p = BLOCK_SIZE - u.len() % BLOCK_SIZE;
    let mut v = Vec::with_capacity(u.len() + p);
    v.extend_from_slice(u);
    v.extend(std::iter::repeat(p as u8).take(p));
    v
}

pub fn padding_valid(u: &[u8]) -> bool {
    if u.is_empty() || u.len() % BLOCK_SIZE != 0 {
        return false;
    }
    let p = u[u.len() - 1] as usize;
    if p == 0 || p > BLOCK_SIZE {
        return false;
    }
    u[u.len() - p..].iter().all(|&b| b == p as u8)
}

pub fn unpad(u: &[u8]) -> Result<Vec<u8>, Error> {
    if !padding_valid(u) {
        return Err(AesError::InvalidPadding.into());
    }
    let p = u[u.len() - 1] as usize;
    Ok(u[..u.len() - p].to_vec())
}

#[test]
fn fips_197_vector() {
    // Appendix C.1 of FIPS-197
    let key = [
        0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
        0x0e, 0x0f,
    ];
    let plaintext = [
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
        0xee, 0xff,
    ];
    let ciphertext = [
        0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70, 0xb4,
        0xc5, 0x5a,
    ];
    let mut enc = BlockEncrypter::new(&key).unwrap();
    assert_eq!(ciphertext, enc.encrypt_block(&plaintext).unwrap());
    let mut dec = BlockDecrypter::new(&key).unwrap();
    assert_eq!(plaintext, dec.decrypt_block(&ciphertext).unwrap());
}

#[test]
fn context_is_reusable_across_blocks() {
    let key = b"YELLOW SUBMARINE";
    let mut enc = BlockEncrypter::new(key).unwrap();
    let a = enc.encrypt_block(b"ABCDEFGHIJKLMNOP").unwrap();
    let b = enc.encrypt_block(b"0123456789abcdef").unwrap();
    let a_again = enc.encrypt_block(b"ABCDEFGHIJKLMNOP").unwrap();
    assert_eq!(a, a_again);
    assert_ne!(a, b);
}

#[test]
fn multi_block_roundtrip() {
    let key = b"YELLOW SUBMARINE";
    let data = b"ABCDEFGHIJKLMNOP0123456789abcdef";
    let ciphertext = BlockEncrypter::new(key).unwrap().encrypt(data).unwrap();
    assert_eq!(ciphertext.len(), data.len());
    let cleartext = BlockDecrypter::new(key)
        .unwrap()
        .decrypt(&ciphertext)
        .unwrap();
    assert_eq!(data.as_ref(), &cleartext[..]);
}

#[test]
fn rejects_bad_key_and_unaligned_input() {
    assert!(BlockEncrypter::new(b"short").is_err());
    let key = b"YELLOW SUBMARINE";
    assert!(BlockEncrypter::new(key).unwrap().encrypt(b"not aligned").is_err());
    assert!(BlockDecrypter::new(key).unwrap().decrypt(&[0; 17]).is_err());
}

#[test]
fn pad_always_pads() {
    assert_eq!(
        b"ICE ICE BABY\x04\x04\x04\x04".as_ref(),
        &pad(b"ICE ICE BABY")[..]
    );
    // aligned input gains a whole block
    let padded = pad(b"ABCDEFGHIJKLMNOP");
    assert_eq!(padded.len(), 2 * BLOCK_SIZE);
    assert!(padded[BLOCK_SIZE..].iter().all(|&b| b == BLOCK_SIZE as u8));
    // empty input pads to one block
    assert_eq!(pad(b"").len(), BLOCK_SIZE);
}

#[test]
fn unpad_roundtrip() {
    for len in 0..=(2 * BLOCK_SIZE) {
        let message = vec![0x41; len];
        assert_eq!(message, unpad(&pad(&message)).unwrap());
    }
}

#[test]
fn unpad_rejects_invalid_padding() {
    // declared count of zero
    let mut u = vec![0x41; BLOCK_SIZE];
    u[BLOCK_SIZE - 1] = 0;
    assert!(unpad(&u).is_err());
    // count exceeding the block size
    u[BLOCK_SIZE - 1] = BLOCK_SIZE as u8 + 1;
    assert!(unpad(&u).is_err());
    // tail bytes disagreeing with the count
    assert!(unpad(b"ICE ICE BABY\x01\x02\x03\x04").is_err());
    assert!(unpad(b"ICE ICE BABY\x05\x05\x05\x05").is_err());
    assert!(unpad(b"ICE ICE BABY\x04\x04\x04\x04").is_ok());
    // unaligned and empty input
    assert!(unpad(b"\x01").is_err());
    assert!(unpad(b"").is_err());
}
