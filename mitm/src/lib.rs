//! Meet-in-the-middle key recovery against a two-stage AES-128 construction.
//!
//! Both stage keys are `prefix ‖ middle ‖ suffix` with known prefix and
//! middle segments and an unknown 3-byte suffix. The left side enumerates
//! its suffix space once, encrypting a reference block into a table bucketed
//! by a truncated prefix of the result; the right side enumerates its own
//! space, decrypting the first ciphertext block and probing the table.
//! Bucket hits are only trusted after reproducing the entire ciphertext
//! from the entire plaintext under the reconstructed key pair.

#[macro_use]
extern crate failure;

extern crate aes;

pub mod config;
pub mod errors;
pub mod key;
pub mod search;
pub mod table;

pub use crate::config::Config;
pub use crate::errors::MitmError;
pub use crate::search::{
    decrypt_with_pair, recover, recover_with_cancel, search, verify_pair, Outcome, Recovery,
};
pub use crate::table::{Candidate, LookupTable};
