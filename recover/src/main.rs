//! Runs the fixed puzzle instance: recovers both stage keys with the
//! meet-in-the-middle engine, then decrypts the second message and prints
//! the withdraw calldata and its block-hash preimage.
//!
//! All puzzle constants live here, as configuration handed to the engine.

extern crate abi;
#[macro_use]
extern crate failure;
extern crate mitm;
extern crate serialize;
extern crate toyhash;

use std::process;
use std::thread;
use std::time::Instant;

use failure::Error;
use mitm::key::suffix_bytes;
use mitm::{Config, Outcome};
use serialize::Serialize;

const LEFT_PREFIX: &str = "a3f19c8d4e6b72f0";
const RIGHT_PREFIX: &str = "5e8b41c2d9f07a36";
const MIDDLE: &str = "e2377ecff7";
const PLAINTEXT: &[u8] = b"This is a top secret message. Do not share it with anyone!";
const CIPHERTEXT: &str = "3e40001d1bc6d179551288606d9404914c002383a158dbc45748957a845b3195eaf9ac3f1e34dc2ef8888c70399ec0acbed366b8e1fcc8b501f5763fe91862a3";
const SECOND_CIPHERTEXT: &str = "f0f1f84d807d9bfdf416a18ac5ab9c3b1a7a06e7b69e020d435ac230c6f1695e50dc5a139d217332f270363bdccffe1b";

const RECEIVER: &str = "0xc40ae171869eF802090144Bdc4511C6D2855D3f3";
const SALT: &str = "0x2942164490202799";
const AMOUNT_WEI: u64 = 1_000_000_000_000_000;

fn main() {
    match run() {
        Ok(true) => {}
        Ok(false) => {
            println!("[-] no matching key pair found");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(2);
        }
    }
}

fn hex(s: &str) -> Result<Vec<u8>, Error> {
    serialize::from_hex(s).map_err(|e| format_err!("malformed hex constant: {}", e))
}

fn run() -> Result<bool, Error> {
    let workers = thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    let cfg = Config {
        left_prefix: hex(LEFT_PREFIX)?,
        right_prefix: hex(RIGHT_PREFIX)?,
        middle: hex(MIDDLE)?,
        plaintext: PLAINTEXT.to_vec(),
        ciphertext: hex(CIPHERTEXT)?,
        truncation_len: 8,
        suffix_bits: 24,
        workers,
    };

    println!(
        "[*] meet-in-the-middle over 2 x {} candidates on {} workers",
        cfg.suffix_space(),
        workers
    );
    let start = Instant::now();
    let recovery = match mitm::recover(&cfg)? {
        Outcome::Found(recovery) => recovery,
        Outcome::Exhausted | Outcome::Cancelled => return Ok(false),
    };
    println!("[+] key pair found in {:.1}s", start.elapsed().as_secs_f64());
    println!("    X  = {}", suffix_bytes(recovery.left_suffix).to_hex());
    println!("    Y  = {}", suffix_bytes(recovery.right_suffix).to_hex());
    println!("    K1 = {}", recovery.left_key.to_hex());
    println!("    K2 = {}", recovery.right_key.to_hex());

    let second = mitm::decrypt_with_pair(
        &recovery.left_key,
        &recovery.right_key,
        &hex(SECOND_CIPHERTEXT)?,
    )?;
    println!("[+] second message: {}", String::from_utf8_lossy(&second));

    let calldata = abi::withdraw_calldata(RECEIVER, SALT, AMOUNT_WEI)?;
    let preimage = abi::toyhash_preimage(SALT, RECEIVER, AMOUNT_WEI)?;
    println!("[+] withdraw calldata: {}", calldata);
    println!("[+] preimage {} hashes to {}", preimage, toyhash::toyhash(&preimage)?);
    Ok(true)
}
