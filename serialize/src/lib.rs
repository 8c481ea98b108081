#[macro_use]
extern crate error_chain;

use std::char;

error_chain! {
    errors {}
}

pub trait Serialize {
    fn to_hex(&self) -> String;
}

impl Serialize for [u8] {
    fn to_hex(&self) -> String {
        let mut u4 = Vec::with_capacity(2 * self.len());
        for u in self {
            u4.push(u >> 4);
            u4.push(u & 0xf);
        }
        u4.iter()
            .map(|&u| char::from_digit(u32::from(u), 16).unwrap())
            .collect()
    }
}

pub fn from_hex(s: &str) -> Result<Vec<u8>> {
    if s.len() % 2 != 0 {
        bail!("input length needs to be multiple of 2");
    }

    let mut digits = Vec::with_capacity(s.len());
    for c in s.chars() {
        digits.push(u8_from_hex(c).chain_err(|| format!("not a valid hex string: {}", s))?);
    }
    Ok(digits
        .chunks(2)
        .map(|c| (c[0] << 4) + c[1])
        .collect::<Vec<u8>>())
}

fn u8_from_hex(c: char) -> Result<u8> {
    match c.to_digit(16) {
        Some(i) => Ok(i as u8),
        _ => bail!(format!("invalid character {}", c)),
    }
}

#[test]
fn hex_roundtrip() {
    let u = vec![0x00, 0x01, 0x9f, 0xa3, 0xff];
    assert_eq!("00019fa3ff", u.to_hex());
    assert_eq!(u, from_hex(&u.to_hex()).unwrap());
}

#[test]
fn hex_is_lowercase() {
    assert_eq!("deadbeef", from_hex("DEADBEEF").unwrap().to_hex());
}

#[test]
fn from_hex_rejects_invalid_input() {
    assert!(from_hex("abc").is_err());
    assert!(from_hex("zz").is_err());
}
