//! Stellar-style strkey address encoding (spec §6).
//!
//! `base32(version_byte ‖ 32-byte key ‖ 2-byte CRC16-XMODOM)`, no padding.
//! Public addresses are 56 characters starting with `'G'`; seeds are 56
//! characters starting with `'S'`.

use crate::crypto::{PublicKey, Seed};
use crate::error::{Error, Result};

const VERSION_ACCOUNT_ID: u8 = 6 << 3;
const VERSION_SEED: u8 = 18 << 3;

const BASE32_ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

fn base32_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity((bytes.len() * 8 + 4) / 5);
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;
    for &byte in bytes {
        buffer = (buffer << 8) | byte as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            let index = (buffer >> bits) & 0x1f;
            out.push(BASE32_ALPHABET[index as usize] as char);
        }
    }
    if bits > 0 {
        let index = (buffer << (5 - bits)) & 0x1f;
        out.push(BASE32_ALPHABET[index as usize] as char);
    }
    out
}

fn base32_decode(s: &str) -> Result<Vec<u8>> {
    let mut buffer: u32 = 0;
    let mut bits: u32 = 0;
    let mut out = Vec::with_capacity(s.len() * 5 / 8);
    for ch in s.chars() {
        let ch = ch.to_ascii_uppercase();
        let value = BASE32_ALPHABET
            .iter()
            .position(|&c| c as char == ch)
            .ok_or_else(|| Error::MalformedAddress(format!("invalid base32 character '{ch}'")))?
            as u32;
        buffer = (buffer << 5) | value;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push(((buffer >> bits) & 0xff) as u8);
        }
    }
    Ok(out)
}

/// CRC16/XMODEM: poly `0x1021`, MSB-first, initial value `0`.
fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

fn encode_strkey(version: u8, key: &[u8; 32]) -> String {
    let mut payload = Vec::with_capacity(35);
    payload.push(version);
    payload.extend_from_slice(key);
    let crc = crc16_xmodem(&payload);
    payload.push((crc & 0xff) as u8);
    payload.push((crc >> 8) as u8);
    base32_encode(&payload)
}

fn decode_strkey(s: &str, expected_version: u8) -> Result<[u8; 32]> {
    let payload = base32_decode(s)?;
    if payload.len() != 35 {
        return Err(Error::MalformedAddress(format!(
            "expected 35 decoded bytes, got {}",
            payload.len()
        )));
    }
    let version = payload[0];
    if version != expected_version {
        return Err(Error::MalformedAddress(format!(
            "unexpected version byte {version:#x}"
        )));
    }
    let body = &payload[..33];
    let crc_expected = crc16_xmodem(body);
    let crc_actual = payload[33] as u16 | ((payload[34] as u16) << 8);
    if crc_expected != crc_actual {
        return Err(Error::MalformedAddress("CRC16 mismatch".into()));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&payload[1..33]);
    Ok(key)
}

/// A public key rendered as a 56-character address beginning with `'G'`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AccountId(pub PublicKey);

impl AccountId {
    pub fn to_string(&self) -> String {
        encode_strkey(VERSION_ACCOUNT_ID, &self.0 .0)
    }

    pub fn from_string(s: &str) -> Result<Self> {
        let key = decode_strkey(s, VERSION_ACCOUNT_ID)?;
        Ok(AccountId(PublicKey(key)))
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string())
    }
}

/// A seed rendered as a 56-character address beginning with `'S'`.
pub struct SeedAddress(pub Seed);

impl SeedAddress {
    pub fn to_string(&self) -> String {
        encode_strkey(VERSION_SEED, &self.0 .0)
    }

    pub fn from_string(s: &str) -> Result<Self> {
        let key = decode_strkey(s, VERSION_SEED)?;
        Ok(SeedAddress(Seed(key)))
    }
}

impl std::fmt::Display for SeedAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_round_trip() {
        let addr = "GDD5RFGBIUAFCOXQA246BOUPHCK7ZL2NSHDU7DVAPNPTJJKVPJMNLQFW";
        let decoded = AccountId::from_string(addr).expect("valid address");
        assert_eq!(decoded.to_string(), addr);
    }

    #[test]
    fn rejects_bad_crc() {
        let addr = "GDD5RFGBIUAFCOXQA246BOUPHCK7ZL2NSHDU7DVAPNPTJJKVPJMNLQFX";
        assert!(AccountId::from_string(addr).is_err());
    }

    #[test]
    fn rejects_wrong_version() {
        let seed = "SBBUWIMSX5VL4KVFKY44GF6Q6R5LS2Z5B7CTAZBNCNPLS4UKFVDXC7TQ";
        assert!(AccountId::from_string(seed).is_err());
    }
}
