//! CashAddr addresses for Bitcoin Cash and eCash.
//!
//! https://github.com/bitcoincashorg/bitcoincash.org/blob/master/spec/cashaddr.md
//!
//! CashAddr shares the base32 alphabet with bech32 but not the checksum: the
//! prefix expands to the low five bits of each character, the polymod uses its
//! own generators and the checksum is 8 characters long. Only `Fe32` is taken
//! from the bech32 crate, the rest of its helpers are bech32-specific.

use super::{AddressCodec, AddressError, HashPayload, Result};
use crate::bitcoin::{Script, ScriptBuf};
use bech32::Fe32;

const CHECKSUM_LEN: usize = 8;

/// Version byte type bit, set for P2SH.
const TYPE_SCRIPT_HASH: u8 = 0x08;

const GENERATORS: [u64; 5] = [
    0x98f2bc8e61,
    0x79b76d99e2,
    0xf33e5fb3c4,
    0xae2eabe2a8,
    0x1e4f43e470,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CashAddrCodec {
    pub prefix: &'static str,
}

impl CashAddrCodec {
    pub const fn new(prefix: &'static str) -> Self {
        Self { prefix }
    }
}

fn cashaddr_error(msg: &str) -> AddressError {
    AddressError::CashaddrError(msg.to_string())
}

fn to_fe(value: u8) -> Result<Fe32> {
    Fe32::try_from(value).map_err(|_| cashaddr_error("Invalid 5-bit value"))
}

/// Packs bytes into 5-bit groups, zero-padding the last group.
fn bytes_to_fes(data: &[u8]) -> Result<Vec<Fe32>> {
    let mut acc: u32 = 0;
    let mut bits: u8 = 0;
    let mut result = Vec::with_capacity((data.len() * 8).div_ceil(5));

    for &byte in data {
        acc = ((acc << 8) | byte as u32) & 0xfff;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            result.push(to_fe(((acc >> bits) & 0x1f) as u8)?);
        }
    }
    if bits > 0 {
        result.push(to_fe(((acc << (5 - bits)) & 0x1f) as u8)?);
    }
    Ok(result)
}

/// Unpacks 5-bit groups into bytes. Leftover padding must be shorter than a
/// group and all zero.
fn fes_to_bytes(fes: &[Fe32]) -> Result<Vec<u8>> {
    let mut acc: u32 = 0;
    let mut bits: u8 = 0;
    let mut result = Vec::with_capacity(fes.len() * 5 / 8);

    for fe in fes {
        acc = ((acc << 5) | fe.to_u8() as u32) & 0xfff;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            result.push(((acc >> bits) & 0xff) as u8);
        }
    }
    if bits >= 5 || (acc & ((1 << bits) - 1)) != 0 {
        return Err(cashaddr_error("Invalid bit conversion"));
    }
    Ok(result)
}

fn expand_prefix(prefix: &str) -> Vec<u8> {
    prefix
        .bytes()
        .map(|b| b & 0x1f)
        .chain(std::iter::once(0))
        .collect()
}

fn polymod(values: &[u8]) -> u64 {
    let mut c: u64 = 1;
    for &d in values {
        let c0 = (c >> 35) as u8;
        c = ((c & 0x07_ffff_ffff) << 5) ^ d as u64;
        for (i, generator) in GENERATORS.iter().enumerate() {
            if c0 & (1 << i) != 0 {
                c ^= generator;
            }
        }
    }
    c ^ 1
}

fn encode_cashaddr(payload: &HashPayload, prefix: &str) -> Result<String> {
    // size bits are zero for a 160-bit hash
    let version_byte = match payload {
        HashPayload::PubkeyHash(_) => 0x00,
        HashPayload::ScriptHash(_) => TYPE_SCRIPT_HASH,
    };
    let mut bytes = vec![version_byte];
    bytes.extend_from_slice(payload.hash());
    let mut data = bytes_to_fes(&bytes)?;

    let mut checksum_input = expand_prefix(prefix);
    checksum_input.extend(data.iter().map(|fe| fe.to_u8()));
    checksum_input.extend_from_slice(&[0; CHECKSUM_LEN]);
    let checksum = polymod(&checksum_input);
    for i in 0..CHECKSUM_LEN {
        data.push(to_fe(((checksum >> (5 * (CHECKSUM_LEN - 1 - i))) & 0x1f) as u8)?);
    }

    let mut result = String::with_capacity(prefix.len() + 1 + data.len());
    result.push_str(prefix);
    result.push(':');
    result.extend(data.iter().map(|fe| fe.to_char()));
    Ok(result)
}

fn decode_cashaddr(address: &str, expected_prefix: &str) -> Result<HashPayload> {
    let has_lower = address.chars().any(|c| c.is_lowercase());
    let has_upper = address.chars().any(|c| c.is_uppercase());
    if has_lower && has_upper {
        return Err(cashaddr_error("Mixed case address"));
    }
    let address = address.to_lowercase();

    // the prefix may be omitted
    let (prefix, data) = match address.split_once(':') {
        Some((prefix, data)) => (prefix, data),
        None => (expected_prefix, address.as_str()),
    };
    if prefix != expected_prefix {
        return Err(AddressError::CashaddrError(format!(
            "Prefix mismatch: expected {}, got {}",
            expected_prefix, prefix
        )));
    }

    let fes = data
        .chars()
        .map(|ch| {
            Fe32::from_char(ch)
                .map_err(|_| AddressError::CashaddrError(format!("Invalid character: {}", ch)))
        })
        .collect::<Result<Vec<_>>>()?;
    if fes.len() <= CHECKSUM_LEN {
        return Err(cashaddr_error("Address too short"));
    }

    let mut checksum_input = expand_prefix(prefix);
    checksum_input.extend(fes.iter().map(|fe| fe.to_u8()));
    if polymod(&checksum_input) != 0 {
        return Err(cashaddr_error("Invalid checksum"));
    }

    let bytes = fes_to_bytes(&fes[..fes.len() - CHECKSUM_LEN])?;
    let (version_byte, hash) = bytes
        .split_first()
        .ok_or_else(|| cashaddr_error("Empty payload"))?;
    if hash.len() != 20 {
        return Err(cashaddr_error("Invalid hash length"));
    }
    HashPayload::from_slice(hash, version_byte & TYPE_SCRIPT_HASH != 0)
}

impl AddressCodec for CashAddrCodec {
    fn encode(&self, script: &Script) -> Result<String> {
        let payload = HashPayload::from_script(script).map_err(|_| {
            AddressError::UnsupportedScriptType("CashAddr only supports P2PKH and P2SH".to_string())
        })?;
        encode_cashaddr(&payload, self.prefix)
    }

    fn decode(&self, address: &str) -> Result<ScriptBuf> {
        Ok(decode_cashaddr(address, self.prefix)?.to_script())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{BITCOIN_CASH_CASHADDR, ECASH_CASHADDR};
    use rstest::rstest;

    const HASH: &str = "F5BF48B397DAE70BE82B3CCA4793F8EB2B6CDAC9";

    fn payload(hash_hex: &str, p2sh: bool) -> HashPayload {
        HashPayload::from_slice(&hex::decode(hash_hex).unwrap(), p2sh).unwrap()
    }

    #[rstest]
    #[case(HASH, false, "bitcoincash", "bitcoincash:qr6m7j9njldwwzlg9v7v53unlr4jkmx6eylep8ekg2")]
    #[case(HASH, true, "bchtest", "bchtest:pr6m7j9njldwwzlg9v7v53unlr4jkmx6eyvwc0uz5t")]
    #[case(HASH, true, "pref", "pref:pr6m7j9njldwwzlg9v7v53unlr4jkmx6ey65nvtks5")]
    #[case(
        "76a04053bda0a88bda5177b86a15c3b29f559873",
        false,
        "bitcoincash",
        "bitcoincash:qpm2qsznhks23z7629mms6s4cwef74vcwvy22gdx6a"
    )]
    #[case(
        "cb481232299cd5743151ac4b2d63ae198e7bb0a9",
        true,
        "bitcoincash",
        "bitcoincash:pr95sy3j9xwd2ap32xkykttr4cvcu7as4yc93ky28e"
    )]
    fn test_reference_vectors(
        #[case] hash_hex: &str,
        #[case] p2sh: bool,
        #[case] prefix: &str,
        #[case] expected: &str,
    ) {
        let payload = payload(hash_hex, p2sh);
        assert_eq!(encode_cashaddr(&payload, prefix).unwrap(), expected);
        assert_eq!(decode_cashaddr(expected, prefix).unwrap(), payload);
    }

    #[test]
    fn test_prefix_optional_and_uppercase() {
        let expected = payload(HASH, false).to_script();
        for address in [
            "qr6m7j9njldwwzlg9v7v53unlr4jkmx6eylep8ekg2",
            "BITCOINCASH:QR6M7J9NJLDWWZLG9V7V53UNLR4JKMX6EYLEP8EKG2",
        ] {
            assert_eq!(BITCOIN_CASH_CASHADDR.decode(address).unwrap(), expected);
        }
    }

    #[rstest]
    #[case("bitcoincash:Qr6m7j9njldwwzlg9v7v53unlr4jkmx6eylep8ekg2", "Mixed case")]
    #[case("bitcoincash:qr6m7j9njldwwzlg9v7v53unlr4jkmx6eylep8ekg3", "Invalid checksum")]
    #[case("bitcoincash:br6m7j9njldwwzlg9v7v53unlr4jkmx6eylep8ekg2", "Invalid character")]
    #[case("bitcoincash:qr6m", "Address too short")]
    fn test_rejected(#[case] address: &str, #[case] message: &str) {
        let err = BITCOIN_CASH_CASHADDR.decode(address).unwrap_err();
        assert!(err.to_string().contains(message), "{}", err);
    }

    #[test]
    fn test_prefix_mismatch() {
        let err = ECASH_CASHADDR
            .decode("bitcoincash:qr6m7j9njldwwzlg9v7v53unlr4jkmx6eylep8ekg2")
            .unwrap_err();
        assert!(err.to_string().contains("Prefix mismatch"));
    }

    #[test]
    fn test_nonzero_padding_rejected() {
        // 21 bytes -> 34 groups with 2 padding bits; set one of them
        let mut fes = bytes_to_fes(&[0u8; 21]).unwrap();
        let last = fes.len() - 1;
        fes[last] = Fe32::try_from(1u8).unwrap();
        assert!(fes_to_bytes(&fes).is_err());
    }
}
