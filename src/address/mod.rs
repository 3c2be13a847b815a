//! Output script <-> address string codecs.
//!
//! Three grammars are covered:
//! - Base58Check for P2PKH and P2SH, including Zcash two-byte versions
//! - Bech32 and Bech32m for witness programs
//! - CashAddr for Bitcoin Cash and eCash
//!
//! Each network exposes a default encoding and, for the cash-style chains,
//! an alternate one selected with [`AddressFormat`].

mod base58check;
mod bech32;
pub mod cashaddr;
pub mod networks;

pub use base58check::Base58CheckCodec;
pub use bech32::Bech32Codec;
pub use cashaddr::CashAddrCodec;
pub use networks::{
    from_output_script_with_coin, from_output_script_with_network,
    from_output_script_with_network_and_format, to_output_script_with_coin,
    to_output_script_with_network, AddressFormat,
};

use crate::bitcoin::hashes::Hash;
use crate::bitcoin::{PubkeyHash, Script, ScriptBuf, ScriptHash};
use std::fmt;

#[derive(Debug)]
pub enum AddressError {
    InvalidScript(String),
    InvalidAddress(String),
    UnsupportedScriptType(String),
    Base58Error(String),
    Bech32Error(String),
    CashaddrError(String),
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressError::InvalidScript(msg) => write!(f, "Invalid script: {}", msg),
            AddressError::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
            AddressError::UnsupportedScriptType(msg) => {
                write!(f, "Unsupported script type: {}", msg)
            }
            AddressError::Base58Error(msg) => write!(f, "Base58 error: {}", msg),
            AddressError::Bech32Error(msg) => write!(f, "Bech32 error: {}", msg),
            AddressError::CashaddrError(msg) => write!(f, "Cashaddr error: {}", msg),
        }
    }
}

impl std::error::Error for AddressError {}

type Result<T> = std::result::Result<T, AddressError>;

pub trait AddressCodec {
    fn encode(&self, script: &Script) -> Result<String>;
    fn decode(&self, address: &str) -> Result<ScriptBuf>;
}

/// The 20-byte hash carried by a P2PKH or P2SH script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HashPayload {
    PubkeyHash([u8; 20]),
    ScriptHash([u8; 20]),
}

impl HashPayload {
    pub(crate) fn from_script(script: &Script) -> Result<HashPayload> {
        let bytes = script.as_bytes();
        if script.is_p2pkh() {
            let hash = bytes
                .get(3..23)
                .and_then(|h| <[u8; 20]>::try_from(h).ok())
                .ok_or_else(|| AddressError::InvalidScript("Invalid P2PKH script length".into()))?;
            Ok(HashPayload::PubkeyHash(hash))
        } else if script.is_p2sh() {
            let hash = bytes
                .get(2..22)
                .and_then(|h| <[u8; 20]>::try_from(h).ok())
                .ok_or_else(|| AddressError::InvalidScript("Invalid P2SH script length".into()))?;
            Ok(HashPayload::ScriptHash(hash))
        } else {
            Err(AddressError::UnsupportedScriptType(
                "only P2PKH and P2SH have a hash payload".to_string(),
            ))
        }
    }

    pub(crate) fn from_slice(hash: &[u8], is_script_hash: bool) -> Result<HashPayload> {
        let hash: [u8; 20] = hash
            .try_into()
            .map_err(|_| AddressError::InvalidAddress(format!("Invalid hash length {}", hash.len())))?;
        Ok(if is_script_hash {
            HashPayload::ScriptHash(hash)
        } else {
            HashPayload::PubkeyHash(hash)
        })
    }

    pub(crate) fn hash(&self) -> &[u8; 20] {
        match self {
            HashPayload::PubkeyHash(h) | HashPayload::ScriptHash(h) => h,
        }
    }

    pub(crate) fn to_script(self) -> ScriptBuf {
        match self {
            HashPayload::PubkeyHash(h) => ScriptBuf::new_p2pkh(&PubkeyHash::from_byte_array(h)),
            HashPayload::ScriptHash(h) => ScriptBuf::new_p2sh(&ScriptHash::from_byte_array(h)),
        }
    }
}

// Base58Check version bytes from each coin's chainparams.cpp (PUBKEY_ADDRESS, SCRIPT_ADDRESS).
pub const BITCOIN: Base58CheckCodec = Base58CheckCodec::new(0x00, 0x05);
pub const TESTNET: Base58CheckCodec = Base58CheckCodec::new(0x6f, 0xc4);
pub const BITCOIN_GOLD: Base58CheckCodec = Base58CheckCodec::new(0x26, 0x17);
pub const LITECOIN: Base58CheckCodec = Base58CheckCodec::new(0x30, 0x32);
pub const LITECOIN_TEST: Base58CheckCodec = Base58CheckCodec::new(0x6f, 0x3a);
// Mainnet bip32 does not match dogecoin core, only the address versions are used here.
pub const DOGECOIN: Base58CheckCodec = Base58CheckCodec::new(0x1e, 0x16);
pub const DOGECOIN_TEST: Base58CheckCodec = Base58CheckCodec::new(0x71, 0xc4);
pub const DASH: Base58CheckCodec = Base58CheckCodec::new(0x4c, 0x10);
pub const DASH_TEST: Base58CheckCodec = Base58CheckCodec::new(0x8c, 0x13);
pub const ZCASH: Base58CheckCodec = Base58CheckCodec::new(0x1cb8, 0x1cbd);
pub const ZCASH_TEST: Base58CheckCodec = Base58CheckCodec::new(0x1d25, 0x1cba);

pub const BITCOIN_BECH32: Bech32Codec = Bech32Codec::new("bc");
pub const TESTNET_BECH32: Bech32Codec = Bech32Codec::new("tb");
pub const BITCOIN_GOLD_BECH32: Bech32Codec = Bech32Codec::new("btg");
pub const BITCOIN_GOLD_TESTNET_BECH32: Bech32Codec = Bech32Codec::new("tbtg");
pub const LITECOIN_BECH32: Bech32Codec = Bech32Codec::new("ltc");
pub const LITECOIN_TEST_BECH32: Bech32Codec = Bech32Codec::new("tltc");

pub const BITCOIN_CASH_CASHADDR: CashAddrCodec = CashAddrCodec::new("bitcoincash");
pub const BITCOIN_CASH_TESTNET_CASHADDR: CashAddrCodec = CashAddrCodec::new("bchtest");
pub const ECASH_CASHADDR: CashAddrCodec = CashAddrCodec::new("ecash");
pub const ECASH_TEST_CASHADDR: CashAddrCodec = CashAddrCodec::new("ectest");

pub fn from_output_script(script: &Script, codec: &dyn AddressCodec) -> Result<String> {
    codec.encode(script)
}

/// Decode with the first codec that accepts the address.
pub fn to_output_script_try_codecs(
    address: &str,
    codecs: &[&dyn AddressCodec],
) -> Result<ScriptBuf> {
    codecs
        .iter()
        .find_map(|codec| codec.decode(address).ok())
        .ok_or_else(|| {
            AddressError::InvalidAddress(format!(
                "Could not decode address with any provided codec: {}",
                address
            ))
        })
}
