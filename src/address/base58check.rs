//! Base58Check addresses (P2PKH, P2SH).

use super::{AddressCodec, AddressError, HashPayload, Result};
use crate::bitcoin::{base58, Script, ScriptBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Base58CheckCodec {
    /// P2PKH version, one or two bytes
    pub pub_key_hash: u32,
    /// P2SH version, one or two bytes
    pub script_hash: u32,
}

impl Base58CheckCodec {
    pub const fn new(pub_key_hash: u32, script_hash: u32) -> Self {
        Self {
            pub_key_hash,
            script_hash,
        }
    }
}

fn version_bytes(version: u32) -> Vec<u8> {
    let bytes = version.to_be_bytes();
    let start = bytes[..3].iter().take_while(|&&b| b == 0).count();
    bytes[start..].to_vec()
}

/// Splits a decoded payload into (version, hash).
///
/// Zcash transparent addresses carry a two-byte version starting with 0x1c or 0x1d.
fn split_version(payload: &[u8]) -> Result<(u32, &[u8])> {
    match payload {
        [] => Err(AddressError::Base58Error("Empty payload".to_string())),
        [hi @ (0x1c | 0x1d), lo, rest @ ..] if rest.len() == 20 => {
            Ok((u32::from_be_bytes([0, 0, *hi, *lo]), rest))
        }
        [version, rest @ ..] => Ok((*version as u32, rest)),
    }
}

impl AddressCodec for Base58CheckCodec {
    fn encode(&self, script: &Script) -> Result<String> {
        let payload = HashPayload::from_script(script).map_err(|_| {
            AddressError::UnsupportedScriptType(
                "Base58Check only supports P2PKH and P2SH".to_string(),
            )
        })?;
        let version = match payload {
            HashPayload::PubkeyHash(_) => self.pub_key_hash,
            HashPayload::ScriptHash(_) => self.script_hash,
        };
        let mut data = version_bytes(version);
        data.extend_from_slice(payload.hash());
        Ok(base58::encode_check(&data))
    }

    fn decode(&self, address: &str) -> Result<ScriptBuf> {
        let payload =
            base58::decode_check(address).map_err(|e| AddressError::Base58Error(e.to_string()))?;
        let (version, hash) = split_version(&payload)?;

        let is_script_hash = if version == self.pub_key_hash {
            false
        } else if version == self.script_hash {
            true
        } else {
            return Err(AddressError::InvalidAddress(format!(
                "Version mismatch: expected {} or {}, got {}",
                self.pub_key_hash, self.script_hash, version
            )));
        };
        Ok(HashPayload::from_slice(hash, is_script_hash)?.to_script())
    }
}
