//! Bech32 (witness v0) and Bech32m (witness v1+) addresses.

use super::{AddressCodec, AddressError, Result};
use crate::bitcoin::{Script, ScriptBuf, WitnessProgram, WitnessVersion};
use bech32::Hrp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bech32Codec {
    pub hrp: &'static str,
}

impl Bech32Codec {
    pub const fn new(hrp: &'static str) -> Self {
        Self { hrp }
    }

    fn parsed_hrp(&self) -> Result<Hrp> {
        Hrp::parse(self.hrp)
            .map_err(|e| AddressError::Bech32Error(format!("Invalid HRP '{}': {}", self.hrp, e)))
    }
}

impl AddressCodec for Bech32Codec {
    fn encode(&self, script: &Script) -> Result<String> {
        if !(script.is_p2wpkh() || script.is_p2wsh() || script.is_p2tr()) {
            return Err(AddressError::UnsupportedScriptType(
                "Bech32 only supports witness programs (P2WPKH, P2WSH, P2TR)".to_string(),
            ));
        }
        let version = script
            .witness_version()
            .ok_or_else(|| AddressError::InvalidScript("missing witness version".to_string()))?;
        let program = &script.as_bytes()[2..];
        let hrp = self.parsed_hrp()?;

        if version == WitnessVersion::V0 {
            bech32::segwit::encode_v0(hrp, program)
                .map_err(|e| AddressError::Bech32Error(format!("Bech32 encoding failed: {}", e)))
        } else {
            bech32::segwit::encode_v1(hrp, program)
                .map_err(|e| AddressError::Bech32Error(format!("Bech32m encoding failed: {}", e)))
        }
    }

    fn decode(&self, address: &str) -> Result<ScriptBuf> {
        let expected = self.parsed_hrp()?;
        let (hrp, version, program) = bech32::segwit::decode(address)
            .map_err(|e| AddressError::Bech32Error(format!("Failed to decode address: {}", e)))?;
        if hrp != expected {
            return Err(AddressError::Bech32Error(format!(
                "HRP mismatch: expected '{}', got '{}'",
                self.hrp, hrp
            )));
        }

        let version = WitnessVersion::try_from(version.to_u8()).map_err(|e| {
            AddressError::Bech32Error(format!("Invalid witness version: {}", e))
        })?;
        let program = WitnessProgram::new(version, &program)
            .map_err(|e| AddressError::Bech32Error(e.to_string()))?;
        Ok(ScriptBuf::new_witness_program(&program))
    }
}
