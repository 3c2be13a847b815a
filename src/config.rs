//! Engine configuration, deserialized from JSON.
//!
//! ```json
//! {
//!   "network": "bitcoincash",
//!   "index_window": 500,
//!   "replay_protection": ["bitcoincash:qq..."],
//!   "paygo_pubkeys": ["02..."],
//!   "address_format": "cashaddr"
//! }
//! ```

use miniscript::bitcoin::secp256k1::PublicKey;
use miniscript::bitcoin::{CompressedPublicKey, ScriptBuf};
use serde::{Deserialize, Serialize};

use crate::address::AddressFormat;
use crate::error::EngineError;
use crate::fixed_script_wallet::{ReplayProtection, ReplayProtectionKey};
use crate::Network;

pub const DEFAULT_INDEX_WINDOW: u32 = 1000;

fn default_index_window() -> u32 {
    DEFAULT_INDEX_WINDOW
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Canonical network name or coin name.
    pub network: String,
    /// Address indices scanned per chain when an input or output carries no
    /// derivation info.
    #[serde(default = "default_index_window")]
    pub index_window: u32,
    /// Addresses, hex output scripts or hex compressed public keys.
    #[serde(default)]
    pub replay_protection: Vec<String>,
    #[serde(default)]
    pub paygo_pubkeys: Vec<String>,
    #[serde(default)]
    pub address_format: AddressFormat,
}

impl EngineConfig {
    pub fn new(network: Network) -> Self {
        EngineConfig {
            network: network.to_coin_name().to_string(),
            index_window: DEFAULT_INDEX_WINDOW,
            replay_protection: vec![],
            paygo_pubkeys: vec![],
            address_format: AddressFormat::Default,
        }
    }

    /// Parses and validates every field.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidInput(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, EngineError> {
        serde_json::to_string(self)
            .map_err(|e| EngineError::InvalidInput(format!("cannot serialize config: {}", e)))
    }

    fn validate(&self) -> Result<(), EngineError> {
        let network = self.network()?;
        if self.index_window == 0 {
            return Err(EngineError::InvalidInput(
                "index_window must be positive".to_string(),
            ));
        }
        if self.address_format == AddressFormat::Cashaddr
            && !matches!(network.mainnet(), Network::BitcoinCash | Network::Ecash)
        {
            return Err(EngineError::InvalidInput(format!(
                "cashaddr format is not available on {}",
                network
            )));
        }
        self.replay_protection()?;
        self.paygo_pubkeys()?;
        Ok(())
    }

    pub fn network(&self) -> Result<Network, EngineError> {
        Network::from_name_or_coin(&self.network)
    }

    pub fn replay_protection(&self) -> Result<ReplayProtection, EngineError> {
        let keys = self
            .replay_protection
            .iter()
            .map(String::as_str)
            .map(parse_replay_protection_entry)
            .collect::<Vec<_>>();
        ReplayProtection::from_keys(&keys, self.network()?)
    }

    pub fn paygo_pubkeys(&self) -> Result<Vec<PublicKey>, EngineError> {
        self.paygo_pubkeys
            .iter()
            .map(|entry| {
                let bytes = hex::decode(entry).map_err(|e| {
                    EngineError::InvalidInput(format!("invalid paygo pubkey {}: {}", entry, e))
                })?;
                PublicKey::from_slice(&bytes).map_err(|e| {
                    EngineError::InvalidInput(format!("invalid paygo pubkey {}: {}", entry, e))
                })
            })
            .collect()
    }
}

/// Hex of 33 bytes with a compressed key prefix is a public key, other hex
/// is an output script, anything else is an address.
fn parse_replay_protection_entry(entry: &str) -> ReplayProtectionKey {
    match hex::decode(entry) {
        Ok(bytes) => match CompressedPublicKey::from_slice(&bytes) {
            Ok(public_key) if bytes.len() == 33 => ReplayProtectionKey::PublicKey(public_key),
            _ => ReplayProtectionKey::OutputScript(ScriptBuf::from_bytes(bytes)),
        },
        Err(_) => ReplayProtectionKey::Address(entry.to_string()),
    }
}
