//! Replay protection inputs.
//!
//! A replay protection input spends a P2SH-P2PK output held by a single key.
//! It has no derivation path, so it is recognized by its output script. The
//! permitted scripts can be given as scripts, addresses or public keys.

use miniscript::bitcoin::{CompressedPublicKey, Script, ScriptBuf};

use crate::address::to_output_script_with_network;
use crate::error::EngineError;
use crate::fixed_script_wallet::wallet_scripts::{parse_p2pk_script, ScriptP2shP2pk};
use crate::Network;

/// One way of naming a replay protection output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayProtectionKey {
    OutputScript(ScriptBuf),
    Address(String),
    PublicKey(CompressedPublicKey),
}

#[derive(Debug, Clone, Default)]
pub struct ReplayProtection {
    pub permitted_output_scripts: Vec<ScriptBuf>,
    /// Keys whose P2SH-P2PK scripts are permitted. Needed to build the
    /// redeem script when such an output is spent.
    pub public_keys: Vec<CompressedPublicKey>,
}

impl ReplayProtection {
    pub fn new(permitted_output_scripts: Vec<ScriptBuf>) -> Self {
        Self {
            permitted_output_scripts,
            public_keys: vec![],
        }
    }

    pub fn from_public_keys(public_keys: Vec<CompressedPublicKey>) -> Self {
        Self {
            permitted_output_scripts: public_keys
                .iter()
                .map(|key| ScriptP2shP2pk::new(*key).output_script())
                .collect(),
            public_keys,
        }
    }

    /// Mixes all three forms. Addresses are decoded for `network`.
    pub fn from_keys(keys: &[ReplayProtectionKey], network: Network) -> Result<Self, EngineError> {
        let mut result = ReplayProtection::default();
        for key in keys {
            match key {
                ReplayProtectionKey::OutputScript(script) => {
                    result.permitted_output_scripts.push(script.clone())
                }
                ReplayProtectionKey::Address(address) => result
                    .permitted_output_scripts
                    .push(to_output_script_with_network(address, network)?),
                ReplayProtectionKey::PublicKey(public_key) => {
                    result
                        .permitted_output_scripts
                        .push(ScriptP2shP2pk::new(*public_key).output_script());
                    result.public_keys.push(*public_key);
                }
            }
        }
        Ok(result)
    }

    pub fn is_empty(&self) -> bool {
        self.permitted_output_scripts.is_empty()
    }

    pub fn is_replay_protection_input(&self, output_script: &Script) -> bool {
        self.permitted_output_scripts
            .iter()
            .any(|script| script.as_script() == output_script)
    }

    /// Redeem script for `output_script`, if its key is known.
    pub fn redeem_script_for(&self, output_script: &Script) -> Option<ScriptBuf> {
        self.public_keys
            .iter()
            .map(|key| ScriptP2shP2pk::new(*key))
            .find(|script| script.output_script().as_script() == output_script)
            .map(|script| script.redeem_script)
    }
}

/// Key of a `<pubkey> OP_CHECKSIG` redeem script.
pub fn replay_protection_public_key(redeem_script: &Script) -> Result<CompressedPublicKey, EngineError> {
    parse_p2pk_script(redeem_script).ok_or_else(|| {
        EngineError::InvalidInput(format!(
            "redeem script is not a P2PK script: {}",
            redeem_script
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::from_output_script_with_network;
    use std::str::FromStr;

    fn key() -> CompressedPublicKey {
        CompressedPublicKey::from_str(
            "0336ef228ffe9b8efffba052c32d334660dd1f8366cf8fe44ae5aa672b6b629095",
        )
        .unwrap()
    }

    #[test]
    fn test_three_forms_match_the_same_input() {
        let script = ScriptP2shP2pk::new(key()).output_script();
        let address = from_output_script_with_network(&script, Network::BitcoinCash).unwrap();

        let forms = [
            vec![ReplayProtectionKey::OutputScript(script.clone())],
            vec![ReplayProtectionKey::Address(address)],
            vec![ReplayProtectionKey::PublicKey(key())],
        ];
        for form in forms {
            let rp = ReplayProtection::from_keys(&form, Network::BitcoinCash).unwrap();
            assert!(rp.is_replay_protection_input(&script));
            assert!(!rp.is_replay_protection_input(&ScriptBuf::new()));
        }
    }

    #[test]
    fn test_redeem_script_needs_public_key() {
        let script = ScriptP2shP2pk::new(key()).output_script();
        assert!(ReplayProtection::new(vec![script.clone()])
            .redeem_script_for(&script)
            .is_none());
        let redeem_script = ReplayProtection::from_public_keys(vec![key()])
            .redeem_script_for(&script)
            .unwrap();
        assert_eq!(replay_protection_public_key(&redeem_script).unwrap(), key());
    }

    #[test]
    fn test_bad_address_is_an_error() {
        let keys = [ReplayProtectionKey::Address("not-an-address".to_string())];
        assert!(ReplayProtection::from_keys(&keys, Network::Bitcoin).is_err());
    }
}
