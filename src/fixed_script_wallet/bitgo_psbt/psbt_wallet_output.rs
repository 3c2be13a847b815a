use miniscript::bitcoin::psbt::Output;
use miniscript::bitcoin::{Script, TxOut};

use super::psbt_wallet_input::{
    find_script_id, get_output_derivation_paths, is_bip32_derivation_for_wallet,
    is_tap_key_origins_for_wallet, parse_shared_derivation_path,
};
use crate::fixed_script_wallet::RootWalletKeys;
use crate::Network;

pub use super::psbt_wallet_input::ScriptId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOutput {
    /// `None` for scripts without an address form, e.g. OP_RETURN.
    pub address: Option<String>,
    pub script: Vec<u8>,
    pub value: u64,
    pub script_id: Option<ScriptId>,
    /// Carries a PayGo address attestation. Still external.
    pub paygo: bool,
}

impl ParsedOutput {
    /// Matches an output against the wallet. Outputs that do not match are external.
    pub fn parse(
        psbt_output: &Output,
        tx_output: &TxOut,
        wallet_keys: &RootWalletKeys,
        network: Network,
        index_window: u32,
    ) -> Result<Self, ParseOutputError> {
        let script = &tx_output.script_pubkey;
        let script_id =
            match_output_to_wallet(wallet_keys, psbt_output, script, network, index_window)
                .map_err(ParseOutputError::WalletMatch)?;
        let address = crate::address::from_output_script_with_network(script, network).ok();

        Ok(Self {
            address,
            script: script.to_bytes(),
            value: tx_output.value.to_sat(),
            script_id,
            paygo: false,
        })
    }

    pub fn is_external(&self) -> bool {
        self.script_id.is_none()
    }
}

#[derive(Debug)]
pub enum ParseOutputError {
    /// Derivation info names wallet keys but the script disagrees.
    WalletMatch(String),
}

impl std::fmt::Display for ParseOutputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseOutputError::WalletMatch(error) => write!(f, "{}", error),
        }
    }
}

impl std::error::Error for ParseOutputError {}

/// Without derivation info the script is looked up over the index window.
/// Derivation info with foreign fingerprints means external. Wallet
/// fingerprints with a different script is an error.
fn match_output_to_wallet(
    wallet_keys: &RootWalletKeys,
    psbt_output: &Output,
    script: &Script,
    network: Network,
    index_window: u32,
) -> Result<Option<ScriptId>, String> {
    if psbt_output.bip32_derivation.is_empty() && psbt_output.tap_key_origins.is_empty() {
        return find_script_id(wallet_keys, script, network, index_window);
    }

    let belongs_to_wallet = if !psbt_output.bip32_derivation.is_empty() {
        is_bip32_derivation_for_wallet(wallet_keys, &psbt_output.bip32_derivation)
    } else {
        is_tap_key_origins_for_wallet(wallet_keys, &psbt_output.tap_key_origins)
    };
    if !belongs_to_wallet {
        return Ok(None);
    }

    let (chain, index) =
        parse_shared_derivation_path(&get_output_derivation_paths(psbt_output))
            .map_err(|e| format!("Failed to parse output derivation path: {}", e))?;
    let script_id = ScriptId { chain, index };
    let expected = script_id.output_script(wallet_keys, network)?;
    if expected.as_script() == script {
        Ok(Some(script_id))
    } else {
        Err(format!(
            "Output script mismatch at chain={} index={}: expected {}, got {}",
            chain, index, expected, script
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_script_wallet::wallet_keys::tests::get_test_wallet_keys;
    use miniscript::bitcoin::bip32::DerivationPath;
    use miniscript::bitcoin::{Amount, ScriptBuf};
    use std::str::FromStr;

    fn tx_out(script: ScriptBuf) -> TxOut {
        TxOut {
            value: Amount::from_sat(1_000),
            script_pubkey: script,
        }
    }

    #[test]
    fn test_change_output_found_without_derivation() {
        let keys = get_test_wallet_keys("out");
        let script = ScriptId { chain: 1, index: 2 }
            .output_script(&keys, Network::Bitcoin)
            .unwrap();
        let parsed =
            ParsedOutput::parse(&Output::default(), &tx_out(script), &keys, Network::Bitcoin, 10)
                .unwrap();
        assert_eq!(parsed.script_id, Some(ScriptId { chain: 1, index: 2 }));
        assert!(!parsed.is_external());
    }

    #[test]
    fn test_foreign_output_is_external() {
        let keys = get_test_wallet_keys("out");
        let other = ScriptId { chain: 0, index: 0 }
            .output_script(&get_test_wallet_keys("foreign"), Network::Bitcoin)
            .unwrap();
        let parsed =
            ParsedOutput::parse(&Output::default(), &tx_out(other), &keys, Network::Bitcoin, 10)
                .unwrap();
        assert!(parsed.is_external());
        assert!(parsed.address.is_some());
    }

    #[test]
    fn test_wallet_derivation_with_wrong_script_is_an_error() {
        let keys = get_test_wallet_keys("out");
        let derived = keys.derive_for_chain_and_index(0, 3).unwrap();
        let mut output = Output::default();
        for (i, xpub) in derived.iter().enumerate() {
            output.bip32_derivation.insert(
                xpub.public_key,
                (
                    keys.xpubs[i].fingerprint(),
                    DerivationPath::from_str("m/0/0/0/3").unwrap(),
                ),
            );
        }
        let wrong = ScriptId { chain: 0, index: 4 }
            .output_script(&keys, Network::Bitcoin)
            .unwrap();
        assert!(ParsedOutput::parse(&output, &tx_out(wrong), &keys, Network::Bitcoin, 10).is_err());
    }
}
