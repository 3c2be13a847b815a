/// Script templates of BitGo's 2-of-3 fixed-script wallets.
pub mod bitgo_musig;
mod checkmultisig;
mod checksigverify;
mod singlesig;

pub use bitgo_musig::BitGoMusigError;
pub use checkmultisig::{
    build_multisig_script_2_of_3, parse_multisig_script_2_of_3, ScriptP2sh, ScriptP2shP2wsh,
    ScriptP2wsh,
};
pub use checksigverify::{
    build_p2tr_ns_script, build_tap_tree_for_output, create_tap_bip32_derivation_for_output,
    ScriptP2tr, TapKeyOriginMap, to_xonly,
};
pub use singlesig::{build_p2pk_script, parse_p2pk_script, ScriptP2shP2pk};

use crate::bitcoin::ScriptBuf;
use crate::error::EngineError;
use crate::fixed_script_wallet::wallet_keys::{to_pub_triple, PubTriple, RootWalletKeys};
use crate::networks::OutputScriptSupport;
use std::convert::TryFrom;
use std::str::FromStr;

/// Scripts that belong to fixed-script BitGo wallets.
#[derive(Debug)]
pub enum WalletScripts {
    /// Chains 0 and 1. Legacy Pay-To-Script-Hash.
    P2sh(ScriptP2sh),
    /// Chains 10 and 11. Wrapped-Segwit Pay-To-Script-Hash.
    P2shP2wsh(ScriptP2shP2wsh),
    /// Chains 20 and 21. Native Segwit Pay-To-Witness-Script-Hash.
    P2wsh(ScriptP2wsh),
    /// Chains 30 and 31. Legacy Taproot, script-path spends only.
    P2trLegacy(ScriptP2tr),
    /// Chains 40 and 41. Taproot with a MuSig2 key path.
    P2trMusig2(ScriptP2tr),
}

impl std::fmt::Display for WalletScripts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.script_type().as_str())
    }
}

impl WalletScripts {
    pub fn new(
        keys: &PubTriple,
        chain: Chain,
        script_support: &OutputScriptSupport,
    ) -> Result<WalletScripts, EngineError> {
        match chain.script_type {
            OutputScriptType::P2sh => {
                script_support.assert_legacy()?;
                Ok(WalletScripts::P2sh(ScriptP2sh {
                    redeem_script: build_multisig_script_2_of_3(keys),
                }))
            }
            OutputScriptType::P2shP2wsh => {
                script_support.assert_segwit()?;
                let script = build_multisig_script_2_of_3(keys);
                Ok(WalletScripts::P2shP2wsh(ScriptP2shP2wsh {
                    redeem_script: script.to_p2wsh(),
                    witness_script: script,
                }))
            }
            OutputScriptType::P2wsh => {
                script_support.assert_segwit()?;
                Ok(WalletScripts::P2wsh(ScriptP2wsh {
                    witness_script: build_multisig_script_2_of_3(keys),
                }))
            }
            OutputScriptType::P2trLegacy => {
                script_support.assert_taproot()?;
                Ok(WalletScripts::P2trLegacy(ScriptP2tr::new(keys, false)?))
            }
            OutputScriptType::P2trMusig2 => {
                script_support.assert_taproot()?;
                Ok(WalletScripts::P2trMusig2(ScriptP2tr::new(keys, true)?))
            }
        }
    }

    pub fn from_wallet_keys(
        wallet_keys: &RootWalletKeys,
        chain: Chain,
        index: u32,
        script_support: &OutputScriptSupport,
    ) -> Result<WalletScripts, EngineError> {
        let derived_keys = wallet_keys.derive_for_chain_and_index(chain.value(), index)?;
        WalletScripts::new(&to_pub_triple(&derived_keys), chain, script_support)
    }

    pub fn script_type(&self) -> OutputScriptType {
        match self {
            WalletScripts::P2sh(_) => OutputScriptType::P2sh,
            WalletScripts::P2shP2wsh(_) => OutputScriptType::P2shP2wsh,
            WalletScripts::P2wsh(_) => OutputScriptType::P2wsh,
            WalletScripts::P2trLegacy(_) => OutputScriptType::P2trLegacy,
            WalletScripts::P2trMusig2(_) => OutputScriptType::P2trMusig2,
        }
    }

    pub fn output_script(&self) -> ScriptBuf {
        match self {
            WalletScripts::P2sh(script) => script.redeem_script.to_p2sh(),
            WalletScripts::P2shP2wsh(script) => script.redeem_script.to_p2sh(),
            WalletScripts::P2wsh(script) => script.witness_script.to_p2wsh(),
            WalletScripts::P2trLegacy(script) | WalletScripts::P2trMusig2(script) => {
                script.output_script()
            }
        }
    }
}

/// Whether a chain is for receiving (external) or change (internal) addresses.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Scope {
    External,
    Internal,
}

/// Fixed-script wallet script types, independent of scope.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum OutputScriptType {
    /// Legacy Pay-To-Script-Hash (chains 0, 1)
    P2sh,
    /// Wrapped-Segwit Pay-To-Script-Hash (chains 10, 11)
    P2shP2wsh,
    /// Native Segwit Pay-To-Witness-Script-Hash (chains 20, 21)
    P2wsh,
    /// Legacy Taproot, script-path only (chains 30, 31)
    P2trLegacy,
    /// Taproot with MuSig2 key-path support (chains 40, 41)
    P2trMusig2,
}

/// The ten chain codes of a fixed-script wallet.
///
/// This table is the only place chain values are defined. External chains are
/// even and the matching internal chain is the next odd value.
pub const CHAIN_CODE_TABLE: [(u32, OutputScriptType, Scope); 10] = [
    (0, OutputScriptType::P2sh, Scope::External),
    (1, OutputScriptType::P2sh, Scope::Internal),
    (10, OutputScriptType::P2shP2wsh, Scope::External),
    (11, OutputScriptType::P2shP2wsh, Scope::Internal),
    (20, OutputScriptType::P2wsh, Scope::External),
    (21, OutputScriptType::P2wsh, Scope::Internal),
    (30, OutputScriptType::P2trLegacy, Scope::External),
    (31, OutputScriptType::P2trLegacy, Scope::Internal),
    (40, OutputScriptType::P2trMusig2, Scope::External),
    (41, OutputScriptType::P2trMusig2, Scope::Internal),
];

/// A script type combined with a scope. The chain value is used in derivation
/// paths: `m/0/0/{chain}/{index}`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Chain {
    pub script_type: OutputScriptType,
    pub scope: Scope,
}

impl Chain {
    pub const fn new(script_type: OutputScriptType, scope: Scope) -> Self {
        Self { script_type, scope }
    }

    /// All chains in table order.
    pub fn all() -> impl Iterator<Item = Chain> {
        CHAIN_CODE_TABLE
            .iter()
            .map(|(_, script_type, scope)| Chain::new(*script_type, *scope))
    }

    pub fn value(&self) -> u32 {
        CHAIN_CODE_TABLE
            .iter()
            .find(|(_, script_type, scope)| *script_type == self.script_type && *scope == self.scope)
            .map(|(value, _, _)| *value)
            // every (type, scope) pair is in the table
            .unwrap_or_default()
    }
}

impl TryFrom<u32> for Chain {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        CHAIN_CODE_TABLE
            .iter()
            .find(|(v, _, _)| *v == value)
            .map(|(_, script_type, scope)| Chain::new(*script_type, *scope))
            .ok_or_else(|| format!("no chain for {}", value))
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chain: u32 = u32::from_str(s).map_err(|v| v.to_string())?;
        Chain::try_from(chain)
    }
}

const ALL_SCRIPT_TYPES: [OutputScriptType; 5] = [
    OutputScriptType::P2sh,
    OutputScriptType::P2shP2wsh,
    OutputScriptType::P2wsh,
    OutputScriptType::P2trLegacy,
    OutputScriptType::P2trMusig2,
];

impl FromStr for OutputScriptType {
    type Err = String;

    /// Accepts output script names and the input script names that map onto them.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "p2sh" | "p2shP2pk" => Ok(OutputScriptType::P2sh),
            "p2shP2wsh" => Ok(OutputScriptType::P2shP2wsh),
            "p2wsh" => Ok(OutputScriptType::P2wsh),
            "p2tr" | "p2trLegacy" => Ok(OutputScriptType::P2trLegacy),
            "p2trMusig2" | "p2trMusig2ScriptPath" | "p2trMusig2KeyPath" => {
                Ok(OutputScriptType::P2trMusig2)
            }
            _ => Err(format!(
                "Unknown script type '{}'. Expected: p2sh, p2shP2wsh, p2wsh, p2trLegacy, p2trMusig2",
                s
            )),
        }
    }
}

impl OutputScriptType {
    pub fn all() -> &'static [OutputScriptType; 5] {
        &ALL_SCRIPT_TYPES
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputScriptType::P2sh => "p2sh",
            OutputScriptType::P2shP2wsh => "p2shP2wsh",
            OutputScriptType::P2wsh => "p2wsh",
            OutputScriptType::P2trLegacy => "p2trLegacy",
            OutputScriptType::P2trMusig2 => "p2trMusig2",
        }
    }

    pub fn is_taproot(&self) -> bool {
        matches!(
            self,
            OutputScriptType::P2trLegacy | OutputScriptType::P2trMusig2
        )
    }

    pub fn is_supported_by(&self, support: &OutputScriptSupport) -> bool {
        match self {
            OutputScriptType::P2sh => true,
            OutputScriptType::P2shP2wsh | OutputScriptType::P2wsh => support.segwit,
            OutputScriptType::P2trLegacy | OutputScriptType::P2trMusig2 => support.taproot,
        }
    }
}

impl std::fmt::Display for OutputScriptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_script_wallet::wallet_keys::tests::get_test_wallet_keys;
    use crate::networks::Network;
    use rstest::rstest;

    #[rstest]
    #[case(0, "a914999a8eb861e3fabae1efe4fb16ff4752e1f5976687")]
    #[case(1, "a914487ca5843f23b9f3b85a00136bec647846d179ab87")]
    #[case(10, "a9141219b6d9430fffb8de14f14969a5c07172c4613b87")]
    #[case(11, "a914cbfab1a5a25afab05ff420bd9dd0958c6f1a7a2f87")]
    #[case(20, "0020ce670e65fd69ef2eb1aa6087643a18ae5bff198ca20ef26da546e85962386c76")]
    #[case(21, "00209cca08a252f9846a1417afbe46ed96bf09d5ec6d25f0effb7d841188d5992b7c")]
    #[case(30, "51203a81504b836967a69399fcf3822adfdb7d61061e42418f6aad0d473cbcc69b86")]
    #[case(31, "512093e5e3c8885a6f87b4449e1bffa3ba8a45a9ee634dc27408394c7d9b68f01adc")]
    #[case(40, "5120c7c4dd55b2bf3cd7ea5b27d3da521699ce761aa345523d8486f0336364957ef2")]
    #[case(41, "51202629eea5dbef6841160a0b752dedd4b8e206f046835ee944848679d6dea2ac2c")]
    fn test_output_script_for_chain(#[case] chain: u32, #[case] expected: &str) {
        let keys = get_test_wallet_keys("lol");
        let scripts = WalletScripts::from_wallet_keys(
            &keys,
            Chain::try_from(chain).unwrap(),
            0,
            &Network::Bitcoin.output_script_support(),
        )
        .unwrap();
        assert_eq!(scripts.output_script().to_hex_string(), expected);
    }

    #[test]
    fn test_chain_table_is_consistent() {
        for (value, script_type, scope) in CHAIN_CODE_TABLE {
            let chain = Chain::try_from(value).unwrap();
            assert_eq!(chain.value(), value);
            assert_eq!(chain.script_type, script_type);
            assert_eq!(value % 2 == 1, scope == Scope::Internal);
        }
        assert_eq!(Chain::all().count(), 10);
        assert_eq!(Chain::try_from(2).unwrap_err(), "no chain for 2");
        assert!(Chain::from_str("x").is_err());
    }

    #[rstest]
    #[case(Network::Dogecoin, 20, "Network does not support segwit")]
    #[case(Network::Dogecoin, 10, "Network does not support segwit")]
    #[case(Network::Litecoin, 30, "Network does not support taproot")]
    #[case(Network::BitcoinCash, 40, "Network does not support taproot")]
    fn test_unsupported_script_types(
        #[case] network: Network,
        #[case] chain: u32,
        #[case] message: &str,
    ) {
        let keys = get_test_wallet_keys("test");
        let err = WalletScripts::from_wallet_keys(
            &keys,
            Chain::try_from(chain).unwrap(),
            0,
            &network.output_script_support(),
        )
        .unwrap_err();
        assert!(err.to_string().contains(message));
        // p2sh is available everywhere
        assert!(WalletScripts::from_wallet_keys(
            &keys,
            Chain::try_from(0).unwrap(),
            0,
            &network.output_script_support()
        )
        .is_ok());
    }

    #[test]
    fn test_output_script_type_from_str() {
        use OutputScriptType::*;
        assert_eq!(OutputScriptType::from_str("p2tr").unwrap(), P2trLegacy);
        assert_eq!(OutputScriptType::from_str("p2shP2pk").unwrap(), P2sh);
        assert_eq!(
            OutputScriptType::from_str("p2trMusig2KeyPath").unwrap(),
            P2trMusig2
        );
        assert!(OutputScriptType::from_str("p2pkh").is_err());
        assert!(!P2wsh.is_supported_by(&Network::Dogecoin.output_script_support()));
    }
}
