//! Wallet inputs of a PSBT: matching against wallet keys, script type
//! detection and per-key signature checks.

use std::collections::BTreeMap;

use miniscript::bitcoin::bip32::{ChildNumber, DerivationPath, Fingerprint, KeySource, Xpub};
use miniscript::bitcoin::hashes::Hash;
use miniscript::bitcoin::psbt::{Input, Output, Psbt};
use miniscript::bitcoin::secp256k1::{self, PublicKey};
use miniscript::bitcoin::sighash::{Prevouts, SighashCache};
use miniscript::bitcoin::{
    Amount, CompressedPublicKey, OutPoint, Script, ScriptBuf, TapLeafHash, TxIn, XOnlyPublicKey,
};

use super::p2tr_musig2_input::{collect_prevouts, Musig2Input};
use super::sighash::EcdsaSighash;
use crate::fixed_script_wallet::{
    Chain, OutputScriptType, ReplayProtection, RootWalletKeys, SignPath, WalletScripts,
};
use crate::Network;

pub type Bip32DerivationMap = BTreeMap<PublicKey, KeySource>;

pub type TapKeyOrigins = BTreeMap<XOnlyPublicKey, (Vec<TapLeafHash>, KeySource)>;

fn has_fingerprint(wallet_keys: &RootWalletKeys, fingerprint: Fingerprint) -> bool {
    wallet_keys
        .xpubs
        .iter()
        .any(|xpub| xpub.fingerprint() == fingerprint)
}

fn find_xpub_by_fingerprint(wallet_keys: &RootWalletKeys, fingerprint: Fingerprint) -> Option<&Xpub> {
    wallet_keys
        .xpubs
        .iter()
        .find(|xpub| xpub.fingerprint() == fingerprint)
}

/// True if every fingerprint in the map belongs to the wallet.
pub fn is_bip32_derivation_for_wallet(
    wallet_keys: &RootWalletKeys,
    derivation_map: &Bip32DerivationMap,
) -> bool {
    derivation_map
        .values()
        .all(|(fingerprint, _)| has_fingerprint(wallet_keys, *fingerprint))
}

pub fn is_tap_key_origins_for_wallet(
    wallet_keys: &RootWalletKeys,
    tap_key_origins: &TapKeyOrigins,
) -> bool {
    tap_key_origins
        .values()
        .all(|(_, (fingerprint, _))| has_fingerprint(wallet_keys, *fingerprint))
}

fn derive_pubkey<C: secp256k1::Verification>(
    secp: &secp256k1::Secp256k1<C>,
    xpub: &Xpub,
    path: &DerivationPath,
) -> Result<CompressedPublicKey, String> {
    xpub.derive_pub(secp, path)
        .map(|derived| derived.to_pub())
        .map_err(|e| format!("Failed to derive public key: {}", e))
}

fn find_derivation_path(input: &Input, fingerprint: Fingerprint) -> Option<&DerivationPath> {
    input
        .bip32_derivation
        .values()
        .find(|(fp, _)| *fp == fingerprint)
        .map(|(_, path)| path)
        .or_else(|| {
            input
                .tap_key_origins
                .values()
                .find(|(_, (fp, _))| *fp == fingerprint)
                .map(|(_, (_, path))| path)
        })
}

/// Child key of `xpub` at the path the input stores for its fingerprint.
///
/// `Ok(None)` if the input carries no path for this key.
pub fn derive_pubkey_from_input<C: secp256k1::Verification>(
    secp: &secp256k1::Secp256k1<C>,
    xpub: &Xpub,
    input: &Input,
) -> Result<Option<CompressedPublicKey>, String> {
    find_derivation_path(input, xpub.fingerprint())
        .map(|path| derive_pubkey(secp, xpub, path))
        .transpose()
}

/// Derivation path the input stores for `fingerprint`.
pub fn derivation_path_for_fingerprint(
    input: &Input,
    fingerprint: Fingerprint,
) -> Option<DerivationPath> {
    find_derivation_path(input, fingerprint).cloned()
}

fn assert_bip32_derivation_map(
    wallet_keys: &RootWalletKeys,
    derivation_map: &Bip32DerivationMap,
) -> Result<(), String> {
    let secp = secp256k1::Secp256k1::verification_only();
    for (key, (fingerprint, path)) in derivation_map {
        let xpub = find_xpub_by_fingerprint(wallet_keys, *fingerprint)
            .ok_or_else(|| format!("No xpub found with fingerprint {}", fingerprint))?;
        let derived = derive_pubkey(&secp, xpub, path)?;
        if derived.0 != *key {
            return Err(format!(
                "Derived pubkey {} does not match derivation map {}",
                derived, key
            ));
        }
    }
    Ok(())
}

fn assert_tap_key_origins(
    wallet_keys: &RootWalletKeys,
    tap_key_origins: &TapKeyOrigins,
) -> Result<(), String> {
    let secp = secp256k1::Secp256k1::verification_only();
    for (key, (_, (fingerprint, path))) in tap_key_origins {
        let xpub = find_xpub_by_fingerprint(wallet_keys, *fingerprint)
            .ok_or_else(|| format!("No xpub found with fingerprint {}", fingerprint))?;
        let derived = derive_pubkey(&secp, xpub, path)?.0.x_only_public_key().0;
        if derived != *key {
            return Err(format!(
                "Derived pubkey {} does not match tap key origin {}",
                derived, key
            ));
        }
    }
    Ok(())
}

/// `(chain, index)` from the last two steps of a wallet path.
fn parse_derivation_path(path: &DerivationPath) -> Result<(u32, u32), String> {
    let steps: &[ChildNumber] = path.as_ref();
    match steps {
        [.., ChildNumber::Normal { index: chain }, ChildNumber::Normal { index }] => {
            Ok((*chain, *index))
        }
        _ => Err(format!("Invalid wallet derivation path {}", path)),
    }
}

pub fn get_derivation_paths(input: &Input) -> Vec<&DerivationPath> {
    if !input.bip32_derivation.is_empty() {
        input.bip32_derivation.values().map(|(_, path)| path).collect()
    } else {
        input
            .tap_key_origins
            .values()
            .map(|(_, (_, path))| path)
            .collect()
    }
}

pub fn get_output_derivation_paths(output: &Output) -> Vec<&DerivationPath> {
    if !output.bip32_derivation.is_empty() {
        output.bip32_derivation.values().map(|(_, path)| path).collect()
    } else {
        output
            .tap_key_origins
            .values()
            .map(|(_, (_, path))| path)
            .collect()
    }
}

/// The `(chain, index)` all paths agree on.
pub fn parse_shared_derivation_path(paths: &[&DerivationPath]) -> Result<(u32, u32), String> {
    let mut parsed = paths.iter().map(|path| parse_derivation_path(path));
    let first = parsed
        .next()
        .ok_or_else(|| "No derivation paths".to_string())??;
    for other in parsed {
        if other? != first {
            return Err("Derivation paths disagree on chain and index".to_string());
        }
    }
    Ok(first)
}

pub fn parse_shared_chain_and_index(input: &Input) -> Result<(u32, u32), String> {
    if input.bip32_derivation.is_empty() && input.tap_key_origins.is_empty() {
        return Err("both bip32_derivation and tap_key_origins are empty".to_string());
    }
    parse_shared_derivation_path(&get_derivation_paths(input))
}

/// Checks that the input's derivation info and output script belong to the wallet.
pub fn assert_wallet_input(
    wallet_keys: &RootWalletKeys,
    input: &Input,
    output_script: &Script,
    network: Network,
) -> Result<ScriptId, String> {
    if input.bip32_derivation.is_empty() {
        assert_tap_key_origins(wallet_keys, &input.tap_key_origins)?;
    } else {
        assert_bip32_derivation_map(wallet_keys, &input.bip32_derivation)?;
    }
    let (chain, index) = parse_shared_chain_and_index(input)?;
    let script_id = ScriptId { chain, index };
    let expected = script_id.output_script(wallet_keys, network)?;
    if expected.as_script() != output_script {
        return Err(format!(
            "Script mismatch: derived {} for chain={} index={}, found {}",
            expected, chain, index, output_script
        ));
    }
    Ok(script_id)
}

/// Searches every supported chain over indices `0..index_window` for `script`.
pub fn find_script_id(
    wallet_keys: &RootWalletKeys,
    script: &Script,
    network: Network,
    index_window: u32,
) -> Result<Option<ScriptId>, String> {
    let support = network.output_script_support();
    for index in 0..index_window {
        for chain in Chain::all().filter(|c| c.script_type.is_supported_by(&support)) {
            let scripts = WalletScripts::from_wallet_keys(wallet_keys, chain, index, &support)
                .map_err(|e| e.to_string())?;
            if scripts.output_script().as_script() == script {
                return Ok(Some(ScriptId {
                    chain: chain.value(),
                    index,
                }));
            }
        }
    }
    Ok(None)
}

#[derive(Debug)]
pub enum OutputScriptError {
    OutputIndexOutOfBounds { vout: u32 },
    BothUtxoFieldsSet,
    NoUtxoFields,
}

impl std::fmt::Display for OutputScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputScriptError::OutputIndexOutOfBounds { vout } => {
                write!(f, "Output index {} out of bounds", vout)
            }
            OutputScriptError::BothUtxoFieldsSet => {
                write!(f, "Both witness_utxo and non_witness_utxo are set")
            }
            OutputScriptError::NoUtxoFields => {
                write!(f, "Neither witness_utxo nor non_witness_utxo is set")
            }
        }
    }
}

impl std::error::Error for OutputScriptError {}

/// Script and value of the output an input spends.
pub fn get_output_script_and_value(
    input: &Input,
    prevout: OutPoint,
) -> Result<(&ScriptBuf, Amount), OutputScriptError> {
    match (&input.witness_utxo, &input.non_witness_utxo) {
        (Some(witness_utxo), None) => Ok((&witness_utxo.script_pubkey, witness_utxo.value)),
        (None, Some(non_witness_utxo)) => {
            let output = non_witness_utxo
                .output
                .get(prevout.vout as usize)
                .ok_or(OutputScriptError::OutputIndexOutOfBounds { vout: prevout.vout })?;
            Ok((&output.script_pubkey, output.value))
        }
        (Some(_), Some(_)) => Err(OutputScriptError::BothUtxoFieldsSet),
        (None, None) => Err(OutputScriptError::NoUtxoFields),
    }
}

/// Position of a script in the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptId {
    pub chain: u32,
    pub index: u32,
}

impl ScriptId {
    pub fn output_script(&self, wallet_keys: &RootWalletKeys, network: Network) -> Result<ScriptBuf, String> {
        let chain = Chain::try_from(self.chain)?;
        WalletScripts::from_wallet_keys(
            wallet_keys,
            chain,
            self.index,
            &network.output_script_support(),
        )
        .map(|scripts| scripts.output_script())
        .map_err(|e| e.to_string())
    }
}

/// How an input is spent. Finer grained than [`OutputScriptType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputScriptType {
    P2shP2pk,
    P2sh,
    P2shP2wsh,
    P2wsh,
    P2trLegacy,
    P2trMusig2ScriptPath,
    P2trMusig2KeyPath,
}

impl InputScriptType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InputScriptType::P2shP2pk => "p2shP2pk",
            InputScriptType::P2sh => "p2sh",
            InputScriptType::P2shP2wsh => "p2shP2wsh",
            InputScriptType::P2wsh => "p2wsh",
            InputScriptType::P2trLegacy => "p2trLegacy",
            InputScriptType::P2trMusig2ScriptPath => "p2trMusig2ScriptPath",
            InputScriptType::P2trMusig2KeyPath => "p2trMusig2KeyPath",
        }
    }

    pub fn from_script_id(script_id: ScriptId, input: &Input) -> Result<Self, String> {
        let chain = Chain::try_from(script_id.chain)?;
        Ok(match chain.script_type {
            OutputScriptType::P2sh => InputScriptType::P2sh,
            OutputScriptType::P2shP2wsh => InputScriptType::P2shP2wsh,
            OutputScriptType::P2wsh => InputScriptType::P2wsh,
            OutputScriptType::P2trLegacy => InputScriptType::P2trLegacy,
            OutputScriptType::P2trMusig2 => {
                if !input.tap_script_sigs.is_empty() || !input.tap_scripts.is_empty() {
                    InputScriptType::P2trMusig2ScriptPath
                } else {
                    InputScriptType::P2trMusig2KeyPath
                }
            }
        })
    }

    /// Detection from PSBT metadata alone, without wallet keys.
    pub fn from_input_metadata(input: &Input) -> Option<Self> {
        if let Some(redeem_script) = &input.redeem_script {
            if crate::fixed_script_wallet::wallet_scripts::parse_p2pk_script(redeem_script).is_some() {
                return Some(InputScriptType::P2shP2pk);
            }
            if input.witness_script.is_some() {
                return Some(InputScriptType::P2shP2wsh);
            }
            return Some(InputScriptType::P2sh);
        }
        if input.witness_script.is_some() {
            return Some(InputScriptType::P2wsh);
        }
        let has_musig2 = Musig2Input::is_musig2_input(input);
        match (has_musig2, input.tap_scripts.is_empty()) {
            (true, false) => Some(InputScriptType::P2trMusig2ScriptPath),
            (true, true) => Some(InputScriptType::P2trMusig2KeyPath),
            (false, false) => Some(InputScriptType::P2trLegacy),
            (false, true) => None,
        }
    }

    pub fn is_taproot(&self) -> bool {
        matches!(
            self,
            InputScriptType::P2trLegacy
                | InputScriptType::P2trMusig2ScriptPath
                | InputScriptType::P2trMusig2KeyPath
        )
    }

    /// Signatures needed before the input can be finalized.
    pub fn required_signatures(&self) -> usize {
        match self {
            InputScriptType::P2shP2pk => 1,
            _ => 2,
        }
    }
}

impl std::fmt::Display for InputScriptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedInput {
    pub previous_output: OutPoint,
    pub address: String,
    pub script: Vec<u8>,
    pub value: u64,
    /// `None` for replay protection inputs.
    pub script_id: Option<ScriptId>,
    pub script_type: InputScriptType,
    pub sequence: u32,
}

impl ParsedInput {
    /// Matches an input against the wallet, then against the replay protection set.
    ///
    /// Derivation info in the input is checked when present. Inputs without it
    /// are looked up over `index_window` indices of every chain.
    pub fn parse(
        input: &Input,
        tx_input: &TxIn,
        wallet_keys: &RootWalletKeys,
        replay_protection: &ReplayProtection,
        network: Network,
        index_window: u32,
    ) -> Result<Self, ParseInputError> {
        let (output_script, value) =
            get_output_script_and_value(input, tx_input.previous_output)
                .map_err(ParseInputError::Utxo)?;

        let (script_id, script_type) = if replay_protection.is_replay_protection_input(output_script) {
            (None, InputScriptType::P2shP2pk)
        } else {
            let has_derivation =
                !input.bip32_derivation.is_empty() || !input.tap_key_origins.is_empty();
            let script_id = if has_derivation {
                assert_wallet_input(wallet_keys, input, output_script, network)
                    .map_err(ParseInputError::WalletValidation)?
            } else {
                find_script_id(wallet_keys, output_script, network, index_window)
                    .map_err(ParseInputError::WalletValidation)?
                    .ok_or_else(|| {
                        ParseInputError::Unmatched(format!(
                            "script {} matches neither the wallet nor replay protection",
                            output_script
                        ))
                    })?
            };
            let script_type = InputScriptType::from_script_id(script_id, input)
                .map_err(ParseInputError::ScriptTypeDetection)?;
            (Some(script_id), script_type)
        };

        let address = crate::address::from_output_script_with_network(output_script, network)
            .map_err(ParseInputError::Address)?;

        Ok(Self {
            previous_output: tx_input.previous_output,
            address,
            script: output_script.to_bytes(),
            value: value.to_sat(),
            script_id,
            script_type,
            sequence: tx_input.sequence.0,
        })
    }
}

#[derive(Debug)]
pub enum ParseInputError {
    Utxo(OutputScriptError),
    /// Derivation info is present but does not match the wallet.
    WalletValidation(String),
    /// Neither a wallet nor a replay protection input.
    Unmatched(String),
    Address(crate::address::AddressError),
    ScriptTypeDetection(String),
}

impl std::fmt::Display for ParseInputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseInputError::Utxo(error) => write!(f, "{}", error),
            ParseInputError::WalletValidation(error) => {
                write!(f, "wallet validation failed: {}", error)
            }
            ParseInputError::Unmatched(error) => write!(f, "{}", error),
            ParseInputError::Address(error) => write!(f, "failed to generate address: {}", error),
            ParseInputError::ScriptTypeDetection(error) => {
                write!(f, "failed to detect script type: {}", error)
            }
        }
    }
}

impl std::error::Error for ParseInputError {}

/// Optional fields of a wallet input.
#[derive(Debug, Clone, Default)]
pub struct WalletInputOptions<'a> {
    /// Signing pair for taproot inputs. Defaults to user and bitgo.
    pub sign_path: Option<SignPath>,
    /// Defaults to 0xFFFFFFFE.
    pub sequence: Option<u32>,
    /// Previous transaction. When given the input carries `non_witness_utxo`.
    pub prev_tx: Option<&'a [u8]>,
}

#[derive(Debug, Clone, Default)]
pub struct ReplayProtectionOptions<'a> {
    pub sequence: Option<u32>,
    pub sighash_type: Option<u32>,
    pub prev_tx: Option<&'a [u8]>,
}

pub const DEFAULT_SEQUENCE: u32 = 0xFFFF_FFFE;

/// Checks the ECDSA signature of `public_key` on input `input_index`.
///
/// `Ok(false)` if the key has not signed.
pub fn verify_ecdsa_signature<C: secp256k1::Verification>(
    secp: &secp256k1::Secp256k1<C>,
    psbt: &Psbt,
    input_index: usize,
    public_key: CompressedPublicKey,
    sighash: &EcdsaSighash,
) -> Result<bool, String> {
    let key = miniscript::bitcoin::PublicKey::new(public_key.0);
    let signature = match psbt
        .inputs
        .get(input_index)
        .and_then(|input| input.partial_sigs.get(&key))
    {
        Some(signature) => signature,
        None => return Ok(false),
    };
    let message = sighash.message(psbt, input_index)?;
    Ok(secp
        .verify_ecdsa(&message, &signature.signature, &public_key.0)
        .is_ok())
}

/// Checks the script-path Schnorr signature of `public_key` on input `input_index`.
pub fn verify_taproot_script_signature<C: secp256k1::Verification>(
    secp: &secp256k1::Secp256k1<C>,
    psbt: &Psbt,
    input_index: usize,
    public_key: CompressedPublicKey,
) -> Result<bool, String> {
    let input = match psbt.inputs.get(input_index) {
        Some(input) => input,
        None => return Ok(false),
    };
    let x_only = public_key.0.x_only_public_key().0;
    let signatures: Vec<_> = input
        .tap_script_sigs
        .iter()
        .filter(|((key, _), _)| *key == x_only)
        .collect();
    if signatures.is_empty() {
        return Ok(false);
    }

    let prevouts = collect_prevouts(psbt).map_err(|e| e.to_string())?;
    let mut cache = SighashCache::new(&psbt.unsigned_tx);
    for ((_, leaf_hash), signature) in signatures {
        let known_leaf = input
            .tap_scripts
            .values()
            .any(|(script, version)| TapLeafHash::from_script(script, *version) == *leaf_hash);
        if !known_leaf {
            return Err(format!("Tap script not found for leaf hash {}", leaf_hash));
        }
        let sighash = cache
            .taproot_script_spend_signature_hash(
                input_index,
                &Prevouts::All(&prevouts),
                *leaf_hash,
                signature.sighash_type,
            )
            .map_err(|e| format!("Failed to compute taproot sighash: {}", e))?;
        let message = secp256k1::Message::from_digest(sighash.to_byte_array());
        if secp
            .verify_schnorr(&signature.signature, &message, &x_only)
            .is_ok()
        {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_script_wallet::wallet_keys::tests::get_test_wallet_keys;
    use crate::fixed_script_wallet::wallet_keys::to_pub_triple;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case("m/0/0/20/7", Ok((20, 7)))]
    #[case("m/45'/0/0/1/3", Ok((1, 3)))]
    #[case("m/0/0/40'/1", Err(()))]
    #[case("m/5", Err(()))]
    fn test_parse_derivation_path(#[case] path: &str, #[case] expected: Result<(u32, u32), ()>) {
        let path = DerivationPath::from_str(path).unwrap();
        assert_eq!(parse_derivation_path(&path).map_err(|_| ()), expected);
    }

    #[test]
    fn test_shared_path_must_agree() {
        let a = DerivationPath::from_str("m/0/0/0/1").unwrap();
        let b = DerivationPath::from_str("m/0/0/0/2").unwrap();
        assert_eq!(parse_shared_derivation_path(&[&a, &a]).unwrap(), (0, 1));
        assert!(parse_shared_derivation_path(&[&a, &b]).is_err());
        assert!(parse_shared_derivation_path(&[]).is_err());
    }

    #[test]
    fn test_find_script_id_scans_window() {
        let keys = get_test_wallet_keys("scan");
        let script = ScriptId { chain: 21, index: 4 }
            .output_script(&keys, Network::Bitcoin)
            .unwrap();
        assert_eq!(
            find_script_id(&keys, &script, Network::Bitcoin, 5).unwrap(),
            Some(ScriptId { chain: 21, index: 4 })
        );
        assert_eq!(find_script_id(&keys, &script, Network::Bitcoin, 4).unwrap(), None);
        // segwit chains are skipped where unsupported
        assert_eq!(find_script_id(&keys, &script, Network::Dogecoin, 5).unwrap(), None);
    }

    #[test]
    fn test_derive_pubkey_from_input() {
        let keys = get_test_wallet_keys("derive");
        let secp = secp256k1::Secp256k1::verification_only();
        let derived = to_pub_triple(&keys.derive_for_chain_and_index(0, 9).unwrap());

        let mut input = Input::default();
        assert_eq!(derive_pubkey_from_input(&secp, keys.user_key(), &input).unwrap(), None);
        for (i, xpub) in keys.xpubs.iter().enumerate() {
            let path = DerivationPath::from_str("m/0/0/0/9").unwrap();
            input
                .bip32_derivation
                .insert(derived[i].0, (xpub.fingerprint(), path));
        }
        assert_eq!(
            derive_pubkey_from_input(&secp, keys.bitgo_key(), &input).unwrap(),
            Some(derived[2])
        );
        assert!(is_bip32_derivation_for_wallet(&keys, &input.bip32_derivation));
        assert!(!is_bip32_derivation_for_wallet(
            &get_test_wallet_keys("other"),
            &input.bip32_derivation
        ));
    }
}
