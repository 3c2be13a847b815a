//! Lifecycle-checked PSBT operations.
//!
//! [`WalletPsbt`] wraps a [`BitGoPsbt`] and derives a [`PsbtState`] from its
//! contents before every mutation. The state is never stored, so a PSBT
//! deserialized from another participant lands in the right state.

mod musig2_session;

#[cfg(test)]
mod end_to_end;

use std::fmt;

use miniscript::bitcoin::psbt::Input;
use miniscript::bitcoin::secp256k1::{self, PublicKey};
use miniscript::bitcoin::{CompressedPublicKey, OutPoint, ScriptBuf, Txid};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::fixed_script_wallet::bitgo_psbt::p2tr_musig2_input::parse_musig2_partial_sigs;
use crate::fixed_script_wallet::bitgo_psbt::{
    BitGoPsbt, InputScriptType, ParsedOutput, ParsedTransaction, PsbtOptions,
    ReplayProtectionOptions, ScriptId, WalletInputOptions,
};
use crate::fixed_script_wallet::{ReplayProtection, RootWalletKeys};
use crate::config::{EngineConfig, DEFAULT_INDEX_WINDOW};
use crate::keys::Key;
use crate::transaction::ChainTransaction;
use crate::Network;

pub use musig2_session::{Musig2Session, Musig2SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PsbtState {
    /// No signatures on any input.
    Building,
    PartiallySigned,
    /// Every input has the signatures it needs.
    FullySigned,
    Finalized,
}

impl fmt::Display for PsbtState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PsbtState::Building => "Building",
            PsbtState::PartiallySigned => "PartiallySigned",
            PsbtState::FullySigned => "FullySigned",
            PsbtState::Finalized => "Finalized",
        };
        f.write_str(name)
    }
}

fn is_input_finalized(input: &Input) -> bool {
    input.final_script_sig.is_some() || input.final_script_witness.is_some()
}

/// ECDSA, Schnorr script path and MuSig2 partial signatures on the input.
fn signature_count(input: &Input) -> usize {
    let musig2_partial_sigs = parse_musig2_partial_sigs(input)
        .map(|sigs| sigs.len())
        .unwrap_or(0);
    input.partial_sigs.len() + input.tap_script_sigs.len() + musig2_partial_sigs
}

fn required_signatures(input: &Input) -> usize {
    InputScriptType::from_input_metadata(input)
        .map(|script_type| script_type.required_signatures())
        .unwrap_or(1)
}

/// State of `psbt`, from its inputs.
pub fn psbt_state(psbt: &BitGoPsbt) -> PsbtState {
    if psbt.is_finalized() {
        return PsbtState::Finalized;
    }
    let inputs = &psbt.psbt().inputs;
    let signed = inputs.iter().map(signature_count).sum::<usize>();
    if signed == 0 {
        return PsbtState::Building;
    }
    let complete = inputs
        .iter()
        .all(|input| is_input_finalized(input) || signature_count(input) >= required_signatures(input));
    if complete {
        PsbtState::FullySigned
    } else {
        PsbtState::PartiallySigned
    }
}

/// Operations a wallet signer performs on a PSBT.
pub trait WalletEngine {
    fn network(&self) -> Network;

    fn state(&self) -> PsbtState;

    fn add_wallet_input(
        &mut self,
        previous_output: OutPoint,
        value: u64,
        wallet_keys: &RootWalletKeys,
        script_id: ScriptId,
        options: &WalletInputOptions,
    ) -> Result<usize, EngineError>;

    fn add_replay_protection_input(
        &mut self,
        previous_output: OutPoint,
        value: u64,
        public_key: CompressedPublicKey,
        options: &ReplayProtectionOptions,
    ) -> Result<usize, EngineError>;

    fn add_wallet_output(
        &mut self,
        wallet_keys: &RootWalletKeys,
        script_id: ScriptId,
        value: u64,
    ) -> Result<usize, EngineError>;

    fn add_output(&mut self, script: ScriptBuf, value: u64) -> Result<usize, EngineError>;

    fn parse_transaction_with_wallet_keys(
        &self,
        wallet_keys: &RootWalletKeys,
        replay_protection: &ReplayProtection,
        paygo_pubkeys: &[PublicKey],
    ) -> Result<ParsedTransaction, EngineError>;

    fn parse_outputs_with_wallet_keys(
        &self,
        wallet_keys: &RootWalletKeys,
    ) -> Result<Vec<ParsedOutput>, EngineError>;

    fn verify_signature(&self, input_index: usize, key: &Key) -> Result<bool, EngineError>;

    fn verify_replay_protection_signature(
        &self,
        input_index: usize,
        replay_protection: &ReplayProtection,
    ) -> Result<bool, EngineError>;

    /// Signs every input `key` can sign, returns their indices.
    fn sign(&mut self, key: &Key) -> Result<Vec<usize>, EngineError>;

    /// Signs one input. Fails if `key` cannot sign it.
    fn sign_input(&mut self, input_index: usize, key: &Key) -> Result<(), EngineError>;

    fn add_paygo_attestation(
        &mut self,
        output_index: usize,
        entropy: Vec<u8>,
        signature: Vec<u8>,
    ) -> Result<(), EngineError>;

    fn combine_musig2_nonces(&mut self, other: &Self) -> Result<(), EngineError>;

    fn finalize_all_inputs(&mut self) -> Result<(), EngineError>;

    fn extract_transaction(&self) -> Result<ChainTransaction, EngineError>;

    fn serialize(&self) -> Result<Vec<u8>, EngineError>;

    fn unsigned_txid(&self) -> Result<Txid, EngineError>;
}

/// A [`BitGoPsbt`] with lifecycle checks.
#[derive(Debug, Clone)]
pub struct WalletPsbt {
    psbt: BitGoPsbt,
    index_window: u32,
    secp: secp256k1::Secp256k1<secp256k1::All>,
}

impl WalletPsbt {
    pub fn new(network: Network, options: &PsbtOptions) -> Result<Self, EngineError> {
        Ok(Self::from_bitgo_psbt(BitGoPsbt::new(network, options)?))
    }

    pub fn from_bitgo_psbt(psbt: BitGoPsbt) -> Self {
        WalletPsbt {
            psbt,
            index_window: DEFAULT_INDEX_WINDOW,
            secp: secp256k1::Secp256k1::new(),
        }
    }

    pub fn deserialize(bytes: &[u8], network: Network) -> Result<Self, EngineError> {
        Ok(Self::from_bitgo_psbt(BitGoPsbt::deserialize(bytes, network)?))
    }

    /// Deserializes with the network and scan window of `config`.
    pub fn deserialize_with_config(bytes: &[u8], config: &EngineConfig) -> Result<Self, EngineError> {
        Ok(Self::deserialize(bytes, config.network()?)?.with_index_window(config.index_window))
    }

    pub fn with_index_window(mut self, index_window: u32) -> Self {
        self.index_window = index_window;
        self
    }

    pub fn bitgo_psbt(&self) -> &BitGoPsbt {
        &self.psbt
    }

    pub fn into_bitgo_psbt(self) -> BitGoPsbt {
        self.psbt
    }

    pub(crate) fn bitgo_psbt_mut(&mut self) -> &mut BitGoPsbt {
        &mut self.psbt
    }

    pub(crate) fn secp(&self) -> &secp256k1::Secp256k1<secp256k1::All> {
        &self.secp
    }

    /// Merges signatures from another copy of this PSBT.
    pub fn combine(&mut self, other: &WalletPsbt) -> Result<(), EngineError> {
        self.ensure_not_finalized()?;
        self.transition("combine", |psbt| psbt.combine(&other.psbt))
    }

    fn ensure_not_finalized(&self) -> Result<(), EngineError> {
        if self.state() == PsbtState::Finalized {
            return Err(EngineError::AlreadyFinalized);
        }
        Ok(())
    }

    /// Inputs and outputs can only be added while signatures are missing.
    fn ensure_extendable(&self, operation: &'static str) -> Result<(), EngineError> {
        match self.state() {
            PsbtState::Building | PsbtState::PartiallySigned => Ok(()),
            PsbtState::Finalized => Err(EngineError::AlreadyFinalized),
            state @ PsbtState::FullySigned => Err(EngineError::InvalidState {
                operation,
                state: state.to_string(),
            }),
        }
    }

    /// Runs a mutation and logs the state change it causes.
    pub(crate) fn transition<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut BitGoPsbt) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let before = self.state();
        let result = f(&mut self.psbt)?;
        let after = self.state();
        if before != after {
            debug!(operation, from = %before, to = %after, network = %self.network(), "psbt state changed");
        }
        Ok(result)
    }
}

impl WalletEngine for WalletPsbt {
    fn network(&self) -> Network {
        self.psbt.network()
    }

    fn state(&self) -> PsbtState {
        psbt_state(&self.psbt)
    }

    fn add_wallet_input(
        &mut self,
        previous_output: OutPoint,
        value: u64,
        wallet_keys: &RootWalletKeys,
        script_id: ScriptId,
        options: &WalletInputOptions,
    ) -> Result<usize, EngineError> {
        self.ensure_extendable("add input")?;
        self.transition("add input", |psbt| {
            psbt.add_wallet_input(previous_output, value, wallet_keys, script_id, options)
        })
    }

    fn add_replay_protection_input(
        &mut self,
        previous_output: OutPoint,
        value: u64,
        public_key: CompressedPublicKey,
        options: &ReplayProtectionOptions,
    ) -> Result<usize, EngineError> {
        self.ensure_extendable("add input")?;
        self.transition("add input", |psbt| {
            psbt.add_replay_protection_input(previous_output, value, public_key, options)
        })
    }

    fn add_wallet_output(
        &mut self,
        wallet_keys: &RootWalletKeys,
        script_id: ScriptId,
        value: u64,
    ) -> Result<usize, EngineError> {
        self.ensure_extendable("add output")?;
        self.transition("add output", |psbt| {
            psbt.add_wallet_output(wallet_keys, script_id, value)
        })
    }

    fn add_output(&mut self, script: ScriptBuf, value: u64) -> Result<usize, EngineError> {
        self.ensure_extendable("add output")?;
        self.transition("add output", |psbt| psbt.add_output(script, value))
    }

    fn parse_transaction_with_wallet_keys(
        &self,
        wallet_keys: &RootWalletKeys,
        replay_protection: &ReplayProtection,
        paygo_pubkeys: &[PublicKey],
    ) -> Result<ParsedTransaction, EngineError> {
        Ok(self.psbt.parse_transaction_with_wallet_keys(
            wallet_keys,
            replay_protection,
            paygo_pubkeys,
            self.index_window,
        )?)
    }

    fn parse_outputs_with_wallet_keys(
        &self,
        wallet_keys: &RootWalletKeys,
    ) -> Result<Vec<ParsedOutput>, EngineError> {
        Ok(self
            .psbt
            .parse_outputs_with_wallet_keys(wallet_keys, self.index_window)?)
    }

    fn verify_signature(&self, input_index: usize, key: &Key) -> Result<bool, EngineError> {
        self.psbt.verify_signature(&self.secp, input_index, key)
    }

    fn verify_replay_protection_signature(
        &self,
        input_index: usize,
        replay_protection: &ReplayProtection,
    ) -> Result<bool, EngineError> {
        self.psbt
            .verify_replay_protection_signature(&self.secp, input_index, replay_protection)
    }

    fn sign(&mut self, key: &Key) -> Result<Vec<usize>, EngineError> {
        self.ensure_not_finalized()?;
        let secp = self.secp.clone();
        match key {
            Key::ExtendedPrivate(xpriv) => {
                for (input_index, input) in self.psbt.psbt().inputs.iter().enumerate() {
                    if InputScriptType::from_input_metadata(input)
                        == Some(InputScriptType::P2trMusig2KeyPath)
                    {
                        warn!(input_index, "skipping musig2 key path input, sign it with a Musig2Session");
                    }
                }
                self.transition("sign", |psbt| psbt.sign_all_with_xpriv(&secp, xpriv))
            }
            Key::RawPrivate(private_key) => self.transition("sign", |psbt| {
                let mut signed = vec![];
                for input_index in 0..psbt.input_count() {
                    if psbt.sign_input_with_private_key(&secp, input_index, private_key)? {
                        signed.push(input_index);
                    }
                }
                Ok(signed)
            }),
            Key::ExtendedPublic(_) | Key::RawPublic(_) => Err(EngineError::InvalidInput(
                "signing requires a private key".to_string(),
            )),
        }
    }

    fn sign_input(&mut self, input_index: usize, key: &Key) -> Result<(), EngineError> {
        self.ensure_not_finalized()?;
        let secp = self.secp.clone();
        let signed = match key {
            Key::ExtendedPrivate(xpriv) => self.transition("sign input", |psbt| {
                psbt.sign_wallet_input(&secp, input_index, xpriv)
            })?,
            Key::RawPrivate(private_key) => self.transition("sign input", |psbt| {
                psbt.check_input_index(input_index)?;
                psbt.sign_input_with_private_key(&secp, input_index, private_key)
            })?,
            Key::ExtendedPublic(_) | Key::RawPublic(_) => {
                return Err(EngineError::InvalidInput(
                    "signing requires a private key".to_string(),
                ))
            }
        };
        if !signed {
            return Err(EngineError::InvalidInput(format!(
                "Input {}: key cannot sign this input",
                input_index
            )));
        }
        debug!(input_index, "signed input");
        Ok(())
    }

    fn add_paygo_attestation(
        &mut self,
        output_index: usize,
        entropy: Vec<u8>,
        signature: Vec<u8>,
    ) -> Result<(), EngineError> {
        self.psbt
            .add_paygo_attestation(output_index, entropy, signature)
    }

    fn combine_musig2_nonces(&mut self, other: &Self) -> Result<(), EngineError> {
        self.ensure_not_finalized()?;
        self.psbt.combine_musig2_nonces(&other.psbt)
    }

    fn finalize_all_inputs(&mut self) -> Result<(), EngineError> {
        self.ensure_not_finalized()?;
        let secp = self.secp.clone();
        self.transition("finalize", |psbt| psbt.finalize_mut(&secp))
    }

    fn extract_transaction(&self) -> Result<ChainTransaction, EngineError> {
        if self.state() != PsbtState::Finalized {
            return Err(EngineError::NotFinalized);
        }
        self.psbt.extract_transaction()
    }

    fn serialize(&self) -> Result<Vec<u8>, EngineError> {
        Ok(self.psbt.serialize()?)
    }

    fn unsigned_txid(&self) -> Result<Txid, EngineError> {
        self.psbt.unsigned_txid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_script_wallet::wallet_keys::tests::{
        get_test_wallet_keys, get_test_wallet_xprvs,
    };
    use crate::fixed_script_wallet::ScriptP2shP2pk;
    use miniscript::bitcoin::{NetworkKind, PrivateKey};
    use std::str::FromStr;

    const SEED: &str = "engine";

    fn outpoint(vout: u32) -> OutPoint {
        OutPoint::from_str(&format!(
            "{}:{}",
            "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b", vout
        ))
        .unwrap()
    }

    /// Two p2wsh inputs, a change output and an external output.
    fn two_input_psbt() -> WalletPsbt {
        let keys = get_test_wallet_keys(SEED);
        let mut psbt = WalletPsbt::new(Network::Bitcoin, &PsbtOptions::default()).unwrap();
        for vout in 0..2 {
            psbt.add_wallet_input(
                outpoint(vout),
                100_000,
                &keys,
                ScriptId { chain: 20, index: vout },
                &WalletInputOptions::default(),
            )
            .unwrap();
        }
        psbt.add_wallet_output(&keys, ScriptId { chain: 21, index: 0 }, 50_000)
            .unwrap();
        psbt.add_output(
            ScriptBuf::from_hex("0014000000000000000000000000000000000000000a").unwrap(),
            140_000,
        )
        .unwrap();
        psbt
    }

    fn user_key() -> Key {
        Key::ExtendedPrivate(get_test_wallet_xprvs(SEED)[0])
    }

    fn bitgo_key() -> Key {
        Key::ExtendedPrivate(get_test_wallet_xprvs(SEED)[2])
    }

    #[test]
    fn test_state_transitions() {
        let mut psbt = two_input_psbt();
        assert_eq!(psbt.state(), PsbtState::Building);

        psbt.sign_input(0, &user_key()).unwrap();
        assert_eq!(psbt.state(), PsbtState::PartiallySigned);
        psbt.sign(&user_key()).unwrap();
        assert_eq!(psbt.state(), PsbtState::PartiallySigned);
        assert_eq!(psbt.sign(&bitgo_key()).unwrap(), vec![0, 1]);
        assert_eq!(psbt.state(), PsbtState::FullySigned);

        psbt.finalize_all_inputs().unwrap();
        assert_eq!(psbt.state(), PsbtState::Finalized);
        let extracted = psbt.extract_transaction().unwrap();
        assert_eq!(extracted.txid().unwrap(), psbt.unsigned_txid().unwrap());
    }

    #[test]
    fn test_state_is_monotonic_under_signing() {
        let mut psbt = two_input_psbt();
        let mut previous = psbt.state();
        for (input_index, key) in [(0, user_key()), (1, user_key()), (0, bitgo_key()), (1, bitgo_key())] {
            psbt.sign_input(input_index, &key).unwrap();
            let state = psbt.state();
            assert!(state >= previous);
            previous = state;
        }
        assert_eq!(previous, PsbtState::FullySigned);
    }

    #[test]
    fn test_finalized_psbt_rejects_mutation() {
        let keys = get_test_wallet_keys(SEED);
        let mut psbt = two_input_psbt();
        psbt.sign(&user_key()).unwrap();
        psbt.sign(&bitgo_key()).unwrap();

        assert!(matches!(
            psbt.add_output(ScriptBuf::new(), 1),
            Err(EngineError::InvalidState { .. })
        ));

        psbt.finalize_all_inputs().unwrap();
        assert!(matches!(
            psbt.add_wallet_output(&keys, ScriptId { chain: 1, index: 0 }, 1),
            Err(EngineError::AlreadyFinalized)
        ));
        assert!(matches!(
            psbt.add_wallet_input(
                outpoint(9),
                1,
                &keys,
                ScriptId { chain: 0, index: 0 },
                &WalletInputOptions::default()
            ),
            Err(EngineError::AlreadyFinalized)
        ));
        assert!(matches!(psbt.sign(&user_key()), Err(EngineError::AlreadyFinalized)));
        assert!(matches!(
            psbt.sign_input(0, &user_key()),
            Err(EngineError::AlreadyFinalized)
        ));
        assert!(matches!(
            psbt.finalize_all_inputs(),
            Err(EngineError::AlreadyFinalized)
        ));
    }

    #[test]
    fn test_add_output_keeps_state() {
        let keys = get_test_wallet_keys(SEED);
        let mut psbt = two_input_psbt();
        psbt.sign_input(0, &user_key()).unwrap();
        assert_eq!(psbt.state(), PsbtState::PartiallySigned);

        assert_eq!(
            psbt.add_wallet_output(&keys, ScriptId { chain: 11, index: 3 }, 1_000)
                .unwrap(),
            2
        );
        assert_eq!(psbt.add_output(ScriptBuf::new(), 500).unwrap(), 3);
        assert_eq!(psbt.state(), PsbtState::PartiallySigned);

        assert!(matches!(
            psbt.add_wallet_output(&keys, ScriptId { chain: 99, index: 0 }, 1_000),
            Err(EngineError::InvalidInput(_))
        ));
        assert_eq!(psbt.bitgo_psbt().output_count(), 4);
        assert_eq!(psbt.state(), PsbtState::PartiallySigned);
    }

    #[test]
    fn test_finalize_is_atomic() {
        let mut psbt = two_input_psbt();
        psbt.sign(&user_key()).unwrap();
        psbt.sign_input(0, &bitgo_key()).unwrap();
        let before = psbt.serialize().unwrap();

        match psbt.finalize_all_inputs() {
            Err(EngineError::FinalizeFailed(errors)) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(psbt.serialize().unwrap(), before);
        assert_eq!(psbt.state(), PsbtState::PartiallySigned);
        assert!(matches!(
            psbt.extract_transaction(),
            Err(EngineError::NotFinalized)
        ));
    }

    #[test]
    fn test_sign_input_touches_one_input() {
        let mut psbt = two_input_psbt();
        psbt.sign_input(1, &user_key()).unwrap();
        let inputs = &psbt.bitgo_psbt().psbt().inputs;
        assert!(inputs[0].partial_sigs.is_empty());
        assert_eq!(inputs[1].partial_sigs.len(), 1);

        let user = user_key().to_public(psbt.secp());
        assert!(!psbt.verify_signature(0, &user).unwrap());
        assert!(psbt.verify_signature(1, &user).unwrap());
        assert!(psbt.verify_signature(1, &user_key()).unwrap());
        assert!(matches!(
            psbt.verify_signature(2, &user),
            Err(EngineError::InputIndexOutOfBounds { index: 2, count: 2 })
        ));
    }

    #[test]
    fn test_sign_input_with_foreign_key() {
        let mut psbt = two_input_psbt();
        let foreign = Key::ExtendedPrivate(get_test_wallet_xprvs("other")[0]);
        assert!(matches!(
            psbt.sign_input(0, &foreign),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(psbt.sign(&foreign).unwrap().is_empty());
        assert!(matches!(
            psbt.sign(&user_key().to_public(psbt.secp())),
            Err(EngineError::InvalidInput(_))
        ));
        assert_eq!(psbt.state(), PsbtState::Building);
    }

    #[test]
    fn test_replay_protection_input() {
        let keys = get_test_wallet_keys(SEED);
        let private_key = PrivateKey::new(
            secp256k1::SecretKey::from_slice(&[7u8; 32]).unwrap(),
            NetworkKind::Main,
        );
        let secp = secp256k1::Secp256k1::new();
        let public_key = CompressedPublicKey(private_key.inner.public_key(&secp));
        let replay_protection = ReplayProtection::from_public_keys(vec![public_key]);

        let mut psbt = WalletPsbt::new(Network::BitcoinCash, &PsbtOptions::default())
            .unwrap()
            .with_index_window(5);
        psbt.add_wallet_input(
            outpoint(0),
            100_000,
            &keys,
            ScriptId { chain: 0, index: 0 },
            &WalletInputOptions::default(),
        )
        .unwrap();
        psbt.add_replay_protection_input(
            outpoint(1),
            1_000,
            public_key,
            &ReplayProtectionOptions::default(),
        )
        .unwrap();
        psbt.add_output(ScriptP2shP2pk::new(public_key).output_script(), 90_000)
            .unwrap();

        let raw = Key::RawPrivate(private_key);
        assert!(matches!(
            psbt.sign_input(0, &raw),
            Err(EngineError::InvalidInput(_))
        ));
        assert_eq!(psbt.sign(&raw).unwrap(), vec![1]);
        assert!(psbt
            .verify_replay_protection_signature(1, &replay_protection)
            .unwrap());
        assert!(psbt.verify_signature(1, &raw.to_public(&secp)).unwrap());

        psbt.sign(&user_key()).unwrap();
        psbt.sign(&bitgo_key()).unwrap();
        assert_eq!(psbt.state(), PsbtState::FullySigned);

        let parsed = psbt
            .parse_transaction_with_wallet_keys(&keys, &replay_protection, &[])
            .unwrap();
        assert_eq!(parsed.inputs[1].script_type, InputScriptType::P2shP2pk);
        assert_eq!(parsed.miner_fee, 11_000);
        assert_eq!(parsed.spend_amount, 90_000);

        psbt.finalize_all_inputs().unwrap();
        assert!(psbt
            .verify_replay_protection_signature(1, &replay_protection)
            .unwrap());
    }

    #[test]
    fn test_round_trip_keeps_state() {
        let mut psbt = two_input_psbt();
        psbt.sign(&user_key()).unwrap();
        let bytes = psbt.serialize().unwrap();
        let copy = WalletPsbt::deserialize(&bytes, Network::Bitcoin).unwrap();
        assert_eq!(copy.state(), PsbtState::PartiallySigned);
        assert_eq!(copy.unsigned_txid().unwrap(), psbt.unsigned_txid().unwrap());
        assert_eq!(copy.serialize().unwrap(), bytes);
        assert_eq!(copy.into_bitgo_psbt().serialize().unwrap(), bytes);
    }

    #[test]
    fn test_combine_signatures() {
        let mut user_copy = two_input_psbt();
        let mut bitgo_copy =
            WalletPsbt::deserialize(&user_copy.serialize().unwrap(), Network::Bitcoin).unwrap();
        user_copy.sign(&user_key()).unwrap();
        bitgo_copy.sign(&bitgo_key()).unwrap();
        user_copy.combine(&bitgo_copy).unwrap();
        assert_eq!(user_copy.state(), PsbtState::FullySigned);

        let config = EngineConfig::from_json_str(r#"{"network": "btc", "index_window": 10}"#).unwrap();
        let reparsed =
            WalletPsbt::deserialize_with_config(&user_copy.serialize().unwrap(), &config).unwrap();
        assert_eq!(reparsed.state(), PsbtState::FullySigned);
        let keys = get_test_wallet_keys(SEED);
        let outputs = reparsed.parse_outputs_with_wallet_keys(&keys).unwrap();
        assert_eq!(outputs.len(), 2);
        assert!(outputs[0].script_id.is_some());
        assert!(outputs[1].script_id.is_none());
    }
}
