//! BitGo PSBTs across bitcoin-like networks.
//!
//! [`BitGoPsbt`] holds a `bitcoin` PSBT together with its network. Zcash and
//! Dash transactions do not fit the bitcoin encoding, their wrappers swap the
//! encoding at the byte boundary so that everything in between works on a
//! plain [`Psbt`].

pub mod dash_psbt;
mod finalize;
pub mod p2tr_musig2_input;
mod propkv;
mod psbt_builder;
pub mod psbt_wallet_input;
pub mod psbt_wallet_output;
mod raw_maps;
pub mod sighash;
mod signer;
pub mod zcash_psbt;

use miniscript::bitcoin::bip32::Xpub;
use miniscript::bitcoin::psbt::Psbt;
use miniscript::bitcoin::secp256k1::{self, PublicKey};
use miniscript::bitcoin::{CompressedPublicKey, Transaction, Txid};
use tracing::{debug, trace};

use crate::dimensions::Dimensions;
use crate::error::EngineError;
use crate::fixed_script_wallet::{ReplayProtection, RootWalletKeys};
use crate::keys::Key;
use crate::networks::TransactionFormat;
use crate::transaction::ChainTransaction;
use crate::Network;

pub use dash_psbt::DashBitGoPsbt;
pub use p2tr_musig2_input::{Musig2Error, Musig2Input};
pub use propkv::{
    find_kv, get_zec_consensus_branch_id, is_musig2_key, BitGoKeyValue, ProprietaryKeySubtype,
    BITGO,
};
pub use psbt_builder::PsbtOptions;
pub use psbt_wallet_input::{
    InputScriptType, ParsedInput, ReplayProtectionOptions, ScriptId, WalletInputOptions,
    DEFAULT_SEQUENCE,
};
pub use psbt_wallet_output::ParsedOutput;
pub use sighash::{validate_sighash_type, EcdsaSighash};
pub use zcash_psbt::ZcashBitGoPsbt;

use p2tr_musig2_input::key_spend_sighash;
use psbt_wallet_input::{get_output_script_and_value, verify_ecdsa_signature};
use sighash::legacy_message;

#[derive(Debug)]
pub enum DeserializeError {
    Consensus(miniscript::bitcoin::consensus::encode::Error),
    Psbt(miniscript::bitcoin::psbt::Error),
    /// Network-specific decoding failure.
    Network(String),
}

impl std::fmt::Display for DeserializeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeserializeError::Consensus(e) => write!(f, "{}", e),
            DeserializeError::Psbt(e) => write!(f, "{}", e),
            DeserializeError::Network(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for DeserializeError {}

impl From<miniscript::bitcoin::consensus::encode::Error> for DeserializeError {
    fn from(e: miniscript::bitcoin::consensus::encode::Error) -> Self {
        DeserializeError::Consensus(e)
    }
}

impl From<miniscript::bitcoin::psbt::Error> for DeserializeError {
    fn from(e: miniscript::bitcoin::psbt::Error) -> Self {
        DeserializeError::Psbt(e)
    }
}

#[derive(Debug)]
pub enum SerializeError {
    Io(miniscript::bitcoin::io::Error),
    Network(String),
}

impl std::fmt::Display for SerializeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SerializeError::Io(e) => write!(f, "{}", e),
            SerializeError::Network(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SerializeError {}

impl From<miniscript::bitcoin::io::Error> for SerializeError {
    fn from(e: miniscript::bitcoin::io::Error) -> Self {
        SerializeError::Io(e)
    }
}

impl From<DeserializeError> for SerializeError {
    fn from(e: DeserializeError) -> Self {
        match e {
            DeserializeError::Consensus(ce) => {
                SerializeError::Network(format!("Consensus error: {}", ce))
            }
            DeserializeError::Psbt(pe) => SerializeError::Network(format!("PSBT error: {}", pe)),
            DeserializeError::Network(msg) => SerializeError::Network(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BitGoPsbt {
    BitcoinLike(Psbt, Network),
    Zcash(ZcashBitGoPsbt),
    Dash(DashBitGoPsbt),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTransaction {
    pub inputs: Vec<ParsedInput>,
    pub outputs: Vec<ParsedOutput>,
    /// Sum of external outputs.
    pub spend_amount: u64,
    pub miner_fee: u64,
    /// Upper bound of the finalized transaction's virtual size.
    pub virtual_size: u32,
}

#[derive(Debug)]
pub enum ParseTransactionError {
    Input {
        index: usize,
        error: psbt_wallet_input::ParseInputError,
    },
    InputValueOverflow {
        index: usize,
    },
    Output {
        index: usize,
        error: psbt_wallet_output::ParseOutputError,
    },
    OutputValueOverflow {
        index: usize,
    },
    SpendAmountOverflow {
        index: usize,
    },
    PayGo {
        index: usize,
        error: String,
    },
    /// Outputs exceed inputs.
    FeeCalculation,
}

impl std::fmt::Display for ParseTransactionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseTransactionError::Input { index, error } => {
                write!(f, "Input {}: {}", index, error)
            }
            ParseTransactionError::InputValueOverflow { index } => {
                write!(f, "Input {}: value overflow", index)
            }
            ParseTransactionError::Output { index, error } => {
                write!(f, "Output {}: {}", index, error)
            }
            ParseTransactionError::OutputValueOverflow { index } => {
                write!(f, "Output {}: value overflow", index)
            }
            ParseTransactionError::SpendAmountOverflow { index } => {
                write!(f, "Output {}: spend amount overflow", index)
            }
            ParseTransactionError::PayGo { index, error } => {
                write!(f, "Output {}: PayGo attestation: {}", index, error)
            }
            ParseTransactionError::FeeCalculation => {
                write!(f, "Fee calculation error: outputs exceed inputs")
            }
        }
    }
}

impl std::error::Error for ParseTransactionError {}

impl From<ParseTransactionError> for EngineError {
    fn from(err: ParseTransactionError) -> Self {
        match err {
            ParseTransactionError::Input {
                index,
                error: psbt_wallet_input::ParseInputError::Unmatched(reason),
            } => EngineError::UnmatchedInput { index, reason },
            other => EngineError::Psbt(other.to_string()),
        }
    }
}

impl BitGoPsbt {
    pub fn deserialize(psbt_bytes: &[u8], network: Network) -> Result<BitGoPsbt, DeserializeError> {
        match network.transaction_format() {
            TransactionFormat::Zcash => Ok(BitGoPsbt::Zcash(ZcashBitGoPsbt::deserialize(
                psbt_bytes, network,
            )?)),
            TransactionFormat::Dash => Ok(BitGoPsbt::Dash(DashBitGoPsbt::deserialize(
                psbt_bytes, network,
            )?)),
            TransactionFormat::Standard => Ok(BitGoPsbt::BitcoinLike(
                Psbt::deserialize(psbt_bytes)?,
                network,
            )),
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        match self {
            BitGoPsbt::BitcoinLike(psbt, _) => Ok(psbt.serialize()),
            BitGoPsbt::Zcash(zcash_psbt) => zcash_psbt.serialize(),
            BitGoPsbt::Dash(dash_psbt) => dash_psbt.serialize(),
        }
    }

    pub fn network(&self) -> Network {
        match self {
            BitGoPsbt::BitcoinLike(_, network) => *network,
            BitGoPsbt::Zcash(zcash_psbt) => zcash_psbt.network(),
            BitGoPsbt::Dash(dash_psbt) => dash_psbt.network(),
        }
    }

    pub fn psbt(&self) -> &Psbt {
        match self {
            BitGoPsbt::BitcoinLike(psbt, _) => psbt,
            BitGoPsbt::Zcash(zcash_psbt) => &zcash_psbt.psbt,
            BitGoPsbt::Dash(dash_psbt) => &dash_psbt.psbt,
        }
    }

    pub fn psbt_mut(&mut self) -> &mut Psbt {
        match self {
            BitGoPsbt::BitcoinLike(psbt, _) => psbt,
            BitGoPsbt::Zcash(zcash_psbt) => &mut zcash_psbt.psbt,
            BitGoPsbt::Dash(dash_psbt) => &mut dash_psbt.psbt,
        }
    }

    pub fn into_psbt(self) -> Psbt {
        match self {
            BitGoPsbt::BitcoinLike(psbt, _) => psbt,
            BitGoPsbt::Zcash(zcash_psbt) => zcash_psbt.into_psbt(),
            BitGoPsbt::Dash(dash_psbt) => dash_psbt.into_psbt(),
        }
    }

    /// Txid of the unsigned transaction in the network's own encoding.
    pub fn unsigned_txid(&self) -> Result<Txid, EngineError> {
        match self {
            BitGoPsbt::BitcoinLike(psbt, _) => Ok(psbt.unsigned_tx.compute_txid()),
            BitGoPsbt::Zcash(zcash_psbt) => {
                zcash_psbt.unsigned_txid().map_err(EngineError::Transaction)
            }
            BitGoPsbt::Dash(dash_psbt) => {
                dash_psbt.unsigned_txid().map_err(EngineError::Transaction)
            }
        }
    }

    pub fn input_count(&self) -> usize {
        self.psbt().inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.psbt().outputs.len()
    }

    pub(crate) fn check_input_index(&self, input_index: usize) -> Result<(), EngineError> {
        let count = self.input_count();
        if input_index >= count {
            return Err(EngineError::InputIndexOutOfBounds {
                index: input_index,
                count,
            });
        }
        Ok(())
    }

    /// How ECDSA messages are computed for this PSBT.
    pub fn ecdsa_sighash(&self) -> Result<EcdsaSighash, EngineError> {
        match self {
            BitGoPsbt::Zcash(zcash_psbt) => Ok(EcdsaSighash::Zcash {
                branch_id: zcash_psbt.consensus_branch_id().ok_or_else(|| {
                    EngineError::Psbt("Zcash PSBT has no consensus branch id".to_string())
                })?,
                version_group_id: zcash_psbt.version_group_id,
                expiry_height: zcash_psbt.expiry_height,
            }),
            _ => Ok(match self.network().fork_id() {
                Some(fork_id) => EcdsaSighash::ForkId(fork_id),
                None => EcdsaSighash::Standard,
            }),
        }
    }

    /// True once every input carries its final scripts.
    pub fn is_finalized(&self) -> bool {
        let inputs = &self.psbt().inputs;
        !inputs.is_empty()
            && inputs
                .iter()
                .all(|input| input.final_script_sig.is_some() || input.final_script_witness.is_some())
    }

    pub(crate) fn ensure_not_finalized(&self) -> Result<(), EngineError> {
        if self.is_finalized() {
            return Err(EngineError::AlreadyFinalized);
        }
        Ok(())
    }

    /// The signed transaction of a finalized PSBT.
    pub fn extract_tx(&self) -> Result<Transaction, EngineError> {
        if !self.is_finalized() {
            return Err(EngineError::NotFinalized);
        }
        Ok(self.psbt().clone().extract_tx_unchecked_fee_rate())
    }

    /// The signed transaction with the network's transaction fields.
    pub fn extract_transaction(&self) -> Result<ChainTransaction, EngineError> {
        let transaction = self.extract_tx()?;
        let extracted = match self {
            BitGoPsbt::BitcoinLike(_, _) => ChainTransaction::Standard(transaction),
            BitGoPsbt::Zcash(zcash_psbt) => {
                ChainTransaction::Zcash(zcash_psbt.zcash_transaction(&transaction))
            }
            BitGoPsbt::Dash(dash_psbt) => {
                ChainTransaction::Dash(dash_psbt.dash_transaction(&transaction))
            }
        };
        debug!(network = %self.network(), txid = %extracted.txid()?, "extracted transaction");
        Ok(extracted)
    }

    fn parse_inputs(
        &self,
        wallet_keys: &RootWalletKeys,
        replay_protection: &ReplayProtection,
        index_window: u32,
    ) -> Result<Vec<ParsedInput>, ParseTransactionError> {
        let psbt = self.psbt();
        let network = self.network();
        psbt.unsigned_tx
            .input
            .iter()
            .zip(psbt.inputs.iter())
            .enumerate()
            .map(|(index, (tx_input, psbt_input))| {
                let parsed = ParsedInput::parse(
                    psbt_input,
                    tx_input,
                    wallet_keys,
                    replay_protection,
                    network,
                    index_window,
                )
                .map_err(|error| ParseTransactionError::Input { index, error })?;
                trace!(input_index = index, script_type = %parsed.script_type, "parsed input");
                Ok(parsed)
            })
            .collect()
    }

    fn parse_outputs(
        &self,
        wallet_keys: &RootWalletKeys,
        paygo_pubkeys: &[PublicKey],
        index_window: u32,
    ) -> Result<Vec<ParsedOutput>, ParseTransactionError> {
        let psbt = self.psbt();
        let network = self.network();
        psbt.unsigned_tx
            .output
            .iter()
            .zip(psbt.outputs.iter())
            .enumerate()
            .map(|(index, (tx_output, psbt_output))| {
                let mut parsed =
                    ParsedOutput::parse(psbt_output, tx_output, wallet_keys, network, index_window)
                        .map_err(|error| ParseTransactionError::Output { index, error })?;
                parsed.paygo = crate::paygo::has_paygo_attestation_verify(
                    psbt_output,
                    parsed.address.as_deref(),
                    paygo_pubkeys,
                )
                .map_err(|error| ParseTransactionError::PayGo { index, error })?;
                Ok(parsed)
            })
            .collect()
    }

    fn sum_input_values(parsed_inputs: &[ParsedInput]) -> Result<u64, ParseTransactionError> {
        parsed_inputs
            .iter()
            .enumerate()
            .try_fold(0u64, |total, (index, input)| {
                total
                    .checked_add(input.value)
                    .ok_or(ParseTransactionError::InputValueOverflow { index })
            })
    }

    /// `(total, spend)` where spend only counts external outputs.
    fn sum_output_values(parsed_outputs: &[ParsedOutput]) -> Result<(u64, u64), ParseTransactionError> {
        parsed_outputs.iter().enumerate().try_fold(
            (0u64, 0u64),
            |(total, spend), (index, output)| {
                let total = total
                    .checked_add(output.value)
                    .ok_or(ParseTransactionError::OutputValueOverflow { index })?;
                let spend = if output.is_external() {
                    spend
                        .checked_add(output.value)
                        .ok_or(ParseTransactionError::SpendAmountOverflow { index })?
                } else {
                    spend
                };
                Ok((total, spend))
            },
        )
    }

    /// Classifies outputs against a wallet that need not own the inputs.
    pub fn parse_outputs_with_wallet_keys(
        &self,
        wallet_keys: &RootWalletKeys,
        index_window: u32,
    ) -> Result<Vec<ParsedOutput>, ParseTransactionError> {
        self.parse_outputs(wallet_keys, &[], index_window)
    }

    /// Classifies every input and output against the wallet.
    ///
    /// Inputs must belong to the wallet or to the replay protection set.
    /// Outputs that do not belong to the wallet are external and make up the
    /// spend amount. PayGo attestations are verified when `paygo_pubkeys` is
    /// not empty.
    pub fn parse_transaction_with_wallet_keys(
        &self,
        wallet_keys: &RootWalletKeys,
        replay_protection: &ReplayProtection,
        paygo_pubkeys: &[PublicKey],
        index_window: u32,
    ) -> Result<ParsedTransaction, ParseTransactionError> {
        let parsed_inputs = self.parse_inputs(wallet_keys, replay_protection, index_window)?;
        let parsed_outputs = self.parse_outputs(wallet_keys, paygo_pubkeys, index_window)?;

        let total_input_value = Self::sum_input_values(&parsed_inputs)?;
        let (total_output_value, spend_amount) = Self::sum_output_values(&parsed_outputs)?;
        let miner_fee = total_input_value
            .checked_sub(total_output_value)
            .ok_or(ParseTransactionError::FeeCalculation)?;

        let dimensions = Dimensions::from_parsed_inputs(&parsed_inputs)
            .plus(&Dimensions::from_output_scripts(
                parsed_outputs.iter().map(|output| output.script.len()),
            ));

        Ok(ParsedTransaction {
            virtual_size: dimensions.vsize_max(),
            inputs: parsed_inputs,
            outputs: parsed_outputs,
            spend_amount,
            miner_fee,
        })
    }

    /// Checks the signature of `key` on input `input_index`.
    ///
    /// Extended keys are derived along the path the input stores for them.
    /// Private keys are checked through their public half. `Ok(false)` only
    /// means that no signature of this key is present.
    pub fn verify_signature<C: secp256k1::Signing + secp256k1::Verification>(
        &self,
        secp: &secp256k1::Secp256k1<C>,
        input_index: usize,
        key: &Key,
    ) -> Result<bool, EngineError> {
        self.check_input_index(input_index)?;
        match key.to_public(secp) {
            Key::ExtendedPublic(xpub) => self.verify_signature_with_xpub(secp, input_index, &xpub),
            Key::RawPublic(public_key) => {
                self.verify_signature_with_pubkey(secp, input_index, public_key)
            }
            Key::ExtendedPrivate(_) | Key::RawPrivate(_) => {
                Err(EngineError::InvalidInput("expected a public key".to_string()))
            }
        }
    }

    pub fn verify_signature_with_xpub<C: secp256k1::Verification>(
        &self,
        secp: &secp256k1::Secp256k1<C>,
        input_index: usize,
        xpub: &Xpub,
    ) -> Result<bool, EngineError> {
        self.check_input_index(input_index)?;
        let input = &self.psbt().inputs[input_index];
        match psbt_wallet_input::derive_pubkey_from_input(secp, xpub, input)
            .map_err(EngineError::Psbt)?
        {
            Some(public_key) => self.verify_signature_with_pubkey(secp, input_index, public_key),
            None => Ok(false),
        }
    }

    /// Dispatches on the input type: MuSig2 partial signature, Schnorr
    /// script path, replay protection or wallet ECDSA.
    pub fn verify_signature_with_pubkey<C: secp256k1::Verification>(
        &self,
        secp: &secp256k1::Secp256k1<C>,
        input_index: usize,
        public_key: CompressedPublicKey,
    ) -> Result<bool, EngineError> {
        self.check_input_index(input_index)?;
        let psbt = self.psbt();
        let input = &psbt.inputs[input_index];

        match InputScriptType::from_input_metadata(input) {
            Some(InputScriptType::P2trMusig2KeyPath) => {
                let musig2_input = Musig2Input::from_input(input)?;
                if musig2_input.participants.index_of(&public_key).is_err() {
                    return Ok(false);
                }
                let message = key_spend_sighash(psbt, input_index)?;
                Ok(musig2_input.verify_partial_signature(&public_key, message)?)
            }
            Some(InputScriptType::P2trLegacy) | Some(InputScriptType::P2trMusig2ScriptPath) => Ok(
                psbt_wallet_input::verify_taproot_script_signature(
                    secp,
                    psbt,
                    input_index,
                    public_key,
                )
                .map_err(EngineError::Psbt)?,
            ),
            Some(InputScriptType::P2shP2pk) => {
                self.verify_p2pk_signature(secp, input_index, public_key)
            }
            _ => Ok(verify_ecdsa_signature(
                secp,
                psbt,
                input_index,
                public_key,
                &self.ecdsa_sighash()?,
            )
            .map_err(EngineError::Psbt)?),
        }
    }

    /// Signature of a P2SH-P2PK input, from `partial_sigs` or the final scriptSig.
    fn verify_p2pk_signature<C: secp256k1::Verification>(
        &self,
        secp: &secp256k1::Secp256k1<C>,
        input_index: usize,
        public_key: CompressedPublicKey,
    ) -> Result<bool, EngineError> {
        let psbt = self.psbt();
        let input = &psbt.inputs[input_index];
        let redeem_script = match &input.redeem_script {
            Some(redeem_script) => redeem_script.clone(),
            None => match &input.final_script_sig {
                Some(script_sig) => finalize::last_push(script_sig)?,
                None => return Ok(false),
            },
        };
        if crate::fixed_script_wallet::replay_protection_public_key(&redeem_script)? != public_key {
            return Ok(false);
        }

        let key = miniscript::bitcoin::PublicKey::new(public_key.0);
        let signature = if let Some(signature) = input.partial_sigs.get(&key) {
            *signature
        } else if let Some(script_sig) = &input.final_script_sig {
            finalize::first_signature(script_sig)?
        } else {
            return Ok(false);
        };

        let message = legacy_message(
            psbt,
            input_index,
            &redeem_script,
            signature.sighash_type.to_u32(),
        )
        .map_err(EngineError::Psbt)?;
        Ok(secp
            .verify_ecdsa(&message, &signature.signature, &public_key.0)
            .is_ok())
    }

    /// Checks a replay protection input against its own P2PK key.
    ///
    /// Errors if the input is not in the replay protection set.
    pub fn verify_replay_protection_signature<C: secp256k1::Verification>(
        &self,
        secp: &secp256k1::Secp256k1<C>,
        input_index: usize,
        replay_protection: &ReplayProtection,
    ) -> Result<bool, EngineError> {
        self.check_input_index(input_index)?;
        let psbt = self.psbt();
        let input = &psbt.inputs[input_index];
        let prevout = psbt.unsigned_tx.input[input_index].previous_output;
        let (output_script, _) = get_output_script_and_value(input, prevout)
            .map_err(|e| EngineError::Psbt(e.to_string()))?;
        if !replay_protection.is_replay_protection_input(output_script) {
            return Err(EngineError::InvalidInput(format!(
                "Input {} is not a replay protection input",
                input_index
            )));
        }

        let redeem_script = match (&input.redeem_script, &input.final_script_sig) {
            (Some(redeem_script), _) => redeem_script.clone(),
            (None, Some(script_sig)) => finalize::last_push(script_sig)?,
            (None, None) => match replay_protection.redeem_script_for(output_script) {
                Some(redeem_script) => redeem_script,
                None => return Ok(false),
            },
        };
        let public_key = crate::fixed_script_wallet::replay_protection_public_key(&redeem_script)?;
        self.verify_p2pk_signature(secp, input_index, public_key)
    }

    /// Attaches a PayGo address attestation to an output.
    pub fn add_paygo_attestation(
        &mut self,
        output_index: usize,
        entropy: Vec<u8>,
        signature: Vec<u8>,
    ) -> Result<(), EngineError> {
        self.ensure_not_finalized()?;
        let count = self.output_count();
        let output = self
            .psbt_mut()
            .outputs
            .get_mut(output_index)
            .ok_or_else(|| {
                EngineError::InvalidInput(format!(
                    "Output index {} out of bounds (psbt has {} outputs)",
                    output_index, count
                ))
            })?;
        crate::paygo::add_paygo_attestation(output, entropy, signature)
            .map_err(EngineError::InvalidInput)
    }

    fn ensure_same_transaction(&self, other: &BitGoPsbt) -> Result<(), EngineError> {
        if self.network() != other.network() || self.unsigned_txid()? != other.unsigned_txid()? {
            return Err(EngineError::InvalidInput(
                "PSBTs spend different transactions".to_string(),
            ));
        }
        Ok(())
    }

    /// Copies the MuSig2 public nonces of `other` into this PSBT.
    pub fn combine_musig2_nonces(&mut self, other: &BitGoPsbt) -> Result<(), EngineError> {
        self.ensure_not_finalized()?;
        self.ensure_same_transaction(other)?;
        for (index, (input, other_input)) in self
            .psbt_mut()
            .inputs
            .iter_mut()
            .zip(other.psbt().inputs.iter())
            .enumerate()
        {
            for kv in find_kv(ProprietaryKeySubtype::Musig2PubNonce, &other_input.proprietary) {
                kv.insert_into(&mut input.proprietary);
            }
            let nonces = p2tr_musig2_input::parse_musig2_nonces(input)?;
            trace!(input_index = index, nonces = nonces.len(), "combined musig2 nonces");
        }
        Ok(())
    }

    /// Merges the signatures and key-values of another copy of the same PSBT.
    pub fn combine(&mut self, other: &BitGoPsbt) -> Result<(), EngineError> {
        self.ensure_same_transaction(other)?;
        self.psbt_mut()
            .combine(other.psbt().clone())
            .map_err(|e| EngineError::Psbt(e.to_string()))
    }
}
