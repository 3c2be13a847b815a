//! Construction of BitGo PSBTs: empty transactions and wallet, replay
//! protection and plain inputs and outputs.

use miniscript::bitcoin::absolute::LockTime;
use miniscript::bitcoin::psbt::{Input, Output, Psbt, PsbtSighashType};
use miniscript::bitcoin::taproot::LeafVersion;
use miniscript::bitcoin::transaction::Version;
use miniscript::bitcoin::{
    consensus, Amount, CompressedPublicKey, OutPoint, ScriptBuf, Sequence, TapLeafHash,
    Transaction, TxIn, TxOut, Witness,
};
use tracing::debug;

use super::p2tr_musig2_input::{set_musig2_participants, Musig2Participants};
use super::psbt_wallet_input::ScriptId;
use super::sighash::{default_sighash_type, validate_sighash_type};
use super::{
    BitGoPsbt, DashBitGoPsbt, ReplayProtectionOptions, WalletInputOptions, ZcashBitGoPsbt,
    DEFAULT_SEQUENCE,
};
use crate::dash::DashTransaction;
use crate::error::EngineError;
use crate::fixed_script_wallet::wallet_keys::{derivation_path, to_pub_triple};
use crate::fixed_script_wallet::{
    build_tap_tree_for_output, create_tap_bip32_derivation_for_output, Chain, RootWalletKeys,
    ScriptP2shP2pk, SignPath, SignerKey, WalletScripts,
};
use crate::fixed_script_wallet::wallet_scripts::to_xonly;
use crate::networks::TransactionFormat;
use crate::zcash::ConsensusBranchId;
use crate::Network;

/// Transaction-level settings of a new PSBT.
#[derive(Debug, Clone, Default)]
pub struct PsbtOptions {
    /// Defaults to 2. Ignored on Zcash, which always uses version 4.
    pub version: Option<i32>,
    pub lock_time: u32,
    /// Required on Zcash.
    pub consensus_branch_id: Option<ConsensusBranchId>,
    /// Zcash only. 0 means no expiry.
    pub expiry_height: Option<u32>,
}

fn empty_transaction(version: i32, lock_time: u32) -> Transaction {
    Transaction {
        version: Version::non_standard(version),
        lock_time: LockTime::from_consensus(lock_time),
        input: vec![],
        output: vec![],
    }
}

/// Decoded previous transaction and the bytes to keep in the PSBT.
struct PrevTx {
    transaction: Transaction,
    txid: miniscript::bitcoin::Txid,
    original_bytes: Option<Vec<u8>>,
}

fn decode_prev_tx(prev_tx: &[u8], network: Network) -> Result<PrevTx, EngineError> {
    match network.transaction_format() {
        TransactionFormat::Standard => {
            let transaction: Transaction = consensus::deserialize(prev_tx)
                .map_err(|e| EngineError::InvalidInput(format!("Invalid prev_tx: {}", e)))?;
            Ok(PrevTx {
                txid: transaction.compute_txid(),
                transaction,
                original_bytes: None,
            })
        }
        TransactionFormat::Dash => {
            let dash_tx = DashTransaction::decode(prev_tx)
                .map_err(|e| EngineError::InvalidInput(format!("Invalid prev_tx: {}", e)))?;
            Ok(PrevTx {
                txid: dash_tx.txid().map_err(EngineError::Transaction)?,
                transaction: dash_tx.transaction,
                original_bytes: Some(prev_tx.to_vec()),
            })
        }
        TransactionFormat::Zcash => Err(EngineError::InvalidInput(
            "Zcash inputs take the previous output, not the previous transaction".to_string(),
        )),
    }
}

impl BitGoPsbt {
    /// Empty PSBT for `network`.
    pub fn new(network: Network, options: &PsbtOptions) -> Result<BitGoPsbt, EngineError> {
        let version = options.version.unwrap_or(2);
        match network.transaction_format() {
            TransactionFormat::Standard => Ok(BitGoPsbt::BitcoinLike(
                Psbt::from_unsigned_tx(empty_transaction(version, options.lock_time))
                    .map_err(|e| EngineError::Psbt(e.to_string()))?,
                network,
            )),
            TransactionFormat::Dash => Ok(BitGoPsbt::Dash(DashBitGoPsbt::new(
                empty_transaction(version, options.lock_time),
                network,
            )?)),
            TransactionFormat::Zcash => {
                let branch_id = options
                    .consensus_branch_id
                    .ok_or_else(|| {
                        EngineError::InvalidInput(
                            "Zcash PSBTs need a consensus branch id or a block height".to_string(),
                        )
                    })?
                    .resolve(network.is_mainnet())?;
                Ok(BitGoPsbt::Zcash(ZcashBitGoPsbt::new(
                    empty_transaction(version, options.lock_time),
                    network,
                    branch_id,
                    options.expiry_height.unwrap_or(0),
                )?))
            }
        }
    }

    /// Appends an input. The only place inputs are added.
    fn push_input(
        &mut self,
        previous_output: OutPoint,
        sequence: u32,
        mut input: Input,
        prev_tx: Option<&[u8]>,
        value: u64,
        output_script: ScriptBuf,
    ) -> Result<usize, EngineError> {
        self.ensure_not_finalized()?;
        let network = self.network();

        let mut original_bytes = None;
        match prev_tx {
            Some(prev_tx) => {
                let prev = decode_prev_tx(prev_tx, network)?;
                if prev.txid != previous_output.txid {
                    return Err(EngineError::InvalidInput(format!(
                        "prev_tx {} does not match outpoint {}",
                        prev.txid, previous_output
                    )));
                }
                let prevout = prev
                    .transaction
                    .output
                    .get(previous_output.vout as usize)
                    .ok_or_else(|| {
                        EngineError::InvalidInput(format!(
                            "prev_tx has no output {}",
                            previous_output.vout
                        ))
                    })?;
                if prevout.value.to_sat() != value || prevout.script_pubkey != output_script {
                    return Err(EngineError::InvalidInput(format!(
                        "prev_tx output {} does not match the input",
                        previous_output
                    )));
                }
                input.non_witness_utxo = Some(prev.transaction);
                original_bytes = prev.original_bytes;
            }
            None => {
                input.witness_utxo = Some(TxOut {
                    value: Amount::from_sat(value),
                    script_pubkey: output_script,
                });
            }
        }

        if let Some(fork_id_sighash) = network.fork_id().map(|_| default_sighash_type(network)) {
            if input.sighash_type.is_none() && input.tap_internal_key.is_none() {
                input.sighash_type = Some(PsbtSighashType::from_u32(fork_id_sighash));
            }
        }

        let psbt = self.psbt_mut();
        psbt.unsigned_tx.input.push(TxIn {
            previous_output,
            script_sig: ScriptBuf::new(),
            sequence: Sequence(sequence),
            witness: Witness::new(),
        });
        psbt.inputs.push(input);
        let index = psbt.inputs.len() - 1;

        if let BitGoPsbt::Dash(dash_psbt) = self {
            dash_psbt.push_input_slot(original_bytes);
        }
        Ok(index)
    }

    /// Adds an input spending wallet script `script_id`.
    ///
    /// Taproot inputs are prepared for the sign path in `options`. On chains
    /// 40 and 41 the user and bitgo pair spends through the MuSig2 key path.
    pub fn add_wallet_input(
        &mut self,
        previous_output: OutPoint,
        value: u64,
        wallet_keys: &RootWalletKeys,
        script_id: ScriptId,
        options: &WalletInputOptions,
    ) -> Result<usize, EngineError> {
        let network = self.network();
        let chain = Chain::try_from(script_id.chain).map_err(EngineError::InvalidInput)?;
        let derived = wallet_keys.derive_for_chain_and_index(script_id.chain, script_id.index)?;
        let pub_triple = to_pub_triple(&derived);
        let scripts = WalletScripts::new(&pub_triple, chain, &network.output_script_support())?;
        let output_script = scripts.output_script();

        let key_source = |signer: SignerKey| {
            let i = signer.index();
            (
                wallet_keys.xpubs[i].fingerprint(),
                derivation_path(
                    &wallet_keys.derivation_prefixes[i],
                    script_id.chain,
                    script_id.index,
                ),
            )
        };

        let mut input = Input::default();
        match &scripts {
            WalletScripts::P2sh(_) | WalletScripts::P2shP2wsh(_) | WalletScripts::P2wsh(_) => {
                for signer in SignerKey::ALL {
                    input
                        .bip32_derivation
                        .insert(pub_triple[signer.index()].0, key_source(signer));
                }
                match &scripts {
                    WalletScripts::P2sh(script) => {
                        input.redeem_script = Some(script.redeem_script.clone())
                    }
                    WalletScripts::P2shP2wsh(script) => {
                        input.redeem_script = Some(script.redeem_script.clone());
                        input.witness_script = Some(script.witness_script.clone());
                    }
                    WalletScripts::P2wsh(script) => {
                        input.witness_script = Some(script.witness_script.clone())
                    }
                    _ => {}
                }
            }
            WalletScripts::P2trLegacy(script) | WalletScripts::P2trMusig2(script) => {
                let is_musig2 = matches!(scripts, WalletScripts::P2trMusig2(_));
                let sign_path = options.sign_path.unwrap_or(SignPath::USER_BITGO);
                input.tap_internal_key = Some(script.spend_info.internal_key());
                input.tap_merkle_root = script.spend_info.merkle_root();

                if is_musig2 && sign_path == SignPath::USER_BITGO {
                    for signer in [SignerKey::User, SignerKey::Bitgo] {
                        input.tap_key_origins.insert(
                            to_xonly(&pub_triple[signer.index()]),
                            (vec![], key_source(signer)),
                        );
                    }
                    set_musig2_participants(
                        &mut input,
                        &Musig2Participants {
                            tap_output_key: script.spend_info.output_key().to_x_only_public_key(),
                            tap_internal_key: script.spend_info.internal_key(),
                            participant_pub_keys: [
                                pub_triple[SignerKey::User.index()],
                                pub_triple[SignerKey::Bitgo.index()],
                            ],
                        },
                    );
                } else {
                    let (leaf_script, control_block) = script
                        .leaf_for_signers(&pub_triple, [sign_path.signer, sign_path.cosigner])
                        .ok_or_else(|| {
                            EngineError::InvalidInput(format!(
                                "No tap leaf for sign path {:?}",
                                sign_path
                            ))
                        })?;
                    let leaf_hash = TapLeafHash::from_script(&leaf_script, LeafVersion::TapScript);
                    for signer in [sign_path.signer, sign_path.cosigner] {
                        input.tap_key_origins.insert(
                            to_xonly(&pub_triple[signer.index()]),
                            (vec![leaf_hash], key_source(signer)),
                        );
                    }
                    input
                        .tap_scripts
                        .insert(control_block, (leaf_script, LeafVersion::TapScript));
                }
            }
        }

        let index = self.push_input(
            previous_output,
            options.sequence.unwrap_or(DEFAULT_SEQUENCE),
            input,
            options.prev_tx,
            value,
            output_script,
        )?;
        debug!(
            input_index = index,
            chain = script_id.chain,
            index = script_id.index,
            script_type = %scripts,
            "added wallet input"
        );
        Ok(index)
    }

    /// Adds a P2SH-P2PK replay protection input owned by `public_key`.
    pub fn add_replay_protection_input(
        &mut self,
        previous_output: OutPoint,
        value: u64,
        public_key: CompressedPublicKey,
        options: &ReplayProtectionOptions,
    ) -> Result<usize, EngineError> {
        let network = self.network();
        let script = ScriptP2shP2pk::new(public_key);
        let sighash_type = options
            .sighash_type
            .unwrap_or_else(|| default_sighash_type(network));
        validate_sighash_type(sighash_type, network).map_err(EngineError::InvalidInput)?;

        let input = Input {
            redeem_script: Some(script.redeem_script.clone()),
            sighash_type: Some(PsbtSighashType::from_u32(sighash_type)),
            ..Default::default()
        };
        let index = self.push_input(
            previous_output,
            options.sequence.unwrap_or(DEFAULT_SEQUENCE),
            input,
            options.prev_tx,
            value,
            script.output_script(),
        )?;
        debug!(input_index = index, "added replay protection input");
        Ok(index)
    }

    fn push_output(&mut self, tx_output: TxOut, output: Output) -> Result<usize, EngineError> {
        self.ensure_not_finalized()?;
        let psbt = self.psbt_mut();
        psbt.unsigned_tx.output.push(tx_output);
        psbt.outputs.push(output);
        Ok(psbt.outputs.len() - 1)
    }

    /// Adds a wallet output, typically change, with its derivation info.
    pub fn add_wallet_output(
        &mut self,
        wallet_keys: &RootWalletKeys,
        script_id: ScriptId,
        value: u64,
    ) -> Result<usize, EngineError> {
        let network = self.network();
        let chain = Chain::try_from(script_id.chain).map_err(EngineError::InvalidInput)?;
        let derived = wallet_keys.derive_for_chain_and_index(script_id.chain, script_id.index)?;
        let pub_triple = to_pub_triple(&derived);
        let scripts = WalletScripts::new(&pub_triple, chain, &network.output_script_support())?;

        let mut output = Output::default();
        match &scripts {
            WalletScripts::P2trLegacy(script) | WalletScripts::P2trMusig2(script) => {
                let is_musig2 = matches!(scripts, WalletScripts::P2trMusig2(_));
                output.tap_internal_key = Some(script.spend_info.internal_key());
                output.tap_tree = Some(build_tap_tree_for_output(&pub_triple, is_musig2)?);
                output.tap_key_origins = create_tap_bip32_derivation_for_output(
                    wallet_keys,
                    script_id.chain,
                    script_id.index,
                    &pub_triple,
                    is_musig2,
                );
            }
            _ => {
                for signer in SignerKey::ALL {
                    let i = signer.index();
                    output.bip32_derivation.insert(
                        pub_triple[i].0,
                        (
                            wallet_keys.xpubs[i].fingerprint(),
                            derivation_path(
                                &wallet_keys.derivation_prefixes[i],
                                script_id.chain,
                                script_id.index,
                            ),
                        ),
                    );
                }
                match &scripts {
                    WalletScripts::P2sh(script) => {
                        output.redeem_script = Some(script.redeem_script.clone())
                    }
                    WalletScripts::P2shP2wsh(script) => {
                        output.redeem_script = Some(script.redeem_script.clone());
                        output.witness_script = Some(script.witness_script.clone());
                    }
                    WalletScripts::P2wsh(script) => {
                        output.witness_script = Some(script.witness_script.clone())
                    }
                    _ => {}
                }
            }
        }

        let tx_output = TxOut {
            value: Amount::from_sat(value),
            script_pubkey: scripts.output_script(),
        };
        let index = self.push_output(tx_output, output)?;
        debug!(
            output_index = index,
            chain = script_id.chain,
            index = script_id.index,
            "added wallet output"
        );
        Ok(index)
    }

    /// Adds an output paying `script` without derivation info.
    pub fn add_output(&mut self, script: ScriptBuf, value: u64) -> Result<usize, EngineError> {
        self.push_output(
            TxOut {
                value: Amount::from_sat(value),
                script_pubkey: script,
            },
            Output::default(),
        )
    }

    pub fn add_output_with_address(
        &mut self,
        address: &str,
        value: u64,
    ) -> Result<usize, EngineError> {
        let script = crate::address::to_output_script_with_network(address, self.network())?;
        self.add_output(script, value)
    }
}
