//! Finalization of BitGo PSBT inputs.
//!
//! Inputs are finalized on a copy of the PSBT, which replaces the original
//! only when every input succeeded. MuSig2 key path inputs get the aggregate
//! signature, everything else goes through miniscript. FORKID and Zcash
//! signatures cannot be checked by the miniscript interpreter, so on those
//! networks the final scripts of the multisig and P2PK inputs are assembled
//! here.

use miniscript::bitcoin::blockdata::opcodes::all::OP_PUSHBYTES_0;
use miniscript::bitcoin::blockdata::script::{Builder, Instruction, PushBytesBuf};
use miniscript::bitcoin::ecdsa;
use miniscript::bitcoin::psbt::{Input, Psbt};
use miniscript::bitcoin::secp256k1;
use miniscript::bitcoin::{PublicKey, Script, ScriptBuf, Witness};
use miniscript::psbt::PsbtExt;
use tracing::{debug, trace};

use super::p2tr_musig2_input::{key_spend_sighash, Musig2Input};
use super::propkv::is_musig2_key;
use super::sighash::EcdsaSighash;
use super::{BitGoPsbt, InputScriptType};
use crate::error::EngineError;
use crate::fixed_script_wallet::{parse_multisig_script_2_of_3, parse_p2pk_script};

#[derive(Debug, Default)]
struct FinalScripts {
    script_sig: Option<ScriptBuf>,
    witness: Option<Witness>,
}

fn push_bytes(bytes: &[u8]) -> Result<PushBytesBuf, String> {
    PushBytesBuf::try_from(bytes.to_vec()).map_err(|e| format!("push too large: {}", e))
}

/// Pushes of a script, in order.
fn pushes(script: &Script) -> Result<Vec<Vec<u8>>, String> {
    script
        .instructions()
        .map(|instruction| match instruction {
            Ok(Instruction::PushBytes(bytes)) => Ok(bytes.as_bytes().to_vec()),
            Ok(Instruction::Op(op)) => Err(format!("unexpected opcode {}", op)),
            Err(e) => Err(format!("invalid script: {}", e)),
        })
        .collect()
}

/// Last push of a scriptSig, the redeem script of a P2SH spend.
pub(crate) fn last_push(script_sig: &Script) -> Result<ScriptBuf, EngineError> {
    pushes(script_sig)
        .map_err(EngineError::Psbt)?
        .pop()
        .map(ScriptBuf::from_bytes)
        .ok_or_else(|| EngineError::Psbt("empty scriptSig".to_string()))
}

/// First push of a P2SH-P2PK scriptSig.
pub(crate) fn first_signature(script_sig: &Script) -> Result<ecdsa::Signature, EngineError> {
    let first = pushes(script_sig)
        .map_err(EngineError::Psbt)?
        .into_iter()
        .next()
        .ok_or_else(|| EngineError::Psbt("empty scriptSig".to_string()))?;
    ecdsa::Signature::from_slice(&first)
        .map_err(|e| EngineError::Psbt(format!("invalid signature in scriptSig: {}", e)))
}

/// Two signatures in the key order of the multisig script.
fn multisig_signatures(input: &Input, multisig: &Script) -> Result<Vec<Vec<u8>>, String> {
    let keys = parse_multisig_script_2_of_3(multisig)?;
    let signatures: Vec<Vec<u8>> = keys
        .iter()
        .filter_map(|key| input.partial_sigs.get(&PublicKey::new(key.0)))
        .map(|signature| signature.to_vec())
        .take(2)
        .collect();
    if signatures.len() < 2 {
        return Err(format!(
            "need 2 signatures, have {}",
            signatures.len()
        ));
    }
    Ok(signatures)
}

/// Final scripts of an ECDSA input whose sighash miniscript cannot verify.
fn assemble_ecdsa_final_scripts(input: &Input) -> Result<FinalScripts, String> {
    let script_type = InputScriptType::from_input_metadata(input)
        .ok_or_else(|| "unknown input type".to_string())?;

    match script_type {
        InputScriptType::P2sh => {
            let redeem_script = input.redeem_script.as_ref().ok_or("missing redeem script")?;
            let mut builder = Builder::new().push_opcode(OP_PUSHBYTES_0);
            for signature in multisig_signatures(input, redeem_script)? {
                builder = builder.push_slice(push_bytes(&signature)?);
            }
            Ok(FinalScripts {
                script_sig: Some(
                    builder
                        .push_slice(push_bytes(redeem_script.as_bytes())?)
                        .into_script(),
                ),
                witness: None,
            })
        }
        InputScriptType::P2shP2wsh | InputScriptType::P2wsh => {
            let witness_script = input
                .witness_script
                .as_ref()
                .ok_or("missing witness script")?;
            let mut items = vec![vec![]];
            items.extend(multisig_signatures(input, witness_script)?);
            items.push(witness_script.to_bytes());
            let script_sig = match (&input.redeem_script, script_type) {
                (Some(redeem_script), InputScriptType::P2shP2wsh) => Some(
                    Builder::new()
                        .push_slice(push_bytes(redeem_script.as_bytes())?)
                        .into_script(),
                ),
                _ => None,
            };
            Ok(FinalScripts {
                script_sig,
                witness: Some(Witness::from_slice(&items)),
            })
        }
        InputScriptType::P2shP2pk => {
            let redeem_script = input.redeem_script.as_ref().ok_or("missing redeem script")?;
            let key = parse_p2pk_script(redeem_script).ok_or("redeem script is not P2PK")?;
            let signature = input
                .partial_sigs
                .get(&PublicKey::new(key.0))
                .ok_or("missing signature")?;
            Ok(FinalScripts {
                script_sig: Some(
                    Builder::new()
                        .push_slice(push_bytes(&signature.to_vec())?)
                        .push_slice(push_bytes(redeem_script.as_bytes())?)
                        .into_script(),
                ),
                witness: None,
            })
        }
        other => Err(format!("{} inputs are not supported on this network", other)),
    }
}

fn musig2_key_path_final_scripts(psbt: &Psbt, input_index: usize) -> Result<FinalScripts, String> {
    let musig2_input =
        Musig2Input::from_input(&psbt.inputs[input_index]).map_err(|e| e.to_string())?;
    let message = key_spend_sighash(psbt, input_index).map_err(|e| e.to_string())?;
    let signature = musig2_input
        .aggregate_signature(message)
        .map_err(|e| e.to_string())?;
    Ok(FinalScripts {
        script_sig: None,
        witness: Some(Witness::from_slice(&[signature.to_vec()])),
    })
}

/// Writes the final scripts and drops everything a finalized input no
/// longer needs. UTXO data stays.
fn apply(input: &mut Input, scripts: FinalScripts) {
    input.final_script_sig = scripts.script_sig;
    input.final_script_witness = scripts.witness;
    input.partial_sigs.clear();
    input.sighash_type = None;
    input.redeem_script = None;
    input.witness_script = None;
    input.bip32_derivation.clear();
    input.tap_key_sig = None;
    input.tap_script_sigs.clear();
    input.tap_scripts.clear();
    input.tap_key_origins.clear();
    input.tap_internal_key = None;
    input.tap_merkle_root = None;
    input.proprietary.retain(|key, _| !is_musig2_key(key));
}

/// Finalizes input `input_index` of `psbt` in place.
fn finalize_input<C: secp256k1::Verification>(
    psbt: &mut Psbt,
    secp: &secp256k1::Secp256k1<C>,
    input_index: usize,
    sighash: &EcdsaSighash,
) -> Result<(), String> {
    let script_type = InputScriptType::from_input_metadata(&psbt.inputs[input_index]);
    if script_type == Some(InputScriptType::P2trMusig2KeyPath) {
        let scripts = musig2_key_path_final_scripts(psbt, input_index)?;
        apply(&mut psbt.inputs[input_index], scripts);
        return Ok(());
    }
    match sighash {
        EcdsaSighash::Standard => psbt
            .finalize_inp_mut(secp, input_index)
            .map_err(|e| e.to_string())?,
        EcdsaSighash::ForkId(_) | EcdsaSighash::Zcash { .. } => {
            let scripts = assemble_ecdsa_final_scripts(&psbt.inputs[input_index])?;
            apply(&mut psbt.inputs[input_index], scripts);
        }
    }
    trace!(input_index, script_type = ?script_type, "finalized input");
    Ok(())
}

impl BitGoPsbt {
    /// Finalizes every input, or none.
    ///
    /// Fails with [`EngineError::FinalizeFailed`] listing each input that
    /// lacks signatures or data.
    pub fn finalize_mut<C: secp256k1::Verification>(
        &mut self,
        secp: &secp256k1::Secp256k1<C>,
    ) -> Result<(), EngineError> {
        self.ensure_not_finalized()?;
        if self.input_count() == 0 {
            return Err(EngineError::FinalizeFailed(vec![
                "PSBT has no inputs".to_string(),
            ]));
        }
        let sighash = self.ecdsa_sighash()?;

        let mut finalized = self.psbt().clone();
        let errors: Vec<String> = (0..finalized.inputs.len())
            .filter_map(|input_index| {
                finalize_input(&mut finalized, secp, input_index, &sighash)
                    .err()
                    .map(|e| format!("Input {}: {}", input_index, e))
            })
            .collect();
        if !errors.is_empty() {
            return Err(EngineError::FinalizeFailed(errors));
        }

        *self.psbt_mut() = finalized;
        debug!(inputs = self.input_count(), "finalized psbt");
        Ok(())
    }

    /// Whether input `input_index` has everything it needs to be finalized.
    pub fn can_finalize_input<C: secp256k1::Verification>(
        &self,
        secp: &secp256k1::Secp256k1<C>,
        input_index: usize,
    ) -> Result<bool, EngineError> {
        self.check_input_index(input_index)?;
        let input = &self.psbt().inputs[input_index];
        if input.final_script_sig.is_some() || input.final_script_witness.is_some() {
            return Ok(true);
        }
        let sighash = self.ecdsa_sighash()?;
        let mut psbt = self.psbt().clone();
        Ok(finalize_input(&mut psbt, secp, input_index, &sighash).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_script_wallet::bitgo_psbt::{PsbtOptions, ScriptId, WalletInputOptions};
    use crate::fixed_script_wallet::wallet_keys::tests::{
        get_test_wallet_keys, get_test_wallet_xprvs,
    };
    use crate::fixed_script_wallet::SignPath;
    use crate::fixed_script_wallet::SignerKey;
    use crate::Network;
    use miniscript::bitcoin::secp256k1::Secp256k1;
    use miniscript::bitcoin::{OutPoint, Txid};
    use rstest::rstest;
    use std::str::FromStr;

    const SEED: &str = "finalize";

    fn add_input(psbt: &mut BitGoPsbt, n: u8, chain: u32, sign_path: Option<SignPath>) {
        psbt.add_wallet_input(
            OutPoint::new(Txid::from_str(&hex::encode([n; 32])).unwrap(), 0),
            10_000,
            &get_test_wallet_keys(SEED),
            ScriptId { chain, index: 2 },
            &WalletInputOptions {
                sign_path,
                ..Default::default()
            },
        )
        .unwrap();
    }

    #[rstest]
    #[case(0, None, true, false)]
    #[case(10, None, true, true)]
    #[case(20, None, false, true)]
    #[case(30, None, false, true)]
    #[case(
        40,
        Some(SignPath { signer: SignerKey::User, cosigner: SignerKey::Backup }),
        false,
        true
    )]
    fn test_finalize_two_of_three(
        #[case] chain: u32,
        #[case] sign_path: Option<SignPath>,
        #[case] has_script_sig: bool,
        #[case] has_witness: bool,
    ) {
        let secp = Secp256k1::new();
        let xprvs = get_test_wallet_xprvs(SEED);
        let mut psbt = BitGoPsbt::new(Network::Bitcoin, &PsbtOptions::default()).unwrap();
        add_input(&mut psbt, 1, chain, sign_path);

        let signers = match sign_path {
            Some(path) => [path.signer.index(), path.cosigner.index()],
            None => [0, 2],
        };
        psbt.sign_wallet_input(&secp, 0, &xprvs[signers[0]]).unwrap();
        assert!(!psbt.can_finalize_input(&secp, 0).unwrap());
        psbt.sign_wallet_input(&secp, 0, &xprvs[signers[1]]).unwrap();
        assert!(psbt.can_finalize_input(&secp, 0).unwrap());

        psbt.finalize_mut(&secp).unwrap();
        let input = &psbt.psbt().inputs[0];
        assert_eq!(input.final_script_sig.is_some(), has_script_sig);
        assert_eq!(input.final_script_witness.is_some(), has_witness);
        assert!(input.partial_sigs.is_empty() && input.tap_script_sigs.is_empty());
        assert!(psbt.is_finalized());
        assert!(matches!(psbt.finalize_mut(&secp), Err(EngineError::AlreadyFinalized)));
    }

    #[test]
    fn test_finalize_is_atomic() {
        let secp = Secp256k1::new();
        let xprvs = get_test_wallet_xprvs(SEED);
        let mut psbt = BitGoPsbt::new(Network::Bitcoin, &PsbtOptions::default()).unwrap();
        add_input(&mut psbt, 1, 20, None);
        add_input(&mut psbt, 2, 20, None);
        psbt.sign_wallet_input(&secp, 0, &xprvs[0]).unwrap();
        psbt.sign_wallet_input(&secp, 0, &xprvs[2]).unwrap();
        psbt.sign_wallet_input(&secp, 1, &xprvs[0]).unwrap();

        let before = psbt.clone();
        match psbt.finalize_mut(&secp) {
            Err(EngineError::FinalizeFailed(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].starts_with("Input 1"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(psbt, before);
    }

    #[test]
    fn test_p2sh_script_sig_layout() {
        let secp = Secp256k1::new();
        let xprvs = get_test_wallet_xprvs(SEED);
        let mut psbt = BitGoPsbt::new(Network::Bitcoin, &PsbtOptions::default()).unwrap();
        add_input(&mut psbt, 1, 0, None);
        let redeem_script = psbt.psbt().inputs[0].redeem_script.clone().unwrap();
        psbt.sign_wallet_input(&secp, 0, &xprvs[2]).unwrap();
        psbt.sign_wallet_input(&secp, 0, &xprvs[1]).unwrap();
        psbt.finalize_mut(&secp).unwrap();

        let script_sig = psbt.psbt().inputs[0].final_script_sig.clone().unwrap();
        let items: Vec<_> = script_sig.instructions().map(|i| i.unwrap()).collect();
        assert_eq!(items.len(), 4);
        assert!(matches!(items[0], Instruction::PushBytes(bytes) if bytes.is_empty()));
        assert_eq!(last_push(&script_sig).unwrap(), redeem_script);
    }

    #[test]
    fn test_p2wsh_witness_in_key_order() {
        let secp = Secp256k1::new();
        let xprvs = get_test_wallet_xprvs(SEED);
        let mut psbt = BitGoPsbt::new(Network::Bitcoin, &PsbtOptions::default()).unwrap();
        add_input(&mut psbt, 1, 20, None);
        let witness_script = psbt.psbt().inputs[0].witness_script.clone().unwrap();
        psbt.sign_wallet_input(&secp, 0, &xprvs[2]).unwrap();
        psbt.sign_wallet_input(&secp, 0, &xprvs[0]).unwrap();
        let keys = parse_multisig_script_2_of_3(&witness_script).unwrap();
        let signatures = psbt.psbt().inputs[0].partial_sigs.clone();
        psbt.finalize_mut(&secp).unwrap();

        let witness = psbt.psbt().inputs[0].final_script_witness.clone().unwrap();
        let items: Vec<&[u8]> = witness.iter().collect();
        assert_eq!(items.len(), 4);
        assert!(items[0].is_empty());
        assert_eq!(items[1], signatures[&PublicKey::new(keys[0].0)].to_vec());
        assert_eq!(items[2], signatures[&PublicKey::new(keys[2].0)].to_vec());
        assert_eq!(items[3], witness_script.as_bytes());
    }

    #[rstest]
    #[case(Network::BitcoinCash)]
    #[case(Network::BitcoinGold)]
    #[case(Network::Ecash)]
    fn test_finalize_forkid_p2sh(#[case] network: Network) {
        let secp = Secp256k1::new();
        let xprvs = get_test_wallet_xprvs(SEED);
        let mut psbt = BitGoPsbt::new(network, &PsbtOptions::default()).unwrap();
        add_input(&mut psbt, 1, 0, None);
        psbt.sign_wallet_input(&secp, 0, &xprvs[0]).unwrap();
        psbt.sign_wallet_input(&secp, 0, &xprvs[1]).unwrap();
        assert!(psbt.can_finalize_input(&secp, 0).unwrap());
        psbt.finalize_mut(&secp).unwrap();

        let script_sig = psbt.psbt().inputs[0].final_script_sig.clone().unwrap();
        assert_eq!(script_sig.instructions().count(), 4);
        assert!(psbt.psbt().inputs[0].final_script_witness.is_none());
    }
}
