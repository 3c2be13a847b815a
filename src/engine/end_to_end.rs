//! Full signing flow between the user and bitgo over three input types.

use miniscript::bitcoin::consensus::serialize;
use miniscript::bitcoin::{OutPoint, ScriptBuf, Transaction, Txid, Weight};
use std::str::FromStr;

use super::{Musig2Session, Musig2SessionState, PsbtState, WalletEngine, WalletPsbt};
use crate::dimensions::Dimensions;
use crate::fixed_script_wallet::bitgo_psbt::{
    InputScriptType, PsbtOptions, ScriptId, WalletInputOptions,
};
use crate::fixed_script_wallet::wallet_keys::tests::{get_test_wallet_keys, get_test_wallet_xprvs};
use crate::fixed_script_wallet::ReplayProtection;
use crate::keys::Key;
use crate::Network;

const SEED: &str = "end_to_end";
const NETWORK: Network = Network::BitcoinTestnet3;
const EXTERNAL_SCRIPT: &str = "0014000000000000000000000000000000000000000a";

/// Recorded from the signed fixture. ECDSA signatures are RFC6979 so the
/// scriptSig of the p2sh input, and with it the txid, is deterministic.
const EXPECTED_TXID: &str = "15e2c346038666f55cce0ceb3eb27fa85ce796fff1fd4c985eacea52d98d1d86";
const EXPECTED_UNSIGNED_TXID: &str =
    "2835bac10b558d3eb43fe1a0287b72176178d0d6a62287038de7dde703c762eb";
/// Full serialization including witnesses.
const EXPECTED_SIZE: usize = 782;

struct Signed {
    transaction: Transaction,
    txid: Txid,
    unsigned_txid: Txid,
    dimensions: Dimensions,
}

fn outpoint(vout: u32) -> OutPoint {
    OutPoint::from_str(&format!(
        "{}:{}",
        "0e3e2357e806b6cdb1f70b54c3a3a17b6714ee1f0e68bebb44a74b1efd512098", vout
    ))
    .unwrap()
}

fn build() -> WalletPsbt {
    let keys = get_test_wallet_keys(SEED);
    let mut psbt = WalletPsbt::new(NETWORK, &PsbtOptions::default())
        .unwrap()
        .with_index_window(5);
    for (vout, chain) in [(0, 0), (1, 20), (2, 40)] {
        psbt.add_wallet_input(
            outpoint(vout),
            100_000,
            &keys,
            ScriptId { chain, index: vout },
            &WalletInputOptions::default(),
        )
        .unwrap();
    }
    psbt.add_wallet_output(&keys, ScriptId { chain: 21, index: 1 }, 120_000)
        .unwrap();
    psbt.add_output(ScriptBuf::from_hex(EXTERNAL_SCRIPT).unwrap(), 170_000)
        .unwrap();
    psbt
}

fn sign_and_extract() -> Signed {
    let keys = get_test_wallet_keys(SEED);
    let [user, _, bitgo] = get_test_wallet_xprvs(SEED);

    let mut user_psbt = build();
    let mut bitgo_psbt =
        WalletPsbt::deserialize(&user_psbt.serialize().unwrap(), NETWORK).unwrap();
    assert_eq!(bitgo_psbt.state(), PsbtState::Building);

    let mut user_session = Musig2Session::new(NETWORK, user, Some(&[0x11; 32])).unwrap();
    let mut bitgo_session = Musig2Session::new(NETWORK, bitgo, Some(&[0x22; 32])).unwrap();
    assert_eq!(user_session.generate_nonces(&mut user_psbt).unwrap(), vec![2]);
    assert_eq!(bitgo_session.generate_nonces(&mut bitgo_psbt).unwrap(), vec![2]);
    user_psbt.combine_musig2_nonces(&bitgo_psbt).unwrap();
    bitgo_psbt.combine_musig2_nonces(&user_psbt).unwrap();

    assert_eq!(user_session.sign(&mut user_psbt).unwrap(), vec![2]);
    assert_eq!(user_psbt.sign(&Key::ExtendedPrivate(user)).unwrap(), vec![0, 1]);
    assert_eq!(user_psbt.state(), PsbtState::PartiallySigned);

    assert_eq!(bitgo_session.sign(&mut bitgo_psbt).unwrap(), vec![2]);
    assert_eq!(bitgo_psbt.sign(&Key::ExtendedPrivate(bitgo)).unwrap(), vec![0, 1]);
    assert_eq!(bitgo_session.state(), Musig2SessionState::Signed);

    user_psbt.combine(&bitgo_psbt).unwrap();
    assert_eq!(user_psbt.state(), PsbtState::FullySigned);

    let user_public = Key::ExtendedPrivate(user).to_public(user_psbt.secp());
    let bitgo_public = Key::ExtendedPrivate(bitgo).to_public(user_psbt.secp());
    for input_index in 0..3 {
        assert!(user_psbt.verify_signature(input_index, &user_public).unwrap());
        assert!(user_psbt.verify_signature(input_index, &bitgo_public).unwrap());
    }

    let parsed = user_psbt
        .parse_transaction_with_wallet_keys(&keys, &ReplayProtection::default(), &[])
        .unwrap();
    let script_types: Vec<_> = parsed.inputs.iter().map(|input| input.script_type).collect();
    assert_eq!(
        script_types,
        vec![
            InputScriptType::P2sh,
            InputScriptType::P2wsh,
            InputScriptType::P2trMusig2KeyPath
        ]
    );
    assert_eq!(parsed.outputs[0].script_id, Some(ScriptId { chain: 21, index: 1 }));
    assert_eq!(parsed.outputs[1].script_id, None);
    assert_eq!(parsed.spend_amount, 170_000);
    assert_eq!(parsed.miner_fee, 10_000);

    let dimensions = Dimensions::from_parsed_inputs(&parsed.inputs).plus(
        &Dimensions::from_output_scripts(parsed.outputs.iter().map(|output| output.script.len())),
    );
    assert_eq!(parsed.virtual_size, dimensions.vsize_max());

    let unsigned_txid = user_psbt.unsigned_txid().unwrap();
    user_psbt.finalize_all_inputs().unwrap();
    assert_eq!(user_psbt.state(), PsbtState::Finalized);
    let extracted = user_psbt.extract_transaction().unwrap();

    Signed {
        transaction: extracted.transaction().clone(),
        txid: extracted.txid().unwrap(),
        unsigned_txid,
        dimensions,
    }
}

#[test]
fn test_sign_finalize_extract() {
    let signed = sign_and_extract();
    let transaction = &signed.transaction;
    assert_eq!(transaction.input.len(), 3);
    assert_eq!(transaction.output.len(), 2);
    assert!(!transaction.input[0].script_sig.is_empty());
    assert!(transaction.input[1].script_sig.is_empty());
    assert_eq!(transaction.input[1].witness.len(), 4);
    assert_eq!(transaction.input[2].witness.len(), 1);

    let mut stripped = transaction.clone();
    for input in stripped.input.iter_mut() {
        input.script_sig = ScriptBuf::new();
    }
    assert_eq!(stripped.compute_txid(), signed.unsigned_txid);
}

#[test]
fn test_matches_recorded_fixture() {
    let signed = sign_and_extract();
    assert_eq!(signed.unsigned_txid.to_string(), EXPECTED_UNSIGNED_TXID);
    assert_eq!(signed.txid.to_string(), EXPECTED_TXID);
    assert_eq!(signed.transaction.compute_txid().to_string(), EXPECTED_TXID);
    assert_eq!(serialize(&signed.transaction).len(), EXPECTED_SIZE);
    assert_eq!(signed.transaction.total_size(), EXPECTED_SIZE);
}

#[test]
fn test_txid_is_stable() {
    let first = sign_and_extract();
    let second = sign_and_extract();
    assert_eq!(first.txid, second.txid);
    assert_eq!(first.transaction, second.transaction);
}

#[test]
fn test_weight_within_dimensions() {
    let signed = sign_and_extract();
    let weight = signed.transaction.weight();
    assert!(weight >= signed.dimensions.weight_min(), "{} < min", weight);
    assert!(weight <= signed.dimensions.weight_max(), "{} > max", weight);

    let expected = [
        InputScriptType::P2sh,
        InputScriptType::P2wsh,
        InputScriptType::P2trMusig2KeyPath,
    ]
    .into_iter()
    .map(Dimensions::from_input_script_type)
    .fold(Dimensions::empty(), |acc, dimensions| acc.plus(&dimensions))
    .plus(&Dimensions::from_output_scripts(
        signed.transaction.output.iter().map(|output| output.script_pubkey.len()),
    ));
    assert_eq!(expected, signed.dimensions);
    assert!(expected.weight_max() - expected.weight_min() < Weight::from_wu(100));
}
