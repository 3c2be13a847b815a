use std::collections::BTreeMap;

use miniscript::bitcoin::taproot::{
    ControlBlock, LeafVersion, TapLeafHash, TapTree, TaprootBuilder, TaprootSpendInfo,
};

use super::bitgo_musig::{key_agg_bitgo_p2tr_legacy, key_agg_p2tr_musig2};
use crate::bitcoin::bip32::{DerivationPath, Fingerprint};
use crate::bitcoin::blockdata::opcodes::all::{OP_CHECKSIG, OP_CHECKSIGVERIFY};
use crate::bitcoin::blockdata::script::Builder;
use crate::bitcoin::secp256k1::Secp256k1;
use crate::bitcoin::{CompressedPublicKey, ScriptBuf, XOnlyPublicKey};
use crate::error::EngineError;
use crate::fixed_script_wallet::wallet_keys::{derivation_path, PubTriple, SignerKey};
use crate::fixed_script_wallet::RootWalletKeys;

pub fn to_xonly(key: &CompressedPublicKey) -> XOnlyPublicKey {
    key.0.x_only_public_key().0
}

/// `<k1> OP_CHECKSIGVERIFY ... <kn> OP_CHECKSIG` over x-only keys.
pub fn build_p2tr_ns_script(keys: &[CompressedPublicKey]) -> ScriptBuf {
    let mut builder = Builder::default();
    for (i, key) in keys.iter().enumerate() {
        builder = builder.push_slice(to_xonly(key).serialize());
        builder = if i + 1 == keys.len() {
            builder.push_opcode(OP_CHECKSIG)
        } else {
            builder.push_opcode(OP_CHECKSIGVERIFY)
        };
    }
    builder.into_script()
}

struct TapLeaf {
    depth: u8,
    signers: [SignerKey; 2],
}

/// Leaf layout of the wallet tap tree.
///
/// p2trMusig2 keeps user+bitgo on the key path, so the tree only holds the
/// two backup pairs. p2trLegacy puts user+bitgo at depth 1.
fn get_tap_leaves(is_musig2: bool) -> Vec<TapLeaf> {
    use SignerKey::{Backup, Bitgo, User};
    if is_musig2 {
        vec![
            TapLeaf {
                depth: 1,
                signers: [User, Backup],
            },
            TapLeaf {
                depth: 1,
                signers: [Backup, Bitgo],
            },
        ]
    } else {
        vec![
            TapLeaf {
                depth: 1,
                signers: [User, Bitgo],
            },
            TapLeaf {
                depth: 2,
                signers: [User, Backup],
            },
            TapLeaf {
                depth: 2,
                signers: [Backup, Bitgo],
            },
        ]
    }
}

fn leaf_script(keys: &PubTriple, signers: &[SignerKey; 2]) -> ScriptBuf {
    build_p2tr_ns_script(&[keys[signers[0].index()], keys[signers[1].index()]])
}

fn build_taproot_builder(keys: &PubTriple, is_musig2: bool) -> Result<TaprootBuilder, EngineError> {
    get_tap_leaves(is_musig2)
        .into_iter()
        .try_fold(TaprootBuilder::new(), |builder, leaf| {
            builder
                .add_leaf(leaf.depth, leaf_script(keys, &leaf.signers))
                .map_err(|e| EngineError::Script(format!("invalid tap leaf: {}", e)))
        })
}

fn internal_key(keys: &PubTriple, is_musig2: bool) -> Result<XOnlyPublicKey, EngineError> {
    let pair = [keys[SignerKey::User.index()], keys[SignerKey::Bitgo.index()]];
    let aggregate = if is_musig2 {
        key_agg_p2tr_musig2(&pair)
    } else {
        key_agg_bitgo_p2tr_legacy(&pair)
    }
    .map_err(|e| EngineError::Script(e.to_string()))?;
    XOnlyPublicKey::from_slice(&aggregate).map_err(|e| EngineError::Script(e.to_string()))
}

pub fn build_tap_tree_for_output(
    pub_triple: &PubTriple,
    is_musig2: bool,
) -> Result<TapTree, EngineError> {
    TapTree::try_from(build_taproot_builder(pub_triple, is_musig2)?)
        .map_err(|e| EngineError::Script(format!("incomplete tap tree: {}", e)))
}

pub type TapKeyOriginMap =
    BTreeMap<XOnlyPublicKey, (Vec<TapLeafHash>, (Fingerprint, DerivationPath))>;

/// Tap key origins for a wallet output: every key lists the leaves it appears in.
pub fn create_tap_bip32_derivation_for_output(
    wallet_keys: &RootWalletKeys,
    chain: u32,
    index: u32,
    pub_triple: &PubTriple,
    is_musig2: bool,
) -> TapKeyOriginMap {
    let leaves: Vec<([SignerKey; 2], TapLeafHash)> = get_tap_leaves(is_musig2)
        .into_iter()
        .map(|leaf| {
            let script = leaf_script(pub_triple, &leaf.signers);
            (
                leaf.signers,
                TapLeafHash::from_script(&script, LeafVersion::TapScript),
            )
        })
        .collect();

    SignerKey::ALL
        .iter()
        .map(|signer| {
            let i = signer.index();
            let path = derivation_path(&wallet_keys.derivation_prefixes[i], chain, index);
            let leaf_hashes = leaves
                .iter()
                .filter(|(signers, _)| signers.contains(signer))
                .map(|(_, hash)| *hash)
                .collect();
            (
                to_xonly(&pub_triple[i]),
                (leaf_hashes, (wallet_keys.xpubs[i].fingerprint(), path)),
            )
        })
        .collect()
}

/// Chains 30/31 and 40/41.
#[derive(Debug)]
pub struct ScriptP2tr {
    pub spend_info: TaprootSpendInfo,
}

impl ScriptP2tr {
    pub fn new(keys: &PubTriple, p2tr_musig2: bool) -> Result<ScriptP2tr, EngineError> {
        let secp = Secp256k1::verification_only();
        let spend_info = build_taproot_builder(keys, p2tr_musig2)?
            .finalize(&secp, internal_key(keys, p2tr_musig2)?)
            .map_err(|_| EngineError::Script("tap tree could not be finalized".to_string()))?;
        Ok(ScriptP2tr { spend_info })
    }

    pub fn output_script(&self) -> ScriptBuf {
        let output_key = self.spend_info.output_key().to_x_only_public_key();
        Builder::new()
            .push_int(1)
            .push_slice(output_key.serialize())
            .into_script()
    }

    /// Leaf script and control block for a script-path spend by `signers`.
    /// Signer order does not matter.
    pub fn leaf_for_signers(
        &self,
        keys: &PubTriple,
        signers: [SignerKey; 2],
    ) -> Option<(ScriptBuf, ControlBlock)> {
        [signers, [signers[1], signers[0]]]
            .iter()
            .map(|pair| leaf_script(keys, pair))
            .find_map(|script| {
                let control_block = self
                    .spend_info
                    .control_block(&(script.clone(), LeafVersion::TapScript))?;
                Some((script, control_block))
            })
    }
}
