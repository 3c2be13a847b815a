//! Signing of BitGo PSBT inputs.
//!
//! ECDSA for the multisig and replay protection inputs, BIP340 Schnorr for
//! taproot script paths and MuSig2 partial signatures for the key path.
//! Every call writes into exactly one input.

use miniscript::bitcoin::bip32::Xpriv;
use miniscript::bitcoin::hashes::{sha256, Hash, HashEngine};
use miniscript::bitcoin::key::UntweakedPublicKey;
use miniscript::bitcoin::psbt::Input;
use miniscript::bitcoin::secp256k1::{self, Keypair, Message, SecretKey};
use miniscript::bitcoin::sighash::{Prevouts, SighashCache, TapSighashType};
use miniscript::bitcoin::{taproot, CompressedPublicKey, PrivateKey, TapLeafHash};
use musig2::secp::Scalar;
use musig2::{BinaryEncoding, FirstRound, PartialSignature, PubNonce, SecNonceSpices, SecondRound};
use tracing::{debug, trace};

use super::p2tr_musig2_input::{
    collect_prevouts, key_spend_sighash, set_musig2_nonce, set_musig2_partial_sig, Musig2Input,
    Musig2PartialSig, Musig2PubNonce,
};
use super::psbt_wallet_input::derivation_path_for_fingerprint;
use super::sighash::{input_sighash_type, legacy_message, to_ecdsa_signature};
use super::{BitGoPsbt, InputScriptType};
use crate::error::EngineError;
use crate::fixed_script_wallet::replay_protection_public_key;

/// One input checked for the second MuSig2 round.
pub(crate) struct Musig2SigningInput {
    input_index: usize,
    secret_key: Scalar,
    public_key: CompressedPublicKey,
    tap_output_key: UntweakedPublicKey,
    cosigner_index: usize,
    cosigner_nonce: PubNonce,
    message: [u8; 32],
}

/// Secret key of `xpriv` at the path the input stores for its fingerprint.
fn derive_secret_for_input<C: secp256k1::Signing>(
    secp: &secp256k1::Secp256k1<C>,
    xpriv: &Xpriv,
    input: &Input,
) -> Result<Option<SecretKey>, EngineError> {
    match derivation_path_for_fingerprint(input, xpriv.fingerprint(secp)) {
        Some(path) => Ok(Some(xpriv.derive_priv(secp, &path)?.private_key)),
        None => Ok(None),
    }
}

fn to_scalar(secret_key: &SecretKey) -> Result<Scalar, EngineError> {
    Scalar::try_from(&secret_key.secret_bytes()[..])
        .map_err(|e| EngineError::Musig2(format!("invalid secret key: {}", e)))
}

/// Nonce seed bound to the session and the input.
fn nonce_seed(session_id: &[u8; 32], input_index: usize) -> [u8; 32] {
    let mut engine = sha256::Hash::engine();
    engine.input(session_id);
    engine.input(&(input_index as u32).to_le_bytes());
    sha256::Hash::from_engine(engine).to_byte_array()
}

impl BitGoPsbt {
    fn sign_ecdsa<C: secp256k1::Signing>(
        &mut self,
        secp: &secp256k1::Secp256k1<C>,
        input_index: usize,
        secret_key: &SecretKey,
    ) -> Result<(), EngineError> {
        let network = self.network();
        let sighash_type = input_sighash_type(self.psbt(), input_index, network);
        let message = self
            .ecdsa_sighash()?
            .message(self.psbt(), input_index)
            .map_err(EngineError::Psbt)?;
        let signature = to_ecdsa_signature(secp.sign_ecdsa(&message, secret_key), sighash_type)
            .map_err(EngineError::Psbt)?;
        let public_key = miniscript::bitcoin::PublicKey::new(secret_key.public_key(secp));
        self.psbt_mut().inputs[input_index]
            .partial_sigs
            .insert(public_key, signature);
        Ok(())
    }

    /// Signs every tap leaf of the input that `secret_key` appears in.
    fn sign_taproot_script_path<C: secp256k1::Signing>(
        &mut self,
        secp: &secp256k1::Secp256k1<C>,
        input_index: usize,
        secret_key: &SecretKey,
    ) -> Result<bool, EngineError> {
        let keypair = Keypair::from_secret_key(secp, secret_key);
        let (x_only, _) = keypair.x_only_public_key();
        let psbt = self.psbt();
        let input = &psbt.inputs[input_index];

        let leaf_hashes: Vec<TapLeafHash> = match input.tap_key_origins.get(&x_only) {
            Some((leaf_hashes, _)) => leaf_hashes
                .iter()
                .filter(|leaf_hash| {
                    input.tap_scripts.values().any(|(script, version)| {
                        TapLeafHash::from_script(script, *version) == **leaf_hash
                    })
                })
                .copied()
                .collect(),
            None => return Ok(false),
        };
        if leaf_hashes.is_empty() {
            return Ok(false);
        }

        let prevouts = collect_prevouts(psbt)?;
        let mut cache = SighashCache::new(&psbt.unsigned_tx);
        let mut signatures = Vec::with_capacity(leaf_hashes.len());
        for leaf_hash in leaf_hashes {
            let sighash = cache
                .taproot_script_spend_signature_hash(
                    input_index,
                    &Prevouts::All(&prevouts),
                    leaf_hash,
                    TapSighashType::Default,
                )
                .map_err(|e| EngineError::Psbt(format!("taproot sighash: {}", e)))?;
            let message = Message::from_digest(sighash.to_byte_array());
            signatures.push((
                leaf_hash,
                taproot::Signature {
                    signature: secp.sign_schnorr_no_aux_rand(&message, &keypair),
                    sighash_type: TapSighashType::Default,
                },
            ));
        }

        let input = &mut self.psbt_mut().inputs[input_index];
        for (leaf_hash, signature) in signatures {
            input.tap_script_sigs.insert((x_only, leaf_hash), signature);
        }
        Ok(true)
    }

    /// Signs a wallet input with a root key of the wallet.
    ///
    /// `Ok(false)` if the input stores no derivation path for this key.
    /// MuSig2 key-path inputs go through [`BitGoPsbt::sign_musig2_input`]; here
    /// they fail with [`EngineError::NoncesNotCombined`] or
    /// [`EngineError::MissingSecretNonce`].
    pub fn sign_wallet_input<C: secp256k1::Signing>(
        &mut self,
        secp: &secp256k1::Secp256k1<C>,
        input_index: usize,
        xpriv: &Xpriv,
    ) -> Result<bool, EngineError> {
        self.check_input_index(input_index)?;
        self.ensure_not_finalized()?;
        let input = &self.psbt().inputs[input_index];
        let script_type = InputScriptType::from_input_metadata(input);
        let secret_key = match derive_secret_for_input(secp, xpriv, input)? {
            Some(secret_key) => secret_key,
            None => return Ok(false),
        };

        let signed = match script_type {
            Some(InputScriptType::P2trMusig2KeyPath) => {
                let musig2_input = Musig2Input::from_input(input)?;
                return Err(if musig2_input.aggregate_nonce().is_err() {
                    EngineError::NoncesNotCombined { input_index }
                } else {
                    EngineError::MissingSecretNonce { input_index }
                });
            }
            Some(InputScriptType::P2trLegacy) | Some(InputScriptType::P2trMusig2ScriptPath) => {
                self.sign_taproot_script_path(secp, input_index, &secret_key)?
            }
            Some(InputScriptType::P2sh)
            | Some(InputScriptType::P2shP2wsh)
            | Some(InputScriptType::P2wsh) => {
                self.sign_ecdsa(secp, input_index, &secret_key)?;
                true
            }
            Some(InputScriptType::P2shP2pk) | None => false,
        };
        if signed {
            trace!(input_index, script_type = ?script_type, "signed wallet input");
        }
        Ok(signed)
    }

    /// Signs a P2SH-P2PK replay protection input with its single key.
    ///
    /// `Ok(false)` if the input is not a P2PK input of this key.
    pub fn sign_replay_protection_input<C: secp256k1::Signing>(
        &mut self,
        secp: &secp256k1::Secp256k1<C>,
        input_index: usize,
        private_key: &PrivateKey,
    ) -> Result<bool, EngineError> {
        self.check_input_index(input_index)?;
        self.ensure_not_finalized()?;
        let network = self.network();
        let psbt = self.psbt();
        let redeem_script = match &psbt.inputs[input_index].redeem_script {
            Some(redeem_script) => redeem_script.clone(),
            None => return Ok(false),
        };
        let owner = match replay_protection_public_key(&redeem_script) {
            Ok(owner) => owner,
            Err(_) => return Ok(false),
        };
        let public_key = CompressedPublicKey(private_key.inner.public_key(secp));
        if owner != public_key {
            return Ok(false);
        }

        let sighash_type = input_sighash_type(psbt, input_index, network);
        let message = legacy_message(psbt, input_index, &redeem_script, sighash_type)
            .map_err(EngineError::Psbt)?;
        let signature =
            to_ecdsa_signature(secp.sign_ecdsa(&message, &private_key.inner), sighash_type)
                .map_err(EngineError::Psbt)?;
        self.psbt_mut().inputs[input_index]
            .partial_sigs
            .insert(miniscript::bitcoin::PublicKey::new(public_key.0), signature);
        trace!(input_index, "signed replay protection input");
        Ok(true)
    }

    /// Signs with a raw key: replay protection inputs it owns and ECDSA
    /// wallet inputs that list its public key.
    pub fn sign_input_with_private_key<C: secp256k1::Signing>(
        &mut self,
        secp: &secp256k1::Secp256k1<C>,
        input_index: usize,
        private_key: &PrivateKey,
    ) -> Result<bool, EngineError> {
        if self.sign_replay_protection_input(secp, input_index, private_key)? {
            return Ok(true);
        }
        let public_key = private_key.inner.public_key(secp);
        let input = &self.psbt().inputs[input_index];
        let listed = input.bip32_derivation.contains_key(&public_key)
            && matches!(
                InputScriptType::from_input_metadata(input),
                Some(InputScriptType::P2sh | InputScriptType::P2shP2wsh | InputScriptType::P2wsh)
            );
        if !listed {
            return Ok(false);
        }
        self.sign_ecdsa(secp, input_index, &private_key.inner)?;
        Ok(true)
    }

    /// Signs every input the key can sign. Returns the signed input indices.
    ///
    /// MuSig2 key-path inputs are skipped, they need a nonce round first.
    pub fn sign_all_with_xpriv<C: secp256k1::Signing>(
        &mut self,
        secp: &secp256k1::Secp256k1<C>,
        xpriv: &Xpriv,
    ) -> Result<Vec<usize>, EngineError> {
        let mut signed = vec![];
        for input_index in 0..self.input_count() {
            let input = &self.psbt().inputs[input_index];
            if InputScriptType::from_input_metadata(input)
                == Some(InputScriptType::P2trMusig2KeyPath)
            {
                continue;
            }
            if self.sign_wallet_input(secp, input_index, xpriv)? {
                signed.push(input_index);
            }
        }
        debug!(signed = signed.len(), "signed inputs with xpriv");
        Ok(signed)
    }

    /// First MuSig2 round with a caller-chosen session id: stores the public
    /// nonce of `xpriv` on the input and returns the round holding the secret
    /// half.
    ///
    /// Only test networks accept a chosen session id, mainnets fail with
    /// [`EngineError::SessionIdNotAllowed`]. `Ok(None)` if `xpriv` is not a
    /// participant of the input.
    pub fn generate_musig2_nonce<C: secp256k1::Signing>(
        &mut self,
        secp: &secp256k1::Secp256k1<C>,
        input_index: usize,
        xpriv: &Xpriv,
        session_id: &[u8; 32],
    ) -> Result<Option<FirstRound>, EngineError> {
        let network = self.network();
        if !network.is_testnet() {
            return Err(EngineError::SessionIdNotAllowed(network));
        }
        self.musig2_first_round(secp, input_index, xpriv, session_id)
    }

    /// First round without the session id policy. The caller owns the id.
    pub(crate) fn musig2_first_round<C: secp256k1::Signing>(
        &mut self,
        secp: &secp256k1::Secp256k1<C>,
        input_index: usize,
        xpriv: &Xpriv,
        session_id: &[u8; 32],
    ) -> Result<Option<FirstRound>, EngineError> {
        self.check_input_index(input_index)?;
        self.ensure_not_finalized()?;
        let psbt = self.psbt();
        let input = &psbt.inputs[input_index];
        if InputScriptType::from_input_metadata(input) != Some(InputScriptType::P2trMusig2KeyPath)
        {
            return Ok(None);
        }
        let musig2_input = Musig2Input::from_input(input)?;
        let secret_key = match derive_secret_for_input(secp, xpriv, input)? {
            Some(secret_key) => secret_key,
            None => return Ok(None),
        };
        let public_key = CompressedPublicKey(secret_key.public_key(secp));
        let signer_index = match musig2_input.participants.index_of(&public_key) {
            Ok(signer_index) => signer_index,
            Err(_) => return Ok(None),
        };

        let message = key_spend_sighash(psbt, input_index)?;
        let first_round = FirstRound::new(
            musig2_input.key_agg_context()?,
            nonce_seed(session_id, input_index),
            signer_index,
            SecNonceSpices::new()
                .with_seckey(to_scalar(&secret_key)?)
                .with_message(&message),
        )
        .map_err(|e| EngineError::Musig2(e.to_string()))?;
        let pub_nonce = Musig2PubNonce {
            participant_pub_key: public_key,
            tap_output_key: musig2_input.participants.tap_output_key,
            pub_nonce: first_round.our_public_nonce(),
        };
        set_musig2_nonce(&mut self.psbt_mut().inputs[input_index], &pub_nonce);
        trace!(input_index, "generated musig2 nonce");
        Ok(Some(first_round))
    }

    /// Everything the second round needs for one input. Fails without
    /// touching `first_round` so the caller can keep it.
    pub(crate) fn musig2_signing_input<C: secp256k1::Signing>(
        &self,
        secp: &secp256k1::Secp256k1<C>,
        input_index: usize,
        xpriv: &Xpriv,
        first_round: &FirstRound,
    ) -> Result<Musig2SigningInput, EngineError> {
        self.check_input_index(input_index)?;
        self.ensure_not_finalized()?;
        let psbt = self.psbt();
        let input = &psbt.inputs[input_index];
        let musig2_input = Musig2Input::from_input(input)?;
        let secret_key = derive_secret_for_input(secp, xpriv, input)?.ok_or_else(|| {
            EngineError::InvalidInput(format!(
                "Input {}: key is not a MuSig2 participant",
                input_index
            ))
        })?;
        let public_key = CompressedPublicKey(secret_key.public_key(secp));
        let signer_index = musig2_input.participants.index_of(&public_key)?;

        musig2_input
            .aggregate_nonce()
            .map_err(|_| EngineError::NoncesNotCombined { input_index })?;
        let stored_nonce = musig2_input
            .nonce_of(&public_key)
            .ok_or(EngineError::MissingSecretNonce { input_index })?;
        if stored_nonce.pub_nonce != first_round.our_public_nonce() {
            return Err(EngineError::MissingSecretNonce { input_index });
        }

        let cosigner_index = 1 - signer_index;
        let cosigner_key = musig2_input.participants.participant_pub_keys[cosigner_index];
        let cosigner_nonce = musig2_input
            .nonce_of(&cosigner_key)
            .ok_or(EngineError::NoncesNotCombined { input_index })?;

        Ok(Musig2SigningInput {
            input_index,
            secret_key: to_scalar(&secret_key)?,
            public_key,
            tap_output_key: musig2_input.participants.tap_output_key,
            cosigner_index,
            cosigner_nonce: cosigner_nonce.pub_nonce.clone(),
            message: key_spend_sighash(psbt, input_index)?,
        })
    }

    /// Second round: feeds the cosigner's nonce into `first_round` and writes
    /// the partial signature. `first_round` is consumed either way.
    pub(crate) fn complete_musig2_round(
        &mut self,
        signing_input: Musig2SigningInput,
        mut first_round: FirstRound,
    ) -> Result<(), EngineError> {
        let input_index = signing_input.input_index;
        first_round
            .receive_nonce(signing_input.cosigner_index, signing_input.cosigner_nonce)
            .map_err(|e| EngineError::Musig2(format!("Input {}: {}", input_index, e)))?;
        let second_round: SecondRound<[u8; 32]> = first_round
            .finalize(signing_input.secret_key, signing_input.message)
            .map_err(|e| EngineError::Musig2(format!("Input {}: {}", input_index, e)))?;
        let partial_sig: PartialSignature = second_round.our_signature();

        let partial_sig = Musig2PartialSig {
            participant_pub_key: signing_input.public_key,
            tap_output_key: signing_input.tap_output_key,
            partial_sig: partial_sig.serialize().to_vec(),
        };
        set_musig2_partial_sig(&mut self.psbt_mut().inputs[input_index], &partial_sig);
        trace!(input_index, "signed musig2 input");
        Ok(())
    }

    /// Second MuSig2 round: partial signature of `xpriv` with the round from
    /// [`BitGoPsbt::generate_musig2_nonce`].
    pub fn sign_musig2_input<C: secp256k1::Signing>(
        &mut self,
        secp: &secp256k1::Secp256k1<C>,
        input_index: usize,
        xpriv: &Xpriv,
        first_round: FirstRound,
    ) -> Result<(), EngineError> {
        let signing_input = self.musig2_signing_input(secp, input_index, xpriv, &first_round)?;
        self.complete_musig2_round(signing_input, first_round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed_script_wallet::bitgo_psbt::{
        PsbtOptions, ReplayProtectionOptions, ScriptId, WalletInputOptions,
    };
    use crate::fixed_script_wallet::wallet_keys::tests::{
        get_test_wallet_keys, get_test_wallet_xprvs,
    };
    use crate::keys::Key;
    use crate::Network;
    use miniscript::bitcoin::{OutPoint, Txid};
    use rstest::rstest;
    use std::str::FromStr;

    const SEED: &str = "signer";

    fn outpoint(n: u8) -> OutPoint {
        OutPoint::new(Txid::from_str(&hex::encode([n; 32])).unwrap(), 0)
    }

    fn psbt_with_input(network: Network, chain: u32) -> BitGoPsbt {
        let mut psbt = BitGoPsbt::new(network, &PsbtOptions::default()).unwrap();
        psbt.add_wallet_input(
            outpoint(1),
            100_000,
            &get_test_wallet_keys(SEED),
            ScriptId { chain, index: 7 },
            &WalletInputOptions::default(),
        )
        .unwrap();
        psbt
    }

    #[rstest]
    #[case(Network::Bitcoin, 0)]
    #[case(Network::Bitcoin, 10)]
    #[case(Network::Bitcoin, 20)]
    #[case(Network::Bitcoin, 30)]
    #[case(Network::BitcoinCash, 0)]
    #[case(Network::BitcoinGold, 10)]
    #[case(Network::Dogecoin, 0)]
    fn test_sign_then_verify(#[case] network: Network, #[case] chain: u32) {
        let secp = secp256k1::Secp256k1::new();
        let xprvs = get_test_wallet_xprvs(SEED);
        let mut psbt = psbt_with_input(network, chain);

        assert!(psbt.sign_wallet_input(&secp, 0, &xprvs[0]).unwrap());
        assert!(psbt
            .verify_signature(&secp, 0, &Key::ExtendedPrivate(xprvs[0]))
            .unwrap());
        assert!(!psbt
            .verify_signature(&secp, 0, &Key::ExtendedPrivate(xprvs[2]))
            .unwrap());
        // backup key has no path on a user+bitgo taproot input
        let backup_signed = psbt.sign_wallet_input(&secp, 0, &xprvs[1]).unwrap();
        assert_eq!(backup_signed, chain != 30);
    }

    #[test]
    fn test_foreign_key_does_not_sign() {
        let secp = secp256k1::Secp256k1::new();
        let foreign = get_test_wallet_xprvs("foreign");
        let mut psbt = psbt_with_input(Network::Bitcoin, 20);
        assert!(!psbt.sign_wallet_input(&secp, 0, &foreign[0]).unwrap());
        assert!(psbt.psbt().inputs[0].partial_sigs.is_empty());
    }

    #[test]
    fn test_signing_touches_one_input() {
        let secp = secp256k1::Secp256k1::new();
        let xprvs = get_test_wallet_xprvs(SEED);
        let mut psbt = psbt_with_input(Network::Bitcoin, 20);
        psbt.add_wallet_input(
            outpoint(2),
            5_000,
            &get_test_wallet_keys(SEED),
            ScriptId { chain: 21, index: 1 },
            &WalletInputOptions::default(),
        )
        .unwrap();
        let before = psbt.psbt().inputs[1].clone();
        psbt.sign_wallet_input(&secp, 0, &xprvs[0]).unwrap();
        assert_eq!(psbt.psbt().inputs[1], before);
    }

    #[test]
    fn test_musig2_key_path_needs_nonces() {
        let secp = secp256k1::Secp256k1::new();
        let xprvs = get_test_wallet_xprvs(SEED);
        let mut psbt = psbt_with_input(Network::BitcoinTestnet3, 40);
        assert!(matches!(
            psbt.sign_wallet_input(&secp, 0, &xprvs[0]),
            Err(EngineError::NoncesNotCombined { input_index: 0 })
        ));
        // backup is not a key-path participant
        assert!(psbt
            .generate_musig2_nonce(&secp, 0, &xprvs[1], &[1u8; 32])
            .unwrap()
            .is_none());
    }

    #[rstest]
    #[case(Network::Bitcoin)]
    #[case(Network::Litecoin)]
    fn test_chosen_session_id_rejected_on_mainnet(#[case] network: Network) {
        let secp = secp256k1::Secp256k1::new();
        let xprvs = get_test_wallet_xprvs(SEED);
        let chain = if network == Network::Bitcoin { 40 } else { 20 };
        let mut psbt = psbt_with_input(network, chain);
        let before = psbt.clone();
        assert!(matches!(
            psbt.generate_musig2_nonce(&secp, 0, &xprvs[0], &[1u8; 32]),
            Err(EngineError::SessionIdNotAllowed(n)) if n == network
        ));
        assert_eq!(psbt, before);
    }

    #[test]
    fn test_musig2_key_path_round_trip() {
        let secp = secp256k1::Secp256k1::new();
        let xprvs = get_test_wallet_xprvs(SEED);
        let mut psbt = psbt_with_input(Network::BitcoinTestnet3, 40);

        let user_round = psbt
            .generate_musig2_nonce(&secp, 0, &xprvs[0], &[1u8; 32])
            .unwrap()
            .unwrap();
        let user_round_again = psbt
            .clone()
            .generate_musig2_nonce(&secp, 0, &xprvs[0], &[1u8; 32])
            .unwrap()
            .unwrap();
        assert_eq!(
            user_round.our_public_nonce(),
            user_round_again.our_public_nonce()
        );

        assert!(matches!(
            psbt.sign_musig2_input(&secp, 0, &xprvs[0], user_round_again),
            Err(EngineError::NoncesNotCombined { input_index: 0 })
        ));

        let bitgo_round = psbt
            .generate_musig2_nonce(&secp, 0, &xprvs[2], &[2u8; 32])
            .unwrap()
            .unwrap();
        assert!(matches!(
            psbt.sign_wallet_input(&secp, 0, &xprvs[0]),
            Err(EngineError::MissingSecretNonce { input_index: 0 })
        ));

        // a round for another session does not match the stored nonce
        let other_round = psbt
            .clone()
            .generate_musig2_nonce(&secp, 0, &xprvs[0], &[3u8; 32])
            .unwrap()
            .unwrap();
        assert!(matches!(
            psbt.sign_musig2_input(&secp, 0, &xprvs[0], other_round),
            Err(EngineError::MissingSecretNonce { input_index: 0 })
        ));

        psbt.sign_musig2_input(&secp, 0, &xprvs[0], user_round).unwrap();
        assert!(psbt
            .verify_signature(&secp, 0, &Key::ExtendedPrivate(xprvs[0]))
            .unwrap());
        assert!(!psbt
            .verify_signature(&secp, 0, &Key::ExtendedPrivate(xprvs[2]))
            .unwrap());
        psbt.sign_musig2_input(&secp, 0, &xprvs[2], bitgo_round).unwrap();
        assert!(psbt
            .verify_signature(&secp, 0, &Key::ExtendedPrivate(xprvs[2]))
            .unwrap());
        psbt.finalize_mut(&secp).unwrap();
        assert_eq!(
            psbt.psbt().inputs[0].final_script_witness.as_ref().unwrap().len(),
            1
        );
    }

    #[test]
    fn test_replay_protection_signature() {
        let secp = secp256k1::Secp256k1::new();
        let private_key = PrivateKey::new(
            SecretKey::from_slice(&[7u8; 32]).unwrap(),
            miniscript::bitcoin::NetworkKind::Main,
        );
        let public_key = CompressedPublicKey(private_key.inner.public_key(&secp));
        let mut psbt = BitGoPsbt::new(Network::BitcoinCash, &PsbtOptions::default()).unwrap();
        psbt.add_replay_protection_input(
            outpoint(3),
            1_000,
            public_key,
            &ReplayProtectionOptions::default(),
        )
        .unwrap();

        let other = PrivateKey::new(
            SecretKey::from_slice(&[8u8; 32]).unwrap(),
            miniscript::bitcoin::NetworkKind::Main,
        );
        assert!(!psbt.sign_replay_protection_input(&secp, 0, &other).unwrap());
        assert!(psbt.sign_input_with_private_key(&secp, 0, &private_key).unwrap());

        let replay_protection =
            crate::fixed_script_wallet::ReplayProtection::from_public_keys(vec![public_key]);
        assert!(psbt
            .verify_replay_protection_signature(&secp, 0, &replay_protection)
            .unwrap());
        assert!(psbt
            .verify_signature(&secp, 0, &Key::RawPublic(public_key))
            .unwrap());
    }
}
