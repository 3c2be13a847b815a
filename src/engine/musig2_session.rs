//! One signer's side of the two-round MuSig2 protocol on a PSBT.

use std::collections::BTreeMap;
use std::fmt;

use miniscript::bitcoin::bip32::Xpriv;
use musig2::FirstRound;
use tracing::debug;

use super::{WalletEngine, WalletPsbt};
use crate::error::EngineError;
use crate::fixed_script_wallet::bitgo_psbt::Musig2Input;
use crate::Network;

pub const SESSION_ID_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Musig2SessionState {
    /// Own nonces written, counterparty nonces not seen yet.
    NoncesPending,
    NoncesCombined,
    /// Rounds consumed. Terminal.
    Signed,
}

/// Holds the first rounds of one signer between the two rounds.
///
/// A [`FirstRound`] keeps its secret nonce to itself and is consumed by
/// signing, so a nonce is used at most once. Not `Clone` for the same reason.
pub struct Musig2Session {
    network: Network,
    xpriv: Xpriv,
    session_id: [u8; SESSION_ID_LENGTH],
    first_rounds: BTreeMap<usize, FirstRound>,
    signed_inputs: Vec<usize>,
    state: Musig2SessionState,
}

impl fmt::Debug for Musig2Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Musig2Session")
            .field("network", &self.network)
            .field("state", &self.state)
            .field("inputs", &self.first_rounds.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Musig2Session {
    /// A caller-chosen `session_id` must be 32 bytes and is only accepted on
    /// test networks. Without one a random id is drawn.
    pub fn new(network: Network, xpriv: Xpriv, session_id: Option<&[u8]>) -> Result<Self, EngineError> {
        let session_id = match session_id {
            Some(id) => {
                let id: [u8; SESSION_ID_LENGTH] = id
                    .try_into()
                    .map_err(|_| EngineError::InvalidSessionIdLength(id.len()))?;
                if network.is_mainnet() {
                    return Err(EngineError::SessionIdNotAllowed(network));
                }
                id
            }
            None => {
                let mut id = [0u8; SESSION_ID_LENGTH];
                getrandom::getrandom(&mut id)
                    .map_err(|e| EngineError::Musig2(format!("cannot draw session id: {}", e)))?;
                id
            }
        };
        Ok(Musig2Session {
            network,
            xpriv,
            session_id,
            first_rounds: BTreeMap::new(),
            signed_inputs: vec![],
            state: Musig2SessionState::NoncesPending,
        })
    }

    pub fn state(&self) -> Musig2SessionState {
        self.state
    }

    pub fn session_id(&self) -> &[u8; SESSION_ID_LENGTH] {
        &self.session_id
    }

    fn check_network(&self, psbt: &WalletPsbt) -> Result<(), EngineError> {
        if psbt.network() != self.network {
            return Err(EngineError::InvalidInput(format!(
                "session is for {}, psbt is for {}",
                self.network,
                psbt.network()
            )));
        }
        Ok(())
    }

    /// First round. Writes a public nonce to every MuSig2 key path input the
    /// signer takes part in and returns their indices. Nothing is written if
    /// any input fails.
    pub fn generate_nonces(&mut self, psbt: &mut WalletPsbt) -> Result<Vec<usize>, EngineError> {
        self.check_network(psbt)?;
        if self.state != Musig2SessionState::NoncesPending || !self.first_rounds.is_empty() {
            return Err(EngineError::InvalidState {
                operation: "generate nonces",
                state: format!("{:?}", self.state),
            });
        }
        let secp = psbt.secp().clone();
        let mut updated = psbt.bitgo_psbt().clone();
        let mut first_rounds = BTreeMap::new();
        for input_index in 0..updated.input_count() {
            let first_round =
                updated.musig2_first_round(&secp, input_index, &self.xpriv, &self.session_id)?;
            if let Some(first_round) = first_round {
                first_rounds.insert(input_index, first_round);
            }
        }
        *psbt.bitgo_psbt_mut() = updated;
        let inputs: Vec<usize> = first_rounds.keys().copied().collect();
        self.first_rounds = first_rounds;
        debug!(inputs = inputs.len(), network = %self.network, "generated musig2 nonces");
        self.observe(psbt)?;
        Ok(inputs)
    }

    /// Moves to `NoncesCombined` once every input of this session carries
    /// the nonces of both participants.
    pub fn observe(&mut self, psbt: &WalletPsbt) -> Result<Musig2SessionState, EngineError> {
        if self.state == Musig2SessionState::NoncesPending && !self.first_rounds.is_empty() {
            let inputs = &psbt.bitgo_psbt().psbt().inputs;
            let combined = self.first_rounds.keys().all(|&input_index| {
                inputs
                    .get(input_index)
                    .and_then(|input| Musig2Input::from_input(input).ok())
                    .map(|musig2_input| musig2_input.aggregate_nonce().is_ok())
                    .unwrap_or(false)
            });
            if combined {
                self.state = Musig2SessionState::NoncesCombined;
                debug!(network = %self.network, "musig2 nonces combined");
            }
        }
        Ok(self.state)
    }

    fn first_uncombined_input(&self, psbt: &WalletPsbt) -> usize {
        let inputs = &psbt.bitgo_psbt().psbt().inputs;
        self.first_rounds
            .keys()
            .copied()
            .find(|&input_index| {
                inputs
                    .get(input_index)
                    .and_then(|input| Musig2Input::from_input(input).ok())
                    .map(|musig2_input| musig2_input.aggregate_nonce().is_err())
                    .unwrap_or(true)
            })
            .unwrap_or(0)
    }

    /// Second round. Consumes the first rounds and writes a partial
    /// signature to each input of the session.
    ///
    /// Every input is checked before a round is consumed. On error the PSBT
    /// and the session are left as they were.
    pub fn sign(&mut self, psbt: &mut WalletPsbt) -> Result<Vec<usize>, EngineError> {
        self.check_network(psbt)?;
        match self.observe(psbt)? {
            Musig2SessionState::Signed => {
                return Err(EngineError::MissingSecretNonce {
                    input_index: self.signed_inputs.first().copied().unwrap_or(0),
                })
            }
            Musig2SessionState::NoncesPending if self.first_rounds.is_empty() => {
                return Err(EngineError::MissingSecretNonce { input_index: 0 })
            }
            Musig2SessionState::NoncesPending => {
                return Err(EngineError::NoncesNotCombined {
                    input_index: self.first_uncombined_input(psbt),
                })
            }
            Musig2SessionState::NoncesCombined => {}
        }

        let secp = psbt.secp().clone();
        let signing_inputs = self
            .first_rounds
            .iter()
            .map(|(&input_index, first_round)| {
                psbt.bitgo_psbt()
                    .musig2_signing_input(&secp, input_index, &self.xpriv, first_round)
            })
            .collect::<Result<Vec<_>, _>>()?;

        // from here on the rounds are gone whatever happens
        let first_rounds = std::mem::take(&mut self.first_rounds);
        self.state = Musig2SessionState::Signed;
        let signed = psbt.transition("musig2 sign", |bitgo_psbt| {
            let mut updated = bitgo_psbt.clone();
            let mut signed = vec![];
            for (signing_input, (input_index, first_round)) in
                signing_inputs.into_iter().zip(first_rounds)
            {
                updated.complete_musig2_round(signing_input, first_round)?;
                signed.push(input_index);
            }
            *bitgo_psbt = updated;
            Ok(signed)
        })?;
        debug!(inputs = signed.len(), network = %self.network, "signed musig2 inputs");
        self.signed_inputs = signed.clone();
        Ok(signed)
    }
}
