use core::fmt;

use crate::address::AddressError;
use crate::fixed_script_wallet::bitgo_psbt::{DeserializeError, Musig2Error, SerializeError};
use crate::networks::Network;

/// Errors returned by the wallet engine.
///
/// Precondition failures get their own variants so callers can tell a
/// retryable condition (nonces not exchanged yet) from a fatal one.
#[derive(Debug)]
pub enum EngineError {
    /// Malformed caller input: bad key bytes, bad derivation index, bad hex.
    InvalidInput(String),
    InputIndexOutOfBounds {
        index: usize,
        count: usize,
    },
    UnknownNetwork(String),
    /// Script type is not available on the network (e.g. taproot on Litecoin).
    UnsupportedScriptType(String),
    Address(AddressError),
    Descriptor(String),
    Psbt(String),
    /// Chain-specific transaction encoding failed (Zcash, Dash).
    Transaction(String),
    /// Wallet script or taproot tree could not be built from the keys.
    Script(String),
    /// Mutating call made on a PSBT that is already finalized.
    AlreadyFinalized,
    /// Extraction requested before finalization.
    NotFinalized,
    /// At least one input could not be finalized. The PSBT is left untouched.
    FinalizeFailed(Vec<String>),
    Musig2(String),
    /// Operation not permitted in the PSBT's current lifecycle state.
    InvalidState {
        operation: &'static str,
        state: String,
    },
    /// MuSig2 signing attempted before both participants' nonces are present.
    NoncesNotCombined {
        input_index: usize,
    },
    /// MuSig2 signing attempted without a first round held by this session.
    MissingSecretNonce {
        input_index: usize,
    },
    /// Caller supplied a MuSig2 session id on a value-bearing network.
    SessionIdNotAllowed(Network),
    InvalidSessionIdLength(usize),
    /// Input matched neither the wallet nor the replay protection set.
    UnmatchedInput {
        index: usize,
        reason: String,
    },
}

impl std::error::Error for EngineError {}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidInput(s) => write!(f, "Invalid input: {}", s),
            EngineError::InputIndexOutOfBounds { index, count } => write!(
                f,
                "Input index {} out of bounds (psbt has {} inputs)",
                index, count
            ),
            EngineError::UnknownNetwork(s) => write!(f, "Unknown network: {}", s),
            EngineError::UnsupportedScriptType(s) => write!(f, "{}", s),
            EngineError::Address(e) => write!(f, "{}", e),
            EngineError::Descriptor(s) => write!(f, "Descriptor error: {}", s),
            EngineError::Psbt(s) => write!(f, "PSBT error: {}", s),
            EngineError::Transaction(s) => write!(f, "Transaction error: {}", s),
            EngineError::Script(s) => write!(f, "Script error: {}", s),
            EngineError::AlreadyFinalized => write!(f, "PSBT is already finalized"),
            EngineError::NotFinalized => write!(f, "PSBT is not finalized"),
            EngineError::FinalizeFailed(errors) => write!(
                f,
                "Failed to finalize {} input(s): {}",
                errors.len(),
                errors.join("; ")
            ),
            EngineError::Musig2(s) => write!(f, "MuSig2 error: {}", s),
            EngineError::InvalidState { operation, state } => {
                write!(f, "Cannot {} a PSBT in state {}", operation, state)
            }
            EngineError::NoncesNotCombined { input_index } => write!(
                f,
                "Input {}: MuSig2 nonces from both signers are required before signing",
                input_index
            ),
            EngineError::MissingSecretNonce { input_index } => write!(
                f,
                "Input {}: no MuSig2 nonce was generated by this signer",
                input_index
            ),
            EngineError::SessionIdNotAllowed(network) => write!(
                f,
                "Custom MuSig2 session id is not allowed on {}",
                network
            ),
            EngineError::InvalidSessionIdLength(len) => write!(
                f,
                "MuSig2 session id must be 32 bytes, got {}",
                len
            ),
            EngineError::UnmatchedInput { index, reason } => {
                write!(f, "Input {}: not a wallet input: {}", index, reason)
            }
        }
    }
}

impl From<AddressError> for EngineError {
    fn from(err: AddressError) -> Self {
        EngineError::Address(err)
    }
}

impl From<miniscript::Error> for EngineError {
    fn from(err: miniscript::Error) -> Self {
        EngineError::Descriptor(err.to_string())
    }
}

impl From<miniscript::descriptor::ConversionError> for EngineError {
    fn from(err: miniscript::descriptor::ConversionError) -> Self {
        EngineError::Descriptor(err.to_string())
    }
}

impl From<miniscript::bitcoin::bip32::Error> for EngineError {
    fn from(err: miniscript::bitcoin::bip32::Error) -> Self {
        EngineError::InvalidInput(err.to_string())
    }
}

impl From<DeserializeError> for EngineError {
    fn from(err: DeserializeError) -> Self {
        EngineError::Psbt(err.to_string())
    }
}

impl From<SerializeError> for EngineError {
    fn from(err: SerializeError) -> Self {
        EngineError::Psbt(err.to_string())
    }
}

impl From<Musig2Error> for EngineError {
    fn from(err: Musig2Error) -> Self {
        EngineError::Musig2(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
