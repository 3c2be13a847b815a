//! Sighash selection for ECDSA inputs.
//!
//! Bitcoin-like networks differ in how the signed message is computed:
//! BIP143/legacy for Bitcoin and its direct descendants, the FORKID variant for
//! the Bitcoin Cash family and Bitcoin Gold, ZIP-243 for Zcash.

use miniscript::bitcoin::ecdsa;
use miniscript::bitcoin::hashes::Hash;
use miniscript::bitcoin::psbt::Psbt;
use miniscript::bitcoin::secp256k1::{self, Message};
use miniscript::bitcoin::sighash::SighashCache;
use miniscript::bitcoin::Script;

use crate::networks::Network;

pub const SIGHASH_ALL: u32 = 0x01;
pub const SIGHASH_NONE: u32 = 0x02;
pub const SIGHASH_SINGLE: u32 = 0x03;
pub const SIGHASH_FORKID: u32 = 0x40;
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

fn uses_forkid(network: Network) -> bool {
    network.fork_id().is_some()
}

/// Rejects sighash types the network does not accept.
///
/// FORKID networks require the `0x40` flag, all others reject it. `0` means
/// "not specified" and is always accepted.
pub fn validate_sighash_type(sighash_type: u32, network: Network) -> Result<(), String> {
    if sighash_type == 0 {
        return Ok(());
    }
    let has_forkid = sighash_type & SIGHASH_FORKID != 0;
    if has_forkid && !uses_forkid(network) {
        return Err(format!(
            "SIGHASH_FORKID (0x40) is not valid for network {}. Sighash type: 0x{:02x}",
            network, sighash_type
        ));
    }
    if uses_forkid(network) && !has_forkid {
        return Err(format!(
            "SIGHASH_FORKID (0x40) is required for network {}. Sighash type: 0x{:02x}",
            network, sighash_type
        ));
    }
    match sighash_type & 0x1f {
        SIGHASH_ALL | SIGHASH_NONE | SIGHASH_SINGLE => Ok(()),
        base => Err(format!(
            "Invalid base sighash type 0x{:02x} in 0x{:02x}",
            base, sighash_type
        )),
    }
}

/// Sighash type used when the input does not specify one.
pub fn default_sighash_type(network: Network) -> u32 {
    if uses_forkid(network) {
        SIGHASH_ALL | SIGHASH_FORKID
    } else {
        SIGHASH_ALL
    }
}

/// Sighash type of a PSBT input, falling back to the network default.
pub fn input_sighash_type(psbt: &Psbt, input_index: usize, network: Network) -> u32 {
    psbt.inputs
        .get(input_index)
        .and_then(|input| input.sighash_type)
        .map(|t| t.to_u32())
        .unwrap_or_else(|| default_sighash_type(network))
}

/// How the ECDSA message of a wallet input is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcdsaSighash {
    /// BIP143 for segwit inputs, legacy otherwise.
    Standard,
    ForkId(u32),
    Zcash {
        branch_id: u32,
        version_group_id: u32,
        expiry_height: u32,
    },
}

impl EcdsaSighash {
    /// Message to sign for input `input_index` of `psbt`.
    pub fn message(&self, psbt: &Psbt, input_index: usize) -> Result<Message, String> {
        let mut cache = SighashCache::new(&psbt.unsigned_tx);
        let message = match *self {
            EcdsaSighash::Standard => {
                psbt.sighash_ecdsa(input_index, &mut cache)
                    .map_err(|e| format!("Failed to compute sighash: {}", e))?
                    .0
            }
            EcdsaSighash::ForkId(fork_id) => {
                psbt.sighash_forkid(input_index, &mut cache, fork_id)
                    .map_err(|e| format!("Failed to compute FORKID sighash: {}", e))?
                    .0
            }
            EcdsaSighash::Zcash {
                branch_id,
                version_group_id,
                expiry_height,
            } => {
                psbt.sighash_zcash(
                    input_index,
                    &mut cache,
                    branch_id,
                    version_group_id,
                    expiry_height,
                )
                .map_err(|e| format!("Failed to compute Zcash sighash: {}", e))?
                .0
            }
        };
        Ok(message)
    }
}

/// Pre-segwit sighash over `script_code`, used by replay protection inputs on
/// every network.
pub fn legacy_message(
    psbt: &Psbt,
    input_index: usize,
    script_code: &Script,
    sighash_type: u32,
) -> Result<Message, String> {
    let cache = SighashCache::new(&psbt.unsigned_tx);
    let sighash = cache
        .legacy_signature_hash(input_index, script_code, sighash_type)
        .map_err(|e| format!("Failed to compute legacy sighash: {}", e))?;
    Ok(Message::from_digest(sighash.to_byte_array()))
}

/// DER signature followed by the sighash byte, as carried in `partial_sigs`.
pub fn to_ecdsa_signature(
    signature: secp256k1::ecdsa::Signature,
    sighash_type: u32,
) -> Result<ecdsa::Signature, String> {
    let sighash_byte = u8::try_from(sighash_type)
        .map_err(|_| format!("Sighash type 0x{:x} does not fit a byte", sighash_type))?;
    let mut bytes = signature.serialize_der().to_vec();
    bytes.push(sighash_byte);
    ecdsa::Signature::from_slice(&bytes).map_err(|e| format!("Invalid signature: {}", e))
}
