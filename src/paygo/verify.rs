//! BIP-137 message signatures over attestation messages.

use miniscript::bitcoin::consensus::Encodable;
use miniscript::bitcoin::hashes::{sha256d, Hash};
use miniscript::bitcoin::secp256k1::{self, ecdsa::RecoverableSignature, ecdsa::RecoveryId};
use miniscript::bitcoin::VarInt;

use super::attestation::{attestation_message, check_entropy_length};
use super::PayGoAttestation;

const BITCOIN_SIGNED_MESSAGE_PREFIX: &[u8] = b"\x18Bitcoin Signed Message:\n";

/// Header byte base for compressed keys.
const COMPRESSED_HEADER: u8 = 31;
const UNCOMPRESSED_HEADER: u8 = 27;

fn signed_message_hash(message: &[u8]) -> Result<secp256k1::Message, String> {
    let mut data = Vec::with_capacity(BITCOIN_SIGNED_MESSAGE_PREFIX.len() + 9 + message.len());
    data.extend_from_slice(BITCOIN_SIGNED_MESSAGE_PREFIX);
    VarInt::from(message.len())
        .consensus_encode(&mut data)
        .map_err(|e| format!("Failed to encode varint: {}", e))?;
    data.extend_from_slice(message);
    Ok(secp256k1::Message::from_digest(
        sha256d::Hash::hash(&data).to_byte_array(),
    ))
}

/// Signs the attestation message for `address` with a compressed key.
pub fn sign_paygo_attestation<C: secp256k1::Signing>(
    secp: &secp256k1::Secp256k1<C>,
    entropy: &[u8],
    address: &str,
    secret_key: &secp256k1::SecretKey,
) -> Result<Vec<u8>, String> {
    check_entropy_length(entropy)?;
    let message = signed_message_hash(&attestation_message(entropy, address))?;
    let (recovery_id, compact) = secp
        .sign_ecdsa_recoverable(&message, secret_key)
        .serialize_compact();
    let mut signature = Vec::with_capacity(65);
    signature.push(COMPRESSED_HEADER + recovery_id.to_i32() as u8);
    signature.extend_from_slice(&compact);
    Ok(signature)
}

/// Recovers the signer of the attestation and compares it with `pubkey`.
///
/// `Err` for malformed signatures, `Ok(false)` for a different signer.
pub fn verify_paygo_signature(
    attestation: &PayGoAttestation,
    pubkey: &secp256k1::PublicKey,
) -> Result<bool, String> {
    if attestation.signature.len() != 65 {
        return Err(format!(
            "Invalid signature length: expected 65 bytes, got {}",
            attestation.signature.len()
        ));
    }
    let header = attestation.signature[0];
    let recovery_id = match header {
        COMPRESSED_HEADER..=34 => header - COMPRESSED_HEADER,
        UNCOMPRESSED_HEADER..=30 => header - UNCOMPRESSED_HEADER,
        _ => return Err(format!("Invalid recovery flags: {}", header)),
    };
    let recovery_id = RecoveryId::from_i32(recovery_id as i32)
        .map_err(|e| format!("Invalid recovery ID: {}", e))?;
    let signature = RecoverableSignature::from_compact(&attestation.signature[1..], recovery_id)
        .map_err(|e| format!("Invalid signature format: {}", e))?;

    let message = signed_message_hash(&attestation.to_message())?;
    let secp = secp256k1::Secp256k1::verification_only();
    let recovered = secp
        .recover_ecdsa(&message, &signature)
        .map_err(|e| format!("Failed to recover public key: {}", e))?;
    Ok(&recovered == pubkey)
}
