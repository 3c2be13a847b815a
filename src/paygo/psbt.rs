use miniscript::bitcoin::psbt::Output;
use miniscript::bitcoin::secp256k1::PublicKey;

use super::attestation::check_entropy_length;
use super::{verify_paygo_signature, PayGoAttestation};
use crate::fixed_script_wallet::bitgo_psbt::{find_kv, BitGoKeyValue, ProprietaryKeySubtype};

fn attestations(psbt_output: &Output) -> Vec<BitGoKeyValue> {
    find_kv(
        ProprietaryKeySubtype::PayGoAddressAttestationProof,
        &psbt_output.proprietary,
    )
    .collect()
}

/// The single attestation of an output, bound to `address`.
pub fn extract_paygo_attestation(
    psbt_output: &Output,
    address: &str,
) -> Result<PayGoAttestation, String> {
    match attestations(psbt_output).as_slice() {
        [] => Err("No PayGo attestation found in output".to_string()),
        [kv] => PayGoAttestation::new(kv.key.clone(), kv.value.clone(), address.to_string()),
        many => Err(format!(
            "Multiple PayGo attestations found in output: expected 1, got {}",
            many.len()
        )),
    }
}

/// `Ok(false)` without an attestation. An attestation is verified against
/// `paygo_pubkeys` unless the list is empty; a failed check is an error.
pub fn has_paygo_attestation_verify(
    psbt_output: &Output,
    address: Option<&str>,
    paygo_pubkeys: &[PublicKey],
) -> Result<bool, String> {
    if attestations(psbt_output).is_empty() {
        return Ok(false);
    }
    let address =
        address.ok_or_else(|| "PayGo attestation present but output has no address".to_string())?;
    let attestation = extract_paygo_attestation(psbt_output, address)?;
    if paygo_pubkeys.is_empty() {
        return Ok(true);
    }
    let verified = paygo_pubkeys
        .iter()
        .any(|pubkey| verify_paygo_signature(&attestation, pubkey).unwrap_or(false));
    if !verified {
        return Err("PayGo attestation verification failed".to_string());
    }
    Ok(true)
}

/// Stores an attestation on the output. An attestation with the same
/// entropy is replaced.
pub fn add_paygo_attestation(
    psbt_output: &mut Output,
    entropy: Vec<u8>,
    signature: Vec<u8>,
) -> Result<(), String> {
    check_entropy_length(&entropy)?;
    BitGoKeyValue::new(
        ProprietaryKeySubtype::PayGoAddressAttestationProof,
        entropy,
        signature,
    )
    .insert_into(&mut psbt_output.proprietary);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paygo::sign_paygo_attestation;
    use miniscript::bitcoin::secp256k1::{Secp256k1, SecretKey};

    const ADDRESS: &str = "1CdWUVacSQQJ617HuNWByGiisEGXGNx2c";

    fn signed_output(secret: u8) -> (Output, PublicKey) {
        let secp = Secp256k1::new();
        let secret_key = SecretKey::from_slice(&[secret; 32]).unwrap();
        let signature = sign_paygo_attestation(&secp, &[5u8; 64], ADDRESS, &secret_key).unwrap();
        let mut output = Output::default();
        add_paygo_attestation(&mut output, vec![5u8; 64], signature).unwrap();
        (output, secret_key.public_key(&secp))
    }

    #[test]
    fn test_verify_attached_attestation() {
        let (output, signer) = signed_output(1);
        let (_, stranger) = signed_output(2);
        assert!(has_paygo_attestation_verify(&output, Some(ADDRESS), &[signer]).unwrap());
        assert!(has_paygo_attestation_verify(&output, Some(ADDRESS), &[stranger, signer]).unwrap());
        assert!(has_paygo_attestation_verify(&output, Some(ADDRESS), &[stranger]).is_err());
        // present but unchecked
        assert!(has_paygo_attestation_verify(&output, Some(ADDRESS), &[]).unwrap());
        assert!(has_paygo_attestation_verify(&output, None, &[signer]).is_err());
        assert!(!has_paygo_attestation_verify(&Output::default(), Some(ADDRESS), &[signer]).unwrap());
    }

    #[test]
    fn test_same_entropy_replaces() {
        let mut output = Output::default();
        add_paygo_attestation(&mut output, vec![0u8; 64], vec![1u8; 65]).unwrap();
        add_paygo_attestation(&mut output, vec![0u8; 64], vec![2u8; 65]).unwrap();
        assert_eq!(
            extract_paygo_attestation(&output, ADDRESS).unwrap().signature,
            vec![2u8; 65]
        );

        let mut other_entropy = vec![0u8; 64];
        other_entropy[0] = 1;
        add_paygo_attestation(&mut output, other_entropy, vec![3u8; 65]).unwrap();
        assert!(extract_paygo_attestation(&output, ADDRESS)
            .unwrap_err()
            .contains("Multiple PayGo attestations"));
    }

    #[test]
    fn test_entropy_length_is_checked() {
        let mut output = Output::default();
        assert!(add_paygo_attestation(&mut output, vec![0u8; 32], vec![1u8; 65])
            .unwrap_err()
            .contains("expected 64, got 32"));
        assert!(output.proprietary.is_empty());
    }
}
