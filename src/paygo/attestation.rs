use super::{ENTROPY_LENGTH, NIL_UUID};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayGoAttestation {
    pub entropy: Vec<u8>,
    /// 65-byte recoverable signature, header byte first.
    pub signature: Vec<u8>,
    pub address: String,
}

pub(crate) fn check_entropy_length(entropy: &[u8]) -> Result<(), String> {
    if entropy.len() != ENTROPY_LENGTH {
        return Err(format!(
            "Invalid entropy length: expected {}, got {}",
            ENTROPY_LENGTH,
            entropy.len()
        ));
    }
    Ok(())
}

impl PayGoAttestation {
    pub fn new(entropy: Vec<u8>, signature: Vec<u8>, address: String) -> Result<Self, String> {
        check_entropy_length(&entropy)?;
        Ok(Self {
            entropy,
            signature,
            address,
        })
    }

    /// `entropy ‖ address ‖ NIL_UUID`, the signed message.
    pub fn to_message(&self) -> Vec<u8> {
        attestation_message(&self.entropy, &self.address)
    }
}

pub(crate) fn attestation_message(entropy: &[u8], address: &str) -> Vec<u8> {
    let mut message = Vec::with_capacity(entropy.len() + address.len() + NIL_UUID.len());
    message.extend_from_slice(entropy);
    message.extend_from_slice(address.as_bytes());
    message.extend_from_slice(NIL_UUID.as_bytes());
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "1CdWUVacSQQJ617HuNWByGiisEGXGNx2c";

    #[test]
    fn test_entropy_must_be_64_bytes() {
        for len in [0, 32, 63, 65] {
            let err = PayGoAttestation::new(vec![0u8; len], vec![1u8; 65], ADDRESS.to_string())
                .unwrap_err();
            assert!(err.contains(&format!("expected 64, got {}", len)));
        }
        assert!(PayGoAttestation::new(vec![0u8; 64], vec![1u8; 65], ADDRESS.to_string()).is_ok());
    }

    #[test]
    fn test_message_layout() {
        let attestation =
            PayGoAttestation::new(vec![7u8; 64], vec![], ADDRESS.to_string()).unwrap();
        let message = attestation.to_message();
        assert_eq!(message.len(), 64 + ADDRESS.len() + 36);
        assert_eq!(&message[..64], &[7u8; 64][..]);
        assert_eq!(&message[64..64 + ADDRESS.len()], ADDRESS.as_bytes());
        assert_eq!(&message[64 + ADDRESS.len()..], NIL_UUID.as_bytes());
    }
}
