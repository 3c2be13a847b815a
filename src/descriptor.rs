//! Output descriptors with optional wildcard derivation.

use std::fmt;
use std::str::FromStr;

use miniscript::bitcoin::bip32::ChildNumber;
use miniscript::bitcoin::secp256k1::Secp256k1;
use miniscript::bitcoin::{ScriptBuf, Weight};
use miniscript::{DefiniteDescriptorKey, Descriptor, DescriptorPublicKey};

use crate::address::from_output_script_with_network;
use crate::dimensions::Dimensions;
use crate::error::EngineError;
use crate::Network;

pub type DefiniteDescriptor = Descriptor<DefiniteDescriptorKey>;

/// A parsed descriptor. Private keys in the source string are replaced by
/// their public halves and not retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletDescriptor(Descriptor<DescriptorPublicKey>);

impl WalletDescriptor {
    pub fn new(descriptor: Descriptor<DescriptorPublicKey>) -> Self {
        WalletDescriptor(descriptor)
    }

    pub fn inner(&self) -> &Descriptor<DescriptorPublicKey> {
        &self.0
    }

    pub fn has_wildcard(&self) -> bool {
        self.0.has_wildcard()
    }

    /// Definite descriptor at `index`.
    ///
    /// Wildcard descriptors need an index and definite ones must not get
    /// one. Hardened indices are rejected.
    pub fn at_derivation_index(&self, index: Option<u32>) -> Result<DefiniteDescriptor, EngineError> {
        match (self.has_wildcard(), index) {
            (true, None) => Err(EngineError::Descriptor(
                "derivation index required for a wildcard descriptor".to_string(),
            )),
            (false, Some(_)) => Err(EngineError::Descriptor(
                "cannot derive a definite descriptor".to_string(),
            )),
            (true, Some(index)) => {
                if ChildNumber::from_normal_idx(index).is_err() {
                    return Err(EngineError::InvalidInput(format!(
                        "derivation index {} is hardened or out of range",
                        index
                    )));
                }
                Ok(self.0.at_derivation_index(index)?)
            }
            (false, None) => Ok(self.0.at_derivation_index(0)?),
        }
    }

    pub fn script_pubkey(&self, index: Option<u32>) -> Result<ScriptBuf, EngineError> {
        Ok(self.at_derivation_index(index)?.script_pubkey())
    }

    pub fn address(&self, index: Option<u32>, network: Network) -> Result<String, EngineError> {
        Ok(from_output_script_with_network(
            &self.script_pubkey(index)?,
            network,
        )?)
    }

    /// Upper bound of the scriptSig and witness weight of a spend.
    pub fn max_weight_to_satisfy(&self) -> Result<Weight, EngineError> {
        Ok(self.0.max_weight_to_satisfy()?)
    }

    pub fn is_segwit(&self) -> bool {
        self.0.desc_type().segwit_version().is_some()
    }
}

/// Input dimensions of a spend of `descriptor`.
pub fn descriptor_dimensions(descriptor: &WalletDescriptor) -> Result<Dimensions, EngineError> {
    Ok(Dimensions::from_descriptor_input(
        descriptor.max_weight_to_satisfy()?,
        descriptor.is_segwit(),
    ))
}

impl FromStr for WalletDescriptor {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let secp = Secp256k1::signing_only();
        let (descriptor, _key_map) = Descriptor::parse_descriptor(&secp, s)?;
        Ok(WalletDescriptor(descriptor))
    }
}

impl fmt::Display for WalletDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
