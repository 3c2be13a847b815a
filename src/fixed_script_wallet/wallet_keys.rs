use std::convert::TryInto;
use std::str::FromStr;

use crate::bitcoin::bip32::{ChildNumber, DerivationPath, Fingerprint};
use crate::bitcoin::{bip32::Xpub, secp256k1::Secp256k1, CompressedPublicKey};
use crate::error::EngineError;

pub type XpubTriple = [Xpub; 3];

pub type PubTriple = [CompressedPublicKey; 3];

/// Derivation prefix applied to every root key unless the wallet says otherwise.
pub const DEFAULT_DERIVATION_PREFIX: [ChildNumber; 2] =
    [ChildNumber::Normal { index: 0 }, ChildNumber::Normal { index: 0 }];

pub fn to_pub_triple(xpubs: &XpubTriple) -> PubTriple {
    [xpubs[0].to_pub(), xpubs[1].to_pub(), xpubs[2].to_pub()]
}

pub fn derivation_path(prefix: &DerivationPath, chain: u32, index: u32) -> DerivationPath {
    prefix
        .child(ChildNumber::Normal { index: chain })
        .child(ChildNumber::Normal { index })
}

/// One of the three wallet participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignerKey {
    User,
    Backup,
    Bitgo,
}

impl SignerKey {
    pub const ALL: [SignerKey; 3] = [SignerKey::User, SignerKey::Backup, SignerKey::Bitgo];

    /// Position in the `[user, backup, bitgo]` triple.
    pub fn index(&self) -> usize {
        match self {
            SignerKey::User => 0,
            SignerKey::Backup => 1,
            SignerKey::Bitgo => 2,
        }
    }

    pub fn is_backup(&self) -> bool {
        matches!(self, SignerKey::Backup)
    }
}

impl FromStr for SignerKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(SignerKey::User),
            "backup" => Ok(SignerKey::Backup),
            "bitgo" => Ok(SignerKey::Bitgo),
            _ => Err(format!("Invalid signer key: {}", s)),
        }
    }
}

/// The two keys that spend an input together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignPath {
    pub signer: SignerKey,
    pub cosigner: SignerKey,
}

impl SignPath {
    pub fn new(signer: SignerKey, cosigner: SignerKey) -> Result<Self, EngineError> {
        if signer == cosigner {
            return Err(EngineError::InvalidInput(
                "signer and cosigner must differ".to_string(),
            ));
        }
        Ok(Self { signer, cosigner })
    }

    /// Pair used by the MuSig2 key path.
    pub const USER_BITGO: SignPath = SignPath {
        signer: SignerKey::User,
        cosigner: SignerKey::Bitgo,
    };
}

/// The user, backup and bitgo root keys of a fixed-script wallet.
#[derive(Debug, Clone)]
pub struct RootWalletKeys {
    pub xpubs: XpubTriple,
    pub derivation_prefixes: [DerivationPath; 3],
}

impl RootWalletKeys {
    pub fn new_with_derivation_prefixes(
        xpubs: XpubTriple,
        derivation_prefixes: [DerivationPath; 3],
    ) -> Self {
        Self {
            xpubs,
            derivation_prefixes,
        }
    }

    pub fn new(xpubs: XpubTriple) -> Self {
        let prefix = DerivationPath::from(DEFAULT_DERIVATION_PREFIX.to_vec());
        Self::new_with_derivation_prefixes(xpubs, [prefix.clone(), prefix.clone(), prefix])
    }

    /// Parses base58 xpubs and optional prefixes (`"m/0/0"` style, `None` for the default).
    pub fn from_strings(
        xpubs: [&str; 3],
        prefixes: Option<[&str; 3]>,
    ) -> Result<Self, EngineError> {
        let parse_xpub = |s: &str| {
            Xpub::from_str(s).map_err(|e| EngineError::InvalidInput(format!("Invalid xpub: {}", e)))
        };
        let xpubs = [parse_xpub(xpubs[0])?, parse_xpub(xpubs[1])?, parse_xpub(xpubs[2])?];
        match prefixes {
            None => Ok(Self::new(xpubs)),
            Some(prefixes) => {
                let parse_path = |s: &str| {
                    DerivationPath::from_str(s).map_err(|e| {
                        EngineError::InvalidInput(format!("Invalid derivation prefix {}: {}", s, e))
                    })
                };
                Ok(Self::new_with_derivation_prefixes(
                    xpubs,
                    [
                        parse_path(prefixes[0])?,
                        parse_path(prefixes[1])?,
                        parse_path(prefixes[2])?,
                    ],
                ))
            }
        }
    }

    pub fn user_key(&self) -> &Xpub {
        &self.xpubs[0]
    }

    pub fn backup_key(&self) -> &Xpub {
        &self.xpubs[1]
    }

    pub fn bitgo_key(&self) -> &Xpub {
        &self.xpubs[2]
    }

    pub fn key(&self, signer: SignerKey) -> &Xpub {
        &self.xpubs[signer.index()]
    }

    pub fn fingerprints(&self) -> [Fingerprint; 3] {
        [
            self.xpubs[0].fingerprint(),
            self.xpubs[1].fingerprint(),
            self.xpubs[2].fingerprint(),
        ]
    }

    pub fn derive_for_chain_and_index(
        &self,
        chain: u32,
        index: u32,
    ) -> Result<XpubTriple, EngineError> {
        let ctx = Secp256k1::verification_only();
        let derive = |i: usize| {
            self.xpubs[i]
                .derive_pub(&ctx, &derivation_path(&self.derivation_prefixes[i], chain, index))
                .map_err(|e| EngineError::InvalidInput(format!("Error deriving xpub: {}", e)))
        };
        Ok([derive(0)?, derive(1)?, derive(2)?])
    }
}
