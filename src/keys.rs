//! Keys accepted by signing and verification calls.
//!
//! Strings and byte slices are resolved into a [`Key`] once, at the
//! boundary. Malformed input is [`EngineError::InvalidInput`].

use std::fmt;
use std::str::FromStr;

use miniscript::bitcoin::bip32::{DerivationPath, Fingerprint, Xpriv, Xpub};
use miniscript::bitcoin::secp256k1::{self, Secp256k1};
use miniscript::bitcoin::{CompressedPublicKey, NetworkKind, PrivateKey};

use crate::error::EngineError;

/// `Display` and `Debug` never print private material. Use
/// [`Key::to_string_private`] or [`Key::to_wif`] to export a private key.
#[derive(Clone, PartialEq, Eq)]
pub enum Key {
    ExtendedPublic(Xpub),
    ExtendedPrivate(Xpriv),
    RawPublic(CompressedPublicKey),
    /// Always compressed.
    RawPrivate(PrivateKey),
}

impl Key {
    /// 33-byte SEC1 compressed public key.
    pub fn from_public_bytes(bytes: &[u8]) -> Result<Key, EngineError> {
        if bytes.len() != 33 {
            return Err(EngineError::InvalidInput(format!(
                "public key must be 33 bytes, got {}",
                bytes.len()
            )));
        }
        CompressedPublicKey::from_slice(bytes)
            .map(Key::RawPublic)
            .map_err(|e| EngineError::InvalidInput(format!("invalid public key: {}", e)))
    }

    /// 32-byte secret key.
    pub fn from_private_bytes(bytes: &[u8], network: NetworkKind) -> Result<Key, EngineError> {
        if bytes.len() != 32 {
            return Err(EngineError::InvalidInput(format!(
                "private key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let secret_key = secp256k1::SecretKey::from_slice(bytes)
            .map_err(|e| EngineError::InvalidInput(format!("invalid private key: {}", e)))?;
        Ok(Key::RawPrivate(PrivateKey::new(secret_key, network)))
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Key::ExtendedPrivate(_) | Key::RawPrivate(_))
    }

    /// The public half. Public keys are returned unchanged.
    pub fn to_public<C: secp256k1::Signing>(&self, secp: &Secp256k1<C>) -> Key {
        match self {
            Key::ExtendedPrivate(xpriv) => Key::ExtendedPublic(Xpub::from_priv(secp, xpriv)),
            Key::RawPrivate(private_key) => {
                Key::RawPublic(CompressedPublicKey(private_key.inner.public_key(secp)))
            }
            public => public.clone(),
        }
    }

    pub fn public_key<C: secp256k1::Signing>(&self, secp: &Secp256k1<C>) -> CompressedPublicKey {
        match self {
            Key::ExtendedPublic(xpub) => xpub.to_pub(),
            Key::ExtendedPrivate(xpriv) => Xpub::from_priv(secp, xpriv).to_pub(),
            Key::RawPublic(public_key) => *public_key,
            Key::RawPrivate(private_key) => {
                CompressedPublicKey(private_key.inner.public_key(secp))
            }
        }
    }

    /// Fingerprint of an extended key. Raw keys have none.
    pub fn fingerprint<C: secp256k1::Signing>(&self, secp: &Secp256k1<C>) -> Option<Fingerprint> {
        match self {
            Key::ExtendedPublic(xpub) => Some(xpub.fingerprint()),
            Key::ExtendedPrivate(xpriv) => Some(xpriv.fingerprint(secp)),
            Key::RawPublic(_) | Key::RawPrivate(_) => None,
        }
    }

    /// Child key along `path`. Hardened steps need a private key.
    pub fn derive_path<C: secp256k1::Signing + secp256k1::Verification>(
        &self,
        secp: &Secp256k1<C>,
        path: &DerivationPath,
    ) -> Result<Key, EngineError> {
        match self {
            Key::ExtendedPublic(xpub) => Ok(Key::ExtendedPublic(xpub.derive_pub(secp, path)?)),
            Key::ExtendedPrivate(xpriv) => Ok(Key::ExtendedPrivate(xpriv.derive_priv(secp, path)?)),
            Key::RawPublic(_) | Key::RawPrivate(_) => Err(EngineError::InvalidInput(
                "cannot derive from a raw key".to_string(),
            )),
        }
    }

    pub fn to_wif(&self) -> Result<String, EngineError> {
        match self {
            Key::ExtendedPrivate(xpriv) => {
                Ok(PrivateKey::new(xpriv.private_key, xpriv.network).to_wif())
            }
            Key::RawPrivate(private_key) => Ok(private_key.to_wif()),
            Key::ExtendedPublic(_) | Key::RawPublic(_) => Err(EngineError::InvalidInput(
                "cannot get WIF from a public key".to_string(),
            )),
        }
    }
}

/// Accepts base58 xpub/xprv (and testnet forms), WIF, or hex of a 33-byte
/// public key.
impl FromStr for Key {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(xpub) = Xpub::from_str(s) {
            return Ok(Key::ExtendedPublic(xpub));
        }
        if let Ok(xpriv) = Xpriv::from_str(s) {
            return Ok(Key::ExtendedPrivate(xpriv));
        }
        if let Ok(private_key) = PrivateKey::from_wif(s) {
            if !private_key.compressed {
                return Err(EngineError::InvalidInput(
                    "uncompressed private keys are not supported".to_string(),
                ));
            }
            return Ok(Key::RawPrivate(private_key));
        }
        match hex::decode(s) {
            Ok(bytes) => Key::from_public_bytes(&bytes),
            Err(_) => Err(EngineError::InvalidInput(format!("unrecognized key: {}", s))),
        }
    }
}

impl Key {
    /// The string [`Key::from_str`] accepts: base58 for extended keys, WIF
    /// for raw private keys, hex for raw public keys.
    pub fn to_string_private(&self) -> String {
        match self {
            Key::ExtendedPrivate(xpriv) => xpriv.to_string(),
            Key::RawPrivate(private_key) => private_key.to_wif(),
            public => public.to_string(),
        }
    }
}

const REDACTED: &str = "<redacted>";

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::ExtendedPublic(xpub) => write!(f, "{}", xpub),
            Key::RawPublic(public_key) => write!(f, "{}", public_key),
            Key::ExtendedPrivate(xpriv) => write!(f, "xprv({:?}, {})", xpriv.network, REDACTED),
            Key::RawPrivate(private_key) => {
                write!(f, "wif({:?}, {})", private_key.network, REDACTED)
            }
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::ExtendedPublic(xpub) => f.debug_tuple("ExtendedPublic").field(xpub).finish(),
            Key::RawPublic(public_key) => f.debug_tuple("RawPublic").field(public_key).finish(),
            Key::ExtendedPrivate(xpriv) => f
                .debug_struct("ExtendedPrivate")
                .field("network", &xpriv.network)
                .field("depth", &xpriv.depth)
                .field("key", &REDACTED)
                .finish(),
            Key::RawPrivate(private_key) => f
                .debug_struct("RawPrivate")
                .field("network", &private_key.network)
                .field("key", &REDACTED)
                .finish(),
        }
    }
}
