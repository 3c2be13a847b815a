//! MuSig key aggregation for the two BitGo taproot output types.
//!
//! Chains 30/31 use an older aggregation that hashes x-only keys after sorting
//! them. Chains 40/41 use BIP327 aggregation over compressed keys in wallet
//! order, delegated to the `musig2` crate.

use miniscript::bitcoin::CompressedPublicKey;
use musig2::secp::Point;
use musig2::KeyAggContext;

use crate::bitcoin::hashes::{sha256, Hash, HashEngine};
use crate::bitcoin::secp256k1::{Parity, PublicKey, Scalar, Secp256k1, XOnlyPublicKey};

#[derive(Debug)]
pub enum BitGoMusigError {
    InvalidPubkeyCount(String),
    InvalidPubkey(String),
    AggregationFailed(String),
}

impl std::fmt::Display for BitGoMusigError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            BitGoMusigError::InvalidPubkeyCount(msg) => write!(f, "Invalid pubkey count: {}", msg),
            BitGoMusigError::InvalidPubkey(msg) => write!(f, "Invalid pubkey: {}", msg),
            BitGoMusigError::AggregationFailed(msg) => write!(f, "Aggregation failed: {}", msg),
        }
    }
}

impl std::error::Error for BitGoMusigError {}

/// BIP340 tagged hash.
pub(crate) fn tagged_hash(tag: &str, msg: &[u8]) -> [u8; 32] {
    let tag_hash = sha256::Hash::hash(tag.as_bytes());
    let mut engine = sha256::Hash::engine();
    engine.input(tag_hash.as_ref());
    engine.input(tag_hash.as_ref());
    engine.input(msg);
    sha256::Hash::from_engine(engine).to_byte_array()
}

fn require_distinct<T: PartialEq>(keys: &[T]) -> Result<(), BitGoMusigError> {
    if keys.len() < 2 {
        return Err(BitGoMusigError::InvalidPubkeyCount(
            "At least two pubkeys are required for MuSig key aggregation".to_string(),
        ));
    }
    if keys.iter().skip(1).all(|k| k == &keys[0]) {
        return Err(BitGoMusigError::InvalidPubkeyCount(
            "All pubkeys are identical - MuSig requires at least two distinct keys".to_string(),
        ));
    }
    Ok(())
}

/// BIP327-style aggregation over x-only keys, lifted with even Y.
///
/// The second distinct key gets coefficient one.
fn key_agg_xonly(keys: &[[u8; 32]]) -> Result<[u8; 32], BitGoMusigError> {
    require_distinct(keys)?;
    let secp = Secp256k1::verification_only();

    let list_hash = tagged_hash("KeyAgg list", &keys.concat());
    let second = keys.iter().skip(1).find(|k| *k != &keys[0]);

    let mut aggregate: Option<PublicKey> = None;
    for (i, key) in keys.iter().enumerate() {
        let point = XOnlyPublicKey::from_slice(key)
            .map(|x| PublicKey::from_x_only_public_key(x, Parity::Even))
            .map_err(|e| {
                BitGoMusigError::InvalidPubkey(format!("Invalid x-only pubkey at index {}: {}", i, e))
            })?;

        let coefficient = if Some(key) == second {
            Scalar::ONE
        } else {
            let hash = tagged_hash("KeyAgg coefficient", &[&list_hash[..], &key[..]].concat());
            Scalar::from_be_bytes(hash).map_err(|e| {
                BitGoMusigError::AggregationFailed(format!("Invalid coefficient: {}", e))
            })?
        };

        let contribution = point.mul_tweak(&secp, &coefficient).map_err(|e| {
            BitGoMusigError::AggregationFailed(format!("Point multiplication failed: {}", e))
        })?;
        aggregate = Some(match aggregate {
            None => contribution,
            Some(q) => q.combine(&contribution).map_err(|e| {
                BitGoMusigError::AggregationFailed(format!("Point addition failed: {}", e))
            })?,
        });
    }

    let q = aggregate.ok_or_else(|| {
        BitGoMusigError::AggregationFailed("Aggregation resulted in point at infinity".to_string())
    })?;
    Ok(q.x_only_public_key().0.serialize())
}

/// Aggregation used by `p2trLegacy` (chains 30, 31): x-only keys, sorted.
pub fn key_agg_bitgo_p2tr_legacy(
    pubkeys: &[CompressedPublicKey],
) -> Result<[u8; 32], BitGoMusigError> {
    let mut xonly: Vec<[u8; 32]> = pubkeys
        .iter()
        .map(|pk| pk.0.x_only_public_key().0.serialize())
        .collect();
    xonly.sort();
    key_agg_xonly(&xonly)
}

/// BIP327 key aggregation context for `p2trMusig2` (chains 40, 41). Key order matters.
pub fn key_agg_context_p2tr_musig2(
    pubkeys: &[CompressedPublicKey],
) -> Result<KeyAggContext, BitGoMusigError> {
    require_distinct(pubkeys)?;
    let points = pubkeys
        .iter()
        .enumerate()
        .map(|(i, pk)| {
            Point::try_from(&pk.to_bytes()[..]).map_err(|e| {
                BitGoMusigError::InvalidPubkey(format!("Invalid pubkey at index {}: {}", i, e))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    KeyAggContext::new(points).map_err(|e| {
        BitGoMusigError::AggregationFailed(format!("KeyAggContext creation failed: {}", e))
    })
}

/// Untweaked x-only aggregate key for `p2trMusig2`.
pub fn key_agg_p2tr_musig2(pubkeys: &[CompressedPublicKey]) -> Result<[u8; 32], BitGoMusigError> {
    let ctx = key_agg_context_p2tr_musig2(pubkeys)?;
    let aggregate: Point = ctx.aggregated_pubkey();
    let compressed = aggregate.serialize();
    let mut x_only = [0u8; 32];
    x_only.copy_from_slice(&compressed[1..33]);
    Ok(x_only)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn pubkey(hex: &str) -> CompressedPublicKey {
        CompressedPublicKey::from_slice(&hex::decode(hex).unwrap()).unwrap()
    }

    fn xonly(hex: &str) -> [u8; 32] {
        hex::decode(hex).unwrap().try_into().unwrap()
    }

    const USER: &str = "02d20a62701c54f6eb3abb9f964b0e29ff90ffa3b4e3fcb73e7c67d4950fa6e3c7";
    const BITGO: &str = "03203ab799ce28e2cca044f594c69275050af4bb0854ad730a8f74622342300e64";
    const BACKUP: &str = "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798";

    const LEGACY: &str = "cc899cac29f6243ef481be86f0d39e173c075cd57193d46332b1ec0b42c439aa";
    const MUSIG2_USER_BITGO: &str =
        "c0e255b4510e041ab81151091d875687a618de314344dff4b73b1bcd366cdbd8";
    const MUSIG2_BITGO_USER: &str =
        "e48d309b535811eb0b148c4b0600a10e82e289899429e40aee05577504eca356";

    #[rstest]
    #[case(USER, BITGO)]
    #[case(BITGO, USER)]
    fn test_legacy_aggregation_is_order_independent(#[case] a: &str, #[case] b: &str) {
        let result = key_agg_bitgo_p2tr_legacy(&[pubkey(a), pubkey(b)]).unwrap();
        assert_eq!(result, xonly(LEGACY));
    }

    #[rstest]
    #[case(USER, BITGO, MUSIG2_USER_BITGO)]
    #[case(BITGO, USER, MUSIG2_BITGO_USER)]
    fn test_musig2_aggregation_depends_on_order(
        #[case] a: &str,
        #[case] b: &str,
        #[case] expected: &str,
    ) {
        let result = key_agg_p2tr_musig2(&[pubkey(a), pubkey(b)]).unwrap();
        assert_eq!(result, xonly(expected));
    }

    #[test]
    fn test_identical_keys_rejected() {
        assert!(matches!(
            key_agg_bitgo_p2tr_legacy(&[pubkey(USER), pubkey(USER)]),
            Err(BitGoMusigError::InvalidPubkeyCount(_))
        ));
        assert!(matches!(
            key_agg_p2tr_musig2(&[pubkey(USER), pubkey(USER)]),
            Err(BitGoMusigError::InvalidPubkeyCount(_))
        ));
        assert!(matches!(
            key_agg_p2tr_musig2(&[pubkey(USER)]),
            Err(BitGoMusigError::InvalidPubkeyCount(_))
        ));
    }

    #[test]
    fn test_three_keys() {
        let result = key_agg_p2tr_musig2(&[pubkey(USER), pubkey(BITGO), pubkey(BACKUP)]).unwrap();
        assert_ne!(result, xonly(MUSIG2_USER_BITGO));
    }
}
