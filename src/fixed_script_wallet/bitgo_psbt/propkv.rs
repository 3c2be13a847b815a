//! BitGo proprietary key-values (`0xfc` "BITGO" keys) carried in PSBT maps.

use std::collections::BTreeMap;

pub use miniscript::bitcoin::psbt::raw::ProprietaryKey;
use miniscript::bitcoin::psbt::Psbt;

pub const BITGO: &[u8] = b"BITGO";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProprietaryKeySubtype {
    ZecConsensusBranchId = 0x00,
    Musig2ParticipantPubKeys = 0x01,
    Musig2PubNonce = 0x02,
    Musig2PartialSig = 0x03,
    PayGoAddressAttestationProof = 0x04,
    Bip322Message = 0x05,
}

impl ProprietaryKeySubtype {
    pub fn from(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(ProprietaryKeySubtype::ZecConsensusBranchId),
            0x01 => Some(ProprietaryKeySubtype::Musig2ParticipantPubKeys),
            0x02 => Some(ProprietaryKeySubtype::Musig2PubNonce),
            0x03 => Some(ProprietaryKeySubtype::Musig2PartialSig),
            0x04 => Some(ProprietaryKeySubtype::PayGoAddressAttestationProof),
            0x05 => Some(ProprietaryKeySubtype::Bip322Message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitGoKeyValue {
    pub subtype: ProprietaryKeySubtype,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl BitGoKeyValue {
    pub fn new(subtype: ProprietaryKeySubtype, key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            subtype,
            key,
            value,
        }
    }

    /// `None` for foreign prefixes and subtypes we do not know.
    pub fn from_key_value(key: &ProprietaryKey, value: &[u8]) -> Option<Self> {
        if !is_bitgo_key(key) {
            return None;
        }
        let subtype = ProprietaryKeySubtype::from(key.subtype)?;
        Some(Self::new(subtype, key.key.clone(), value.to_vec()))
    }

    pub fn to_key_value(&self) -> (ProprietaryKey, Vec<u8>) {
        let key = ProprietaryKey {
            prefix: BITGO.to_vec(),
            subtype: self.subtype as u8,
            key: self.key.clone(),
        };
        (key, self.value.clone())
    }

    pub fn insert_into(&self, map: &mut BTreeMap<ProprietaryKey, Vec<u8>>) {
        let (key, value) = self.to_key_value();
        map.insert(key, value);
    }
}

/// All BitGo key-values of `subtype` in a proprietary map.
pub fn find_kv(
    subtype: ProprietaryKeySubtype,
    map: &BTreeMap<ProprietaryKey, Vec<u8>>,
) -> impl Iterator<Item = BitGoKeyValue> + '_ {
    map.iter()
        .filter(move |(key, _)| is_bitgo_key(key) && key.subtype == subtype as u8)
        .filter_map(|(key, value)| BitGoKeyValue::from_key_value(key, value))
}

pub fn is_bitgo_key(key: &ProprietaryKey) -> bool {
    key.prefix.as_slice() == BITGO
}

pub fn is_musig2_key(key: &ProprietaryKey) -> bool {
    is_bitgo_key(key)
        && matches!(
            ProprietaryKeySubtype::from(key.subtype),
            Some(ProprietaryKeySubtype::Musig2ParticipantPubKeys)
                | Some(ProprietaryKeySubtype::Musig2PubNonce)
                | Some(ProprietaryKeySubtype::Musig2PartialSig)
        )
}

/// Raw global key under which older serializers store the branch id:
/// `0xfc` type with `varint(5) "BITGO" 0x00` as key data.
const UNPARSED_BRANCH_ID_KEY: &[u8] = &[0x05, b'B', b'I', b'T', b'G', b'O', 0x00];

fn branch_id_from_bytes(value: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = value.try_into().ok()?;
    Some(u32::from_le_bytes(bytes))
}

/// Zcash consensus branch id stored in the global map (4 bytes, little endian).
pub fn get_zec_consensus_branch_id(psbt: &Psbt) -> Option<u32> {
    find_kv(ProprietaryKeySubtype::ZecConsensusBranchId, &psbt.proprietary)
        .find_map(|kv| branch_id_from_bytes(&kv.value))
        .or_else(|| {
            psbt.unknown
                .iter()
                .find(|(key, _)| key.type_value == 0xfc && key.key == UNPARSED_BRANCH_ID_KEY)
                .and_then(|(_, value)| branch_id_from_bytes(value))
        })
}

pub fn set_zec_consensus_branch_id(psbt: &mut Psbt, branch_id: u32) {
    BitGoKeyValue::new(
        ProprietaryKeySubtype::ZecConsensusBranchId,
        vec![],
        branch_id.to_le_bytes().to_vec(),
    )
    .insert_into(&mut psbt.proprietary);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zcash::NetworkUpgrade;
    use miniscript::bitcoin::absolute::LockTime;
    use miniscript::bitcoin::psbt::raw::Key;
    use miniscript::bitcoin::transaction::Version;
    use miniscript::bitcoin::Transaction;

    fn empty_psbt() -> Psbt {
        Psbt::from_unsigned_tx(Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![],
            output: vec![],
        })
        .unwrap()
    }

    #[test]
    fn test_find_kv_skips_foreign_and_unknown_keys() {
        let mut map = BTreeMap::new();
        BitGoKeyValue::new(ProprietaryKeySubtype::Musig2PubNonce, vec![1], vec![2])
            .insert_into(&mut map);
        map.insert(
            ProprietaryKey {
                prefix: b"OTHER".to_vec(),
                subtype: ProprietaryKeySubtype::Musig2PubNonce as u8,
                key: vec![3],
            },
            vec![4],
        );
        map.insert(
            ProprietaryKey {
                prefix: BITGO.to_vec(),
                subtype: 0x7f,
                key: vec![5],
            },
            vec![6],
        );
        let found: Vec<_> = find_kv(ProprietaryKeySubtype::Musig2PubNonce, &map).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, vec![1]);
        assert!(map.keys().filter(|k| is_musig2_key(k)).count() == 1);
    }

    #[test]
    fn test_branch_id_set_and_replace() {
        let mut psbt = empty_psbt();
        assert_eq!(get_zec_consensus_branch_id(&psbt), None);
        set_zec_consensus_branch_id(&mut psbt, NetworkUpgrade::Nu5.branch_id());
        assert_eq!(get_zec_consensus_branch_id(&psbt), Some(0xc2d6d0b4));
        set_zec_consensus_branch_id(&mut psbt, NetworkUpgrade::Sapling.branch_id());
        assert_eq!(get_zec_consensus_branch_id(&psbt), Some(0x76b809bb));
        assert_eq!(psbt.proprietary.len(), 1);
    }

    #[test]
    fn test_branch_id_from_unparsed_key() {
        let mut psbt = empty_psbt();
        psbt.unknown.insert(
            Key {
                type_value: 0xfc,
                key: UNPARSED_BRANCH_ID_KEY.to_vec(),
            },
            NetworkUpgrade::Nu6.branch_id().to_le_bytes().to_vec(),
        );
        assert_eq!(get_zec_consensus_branch_id(&psbt), Some(0xc8e71055));

        // the parsed map wins when both are present
        set_zec_consensus_branch_id(&mut psbt, NetworkUpgrade::Nu5.branch_id());
        assert_eq!(
            get_zec_consensus_branch_id(&psbt),
            Some(NetworkUpgrade::Nu5.branch_id())
        );
    }
}
