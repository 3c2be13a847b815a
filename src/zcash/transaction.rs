//! Overwintered (v3/v4) Zcash transaction encoding.
//!
//! Layout: `header | version_group_id | inputs | outputs | lock_time |
//! expiry_height | sapling fields`. The header is the version with the
//! overwintered bit set. The shielded part is kept as opaque bytes.

use miniscript::bitcoin::absolute::LockTime;
use miniscript::bitcoin::consensus::{Decodable, Encodable};
use miniscript::bitcoin::hashes::{sha256d, Hash};
use miniscript::bitcoin::transaction::Version;
use miniscript::bitcoin::{Transaction, TxIn, TxOut, Txid};

pub const ZCASH_SAPLING_VERSION_GROUP_ID: u32 = 0x892F2085;
pub const ZCASH_SAPLING_VERSION: i32 = 4;

const OVERWINTERED_FLAG: u32 = 0x8000_0000;

/// Sapling tail of a transparent-only v4 transaction: zero value balance and
/// empty spend, output and joinsplit vectors.
pub const TRANSPARENT_SAPLING_FIELDS: [u8; 11] = [0; 11];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZcashTransaction {
    /// Version is stored without the overwintered flag.
    pub transaction: Transaction,
    pub version_group_id: u32,
    pub expiry_height: u32,
    pub sapling_fields: Vec<u8>,
}

fn decode_field<T: Decodable>(r: &mut &[u8], name: &str) -> Result<T, String> {
    T::consensus_decode(r).map_err(|e| format!("Failed to decode {}: {}", name, e))
}

fn encode_field<T: Encodable + ?Sized>(
    value: &T,
    out: &mut Vec<u8>,
    name: &str,
) -> Result<(), String> {
    value
        .consensus_encode(out)
        .map(|_| ())
        .map_err(|e| format!("Failed to encode {}: {}", name, e))
}

impl ZcashTransaction {
    /// Transparent sapling transaction around `transaction`.
    pub fn new_sapling(mut transaction: Transaction, expiry_height: u32) -> Self {
        transaction.version = Version::non_standard(ZCASH_SAPLING_VERSION);
        ZcashTransaction {
            transaction,
            version_group_id: ZCASH_SAPLING_VERSION_GROUP_ID,
            expiry_height,
            sapling_fields: TRANSPARENT_SAPLING_FIELDS.to_vec(),
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        let mut r = bytes;
        let header: u32 = decode_field(&mut r, "header")?;
        if header & OVERWINTERED_FLAG == 0 {
            return Err(format!(
                "Not an overwintered transaction (header 0x{:08x})",
                header
            ));
        }
        let version_group_id: u32 = decode_field(&mut r, "version_group_id")?;
        let input: Vec<TxIn> = decode_field(&mut r, "inputs")?;
        let output: Vec<TxOut> = decode_field(&mut r, "outputs")?;
        let lock_time: LockTime = decode_field(&mut r, "lock_time")?;
        let expiry_height: u32 = decode_field(&mut r, "expiry_height")?;
        Ok(ZcashTransaction {
            transaction: Transaction {
                version: Version::non_standard((header & !OVERWINTERED_FLAG) as i32),
                input,
                output,
                lock_time,
            },
            version_group_id,
            expiry_height,
            sapling_fields: r.to_vec(),
        })
    }

    /// Encodes `transaction` in place of the stored one, keeping the Zcash fields.
    pub fn encode_with(&self, transaction: &Transaction) -> Result<Vec<u8>, String> {
        let version = u32::try_from(transaction.version.0)
            .map_err(|_| format!("Invalid tx version: {}", transaction.version.0))?;
        let mut out = vec![];
        encode_field(&(version | OVERWINTERED_FLAG), &mut out, "header")?;
        encode_field(&self.version_group_id, &mut out, "version_group_id")?;
        encode_field(&transaction.input, &mut out, "inputs")?;
        encode_field(&transaction.output, &mut out, "outputs")?;
        encode_field(&transaction.lock_time, &mut out, "lock_time")?;
        encode_field(&self.expiry_height, &mut out, "expiry_height")?;
        out.extend_from_slice(&self.sapling_fields);
        Ok(out)
    }

    pub fn encode(&self) -> Result<Vec<u8>, String> {
        self.encode_with(&self.transaction)
    }

    /// Double sha256 over the full encoding (pre-v5 txid rule).
    pub fn txid(&self) -> Result<Txid, String> {
        let bytes = self.encode()?;
        Ok(Txid::from_raw_hash(sha256d::Hash::hash(&bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miniscript::bitcoin::{Amount, OutPoint, ScriptBuf, Sequence, Witness};

    fn sample_tx() -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(50_000),
                script_pubkey: ScriptBuf::from_hex("76a914000000000000000000000000000000000000000088ac")
                    .unwrap(),
            }],
        }
    }

    #[test]
    fn test_sapling_header() {
        let tx = ZcashTransaction::new_sapling(sample_tx(), 1_000);
        let bytes = tx.encode().unwrap();
        // 0x80000004 little endian, then the sapling group id
        assert_eq!(hex::encode(&bytes[..8]), "0400008085202f89");
        assert!(bytes.ends_with(&TRANSPARENT_SAPLING_FIELDS));

        let decoded = ZcashTransaction::decode(&bytes).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.transaction.version.0, 4);
        assert_eq!(decoded.expiry_height, 1_000);
    }

    #[test]
    fn test_opaque_tail_is_kept() {
        let mut tx = ZcashTransaction::new_sapling(sample_tx(), 0);
        tx.sapling_fields = vec![0xaa; 37];
        let bytes = tx.encode().unwrap();
        assert_eq!(ZcashTransaction::decode(&bytes).unwrap().sapling_fields, vec![0xaa; 37]);
        assert_ne!(tx.txid().unwrap(), sample_tx().compute_txid());
    }

    #[test]
    fn test_rejects_plain_transaction() {
        let bytes = miniscript::bitcoin::consensus::serialize(&sample_tx());
        assert!(ZcashTransaction::decode(&bytes)
            .unwrap_err()
            .contains("overwintered"));
    }
}
