//! Byte-level view of a serialized PSBT.
//!
//! Zcash and Dash transactions cannot be decoded by the bitcoin PSBT parser, so
//! the transaction values have to be swapped before and after parsing. The
//! PSBT is split into its raw key-value maps without interpreting anything but
//! the framing.

use miniscript::bitcoin::consensus::{Decodable, Encodable};
use miniscript::bitcoin::VarInt;

use super::{DeserializeError, SerializeError};

const MAGIC: &[u8; 5] = b"psbt\xff";

/// Key of the unsigned transaction in the global map and of the
/// `non_witness_utxo` in an input map.
pub(crate) const TX_KEY: &[u8] = &[0x00];

pub(crate) type RawPair = (Vec<u8>, Vec<u8>);

#[derive(Debug, Clone)]
pub(crate) struct RawPsbt {
    pub global: Vec<RawPair>,
    /// Input maps followed by output maps.
    pub maps: Vec<Vec<RawPair>>,
}

fn read_bytes(r: &mut &[u8], what: &str) -> Result<Vec<u8>, DeserializeError> {
    let len: VarInt = Decodable::consensus_decode(r)?;
    let len = len.0 as usize;
    if r.len() < len {
        return Err(DeserializeError::Network(format!(
            "{} length {} exceeds remaining {} bytes",
            what,
            len,
            r.len()
        )));
    }
    let (bytes, rest) = r.split_at(len);
    *r = rest;
    Ok(bytes.to_vec())
}

/// Reads pairs until the `0x00` separator.
fn read_map(r: &mut &[u8]) -> Result<Vec<RawPair>, DeserializeError> {
    let mut pairs = vec![];
    loop {
        let key = read_bytes(r, "key")?;
        if key.is_empty() {
            return Ok(pairs);
        }
        let value = read_bytes(r, "value")?;
        pairs.push((key, value));
    }
}

fn write_map(out: &mut Vec<u8>, pairs: &[RawPair]) -> Result<(), SerializeError> {
    for (key, value) in pairs {
        VarInt(key.len() as u64).consensus_encode(out)?;
        out.extend_from_slice(key);
        VarInt(value.len() as u64).consensus_encode(out)?;
        out.extend_from_slice(value);
    }
    out.push(0x00);
    Ok(())
}

fn find_value<'a>(pairs: &'a mut [RawPair], key: &[u8]) -> Option<&'a mut Vec<u8>> {
    pairs
        .iter_mut()
        .find(|(k, _)| k.as_slice() == key)
        .map(|(_, v)| v)
}

impl RawPsbt {
    pub fn parse(bytes: &[u8]) -> Result<RawPsbt, DeserializeError> {
        let mut r = bytes
            .strip_prefix(&MAGIC[..])
            .ok_or_else(|| DeserializeError::Network("Invalid PSBT magic".to_string()))?;
        let global = read_map(&mut r)?;
        let mut maps = vec![];
        while !r.is_empty() {
            maps.push(read_map(&mut r)?);
        }
        Ok(RawPsbt { global, maps })
    }

    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        let mut out = MAGIC.to_vec();
        write_map(&mut out, &self.global)?;
        for map in &self.maps {
            write_map(&mut out, map)?;
        }
        Ok(out)
    }

    pub fn unsigned_tx_mut(&mut self) -> Option<&mut Vec<u8>> {
        find_value(&mut self.global, TX_KEY)
    }

    /// `non_witness_utxo` of input `index`. `None` if absent.
    pub fn non_witness_utxo_mut(&mut self, index: usize) -> Option<&mut Vec<u8>> {
        self.maps
            .get_mut(index)
            .and_then(|map| find_value(map, TX_KEY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miniscript::bitcoin::absolute::LockTime;
    use miniscript::bitcoin::psbt::Psbt;
    use miniscript::bitcoin::transaction::Version;
    use miniscript::bitcoin::{Amount, OutPoint, ScriptBuf, Transaction, TxIn, TxOut};

    fn sample_psbt() -> Psbt {
        let tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                ..Default::default()
            }],
            output: vec![TxOut {
                value: Amount::from_sat(1000),
                script_pubkey: ScriptBuf::new(),
            }],
        };
        let mut psbt = Psbt::from_unsigned_tx(tx.clone()).unwrap();
        psbt.inputs[0].non_witness_utxo = Some(tx);
        psbt
    }

    #[test]
    fn test_reserializes_identically() {
        let bytes = sample_psbt().serialize();
        let raw = RawPsbt::parse(&bytes).unwrap();
        // one input map, one output map
        assert_eq!(raw.maps.len(), 2);
        assert_eq!(raw.serialize().unwrap(), bytes);
    }

    #[test]
    fn test_finds_transaction_values() {
        let psbt = sample_psbt();
        let mut raw = RawPsbt::parse(&psbt.serialize()).unwrap();
        let unsigned_tx = raw.unsigned_tx_mut().unwrap().clone();
        assert_eq!(
            unsigned_tx,
            miniscript::bitcoin::consensus::serialize(&psbt.unsigned_tx)
        );
        assert!(raw.non_witness_utxo_mut(0).is_some());
        assert!(raw.non_witness_utxo_mut(1).is_none());
        assert!(raw.non_witness_utxo_mut(5).is_none());
    }

    #[test]
    fn test_rejects_bad_magic() {
        assert!(RawPsbt::parse(b"psbx\xff\x00").is_err());
        let mut truncated = sample_psbt().serialize();
        truncated.truncate(12);
        assert!(RawPsbt::parse(&truncated).is_err());
    }
}
