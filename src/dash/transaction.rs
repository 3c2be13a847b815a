//! Dash special transactions (DIP-2).
//!
//! The version field holds the base version in its low 16 bits and the
//! special transaction type in the high 16 bits. A non-zero type appends a
//! length-prefixed payload after `lock_time`. Payloads are not interpreted.

use miniscript::bitcoin::absolute::LockTime;
use miniscript::bitcoin::consensus::{Decodable, Encodable};
use miniscript::bitcoin::hashes::{sha256d, Hash};
use miniscript::bitcoin::transaction::Version;
use miniscript::bitcoin::{Transaction, TxIn, TxOut, Txid, VarInt};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashTransaction {
    /// Version holds only the base version.
    pub transaction: Transaction,
    /// 0 for classic transactions.
    pub tx_type: u16,
    pub extra_payload: Vec<u8>,
}

fn decode_err(name: &'static str) -> impl Fn(miniscript::bitcoin::consensus::encode::Error) -> String {
    move |e| format!("Failed to decode {}: {}", name, e)
}

fn encode_err(name: &'static str) -> impl Fn(miniscript::bitcoin::io::Error) -> String {
    move |e| format!("Failed to encode {}: {}", name, e)
}

impl DashTransaction {
    pub fn classic(transaction: Transaction) -> Self {
        DashTransaction {
            transaction,
            tx_type: 0,
            extra_payload: vec![],
        }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        let mut r = bytes;
        let version = u32::consensus_decode(&mut r).map_err(decode_err("version"))?;
        let input = Vec::<TxIn>::consensus_decode(&mut r).map_err(decode_err("inputs"))?;
        let output = Vec::<TxOut>::consensus_decode(&mut r).map_err(decode_err("outputs"))?;
        let lock_time = LockTime::consensus_decode(&mut r).map_err(decode_err("lock_time"))?;

        let tx_type = (version >> 16) as u16;
        let extra_payload = if tx_type != 0 {
            let len = VarInt::consensus_decode(&mut r).map_err(decode_err("payload size"))?;
            let len = len.0 as usize;
            if r.len() < len {
                return Err(format!(
                    "Payload size {} exceeds remaining {} bytes",
                    len,
                    r.len()
                ));
            }
            let (payload, rest) = r.split_at(len);
            r = rest;
            payload.to_vec()
        } else {
            vec![]
        };
        if !r.is_empty() {
            return Err(format!("{} trailing bytes after Dash transaction", r.len()));
        }

        Ok(DashTransaction {
            transaction: Transaction {
                version: Version::non_standard((version & 0xFFFF) as i32),
                input,
                output,
                lock_time,
            },
            tx_type,
            extra_payload,
        })
    }

    /// Encodes `transaction` with this type and payload.
    pub fn encode_with(&self, transaction: &Transaction) -> Result<Vec<u8>, String> {
        let base = u16::try_from(transaction.version.0)
            .map_err(|_| format!("Invalid base version: {}", transaction.version.0))?;
        if self.tx_type == 0 && !self.extra_payload.is_empty() {
            return Err("Classic transaction must not carry a payload".to_string());
        }
        let version = u32::from(base) | (u32::from(self.tx_type) << 16);

        let mut out = vec![];
        version.consensus_encode(&mut out).map_err(encode_err("version"))?;
        transaction.input.consensus_encode(&mut out).map_err(encode_err("inputs"))?;
        transaction.output.consensus_encode(&mut out).map_err(encode_err("outputs"))?;
        transaction.lock_time.consensus_encode(&mut out).map_err(encode_err("lock_time"))?;
        if self.tx_type != 0 {
            VarInt(self.extra_payload.len() as u64)
                .consensus_encode(&mut out)
                .map_err(encode_err("payload size"))?;
            out.extend_from_slice(&self.extra_payload);
        }
        Ok(out)
    }

    pub fn encode(&self) -> Result<Vec<u8>, String> {
        self.encode_with(&self.transaction)
    }

    pub fn txid(&self) -> Result<Txid, String> {
        Ok(Txid::from_raw_hash(sha256d::Hash::hash(&self.encode()?)))
    }
}
