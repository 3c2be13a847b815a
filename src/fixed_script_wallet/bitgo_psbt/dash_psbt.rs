//! Dash PSBTs.
//!
//! Both the unsigned transaction and the `non_witness_utxo` of each input may
//! be DIP-2 special transactions, which the bitcoin PSBT parser rejects. They
//! are replaced by their bitcoin-compatible core on deserialization. The
//! special type and payload of the unsigned transaction and the original
//! previous-transaction bytes are kept so serialization is byte-exact.

use miniscript::bitcoin::psbt::Psbt;
use miniscript::bitcoin::{consensus, Transaction, Txid};

use super::raw_maps::RawPsbt;
use super::{DeserializeError, SerializeError};
use crate::dash::DashTransaction;
use crate::Network;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DashBitGoPsbt {
    pub psbt: Psbt,
    pub(crate) network: Network,
    pub tx_type: u16,
    pub extra_payload: Vec<u8>,
    /// Original `non_witness_utxo` bytes per input index.
    pub non_witness_utxo_bytes_by_input: Vec<Option<Vec<u8>>>,
}

impl DashBitGoPsbt {
    /// Wraps a new PSBT for a classic (type 0) transaction.
    pub fn new(unsigned_tx: Transaction, network: Network) -> Result<Self, DeserializeError> {
        let input_count = unsigned_tx.input.len();
        Ok(DashBitGoPsbt {
            psbt: Psbt::from_unsigned_tx(unsigned_tx)?,
            network,
            tx_type: 0,
            extra_payload: vec![],
            non_witness_utxo_bytes_by_input: vec![None; input_count],
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub(crate) fn dash_transaction(&self, transaction: &Transaction) -> DashTransaction {
        DashTransaction {
            transaction: transaction.clone(),
            tx_type: self.tx_type,
            extra_payload: self.extra_payload.clone(),
        }
    }

    pub fn deserialize(bytes: &[u8], network: Network) -> Result<Self, DeserializeError> {
        let mut raw = RawPsbt::parse(bytes)?;
        let tx_value = raw
            .unsigned_tx_mut()
            .ok_or_else(|| DeserializeError::Network("Missing unsigned transaction".to_string()))?;
        let unsigned = DashTransaction::decode(tx_value).map_err(DeserializeError::Network)?;
        *tx_value = consensus::serialize(&unsigned.transaction);

        let input_count = unsigned.transaction.input.len();
        let mut non_witness_utxo_bytes_by_input = vec![None; input_count];
        for (index, slot) in non_witness_utxo_bytes_by_input.iter_mut().enumerate() {
            if let Some(value) = raw.non_witness_utxo_mut(index) {
                let prev_tx = DashTransaction::decode(value).map_err(|e| {
                    DeserializeError::Network(format!("input {}: non_witness_utxo: {}", index, e))
                })?;
                *slot = Some(std::mem::replace(
                    value,
                    consensus::serialize(&prev_tx.transaction),
                ));
            }
        }

        let bitcoin_bytes = raw
            .serialize()
            .map_err(|e| DeserializeError::Network(e.to_string()))?;
        Ok(DashBitGoPsbt {
            psbt: Psbt::deserialize(&bitcoin_bytes)?,
            network,
            tx_type: unsigned.tx_type,
            extra_payload: unsigned.extra_payload,
            non_witness_utxo_bytes_by_input,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        let mut raw = RawPsbt::parse(&self.psbt.serialize())?;
        let tx_value = raw.unsigned_tx_mut().ok_or_else(|| {
            SerializeError::Network("Missing unsigned transaction".to_string())
        })?;
        *tx_value = self
            .dash_transaction(&self.psbt.unsigned_tx)
            .encode()
            .map_err(SerializeError::Network)?;

        for (index, original) in self.non_witness_utxo_bytes_by_input.iter().enumerate() {
            if let (Some(original), Some(value)) = (original, raw.non_witness_utxo_mut(index)) {
                value.clone_from(original);
            }
        }
        raw.serialize()
    }

    pub fn unsigned_txid(&self) -> Result<Txid, String> {
        self.dash_transaction(&self.psbt.unsigned_tx).txid()
    }

    /// Keeps the per-input byte table aligned after an input was appended.
    pub(crate) fn push_input_slot(&mut self, non_witness_utxo_bytes: Option<Vec<u8>>) {
        self.non_witness_utxo_bytes_by_input
            .push(non_witness_utxo_bytes);
    }

    pub fn into_psbt(self) -> Psbt {
        self.psbt
    }
}
