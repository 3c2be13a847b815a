//! Signed transactions in the encoding of their network.

use miniscript::bitcoin::consensus::{deserialize, serialize};
use miniscript::bitcoin::{Transaction, Txid};

use crate::dash::DashTransaction;
use crate::error::EngineError;
use crate::networks::TransactionFormat;
use crate::zcash::transaction::ZcashTransaction;
use crate::Network;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainTransaction {
    Standard(Transaction),
    Zcash(ZcashTransaction),
    Dash(DashTransaction),
}

impl ChainTransaction {
    pub fn decode(bytes: &[u8], network: Network) -> Result<Self, EngineError> {
        let decoded = match network.transaction_format() {
            TransactionFormat::Standard => ChainTransaction::Standard(
                deserialize(bytes).map_err(|e| EngineError::InvalidInput(e.to_string()))?,
            ),
            TransactionFormat::Zcash => ChainTransaction::Zcash(
                ZcashTransaction::decode(bytes).map_err(EngineError::InvalidInput)?,
            ),
            TransactionFormat::Dash => ChainTransaction::Dash(
                DashTransaction::decode(bytes).map_err(EngineError::InvalidInput)?,
            ),
        };
        Ok(decoded)
    }

    pub fn encode(&self) -> Result<Vec<u8>, EngineError> {
        match self {
            ChainTransaction::Standard(transaction) => Ok(serialize(transaction)),
            ChainTransaction::Zcash(transaction) => {
                transaction.encode().map_err(EngineError::Transaction)
            }
            ChainTransaction::Dash(transaction) => {
                transaction.encode().map_err(EngineError::Transaction)
            }
        }
    }

    pub fn txid(&self) -> Result<Txid, EngineError> {
        match self {
            ChainTransaction::Standard(transaction) => Ok(transaction.compute_txid()),
            ChainTransaction::Zcash(transaction) => {
                transaction.txid().map_err(EngineError::Transaction)
            }
            ChainTransaction::Dash(transaction) => {
                transaction.txid().map_err(EngineError::Transaction)
            }
        }
    }

    /// Inputs, outputs and lock time, without the network-specific fields.
    pub fn transaction(&self) -> &Transaction {
        match self {
            ChainTransaction::Standard(transaction) => transaction,
            ChainTransaction::Zcash(transaction) => &transaction.transaction,
            ChainTransaction::Dash(transaction) => &transaction.transaction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miniscript::bitcoin::absolute::LockTime;
    use miniscript::bitcoin::transaction::Version;
    use miniscript::bitcoin::{Amount, OutPoint, ScriptBuf, TxIn, TxOut};
    use rstest::rstest;

    fn sample_tx() -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                ..Default::default()
            }],
            output: vec![TxOut {
                value: Amount::from_sat(10_000),
                script_pubkey: ScriptBuf::from_hex("0014000000000000000000000000000000000000000a")
                    .unwrap(),
            }],
        }
    }

    #[rstest]
    #[case(Network::Bitcoin)]
    #[case(Network::Litecoin)]
    #[case(Network::Zcash)]
    #[case(Network::Dash)]
    fn test_decode_encode(#[case] network: Network) {
        let transaction = match network.transaction_format() {
            TransactionFormat::Standard => ChainTransaction::Standard(sample_tx()),
            TransactionFormat::Zcash => {
                ChainTransaction::Zcash(ZcashTransaction::new_sapling(sample_tx(), 2_000_100))
            }
            TransactionFormat::Dash => ChainTransaction::Dash(DashTransaction {
                transaction: sample_tx(),
                tx_type: 1,
                extra_payload: vec![0xaa; 20],
            }),
        };
        let bytes = transaction.encode().unwrap();
        let decoded = ChainTransaction::decode(&bytes, network).unwrap();
        assert_eq!(decoded, transaction);
        assert_eq!(decoded.txid().unwrap(), transaction.txid().unwrap());
        assert_eq!(decoded.transaction().output, sample_tx().output);
    }

    #[test]
    fn test_standard_txid_matches_bitcoin() {
        let transaction = ChainTransaction::Standard(sample_tx());
        assert_eq!(transaction.txid().unwrap(), sample_tx().compute_txid());
    }

    #[test]
    fn test_decode_rejects_wrong_format() {
        let standard = serialize(&sample_tx());
        assert!(matches!(
            ChainTransaction::decode(&standard, Network::Zcash),
            Err(EngineError::InvalidInput(_))
        ));
        assert!(ChainTransaction::decode(&[0x01, 0x02], Network::Bitcoin).is_err());
    }
}
