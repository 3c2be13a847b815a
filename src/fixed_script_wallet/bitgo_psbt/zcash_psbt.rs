//! Zcash PSBTs.
//!
//! The global unsigned transaction is an overwintered Zcash transaction. It is
//! swapped for its bitcoin-compatible core while the PSBT is held in memory
//! and swapped back on serialization.

use miniscript::bitcoin::psbt::Psbt;
use miniscript::bitcoin::{consensus, Transaction, Txid};

use super::propkv::{get_zec_consensus_branch_id, set_zec_consensus_branch_id};
use super::raw_maps::RawPsbt;
use super::{DeserializeError, SerializeError};
use crate::zcash::transaction::ZcashTransaction;
use crate::Network;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZcashBitGoPsbt {
    pub psbt: Psbt,
    pub(crate) network: Network,
    pub version_group_id: u32,
    pub expiry_height: u32,
    /// Shielded tail of the transaction, kept verbatim.
    pub sapling_fields: Vec<u8>,
}

impl ZcashBitGoPsbt {
    /// Wraps a new PSBT for a transparent sapling transaction.
    pub fn new(
        unsigned_tx: Transaction,
        network: Network,
        branch_id: u32,
        expiry_height: u32,
    ) -> Result<Self, DeserializeError> {
        let zcash_tx = ZcashTransaction::new_sapling(unsigned_tx, expiry_height);
        let mut psbt = Psbt::from_unsigned_tx(zcash_tx.transaction)?;
        set_zec_consensus_branch_id(&mut psbt, branch_id);
        Ok(ZcashBitGoPsbt {
            psbt,
            network,
            version_group_id: zcash_tx.version_group_id,
            expiry_height: zcash_tx.expiry_height,
            sapling_fields: zcash_tx.sapling_fields,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn consensus_branch_id(&self) -> Option<u32> {
        get_zec_consensus_branch_id(&self.psbt)
    }

    pub(crate) fn zcash_transaction(&self, transaction: &Transaction) -> ZcashTransaction {
        ZcashTransaction {
            transaction: transaction.clone(),
            version_group_id: self.version_group_id,
            expiry_height: self.expiry_height,
            sapling_fields: self.sapling_fields.clone(),
        }
    }

    pub fn deserialize(bytes: &[u8], network: Network) -> Result<Self, DeserializeError> {
        let mut raw = RawPsbt::parse(bytes)?;
        let tx_value = raw
            .unsigned_tx_mut()
            .ok_or_else(|| DeserializeError::Network("Missing unsigned transaction".to_string()))?;
        let zcash_tx = ZcashTransaction::decode(tx_value).map_err(DeserializeError::Network)?;
        *tx_value = consensus::serialize(&zcash_tx.transaction);

        let bitcoin_bytes = raw
            .serialize()
            .map_err(|e| DeserializeError::Network(e.to_string()))?;
        let psbt = Psbt::deserialize(&bitcoin_bytes)?;
        if get_zec_consensus_branch_id(&psbt).is_none() {
            return Err(DeserializeError::Network(
                "Missing ZecConsensusBranchId in PSBT proprietary map".to_string(),
            ));
        }

        Ok(ZcashBitGoPsbt {
            psbt,
            network,
            version_group_id: zcash_tx.version_group_id,
            expiry_height: zcash_tx.expiry_height,
            sapling_fields: zcash_tx.sapling_fields,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>, SerializeError> {
        let mut raw = RawPsbt::parse(&self.psbt.serialize())?;
        let tx_value = raw.unsigned_tx_mut().ok_or_else(|| {
            SerializeError::Network("Missing unsigned transaction".to_string())
        })?;
        *tx_value = self
            .zcash_transaction(&self.psbt.unsigned_tx)
            .encode()
            .map_err(SerializeError::Network)?;
        raw.serialize()
    }

    /// Txid of the unsigned transaction in Zcash encoding.
    pub fn unsigned_txid(&self) -> Result<Txid, String> {
        self.zcash_transaction(&self.psbt.unsigned_tx).txid()
    }

    pub fn into_psbt(self) -> Psbt {
        self.psbt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zcash::transaction::ZCASH_SAPLING_VERSION_GROUP_ID;
    use crate::zcash::NetworkUpgrade;
    use miniscript::bitcoin::absolute::LockTime;
    use miniscript::bitcoin::transaction::Version;
    use miniscript::bitcoin::{Amount, OutPoint, ScriptBuf, TxIn, TxOut};

    fn unsigned_tx() -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::null(),
                ..Default::default()
            }],
            output: vec![TxOut {
                value: Amount::from_sat(10_000),
                script_pubkey: ScriptBuf::new(),
            }],
        }
    }

    #[test]
    fn test_serialize_carries_zcash_transaction() {
        let psbt = ZcashBitGoPsbt::new(
            unsigned_tx(),
            Network::ZcashTestnet,
            NetworkUpgrade::Nu5.branch_id(),
            2_000_000,
        )
        .unwrap();
        let bytes = psbt.serialize().unwrap();
        // a plain bitcoin parser cannot read the overwintered transaction
        assert!(Psbt::deserialize(&bytes).is_err());

        let decoded = ZcashBitGoPsbt::deserialize(&bytes, Network::ZcashTestnet).unwrap();
        assert_eq!(decoded, psbt);
        assert_eq!(decoded.version_group_id, ZCASH_SAPLING_VERSION_GROUP_ID);
        assert_eq!(decoded.expiry_height, 2_000_000);
        assert_eq!(decoded.consensus_branch_id(), Some(0xc2d6d0b4));
        assert_eq!(decoded.serialize().unwrap(), bytes);
        assert_eq!(decoded.unsigned_txid().unwrap(), psbt.unsigned_txid().unwrap());
    }

    #[test]
    fn test_missing_branch_id_is_rejected() {
        let mut psbt =
            ZcashBitGoPsbt::new(unsigned_tx(), Network::Zcash, 0x76b809bb, 0).unwrap();
        psbt.psbt.proprietary.clear();
        let bytes = psbt.serialize().unwrap();
        let err = ZcashBitGoPsbt::deserialize(&bytes, Network::Zcash).unwrap_err();
        assert!(err.to_string().contains("ZecConsensusBranchId"));
    }
}
