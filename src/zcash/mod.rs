//! Zcash network upgrades and consensus branch ids.
//!
//! The branch id commits a signature to a specific upgrade, so it has to be
//! known before a Zcash input can be signed. It is either given explicitly or
//! looked up from the block height the transaction is expected to confirm at.

pub mod transaction;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NetworkUpgrade {
    Overwinter,
    Sapling,
    Blossom,
    Heartwood,
    Canopy,
    Nu5,
    Nu6,
    Nu6_1,
}

struct UpgradeParams {
    upgrade: NetworkUpgrade,
    branch_id: u32,
    mainnet_height: u32,
    testnet_height: u32,
}

/// Activation schedule in chronological order (ZIP-200 and the per-upgrade ZIPs).
const UPGRADES: [UpgradeParams; 8] = [
    UpgradeParams {
        upgrade: NetworkUpgrade::Overwinter,
        branch_id: 0x5ba81b19,
        mainnet_height: 347_500,
        testnet_height: 207_500,
    },
    UpgradeParams {
        upgrade: NetworkUpgrade::Sapling,
        branch_id: 0x76b809bb,
        mainnet_height: 419_200,
        testnet_height: 280_000,
    },
    UpgradeParams {
        upgrade: NetworkUpgrade::Blossom,
        branch_id: 0x2bb40e60,
        mainnet_height: 653_600,
        testnet_height: 584_000,
    },
    UpgradeParams {
        upgrade: NetworkUpgrade::Heartwood,
        branch_id: 0xf5b9230b,
        mainnet_height: 903_000,
        testnet_height: 903_800,
    },
    UpgradeParams {
        upgrade: NetworkUpgrade::Canopy,
        branch_id: 0xe9ff75a6,
        mainnet_height: 1_046_400,
        testnet_height: 1_028_500,
    },
    UpgradeParams {
        upgrade: NetworkUpgrade::Nu5,
        branch_id: 0xc2d6d0b4,
        mainnet_height: 1_687_104,
        testnet_height: 1_842_420,
    },
    // ZIP-253
    UpgradeParams {
        upgrade: NetworkUpgrade::Nu6,
        branch_id: 0xc8e71055,
        mainnet_height: 2_726_400,
        testnet_height: 2_976_000,
    },
    // ZIP-254
    UpgradeParams {
        upgrade: NetworkUpgrade::Nu6_1,
        branch_id: 0x4dec4df0,
        mainnet_height: 3_146_400,
        testnet_height: 3_536_500,
    },
];

impl NetworkUpgrade {
    pub fn all() -> impl DoubleEndedIterator<Item = NetworkUpgrade> {
        UPGRADES.iter().map(|p| p.upgrade)
    }

    fn params(self) -> &'static UpgradeParams {
        // the table is indexed by declaration order
        &UPGRADES[self as usize]
    }

    pub fn branch_id(self) -> u32 {
        self.params().branch_id
    }

    pub fn activation_height(self, is_mainnet: bool) -> u32 {
        let params = self.params();
        if is_mainnet {
            params.mainnet_height
        } else {
            params.testnet_height
        }
    }

    pub fn from_branch_id(branch_id: u32) -> Option<NetworkUpgrade> {
        UPGRADES
            .iter()
            .find(|p| p.branch_id == branch_id)
            .map(|p| p.upgrade)
    }
}

/// Latest upgrade active at `height`. `None` before Overwinter.
pub fn network_upgrade_at_height(height: u32, is_mainnet: bool) -> Option<NetworkUpgrade> {
    NetworkUpgrade::all()
        .rev()
        .find(|upgrade| height >= upgrade.activation_height(is_mainnet))
}

pub fn branch_id_for_height(height: u32, is_mainnet: bool) -> Option<u32> {
    network_upgrade_at_height(height, is_mainnet).map(NetworkUpgrade::branch_id)
}

/// Where the consensus branch id of a Zcash PSBT comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusBranchId {
    Explicit(u32),
    /// Resolved against the activation schedule.
    BlockHeight(u32),
}

impl ConsensusBranchId {
    pub fn resolve(self, is_mainnet: bool) -> Result<u32, EngineError> {
        match self {
            ConsensusBranchId::Explicit(branch_id) => Ok(branch_id),
            ConsensusBranchId::BlockHeight(height) => branch_id_for_height(height, is_mainnet)
                .ok_or_else(|| {
                    EngineError::InvalidInput(format!(
                        "block height {} is before Overwinter activation ({})",
                        height,
                        NetworkUpgrade::Overwinter.activation_height(is_mainnet)
                    ))
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_schedule_is_ordered() {
        let upgrades: Vec<_> = NetworkUpgrade::all().collect();
        for pair in upgrades.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].activation_height(true) < pair[1].activation_height(true));
            assert!(pair[0].activation_height(false) < pair[1].activation_height(false));
        }
        for upgrade in upgrades {
            assert_eq!(NetworkUpgrade::from_branch_id(upgrade.branch_id()), Some(upgrade));
        }
    }

    #[rstest]
    #[case(347_499, true, None)]
    #[case(347_500, true, Some(NetworkUpgrade::Overwinter))]
    #[case(419_199, true, Some(NetworkUpgrade::Overwinter))]
    #[case(419_200, true, Some(NetworkUpgrade::Sapling))]
    #[case(1_687_104, true, Some(NetworkUpgrade::Nu5))]
    #[case(3_000_000, true, Some(NetworkUpgrade::Nu6))]
    #[case(u32::MAX, true, Some(NetworkUpgrade::Nu6_1))]
    #[case(207_499, false, None)]
    #[case(207_500, false, Some(NetworkUpgrade::Overwinter))]
    #[case(2_976_000, false, Some(NetworkUpgrade::Nu6))]
    fn test_upgrade_at_height(
        #[case] height: u32,
        #[case] is_mainnet: bool,
        #[case] expected: Option<NetworkUpgrade>,
    ) {
        assert_eq!(network_upgrade_at_height(height, is_mainnet), expected);
    }

    #[test]
    fn test_resolve_branch_id() {
        assert_eq!(
            ConsensusBranchId::BlockHeight(1_700_000).resolve(true).unwrap(),
            0xc2d6d0b4
        );
        assert_eq!(
            ConsensusBranchId::Explicit(0x76b809bb).resolve(true).unwrap(),
            0x76b809bb
        );
        let err = ConsensusBranchId::BlockHeight(100).resolve(false).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        assert!(err.to_string().contains("207500"));
    }
}
