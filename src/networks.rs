//! Bitcoin-like networks supported by the wallet engine.
//!
//! Names follow the BitGo coin naming (`btc`, `tbtc`, `bch`, ...) with a
//! canonical CamelCase name used for display and parsing.
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Bitcoin,
    BitcoinTestnet3,
    BitcoinTestnet4,
    BitcoinPublicSignet,
    BitcoinBitGoSignet,

    BitcoinCash,
    BitcoinCashTestnet,

    Ecash,
    EcashTestnet,

    BitcoinGold,
    BitcoinGoldTestnet,

    BitcoinSV,
    BitcoinSVTestnet,

    Dash,
    DashTestnet,

    Dogecoin,
    DogecoinTestnet,

    Litecoin,
    LitecoinTestnet,

    Zcash,
    ZcashTestnet,
}

/// Raw transaction layout used by a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionFormat {
    /// version, inputs, outputs, locktime, optional segwit marker
    Standard,
    /// overwintered header with version group id and expiry height
    Zcash,
    /// 16-bit version plus a 16-bit special transaction type and payload
    Dash,
}

/// Which wallet output script families a network can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputScriptSupport {
    pub segwit: bool,
    pub taproot: bool,
}

impl OutputScriptSupport {
    pub fn assert_legacy(&self) -> Result<(), EngineError> {
        // every supported network can spend p2sh
        Ok(())
    }

    pub fn assert_segwit(&self) -> Result<(), EngineError> {
        if !self.segwit {
            return Err(EngineError::UnsupportedScriptType(
                "Network does not support segwit".to_string(),
            ));
        }
        Ok(())
    }

    pub fn assert_taproot(&self) -> Result<(), EngineError> {
        if !self.taproot {
            return Err(EngineError::UnsupportedScriptType(
                "Network does not support taproot".to_string(),
            ));
        }
        Ok(())
    }
}

impl Network {
    pub const ALL: &'static [Network] = &[
        Network::Bitcoin,
        Network::BitcoinTestnet3,
        Network::BitcoinTestnet4,
        Network::BitcoinPublicSignet,
        Network::BitcoinBitGoSignet,
        Network::BitcoinCash,
        Network::BitcoinCashTestnet,
        Network::Ecash,
        Network::EcashTestnet,
        Network::BitcoinGold,
        Network::BitcoinGoldTestnet,
        Network::BitcoinSV,
        Network::BitcoinSVTestnet,
        Network::Dash,
        Network::DashTestnet,
        Network::Dogecoin,
        Network::DogecoinTestnet,
        Network::Litecoin,
        Network::LitecoinTestnet,
        Network::Zcash,
        Network::ZcashTestnet,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Bitcoin => "Bitcoin",
            Network::BitcoinTestnet3 => "BitcoinTestnet3",
            Network::BitcoinTestnet4 => "BitcoinTestnet4",
            Network::BitcoinPublicSignet => "BitcoinPublicSignet",
            Network::BitcoinBitGoSignet => "BitcoinBitGoSignet",
            Network::BitcoinCash => "BitcoinCash",
            Network::BitcoinCashTestnet => "BitcoinCashTestnet",
            Network::Ecash => "Ecash",
            Network::EcashTestnet => "EcashTestnet",
            Network::BitcoinGold => "BitcoinGold",
            Network::BitcoinGoldTestnet => "BitcoinGoldTestnet",
            Network::BitcoinSV => "BitcoinSV",
            Network::BitcoinSVTestnet => "BitcoinSVTestnet",
            Network::Dash => "Dash",
            Network::DashTestnet => "DashTestnet",
            Network::Dogecoin => "Dogecoin",
            Network::DogecoinTestnet => "DogecoinTestnet",
            Network::Litecoin => "Litecoin",
            Network::LitecoinTestnet => "LitecoinTestnet",
            Network::Zcash => "Zcash",
            Network::ZcashTestnet => "ZcashTestnet",
        }
    }

    /// BitGo coin name (`btc`, `tltc`, ...).
    pub fn to_coin_name(&self) -> &'static str {
        match self {
            Network::Bitcoin => "btc",
            Network::BitcoinTestnet3 => "tbtc",
            Network::BitcoinTestnet4 => "tbtc4",
            Network::BitcoinPublicSignet => "tbtcsig",
            Network::BitcoinBitGoSignet => "tbtcbgsig",
            Network::BitcoinCash => "bch",
            Network::BitcoinCashTestnet => "tbch",
            Network::Ecash => "bcha",
            Network::EcashTestnet => "tbcha",
            Network::BitcoinGold => "btg",
            Network::BitcoinGoldTestnet => "tbtg",
            Network::BitcoinSV => "bsv",
            Network::BitcoinSVTestnet => "tbsv",
            Network::Dash => "dash",
            Network::DashTestnet => "tdash",
            Network::Dogecoin => "doge",
            Network::DogecoinTestnet => "tdoge",
            Network::Litecoin => "ltc",
            Network::LitecoinTestnet => "tltc",
            Network::Zcash => "zec",
            Network::ZcashTestnet => "tzec",
        }
    }

    pub fn from_name_exact(name: &str) -> Option<Network> {
        Network::ALL.iter().copied().find(|n| n.as_str() == name)
    }

    pub fn from_coin_name(name: &str) -> Option<Network> {
        Network::ALL.iter().copied().find(|n| n.to_coin_name() == name)
    }

    /// Accepts either the canonical name or the coin name.
    pub fn from_name_or_coin(name: &str) -> Result<Network, EngineError> {
        Network::from_name_exact(name)
            .or_else(|| Network::from_coin_name(name))
            .ok_or_else(|| EngineError::UnknownNetwork(name.to_string()))
    }

    pub fn mainnet(self) -> Network {
        match self {
            Network::Bitcoin
            | Network::BitcoinTestnet3
            | Network::BitcoinTestnet4
            | Network::BitcoinPublicSignet
            | Network::BitcoinBitGoSignet => Network::Bitcoin,
            Network::BitcoinCash | Network::BitcoinCashTestnet => Network::BitcoinCash,
            Network::Ecash | Network::EcashTestnet => Network::Ecash,
            Network::BitcoinGold | Network::BitcoinGoldTestnet => Network::BitcoinGold,
            Network::BitcoinSV | Network::BitcoinSVTestnet => Network::BitcoinSV,
            Network::Dash | Network::DashTestnet => Network::Dash,
            Network::Dogecoin | Network::DogecoinTestnet => Network::Dogecoin,
            Network::Litecoin | Network::LitecoinTestnet => Network::Litecoin,
            Network::Zcash | Network::ZcashTestnet => Network::Zcash,
        }
    }

    pub fn is_mainnet(self) -> bool {
        self == self.mainnet()
    }

    pub fn is_testnet(self) -> bool {
        !self.is_mainnet()
    }

    /// Key version bytes used for xpub/xprv and WIF encodings.
    pub fn network_kind(self) -> crate::bitcoin::NetworkKind {
        if self.is_mainnet() {
            crate::bitcoin::NetworkKind::Main
        } else {
            crate::bitcoin::NetworkKind::Test
        }
    }

    pub fn output_script_support(&self) -> OutputScriptSupport {
        let segwit = matches!(
            self.mainnet(),
            Network::Bitcoin | Network::Litecoin | Network::BitcoinGold
        );
        let taproot = self.mainnet() == Network::Bitcoin;
        OutputScriptSupport { segwit, taproot }
    }

    /// SIGHASH_FORKID value for networks that replay-protect with BIP143-style
    /// sighash on legacy inputs. `None` means the plain sighash algorithm.
    pub fn fork_id(&self) -> Option<u32> {
        match self.mainnet() {
            Network::BitcoinCash | Network::Ecash | Network::BitcoinSV => Some(0),
            Network::BitcoinGold => Some(79),
            _ => None,
        }
    }

    pub fn transaction_format(&self) -> TransactionFormat {
        match self.mainnet() {
            Network::Zcash => TransactionFormat::Zcash,
            Network::Dash => TransactionFormat::Dash,
            _ => TransactionFormat::Standard,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::from_name_exact(s).ok_or_else(|| format!("Unknown network: {}", s))
    }
}
