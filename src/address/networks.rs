//! Per-network address codec selection.

use super::{
    from_output_script, to_output_script_try_codecs, AddressCodec, AddressError, Base58CheckCodec,
    Bech32Codec, CashAddrCodec, Result, ScriptBuf, BITCOIN, BITCOIN_BECH32, BITCOIN_CASH_CASHADDR,
    BITCOIN_CASH_TESTNET_CASHADDR, BITCOIN_GOLD, BITCOIN_GOLD_BECH32,
    BITCOIN_GOLD_TESTNET_BECH32, DASH, DASH_TEST, DOGECOIN, DOGECOIN_TEST, ECASH_CASHADDR,
    ECASH_TEST_CASHADDR, LITECOIN, LITECOIN_BECH32, LITECOIN_TEST, LITECOIN_TEST_BECH32, TESTNET,
    TESTNET_BECH32, ZCASH, ZCASH_TEST,
};
use crate::bitcoin::Script;
use crate::networks::Network;

/// The address grammars a network understands.
struct NetworkCodecs {
    base58: &'static Base58CheckCodec,
    bech32: Option<&'static Bech32Codec>,
    cashaddr: Option<&'static CashAddrCodec>,
}

const fn codecs(
    base58: &'static Base58CheckCodec,
    bech32: Option<&'static Bech32Codec>,
    cashaddr: Option<&'static CashAddrCodec>,
) -> NetworkCodecs {
    NetworkCodecs {
        base58,
        bech32,
        cashaddr,
    }
}

fn network_codecs(network: Network) -> NetworkCodecs {
    match network {
        Network::Bitcoin => codecs(&BITCOIN, Some(&BITCOIN_BECH32), None),
        Network::BitcoinTestnet3
        | Network::BitcoinTestnet4
        | Network::BitcoinPublicSignet
        | Network::BitcoinBitGoSignet => codecs(&TESTNET, Some(&TESTNET_BECH32), None),
        Network::BitcoinCash => codecs(&BITCOIN, None, Some(&BITCOIN_CASH_CASHADDR)),
        Network::BitcoinCashTestnet => codecs(&TESTNET, None, Some(&BITCOIN_CASH_TESTNET_CASHADDR)),
        Network::Ecash => codecs(&BITCOIN, None, Some(&ECASH_CASHADDR)),
        Network::EcashTestnet => codecs(&TESTNET, None, Some(&ECASH_TEST_CASHADDR)),
        Network::BitcoinGold => codecs(&BITCOIN_GOLD, Some(&BITCOIN_GOLD_BECH32), None),
        Network::BitcoinGoldTestnet => codecs(&TESTNET, Some(&BITCOIN_GOLD_TESTNET_BECH32), None),
        Network::BitcoinSV => codecs(&BITCOIN, None, None),
        Network::BitcoinSVTestnet => codecs(&TESTNET, None, None),
        Network::Dash => codecs(&DASH, None, None),
        Network::DashTestnet => codecs(&DASH_TEST, None, None),
        Network::Dogecoin => codecs(&DOGECOIN, None, None),
        Network::DogecoinTestnet => codecs(&DOGECOIN_TEST, None, None),
        Network::Litecoin => codecs(&LITECOIN, Some(&LITECOIN_BECH32), None),
        Network::LitecoinTestnet => codecs(&LITECOIN_TEST, Some(&LITECOIN_TEST_BECH32), None),
        Network::Zcash => codecs(&ZCASH, None, None),
        Network::ZcashTestnet => codecs(&ZCASH_TEST, None, None),
    }
}

/// Address encoding selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFormat {
    /// Base58Check or Bech32 depending on the script. For Bitcoin Cash and
    /// eCash this is Base58Check.
    #[default]
    Default,
    /// CashAddr, only valid on Bitcoin Cash and eCash.
    Cashaddr,
}

impl AddressFormat {
    pub fn from_optional_str(s: Option<&str>) -> Result<Self> {
        match s {
            None | Some("") | Some("default") => Ok(Self::Default),
            Some("cashaddr") => Ok(Self::Cashaddr),
            Some(other) => Err(AddressError::InvalidAddress(format!(
                "Unknown address format: {}. Valid formats are: 'default', 'cashaddr'",
                other
            ))),
        }
    }
}

fn get_decode_codecs(network: Network) -> Vec<&'static dyn AddressCodec> {
    let NetworkCodecs {
        base58,
        bech32,
        cashaddr,
    } = network_codecs(network);
    let mut result: Vec<&'static dyn AddressCodec> = vec![base58];
    if let Some(codec) = bech32 {
        result.push(codec);
    }
    if let Some(codec) = cashaddr {
        result.push(codec);
    }
    result
}

fn get_encode_codec(
    network: Network,
    script: &Script,
    format: AddressFormat,
) -> Result<&'static dyn AddressCodec> {
    let is_witness = script.is_p2wpkh() || script.is_p2wsh() || script.is_p2tr();
    let is_legacy = script.is_p2pkh() || script.is_p2sh();
    if !is_witness && !is_legacy {
        return Err(AddressError::UnsupportedScriptType(
            "Script is not a standard address type (P2PKH, P2SH, P2WPKH, P2WSH, P2TR)".to_string(),
        ));
    }

    let codecs = network_codecs(network);
    if format == AddressFormat::Cashaddr {
        return match codecs.cashaddr {
            Some(codec) => Ok(codec),
            None => Err(AddressError::UnsupportedScriptType(format!(
                "Cashaddr format is only supported for Bitcoin Cash and eCash networks, not for {:?}",
                network
            ))),
        };
    }

    if is_witness {
        codecs.bech32.map(|c| c as &'static dyn AddressCodec).ok_or_else(|| {
            AddressError::UnsupportedScriptType(format!(
                "{} has no witness address encoding",
                network
            ))
        })
    } else {
        Ok(codecs.base58)
    }
}

/// Tries every grammar the network accepts.
pub fn to_output_script_with_network(address: &str, network: Network) -> Result<ScriptBuf> {
    to_output_script_try_codecs(address, &get_decode_codecs(network))
}

pub fn from_output_script_with_network(script: &Script, network: Network) -> Result<String> {
    from_output_script_with_network_and_format(script, network, AddressFormat::Default)
}

pub fn from_output_script_with_network_and_format(
    script: &Script,
    network: Network,
    format: AddressFormat,
) -> Result<String> {
    from_output_script(script, get_encode_codec(network, script, format)?)
}

fn network_for_coin(coin: &str) -> Result<Network> {
    Network::from_coin_name(coin)
        .ok_or_else(|| AddressError::InvalidAddress(format!("Unknown coin: {}", coin)))
}

pub fn to_output_script_with_coin(address: &str, coin: &str) -> Result<ScriptBuf> {
    to_output_script_with_network(address, network_for_coin(coin)?)
}

pub fn from_output_script_with_coin(script: &Script, coin: &str) -> Result<String> {
    from_output_script_with_network(script, network_for_coin(coin)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const P2PKH: &str = "76a914f5bf48b397dae70be82b3cca4793f8eb2b6cdac988ac";

    #[rstest]
    #[case(Network::BitcoinCash, AddressFormat::Default, "1PQPheJQSauxRPTxzNMUco1XmoCyPoEJCp")]
    #[case(
        Network::BitcoinCash,
        AddressFormat::Cashaddr,
        "bitcoincash:qr6m7j9njldwwzlg9v7v53unlr4jkmx6eylep8ekg2"
    )]
    #[case(Network::Bitcoin, AddressFormat::Default, "1PQPheJQSauxRPTxzNMUco1XmoCyPoEJCp")]
    fn test_encode_with_format(
        #[case] network: Network,
        #[case] format: AddressFormat,
        #[case] expected: &str,
    ) {
        let script = ScriptBuf::from_hex(P2PKH).unwrap();
        let address = from_output_script_with_network_and_format(&script, network, format).unwrap();
        assert_eq!(address, expected);
        // both grammars decode back on the cash networks
        assert_eq!(to_output_script_with_network(&address, network).unwrap(), script);
    }

    #[test]
    fn test_cashaddr_rejected_outside_cash_networks() {
        let script = ScriptBuf::from_hex(P2PKH).unwrap();
        let err = from_output_script_with_network_and_format(
            &script,
            Network::Litecoin,
            AddressFormat::Cashaddr,
        )
        .unwrap_err();
        assert!(err.to_string().contains("only supported for Bitcoin Cash and eCash"));
    }

    #[test]
    fn test_witness_script_on_legacy_only_network() {
        let script = ScriptBuf::from_hex("0014751e76e8199196d454941c45d1b3a323f1433bd6").unwrap();
        assert!(from_output_script_with_network(&script, Network::Dogecoin).is_err());
        assert_eq!(
            from_output_script_with_coin(&script, "ltc").unwrap(),
            "ltc1qw508d6qejxtdg4y5r3zarvary0c5xw7kgmn4n9"
        );
    }

    #[test]
    fn test_address_format_parsing() {
        assert_eq!(AddressFormat::from_optional_str(None).unwrap(), AddressFormat::Default);
        assert_eq!(
            AddressFormat::from_optional_str(Some("cashaddr")).unwrap(),
            AddressFormat::Cashaddr
        );
        assert!(AddressFormat::from_optional_str(Some("base32")).is_err());
    }

    #[test]
    fn test_unknown_coin() {
        assert!(to_output_script_with_coin("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", "xyz").is_err());
        assert!(to_output_script_with_coin("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", "bsv").is_ok());
    }
}
