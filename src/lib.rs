pub mod address;
pub mod config;
pub mod dash;
pub mod descriptor;
pub mod dimensions;
pub mod engine;
mod error;
pub mod fixed_script_wallet;
pub mod keys;
mod networks;
pub mod paygo;
pub mod transaction;
pub mod zcash;

// re-export bitcoin from the miniscript crate so callers use the same types
pub use ::miniscript::bitcoin;

pub use address::{
    from_output_script_with_coin, from_output_script_with_network, to_output_script_with_coin,
    to_output_script_with_network, AddressFormat,
};

pub use config::EngineConfig;
pub use descriptor::WalletDescriptor;
pub use dimensions::Dimensions;
pub use engine::{Musig2Session, Musig2SessionState, PsbtState, WalletEngine, WalletPsbt};
pub use error::{EngineError, Result};
pub use keys::Key;
pub use networks::{Network, TransactionFormat};
pub use transaction::ChainTransaction;
