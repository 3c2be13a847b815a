/// This module contains code for the BitGo Fixed Script Wallets.
/// These are not based on descriptors.
pub mod bitgo_psbt;
pub mod replay_protection;
pub mod wallet_keys;
pub mod wallet_scripts;

pub use replay_protection::*;
pub use wallet_keys::*;
pub use wallet_scripts::*;
