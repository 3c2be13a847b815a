//! Dash transaction format.
pub mod transaction;

pub use transaction::DashTransaction;
