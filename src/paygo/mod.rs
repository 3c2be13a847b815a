//! PayGo address attestations.
//!
//! An attestation proves that an output address was authorized by a signing
//! service. It travels in the output map as a BitGo proprietary key-value:
//! the key data is 64 bytes of entropy and the value is a BIP-137 message
//! signature over `entropy ‖ address ‖ NIL_UUID`.

mod attestation;
mod psbt;
mod verify;

pub use attestation::PayGoAttestation;
pub use psbt::{add_paygo_attestation, extract_paygo_attestation, has_paygo_attestation_verify};
pub use verify::{sign_paygo_attestation, verify_paygo_signature};

pub const NIL_UUID: &str = "00000000-0000-0000-0000-000000000000";

pub const ENTROPY_LENGTH: usize = 64;
