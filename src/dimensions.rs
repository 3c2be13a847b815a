//! Weight estimates for fee calculation.
//!
//! ECDSA signatures vary in length, so every estimate is a range. Schnorr
//! signatures are always 64 bytes.

use miniscript::bitcoin::{VarInt, Weight};

use crate::fixed_script_wallet::bitgo_psbt::{InputScriptType, ParsedInput};
use crate::fixed_script_wallet::{Chain, OutputScriptType, SignPath};

// DER encoding plus sighash byte
const ECDSA_SIG_MIN: usize = 71;
const ECDSA_SIG_MAX: usize = 73;

const SCHNORR_SIG: usize = 64;

const OP_SIZE: usize = 1;
const SCHNORR_PUBKEY_SIZE: usize = 32;
/// 2-of-3 multisig over compressed keys.
const P2MS_SCRIPT_SIZE: usize = 105;
const P2WSH_SCRIPT_SIZE: usize = 34;
const P2PK_SCRIPT_SIZE: usize = 35;

/// outpoint(36) + sequence(4)
const TXIN_BASE_SIZE: usize = 40;

// version(4) + locktime(4) + input count(1) + output count(1)
const TX_OVERHEAD_SIZE: usize = 10;
/// Marker and flag are witness data.
const SEGWIT_MARKER_WEIGHT: usize = 2;

fn var_slice_size(length: usize) -> usize {
    VarInt::from(length).size() + length
}

fn witness_size(element_lengths: &[usize]) -> usize {
    VarInt::from(element_lengths.len()).size()
        + element_lengths
            .iter()
            .map(|&len| var_slice_size(len))
            .sum::<usize>()
}

fn input_weight(script_sig_components: &[usize], witness_components: &[usize]) -> usize {
    let script_sig_length: usize = script_sig_components.iter().sum();
    let base_size = TXIN_BASE_SIZE + var_slice_size(script_sig_length);
    let witness = if witness_components.is_empty() {
        0
    } else {
        witness_size(witness_components)
    };
    4 * base_size + witness
}

fn output_weight(script_length: usize) -> usize {
    4 * (8 + var_slice_size(script_length))
}

fn p2sh_multisig(sig: usize) -> usize {
    input_weight(
        &[
            OP_SIZE,
            OP_SIZE + sig,
            OP_SIZE + sig,
            // OP_PUSHDATA1 <len> <script>
            OP_SIZE + 1 + P2MS_SCRIPT_SIZE,
        ],
        &[],
    )
}

fn p2sh_p2wsh_multisig(sig: usize) -> usize {
    input_weight(&[OP_SIZE + P2WSH_SCRIPT_SIZE], &[0, sig, sig, P2MS_SCRIPT_SIZE])
}

fn p2wsh_multisig(sig: usize) -> usize {
    input_weight(&[], &[0, sig, sig, P2MS_SCRIPT_SIZE])
}

fn p2sh_p2pk(sig: usize) -> usize {
    input_weight(&[OP_SIZE + sig, OP_SIZE + P2PK_SCRIPT_SIZE], &[])
}

/// Two Schnorr signatures, a checksigverify leaf and a control block at
/// `depth` in the tap tree.
fn p2tr_script_path(depth: usize) -> usize {
    let leaf_script = 2 * (OP_SIZE + SCHNORR_PUBKEY_SIZE) + 2 * OP_SIZE;
    let control_block = 1 + 32 + 32 * depth;
    input_weight(&[], &[SCHNORR_SIG, SCHNORR_SIG, leaf_script, control_block])
}

fn p2tr_key_path() -> usize {
    input_weight(&[], &[SCHNORR_SIG])
}

/// Weight range of a transaction or of a part of one.
///
/// `plus` is associative and commutative, so inputs and outputs can be
/// added in any order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dimensions {
    input_weight_min: usize,
    input_weight_max: usize,
    output_weight: usize,
    has_segwit: bool,
}

impl Dimensions {
    pub fn empty() -> Self {
        Self::default()
    }

    fn input(min: usize, max: usize, has_segwit: bool) -> Self {
        Dimensions {
            input_weight_min: min,
            input_weight_max: max,
            output_weight: 0,
            has_segwit,
        }
    }

    /// A single input of the given type, as spent by the default sign path.
    pub fn from_input_script_type(script_type: InputScriptType) -> Self {
        match script_type {
            InputScriptType::P2sh => {
                Self::input(p2sh_multisig(ECDSA_SIG_MIN), p2sh_multisig(ECDSA_SIG_MAX), false)
            }
            InputScriptType::P2shP2wsh => Self::input(
                p2sh_p2wsh_multisig(ECDSA_SIG_MIN),
                p2sh_p2wsh_multisig(ECDSA_SIG_MAX),
                true,
            ),
            InputScriptType::P2wsh => {
                Self::input(p2wsh_multisig(ECDSA_SIG_MIN), p2wsh_multisig(ECDSA_SIG_MAX), true)
            }
            InputScriptType::P2shP2pk => {
                Self::input(p2sh_p2pk(ECDSA_SIG_MIN), p2sh_p2pk(ECDSA_SIG_MAX), false)
            }
            InputScriptType::P2trLegacy | InputScriptType::P2trMusig2ScriptPath => {
                let weight = p2tr_script_path(1);
                Self::input(weight, weight, true)
            }
            InputScriptType::P2trMusig2KeyPath => {
                let weight = p2tr_key_path();
                Self::input(weight, weight, true)
            }
        }
    }

    /// A wallet input on `chain` spent with `sign_path`.
    ///
    /// Taproot leaves that involve the backup key sit deeper in the legacy
    /// tree, and the backup key never signs the MuSig2 key path.
    pub fn from_wallet_input(chain: Chain, sign_path: SignPath) -> Self {
        let uses_backup = sign_path.signer.is_backup() || sign_path.cosigner.is_backup();
        match chain.script_type {
            OutputScriptType::P2sh => Self::from_input_script_type(InputScriptType::P2sh),
            OutputScriptType::P2shP2wsh => Self::from_input_script_type(InputScriptType::P2shP2wsh),
            OutputScriptType::P2wsh => Self::from_input_script_type(InputScriptType::P2wsh),
            OutputScriptType::P2trLegacy => {
                let weight = p2tr_script_path(if uses_backup { 2 } else { 1 });
                Self::input(weight, weight, true)
            }
            OutputScriptType::P2trMusig2 if uses_backup => {
                Self::from_input_script_type(InputScriptType::P2trMusig2ScriptPath)
            }
            OutputScriptType::P2trMusig2 => {
                Self::from_input_script_type(InputScriptType::P2trMusig2KeyPath)
            }
        }
    }

    /// An input spending a descriptor output, from the descriptor's maximum
    /// satisfaction weight.
    pub fn from_descriptor_input(max_satisfaction_weight: Weight, is_segwit: bool) -> Self {
        let weight = 4 * TXIN_BASE_SIZE + max_satisfaction_weight.to_wu() as usize;
        Self::input(weight, weight, is_segwit)
    }

    pub fn from_parsed_inputs(inputs: &[ParsedInput]) -> Self {
        inputs
            .iter()
            .map(|input| Self::from_input_script_type(input.script_type))
            .fold(Self::empty(), |acc, dimensions| acc.plus(&dimensions))
    }

    pub fn from_output_script_length(script_length: usize) -> Self {
        Dimensions {
            output_weight: output_weight(script_length),
            ..Self::empty()
        }
    }

    pub fn from_output_scripts(script_lengths: impl IntoIterator<Item = usize>) -> Self {
        script_lengths
            .into_iter()
            .map(Self::from_output_script_length)
            .fold(Self::empty(), |acc, dimensions| acc.plus(&dimensions))
    }

    pub fn plus(&self, other: &Dimensions) -> Dimensions {
        Dimensions {
            input_weight_min: self.input_weight_min + other.input_weight_min,
            input_weight_max: self.input_weight_max + other.input_weight_max,
            output_weight: self.output_weight + other.output_weight,
            has_segwit: self.has_segwit || other.has_segwit,
        }
    }

    pub fn times(&self, n: usize) -> Dimensions {
        Dimensions {
            input_weight_min: self.input_weight_min * n,
            input_weight_max: self.input_weight_max * n,
            output_weight: self.output_weight * n,
            has_segwit: self.has_segwit && n > 0,
        }
    }

    pub fn has_segwit(&self) -> bool {
        self.has_segwit
    }

    fn overhead_weight(&self) -> usize {
        if self.input_weight_max == 0 && self.output_weight == 0 {
            return 0;
        }
        // non-segwit inputs of a segwit transaction add one empty witness
        // each, which the ECDSA margin of the upper bound absorbs
        if self.has_segwit {
            4 * TX_OVERHEAD_SIZE + SEGWIT_MARKER_WEIGHT
        } else {
            4 * TX_OVERHEAD_SIZE
        }
    }

    pub fn weight_min(&self) -> Weight {
        Weight::from_wu((self.overhead_weight() + self.input_weight_min + self.output_weight) as u64)
    }

    pub fn weight_max(&self) -> Weight {
        Weight::from_wu((self.overhead_weight() + self.input_weight_max + self.output_weight) as u64)
    }

    pub fn vsize_min(&self) -> u32 {
        self.weight_min().to_vbytes_ceil() as u32
    }

    pub fn vsize_max(&self) -> u32 {
        self.weight_max().to_vbytes_ceil() as u32
    }

    pub fn input_weight_max(&self) -> Weight {
        Weight::from_wu(self.input_weight_max as u64)
    }

    pub fn output_weight(&self) -> Weight {
        Weight::from_wu(self.output_weight as u64)
    }
}
