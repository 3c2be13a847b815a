use crate::bitcoin::blockdata::opcodes::all::{OP_CHECKMULTISIG, OP_PUSHNUM_2, OP_PUSHNUM_3};
use crate::bitcoin::blockdata::script::{Builder, Instruction};
use crate::bitcoin::{CompressedPublicKey, Script, ScriptBuf};
use crate::fixed_script_wallet::wallet_keys::PubTriple;

/// `OP_2 <user> <backup> <bitgo> OP_3 OP_CHECKMULTISIG`.
///
/// Keys keep the wallet order, they are not sorted.
pub fn build_multisig_script_2_of_3(keys: &PubTriple) -> ScriptBuf {
    keys.iter()
        .fold(Builder::new().push_opcode(OP_PUSHNUM_2), |builder, key| {
            builder.push_slice(key.to_bytes())
        })
        .push_opcode(OP_PUSHNUM_3)
        .push_opcode(OP_CHECKMULTISIG)
        .into_script()
}

pub fn parse_multisig_script_2_of_3(script: &Script) -> Result<PubTriple, String> {
    let instructions = script
        .instructions()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("Failed to parse script instructions: {}", e))?;

    let [quorum, k0, k1, k2, total, checkmultisig] = instructions.as_slice() else {
        return Err(format!(
            "Invalid multisig script length: expected 6 instructions, got {}",
            instructions.len()
        ));
    };
    if *quorum != Instruction::Op(OP_PUSHNUM_2) {
        return Err("First instruction should be OP_2".to_string());
    }
    if *total != Instruction::Op(OP_PUSHNUM_3) {
        return Err("Fifth instruction should be OP_3".to_string());
    }
    if *checkmultisig != Instruction::Op(OP_CHECKMULTISIG) {
        return Err("Last instruction should be OP_CHECKMULTISIG".to_string());
    }

    let parse_key = |position: usize, instruction: &Instruction| match instruction {
        Instruction::PushBytes(bytes) => CompressedPublicKey::from_slice(bytes.as_bytes())
            .map_err(|e| {
                format!(
                    "Failed to parse compressed public key at position {}: {}",
                    position, e
                )
            }),
        _ => Err(format!(
            "Instruction at position {} should be a push bytes instruction",
            position
        )),
    };
    Ok([parse_key(1, k0)?, parse_key(2, k1)?, parse_key(3, k2)?])
}

/// Chains 0 and 1.
#[derive(Debug)]
pub struct ScriptP2sh {
    pub redeem_script: ScriptBuf,
}

/// Chains 10 and 11. The redeem script is the P2WSH program of the witness script.
#[derive(Debug)]
pub struct ScriptP2shP2wsh {
    pub redeem_script: ScriptBuf,
    pub witness_script: ScriptBuf,
}

/// Chains 20 and 21.
#[derive(Debug)]
pub struct ScriptP2wsh {
    pub witness_script: ScriptBuf,
}
