/// Single-key scripts used by replay protection inputs.
/// The key is held by BitGo, there is no derivation path.
use crate::bitcoin::blockdata::opcodes::all::OP_CHECKSIG;
use crate::bitcoin::blockdata::script::{Builder, Instruction};
use crate::bitcoin::{CompressedPublicKey, Script, ScriptBuf};

/// `<pubkey> OP_CHECKSIG`
pub fn build_p2pk_script(key: CompressedPublicKey) -> ScriptBuf {
    Builder::default()
        .push_slice(key.to_bytes())
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// Inverse of [`build_p2pk_script`].
pub fn parse_p2pk_script(script: &Script) -> Option<CompressedPublicKey> {
    let mut instructions = script.instructions();
    let key = match instructions.next()? {
        Ok(Instruction::PushBytes(bytes)) => CompressedPublicKey::from_slice(bytes.as_bytes()).ok()?,
        _ => return None,
    };
    match (instructions.next(), instructions.next()) {
        (Some(Ok(Instruction::Op(op))), None) if op == OP_CHECKSIG => Some(key),
        _ => None,
    }
}

#[derive(Debug)]
pub struct ScriptP2shP2pk {
    pub redeem_script: ScriptBuf,
}

impl ScriptP2shP2pk {
    pub fn new(key: CompressedPublicKey) -> Self {
        ScriptP2shP2pk {
            redeem_script: build_p2pk_script(key),
        }
    }

    pub fn output_script(&self) -> ScriptBuf {
        self.redeem_script.to_p2sh()
    }
}
