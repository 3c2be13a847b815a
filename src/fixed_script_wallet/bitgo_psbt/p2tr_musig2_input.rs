//! MuSig2 data of `p2trMusig2` key-path inputs.
//!
//! Participants, public nonces and partial signatures travel in BitGo
//! proprietary key-values of the input map:
//!
//! | subtype | key | value |
//! |---|---|---|
//! | participants | `tapOutputKey ‖ tapInternalKey` | `userPub ‖ bitgoPub` |
//! | public nonce | `participantPub ‖ tapOutputKey` | 66-byte nonce |
//! | partial sig | `participantPub ‖ tapOutputKey` | 32 bytes (33 with sighash byte) |

use miniscript::bitcoin::hashes::Hash;
use miniscript::bitcoin::key::UntweakedPublicKey;
use miniscript::bitcoin::psbt::{Input, Psbt};
use miniscript::bitcoin::sighash::{Prevouts, SighashCache, TapSighashType};
use miniscript::bitcoin::taproot::{self, TapNodeHash};
use miniscript::bitcoin::{CompressedPublicKey, TxOut};
use musig2::secp::Point;
use musig2::{AggNonce, BinaryEncoding, KeyAggContext, LiftedSignature, PartialSignature, PubNonce};

use super::propkv::{find_kv, BitGoKeyValue, ProprietaryKeySubtype};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Musig2Error {
    MissingParticipants,
    InvalidKeydataLength { expected: usize, got: usize },
    InvalidValueLength { expected: String, got: usize },
    /// A key or nonce did not parse.
    InvalidEncoding(String),
    DuplicateParticipantKeys,
    TooManyKeyValues { expected: usize, got: usize },
    /// Participant key is not one of the two keys of the input.
    UnknownParticipant(String),
    MissingNonces { got: usize },
    MissingPartialSignatures { got: usize },
    TapOutputKeyMismatch { expected: String, got: String },
    Sighash(String),
    SignatureAggregation(String),
}

impl std::fmt::Display for Musig2Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Musig2Error::MissingParticipants => write!(f, "Missing MuSig2 participants"),
            Musig2Error::InvalidKeydataLength { expected, got } => {
                write!(f, "Invalid keydata length: expected {}, got {}", expected, got)
            }
            Musig2Error::InvalidValueLength { expected, got } => {
                write!(f, "Invalid value length: expected {}, got {}", expected, got)
            }
            Musig2Error::InvalidEncoding(msg) => write!(f, "Invalid encoding: {}", msg),
            Musig2Error::DuplicateParticipantKeys => {
                write!(f, "Duplicate participant public keys found")
            }
            Musig2Error::TooManyKeyValues { expected, got } => write!(
                f,
                "Too many key-values: expected up to {}, got {}",
                expected, got
            ),
            Musig2Error::UnknownParticipant(key) => {
                write!(f, "{} is not a participant of this input", key)
            }
            Musig2Error::MissingNonces { got } => {
                write!(f, "Two public nonces are required, got {}", got)
            }
            Musig2Error::MissingPartialSignatures { got } => {
                write!(f, "Two partial signatures are required, got {}", got)
            }
            Musig2Error::TapOutputKeyMismatch { expected, got } => write!(
                f,
                "Tap output key mismatch: expected {}, got {}",
                expected, got
            ),
            Musig2Error::Sighash(msg) => write!(f, "Failed to compute sighash: {}", msg),
            Musig2Error::SignatureAggregation(msg) => {
                write!(f, "Signature aggregation error: {}", msg)
            }
        }
    }
}

impl std::error::Error for Musig2Error {}

fn parse_compressed(bytes: &[u8]) -> Result<CompressedPublicKey, Musig2Error> {
    CompressedPublicKey::from_slice(bytes)
        .map_err(|e| Musig2Error::InvalidEncoding(format!("compressed public key: {}", e)))
}

fn parse_xonly(bytes: &[u8]) -> Result<UntweakedPublicKey, Musig2Error> {
    UntweakedPublicKey::from_slice(bytes)
        .map_err(|e| Musig2Error::InvalidEncoding(format!("x-only public key: {}", e)))
}

fn participant_key(participant: &CompressedPublicKey, tap_output_key: &UntweakedPublicKey) -> Vec<u8> {
    let mut key = Vec::with_capacity(65);
    key.extend_from_slice(&participant.to_bytes());
    key.extend_from_slice(&tap_output_key.serialize());
    key
}

/// Splits `participantPub ‖ tapOutputKey`.
fn parse_participant_key(
    key: &[u8],
) -> Result<(CompressedPublicKey, UntweakedPublicKey), Musig2Error> {
    if key.len() != 65 {
        return Err(Musig2Error::InvalidKeydataLength {
            expected: 65,
            got: key.len(),
        });
    }
    Ok((parse_compressed(&key[..33])?, parse_xonly(&key[33..])?))
}

pub(crate) fn to_point(key: &CompressedPublicKey) -> Result<Point, Musig2Error> {
    Point::try_from(&key.to_bytes()[..])
        .map_err(|e| Musig2Error::InvalidEncoding(format!("public key: {}", e)))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Musig2Participants {
    pub tap_output_key: UntweakedPublicKey,
    pub tap_internal_key: UntweakedPublicKey,
    /// `[user, bitgo]`
    pub participant_pub_keys: [CompressedPublicKey; 2],
}

impl Musig2Participants {
    pub fn to_key_value(&self) -> BitGoKeyValue {
        let mut key = Vec::with_capacity(64);
        key.extend_from_slice(&self.tap_output_key.serialize());
        key.extend_from_slice(&self.tap_internal_key.serialize());
        let mut value = Vec::with_capacity(66);
        value.extend_from_slice(&self.participant_pub_keys[0].to_bytes());
        value.extend_from_slice(&self.participant_pub_keys[1].to_bytes());
        BitGoKeyValue::new(ProprietaryKeySubtype::Musig2ParticipantPubKeys, key, value)
    }

    pub fn from_key_value(kv: &BitGoKeyValue) -> Result<Self, Musig2Error> {
        if kv.key.len() != 64 {
            return Err(Musig2Error::InvalidKeydataLength {
                expected: 64,
                got: kv.key.len(),
            });
        }
        if kv.value.len() != 66 {
            return Err(Musig2Error::InvalidValueLength {
                expected: "66".to_string(),
                got: kv.value.len(),
            });
        }
        let first = parse_compressed(&kv.value[..33])?;
        let second = parse_compressed(&kv.value[33..])?;
        if first == second {
            return Err(Musig2Error::DuplicateParticipantKeys);
        }
        Ok(Self {
            tap_output_key: parse_xonly(&kv.key[..32])?,
            tap_internal_key: parse_xonly(&kv.key[32..])?,
            participant_pub_keys: [first, second],
        })
    }

    /// Position of `key` in the participant list.
    pub fn index_of(&self, key: &CompressedPublicKey) -> Result<usize, Musig2Error> {
        self.participant_pub_keys
            .iter()
            .position(|k| k == key)
            .ok_or_else(|| Musig2Error::UnknownParticipant(key.to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct Musig2PubNonce {
    pub participant_pub_key: CompressedPublicKey,
    pub tap_output_key: UntweakedPublicKey,
    pub pub_nonce: PubNonce,
}

impl PartialEq for Musig2PubNonce {
    fn eq(&self, other: &Self) -> bool {
        self.participant_pub_key == other.participant_pub_key
            && self.tap_output_key == other.tap_output_key
            && self.pub_nonce.serialize() == other.pub_nonce.serialize()
    }
}

impl Eq for Musig2PubNonce {}

impl Musig2PubNonce {
    pub fn to_key_value(&self) -> BitGoKeyValue {
        BitGoKeyValue::new(
            ProprietaryKeySubtype::Musig2PubNonce,
            participant_key(&self.participant_pub_key, &self.tap_output_key),
            self.pub_nonce.serialize().to_vec(),
        )
    }

    pub fn from_key_value(kv: &BitGoKeyValue) -> Result<Self, Musig2Error> {
        let (participant_pub_key, tap_output_key) = parse_participant_key(&kv.key)?;
        if kv.value.len() != 66 {
            return Err(Musig2Error::InvalidValueLength {
                expected: "66".to_string(),
                got: kv.value.len(),
            });
        }
        let pub_nonce = PubNonce::try_from(&kv.value[..])
            .map_err(|e| Musig2Error::InvalidEncoding(format!("public nonce: {}", e)))?;
        Ok(Self {
            participant_pub_key,
            tap_output_key,
            pub_nonce,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Musig2PartialSig {
    pub participant_pub_key: CompressedPublicKey,
    pub tap_output_key: UntweakedPublicKey,
    /// 32 bytes, or 33 with a trailing sighash byte.
    pub partial_sig: Vec<u8>,
}

impl Musig2PartialSig {
    pub fn to_key_value(&self) -> BitGoKeyValue {
        BitGoKeyValue::new(
            ProprietaryKeySubtype::Musig2PartialSig,
            participant_key(&self.participant_pub_key, &self.tap_output_key),
            self.partial_sig.clone(),
        )
    }

    pub fn from_key_value(kv: &BitGoKeyValue) -> Result<Self, Musig2Error> {
        let (participant_pub_key, tap_output_key) = parse_participant_key(&kv.key)?;
        if kv.value.len() != 32 && kv.value.len() != 33 {
            return Err(Musig2Error::InvalidValueLength {
                expected: "32 or 33".to_string(),
                got: kv.value.len(),
            });
        }
        Ok(Self {
            participant_pub_key,
            tap_output_key,
            partial_sig: kv.value.clone(),
        })
    }

    /// The 32-byte signature without a sighash byte.
    pub fn normalized_signature(&self) -> Result<PartialSignature, Musig2Error> {
        let bytes = self.partial_sig.get(..32).ok_or(Musig2Error::InvalidValueLength {
            expected: "32 or 33".to_string(),
            got: self.partial_sig.len(),
        })?;
        PartialSignature::try_from(bytes)
            .map_err(|e| Musig2Error::InvalidEncoding(format!("partial signature: {}", e)))
    }
}

fn parse_at_most<T>(
    input: &Input,
    subtype: ProprietaryKeySubtype,
    max: usize,
    parse: fn(&BitGoKeyValue) -> Result<T, Musig2Error>,
) -> Result<Vec<T>, Musig2Error> {
    let kvs: Vec<BitGoKeyValue> = find_kv(subtype, &input.proprietary).collect();
    if kvs.len() > max {
        return Err(Musig2Error::TooManyKeyValues {
            expected: max,
            got: kvs.len(),
        });
    }
    kvs.iter().map(parse).collect()
}

pub fn parse_musig2_participants(input: &Input) -> Result<Option<Musig2Participants>, Musig2Error> {
    Ok(parse_at_most(
        input,
        ProprietaryKeySubtype::Musig2ParticipantPubKeys,
        1,
        Musig2Participants::from_key_value,
    )?
    .pop())
}

pub fn parse_musig2_nonces(input: &Input) -> Result<Vec<Musig2PubNonce>, Musig2Error> {
    parse_at_most(
        input,
        ProprietaryKeySubtype::Musig2PubNonce,
        2,
        Musig2PubNonce::from_key_value,
    )
}

pub fn parse_musig2_partial_sigs(input: &Input) -> Result<Vec<Musig2PartialSig>, Musig2Error> {
    parse_at_most(
        input,
        ProprietaryKeySubtype::Musig2PartialSig,
        2,
        Musig2PartialSig::from_key_value,
    )
}

/// Spent outputs of all inputs, from `witness_utxo` or `non_witness_utxo`.
pub(crate) fn collect_prevouts(psbt: &Psbt) -> Result<Vec<TxOut>, Musig2Error> {
    psbt.inputs
        .iter()
        .zip(psbt.unsigned_tx.input.iter())
        .enumerate()
        .map(|(i, (input, txin))| {
            if let Some(witness_utxo) = &input.witness_utxo {
                return Ok(witness_utxo.clone());
            }
            input
                .non_witness_utxo
                .as_ref()
                .and_then(|tx| tx.output.get(txin.previous_output.vout as usize))
                .cloned()
                .ok_or_else(|| Musig2Error::Sighash(format!("missing UTXO data for input {}", i)))
        })
        .collect()
}

/// BIP341 key-spend sighash with `SIGHASH_DEFAULT`.
pub fn key_spend_sighash(psbt: &Psbt, input_index: usize) -> Result<[u8; 32], Musig2Error> {
    let prevouts = collect_prevouts(psbt)?;
    let mut cache = SighashCache::new(&psbt.unsigned_tx);
    let sighash = cache
        .taproot_key_spend_signature_hash(
            input_index,
            &Prevouts::All(&prevouts),
            TapSighashType::Default,
        )
        .map_err(|e| Musig2Error::Sighash(e.to_string()))?;
    Ok(sighash.to_byte_array())
}

/// Merkle root of the input, all zeros when the input has none.
pub(crate) fn tap_merkle_root(input: &Input) -> TapNodeHash {
    input
        .tap_merkle_root
        .unwrap_or_else(|| TapNodeHash::from_byte_array([0u8; 32]))
}

#[derive(Debug, Clone)]
pub struct Musig2Input {
    pub participants: Musig2Participants,
    pub nonces: Vec<Musig2PubNonce>,
    pub partial_sigs: Vec<Musig2PartialSig>,
    pub tap_merkle_root: TapNodeHash,
}

impl Musig2Input {
    pub fn is_musig2_input(input: &Input) -> bool {
        [
            ProprietaryKeySubtype::Musig2ParticipantPubKeys,
            ProprietaryKeySubtype::Musig2PubNonce,
            ProprietaryKeySubtype::Musig2PartialSig,
        ]
        .into_iter()
        .any(|subtype| find_kv(subtype, &input.proprietary).next().is_some())
    }

    pub fn from_input(input: &Input) -> Result<Self, Musig2Error> {
        let participants =
            parse_musig2_participants(input)?.ok_or(Musig2Error::MissingParticipants)?;
        Ok(Self {
            participants,
            nonces: parse_musig2_nonces(input)?,
            partial_sigs: parse_musig2_partial_sigs(input)?,
            tap_merkle_root: tap_merkle_root(input),
        })
    }

    /// Tweaked key aggregation context, checked against the stored output key.
    pub fn key_agg_context(&self) -> Result<KeyAggContext, Musig2Error> {
        let points = self
            .participants
            .participant_pub_keys
            .iter()
            .map(to_point)
            .collect::<Result<Vec<_>, _>>()?;
        let ctx = KeyAggContext::new(points)
            .map_err(|e| Musig2Error::SignatureAggregation(e.to_string()))?
            .with_taproot_tweak(&self.tap_merkle_root.to_byte_array())
            .map_err(|e| Musig2Error::SignatureAggregation(e.to_string()))?;

        let computed: Point = ctx.aggregated_pubkey();
        let computed = computed.serialize_xonly();
        let stored = self.participants.tap_output_key.serialize();
        if computed != stored {
            return Err(Musig2Error::TapOutputKeyMismatch {
                expected: hex::encode(stored),
                got: hex::encode(computed),
            });
        }
        Ok(ctx)
    }

    pub fn nonce_of(&self, participant: &CompressedPublicKey) -> Option<&Musig2PubNonce> {
        self.nonces
            .iter()
            .find(|n| &n.participant_pub_key == participant)
    }

    pub fn partial_sig_of(&self, participant: &CompressedPublicKey) -> Option<&Musig2PartialSig> {
        self.partial_sigs
            .iter()
            .find(|s| &s.participant_pub_key == participant)
    }

    /// Sum of both participants' nonces.
    pub fn aggregate_nonce(&self) -> Result<AggNonce, Musig2Error> {
        let nonces = self
            .participants
            .participant_pub_keys
            .iter()
            .map(|key| self.nonce_of(key).map(|n| n.pub_nonce.clone()))
            .collect::<Option<Vec<_>>>()
            .ok_or(Musig2Error::MissingNonces {
                got: self.nonces.len(),
            })?;
        Ok(AggNonce::sum(&nonces))
    }

    /// Checks the partial signature of `participant` over `message`.
    /// `Ok(false)` if the participant has not signed yet.
    pub fn verify_partial_signature(
        &self,
        participant: &CompressedPublicKey,
        message: [u8; 32],
    ) -> Result<bool, Musig2Error> {
        self.participants.index_of(participant)?;
        let partial_sig = match self.partial_sig_of(participant) {
            Some(sig) => sig.normalized_signature()?,
            None => return Ok(false),
        };
        let nonce = self
            .nonce_of(participant)
            .ok_or(Musig2Error::MissingNonces {
                got: self.nonces.len(),
            })?;
        let ctx = self.key_agg_context()?;
        let agg_nonce = self.aggregate_nonce()?;
        Ok(musig2::verify_partial(
            &ctx,
            partial_sig,
            &agg_nonce,
            to_point(participant)?,
            &nonce.pub_nonce,
            message,
        )
        .is_ok())
    }

    /// Aggregates both partial signatures into a BIP340 key-path signature.
    pub fn aggregate_signature(&self, message: [u8; 32]) -> Result<taproot::Signature, Musig2Error> {
        if self.partial_sigs.len() < 2 {
            return Err(Musig2Error::MissingPartialSignatures {
                got: self.partial_sigs.len(),
            });
        }
        let ctx = self.key_agg_context()?;
        let agg_nonce = self.aggregate_nonce()?;
        let partial_sigs = self
            .participants
            .participant_pub_keys
            .iter()
            .map(|key| {
                self.partial_sig_of(key)
                    .ok_or(Musig2Error::MissingPartialSignatures {
                        got: self.partial_sigs.len(),
                    })
                    .and_then(Musig2PartialSig::normalized_signature)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let signature: LiftedSignature =
            musig2::aggregate_partial_signatures(&ctx, &agg_nonce, partial_sigs, message)
                .map_err(|e| Musig2Error::SignatureAggregation(e.to_string()))?;
        taproot::Signature::from_slice(&signature.to_bytes())
            .map_err(|e| Musig2Error::SignatureAggregation(e.to_string()))
    }
}

pub fn set_musig2_participants(input: &mut Input, participants: &Musig2Participants) {
    participants.to_key_value().insert_into(&mut input.proprietary);
}

pub fn set_musig2_nonce(input: &mut Input, nonce: &Musig2PubNonce) {
    nonce.to_key_value().insert_into(&mut input.proprietary);
}

pub fn set_musig2_partial_sig(input: &mut Input, sig: &Musig2PartialSig) {
    sig.to_key_value().insert_into(&mut input.proprietary);
}
