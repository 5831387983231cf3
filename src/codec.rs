//! # Codec
//!
//! Binary (de)serialization of a [Container] as defined by
//! [bip-0174](https://github.com/bitcoin/bips/blob/master/bip-0174.mediawiki#specification),
//! and its base64 text form.
//!
//! The heavy lifting is done by rust-bitcoin. Before handing the bytes over we walk the
//! key-value framing once, so that a truncation is told apart from a value too short for its
//! type, and so that hybrid public keys are refused instead of being silently normalized.

use crate::{container::Container, error::*};

use miniscript::bitcoin::{
    consensus::encode::{self, Decodable, Encodable},
    hashes::hex::ToHex,
    util::psbt::{self, raw, PartiallySignedTransaction as Psbt},
    Transaction, TxIn, TxOut,
};

use std::{fmt, str};

#[cfg(feature = "use-serde")]
use serde::{
    de::{self, Deserialize, Deserializer},
    ser::{Serialize, Serializer},
};

/// `psbt` followed by the `0xff` separator.
pub const MAGIC: [u8; 5] = [0x70, 0x73, 0x62, 0x74, 0xff];

const PSBT_GLOBAL_UNSIGNED_TX: u8 = 0x00;
const PSBT_IN_PARTIAL_SIG: u8 = 0x02;
const PSBT_IN_BIP32_DERIVATION: u8 = 0x06;
const PSBT_OUT_BIP32_DERIVATION: u8 = 0x02;

/// Get the BIP174-serialized container.
pub fn encode(container: &Container) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    container
        .psbt()
        .consensus_encode(&mut buf)
        .expect("Container serialization cannot fail");
    buf
}

/// Get the base64 text form of the BIP174-serialized container.
pub fn encode_base64(container: &Container) -> String {
    base64::encode(encode(container))
}

// Read pairs until the separator.
fn read_map(data: &mut &[u8]) -> Result<Vec<raw::Pair>, Error> {
    let mut pairs = vec![];
    loop {
        match raw::Pair::consensus_decode(&mut *data) {
            Ok(pair) => pairs.push(pair),
            Err(encode::Error::Psbt(psbt::Error::NoMorePairs)) => return Ok(pairs),
            Err(e) => return Err(FormatError::from(e).into()),
        }
    }
}

// Input and output counts of a non-witness serialized skeleton.
fn skeleton_shape(mut value: &[u8]) -> Option<(usize, usize)> {
    i32::consensus_decode(&mut value).ok()?;
    let inputs = Vec::<TxIn>::consensus_decode(&mut value).ok()?;
    let outputs = Vec::<TxOut>::consensus_decode(&mut value).ok()?;
    Some((inputs.len(), outputs.len()))
}

// A signed network transaction, possibly in its witness serialization.
fn is_signed_tx(value: &[u8]) -> bool {
    encode::deserialize::<Transaction>(value)
        .map(|tx| {
            tx.input
                .iter()
                .any(|txin| !txin.script_sig.is_empty() || !txin.witness.is_empty())
        })
        .unwrap_or(false)
}

fn reject_hybrid_keys(pairs: &[raw::Pair], key_type: u8) -> Result<(), Error> {
    for pair in pairs.iter().filter(|p| p.key.type_value == key_type) {
        if matches!(pair.key.key.first(), Some(&0x06) | Some(&0x07)) {
            return Err(FormatError::BadEncoding(format!(
                "hybrid public key '{}'",
                pair.key.key.to_hex()
            ))
            .into());
        }
    }

    Ok(())
}

// Walk the maps the skeleton announces. If there is no readable skeleton we let the actual
// decoder report it.
fn check_framing(mut data: &[u8]) -> Result<(), Error> {
    let global = read_map(&mut data)?;
    let skeleton = match global
        .iter()
        .find(|p| p.key.type_value == PSBT_GLOBAL_UNSIGNED_TX && p.key.key.is_empty())
    {
        Some(pair) => &pair.value,
        None => return Ok(()),
    };
    if is_signed_tx(skeleton) {
        return Err(FormatError::AlreadySigned.into());
    }
    let (n_inputs, n_outputs) = match skeleton_shape(skeleton) {
        Some(shape) => shape,
        None => return Ok(()),
    };

    for _ in 0..n_inputs {
        let pairs = read_map(&mut data)?;
        reject_hybrid_keys(&pairs, PSBT_IN_PARTIAL_SIG)?;
        reject_hybrid_keys(&pairs, PSBT_IN_BIP32_DERIVATION)?;
    }
    for _ in 0..n_outputs {
        reject_hybrid_keys(&read_map(&mut data)?, PSBT_OUT_BIP32_DERIVATION)?;
    }

    if !data.is_empty() {
        return Err(FormatError::BadEncoding(format!(
            "'{}' bytes of trailing data",
            data.len()
        ))
        .into());
    }

    Ok(())
}

/// Parse a BIP174-serialized container.
pub fn decode(bytes: &[u8]) -> Result<Container, Error> {
    if bytes.len() < MAGIC.len() || bytes[..MAGIC.len()] != MAGIC {
        return Err(FormatError::BadMagic.into());
    }
    check_framing(&bytes[MAGIC.len()..])?;

    // The framing is sound, so running out of data here means a value is too short for its type.
    let psbt: Psbt = encode::deserialize(bytes).map_err(|e| match e {
        encode::Error::Io(e) => {
            Error::from(FormatError::BadEncoding(format!("invalid value: {}", e)))
        }
        e => e.into(),
    })?;

    log::trace!(
        "Decoded container for '{}' with '{}' inputs and '{}' outputs",
        psbt.global.unsigned_tx.txid(),
        psbt.inputs.len(),
        psbt.outputs.len()
    );
    Container::from_psbt(psbt)
}

/// Parse a base64-encoded BIP174-serialized container.
pub fn decode_base64(s: &str) -> Result<Container, Error> {
    decode(&base64::decode(s.trim())?)
}

impl Container {
    /// Get the BIP174-serialized container.
    pub fn serialize(&self) -> Vec<u8> {
        encode(self)
    }

    /// Parse a BIP174-serialized container.
    pub fn deserialize(bytes: &[u8]) -> Result<Container, Error> {
        decode(bytes)
    }

    /// Get the BIP174-serialized container encoded in base64.
    pub fn to_base64(&self) -> String {
        encode_base64(self)
    }

    /// Create a container from a base64-encoded BIP174-serialized one.
    pub fn from_base64(s: &str) -> Result<Container, Error> {
        decode_base64(s)
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_base64())
    }
}

impl str::FromStr for Container {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_base64(s)
    }
}

#[cfg(feature = "use-serde")]
impl Serialize for Container {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_base64())
        } else {
            serializer.serialize_bytes(&encode(self))
        }
    }
}

#[cfg(feature = "use-serde")]
impl<'de> Deserialize<'de> for Container {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        if deserializer.is_human_readable() {
            decode_base64(&String::deserialize(deserializer)?).map_err(de::Error::custom)
        } else {
            decode(&Vec::<u8>::deserialize(deserializer)?).map_err(de::Error::custom)
        }
    }
}
