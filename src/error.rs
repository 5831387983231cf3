use miniscript::bitcoin::{
    consensus::encode::Error as EncodeError,
    hashes::hex::ToHex,
    util::psbt::{raw, Error as PsbtError},
    OutPoint, PublicKey, Txid,
};

use std::{convert::From, error, fmt, io};

/// The container bytes (or their text form) could not be read.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum FormatError {
    /// The data does not start with the `psbt\xff` prefix.
    BadMagic,
    /// The data ended in the middle of a length prefix, a key, a value or before all the maps
    /// the skeleton announces.
    Truncated(String),
    /// Invalid base64, a value that does not parse as what its key type says, a non-standard
    /// sighash type, a hybrid public key, trailing data..
    BadEncoding(String),
    /// The embedded skeleton carries scriptSigs or witnesses: this is a signed network
    /// transaction, not a container.
    AlreadySigned,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            FormatError::BadMagic => write!(f, "Invalid magic bytes"),
            FormatError::Truncated(ref e) => write!(f, "Truncated data: {}", e),
            FormatError::BadEncoding(ref e) => write!(f, "Invalid encoding: {}", e),
            FormatError::AlreadySigned => write!(
                f,
                "Unsigned transaction has scriptSigs or witnesses (already signed)"
            ),
        }
    }
}

impl error::Error for FormatError {}

/// The container is readable but its parts don't line up.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum StructuralError {
    /// No unsigned transaction in the global map.
    MissingSkeleton,
    /// The same key is present twice in a single map. Contains the raw key, type byte included.
    DuplicateKey(Vec<u8>),
    /// Skeleton input count, slot count
    InputCountMismatch(usize, usize),
    /// Skeleton output count, slot count
    OutputCountMismatch(usize, usize),
    /// Two containers that should describe the same transaction don't.
    SkeletonMismatch(Txid, Txid),
    /// The full previous transaction of this input is not the one its outpoint refers to.
    PrevTxMismatch(usize),
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            StructuralError::MissingSkeleton => write!(f, "No unsigned transaction was provided"),
            StructuralError::DuplicateKey(ref key) => {
                write!(f, "Duplicate key '{}'", key[..].to_hex())
            }
            StructuralError::InputCountMismatch(tx, slots) => write!(
                f,
                "Transaction has '{}' inputs but container has '{}' input slots",
                tx, slots
            ),
            StructuralError::OutputCountMismatch(tx, slots) => write!(
                f,
                "Transaction has '{}' outputs but container has '{}' output slots",
                tx, slots
            ),
            StructuralError::SkeletonMismatch(ref ours, ref theirs) => write!(
                f,
                "Containers describe different transactions ('{}' vs '{}')",
                ours, theirs
            ),
            StructuralError::PrevTxMismatch(index) => write!(
                f,
                "Non-witness UTXO of input '{}' does not match its outpoint",
                index
            ),
        }
    }
}

impl error::Error for StructuralError {}

/// A whole-call precondition of a pipeline stage is not met.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum PipelineError {
    /// Nothing to combine.
    EmptyCombineSet,
    /// Joining needs at least two containers, got this many.
    NotEnoughToJoin(usize),
    /// This outpoint is spent by more than one of the containers to join.
    OverlappingInputs(OutPoint),
    /// Two containers carry different signatures by the same key for the same input.
    SignatureConflict {
        input_index: usize,
        pubkey: PublicKey,
    },
    /// Extraction was requested but these inputs could not be finalized.
    IncompleteForExtraction(Vec<usize>),
    /// This input is not finalized.
    NotFinalized(usize),
    /// An explicit sequence for this input opts out of replaceability while it was requested.
    ReplaceabilityConflict(usize),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PipelineError::EmptyCombineSet => write!(f, "No container to combine"),
            PipelineError::NotEnoughToJoin(n) => write!(
                f,
                "At least two containers are required to join, got '{}'",
                n
            ),
            PipelineError::OverlappingInputs(ref outpoint) => {
                write!(f, "Input '{}' exists in multiple containers", outpoint)
            }
            PipelineError::SignatureConflict {
                input_index,
                ref pubkey,
            } => write!(
                f,
                "Conflicting signatures for key '{}' on input '{}'",
                pubkey, input_index
            ),
            PipelineError::IncompleteForExtraction(ref indexes) => write!(
                f,
                "Cannot extract the transaction, inputs {:?} are not satisfied",
                indexes
            ),
            PipelineError::NotFinalized(index) => write!(f, "Input '{}' is not finalized", index),
            PipelineError::ReplaceabilityConflict(index) => write!(
                f,
                "Sequence number of input '{}' contradicts the replaceable option",
                index
            ),
        }
    }
}

impl error::Error for PipelineError {}

/// An error specific to the management of partially signed transaction containers.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Error {
    /// Decoding the container failed.
    Format(FormatError),
    /// The container, or a set of containers, is inconsistent.
    Structural(StructuralError),
    /// A stage was called with unmet preconditions.
    Pipeline(PipelineError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::Format(ref e) => write!(f, "Container format error: {}", e),
            Error::Structural(ref e) => write!(f, "Container structure error: {}", e),
            Error::Pipeline(ref e) => write!(f, "Pipeline error: {}", e),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Format(ref e) => Some(e),
            Error::Structural(ref e) => Some(e),
            Error::Pipeline(ref e) => Some(e),
        }
    }
}

impl From<FormatError> for Error {
    fn from(e: FormatError) -> Self {
        Self::Format(e)
    }
}

impl From<StructuralError> for Error {
    fn from(e: StructuralError) -> Self {
        Self::Structural(e)
    }
}

impl From<PipelineError> for Error {
    fn from(e: PipelineError) -> Self {
        Self::Pipeline(e)
    }
}

impl From<EncodeError> for FormatError {
    fn from(e: EncodeError) -> Self {
        match e {
            EncodeError::Io(ref io_err) if io_err.kind() == io::ErrorKind::UnexpectedEof => {
                Self::Truncated(e.to_string())
            }
            _ => Self::BadEncoding(e.to_string()),
        }
    }
}

// The raw bytes of a key, as they appear on the wire after the length prefix.
fn raw_key_bytes(key: &raw::Key) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(key.key.len() + 1);
    bytes.push(key.type_value);
    bytes.extend_from_slice(&key.key);
    bytes
}

impl From<PsbtError> for Error {
    fn from(e: PsbtError) -> Self {
        match e {
            PsbtError::InvalidMagic | PsbtError::InvalidSeparator => FormatError::BadMagic.into(),
            PsbtError::UnsignedTxHasScriptSigs | PsbtError::UnsignedTxHasScriptWitnesses => {
                FormatError::AlreadySigned.into()
            }
            PsbtError::MustHaveUnsignedTx => StructuralError::MissingSkeleton.into(),
            PsbtError::DuplicateKey(ref key) => {
                StructuralError::DuplicateKey(raw_key_bytes(key)).into()
            }
            e => FormatError::BadEncoding(e.to_string()).into(),
        }
    }
}

impl From<EncodeError> for Error {
    fn from(e: EncodeError) -> Self {
        match e {
            EncodeError::Psbt(e) => e.into(),
            e => Self::Format(e.into()),
        }
    }
}

impl From<base64::DecodeError> for Error {
    fn from(e: base64::DecodeError) -> Self {
        Self::Format(FormatError::BadEncoding(format!("invalid base64: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn psbt_errors_mapping() {
        assert_eq!(
            Error::from(EncodeError::Psbt(PsbtError::InvalidSeparator)),
            Error::Format(FormatError::BadMagic)
        );
        assert_eq!(
            Error::from(PsbtError::UnsignedTxHasScriptWitnesses),
            Error::Format(FormatError::AlreadySigned)
        );
        assert_eq!(
            Error::from(PsbtError::MustHaveUnsignedTx),
            Error::Structural(StructuralError::MissingSkeleton)
        );
        assert_eq!(
            Error::from(PsbtError::DuplicateKey(raw::Key {
                type_value: 0x06,
                key: vec![0x02, 0x42],
            })),
            Error::Structural(StructuralError::DuplicateKey(vec![0x06, 0x02, 0x42]))
        );
        assert!(matches!(
            Error::from(PsbtError::NonStandardSigHashType(0x42)),
            Error::Format(FormatError::BadEncoding(_))
        ));

        let eof = EncodeError::Io(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(
            Error::from(eof),
            Error::Format(FormatError::Truncated(_))
        ));
    }
}
