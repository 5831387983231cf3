//! # Requested txins
//!
//! The inputs a Creator is asked to spend, before they are given a concrete nSequence.

use miniscript::bitcoin::{OutPoint, TxIn};

/// Highest nSequence signaling opt-in replaceability.
pub const MAX_BIP125_RBF_SEQUENCE: u32 = 0xff_ff_ff_fd;

/// Highest nSequence that still enables the transaction nLockTime.
pub const SEQUENCE_LOCKTIME_ENABLED: u32 = 0xff_ff_ff_fe;

/// nSequence of an input opting out of both replaceability and nLockTime.
pub const SEQUENCE_FINAL: u32 = 0xff_ff_ff_ff;

/// A coin to spend, with an optional explicit nSequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxInRequest {
    pub outpoint: OutPoint,
    pub sequence: Option<u32>,
}

impl TxInRequest {
    /// Spend this coin with the nSequence picked by the Creator.
    pub fn new(outpoint: OutPoint) -> TxInRequest {
        TxInRequest {
            outpoint,
            sequence: None,
        }
    }

    /// Spend this coin with this exact nSequence.
    pub fn with_sequence(outpoint: OutPoint, sequence: u32) -> TxInRequest {
        TxInRequest {
            outpoint,
            sequence: Some(sequence),
        }
    }

    /// Whether the explicit nSequence, if any, signals replaceability.
    pub fn signals_rbf(&self) -> Option<bool> {
        self.sequence.map(|seq| seq <= MAX_BIP125_RBF_SEQUENCE)
    }

    /// Get an actual Bitcoin TxIn out of the OutPoint and the resolved nSequence
    pub fn as_unsigned_txin(&self, sequence: u32) -> TxIn {
        TxIn {
            previous_output: self.outpoint,
            sequence,
            ..TxIn::default()
        }
    }
}

impl From<OutPoint> for TxInRequest {
    fn from(outpoint: OutPoint) -> Self {
        TxInRequest::new(outpoint)
    }
}
