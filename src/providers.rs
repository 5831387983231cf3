//! # Collaborators
//!
//! The narrow interfaces through which the pipeline reaches the outside world: the UTXO set,
//! the wallet (public knowledge and signing) and fee rate reporting. None of them is implemented
//! here beyond trivial in-memory versions.

use crate::scripts::SigVersion;

use miniscript::bitcoin::{
    util::bip32::KeySource, OutPoint, PubkeyHash, PublicKey, Script, ScriptHash, SigHash,
    SigHashType, Transaction, TxOut, Txid, WScriptHash,
};

use std::{collections::HashMap, error, fmt};

/// Weight units per virtual byte.
pub const WITNESS_SCALE_FACTOR: usize = 4;

/// Resolves outpoints to the output they refer to.
pub trait UtxoLookup {
    /// Get the spent output, if it exists.
    fn txout(&self, outpoint: &OutPoint) -> Option<TxOut>;

    /// Get the whole transaction, needed for non-witness spends.
    fn previous_transaction(&self, _txid: &Txid) -> Option<Transaction> {
        None
    }
}

impl UtxoLookup for HashMap<OutPoint, TxOut> {
    fn txout(&self, outpoint: &OutPoint) -> Option<TxOut> {
        self.get(outpoint).cloned()
    }
}

/// Public wallet knowledge. Every method defaults to "unknown".
pub trait SigningProvider {
    /// Get the public key behind this hash.
    fn pubkey(&self, _hash: &PubkeyHash) -> Option<PublicKey> {
        None
    }

    /// Get the script committed to by a P2SH output.
    fn redeem_script(&self, _hash: &ScriptHash) -> Option<Script> {
        None
    }

    /// Get the script committed to by a P2WSH output.
    fn witness_script(&self, _hash: &WScriptHash) -> Option<Script> {
        None
    }

    /// Get the BIP32 origin of this key.
    fn key_origin(&self, _pubkey: &PublicKey) -> Option<KeySource> {
        None
    }
}

/// Everything needed to produce a signature for one key on one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningContext<'a> {
    pub input_index: usize,
    pub script_code: &'a Script,
    /// Value of the spent output
    pub amount: u64,
    pub sig_version: SigVersion,
    pub sighash_type: SigHashType,
    /// The digest to sign
    pub sighash: SigHash,
}

/// The oracle won't sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declined(pub String);

impl fmt::Display for Declined {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Signing declined: {}", self.0)
    }
}

impl error::Error for Declined {}

/// A wallet that is also able to sign.
pub trait SigningOracle: SigningProvider {
    /// Get a DER-encoded ECDSA signature of `context.sighash` by the private key for `pubkey`.
    fn sign(&self, context: &SigningContext, pubkey: &PublicKey) -> Result<Vec<u8>, Declined>;
}

/// Knows nothing, signs nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoProvider;

impl SigningProvider for NoProvider {}

impl SigningOracle for NoProvider {
    fn sign(&self, _: &SigningContext, pubkey: &PublicKey) -> Result<Vec<u8>, Declined> {
        Err(Declined(format!("no private key for '{}'", pubkey)))
    }
}

/// A fee rate in satoshis per 1000 virtual bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeeRate(u64);

impl FeeRate {
    pub fn from_sat_per_kvb(sats: u64) -> FeeRate {
        FeeRate(sats)
    }

    pub fn as_sat_per_kvb(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}.{:08} BTC/kB",
            self.0 / 100_000_000,
            self.0 % 100_000_000
        )
    }
}

/// Units used by the Analyzer when reporting sizes and fee rates.
pub trait FeeRateEstimator {
    /// Turn a weight into a virtual size.
    fn vsize(&self, weight: usize) -> usize {
        (weight + WITNESS_SCALE_FACTOR - 1) / WITNESS_SCALE_FACTOR
    }

    /// Get the fee rate of paying `fee` for `vsize` virtual bytes.
    fn feerate(&self, fee: u64, vsize: usize) -> FeeRate {
        if vsize == 0 {
            return FeeRate(0);
        }
        FeeRate(fee.saturating_mul(1_000) / vsize as u64)
    }
}

/// Rounds vsizes up, truncates fee rates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultEstimator;

impl FeeRateEstimator for DefaultEstimator {}
