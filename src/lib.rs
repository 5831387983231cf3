//! # psbt_pipeline
//!
//! A partially signed Bitcoin transaction container and the roles it goes through, from its
//! creation to the extraction of the network transaction:
//! [bip-0174](https://github.com/bitcoin/bips/blob/master/bip-0174.mediawiki).
//!
//! The UTXO set and the wallet are not part of this crate, they are reached through the
//! [providers] traits.

pub mod analyzer;
pub mod codec;
pub mod container;
#[cfg(feature = "use-serde")]
pub mod describe;
pub mod error;
pub mod providers;
pub mod roles;
pub mod scripts;
pub mod txins;

#[cfg(any(test, feature = "fuzz"))]
pub mod tests_helpers;

pub use miniscript;

pub use analyzer::{InputAnalysis, Missing, Report, Role};
pub use container::{Container, InputExt, InputState, OutputExt};
pub use error::Error;
pub use providers::{
    DefaultEstimator, FeeRate, FeeRateEstimator, NoProvider, SigningContext, SigningOracle,
    SigningProvider, UtxoLookup,
};
pub use roles::{
    CreateOptions, Finalized, SignOptions, SignOutcome, SignReport, UpdateOptions, UpdateOutcome,
};
pub use txins::TxInRequest;
