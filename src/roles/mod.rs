//! # Roles
//!
//! The stages a container goes through, from creation to extraction. Each of them is an
//! inherent method on [Container](crate::container::Container):
//!
//! - Creator: [Container::create](crate::container::Container::create)
//! - Updater: [Container::update](crate::container::Container::update)
//! - Signer: [Container::sign](crate::container::Container::sign)
//! - Combiner: [Container::combine](crate::container::Container::combine)
//! - Joiner: [Container::join](crate::container::Container::join)
//! - Finalizer: [Container::finalize](crate::container::Container::finalize)
//! - Extractor: [Container::extract](crate::container::Container::extract)
//!
//! Per-input failures (unknown coin, missing key, declined signature..) never fail a whole call,
//! they are reported as per-input outcomes.

pub mod combiner;
pub mod creator;
pub mod extractor;
pub mod finalizer;
pub mod joiner;
pub mod signer;
pub mod updater;

pub use creator::{sequence_for, CreateOptions, TX_VERSION};
pub use finalizer::Finalized;
pub use signer::{SignOptions, SignOutcome, SignReport};
pub use updater::{UpdateOptions, UpdateOutcome};
