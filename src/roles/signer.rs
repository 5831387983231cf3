use crate::{
    container::{Container, InputExt},
    providers::{SigningContext, SigningOracle},
    scripts::{
        parse_signature, resolve, satisfy, Condition, InputSatisfier, MissingData, SigVersion,
        SpendInfo, Unresolved,
    },
};

use miniscript::bitcoin::{
    util::{bip143::SigHashCache, psbt},
    PublicKey, SigHash, SigHashType, Transaction,
};

/// Knobs for a signing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignOptions {
    /// Ask the oracle for signatures. If unset, only scripts and derivations are filled.
    pub sign: bool,
    /// The sighash type to sign with.
    pub sighash_type: SigHashType,
    /// Finalize the inputs that become satisfiable.
    pub finalize: bool,
    /// Record the BIP32 origin of the keys involved.
    pub include_derivations: bool,
}

impl Default for SignOptions {
    fn default() -> Self {
        SignOptions {
            sign: true,
            sighash_type: SigHashType::All,
            finalize: true,
            include_derivations: true,
        }
    }
}

/// What happened to an input during a signing (or finalization) pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutcome {
    /// It was finalized already, nothing to do.
    AlreadyFinal,
    /// We don't know the spent output.
    MissingUtxo,
    /// The spend is not segwit and we only have the witness UTXO. Its amount can't be trusted
    /// without a signature committing to it.
    NonWitnessUtxoRequired,
    /// The input asks for another sighash type.
    SighashMismatch {
        hint: SigHashType,
        requested: SigHashType,
    },
    /// We don't know how to spend this output.
    Unresolved(Unresolved),
    /// Still not satisfiable. Contains the keys we signed with.
    Incomplete {
        signed: Vec<PublicKey>,
        missing: MissingData,
    },
    /// Satisfiable, and finalized if it was asked.
    Complete {
        signed: Vec<PublicKey>,
        finalized: bool,
    },
}

impl SignOutcome {
    /// Whether this input needs nothing more than (possibly) finalization.
    pub fn is_complete(&self) -> bool {
        matches!(self, SignOutcome::AlreadyFinal | SignOutcome::Complete { .. })
    }
}

/// The result of a signing pass over a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignReport {
    /// Every input is either finalized or satisfiable.
    pub complete: bool,
    pub outcomes: Vec<SignOutcome>,
}

/// Get the digest a signature for this input commits to.
pub(crate) fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    info: &SpendInfo,
    amount: u64,
    sighash_type: SigHashType,
) -> SigHash {
    match info.sig_version {
        SigVersion::Base => {
            tx.signature_hash(input_index, &info.script_code, sighash_type.as_u32())
        }
        SigVersion::WitnessV0 => SigHashCache::new(tx).signature_hash(
            input_index,
            &info.script_code,
            amount,
            sighash_type,
        ),
    }
}

// Whether this key has a well-formed signature committing with this sighash type.
fn has_signature(input: &psbt::Input, pubkey: &PublicKey, sighash_type: SigHashType) -> bool {
    input
        .partial_sigs
        .get(pubkey)
        .and_then(|raw| parse_signature(raw))
        .map_or(false, |(_, t)| t == sighash_type)
}

/// Sign, then try to satisfy, a single input.
///
/// This is shared between the Signer and the Finalizer (which never signs). The input is only
/// modified when the spent output could be resolved.
pub(crate) fn process_input(
    tx: &Transaction,
    input_index: usize,
    input: &mut psbt::Input,
    oracle: &dyn SigningOracle,
    options: &SignOptions,
) -> SignOutcome {
    if input.is_final() {
        return SignOutcome::AlreadyFinal;
    }

    if options.sign {
        if let Some(hint) = input.sighash_type {
            if hint != options.sighash_type {
                log::debug!(
                    "Not signing input '{}', it asks for sighash type '{}'",
                    input_index,
                    hint
                );
                return SignOutcome::SighashMismatch {
                    hint,
                    requested: options.sighash_type,
                };
            }
        }
    }

    // The full previous transaction is preferred, as it can be verified against the outpoint.
    let prevout = tx.input[input_index].previous_output;
    let (utxo, require_witness_sig) = match (&input.non_witness_utxo, &input.witness_utxo) {
        (Some(prev_tx), _) => match prev_tx.output.get(prevout.vout as usize) {
            Some(txo) if prev_tx.txid() == prevout.txid => (txo.clone(), false),
            _ => return SignOutcome::MissingUtxo,
        },
        (None, Some(txo)) => (txo.clone(), true),
        (None, None) => return SignOutcome::MissingUtxo,
    };

    let info = match resolve(
        &utxo.script_pubkey,
        input.redeem_script.as_ref(),
        input.witness_script.as_ref(),
        oracle,
    ) {
        Ok(info) => info,
        Err(e) => {
            log::trace!("Can't resolve input '{}': {}", input_index, e);
            return SignOutcome::Unresolved(e);
        }
    };
    if require_witness_sig && !info.is_witness() {
        return SignOutcome::NonWitnessUtxoRequired;
    }

    let mut updated = input.clone();
    if updated.redeem_script.is_none() {
        updated.redeem_script = info.redeem_script.clone();
    }
    if updated.witness_script.is_none() {
        updated.witness_script = info.witness_script.clone();
    }

    let keys = info.known_keys(&InputSatisfier {
        input: &updated,
        provider: oracle,
        sighash_type: None,
    });
    let mut signed = Vec::new();
    if options.sign {
        let sighash = signature_hash(tx, input_index, &info, utxo.value, options.sighash_type);
        let context = SigningContext {
            input_index,
            script_code: &info.script_code,
            amount: utxo.value,
            sig_version: info.sig_version,
            sighash_type: options.sighash_type,
            sighash,
        };

        let needed = match info.condition {
            Condition::Multi(k, _) => k,
            _ => 1,
        };
        // Only signatures under the requested sighash type get us closer to the threshold.
        // Those are refreshed, and new ones are asked for until we reach it.
        let mut n_sigs = keys
            .iter()
            .filter(|pk| has_signature(&updated, pk, options.sighash_type))
            .count();
        for pubkey in keys.iter() {
            let resign = has_signature(&updated, pubkey, options.sighash_type);
            if !resign && n_sigs >= needed {
                continue;
            }
            // Segwit v0 spends are only standard with compressed keys
            if info.is_witness() && !pubkey.compressed {
                continue;
            }

            match oracle.sign(&context, pubkey) {
                Ok(mut sig) => {
                    sig.push(options.sighash_type.as_u32() as u8);
                    if let Some(previous) = updated.partial_sigs.insert(*pubkey, sig) {
                        log::trace!(
                            "Input '{}', key '{}': replaced signature '{:x?}'",
                            input_index,
                            pubkey,
                            previous
                        );
                    }
                    signed.push(*pubkey);
                    if !resign {
                        n_sigs += 1;
                    }
                }
                Err(e) => log::debug!("Input '{}', key '{}': {}", input_index, pubkey, e),
            }
        }
    }

    if options.include_derivations {
        for pubkey in keys.iter() {
            if let Some(origin) = oracle.key_origin(pubkey) {
                updated.bip32_derivation.entry(*pubkey).or_insert(origin);
            }
        }
    }

    // Once we know it's a segwit spend, the compact form is enough.
    if info.is_witness() {
        updated.witness_utxo = Some(utxo);
        updated.non_witness_utxo = None;
    }

    // When signing, only our own sighash type is acceptable. Otherwise follow the hint.
    let satisfaction = satisfy(
        &info,
        &InputSatisfier {
            input: &updated,
            provider: oracle,
            sighash_type: if options.sign {
                Some(options.sighash_type)
            } else {
                input.sighash_type
            },
        },
    );
    let outcome = match satisfaction {
        Ok(sat) => {
            log::trace!("Input '{}' ({}) is satisfiable", input_index, info.kind);
            if options.finalize {
                updated.finalize_with(
                    Some(sat.script_sig).filter(|s| !s.is_empty()),
                    Some(sat.witness).filter(|w| !w.is_empty()),
                );
            }
            SignOutcome::Complete {
                signed,
                finalized: options.finalize,
            }
        }
        Err(missing) => SignOutcome::Incomplete { signed, missing },
    };
    *input = updated;

    outcome
}

impl Container {
    /// Sign every input we can with this oracle.
    ///
    /// Inputs we can't sign for are left untouched, this never fails as a whole. See the
    /// per-input outcomes in the report.
    pub fn sign(&mut self, oracle: &dyn SigningOracle, options: &SignOptions) -> SignReport {
        let psbt = self.psbt_mut();
        let tx = &psbt.global.unsigned_tx;
        let outcomes: Vec<SignOutcome> = psbt
            .inputs
            .iter_mut()
            .enumerate()
            .map(|(i, input)| process_input(tx, i, input, oracle, options))
            .collect();
        let complete = outcomes.iter().all(SignOutcome::is_complete);

        log::debug!(
            "Signing pass over '{}': '{}' signatures made, complete: {}",
            self.txid(),
            outcomes
                .iter()
                .map(|o| match o {
                    SignOutcome::Incomplete { signed, .. } | SignOutcome::Complete { signed, .. } => {
                        signed.len()
                    }
                    _ => 0,
                })
                .sum::<usize>(),
            complete
        );

        SignReport { complete, outcomes }
    }
}
