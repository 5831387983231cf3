//! # Analyzer
//!
//! Read-only inspection of a container: where each input stands, which role should process the
//! container next, and its fee metrics.

use crate::{
    container::{Container, InputExt},
    providers::{DefaultEstimator, FeeRate, FeeRateEstimator, NoProvider},
    scripts::{resolve, satisfy, DummySatisfier, InputSatisfier, Unresolved},
};

use miniscript::bitcoin::{
    blockdata::constants::max_money, util::psbt, Network, OutPoint, PubkeyHash, ScriptHash,
    WScriptHash,
};

use std::fmt;

#[cfg(feature = "use-serde")]
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// The roles, in the order a container goes through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Creator,
    Updater,
    Signer,
    Finalizer,
    Extractor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            Role::Creator => "creator",
            Role::Updater => "updater",
            Role::Signer => "signer",
            Role::Finalizer => "finalizer",
            Role::Extractor => "extractor",
        };
        write!(f, "{}", name)
    }
}

/// What an input lacks to be satisfied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Missing {
    /// Keys we only know the hash of.
    pub pubkeys: Vec<PubkeyHash>,
    /// Keys we need a signature from.
    pub signatures: Vec<PubkeyHash>,
    pub redeemscript: Option<ScriptHash>,
    pub witnessscript: Option<WScriptHash>,
}

impl Missing {
    pub fn is_empty(&self) -> bool {
        self.pubkeys.is_empty()
            && self.signatures.is_empty()
            && self.redeemscript.is_none()
            && self.witnessscript.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputAnalysis {
    /// The spent output is known.
    pub has_utxo: bool,
    pub is_final: bool,
    /// The role this input needs next. None once finalized.
    pub next: Option<Role>,
    /// Set when something is missing.
    pub missing: Option<Missing>,
    /// Why this input can't progress, if we know.
    pub error: Option<String>,
}

impl InputAnalysis {
    fn pending(next: Role, missing: Missing, error: Option<String>) -> InputAnalysis {
        InputAnalysis {
            has_utxo: true,
            is_final: false,
            next: Some(next),
            missing: Some(missing).filter(|m| !m.is_empty()),
            error,
        }
    }
}

/// The result of analyzing a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub inputs: Vec<InputAnalysis>,
    /// Set when the spent output of every input is known.
    pub fee: Option<u64>,
    /// Set when every input is finalized or could be satisfied with dummy signatures.
    pub estimated_vsize: Option<usize>,
    pub estimated_feerate: Option<FeeRate>,
    /// The earliest role any input needs, or the extractor once they are all finalized.
    pub next: Role,
    /// Set if the container is invalid. Nothing else is reported then.
    pub error: Option<String>,
}

impl Report {
    fn invalid(error: String) -> Report {
        log::debug!("Invalid container: {}", error);
        Report {
            inputs: vec![],
            fee: None,
            estimated_vsize: None,
            estimated_feerate: None,
            next: Role::Creator,
            error: Some(error),
        }
    }
}

// The signatures and scripts of a non-final input, without any wallet.
fn input_satisfier(input: &psbt::Input) -> InputSatisfier<NoProvider> {
    InputSatisfier {
        input,
        provider: &NoProvider,
        sighash_type: input.sighash_type,
    }
}

fn analyze_input(
    prevout: &OutPoint,
    input_index: usize,
    input: &psbt::Input,
) -> Result<InputAnalysis, String> {
    if let Some(ref prev_tx) = input.non_witness_utxo {
        if prev_tx.txid() != prevout.txid || prev_tx.output.len() <= prevout.vout as usize {
            return Err(format!("Input {} specifies invalid prevout", input_index));
        }
    }

    let utxo = input.spent_txout(prevout);
    if let Some(utxo) = utxo {
        if utxo.value > max_money(Network::Bitcoin) {
            return Err(format!("Input {} has invalid value", input_index));
        }
        if utxo.script_pubkey.is_provably_unspendable() {
            return Err(format!("Input {} is unspendable", input_index));
        }
    }

    // A final input needs nothing more, even without its spent output.
    if input.is_final() {
        return Ok(InputAnalysis {
            has_utxo: input.has_utxo(),
            is_final: true,
            next: None,
            missing: None,
            error: None,
        });
    }

    let utxo = match utxo {
        Some(utxo) => utxo,
        None => {
            return Ok(InputAnalysis {
                has_utxo: false,
                is_final: false,
                next: Some(Role::Updater),
                missing: None,
                error: None,
            })
        }
    };

    let mut missing = Missing::default();
    let info = match resolve(
        &utxo.script_pubkey,
        input.redeem_script.as_ref(),
        input.witness_script.as_ref(),
        &NoProvider,
    ) {
        Ok(info) => info,
        Err(Unresolved::MissingRedeemScript(hash)) => {
            missing.redeemscript = Some(hash);
            return Ok(InputAnalysis::pending(Role::Updater, missing, None));
        }
        Err(Unresolved::MissingWitnessScript(hash)) => {
            missing.witnessscript = Some(hash);
            return Ok(InputAnalysis::pending(Role::Updater, missing, None));
        }
        // A signer with a better understanding of this Script may still be able to sign.
        Err(e) => return Ok(InputAnalysis::pending(Role::Signer, missing, Some(e.to_string()))),
    };
    if input.non_witness_utxo.is_none() && !info.is_witness() {
        return Ok(InputAnalysis::pending(
            Role::Updater,
            missing,
            Some("Full previous transaction required for a non-witness spend".to_string()),
        ));
    }

    match satisfy(&info, &input_satisfier(input)) {
        Ok(_) => Ok(InputAnalysis::pending(Role::Finalizer, missing, None)),
        Err(data) => {
            let next = if data.pubkeys.is_empty() {
                Role::Signer
            } else {
                Role::Updater
            };
            missing.pubkeys = data.pubkeys;
            missing.signatures = data.signatures;
            Ok(InputAnalysis::pending(next, missing, None))
        }
    }
}

impl Container {
    // The weight of the network transaction, with dummy signatures for the inputs that aren't
    // finalized yet.
    fn estimate_weight(&self) -> Option<usize> {
        let mut tx = self.unsigned_tx().clone();

        for (txin, input) in tx.input.iter_mut().zip(self.inputs().iter()) {
            if input.is_final() {
                txin.script_sig = input.final_script_sig.clone().unwrap_or_default();
                txin.witness = input.final_script_witness.clone().unwrap_or_default();
                continue;
            }

            let utxo = input.spent_txout(&txin.previous_output)?;
            let info = resolve(
                &utxo.script_pubkey,
                input.redeem_script.as_ref(),
                input.witness_script.as_ref(),
                &NoProvider,
            )
            .ok()?;
            let sat = satisfy(&info, &DummySatisfier(&input_satisfier(input))).ok()?;
            txin.script_sig = sat.script_sig;
            txin.witness = sat.witness;
        }

        Some(tx.get_weight())
    }

    /// Analyze this container, with the default size and fee rate units.
    pub fn analyze(&self) -> Report {
        self.analyze_with(&DefaultEstimator)
    }

    /// Analyze this container, using this estimator for the size and fee rate.
    pub fn analyze_with(&self, estimator: &dyn FeeRateEstimator) -> Report {
        let max_money = max_money(Network::Bitcoin);
        let mut inputs = Vec::with_capacity(self.inputs().len());
        let mut value_in: u64 = 0;
        let mut calc_fee = true;

        for (i, (txin, input)) in self
            .unsigned_tx()
            .input
            .iter()
            .zip(self.inputs().iter())
            .enumerate()
        {
            let analysis = match analyze_input(&txin.previous_output, i, input) {
                Ok(analysis) => analysis,
                Err(e) => return Report::invalid(e),
            };
            if let Some(utxo) = input.spent_txout(&txin.previous_output) {
                value_in = match value_in.checked_add(utxo.value) {
                    Some(value) if value <= max_money => value,
                    _ => return Report::invalid(format!("Input {} has invalid value", i)),
                };
            } else {
                calc_fee = false;
            }
            log::trace!("Input '{}': {:?}", i, analysis);
            inputs.push(analysis);
        }

        let next = inputs
            .iter()
            .filter_map(|input| input.next)
            .min()
            .unwrap_or(Role::Extractor);
        let mut report = Report {
            inputs,
            fee: None,
            estimated_vsize: None,
            estimated_feerate: None,
            next,
            error: None,
        };

        if calc_fee {
            let mut value_out: u64 = 0;
            for txout in self.unsigned_tx().output.iter() {
                value_out = match value_out.checked_add(txout.value) {
                    Some(value) if txout.value <= max_money && value <= max_money => value,
                    _ => return Report::invalid("Output amounts invalid".to_string()),
                };
            }
            let fee = match value_in.checked_sub(value_out) {
                Some(fee) => fee,
                None => {
                    return Report::invalid(
                        "Input amounts do not sum to more than output amounts".to_string(),
                    )
                }
            };
            report.fee = Some(fee);

            if let Some(weight) = self.estimate_weight() {
                let vsize = estimator.vsize(weight);
                report.estimated_vsize = Some(vsize);
                report.estimated_feerate = Some(estimator.feerate(fee, vsize));
            }
        }
        log::debug!("Container '{}' needs the {} next", self.txid(), report.next);

        report
    }
}

#[cfg(feature = "use-serde")]
impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "use-serde")]
impl Serialize for Missing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Missing", 4)?;
        if !self.pubkeys.is_empty() {
            let pubkeys: Vec<String> = self.pubkeys.iter().map(|h| h.to_string()).collect();
            state.serialize_field("pubkeys", &pubkeys)?;
        }
        if !self.signatures.is_empty() {
            let signatures: Vec<String> = self.signatures.iter().map(|h| h.to_string()).collect();
            state.serialize_field("signatures", &signatures)?;
        }
        if let Some(ref hash) = self.redeemscript {
            state.serialize_field("redeemscript", &hash.to_string())?;
        }
        if let Some(ref hash) = self.witnessscript {
            state.serialize_field("witnessscript", &hash.to_string())?;
        }
        state.end()
    }
}

#[cfg(feature = "use-serde")]
impl Serialize for InputAnalysis {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("InputAnalysis", 5)?;
        state.serialize_field("has_utxo", &self.has_utxo)?;
        state.serialize_field("is_final", &self.is_final)?;
        if let Some(ref next) = self.next {
            state.serialize_field("next", next)?;
        }
        if let Some(ref missing) = self.missing {
            state.serialize_field("missing", missing)?;
        }
        if let Some(ref error) = self.error {
            state.serialize_field("error", error)?;
        }
        state.end()
    }
}

#[cfg(feature = "use-serde")]
impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Report", 6)?;
        if !self.inputs.is_empty() {
            state.serialize_field("inputs", &self.inputs)?;
        }
        if let Some(vsize) = self.estimated_vsize {
            state.serialize_field("estimated_vsize", &vsize)?;
        }
        if let Some(feerate) = self.estimated_feerate {
            state.serialize_field("estimated_feerate", &feerate.as_sat_per_kvb())?;
        }
        if let Some(fee) = self.fee {
            state.serialize_field("fee", &fee)?;
        }
        state.serialize_field("next", &self.next)?;
        if let Some(ref error) = self.error {
            state.serialize_field("error", error)?;
        }
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        roles::{CreateOptions, SignOptions, UpdateOptions},
        tests_helpers::*,
        txins::TxInRequest,
    };

    use miniscript::bitcoin::{
        blockdata::{opcodes, script::Builder},
        secp256k1, Script, Transaction, TxOut,
    };

    fn spend_first_output(prev_tx: &Transaction, outputs: Vec<TxOut>) -> Container {
        Container::create(
            &[TxInRequest::new(OutPoint {
                txid: prev_tx.txid(),
                vout: 0,
            })],
            outputs,
            &CreateOptions::default(),
        )
        .unwrap()
    }

    fn single_output(value: u64) -> Vec<TxOut> {
        vec![TxOut {
            value,
            script_pubkey: Script::new(),
        }]
    }

    #[test]
    fn pipeline_progression() {
        let secp = secp256k1::Secp256k1::new();
        let keys = KeyRing::random(1, &secp);
        let pubkey = keys.pubkeys()[0];
        let spk = Script::new_v0_wpkh(&pubkey.wpubkey_hash().unwrap());
        let prev_tx = funding_tx(&[(spk, 100_000)]);
        let mut utxos = UtxoSet::default();
        utxos.add(prev_tx.clone());
        let mut roles = vec![];

        // Fresh out of the Creator
        let mut container = spend_first_output(&prev_tx, single_output(90_000));
        let report = container.analyze();
        assert_eq!(report.next, Role::Updater);
        assert_eq!(
            report.inputs,
            vec![InputAnalysis {
                has_utxo: false,
                is_final: false,
                next: Some(Role::Updater),
                missing: None,
                error: None,
            }]
        );
        assert_eq!(report.fee, None);
        assert_eq!(report.estimated_vsize, None);
        assert_eq!(report.estimated_feerate, None);
        roles.push(report.next);

        // Witness context was attached, it needs a signature
        container.update(&utxos, &keys, &UpdateOptions::default());
        let report = container.analyze();
        assert_eq!(report.next, Role::Signer);
        assert!(report.inputs[0].has_utxo);
        assert!(!report.inputs[0].is_final);
        assert_eq!(
            report.inputs[0].missing,
            Some(Missing {
                signatures: vec![pubkey.pubkey_hash()],
                ..Missing::default()
            })
        );
        assert_eq!(report.fee, Some(10_000));
        assert!(report.estimated_vsize.is_some());
        roles.push(report.next);

        container.sign(
            &keys,
            &SignOptions {
                finalize: false,
                ..SignOptions::default()
            },
        );
        let report = container.analyze();
        assert_eq!(report.next, Role::Finalizer);
        assert_eq!(report.inputs[0].missing, None);
        roles.push(report.next);

        let finalized = container.clone().finalize(false).unwrap().container;
        let report_final = finalized.analyze();
        assert_eq!(report_final.next, Role::Extractor);
        assert!(report_final.inputs[0].is_final);
        assert_eq!(report_final.inputs[0].next, None);
        // The dummy signature is never smaller than the actual one
        assert!(report_final.estimated_vsize <= report.estimated_vsize);
        assert_eq!(report_final.fee, report.fee);
        roles.push(report_final.next);

        let mut sorted = roles.clone();
        sorted.sort();
        assert_eq!(roles, sorted);
        assert_eq!(
            roles,
            vec![Role::Updater, Role::Signer, Role::Finalizer, Role::Extractor]
        );
    }

    #[test]
    fn wrapped_segwit_size() {
        let secp = secp256k1::Secp256k1::new();
        let mut keys = KeyRing::random(1, &secp);
        let pubkey = keys.pubkeys()[0];
        let p2wpkh = Script::new_v0_wpkh(&pubkey.wpubkey_hash().unwrap());
        keys.add_script(p2wpkh.clone());
        let prev_tx = funding_tx(&[(p2wpkh.to_p2sh(), 1_100_000)]);
        let mut utxos = UtxoSet::default();
        utxos.add(prev_tx.clone());

        let mut container = spend_first_output(
            &prev_tx,
            vec![TxOut {
                value: 1_000_000,
                script_pubkey: p2wpkh.to_p2sh(),
            }],
        );
        container.update(&utxos, &keys, &UpdateOptions::default());

        let report = container.analyze();
        assert_eq!(report.next, Role::Signer);
        assert_eq!(report.fee, Some(100_000));
        // 106 non-witness bytes, 110 witness bytes
        assert_eq!(container.estimate_weight(), Some(534));
        assert_eq!(report.estimated_vsize, Some(134));
        assert_eq!(
            report.estimated_feerate.unwrap().to_string(),
            "0.00746268 BTC/kB"
        );
    }

    #[test]
    fn missing_scripts() {
        let secp = secp256k1::Secp256k1::new();
        let keys = KeyRing::random(2, &secp);
        let multi = multisig_script(2, &keys.pubkeys());
        let prev_tx = funding_tx(&[(multi.to_v0_p2wsh(), 100_000), (multi.to_p2sh(), 100_000)]);
        let mut container = Container::create(
            &[
                TxInRequest::new(OutPoint {
                    txid: prev_tx.txid(),
                    vout: 0,
                }),
                TxInRequest::new(OutPoint {
                    txid: prev_tx.txid(),
                    vout: 1,
                }),
            ],
            single_output(150_000),
            &CreateOptions::default(),
        )
        .unwrap();
        container.inputs_mut()[0].witness_utxo = Some(prev_tx.output[0].clone());
        container.inputs_mut()[1].non_witness_utxo = Some(prev_tx.clone());

        let report = container.analyze();
        assert_eq!(report.next, Role::Updater);
        assert_eq!(
            report.inputs[0].missing,
            Some(Missing {
                witnessscript: Some(multi.wscript_hash()),
                ..Missing::default()
            })
        );
        assert_eq!(
            report.inputs[1].missing,
            Some(Missing {
                redeemscript: Some(multi.script_hash()),
                ..Missing::default()
            })
        );
        // We can't tell the size without the scripts
        assert_eq!(report.fee, Some(50_000));
        assert_eq!(report.estimated_vsize, None);

        // With the scripts, every signature is missing
        container.inputs_mut()[0].witness_script = Some(multi.clone());
        container.inputs_mut()[1].redeem_script = Some(multi.clone());
        let report = container.analyze();
        assert_eq!(report.next, Role::Signer);
        for input in report.inputs.iter() {
            assert_eq!(input.missing.as_ref().unwrap().signatures.len(), 2);
        }
        assert!(report.estimated_vsize.is_some());
    }

    #[test]
    fn spend_requirements() {
        let secp = secp256k1::Secp256k1::new();
        let keys = KeyRing::random(1, &secp);
        let pubkey = keys.pubkeys()[0];
        let prev_tx = funding_tx(&[
            (Script::new_p2pkh(&pubkey.pubkey_hash()), 100_000),
            (Builder::new().push_opcode(opcodes::all::OP_PUSHNUM_1).into_script(), 100_000),
        ]);

        // A legacy spend needs the full previous transaction
        let mut container = spend_first_output(&prev_tx, single_output(90_000));
        container.inputs_mut()[0].witness_utxo = Some(prev_tx.output[0].clone());
        let report = container.analyze();
        assert_eq!(report.next, Role::Updater);
        assert!(report.inputs[0].has_utxo);
        assert!(report.inputs[0].error.is_some());

        // And the public key
        container.inputs_mut()[0].witness_utxo = None;
        container.inputs_mut()[0].non_witness_utxo = Some(prev_tx.clone());
        let report = container.analyze();
        assert_eq!(report.next, Role::Updater);
        assert_eq!(
            report.inputs[0].missing,
            Some(Missing {
                pubkeys: vec![pubkey.pubkey_hash()],
                ..Missing::default()
            })
        );
        assert!(report.inputs[0].error.is_none());

        // Non-standard Script
        let mut container = Container::create(
            &[TxInRequest::new(OutPoint {
                txid: prev_tx.txid(),
                vout: 1,
            })],
            single_output(90_000),
            &CreateOptions::default(),
        )
        .unwrap();
        container.inputs_mut()[0].non_witness_utxo = Some(prev_tx);
        let report = container.analyze();
        assert_eq!(report.next, Role::Signer);
        assert_eq!(report.inputs[0].missing, None);
        assert!(report.inputs[0].error.is_some());
        assert_eq!(report.fee, Some(10_000));
        assert_eq!(report.estimated_vsize, None);
    }

    #[test]
    fn invalid_containers() {
        let secp = secp256k1::Secp256k1::new();
        let keys = KeyRing::random(1, &secp);
        let spk = Script::new_v0_wpkh(&keys.pubkeys()[0].wpubkey_hash().unwrap());
        let prev_tx = funding_tx(&[(spk.clone(), 100_000)]);

        let assert_invalid = |container: &Container| {
            let report = container.analyze();
            assert_eq!(report.next, Role::Creator);
            assert!(report.error.is_some());
            assert!(report.inputs.is_empty());
            assert_eq!(report.fee, None);
            assert_eq!(report.estimated_vsize, None);
        };

        // Out of range amount
        let mut container = spend_first_output(&prev_tx, single_output(90_000));
        container.inputs_mut()[0].witness_utxo = Some(TxOut {
            value: 21_000_001 * 100_000_000,
            script_pubkey: spk.clone(),
        });
        assert_invalid(&container);

        // More out than in
        let mut container = spend_first_output(&prev_tx, single_output(100_001));
        container.inputs_mut()[0].witness_utxo = Some(prev_tx.output[0].clone());
        assert_invalid(&container);

        // Unspendable
        let mut container = spend_first_output(&prev_tx, single_output(90_000));
        container.inputs_mut()[0].witness_utxo = Some(TxOut {
            value: 100_000,
            script_pubkey: Builder::new()
                .push_opcode(opcodes::all::OP_RETURN)
                .into_script(),
        });
        assert_invalid(&container);

        // The previous transaction doesn't have this output
        let mut container = Container::create(
            &[TxInRequest::new(OutPoint {
                txid: prev_tx.txid(),
                vout: 5,
            })],
            single_output(90_000),
            &CreateOptions::default(),
        )
        .unwrap();
        container.inputs_mut()[0].non_witness_utxo = Some(prev_tx);
        assert_invalid(&container);
    }

    #[test]
    fn cosigners_scenario() {
        let secp = secp256k1::Secp256k1::new();
        let mut keys = KeyRing::random(3, &secp);
        let multi = multisig_script(2, &keys.pubkeys());
        keys.add_script(multi.clone());
        let prev_tx = funding_tx(&[(multi.to_v0_p2wsh(), 1_000_000)]);
        let mut utxos = UtxoSet::default();
        utxos.add(prev_tx.clone());

        let mut container = spend_first_output(&prev_tx, single_output(990_000));
        container.update(&utxos, &keys, &UpdateOptions::default());
        assert_eq!(container.analyze().next, Role::Signer);

        // Each co-signer only has one key, below the threshold
        let (mut alice, mut bob) = (container.clone(), container.clone());
        assert!(!alice.sign(&keys.subset(&[0]), &SignOptions::default()).complete);
        assert!(!bob.sign(&keys.subset(&[1]), &SignOptions::default()).complete);
        assert_eq!(alice.analyze().next, Role::Signer);

        let combined = Container::combine(vec![alice, bob]).unwrap();
        assert_eq!(combined.analyze().next, Role::Finalizer);
        let finalized = combined.finalize(true).unwrap();
        assert!(finalized.complete);
        assert_eq!(finalized.container.analyze().next, Role::Extractor);
        let tx = finalized.container.extract_tx().unwrap();
        assert_eq!(finalized.extracted, Some(finalized.container.extract().unwrap()));
        // 2 signatures, the witness script and the CHECKMULTISIG dummy
        assert_eq!(tx.input[0].witness.len(), 4);
        assert_eq!(tx.txid(), container.txid());
    }

    #[test]
    fn finalized_without_utxo() {
        let mut rng = fastrand::Rng::new();
        let prevouts = [random_outpoint(&mut rng), random_outpoint(&mut rng)];
        let tx = spending_tx(&prevouts, &[(Script::new(), 42_000)]);
        let mut container = Container::from_unsigned_tx(tx, false).unwrap();

        // Someone else finalized it and didn't pass the spent output along
        container.inputs_mut()[0].finalize_with(None, Some(vec![vec![0x30; 72], vec![0x02; 33]]));
        let report = container.analyze();
        assert_eq!(
            report.inputs[0],
            InputAnalysis {
                has_utxo: false,
                is_final: true,
                next: None,
                missing: None,
                error: None,
            }
        );
        assert_eq!(report.inputs[1].next, Some(Role::Updater));
        assert_eq!(report.next, Role::Updater);

        container.inputs_mut()[1].finalize_with(Some(Script::from(vec![0x51])), None);
        let report = container.analyze();
        assert!(report.inputs.iter().all(|input| input.is_final && input.next.is_none()));
        assert_eq!(report.next, Role::Extractor);
        assert!(report.error.is_none());
        // Without the spent outputs, the fee is unknown
        assert_eq!(report.fee, None);
        assert_eq!(report.estimated_vsize, None);
    }

    #[test]
    fn empty_container() {
        let container = Container::from_unsigned_tx(spending_tx(&[], &[]), false).unwrap();
        let report = container.analyze();
        assert_eq!(report.next, Role::Extractor);
        assert_eq!(report.fee, Some(0));
        assert!(report.error.is_none());
    }

    #[cfg(feature = "use-serde")]
    #[test]
    fn report_json() {
        let secp = secp256k1::Secp256k1::new();
        let keys = KeyRing::random(1, &secp);
        let pubkey = keys.pubkeys()[0];
        let spk = Script::new_v0_wpkh(&pubkey.wpubkey_hash().unwrap());
        let prev_tx = funding_tx(&[(spk, 100_000)]);

        let mut container = spend_first_output(&prev_tx, single_output(90_000));
        let json = serde_json::to_value(&container.analyze()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "inputs": [{"has_utxo": false, "is_final": false, "next": "updater"}],
                "next": "updater",
            })
        );

        container.inputs_mut()[0].witness_utxo = Some(prev_tx.output[0].clone());
        container.inputs_mut()[0]
            .bip32_derivation
            .insert(pubkey, keys.key_origin(&pubkey).unwrap());
        let json = serde_json::to_value(&container.analyze()).unwrap();
        assert_eq!(json["next"], "signer");
        assert_eq!(json["fee"], 10_000);
        assert_eq!(
            json["inputs"][0]["missing"]["signatures"][0],
            pubkey.pubkey_hash().to_string()
        );
        assert!(json["estimated_vsize"].is_u64());
        assert!(json["estimated_feerate"].is_u64());
    }
}
