use crate::{
    container::{Container, InputExt},
    providers::{SigningProvider, UtxoLookup},
    scripts::{is_witness_spend, resolve, InputSatisfier},
};

use miniscript::{
    bitcoin::{
        hashes::{hash160, Hash},
        util::psbt,
        OutPoint, PubkeyHash, PublicKey,
    },
    Satisfier,
};

/// Knobs for an update pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Record the BIP32 origin of the keys involved in inputs and outputs. Watch-only setups
    /// may not want to leak them.
    pub include_derivations: bool,
    /// When we can't tell whether an input is spent through a witness program, attach both the
    /// full previous transaction and the spent output instead of only one of them.
    pub attach_both_when_unknown: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        UpdateOptions {
            include_derivations: true,
            attach_both_when_unknown: false,
        }
    }
}

/// What happened to an input during an update pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    AlreadyFinal,
    /// The lookup doesn't know the spent coin (or can't give the full previous transaction for
    /// a non-witness spend). The input is left without context.
    UtxoNotFound,
    /// There was nothing we could add.
    Unchanged,
    Updated,
}

// Public keys only known to the wallet.
struct ProviderKeys<'a>(&'a dyn SigningProvider);

impl<'a> Satisfier<PublicKey> for ProviderKeys<'a> {
    fn lookup_pkh_pk(&self, hash: &hash160::Hash) -> Option<PublicKey> {
        self.0.pubkey(&PubkeyHash::from_hash(*hash))
    }
}

// Attach the spent output to an input that has none, in the form its spend type needs.
fn attach_utxo(
    input: &mut psbt::Input,
    prevout: &OutPoint,
    utxos: &dyn UtxoLookup,
    provider: &dyn SigningProvider,
    options: &UpdateOptions,
) -> bool {
    let txout = match utxos.txout(prevout) {
        Some(txout) => txout,
        None => return false,
    };
    let prev_tx = utxos
        .previous_transaction(&prevout.txid)
        .filter(|tx| tx.txid() == prevout.txid)
        .filter(|tx| tx.output.get(prevout.vout as usize) == Some(&txout));

    match is_witness_spend(&txout.script_pubkey, input.redeem_script.as_ref(), provider) {
        Some(true) => input.witness_utxo = Some(txout),
        Some(false) => input.non_witness_utxo = prev_tx,
        None => {
            log::trace!("Can't tell if '{}' is a witness spend", prevout);
            if options.attach_both_when_unknown || prev_tx.is_none() {
                input.witness_utxo = Some(txout);
            }
            input.non_witness_utxo = prev_tx;
        }
    }

    input.has_utxo()
}

impl Container {
    /// Fill the spending context of the inputs, and the scripts and key origins of inputs and
    /// outputs, from the UTXO set and the wallet.
    ///
    /// Finalized inputs are never touched, and a coin missing from the UTXO set is not an
    /// error. See the per-input outcomes.
    pub fn update(
        &mut self,
        utxos: &dyn UtxoLookup,
        provider: &dyn SigningProvider,
        options: &UpdateOptions,
    ) -> Vec<UpdateOutcome> {
        let psbt = self.psbt_mut();
        let mut outcomes = Vec::with_capacity(psbt.inputs.len());

        for (txin, input) in psbt
            .global
            .unsigned_tx
            .input
            .iter()
            .zip(psbt.inputs.iter_mut())
        {
            if input.is_final() {
                outcomes.push(UpdateOutcome::AlreadyFinal);
                continue;
            }
            let before = input.clone();

            let prevout = txin.previous_output;
            if !input.has_utxo() && !attach_utxo(input, &prevout, utxos, provider, options) {
                log::debug!("Spent coin '{}' not found", prevout);
                outcomes.push(UpdateOutcome::UtxoNotFound);
                continue;
            }

            if let Some(utxo) = input.spent_txout(&prevout).cloned() {
                match resolve(
                    &utxo.script_pubkey,
                    input.redeem_script.as_ref(),
                    input.witness_script.as_ref(),
                    provider,
                ) {
                    Ok(info) => {
                        let keys = info.known_keys(&InputSatisfier {
                            input: &*input,
                            provider,
                            sighash_type: None,
                        });
                        if input.redeem_script.is_none() {
                            input.redeem_script = info.redeem_script;
                        }
                        if input.witness_script.is_none() {
                            input.witness_script = info.witness_script;
                        }
                        if options.include_derivations {
                            for pubkey in keys {
                                if let Some(origin) = provider.key_origin(&pubkey) {
                                    input.bip32_derivation.entry(pubkey).or_insert(origin);
                                }
                            }
                        }
                    }
                    Err(e) => log::trace!("Can't resolve spend of '{}': {}", prevout, e),
                }
            }

            outcomes.push(if *input == before {
                UpdateOutcome::Unchanged
            } else {
                UpdateOutcome::Updated
            });
        }

        for (txout, output) in psbt
            .global
            .unsigned_tx
            .output
            .iter()
            .zip(psbt.outputs.iter_mut())
        {
            let info = match resolve(
                &txout.script_pubkey,
                output.redeem_script.as_ref(),
                output.witness_script.as_ref(),
                provider,
            ) {
                Ok(info) => info,
                // Most likely not ours
                Err(_) => continue,
            };

            if output.redeem_script.is_none() {
                output.redeem_script = info.redeem_script.clone();
            }
            if output.witness_script.is_none() {
                output.witness_script = info.witness_script.clone();
            }
            if options.include_derivations {
                for pubkey in info.known_keys(&ProviderKeys(provider)) {
                    if let Some(origin) = provider.key_origin(&pubkey) {
                        output.bip32_derivation.entry(pubkey).or_insert(origin);
                    }
                }
            }
        }

        log::debug!(
            "Update pass over '{}': '{}' inputs updated",
            self.txid(),
            outcomes
                .iter()
                .filter(|o| **o == UpdateOutcome::Updated)
                .count()
        );

        outcomes
    }
}
