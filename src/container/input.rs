//! Per-input side-car data.
//!
//! The slots are rust-bitcoin's PSBT input maps. Where an input stands is derived from its
//! fields, and entering the final state goes through [InputExt::finalize_with] only.

use miniscript::bitcoin::{util::psbt, OutPoint, Script, TxOut};

/// Where an input stands in the signing process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputState {
    /// No signature gathered yet. Scripts and key origins may be there.
    Unsigned,
    /// At least one partial signature.
    PartiallySigned,
    /// A final scriptSig or witness is set. Partial data was erased when entering this state.
    Final,
}

/// State and transitions of a PSBT input.
pub trait InputExt {
    fn state(&self) -> InputState;

    /// Whether a final scriptSig or witness is set, even an empty one.
    fn is_final(&self) -> bool;

    /// Whether the spent output is known, either way.
    fn has_utxo(&self) -> bool;

    /// Get the spent output. The witness UTXO takes precedence.
    fn spent_txout(&self, prevout: &OutPoint) -> Option<&TxOut>;

    /// Whether there is data only useful before finalization.
    fn has_partial_data(&self) -> bool;

    /// Enter the final state. Signatures, sighash type, scripts, key origins and preimages are
    /// dropped, only the UTXOs, the proprietary and the unknown pairs survive.
    ///
    /// If neither is given, an empty scriptSig is recorded.
    fn finalize_with(&mut self, script_sig: Option<Script>, script_witness: Option<Vec<Vec<u8>>>);

    /// Forget any signature (partial or final), as they commit to a skeleton that changed.
    /// Scripts and key origins of a non-final input are kept.
    fn reset_signatures(&mut self);
}

impl InputExt for psbt::Input {
    fn state(&self) -> InputState {
        if self.is_final() {
            InputState::Final
        } else if self.partial_sigs.is_empty() {
            InputState::Unsigned
        } else {
            InputState::PartiallySigned
        }
    }

    fn is_final(&self) -> bool {
        self.final_script_sig.is_some() || self.final_script_witness.is_some()
    }

    fn has_utxo(&self) -> bool {
        self.witness_utxo.is_some() || self.non_witness_utxo.is_some()
    }

    fn spent_txout(&self, prevout: &OutPoint) -> Option<&TxOut> {
        if let Some(ref txo) = self.witness_utxo {
            return Some(txo);
        }

        self.non_witness_utxo
            .as_ref()
            .filter(|tx| tx.txid() == prevout.txid)
            .and_then(|tx| tx.output.get(prevout.vout as usize))
    }

    fn has_partial_data(&self) -> bool {
        !self.partial_sigs.is_empty()
            || self.sighash_type.is_some()
            || self.redeem_script.is_some()
            || self.witness_script.is_some()
            || !self.bip32_derivation.is_empty()
            || !self.ripemd160_preimages.is_empty()
            || !self.sha256_preimages.is_empty()
            || !self.hash160_preimages.is_empty()
            || !self.hash256_preimages.is_empty()
    }

    fn finalize_with(&mut self, script_sig: Option<Script>, script_witness: Option<Vec<Vec<u8>>>) {
        self.final_script_sig = match (script_sig, &script_witness) {
            (None, None) => Some(Script::new()),
            (script_sig, _) => script_sig,
        };
        self.final_script_witness = script_witness;

        self.partial_sigs.clear();
        self.sighash_type = None;
        self.redeem_script = None;
        self.witness_script = None;
        self.bip32_derivation.clear();
        self.ripemd160_preimages.clear();
        self.sha256_preimages.clear();
        self.hash160_preimages.clear();
        self.hash256_preimages.clear();
    }

    fn reset_signatures(&mut self) {
        if self.is_final() {
            self.final_script_sig = None;
            self.final_script_witness = None;
        } else {
            self.partial_sigs.clear();
        }
    }
}
