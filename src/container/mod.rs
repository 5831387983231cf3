//! # Containers
//!
//! The partially signed transaction threaded through every role: the unsigned transaction
//! ("skeleton") plus one map of side-car data per input and per output.
//!
//! This is a checked wrapper around rust-bitcoin's
//! [bip-0174](https://github.com/bitcoin/bips/blob/master/bip-0174.mediawiki) data model.

mod input;
mod output;

pub use input::{InputExt, InputState};
pub use output::OutputExt;

use crate::error::*;

use miniscript::bitcoin::{
    blockdata::constants::max_money,
    util::psbt::{self, raw, PartiallySignedTransaction as Psbt},
    Network, Transaction, TxOut, Txid,
};

use std::collections::BTreeMap;

/// A partially signed transaction.
///
/// There is always exactly one input map per skeleton input and one output map per skeleton
/// output, the skeleton never carries a scriptSig nor a witness, and a final input never
/// carries partial data.
#[derive(Debug, Clone, PartialEq)]
pub struct Container(Psbt);

impl Container {
    /// Wrap an unsigned transaction with empty maps. Assumes the transaction has no
    /// scriptSig and no witness.
    pub(crate) fn new_unchecked(tx: Transaction) -> Container {
        Container(
            Psbt::from_unsigned_tx(tx).expect("The transaction has no scriptSig nor witness"),
        )
    }

    /// Create a container out of a plain network transaction.
    ///
    /// If any input carries a scriptSig or a witness this is refused, unless `permit_sig_data`
    /// in which case they are stripped.
    pub fn from_unsigned_tx(mut tx: Transaction, permit_sig_data: bool) -> Result<Container, Error> {
        for txin in tx.input.iter_mut() {
            if !txin.script_sig.is_empty() || !txin.witness.is_empty() {
                if !permit_sig_data {
                    return Err(FormatError::AlreadySigned.into());
                }
                log::debug!("Stripping signature data from input '{}'", txin.previous_output);
                txin.script_sig = Default::default();
                txin.witness.clear();
            }
        }

        Ok(Container::new_unchecked(tx))
    }

    /// Check a PSBT and wrap it.
    ///
    /// Partial data left on an already finalized input is dropped.
    pub fn from_psbt(mut psbt: Psbt) -> Result<Container, Error> {
        let tx = &psbt.global.unsigned_tx;
        if tx
            .input
            .iter()
            .any(|txin| !txin.script_sig.is_empty() || !txin.witness.is_empty())
        {
            return Err(FormatError::AlreadySigned.into());
        }
        if tx.input.len() != psbt.inputs.len() {
            return Err(
                StructuralError::InputCountMismatch(tx.input.len(), psbt.inputs.len()).into(),
            );
        }
        if tx.output.len() != psbt.outputs.len() {
            return Err(
                StructuralError::OutputCountMismatch(tx.output.len(), psbt.outputs.len()).into(),
            );
        }

        for (i, (txin, input)) in tx.input.iter().zip(psbt.inputs.iter_mut()).enumerate() {
            if let Some(ref prev_tx) = input.non_witness_utxo {
                if prev_tx.txid() != txin.previous_output.txid
                    || prev_tx.output.len() <= txin.previous_output.vout as usize
                {
                    return Err(StructuralError::PrevTxMismatch(i).into());
                }
            }

            if input.is_final() && input.has_partial_data() {
                log::trace!("Dropping partial data of finalized input '{}'", i);
                let (script_sig, witness) = (
                    input.final_script_sig.take(),
                    input.final_script_witness.take(),
                );
                input.finalize_with(script_sig, witness);
            }
        }

        Ok(Container(psbt))
    }

    pub fn psbt(&self) -> &Psbt {
        &self.0
    }

    pub(crate) fn psbt_mut(&mut self) -> &mut Psbt {
        &mut self.0
    }

    pub fn into_psbt(self) -> Psbt {
        self.0
    }

    /// Get a reference to the skeleton
    pub fn unsigned_tx(&self) -> &Transaction {
        &self.0.global.unsigned_tx
    }

    /// Get the unsigned transaction id
    pub fn txid(&self) -> Txid {
        self.0.global.unsigned_tx.txid()
    }

    pub fn inputs(&self) -> &[psbt::Input] {
        &self.0.inputs
    }

    pub fn outputs(&self) -> &[psbt::Output] {
        &self.0.outputs
    }

    /// Mutable access to the input maps. Their count can't be changed through this.
    pub fn inputs_mut(&mut self) -> &mut [psbt::Input] {
        &mut self.0.inputs
    }

    pub fn outputs_mut(&mut self) -> &mut [psbt::Output] {
        &mut self.0.outputs
    }

    /// Global pairs we don't understand, passed through verbatim.
    pub fn unknown(&self) -> &BTreeMap<raw::Key, Vec<u8>> {
        &self.0.global.unknown
    }

    pub fn unknown_mut(&mut self) -> &mut BTreeMap<raw::Key, Vec<u8>> {
        &mut self.0.global.unknown
    }

    /// Get the output spent by this input, if the map has the context for it.
    pub fn spent_txout(&self, input_index: usize) -> Option<&TxOut> {
        let txin = self.unsigned_tx().input.get(input_index)?;
        self.0
            .inputs
            .get(input_index)?
            .spent_txout(&txin.previous_output)
    }

    /// Whether every input was finalized.
    pub fn is_finalized(&self) -> bool {
        self.0.inputs.iter().all(|input| input.is_final())
    }

    /// Returns the absolute fees paid by this transaction.
    ///
    /// Returns None if:
    /// - The spent output is unknown for one of the inputs
    /// - There is an overflow or underflow when computing the fees, or an insane amount
    pub fn fee(&self) -> Option<u64> {
        let mut value_in: u64 = 0;
        for i in 0..self.0.inputs.len() {
            let value = self.spent_txout(i)?.value;
            if value > max_money(Network::Bitcoin) {
                return None;
            }
            value_in = value_in.checked_add(value)?;
        }

        let mut value_out: u64 = 0;
        for o in self.unsigned_tx().output.iter() {
            if o.value > max_money(Network::Bitcoin) {
                return None;
            }
            value_out = value_out.checked_add(o.value)?;
        }

        value_in.checked_sub(value_out)
    }
}
