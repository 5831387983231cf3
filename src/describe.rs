//! # Description
//!
//! A human-readable view of a container, laid out the way `decodepsbt` does. Amounts are in
//! satoshis, raw data in lowercase hex.

use crate::container::Container;

use miniscript::bitcoin::{
    hashes::hex::ToHex,
    util::{
        bip32::{ExtendedPubKey, KeySource},
        psbt::{self, raw},
    },
    PublicKey, Script, Transaction, TxIn, TxOut,
};

use serde::ser::{Serialize, SerializeStruct, Serializer};

use std::{collections::BTreeMap, fmt};

/// Serializes the decoded content of a container.
#[derive(Debug, Clone, Copy)]
pub struct Description<'a>(&'a Container);

impl Container {
    pub fn describe(&self) -> Description {
        Description(self)
    }
}

fn hex_map<K: fmt::Display>(map: &BTreeMap<K, Vec<u8>>) -> BTreeMap<String, String> {
    map.iter()
        .map(|(k, v)| (k.to_string(), v.to_hex()))
        .collect()
}

// The key is shown with its type byte, as it is serialized.
fn unknown_map(map: &BTreeMap<raw::Key, Vec<u8>>) -> BTreeMap<String, String> {
    map.iter()
        .map(|(k, v)| {
            let mut key = Vec::with_capacity(k.key.len() + 1);
            key.push(k.type_value);
            key.extend_from_slice(&k.key);
            (key.to_hex(), v.to_hex())
        })
        .collect()
}

struct ScriptView<'a>(&'a Script);

impl<'a> Serialize for ScriptView<'a> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Script", 2)?;
        state.serialize_field("asm", &self.0.asm())?;
        state.serialize_field("hex", &self.0.as_bytes().to_hex())?;
        state.end()
    }
}

struct TxOutView<'a>(&'a TxOut);

impl<'a> Serialize for TxOutView<'a> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TxOut", 2)?;
        state.serialize_field("amount", &self.0.value)?;
        state.serialize_field("scriptPubKey", &ScriptView(&self.0.script_pubkey))?;
        state.end()
    }
}

struct TxInView<'a>(&'a TxIn);

impl<'a> Serialize for TxInView<'a> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let txin = self.0;
        let mut state = serializer.serialize_struct("TxIn", 5)?;
        state.serialize_field("txid", &txin.previous_output.txid.to_string())?;
        state.serialize_field("vout", &txin.previous_output.vout)?;
        state.serialize_field("scriptSig", &ScriptView(&txin.script_sig))?;
        if !txin.witness.is_empty() {
            let witness: Vec<String> = txin.witness.iter().map(|w| w.to_hex()).collect();
            state.serialize_field("txinwitness", &witness)?;
        }
        state.serialize_field("sequence", &txin.sequence)?;
        state.end()
    }
}

// An output of the skeleton, with its index.
struct VoutView<'a>(usize, &'a TxOut);

impl<'a> Serialize for VoutView<'a> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Vout", 3)?;
        state.serialize_field("value", &self.1.value)?;
        state.serialize_field("n", &self.0)?;
        state.serialize_field("scriptPubKey", &ScriptView(&self.1.script_pubkey))?;
        state.end()
    }
}

struct TxView<'a>(&'a Transaction);

impl<'a> Serialize for TxView<'a> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let tx = self.0;
        let vin: Vec<TxInView> = tx.input.iter().map(TxInView).collect();
        let vout: Vec<VoutView> = tx
            .output
            .iter()
            .enumerate()
            .map(|(n, txout)| VoutView(n, txout))
            .collect();

        let mut state = serializer.serialize_struct("Transaction", 5)?;
        state.serialize_field("txid", &tx.txid().to_string())?;
        state.serialize_field("version", &tx.version)?;
        state.serialize_field("locktime", &tx.lock_time)?;
        state.serialize_field("vin", &vin)?;
        state.serialize_field("vout", &vout)?;
        state.end()
    }
}

// A key, under this field name, and where it comes from.
struct Origin<K>(&'static str, K, KeySource);

impl<K: fmt::Display> Serialize for Origin<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (ref fingerprint, ref path) = self.2;
        let mut state = serializer.serialize_struct("Origin", 3)?;
        state.serialize_field(self.0, &self.1.to_string())?;
        state.serialize_field("master_fingerprint", &fingerprint.to_string())?;
        state.serialize_field("path", &path.to_string())?;
        state.end()
    }
}

fn derivations(map: &BTreeMap<PublicKey, KeySource>) -> Vec<Origin<PublicKey>> {
    map.iter()
        .map(|(pubkey, origin)| Origin("pubkey", *pubkey, origin.clone()))
        .collect()
}

struct ProprietaryView<'a>(&'a raw::ProprietaryKey, &'a [u8]);

impl<'a> Serialize for ProprietaryView<'a> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Proprietary", 4)?;
        state.serialize_field("identifier", &self.0.prefix.to_hex())?;
        state.serialize_field("subtype", &self.0.subtype)?;
        state.serialize_field("key", &self.0.key.to_hex())?;
        state.serialize_field("value", &self.1.to_hex())?;
        state.end()
    }
}

fn proprietary(map: &BTreeMap<raw::ProprietaryKey, Vec<u8>>) -> Vec<ProprietaryView> {
    map.iter()
        .map(|(key, value)| ProprietaryView(key, value))
        .collect()
}

struct InputView<'a>(&'a psbt::Input);

impl<'a> Serialize for InputView<'a> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let input = self.0;
        let mut state = serializer.serialize_struct("Input", 16)?;

        if let Some(ref tx) = input.non_witness_utxo {
            state.serialize_field("non_witness_utxo", &TxView(tx))?;
        }
        if let Some(ref txout) = input.witness_utxo {
            state.serialize_field("witness_utxo", &TxOutView(txout))?;
        }
        if !input.partial_sigs.is_empty() {
            state.serialize_field("partial_signatures", &hex_map(&input.partial_sigs))?;
        }
        if let Some(sighash_type) = input.sighash_type {
            state.serialize_field(
                "sighash",
                &sighash_type.to_string().replace("SIGHASH_", ""),
            )?;
        }
        if let Some(ref script) = input.redeem_script {
            state.serialize_field("redeem_script", &ScriptView(script))?;
        }
        if let Some(ref script) = input.witness_script {
            state.serialize_field("witness_script", &ScriptView(script))?;
        }
        if !input.bip32_derivation.is_empty() {
            state.serialize_field("bip32_derivs", &derivations(&input.bip32_derivation))?;
        }
        if let Some(ref script) = input.final_script_sig {
            state.serialize_field("final_scriptSig", &ScriptView(script))?;
        }
        if let Some(ref witness) = input.final_script_witness {
            let witness: Vec<String> = witness.iter().map(|w| w.to_hex()).collect();
            state.serialize_field("final_scriptwitness", &witness)?;
        }
        if !input.ripemd160_preimages.is_empty() {
            state.serialize_field("ripemd160_preimages", &hex_map(&input.ripemd160_preimages))?;
        }
        if !input.sha256_preimages.is_empty() {
            state.serialize_field("sha256_preimages", &hex_map(&input.sha256_preimages))?;
        }
        if !input.hash160_preimages.is_empty() {
            state.serialize_field("hash160_preimages", &hex_map(&input.hash160_preimages))?;
        }
        if !input.hash256_preimages.is_empty() {
            state.serialize_field("hash256_preimages", &hex_map(&input.hash256_preimages))?;
        }
        if !input.unknown.is_empty() {
            state.serialize_field("unknown", &unknown_map(&input.unknown))?;
        }
        if !input.proprietary.is_empty() {
            state.serialize_field("proprietary", &proprietary(&input.proprietary))?;
        }

        state.end()
    }
}

struct OutputView<'a>(&'a psbt::Output);

impl<'a> Serialize for OutputView<'a> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let output = self.0;
        let mut state = serializer.serialize_struct("Output", 5)?;

        if let Some(ref script) = output.redeem_script {
            state.serialize_field("redeem_script", &ScriptView(script))?;
        }
        if let Some(ref script) = output.witness_script {
            state.serialize_field("witness_script", &ScriptView(script))?;
        }
        if !output.bip32_derivation.is_empty() {
            state.serialize_field("bip32_derivs", &derivations(&output.bip32_derivation))?;
        }
        if !output.unknown.is_empty() {
            state.serialize_field("unknown", &unknown_map(&output.unknown))?;
        }
        if !output.proprietary.is_empty() {
            state.serialize_field("proprietary", &proprietary(&output.proprietary))?;
        }

        state.end()
    }
}

impl<'a> Serialize for Description<'a> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let psbt = self.0.psbt();
        let xpubs: Vec<Origin<ExtendedPubKey>> = psbt
            .global
            .xpub
            .iter()
            .map(|(xpub, origin)| Origin("xpub", *xpub, origin.clone()))
            .collect();
        let inputs: Vec<InputView> = psbt.inputs.iter().map(InputView).collect();
        let outputs: Vec<OutputView> = psbt.outputs.iter().map(OutputView).collect();

        let mut state = serializer.serialize_struct("Description", 8)?;
        state.serialize_field("tx", &TxView(&psbt.global.unsigned_tx))?;
        state.serialize_field("global_xpubs", &xpubs)?;
        state.serialize_field("psbt_version", &psbt.global.version)?;
        state.serialize_field("proprietary", &proprietary(&psbt.global.proprietary))?;
        state.serialize_field("unknown", &unknown_map(&psbt.global.unknown))?;
        state.serialize_field("inputs", &inputs)?;
        state.serialize_field("outputs", &outputs)?;
        if let Some(fee) = self.0.fee() {
            state.serialize_field("fee", &fee)?;
        }
        state.end()
    }
}
