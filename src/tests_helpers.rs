//! In-memory collaborators and transaction builders for tests and fuzzing.

use crate::providers::{Declined, SigningContext, SigningOracle, SigningProvider, UtxoLookup};

use miniscript::bitcoin::{
    blockdata::{opcodes, script::Builder},
    hashes::Hash,
    secp256k1,
    util::bip32::{self, ChildNumber, DerivationPath, KeySource},
    Network, OutPoint, PubkeyHash, PublicKey, Script, ScriptHash, SigHashType, Transaction, TxIn,
    TxOut, Txid, WScriptHash,
};

use std::{collections::HashMap, iter::repeat_with};

pub fn get_random_privkey(rng: &mut fastrand::Rng) -> bip32::ExtendedPrivKey {
    let rand_bytes: Vec<u8> = repeat_with(|| rng.u8(..)).take(64).collect();

    bip32::ExtendedPrivKey::new_master(Network::Bitcoin, &rand_bytes)
        .unwrap_or_else(|_| get_random_privkey(rng))
}

pub fn random_outpoint(rng: &mut fastrand::Rng) -> OutPoint {
    let rand_bytes: Vec<u8> = repeat_with(|| rng.u8(..)).take(32).collect();

    OutPoint {
        txid: Txid::from_slice(&rand_bytes).unwrap(),
        vout: rng.u32(..8),
    }
}

/// A wallet holding private keys derived from a random master key at `m/0/i`, and a few
/// scripts.
#[derive(Debug, Clone)]
pub struct KeyRing {
    secp: secp256k1::Secp256k1<secp256k1::All>,
    keys: Vec<(PublicKey, secp256k1::SecretKey, KeySource)>,
    scripts: Vec<Script>,
}

impl KeyRing {
    pub fn random(n_keys: usize, secp: &secp256k1::Secp256k1<secp256k1::All>) -> KeyRing {
        let mut rng = fastrand::Rng::new();
        let master = get_random_privkey(&mut rng);
        let fingerprint = master.fingerprint(secp);

        let keys = (0..n_keys)
            .map(|i| {
                let path = DerivationPath::from(vec![
                    ChildNumber::from_normal_idx(0).unwrap(),
                    ChildNumber::from_normal_idx(i as u32).unwrap(),
                ]);
                let xpriv = master.derive_priv(secp, &path).unwrap();
                (
                    xpriv.private_key.public_key(secp),
                    xpriv.private_key.key,
                    (fingerprint, path),
                )
            })
            .collect();

        KeyRing {
            secp: secp.clone(),
            keys,
            scripts: vec![],
        }
    }

    /// The public keys, in derivation order.
    pub fn pubkeys(&self) -> Vec<PublicKey> {
        self.keys.iter().map(|(pk, _, _)| *pk).collect()
    }

    /// Make this redeem or witness script known.
    pub fn add_script(&mut self, script: Script) {
        self.scripts.push(script);
    }

    /// A wallet with only some of our keys, and all of our scripts.
    pub fn subset(&self, indexes: &[usize]) -> KeyRing {
        KeyRing {
            secp: self.secp.clone(),
            keys: indexes.iter().map(|i| self.keys[*i].clone()).collect(),
            scripts: self.scripts.clone(),
        }
    }

    /// A valid signature by this key of a message made of `msg_byte` repeated, followed by the
    /// sighash type byte.
    pub fn raw_signature(
        &self,
        pubkey: &PublicKey,
        msg_byte: u8,
        sighash_type: SigHashType,
    ) -> Vec<u8> {
        let (_, seckey, _) = self
            .keys
            .iter()
            .find(|(pk, _, _)| pk == pubkey)
            .expect("Key is part of the ring");
        let msg = secp256k1::Message::from_slice(&[msg_byte; 32]).unwrap();
        let mut sig = self.secp.sign(&msg, seckey).serialize_der().to_vec();
        sig.push(sighash_type.as_u32() as u8);
        sig
    }
}

impl SigningProvider for KeyRing {
    fn pubkey(&self, hash: &PubkeyHash) -> Option<PublicKey> {
        self.keys
            .iter()
            .map(|(pk, _, _)| *pk)
            .find(|pk| pk.pubkey_hash() == *hash)
    }

    fn redeem_script(&self, hash: &ScriptHash) -> Option<Script> {
        let spk = Script::new_p2sh(hash);
        self.scripts.iter().find(|s| s.to_p2sh() == spk).cloned()
    }

    fn witness_script(&self, hash: &WScriptHash) -> Option<Script> {
        let spk = Script::new_v0_wsh(hash);
        self.scripts.iter().find(|s| s.to_v0_p2wsh() == spk).cloned()
    }

    fn key_origin(&self, pubkey: &PublicKey) -> Option<KeySource> {
        self.keys
            .iter()
            .find(|(pk, _, _)| pk == pubkey)
            .map(|(_, _, origin)| origin.clone())
    }
}

impl SigningOracle for KeyRing {
    fn sign(&self, context: &SigningContext, pubkey: &PublicKey) -> Result<Vec<u8>, Declined> {
        let (_, seckey, _) = self
            .keys
            .iter()
            .find(|(pk, _, _)| pk == pubkey)
            .ok_or_else(|| Declined(format!("unknown key '{}'", pubkey)))?;
        let msg = secp256k1::Message::from_slice(&context.sighash[..])
            .map_err(|e| Declined(e.to_string()))?;

        Ok(self.secp.sign(&msg, seckey).serialize_der().to_vec())
    }
}

/// A UTXO set made of whole transactions.
#[derive(Debug, Clone, Default)]
pub struct UtxoSet {
    txs: HashMap<Txid, Transaction>,
}

impl UtxoSet {
    pub fn add(&mut self, tx: Transaction) {
        self.txs.insert(tx.txid(), tx);
    }
}

impl UtxoLookup for UtxoSet {
    fn txout(&self, outpoint: &OutPoint) -> Option<TxOut> {
        self.txs
            .get(&outpoint.txid)
            .and_then(|tx| tx.output.get(outpoint.vout as usize))
            .cloned()
    }

    fn previous_transaction(&self, txid: &Txid) -> Option<Transaction> {
        self.txs.get(txid).cloned()
    }
}

/// A transaction spending a random coin to these outputs.
pub fn funding_tx(outputs: &[(Script, u64)]) -> Transaction {
    let mut rng = fastrand::Rng::new();
    Transaction {
        version: 2,
        lock_time: 0,
        input: vec![TxIn {
            previous_output: random_outpoint(&mut rng),
            sequence: 0xff_ff_ff_ff,
            ..TxIn::default()
        }],
        output: outputs
            .iter()
            .map(|(script_pubkey, value)| TxOut {
                value: *value,
                script_pubkey: script_pubkey.clone(),
            })
            .collect(),
    }
}

/// An unsigned transaction spending these coins to these outputs.
pub fn spending_tx(prevouts: &[OutPoint], outputs: &[(Script, u64)]) -> Transaction {
    Transaction {
        version: 2,
        lock_time: 0,
        input: prevouts
            .iter()
            .map(|previous_output| TxIn {
                previous_output: *previous_output,
                sequence: 0xff_ff_ff_ff,
                ..TxIn::default()
            })
            .collect(),
        output: outputs
            .iter()
            .map(|(script_pubkey, value)| TxOut {
                value: *value,
                script_pubkey: script_pubkey.clone(),
            })
            .collect(),
    }
}

/// `k` OP_CHECKMULTISIG among these keys.
pub fn multisig_script(k: usize, keys: &[PublicKey]) -> Script {
    let mut builder = Builder::new().push_int(k as i64);
    for key in keys {
        builder = builder.push_key(key);
    }
    builder
        .push_int(keys.len() as i64)
        .push_opcode(opcodes::all::OP_CHECKMULTISIG)
        .into_script()
}
