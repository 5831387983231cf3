use crate::{
    container::{Container, InputExt},
    error::*,
};

use miniscript::bitcoin::util::psbt;

use std::collections::BTreeMap;

// First wins.
fn merge_map<K: Ord + Clone, V: Clone>(ours: &mut BTreeMap<K, V>, theirs: &BTreeMap<K, V>) {
    for (key, value) in theirs.iter() {
        ours.entry(key.clone()).or_insert_with(|| value.clone());
    }
}

// First present.
fn merge_field<T: Clone>(ours: &mut Option<T>, theirs: &Option<T>) {
    if ours.is_none() {
        *ours = theirs.clone();
    }
}

fn merge_input(
    ours: &mut psbt::Input,
    theirs: &psbt::Input,
    input_index: usize,
) -> Result<(), Error> {
    // Both forms of the spent output are kept, whichever side brings them.
    merge_field(&mut ours.non_witness_utxo, &theirs.non_witness_utxo);
    merge_field(&mut ours.witness_utxo, &theirs.witness_utxo);
    merge_map(&mut ours.proprietary, &theirs.proprietary);
    merge_map(&mut ours.unknown, &theirs.unknown);

    match (ours.is_final(), theirs.is_final()) {
        (true, true) => {
            merge_field(&mut ours.final_script_sig, &theirs.final_script_sig);
            merge_field(&mut ours.final_script_witness, &theirs.final_script_witness);
        }
        // Their final data wins over our partial data, never the other way around.
        (false, true) => ours.finalize_with(
            theirs.final_script_sig.clone(),
            theirs.final_script_witness.clone(),
        ),
        (true, false) => {}
        (false, false) => {
            for (pubkey, sig) in theirs.partial_sigs.iter() {
                match ours.partial_sigs.get(pubkey) {
                    Some(our_sig) if our_sig != sig => {
                        return Err(PipelineError::SignatureConflict {
                            input_index,
                            pubkey: *pubkey,
                        }
                        .into())
                    }
                    Some(_) => {}
                    None => {
                        ours.partial_sigs.insert(*pubkey, sig.clone());
                    }
                }
            }
            merge_map(&mut ours.bip32_derivation, &theirs.bip32_derivation);
            merge_field(&mut ours.redeem_script, &theirs.redeem_script);
            merge_field(&mut ours.witness_script, &theirs.witness_script);
            merge_field(&mut ours.sighash_type, &theirs.sighash_type);
            merge_map(&mut ours.ripemd160_preimages, &theirs.ripemd160_preimages);
            merge_map(&mut ours.sha256_preimages, &theirs.sha256_preimages);
            merge_map(&mut ours.hash160_preimages, &theirs.hash160_preimages);
            merge_map(&mut ours.hash256_preimages, &theirs.hash256_preimages);
        }
    }

    Ok(())
}

fn merge_output(ours: &mut psbt::Output, theirs: &psbt::Output) {
    merge_map(&mut ours.bip32_derivation, &theirs.bip32_derivation);
    merge_field(&mut ours.redeem_script, &theirs.redeem_script);
    merge_field(&mut ours.witness_script, &theirs.witness_script);
    merge_map(&mut ours.proprietary, &theirs.proprietary);
    merge_map(&mut ours.unknown, &theirs.unknown);
}

impl Container {
    /// Merge another view of the same transaction into this one.
    ///
    /// On error, this container is left untouched.
    pub fn merge(&mut self, other: &Container) -> Result<(), Error> {
        if self.txid() != other.txid() {
            return Err(StructuralError::SkeletonMismatch(self.txid(), other.txid()).into());
        }
        // Same skeleton, hence the same number of maps.
        let mut merged = self.clone();
        for (i, (ours, theirs)) in merged
            .inputs_mut()
            .iter_mut()
            .zip(other.inputs().iter())
            .enumerate()
        {
            merge_input(ours, theirs, i)?;
        }
        for (ours, theirs) in merged.outputs_mut().iter_mut().zip(other.outputs().iter()) {
            merge_output(ours, theirs);
        }
        let global = &mut merged.psbt_mut().global;
        merge_map(&mut global.xpub, &other.psbt().global.xpub);
        merge_map(&mut global.proprietary, &other.psbt().global.proprietary);
        merge_map(&mut global.unknown, &other.psbt().global.unknown);

        *self = merged;
        Ok(())
    }

    /// Merge views of the same transaction. On conflicting unknown values, the first one wins.
    pub fn combine(containers: Vec<Container>) -> Result<Container, Error> {
        let mut containers = containers.into_iter();
        let mut combined = containers.next().ok_or(PipelineError::EmptyCombineSet)?;

        for other in containers {
            combined.merge(&other)?;
        }
        log::debug!("Combined containers for '{}'", combined.txid());

        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        roles::{creator::CreateOptions, signer::SignOptions},
        tests_helpers::*,
    };

    use miniscript::bitcoin::{secp256k1, util::psbt::raw, OutPoint, Script, Transaction, TxOut};

    fn unknown_key(type_value: u8) -> raw::Key {
        raw::Key {
            type_value,
            key: vec![],
        }
    }

    fn multisig_container(keys: &KeyRing, k: usize) -> (Container, Transaction) {
        let multi = multisig_script(k, &keys.pubkeys());
        let prev_tx = funding_tx(&[(multi.to_v0_p2wsh(), 1_000_000)]);
        let mut container = Container::create(
            &[OutPoint {
                txid: prev_tx.txid(),
                vout: 0,
            }
            .into()],
            vec![TxOut {
                value: 990_000,
                script_pubkey: Script::new(),
            }],
            &CreateOptions::default(),
        )
        .unwrap();
        container.inputs_mut()[0].witness_utxo = Some(prev_tx.output[0].clone());
        container.inputs_mut()[0].witness_script = Some(multi);

        (container, prev_tx)
    }

    #[test]
    fn combine_preconditions() {
        assert_eq!(
            Container::combine(vec![]),
            Err(Error::Pipeline(PipelineError::EmptyCombineSet))
        );

        let secp = secp256k1::Secp256k1::new();
        let keys = KeyRing::random(2, &secp);
        let (a, _) = multisig_container(&keys, 2);
        assert_eq!(Container::combine(vec![a.clone()]), Ok(a.clone()));

        let (b, _) = multisig_container(&keys, 2);
        assert_eq!(
            Container::combine(vec![a.clone(), b.clone()]),
            Err(Error::Structural(StructuralError::SkeletonMismatch(
                a.txid(),
                b.txid()
            )))
        );
    }

    #[test]
    fn combine_signatures() {
        let secp = secp256k1::Secp256k1::new();
        let keys = KeyRing::random(3, &secp);
        let pks = keys.pubkeys();
        let (container, _) = multisig_container(&keys, 2);
        let options = SignOptions {
            finalize: false,
            ..SignOptions::default()
        };

        let (mut a, mut b) = (container.clone(), container.clone());
        a.unknown_mut().insert(unknown_key(0xf0), vec![0x01]);
        b.unknown_mut().insert(unknown_key(0xf0), vec![0x02]);
        b.outputs_mut()[0].unknown.insert(unknown_key(0xf1), vec![]);
        assert!(!a.sign(&keys.subset(&[0]), &options).complete);
        assert!(!b.sign(&keys.subset(&[2]), &options).complete);

        let ab = Container::combine(vec![a.clone(), b.clone()]).unwrap();
        let sigs = &ab.inputs()[0].partial_sigs;
        assert!(sigs.contains_key(&pks[0]) && sigs.contains_key(&pks[2]));
        assert_eq!(ab.unknown().get(&unknown_key(0xf0)), Some(&vec![0x01]));
        assert_eq!(ab.outputs()[0].unknown.len(), 1);

        // Commutative, except for the conflicting unknown
        let mut ba = Container::combine(vec![b.clone(), a.clone()]).unwrap();
        assert_eq!(ba.unknown().get(&unknown_key(0xf0)), Some(&vec![0x02]));
        ba.unknown_mut().insert(unknown_key(0xf0), vec![0x01]);
        assert_eq!(ab, ba);

        // Combining with itself changes nothing
        assert_eq!(Container::combine(vec![ab.clone(), ab.clone()]).unwrap(), ab);

        // A different signature by the same key
        let mut c = a.clone();
        c.inputs_mut()[0].partial_sigs.insert(pks[0], vec![0x30, 0x01]);
        assert_eq!(
            Container::combine(vec![a.clone(), c]),
            Err(Error::Pipeline(PipelineError::SignatureConflict {
                input_index: 0,
                pubkey: pks[0]
            }))
        );
    }

    #[test]
    fn combine_finalized() {
        let secp = secp256k1::Secp256k1::new();
        let keys = KeyRing::random(1, &secp);
        let (container, _) = multisig_container(&keys, 1);

        let mut finalized = container.clone();
        assert!(finalized.sign(&keys, &SignOptions::default()).complete);
        let mut pending = container.clone();
        pending.inputs_mut()[0].sighash_type = Some(miniscript::bitcoin::SigHashType::All);
        pending.inputs_mut()[0]
            .partial_sigs
            .insert(keys.pubkeys()[0], vec![0x30, 0x42]);

        let merged = Container::combine(vec![pending.clone(), finalized.clone()]).unwrap();
        assert_eq!(merged, finalized);
        let merged = Container::combine(vec![finalized.clone(), pending]).unwrap();
        assert_eq!(merged, finalized);

        // Missing final fields are completed from the other side
        let mut sig_only = container.clone();
        sig_only.inputs_mut()[0].finalize_with(Some(Script::from(vec![0x51])), None);
        let merged = Container::combine(vec![sig_only, finalized.clone()]).unwrap();
        let fin = &merged.inputs()[0];
        assert_eq!(fin.final_script_sig, Some(Script::from(vec![0x51])));
        assert_eq!(
            fin.final_script_witness,
            finalized.inputs()[0].final_script_witness
        );
    }

    #[test]
    fn combine_utxos() {
        let secp = secp256k1::Secp256k1::new();
        let keys = KeyRing::random(1, &secp);
        let (container, prev_tx) = multisig_container(&keys, 1);

        let mut legacy = container.clone();
        legacy.inputs_mut()[0].witness_utxo = None;
        legacy.inputs_mut()[0].non_witness_utxo = Some(prev_tx.clone());
        let mut bare = container.clone();
        bare.inputs_mut()[0].witness_utxo = None;
        let mut both = container.clone();
        both.inputs_mut()[0].non_witness_utxo = Some(prev_tx);

        // Whatever the order, every form of the spent output ends up in the result
        for (a, b) in &[
            (legacy.clone(), container.clone()),
            (both.clone(), legacy.clone()),
            (both.clone(), container.clone()),
            (both.clone(), bare.clone()),
        ] {
            let ab = Container::combine(vec![a.clone(), b.clone()]).unwrap();
            let ba = Container::combine(vec![b.clone(), a.clone()]).unwrap();
            assert_eq!(ab, ba);
            assert_eq!(ab, both);
        }

        let merged = Container::combine(vec![bare, legacy.clone()]).unwrap();
        assert_eq!(merged, legacy);
    }
}
