use crate::{
    container::{Container, InputExt},
    error::*,
};

use miniscript::bitcoin::{util::psbt::PartiallySignedTransaction as Psbt, Transaction};

use std::collections::HashSet;

impl Container {
    /// Build a larger transaction out of independent ones.
    ///
    /// Inputs and outputs are concatenated in the order of the containers. The result has the
    /// highest version and the lowest locktime of all of them. Signatures commit to the
    /// skeleton they were made for, so they are all dropped (scripts and key origins are kept).
    pub fn join(containers: Vec<Container>) -> Result<Container, Error> {
        if containers.len() < 2 {
            return Err(PipelineError::NotEnoughToJoin(containers.len()).into());
        }

        let mut seen = HashSet::new();
        for container in containers.iter() {
            for txin in container.unsigned_tx().input.iter() {
                if !seen.insert(txin.previous_output) {
                    return Err(PipelineError::OverlappingInputs(txin.previous_output).into());
                }
            }
        }

        let first_tx = containers[0].unsigned_tx();
        let mut joined = Psbt::from_unsigned_tx(Transaction {
            version: first_tx.version,
            lock_time: first_tx.lock_time,
            input: vec![],
            output: vec![],
        })
        .expect("An empty transaction has no signature");
        joined.inputs.reserve(seen.len());

        for container in containers {
            let Psbt {
                global,
                inputs,
                outputs,
            } = container.into_psbt();
            let tx = &mut joined.global.unsigned_tx;
            tx.version = tx.version.max(global.unsigned_tx.version);
            tx.lock_time = tx.lock_time.min(global.unsigned_tx.lock_time);
            tx.input.extend(global.unsigned_tx.input);
            tx.output.extend(global.unsigned_tx.output);

            joined.inputs.extend(inputs.into_iter().map(|mut input| {
                input.reset_signatures();
                input
            }));
            joined.outputs.extend(outputs);
            for (xpub, origin) in global.xpub {
                joined.global.xpub.entry(xpub).or_insert(origin);
            }
            for (key, value) in global.proprietary {
                joined.global.proprietary.entry(key).or_insert(value);
            }
            for (key, value) in global.unknown {
                joined.global.unknown.entry(key).or_insert(value);
            }
        }
        log::debug!(
            "Joined into '{}' with '{}' inputs and '{}' outputs",
            joined.global.unsigned_tx.txid(),
            joined.inputs.len(),
            joined.outputs.len()
        );

        Container::from_psbt(joined)
    }
}
