use crate::{
    container::Container,
    error::*,
    txins::{TxInRequest, MAX_BIP125_RBF_SEQUENCE, SEQUENCE_FINAL, SEQUENCE_LOCKTIME_ENABLED},
};

use miniscript::bitcoin::{Transaction, TxOut};

/// nVersion of the transactions we create.
pub const TX_VERSION: i32 = 2;

/// How to shape the skeleton of a new container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateOptions {
    /// The transaction nLockTime, 0 for none.
    pub locktime: u32,
    /// Signal opt-in replaceability on every input.
    pub replaceable: bool,
}

/// The nSequence for an input without an explicit one. Funding code adding inputs after
/// creation should use this too.
pub fn sequence_for(options: &CreateOptions) -> u32 {
    if options.replaceable {
        MAX_BIP125_RBF_SEQUENCE
    } else if options.locktime != 0 {
        SEQUENCE_LOCKTIME_ENABLED
    } else {
        SEQUENCE_FINAL
    }
}

impl Container {
    /// Create a container spending these coins to these outputs, without any spending data.
    ///
    /// Outputs are kept in order, as given. Will error if an explicit nSequence opts out of
    /// replaceability while it was requested.
    pub fn create(
        inputs: &[TxInRequest],
        outputs: Vec<TxOut>,
        options: &CreateOptions,
    ) -> Result<Container, Error> {
        let default_sequence = sequence_for(options);

        let mut txins = Vec::with_capacity(inputs.len());
        for (i, request) in inputs.iter().enumerate() {
            if options.replaceable && request.signals_rbf() == Some(false) {
                return Err(PipelineError::ReplaceabilityConflict(i).into());
            }
            txins.push(request.as_unsigned_txin(request.sequence.unwrap_or(default_sequence)));
        }

        let tx = Transaction {
            version: TX_VERSION,
            lock_time: options.locktime,
            input: txins,
            output: outputs,
        };
        log::debug!(
            "Created container for '{}' with '{}' inputs and '{}' outputs",
            tx.txid(),
            tx.input.len(),
            tx.output.len()
        );

        Ok(Container::new_unchecked(tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        container::{InputExt, InputState, OutputExt},
        tests_helpers::*,
    };

    use miniscript::bitcoin::Script;

    #[test]
    fn sequence_policy() {
        let mut rng = fastrand::Rng::new();
        let (a, b) = (random_outpoint(&mut rng), random_outpoint(&mut rng));
        let inputs = [TxInRequest::new(a), TxInRequest::with_sequence(b, 42)];

        let container = Container::create(&inputs, vec![], &CreateOptions::default()).unwrap();
        let tx = container.unsigned_tx();
        assert_eq!(tx.version, TX_VERSION);
        assert_eq!(tx.lock_time, 0);
        assert_eq!(tx.input[0].sequence, 0xff_ff_ff_ff);
        assert_eq!(tx.input[1].sequence, 42);

        let options = CreateOptions {
            locktime: 600_000,
            replaceable: false,
        };
        let container = Container::create(&inputs, vec![], &options).unwrap();
        assert_eq!(container.unsigned_tx().lock_time, 600_000);
        assert_eq!(container.unsigned_tx().input[0].sequence, 0xff_ff_ff_fe);

        let options = CreateOptions {
            locktime: 600_000,
            replaceable: true,
        };
        let container = Container::create(&inputs, vec![], &options).unwrap();
        assert_eq!(container.unsigned_tx().input[0].sequence, 0xff_ff_ff_fd);
        assert_eq!(sequence_for(&options), MAX_BIP125_RBF_SEQUENCE);

        // An explicit final sequence contradicts the replaceable option
        let inputs = [TxInRequest::new(a), TxInRequest::with_sequence(b, 0xff_ff_ff_fe)];
        assert_eq!(
            Container::create(&inputs, vec![], &options),
            Err(Error::Pipeline(PipelineError::ReplaceabilityConflict(1)))
        );
    }

    #[test]
    fn outputs_kept_as_is() {
        let mut rng = fastrand::Rng::new();
        let dest = Script::from(vec![0x00, 0x14, 0x42]);
        let outputs = vec![
            TxOut {
                value: 10_000,
                script_pubkey: dest.clone(),
            },
            TxOut {
                value: 5_000,
                script_pubkey: Script::new(),
            },
            TxOut {
                value: 10_000,
                script_pubkey: dest,
            },
        ];

        let container = Container::create(
            &[random_outpoint(&mut rng).into()],
            outputs.clone(),
            &CreateOptions::default(),
        )
        .unwrap();
        assert_eq!(container.unsigned_tx().output, outputs);
        assert_eq!(container.outputs().len(), 3);
        assert!(container.outputs().iter().all(|o| o.is_empty()));
        assert_eq!(container.inputs()[0].state(), InputState::Unsigned);
        assert!(!container.inputs()[0].has_partial_data());
        assert!(!container.inputs()[0].has_utxo());

        let decoded = Container::deserialize(&container.serialize()).unwrap();
        assert_eq!(decoded, container);
    }
}
