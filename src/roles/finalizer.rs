use crate::{
    container::{Container, InputExt},
    error::*,
    providers::NoProvider,
    roles::signer::{process_input, SignOptions, SignOutcome},
};

use miniscript::bitcoin::SigHashType;

/// The result of a finalization pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Finalized {
    pub container: Container,
    /// Every input is finalized.
    pub complete: bool,
    pub outcomes: Vec<SignOutcome>,
    /// The network transaction, if extraction was requested.
    pub extracted: Option<Vec<u8>>,
}

impl Container {
    /// Turn the partial data of every satisfiable input into its final scriptSig and witness.
    ///
    /// Inputs that can't be satisfied yet are left as is. If `extract` is set, they make the
    /// whole call fail and otherwise the network transaction is returned along the container.
    pub fn finalize(mut self, extract: bool) -> Result<Finalized, Error> {
        let psbt = self.psbt_mut();
        let tx = &psbt.global.unsigned_tx;
        let outcomes: Vec<SignOutcome> = psbt
            .inputs
            .iter_mut()
            .enumerate()
            .map(|(i, input)| {
                let options = SignOptions {
                    sign: false,
                    sighash_type: input.sighash_type.unwrap_or(SigHashType::All),
                    finalize: true,
                    include_derivations: false,
                };
                process_input(tx, i, input, &NoProvider, &options)
            })
            .collect();
        let complete = self.is_finalized();
        log::debug!(
            "Finalization pass over '{}', complete: {}",
            self.txid(),
            complete
        );

        let extracted = if extract {
            if !complete {
                let incomplete = self
                    .inputs()
                    .iter()
                    .enumerate()
                    .filter(|(_, input)| !input.is_final())
                    .map(|(i, _)| i)
                    .collect();
                return Err(PipelineError::IncompleteForExtraction(incomplete).into());
            }
            Some(self.extract()?)
        } else {
            None
        };

        Ok(Finalized {
            container: self,
            complete,
            outcomes,
            extracted,
        })
    }
}
