use crate::{
    container::{Container, InputExt},
    error::*,
};

use miniscript::bitcoin::{consensus::encode::serialize, Transaction};

impl Container {
    /// Get the network transaction out of a fully finalized container.
    pub fn extract_tx(&self) -> Result<Transaction, Error> {
        if let Some(i) = self.inputs().iter().position(|input| !input.is_final()) {
            return Err(PipelineError::NotFinalized(i).into());
        }

        Ok(self.psbt().clone().extract_tx())
    }

    /// Get the serialized network transaction out of a fully finalized container.
    pub fn extract(&self) -> Result<Vec<u8>, Error> {
        let tx = self.extract_tx()?;
        log::debug!("Extracted transaction '{}'", tx.txid());

        Ok(serialize(&tx))
    }
}
