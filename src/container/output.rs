use miniscript::bitcoin::util::psbt;

/// Outputs are never signed, their side-car data only helps the receiving end (eg a hardware
/// signer checking a change output).
pub trait OutputExt {
    fn is_empty(&self) -> bool;
}

impl OutputExt for psbt::Output {
    fn is_empty(&self) -> bool {
        self.redeem_script.is_none()
            && self.witness_script.is_none()
            && self.bip32_derivation.is_empty()
            && self.proprietary.is_empty()
            && self.unknown.is_empty()
    }
}
