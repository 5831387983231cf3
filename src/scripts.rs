//! # Spend templates
//!
//! Classification of the spent Script and assembly of its satisfaction.
//!
//! We recognize the standard templates (P2PK, P2PKH, bare multisig, P2WPKH, P2WSH and their P2SH
//! wrapping). The inner script of a P2SH or P2WSH is parsed as a
//! [Miniscript](http://bitcoin.sipa.be/miniscript/) and must be one of `pk`, `pkh` or `multi`.
//! Signer, Finalizer and Analyzer all go through [resolve] then [satisfy], so they can't disagree
//! on what a spend needs.

use crate::providers::SigningProvider;

use miniscript::{
    bitcoin::{
        blockdata::script::Builder,
        hashes::{hash160, Hash},
        secp256k1,
        util::psbt,
        PubkeyHash, PublicKey, Script, ScriptHash, SigHashType, WScriptHash,
    },
    BitcoinSig, Legacy, Miniscript, Satisfier, ScriptContext, Segwitv0, Terminal,
};

use std::fmt;

/// Size of the placeholder signatures used for size estimation. This is the maximum size of a
/// DER-encoded low-R or high-R signature plus the sighash type byte.
pub const DUMMY_SIGNATURE_LEN: usize = 72;

// The generator point, used as a placeholder when a P2PKH public key isn't known yet.
const DUMMY_PUBKEY: [u8; 33] = [
    0x02, 0x79, 0xbe, 0x66, 0x7e, 0xf9, 0xdc, 0xbb, 0xac, 0x55, 0xa0, 0x62, 0x95, 0xce, 0x87, 0x0b,
    0x07, 0x02, 0x9b, 0xfc, 0xdb, 0x2d, 0xce, 0x28, 0xd9, 0x59, 0xf2, 0x81, 0x5b, 0x16, 0xf8, 0x17,
    0x98,
];

/// Which digest algorithm signatures commit with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigVersion {
    /// Pre-segwit sighash, the script code is the scriptPubKey or redeem script.
    Base,
    /// BIP143
    WitnessV0,
}

/// What the keys must do to unlock a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// A signature for this key.
    Pk(PublicKey),
    /// A signature plus the key behind this hash.
    Pkh(PubkeyHash),
    /// Signatures for `k` out of these keys, in this order.
    Multi(usize, Vec<PublicKey>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendKind {
    P2pk,
    P2pkh,
    BareMulti,
    P2sh,
    P2wpkh,
    P2wsh,
    P2shP2wpkh,
    P2shP2wsh,
}

impl fmt::Display for SpendKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            SpendKind::P2pk => "p2pk",
            SpendKind::P2pkh => "p2pkh",
            SpendKind::BareMulti => "multisig",
            SpendKind::P2sh => "p2sh",
            SpendKind::P2wpkh => "p2wpkh",
            SpendKind::P2wsh => "p2wsh",
            SpendKind::P2shP2wpkh => "p2sh-p2wpkh",
            SpendKind::P2shP2wsh => "p2sh-p2wsh",
        };
        write!(f, "{}", name)
    }
}

/// A spent Script we know how to sign for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendInfo {
    pub kind: SpendKind,
    pub sig_version: SigVersion,
    /// The script signatures commit to.
    pub script_code: Script,
    pub condition: Condition,
    /// Set for P2SH spends, pushed last in the scriptSig.
    pub redeem_script: Option<Script>,
    /// Set for P2WSH spends, pushed last in the witness.
    pub witness_script: Option<Script>,
}

impl SpendInfo {
    /// Whether this spend goes through a witness program.
    pub fn is_witness(&self) -> bool {
        self.sig_version == SigVersion::WitnessV0
    }

    /// Keys that may sign for this spend, if they are known.
    pub fn known_keys<S: Satisfier<PublicKey>>(&self, satisfier: &S) -> Vec<PublicKey> {
        match self.condition {
            Condition::Pk(pk) => vec![pk],
            Condition::Pkh(ref hash) => satisfier
                .lookup_pkh_pk(&hash.as_hash())
                .into_iter()
                .collect(),
            Condition::Multi(_, ref keys) => keys.clone(),
        }
    }
}

/// Why a spent Script could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unresolved {
    /// P2SH, and we don't know the redeem script.
    MissingRedeemScript(ScriptHash),
    /// P2WSH, and we don't know the witness script.
    MissingWitnessScript(WScriptHash),
    /// The script we were given does not hash to the committed value.
    ScriptMismatch,
    /// Not a template we support.
    NonStandard,
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Unresolved::MissingRedeemScript(ref h) => write!(f, "Unknown redeem script '{}'", h),
            Unresolved::MissingWitnessScript(ref h) => {
                write!(f, "Unknown witness script '{}'", h)
            }
            Unresolved::ScriptMismatch => write!(f, "Script does not match its commitment"),
            Unresolved::NonStandard => write!(f, "Non-standard script"),
        }
    }
}

/// Parse a signature as stored in a PSBT: DER followed by a standard sighash type byte.
pub fn parse_signature(raw: &[u8]) -> Option<BitcoinSig> {
    let (flag, der) = raw.split_last()?;
    let sighash_type = SigHashType::from_u32_standard(*flag as u32).ok()?;
    let sig = secp256k1::Signature::from_der(der).ok()?;
    Some((sig, sighash_type))
}

/// Satisfies a spend out of the partial signatures of an input.
///
/// Keys behind a hash are looked up among the signing and derivation keys of the input, then
/// asked to the provider.
pub struct InputSatisfier<'a, P: SigningProvider + ?Sized> {
    pub input: &'a psbt::Input,
    pub provider: &'a P,
    /// If set, signatures committing to another sighash type are ignored.
    pub sighash_type: Option<SigHashType>,
}

impl<'a, P: SigningProvider + ?Sized> Satisfier<PublicKey> for InputSatisfier<'a, P> {
    fn lookup_sig(&self, pubkey: &PublicKey) -> Option<BitcoinSig> {
        self.input
            .partial_sigs
            .get(pubkey)
            .and_then(|raw| parse_signature(raw))
            .filter(|(_, sighash_type)| self.sighash_type.map_or(true, |t| t == *sighash_type))
    }

    fn lookup_pkh_pk(&self, hash: &hash160::Hash) -> Option<PublicKey> {
        let matches = |pk: &&PublicKey| pk.pubkey_hash().as_hash() == *hash;
        self.input
            .partial_sigs
            .keys()
            .find(matches)
            .or_else(|| self.input.bip32_derivation.keys().find(matches))
            .copied()
            .or_else(|| self.provider.pubkey(&PubkeyHash::from_hash(*hash)))
    }

    fn lookup_pkh_sig(&self, hash: &hash160::Hash) -> Option<(PublicKey, BitcoinSig)> {
        let pubkey = self.lookup_pkh_pk(hash)?;
        Some((pubkey, self.lookup_sig(&pubkey)?))
    }
}

fn dummy_signature() -> BitcoinSig {
    // r with its high bit set, so the DER encoding is as large as it gets
    let mut compact = [0u8; 64];
    compact[0] = 0x80;
    compact[32] = 0x01;
    let sig = secp256k1::Signature::from_compact(&compact)
        .expect("Both scalars are below the curve order");
    (sig, SigHashType::All)
}

/// Pretends to have a signature for any key, for size estimation.
pub struct DummySatisfier<'a, S>(pub &'a S);

impl<'a, S: Satisfier<PublicKey>> Satisfier<PublicKey> for DummySatisfier<'a, S> {
    fn lookup_sig(&self, _: &PublicKey) -> Option<BitcoinSig> {
        Some(dummy_signature())
    }

    fn lookup_pkh_pk(&self, hash: &hash160::Hash) -> Option<PublicKey> {
        self.0
            .lookup_pkh_pk(hash)
            .or_else(|| PublicKey::from_slice(&DUMMY_PUBKEY).ok())
    }

    fn lookup_pkh_sig(&self, hash: &hash160::Hash) -> Option<(PublicKey, BitcoinSig)> {
        Some((self.lookup_pkh_pk(hash)?, dummy_signature()))
    }
}

/// The final scriptSig and witness of an input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Satisfaction {
    pub script_sig: Script,
    pub witness: Vec<Vec<u8>>,
}

/// What prevents an input from being satisfied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingData {
    /// Keys we only know the hash of.
    pub pubkeys: Vec<PubkeyHash>,
    /// Keys we need a signature from.
    pub signatures: Vec<PubkeyHash>,
}

fn script_hash(script: &Script, from: usize, to: usize) -> Result<hash160::Hash, Unresolved> {
    hash160::Hash::from_slice(&script.as_bytes()[from..to]).map_err(|_| Unresolved::NonStandard)
}

fn classify<Ctx: ScriptContext>(script: &Script) -> Result<Condition, Unresolved> {
    let ms = Miniscript::<PublicKey, Ctx>::parse(script).map_err(|_| Unresolved::NonStandard)?;

    match ms.node {
        Terminal::Multi(k, ref keys) => Ok(Condition::Multi(k, keys.clone())),
        Terminal::Check(ref inner) => match inner.node {
            Terminal::PkK(ref pk) => Ok(Condition::Pk(*pk)),
            Terminal::PkH(ref hash) => Ok(Condition::Pkh(PubkeyHash::from_hash(*hash))),
            _ => Err(Unresolved::NonStandard),
        },
        _ => Err(Unresolved::NonStandard),
    }
}

/// Figure out how to spend `script_pubkey`.
///
/// Redeem and witness scripts are taken from the arguments first, then asked to the provider.
/// Either way they must match the hash committed to.
pub fn resolve<P: SigningProvider + ?Sized>(
    script_pubkey: &Script,
    redeem_script: Option<&Script>,
    witness_script: Option<&Script>,
    provider: &P,
) -> Result<SpendInfo, Unresolved> {
    let redeem_script = if script_pubkey.is_p2sh() {
        let hash = ScriptHash::from_hash(script_hash(script_pubkey, 2, 22)?);
        let script = redeem_script
            .cloned()
            .or_else(|| provider.redeem_script(&hash))
            .ok_or(Unresolved::MissingRedeemScript(hash))?;
        if script.to_p2sh() != *script_pubkey {
            return Err(Unresolved::ScriptMismatch);
        }
        Some(script)
    } else {
        None
    };
    let inner = redeem_script.as_ref().unwrap_or(script_pubkey);
    let wrapped = redeem_script.is_some();

    if inner.is_v0_p2wpkh() {
        let hash = PubkeyHash::from_hash(script_hash(inner, 2, 22)?);
        return Ok(SpendInfo {
            kind: if wrapped {
                SpendKind::P2shP2wpkh
            } else {
                SpendKind::P2wpkh
            },
            sig_version: SigVersion::WitnessV0,
            script_code: Script::new_p2pkh(&hash),
            condition: Condition::Pkh(hash),
            redeem_script,
            witness_script: None,
        });
    }

    if inner.is_v0_p2wsh() {
        let hash = WScriptHash::from_slice(&inner.as_bytes()[2..34])
            .map_err(|_| Unresolved::NonStandard)?;
        let script = witness_script
            .cloned()
            .or_else(|| provider.witness_script(&hash))
            .ok_or(Unresolved::MissingWitnessScript(hash))?;
        if script.to_v0_p2wsh() != *inner {
            return Err(Unresolved::ScriptMismatch);
        }
        return Ok(SpendInfo {
            kind: if wrapped {
                SpendKind::P2shP2wsh
            } else {
                SpendKind::P2wsh
            },
            sig_version: SigVersion::WitnessV0,
            condition: classify::<Segwitv0>(&script)?,
            script_code: script.clone(),
            redeem_script,
            witness_script: Some(script),
        });
    }

    // Future witness versions, or a witness program nested in a bare script.
    if inner.is_witness_program() {
        return Err(Unresolved::NonStandard);
    }

    let condition = classify::<Legacy>(inner)?;
    let kind = match (wrapped, &condition) {
        (true, _) => SpendKind::P2sh,
        (false, Condition::Pk(_)) => SpendKind::P2pk,
        (false, Condition::Pkh(_)) => SpendKind::P2pkh,
        (false, Condition::Multi(..)) => SpendKind::BareMulti,
    };

    Ok(SpendInfo {
        kind,
        sig_version: SigVersion::Base,
        script_code: inner.clone(),
        condition,
        redeem_script,
        witness_script: None,
    })
}

/// Whether an output to this Script is spent through a witness program, possibly wrapped in
/// P2SH. Returns None if we can't tell (P2SH with an unknown redeem script).
pub fn is_witness_spend<P: SigningProvider + ?Sized>(
    script_pubkey: &Script,
    redeem_script: Option<&Script>,
    provider: &P,
) -> Option<bool> {
    if script_pubkey.is_witness_program() {
        return Some(true);
    }
    if !script_pubkey.is_p2sh() {
        return Some(false);
    }

    let hash = ScriptHash::from_hash(script_hash(script_pubkey, 2, 22).ok()?);
    redeem_script
        .cloned()
        .or_else(|| provider.redeem_script(&hash))
        .filter(|rs| rs.to_p2sh() == *script_pubkey)
        .map(|rs| rs.is_witness_program())
}

fn push_stack(mut builder: Builder, stack: &[Vec<u8>]) -> Builder {
    for elem in stack {
        builder = if elem.len() == 1 && (1..=16).contains(&elem[0]) {
            builder.push_int(elem[0] as i64)
        } else {
            builder.push_slice(elem)
        };
    }
    builder
}

/// Push data elements the way standard scriptSigs do, using small integer opcodes where
/// possible.
pub fn push_all(stack: &[Vec<u8>]) -> Script {
    push_stack(Builder::new(), stack).into_script()
}

// Which of the required keys or signatures the satisfier doesn't have.
fn missing_data<S: Satisfier<PublicKey>>(condition: &Condition, satisfier: &S) -> MissingData {
    let mut missing = MissingData::default();

    match *condition {
        Condition::Pk(ref pk) => {
            if satisfier.lookup_sig(pk).is_none() {
                missing.signatures.push(pk.pubkey_hash());
            }
        }
        Condition::Pkh(ref hash) => match satisfier.lookup_pkh_pk(&hash.as_hash()) {
            None => missing.pubkeys.push(*hash),
            Some(pk) => {
                if satisfier.lookup_sig(&pk).is_none() {
                    missing.signatures.push(*hash);
                }
            }
        },
        Condition::Multi(_, ref keys) => {
            missing.signatures = keys
                .iter()
                .filter(|pk| satisfier.lookup_sig(pk).is_none())
                .map(|pk| pk.pubkey_hash())
                .collect();
        }
    }

    missing
}

/// Build the final scriptSig and witness for this spend out of the available signatures.
///
/// A multisig with more signatures than needed drops the largest ones.
pub fn satisfy<S: Satisfier<PublicKey>>(
    info: &SpendInfo,
    satisfier: &S,
) -> Result<Satisfaction, MissingData> {
    let stack = match info.sig_version {
        SigVersion::Base => Miniscript::<PublicKey, Legacy>::parse(&info.script_code)
            .ok()
            .and_then(|ms| ms.satisfy(satisfier).ok()),
        SigVersion::WitnessV0 => Miniscript::<PublicKey, Segwitv0>::parse(&info.script_code)
            .ok()
            .and_then(|ms| ms.satisfy(satisfier).ok()),
    }
    .ok_or_else(|| missing_data(&info.condition, satisfier))?;

    let (sig_stack, mut witness) = match info.sig_version {
        SigVersion::Base => (stack, vec![]),
        SigVersion::WitnessV0 => (vec![], stack),
    };
    if let Some(ref ws) = info.witness_script {
        witness.push(ws.to_bytes());
    }
    let mut builder = push_stack(Builder::new(), &sig_stack);
    if let Some(ref rs) = info.redeem_script {
        builder = builder.push_slice(rs.as_bytes());
    }

    Ok(Satisfaction {
        script_sig: builder.into_script(),
        witness,
    })
}
