#![no_main]
use libfuzzer_sys::{arbitrary::Arbitrary, fuzz_target};

use psbt_pipeline::{
    miniscript::bitcoin::{
        blockdata::constants::max_money, secp256k1, Network, OutPoint, Script, TxOut,
    },
    tests_helpers::{funding_tx, multisig_script, KeyRing, UtxoSet},
    Container, CreateOptions, Role, SignOptions, TxInRequest, UpdateOptions,
};

#[derive(Arbitrary, Debug)]
struct Config {
    n_keys: usize,
    threshold: usize,
    wrapped: bool,
    value: u64,
    fee: u64,
    signers: Vec<usize>,
}

fuzz_target!(|config: Config| {
    if config.n_keys == 0 || config.n_keys > 20 || config.threshold == 0 {
        return;
    }
    if config.threshold > config.n_keys || config.signers.len() > 20 {
        return;
    }
    if config.value > max_money(Network::Bitcoin) || config.fee > config.value {
        return;
    }

    let secp = secp256k1::Secp256k1::new();
    let mut keys = KeyRing::random(config.n_keys, &secp);
    let multi = multisig_script(config.threshold, &keys.pubkeys());
    keys.add_script(multi.clone());
    let spk = if config.wrapped {
        multi.to_v0_p2wsh().to_p2sh()
    } else {
        multi.to_v0_p2wsh()
    };
    keys.add_script(multi.to_v0_p2wsh());
    let prev_tx = funding_tx(&[(spk, config.value)]);
    let mut utxos = UtxoSet::default();
    utxos.add(prev_tx.clone());

    let mut container = Container::create(
        &[TxInRequest::new(OutPoint {
            txid: prev_tx.txid(),
            vout: 0,
        })],
        vec![TxOut {
            value: config.value - config.fee,
            script_pubkey: Script::new(),
        }],
        &CreateOptions::default(),
    )
    .unwrap();
    container.update(&utxos, &keys, &UpdateOptions::default());
    assert_eq!(container.analyze().next, Role::Signer);

    // Each signer signs its own copy with a single key
    let copies: Vec<Container> = config
        .signers
        .iter()
        .map(|i| {
            let mut copy = container.clone();
            copy.sign(&keys.subset(&[i % config.n_keys]), &SignOptions::default());
            copy
        })
        .collect();
    let mut distinct = config
        .signers
        .iter()
        .map(|i| i % config.n_keys)
        .collect::<Vec<usize>>();
    distinct.sort_unstable();
    distinct.dedup();

    if copies.is_empty() {
        return;
    }
    let combined = Container::combine(copies).unwrap();
    let finalized = combined.finalize(false).unwrap();
    assert_eq!(finalized.complete, distinct.len() >= config.threshold);
    let report = finalized.container.analyze();
    assert_eq!(report.fee, Some(config.fee));
    if finalized.complete {
        assert_eq!(report.next, Role::Extractor);
        finalized.container.extract().unwrap();
    }
});
