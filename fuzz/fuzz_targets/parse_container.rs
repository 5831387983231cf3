#![no_main]
use libfuzzer_sys::fuzz_target;

use psbt_pipeline::{Container, Role, SignOptions, NoProvider};

fuzz_target!(|data: &[u8]| {
    if let Ok(container) = Container::deserialize(data) {
        // We can serialize it back, and the encoding is stable
        let ser = container.serialize();
        let decoded = Container::deserialize(&ser).expect("We just serialized it");
        assert_eq!(decoded, container);
        assert_eq!(decoded.serialize(), ser);

        // We can analyze it without crashing
        let report = container.analyze();
        if report.error.is_some() {
            assert_eq!(report.next, Role::Creator);
        }

        // Combining with itself is a no-op
        assert_eq!(
            Container::combine(vec![container.clone(), container.clone()]).unwrap(),
            container
        );

        // Signing without keys never adds a signature
        let mut signed = container.clone();
        let report = signed.sign(&NoProvider, &SignOptions::default());
        assert_eq!(report.outcomes.len(), container.inputs().len());

        if let Ok(finalized) = container.finalize(true) {
            assert!(finalized.complete);
            assert!(finalized.extracted.is_some());
        }
    }
});
