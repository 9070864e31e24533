#![no_main]
use confdelta::store;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Loading must never panic; a loaded delta must save and reload unchanged.
    if let Ok(delta) = store::load(data) {
        assert!(delta.validate().is_ok());
        let text = store::to_string_pretty(&delta).unwrap();
        assert_eq!(store::load(text.as_bytes()).unwrap(), delta);
    }
});
