#![no_main]
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    // Split input at the first NUL into two JSON documents.
    let Some(split) = data.iter().position(|&b| b == 0) else {
        return;
    };
    let (Ok(base), Ok(patched)) = (
        serde_json::from_slice::<Value>(&data[..split]),
        serde_json::from_slice::<Value>(&data[split + 1..]),
    ) else {
        return;
    };

    let Ok(delta) = confdelta::diff(&base, &patched) else {
        return;
    };
    assert!(delta.validate().is_ok());
    let out = confdelta::apply(&base, &delta).unwrap();
    assert_eq!(out.document, patched);
    assert!(out.warnings.is_empty());
});
