#![no_main]
use confdelta::path::{self, Path};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // Anything that decodes must re-encode to the same string.
    if let Ok(p) = Path::decode(text) {
        assert_eq!(p.encode(), text);
        assert_eq!(path::decode(&p.encode()).unwrap(), p.segments());
    }
});
