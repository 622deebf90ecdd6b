#![no_main]

use libfuzzer_sys::fuzz_target;
use pgreconcile_core::acl::parse_acl;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data) {
        let _ = parse_acl(Some(raw));
    }
});
