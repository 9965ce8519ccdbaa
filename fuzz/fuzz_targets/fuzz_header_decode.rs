#![no_main]

use libfuzzer_sys::fuzz_target;
use rpc_frame::Header;

fuzz_target!(|data: &[u8]| {
    // Any header that decodes must re-encode to the same 38 bytes
    if let Ok(header) = Header::decode(data) {
        assert_eq!(&header.encode()[..], &data[..38]);
    }
});
