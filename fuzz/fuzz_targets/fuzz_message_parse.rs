#![no_main]

use libfuzzer_sys::fuzz_target;
use rpc_frame::config::HEADER_SIZE;
use rpc_frame::{Message, SharedSecret};

fuzz_target!(|data: &[u8]| {
    // Test for panics on arbitrary header/body splits, with and without a key
    if data.len() < HEADER_SIZE {
        let _ = Message::parse(data, &[], None, None);
        return;
    }
    let (head, body) = data.split_at(HEADER_SIZE);
    let secret = SharedSecret::from("fuzz-secret");
    let _ = Message::parse(head, body, None, None);
    let _ = Message::parse(head, body, None, Some(&secret));
});
