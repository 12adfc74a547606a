//! Fuzz target: `RpcRequest::from_slice`
//!
//! cargo fuzz run fuzz_rpc_request

#![no_main]

use beacon::rpc::RpcRequest;
use beacon::rpc::message::MAX_REQUEST_BYTES;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(req) = RpcRequest::from_slice(data) {
        assert!(data.len() <= MAX_REQUEST_BYTES);
        let _ = req.function();
        let _ = req.str_param("field");
    }
});
