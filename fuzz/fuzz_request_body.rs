//! Fuzz target for HTTP request body validation.
//!
//! Run with: cargo +nightly fuzz run fuzz_request_body

#![no_main]

use libfuzzer_sys::fuzz_target;
use scapgate_core::api::request;

fuzz_target!(|data: &[u8]| {
    let _ = request::new_task_fields(data);
    let _ = request::update_task_fields(data);
    let _ = request::ssg_fields(data);
});
