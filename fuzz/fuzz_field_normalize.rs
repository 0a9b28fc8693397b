//! Fuzz target for task field normalization (schedule, repeat, remediation).
//!
//! Run with: cargo +nightly fuzz run fuzz_field_normalize

#![no_main]

use chrono::NaiveDateTime;
use libfuzzer_sys::fuzz_target;
use scapgate_core::translate::normalize::{
    RepeatAfter, not_before_wire, online_remediation, schedule_not_before_at, target_or_localhost,
};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let _ = RepeatAfter::parse(s).hours();
    let _ = online_remediation(&serde_json::Value::String(s.to_string()));
    let _ = target_or_localhost(s);

    let at = schedule_not_before_at(s, NaiveDateTime::default());
    let _ = not_before_wire(at);
});
