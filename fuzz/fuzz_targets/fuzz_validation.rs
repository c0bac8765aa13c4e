//! Fuzz testing for destination validation and body decoding.
//!
//! Everything exercised here handles untrusted caller input and must never
//! panic:
//!
//! - `DestinationPolicy::validate` on arbitrary destination strings
//! - JSON and url-encoded body decoding
//! - timeout parsing
//!
//! In addition, any destination the default policy accepts must not carry an
//! IP host inside a forbidden range, and must still be accepted when its
//! normalized form is validated again.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! # Install cargo-fuzz (requires nightly)
//! cargo +nightly install cargo-fuzz
//!
//! # Run the validation fuzz target
//! cargo +nightly fuzz run fuzz_validation
//!
//! # Run with a time limit (e.g., 60 seconds)
//! cargo +nightly fuzz run fuzz_validation -- -max_total_time=60
//! ```

#![no_main]

use std::net::IpAddr;

use libfuzzer_sys::fuzz_target;
use webhook_relay::DestinationPolicy;
use webhook_relay::codec::{form, json};
use webhook_relay::models::RelayTimeout;

fuzz_target!(|data: &[u8]| {
    let _ = json::decode(data);
    let _ = form::decode(data);

    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    let _ = RelayTimeout::from_requested(s, 120_000);

    let policy = DestinationPolicy::default();
    if let Ok(url) = policy.validate(Some(s)) {
        let ip = url
            .host_str()
            .map(|h| h.trim_start_matches('[').trim_end_matches(']'))
            .and_then(|h| h.parse::<IpAddr>().ok());
        if let Some(ip) = ip {
            assert!(!policy.is_forbidden_ip(&ip), "accepted forbidden {ip}");
        }
        assert!(policy.validate(Some(url.as_str())).is_ok());
    }
});
