//! Fuzz target for the TOML configuration parser.
//!
//! Run with: cargo +nightly fuzz run fuzz_config_parser
//!
//! Feeds arbitrary input to `AppConfig::parse()`. Any configuration that
//! passes validation must also declare cleanly into a registry.

#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use lineage_core::{AttributeRegistry, ManualProvider, Resolver};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = lineage_config::AppConfig::parse(s) else {
        return;
    };

    let provider = Arc::new(ManualProvider::new(config.hierarchy.root_name.clone()));
    let registry = AttributeRegistry::new(Resolver::new(provider));
    if let Err(err) = registry.declare_from_config(&config.attributes) {
        panic!("validated config rejected by registry: {err}");
    }
});
