// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Registries preconfigured for tests.

use std::sync::Arc;

use access_cop::{Registry, RegistryConfig};

use crate::sink::RecordingSink;

/// Registry that counts violations but reports nothing and skips backtraces.
pub fn quiet_registry() -> Registry {
    Registry::with_config(RegistryConfig {
        report_violations: false,
        capture_backtraces: false,
        ..RegistryConfig::default()
    })
}

/// Registry reporting into a fresh [`RecordingSink`], returned alongside it.
pub fn recording_registry() -> (Registry, RecordingSink) {
    let sink = RecordingSink::new();
    let registry = Registry::with_sink(
        RegistryConfig {
            capture_backtraces: false,
            ..RegistryConfig::default()
        },
        Arc::new(sink.clone()),
    );
    (registry, sink)
}
