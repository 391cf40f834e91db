#![warn(missing_docs)]

//! Shared logging helpers and tracing utilities for the vigil workspace.
//!
//! Host programs that embed the engine call [`init`] (or install their own
//! subscriber) and may later retune verbosity at runtime through
//! [`set_threshold`], which backs the `set-debug-threshold` scenario
//! action.

use std::env;

use parking_lot::Mutex;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt};

/// Crate targets included in default logging directives.
const OUR_CRATES: &[&str] = &[
    "vigil_scenario",
    "vigil_report",
    "vigil_pipeline",
    "vigil_protocol",
    "timexpr",
    "logging",
];

/// Reload handle installed by [`init`], used by [`set_threshold`].
static RELOAD: Mutex<Option<reload::Handle<EnvFilter, tracing_subscriber::Registry>>> =
    Mutex::new(None);

/// Build crate-scoped directives for the given level.
fn crate_specs(level: &str) -> Vec<String> {
    let lvl = level.to_ascii_lowercase();
    OUR_CRATES.iter().map(|t| format!("{}={}", t, lvl)).collect()
}

/// Build a filter directive string that sets the same `level` for all of
/// our crates.
pub fn level_spec_for(level: &str) -> String {
    crate_specs(level).join(",")
}

/// Compute the final filter spec string with precedence:
/// - explicit `filter` directive
/// - explicit `level` (crate-scoped)
/// - `RUST_LOG` env
/// - default to crate-scoped `info`
pub fn compute_spec(level: Option<&str>, filter: Option<&str>) -> String {
    if let Some(spec) = filter {
        return spec.to_string();
    }
    if let Some(lvl) = level {
        return level_spec_for(lvl);
    }
    if let Ok(spec) = env::var("RUST_LOG") {
        return spec;
    }
    level_spec_for("info")
}

/// Create an `EnvFilter` from a spec string.
pub fn env_filter_from_spec(spec: &str) -> EnvFilter {
    EnvFilter::new(spec)
}

/// Install a global subscriber with a reloadable filter.
///
/// Returns false when a subscriber was already installed (the embedding
/// host owns logging in that case); [`set_threshold`] becomes a no-op.
pub fn init(level: Option<&str>, filter: Option<&str>) -> bool {
    let spec = compute_spec(level, filter);
    let (filter_layer, handle) = reload::Layer::new(env_filter_from_spec(&spec));
    let ok = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok();
    if ok {
        *RELOAD.lock() = Some(handle);
    }
    ok
}

/// Re-apply the log threshold at runtime.
///
/// `spec` is an `EnvFilter` directive string. With `reset` false the new
/// directives are appended to the current crate-scoped defaults instead
/// of replacing them. Returns false when [`init`] never installed a
/// reload handle.
pub fn set_threshold(spec: &str, reset: bool) -> bool {
    let guard = RELOAD.lock();
    let Some(handle) = guard.as_ref() else {
        tracing::warn!(
            "set_threshold: no reloadable subscriber installed, ignoring `{}`",
            spec
        );
        return false;
    };
    let combined = if reset {
        spec.to_string()
    } else {
        format!("{},{}", level_spec_for("info"), spec)
    };
    handle
        .reload(env_filter_from_spec(&combined))
        .map_err(|e| tracing::warn!("set_threshold: reload failed: {}", e))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_precedence() {
        assert_eq!(compute_spec(None, Some("a=debug")), "a=debug");
        let spec = compute_spec(Some("trace"), None);
        assert!(spec.contains("vigil_scenario=trace"));
        assert!(spec.contains("timexpr=trace"));
    }

    #[test]
    fn level_spec_scopes_all_crates() {
        let spec = level_spec_for("warn");
        for krate in OUR_CRATES {
            assert!(spec.contains(&format!("{}=warn", krate)));
        }
    }
}
