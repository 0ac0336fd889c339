//! Logger setup
//!
//! The library only emits through the `log` facade. Hosts that have no
//! logger of their own can install `env_logger` here; `RUST_LOG` overrides
//! the default filter.

use env_logger::{Builder, Env};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info";

/// Install `env_logger` with the default filter.
///
/// Returns `false` if a logger was already installed.
pub fn init() -> bool {
    init_with_filter(DEFAULT_FILTER)
}

/// Install `env_logger`, falling back to `filter` when `RUST_LOG` is unset
pub fn init_with_filter(filter: &str) -> bool {
    Builder::from_env(Env::default().default_filter_or(filter))
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}
