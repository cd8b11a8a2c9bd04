//! Process-wide logger setup for poolward binaries.
//!
//! Library code only talks to the `log` facade. Binaries call [`init`] once at
//! startup; nothing in the library installs a logger on its own.

use env_logger::{Builder, Env};
use std::sync::Once;

static INIT: Once = Once::new();

/// Install `env_logger` with `default_level` unless `RUST_LOG` says otherwise.
///
/// Safe to call more than once; only the first call has an effect.
pub fn init(default_level: &str) {
    INIT.call_once(|| {
        let env = Env::default().default_filter_or(default_level);
        let mut builder = Builder::from_env(env);
        builder.format_timestamp_millis();
        if builder.try_init().is_err() {
            log::debug!("logger already installed; keeping existing configuration");
        }
    });
}
