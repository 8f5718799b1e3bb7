//! Logging bootstrap shared by every Curfew binary.

use env_logger::{Builder, Env};
use log::LevelFilter;

/// Install the `env_logger` backend.
///
/// `RUST_LOG` wins when set; otherwise `default_level` applies. Calling this more
/// than once is harmless.
pub fn init(default_level: &str) {
    let env = Env::default().default_filter_or(default_level);
    let _ = Builder::from_env(env).format_timestamp_secs().try_init();
}

/// Whether `level` parses as a `log` level filter (`off`, `error` .. `trace`).
pub fn is_valid_level(level: &str) -> bool {
    level.trim().parse::<LevelFilter>().is_ok()
}
