//! Logging utilities

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system
///
/// Per-module directives from `RUST_LOG` still apply; the global level is `info`.
pub fn init() {
    init_with_level(log::LevelFilter::Info);
}

/// Initialize the logging system with an explicit default level
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_with_level(level: log::LevelFilter) {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}
