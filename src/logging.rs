use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable holding the tracing filter, e.g. `UCODE_LOG=ucode=debug`.
pub const LOG_ENV: &str = "UCODE_LOG";

static INIT: Once = Once::new();

/// Installs a stderr subscriber when `UCODE_LOG` is set.
///
/// Logging stays off otherwise so script output on stdout and engine
/// diagnostics on stderr are the only things a user sees.
pub fn init() {
    INIT.call_once(|| {
        if std::env::var_os(LOG_ENV).is_none() {
            return;
        }
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_level(true),
            )
            .with(filter)
            .init();
    });
}
