use log::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Filter directive for `level`, used when `RUST_LOG` is unset.
fn default_directive(level: LevelFilter) -> String {
    level.as_str().to_ascii_lowercase()
}

/// Install a fmt subscriber as the global default.
///
/// `RUST_LOG` wins over `level`. Returns `false` when a subscriber was
/// already installed, by the host or an earlier call. No `log` bridge is
/// installed: with `log-always`, records already reach a host `log` logger.
pub fn init(level: LevelFilter) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).is_ok()
}
