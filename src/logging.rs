use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence; otherwise this crate logs at the configured
/// level and everything else at `warn`.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("warn")
            .add_directive(format!("multidata_classifier={}", config.level).parse()?)
            .add_directive(format!("multidata_server={}", config.level).parse()?)
            .add_directive(format!("tower_http={}", config.level).parse()?),
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}
