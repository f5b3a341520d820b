/// Tracing subscriber setup

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Level used when `RUST_LOG` is not set
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Install the fmt subscriber; `RUST_LOG` overrides `level`
pub fn init(level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(build_env_filter(level))
        .with(fmt::layer().with_target(false).without_time())
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
