use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::{
    filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
    EnvFilter,
};

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub level: String,
}

fn filter(settings: &LogSettings) -> Result<EnvFilter> {
    let level = tracing::Level::from_str(settings.level.as_str())
        .with_context(|| format!("invalid log level {}", settings.level))?;

    Ok(EnvFilter::default()
        .add_directive(LevelFilter::from_level(level).into())
        .add_directive("hyper=warn".parse()?)
        .add_directive("tokio_util=warn".parse()?)
        .add_directive("native_tls=warn".parse()?))
}

pub fn setup_logging(settings: &LogSettings) -> Result<()> {
    let fmt_layer = fmt::layer();
    let filter_layer = filter(settings)?;

    let registry = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer);

    #[cfg(feature = "console")]
    let registry = registry.with(console_subscriber::spawn());

    registry.try_init().context("a global subscriber is already set")?;

    Ok(())
}
