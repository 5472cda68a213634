pub mod config;
pub mod events;
pub mod ingest;

use anyhow::{Context, Result};
use chrono_tz::Tz;
use econcal_core::config::EconCalConfig;
use econcal_core::remote::Backend;
use tracing::warn;

pub fn load_config() -> Result<EconCalConfig> {
    EconCalConfig::load().context("Could not load configuration")
}

/// Backend client for the configured backend name and timeout.
pub fn backend(config: &EconCalConfig) -> Result<Backend> {
    let name = config.require_backend()?;
    Ok(Backend::from_name(name).with_timeout(config.backend_timeout()?))
}

/// Configured zone, else the system zone, else UTC.
pub fn timezone(config: &EconCalConfig) -> Result<Tz> {
    if let Some(tz) = config.timezone()? {
        return Ok(tz);
    }

    let system = iana_time_zone::get_timezone()
        .ok()
        .and_then(|name| name.parse::<Tz>().ok());

    Ok(system.unwrap_or_else(|| {
        warn!("could not determine system timezone, using UTC");
        Tz::UTC
    }))
}
