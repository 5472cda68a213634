use anyhow::Result;
use econcal_core::config::EconCalConfig;
use econcal_core::remote::Backend;
use owo_colors::OwoColorize;

use super::{load_config, timezone};

pub fn run() -> Result<()> {
    let config_path = EconCalConfig::config_path()?;
    let config = load_config()?;

    println!("{}", "Paths".bold());
    println!("  Config:     {}", config_path.display());

    println!("\n{}", "Backend".bold());
    match &config.backend {
        Some(name) => println!("  Name:       {} ({})", name, Backend::from_name(name).binary_name().dimmed()),
        None => println!("  Name:       {}", "(not set)".yellow()),
    }
    println!("  Timeout:    {}", config.backend_timeout);

    println!("\n{}", "Matching".bold());
    println!("  Threshold:  {}", config.similarity_threshold);
    println!("  Window:     {}", config.match_window);
    println!("  Batch size: {}", config.max_batch_size);

    println!("\n{}", "Display".bold());
    println!("  Cache TTL:  {}", config.cache_ttl);
    let tz = timezone(&config)?;
    let source = if config.timezone.is_some() { "config" } else { "system" };
    println!("  Timezone:   {} {}", tz, format!("({source})").dimmed());

    Ok(())
}
