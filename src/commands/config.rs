//! Config command handler.

use std::error::Error;

use entitygraph::config::EntityGraphConfig;
use entitygraph::observability::ObservabilityConfig;

/// Show the effective configuration.
///
/// # Errors
///
/// Returns an error if the configuration cannot be rendered.
pub fn cmd_config(config: &EntityGraphConfig, verbose: bool) -> Result<(), Box<dyn Error>> {
    let observability = ObservabilityConfig::from_config(config, verbose);

    println!("Current Configuration");
    println!("=====================");
    println!();
    println!("Data Directory:      {}", config.data_dir.display());
    println!("Database Path:       {}", config.database_path().display());
    println!("Busy Timeout:        {}ms", config.busy_timeout_ms);
    println!("Prefetch Batch Size: {}", config.prefetch_batch_size);
    println!();
    println!("Observability:");
    println!("  Log Format: {:?}", observability.logging.format);
    println!("  Log Filter: {}", observability.logging.filter);
    println!(
        "  Log File:   {}",
        observability
            .logging
            .file
            .as_ref()
            .map_or_else(|| "(stderr)".to_string(), |p| p.display().to_string())
    );
    println!("  Metrics:    {}", observability.metrics.enabled);
    println!();
    println!("As TOML:");
    println!();
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
