use super::Config;
use anyhow::{Context, Result};
use memmap2::MmapOptions;
use std::fs::File;
use std::path::Path;

/// Read, parse and validate a configuration file
///
/// Config files are tiny in practice; large ones (long ignore lists) are mapped.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid UTF-8 or TOML,
/// or holds out-of-range values
pub fn parse_config_file(path: &Path) -> Result<Config> {
    let metadata = std::fs::metadata(path)?;

    if metadata.len() < 4096 {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config_str(&content)
    } else {
        let file = File::open(path)?;
        // SAFETY: the mapping is read-only and dropped before this function returns
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        let content = simdutf8::basic::from_utf8(&mmap)
            .map_err(|e| anyhow::anyhow!("Invalid UTF-8 in config file: {}", e))?;

        parse_config_str(content)
    }
}

/// Parse and validate configuration text
///
/// # Errors
///
/// Returns an error if `content` is not valid TOML or holds out-of-range values
pub fn parse_config_str(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse TOML config")?;

    // Validate and return validation errors directly without wrapping
    validate_config(&config)?;
    Ok(config)
}

/// Check value ranges and cross-field constraints
///
/// # Errors
///
/// Returns the first violated constraint
pub fn validate_config(config: &Config) -> Result<()> {
    if config.retry.count == 0 {
        anyhow::bail!("Retry count must be at least 1");
    }

    if config.retry.delay_ms > 60_000 {
        anyhow::bail!("Retry delay cannot exceed 60000 ms");
    }

    if config.sync.extensions.is_empty() {
        anyhow::bail!("At least one extension must be configured in sync.extensions");
    }

    let suffix = config.sync.dest_suffix.trim_start_matches('.');
    if suffix.is_empty() || suffix.contains(['/', '\\']) {
        anyhow::bail!("Invalid destination suffix: {:?}", config.sync.dest_suffix);
    }

    if config.history.capacity == 0 {
        anyhow::bail!("History capacity must be at least 1");
    }

    if config.metadata.wait_timeout_ms == 0 {
        anyhow::bail!("Metadata wait timeout must be greater than 0");
    }

    if config.metadata.max_delay_ms < config.metadata.quiet_period_ms {
        anyhow::bail!("metadata.max_delay_ms cannot be shorter than metadata.quiet_period_ms");
    }

    if config.metadata.structure_file == config.metadata.commit_log_file {
        anyhow::bail!("Structure file and commit log file must have different names");
    }

    Ok(())
}
