use anyhow::Result;
use colored::Colorize;
use std::collections::HashSet;
use std::path::Path;

/// Sections that may appear at the top level of the config file
const KNOWN_SECTIONS: [&str; 4] = ["sync", "retry", "metadata", "history"];

/// Tracks which configuration fields are recognized by flatmirror
pub struct ConfigValidator {
    /// Set of valid `section.key` configuration fields
    known_fields: HashSet<String>,
}

impl ConfigValidator {
    /// Create a new validator with known configuration fields
    #[must_use]
    pub fn new() -> Self {
        let known_fields = [
            "sync.source_root",
            "sync.dest_dir",
            "sync.extensions",
            "sync.ignored_dirs",
            "sync.dest_suffix",
            "retry.count",
            "retry.delay_ms",
            "metadata.quiet_period_ms",
            "metadata.wait_timeout_ms",
            "metadata.max_delay_ms",
            "metadata.structure_file",
            "metadata.commit_log_file",
            "metadata.log_command",
            "history.capacity",
            "history.live_display",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        Self { known_fields }
    }

    /// Validate a configuration file and print warnings about unknown fields
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub fn validate_config_file(&self, config_path: &Path) -> Result<()> {
        if !config_path.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(config_path)?;
        let unknown = self.unknown_fields(&content)?;

        if !unknown.is_empty() {
            eprintln!("{}", "Configuration warnings:".yellow().bold());
            for field in &unknown {
                eprintln!("  Unknown configuration field: {}", field.yellow());
            }
            eprintln!();
        }

        Ok(())
    }

    /// Collect every field in `content` that flatmirror does not recognize
    ///
    /// # Errors
    ///
    /// Returns an error if `content` is not valid TOML
    pub fn unknown_fields(&self, content: &str) -> Result<Vec<String>> {
        let parsed: toml::Value = toml::from_str(content)?;
        let mut unknown = Vec::new();

        if let toml::Value::Table(sections) = parsed {
            for (section, value) in sections {
                if !KNOWN_SECTIONS.contains(&section.as_str()) {
                    unknown.push(section);
                    continue;
                }

                match value {
                    toml::Value::Table(fields) => {
                        for key in fields.keys() {
                            let full_key = format!("{section}.{key}");
                            if !self.known_fields.contains(&full_key) {
                                unknown.push(full_key);
                            }
                        }
                    }
                    _ => unknown.push(section),
                }
            }
        }

        unknown.sort();
        Ok(unknown)
    }

    /// Warn about settings that are valid but likely to misbehave
    pub fn warn_risky_options(config: &crate::config::Config) {
        let suffix = config.sync.dest_suffix.trim_start_matches('.');
        if config
            .sync
            .extensions
            .iter()
            .any(|ext| ext.trim_start_matches('.') == suffix)
        {
            eprintln!(
                "{} destination suffix '{}' is also a mirrored extension; mirrored files copied elsewhere may be mirrored again",
                "Warning:".yellow().bold(),
                suffix
            );
        }
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
