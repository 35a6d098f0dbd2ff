use crate::MirrorContext;
use crate::config::parser::validate_config;
use crate::output;
use anyhow::Result;
use colored::Colorize;

/// Every settable key, grouped by section in display order
const KEYS: &[(&str, &[&str])] = &[
    (
        "sync",
        &["source_root", "dest_dir", "extensions", "ignored_dirs", "dest_suffix"],
    ),
    ("retry", &["count", "delay_ms"]),
    (
        "metadata",
        &[
            "quiet_period_ms",
            "wait_timeout_ms",
            "max_delay_ms",
            "structure_file",
            "commit_log_file",
            "log_command",
        ],
    ),
    ("history", &["capacity", "live_display"]),
];

/// Execute config command to get/set configuration values
///
/// # Errors
///
/// Returns an error if:
/// - The key is unknown or the value cannot be parsed
/// - The resulting configuration is invalid
/// - Failed to save configuration
pub fn execute(
    ctx: &mut MirrorContext,
    key: Option<&str>,
    value: Option<String>,
    unset: bool,
    list: bool,
) -> Result<()> {
    // If --list flag is set or no key is provided, show all configuration
    if list || key.is_none() {
        show_all_config(ctx);
        return Ok(());
    }

    let key =
        key.ok_or_else(|| anyhow::anyhow!("Key must be provided when not using --list flag"))?;

    if unset {
        ctx.config.unset(key)?;
        validate_config(&ctx.config)?;
        ctx.config.save(&ctx.config_path)?;
        output::success(&format!("Unset {key}"));
    } else if let Some(val) = value {
        ctx.config.set(key, val.clone())?;
        validate_config(&ctx.config)?;
        ctx.config.save(&ctx.config_path)?;
        output::success(&format!("Set {key} = {val}"));
    } else if let Some(val) = ctx.config.get(key) {
        println!("{val}");
    } else {
        output::warning(&format!("Configuration key '{key}' is not set"));
    }

    Ok(())
}

/// Show all configuration values
fn show_all_config(ctx: &MirrorContext) {
    for (i, (section, keys)) in KEYS.iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", format!("[{section}]").bold());
        for key in *keys {
            if let Some(value) = ctx.config.get(&format!("{section}.{key}")) {
                println!("  {key} = {value}");
            }
        }
    }
}
