use crate::MirrorContext;
use crate::scanner;
use crate::utils::to_forward_slashes;
use anyhow::Result;
use colored::Colorize;
use std::fs;

/// Execute status command: show the roots and what a scan would produce
///
/// Nothing is written; the preview uses the same naming as a real scan.
///
/// # Errors
///
/// Returns an error if the source root is missing or cannot be walked
pub fn execute(ctx: &MirrorContext, list: bool) -> Result<()> {
    ctx.check_source_root()?;

    let planned = scanner::plan(&ctx.source_root, &ctx.dest_dir, &ctx.config.sync)?;
    let mirrored = count_mirrored(ctx);

    println!("{}", "[roots]".bold());
    println!("  source = {}", ctx.source_root.display());
    println!("  dest   = {}", ctx.dest_dir.display());

    println!("\n{}", "[files]".bold());
    println!("  to mirror = {}", planned.len());
    match mirrored {
        Some(count) => println!("  mirrored  = {count}"),
        None => println!("  mirrored  = {}", "destination does not exist".dimmed()),
    }

    if list && !planned.is_empty() {
        println!("\n{}", "[mapping]".bold());
        for (source, name) in &planned {
            println!("  {} {} {name}", to_forward_slashes(source), "->".dimmed());
        }
    }

    Ok(())
}

/// Number of flattened files currently in the destination, metadata excluded
fn count_mirrored(ctx: &MirrorContext) -> Option<usize> {
    let metadata = &ctx.config.metadata;
    let entries = fs::read_dir(&ctx.dest_dir).ok()?;
    Some(
        entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .is_some_and(|name| {
                        ctx.config.sync.is_mirrored_artifact(name)
                            && name != metadata.structure_file
                            && name != metadata.commit_log_file
                    })
            })
            .count(),
    )
}
