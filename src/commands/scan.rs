use crate::MirrorContext;
use crate::metadata::Regenerator;
use crate::mirror::{Mirror, SharedState};
use crate::output;
use crate::scanner;
use anyhow::Result;

/// Execute scan command: rebuild the destination once, then regenerate metadata
///
/// # Errors
///
/// Returns an error if:
/// - The source root is missing
/// - The destination directory cannot be created or read
pub fn execute(ctx: &mut MirrorContext) -> Result<()> {
    ctx.check_source_root()?;
    ctx.ensure_dest_exists()?;

    let state = SharedState::with_history(super::history_for(ctx, false));
    let mut mirror = Mirror::new(ctx, state.clone());
    let report = scanner::initial_sync(&mut mirror, &ctx.config.metadata)?;

    if state.signal.take() {
        Regenerator::new(ctx, &state).regenerate_now();
    }

    let summary = format!(
        "Mirrored {} files into {} ({} stale removed)",
        report.synced,
        ctx.dest_dir.display(),
        report.removed
    );
    if report.failed > 0 {
        output::warning(&format!("{summary}, {} failed", report.failed));
    } else {
        output::success(&summary);
    }

    Ok(())
}
