use crate::MirrorContext;
use crate::metadata::{DebounceTiming, Regenerator};
use crate::mirror::{Mirror, SharedState};
use crate::output;
use crate::scanner;
use crate::watcher::{Pipeline, SourceWatcher};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::mpsc;
use tracing::info;

/// Execute watch command: initial scan, then mirror live changes until Ctrl-C
///
/// # Errors
///
/// Returns an error if:
/// - The source root is missing or the destination cannot be created
/// - The initial scan fails
/// - A worker thread, the file watcher or the Ctrl-C handler cannot be started
pub fn execute(ctx: &mut MirrorContext) -> Result<()> {
    ctx.check_source_root()?;
    ctx.ensure_dest_exists()?;

    let state = SharedState::with_history(super::history_for(ctx, true));
    let mut mirror = Mirror::new(ctx, state.clone());
    let report = scanner::initial_sync(&mut mirror, &ctx.config.metadata)?;
    info!(synced = report.synced, removed = report.removed, "Initial scan done");

    let regenerator = Arc::new(Regenerator::new(ctx, &state));
    let metadata_worker = Arc::clone(&regenerator).spawn(
        Arc::clone(&state.signal),
        DebounceTiming::from(&ctx.config.metadata),
    )?;

    let (stop_tx, stop_rx) = mpsc::channel();
    let started = ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("Failed to install Ctrl-C handler")
    .and_then(|()| Pipeline::start(mirror))
    .and_then(|pipeline| {
        SourceWatcher::start(&ctx.source_root, pipeline.sink()).map(|watcher| (pipeline, watcher))
    });

    let (pipeline, watcher) = match started {
        Ok(running) => running,
        Err(e) => {
            state.signal.shutdown();
            let _ = metadata_worker.join();
            return Err(e);
        }
    };

    state
        .history
        .record(format!("Watching {} for changes...", ctx.source_root.display()));
    stop_rx
        .recv()
        .context("Ctrl-C handler disconnected")?;

    state.history.record("Stopping...");
    drop(watcher);
    pipeline.shutdown()?;
    state.signal.shutdown();
    metadata_worker
        .join()
        .map_err(|_| anyhow::anyhow!("Metadata worker panicked"))?;

    output::success("Stopped watching");
    Ok(())
}
