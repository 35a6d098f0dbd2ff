//! CLI command implementations.

pub mod config;
pub mod scan;
pub mod status;
pub mod watch;

use crate::MirrorContext;
use crate::output::{self, ChangeHistory, StatusBoard};

/// Change history for a command run.
///
/// Quiet runs keep lines in memory only. Otherwise lines are echoed, or drawn
/// on the live status board when `live` is set and enabled in the config.
fn history_for(ctx: &MirrorContext, live: bool) -> ChangeHistory {
    let capacity = ctx.config.history.capacity;
    if output::is_quiet() {
        ChangeHistory::new(capacity)
    } else if live && ctx.config.history.live_display {
        ChangeHistory::with_board(
            capacity,
            StatusBoard {
                source: ctx.source_root.clone(),
                dest: ctx.dest_dir.clone(),
            },
        )
    } else {
        ChangeHistory::with_echo(capacity)
    }
}
