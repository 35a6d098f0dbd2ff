//! Bounded change history with an optional live status board.
//!
//! Every status line the engine produces lands here. Appends from the event
//! worker, the metadata worker and the main thread are serialized by a single
//! lock, which also guards the board redraw so frames never interleave.

use colored::Colorize;
use crossterm::{
    cursor::MoveTo,
    queue,
    terminal::{Clear, ClearType},
    tty::IsTty,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::PathBuf;

/// Full-screen status view redrawn after every recorded line
#[derive(Debug, Clone)]
pub struct StatusBoard {
    /// Watched source root
    pub source: PathBuf,
    /// Destination directory
    pub dest: PathBuf,
}

impl StatusBoard {
    /// Render the board with the given history lines
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails
    pub fn render(&self, out: &mut impl Write, lines: &VecDeque<String>) -> io::Result<()> {
        queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
        writeln!(out, "{}", "--- flatmirror: real-time flattened mirror ---".bold())?;
        writeln!(out, "Watching:   {}", self.source.display())?;
        writeln!(out, "Syncing to: {}", self.dest.display())?;
        writeln!(out, "Status:     {}", "Monitoring... (Press Ctrl-C to stop)".green())?;
        writeln!(out)?;
        writeln!(out, "{}", format!("--- Last {} Changes ---", lines.len()).dimmed())?;
        for line in lines {
            writeln!(out, "{line}")?;
        }
        out.flush()
    }
}

/// Lines held under the history lock
struct HistoryState {
    lines: VecDeque<String>,
    capacity: usize,
}

/// Bounded, thread-safe log of human-readable status lines
pub struct ChangeHistory {
    state: Mutex<HistoryState>,
    board: Option<StatusBoard>,
    /// Print each line to stdout when there is no board
    echo: bool,
}

impl ChangeHistory {
    /// Create a history without a status board
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(HistoryState {
                lines: VecDeque::with_capacity(capacity.max(1)),
                capacity: capacity.max(1),
            }),
            board: None,
            echo: false,
        }
    }

    /// Create a history that also prints every line to stdout
    #[must_use]
    pub fn with_echo(capacity: usize) -> Self {
        Self {
            echo: true,
            ..Self::new(capacity)
        }
    }

    /// Create a history that redraws `board` on every line when stdout is a
    /// terminal, and prints plain lines otherwise
    #[must_use]
    pub fn with_board(capacity: usize, board: StatusBoard) -> Self {
        let mut history = Self::with_echo(capacity);
        if io::stdout().is_tty() {
            history.board = Some(board);
            history.echo = false;
        }
        history
    }

    /// Append a timestamped line, evicting the oldest one when full
    pub fn record(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::info!(target: "flatmirror::history", "{message}");

        let timestamp = chrono::Local::now().format("%H:%M:%S");
        let mut state = self.state.lock();
        if state.lines.len() == state.capacity {
            state.lines.pop_front();
        }
        let line = format!("[{timestamp}] {message}");

        if let Some(board) = &self.board {
            state.lines.push_back(line);
            let mut stdout = io::stdout().lock();
            if let Err(e) = board.render(&mut stdout, &state.lines) {
                tracing::debug!(error = %e, "Failed to redraw status board");
            }
        } else {
            if self.echo {
                println!("{}", line.dimmed());
            }
            state.lines.push_back(line);
        }
    }

    /// Snapshot of the recorded lines, oldest first
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.state.lock().lines.iter().cloned().collect()
    }

    /// Number of lines containing `needle`
    #[must_use]
    pub fn count_matching(&self, needle: &str) -> usize {
        self.state
            .lock()
            .lines
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }
}
