//! xtask for flatmirror - build automation and tooling
//!
//! This binary provides development tasks like man page generation.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "xtask", about = "Build automation for flatmirror")]
enum Task {
    /// Generate man pages from clap definitions
    GenerateManPages {
        /// Output directory for man pages (default: ./man)
        #[arg(short, long, default_value = "man")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let task = Task::parse();

    match task {
        Task::GenerateManPages { output } => generate_man_pages(&output)?,
    }

    Ok(())
}

fn generate_man_pages(output_dir: &Path) -> Result<()> {
    println!("Generating man pages...");

    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;

    let cmd = flatmirror::cli::Cli::command();

    let man_path = output_dir.join("flatmirror.1");
    render(cmd.clone(), &man_path)?;

    // One page per subcommand, named like git's (flatmirror-watch.1, ...)
    for subcmd in cmd.get_subcommands() {
        let name = subcmd.get_name();
        let subcmd_man_path = output_dir.join(format!("flatmirror-{name}.1"));
        render(subcmd.clone(), &subcmd_man_path)?;
    }

    println!(
        "\nMan pages successfully generated in: {}",
        output_dir.display()
    );
    println!("\nTo view the man pages:");
    println!("  man {}/flatmirror.1", output_dir.display());
    println!("\nTo install system-wide (requires root):");
    println!(
        "  sudo cp {}/*.1 /usr/share/man/man1/",
        output_dir.display()
    );
    println!("  sudo mandb");

    Ok(())
}

fn render(cmd: clap::Command, path: &Path) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create man page: {}", path.display()))?;

    clap_mangen::Man::new(cmd).render(&mut std::io::BufWriter::new(file))?;

    println!("✓ Generated: {}", path.display());
    Ok(())
}
