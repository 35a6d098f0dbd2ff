use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::{Generator, generate};
use flatmirror::cli::{Cli, Commands};
use flatmirror::output;
use flatmirror::{MirrorContext, commands};
use std::io;
use std::process;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive
const LOG_ENV: &str = "FLATMIRROR_LOG";

fn main() {
    if let Err(e) = run() {
        output::error(&e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);
    output::set_quiet(cli.quiet);

    let command = cli.command.unwrap_or(Commands::Watch);
    if let Commands::Completion { shell } = command {
        print_completions(shell, &mut Cli::command());
        return Ok(());
    }

    let mut ctx = MirrorContext::new(cli.config.as_deref())?;
    ctx.override_roots(cli.source.as_deref(), cli.dest.as_deref())?;

    match command {
        Commands::Watch => commands::watch::execute(&mut ctx)?,
        Commands::Scan => commands::scan::execute(&mut ctx)?,
        Commands::Status { list } => commands::status::execute(&ctx, list)?,
        Commands::Config {
            key,
            value,
            unset,
            list,
        } => commands::config::execute(&mut ctx, key.as_deref(), value, unset, list)?,
        Commands::Completion { .. } => {}
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn print_completions<G: Generator>(g: G, cmd: &mut clap::Command) {
    generate(g, cmd, cmd.get_name().to_string(), &mut io::stdout());
}
