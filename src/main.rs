mod audio;
mod cache;
mod cli;
mod commands;
mod config;
mod error;
mod narration;
mod populate;
mod reference;
mod tts;

use clap::Parser;
use cli::{Cli, Command};
use colored::*;
use config::Settings;
use error::VoxResult;

fn main() {
    let cli = Cli::parse();

    // Pick up a project-agnostic .env before capturing settings
    dotenvy::dotenv().ok();

    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .try_init();
    }

    let settings = Settings::from_env();

    if let Err(e) = run(cli, &settings) {
        eprintln!("{} {}", "error:".red().bold(), e);
        if let Some(hint) = e.hint() {
            eprintln!("{} {}", "hint:".yellow().bold(), hint);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli, settings: &Settings) -> VoxResult<()> {
    match cli.command {
        Command::Init { path } => commands::init::run(&path),
        Command::Populate {
            path,
            force,
            keep_going,
            allow_fallback,
        } => commands::populate::run(&path, force, keep_going, allow_fallback, settings),
        Command::Verify { path } => commands::verify::run(&path, settings),
        Command::Lookup { path, key, text } => {
            commands::lookup::run(&path, key.as_deref(), text.as_deref())
        }
    }
}
