use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "voxcache",
    about = "Voiceover cache and TTS backend mediation for narrated explainer videos",
    version,
    after_help = "\x1b[1mExamples:\x1b[0m
  voxcache init ./my-video             Create a new project
  voxcache populate ./my-video         Synthesize missing narration audio
  voxcache populate ./my-video --force --keep-going   Regenerate, tolerating per-unit failures
  voxcache verify ./my-video           Check the cache against the current narration
  voxcache lookup ./my-video --text \"Hello world\"     Find the cached clip for a literal string"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a new narration project
    Init {
        /// Path to create the project directory
        path: PathBuf,
    },
    /// Synthesize and cache audio for every narration unit that is missing or stale
    Populate {
        /// Path to the project directory
        path: PathBuf,

        /// Run even when the coarse freshness check says nothing changed
        #[arg(long)]
        force: bool,

        /// On a per-unit synthesis failure, record it and continue instead of aborting
        #[arg(long)]
        keep_going: bool,

        /// Generate placeholder silence when no TTS backend is reachable
        #[arg(long)]
        allow_fallback: bool,
    },
    /// Report cache freshness and per-entry validity against the current narration
    Verify {
        /// Path to the project directory
        path: PathBuf,
    },
    /// Look up one cache entry by logical key or exact narration text
    Lookup {
        /// Path to the project directory
        path: PathBuf,

        /// Logical narration key
        #[arg(long, short = 'k')]
        key: Option<String>,

        /// Exact narration text
        #[arg(long, short = 't')]
        text: Option<String>,
    },
}
