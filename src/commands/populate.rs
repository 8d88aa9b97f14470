use crate::cache::{freshness, CacheIndex};
use crate::config::{self, Settings};
use crate::error::{VoxError, VoxResult};
use crate::narration;
use crate::populate::{populate, FailurePolicy, PopulationLock, Synthesizer};
use crate::reference;
use crate::tts::Backend;
use colored::*;
use std::path::Path;

/// CLI entry point for a population run.
pub fn run(
    path: &Path,
    force: bool,
    keep_going: bool,
    allow_fallback: bool,
    settings: &Settings,
) -> VoxResult<()> {
    if !path.exists() {
        return Err(VoxError::ProjectNotFound(path.to_path_buf()));
    }

    let config = config::load_config(path)?;
    let narration = narration::load_narration(path)?;
    let voice = reference::resolve(path, &config, settings)?;
    let output_dir = config.output_path(path);

    // Coarse short-circuit: nothing changed since the last successful run.
    if !force && freshness::is_cache_fresh(&output_dir, &narration.digest, &voice.identity_digest())
    {
        println!(
            "{} {} narration units already cached",
            "Cache fresh:".green().bold(),
            narration.units.len()
        );
        return Ok(());
    }

    let _lock = PopulationLock::acquire(&output_dir)?;
    let index = CacheIndex::load_or_default(&output_dir);

    // Backend selection happens once per run; fallback is an explicit
    // caller decision, only for unavailability, never for synthesis errors.
    let mut backend_slot;
    let mut synthesizer = match Backend::create(&config, settings) {
        Ok(backend) => {
            backend_slot = backend;
            Synthesizer::Backend(&mut backend_slot)
        }
        Err(VoxError::BackendUnavailable(reason)) if allow_fallback => {
            eprintln!(
                "{} {reason}; generating placeholder audio",
                "warning:".yellow().bold()
            );
            Synthesizer::Mock
        }
        Err(e) => return Err(e),
    };

    let policy = if keep_going {
        FailurePolicy::KeepGoing
    } else {
        FailurePolicy::Abort
    };

    let (index, report) = populate(
        &narration,
        index,
        &voice,
        &mut synthesizer,
        &config,
        &output_dir,
        policy,
    )?;

    println!(
        "{} {} generated, {} cached, {} failed ({} entries in index)",
        "Done:".green().bold(),
        report.generated.len(),
        report.hits.len(),
        report.failed.len(),
        index.len()
    );
    for key in &report.generated {
        println!("  {} {key}", "+".green());
    }
    if !report.failed.is_empty() {
        for (key, why) in &report.failed {
            eprintln!("  {} {key}: {why}", "✗".red());
        }
        return Err(VoxError::Other(format!(
            "{} narration unit(s) failed; see above",
            report.failed.len()
        )));
    }
    Ok(())
}
