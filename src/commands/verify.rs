use crate::cache::{entry_status, freshness, CacheIndex, EntryStatus};
use crate::config::{self, Settings};
use crate::error::{VoxError, VoxResult};
use crate::narration;
use crate::reference;
use colored::*;
use std::path::Path;

/// CLI entry point: report coarse freshness plus a per-entry validation
/// breakdown. Exits non-zero (via error) when anything is stale, so shell
/// pipelines can gate a render on a warm cache.
pub fn run(path: &Path, settings: &Settings) -> VoxResult<()> {
    if !path.exists() {
        return Err(VoxError::ProjectNotFound(path.to_path_buf()));
    }

    let config = config::load_config(path)?;
    let narration = narration::load_narration(path)?;
    let voice = reference::resolve(path, &config, settings)?;
    let output_dir = config.output_path(path);

    let fresh =
        freshness::is_cache_fresh(&output_dir, &narration.digest, &voice.identity_digest());
    println!(
        "Coarse marker: {}",
        if fresh { "fresh".green() } else { "stale".yellow() }
    );

    let index = match CacheIndex::load(&output_dir) {
        Ok(index) => index,
        Err(VoxError::CacheCorruption(why)) => {
            println!("Index: {} ({why})", "corrupt".red());
            return Err(VoxError::CacheCorruption(why));
        }
        Err(e) => return Err(e),
    };

    let mut stale = 0usize;
    for unit in &narration.units {
        let status = index
            .get_by_key(&unit.key)
            .map(|entry| entry_status(entry, &unit.text, &voice, &output_dir));
        let verdict = match status {
            Some(EntryStatus::Valid) => "valid".green(),
            Some(EntryStatus::StaleText) => "stale text".yellow(),
            Some(EntryStatus::MissingAudio) => "missing audio".yellow(),
            Some(EntryStatus::StaleReference) => "stale reference".yellow(),
            Some(EntryStatus::Legacy) => "legacy".yellow(),
            None => "missing".yellow(),
        };
        if status != Some(EntryStatus::Valid) {
            stale += 1;
        }
        println!("  {:<24} {verdict}", unit.key);
    }

    // entries are superseded, never pruned; retired keys linger on disk
    let retired = index
        .entries()
        .iter()
        .filter(|e| narration.get(&e.narration_key).is_none())
        .count();
    if retired > 0 {
        println!("  ({retired} entries for retired keys kept on disk)");
    }

    if stale == 0 {
        println!("{} all {} entries valid", "OK:".green().bold(), narration.units.len());
        Ok(())
    } else {
        Err(VoxError::Other(format!(
            "{stale} of {} narration units need regeneration; run 'voxcache populate'",
            narration.units.len()
        )))
    }
}
