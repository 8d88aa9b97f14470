use crate::audio::{self, Waveform};
use crate::cache::{audio_file_name, is_entry_valid, CacheEntry, CacheIndex};
use crate::config::ProjectConfig;
use crate::error::{VoxError, VoxResult};
use crate::narration::{NarrationSource, NarrationUnit};
use crate::reference::VoiceReference;
use crate::tts::{fallback, SynthesisBackend};
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Model id recorded for placeholder artifacts from the mock generator.
pub const MOCK_MODEL_ID: &str = "mock";

/// Duration of the silent artifact produced for an explicitly empty
/// narration string (a deliberately silent scene).
const SILENT_UNIT_SECS: f64 = 0.05;

/// What happens to the run when one unit fails to synthesize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failure, before any save. The previous on-disk
    /// index stays intact.
    Abort,
    /// Record the failure, keep going, and save what succeeded. Failed keys
    /// keep their previous (stale) entries and are reported.
    KeepGoing,
}

/// What synthesizes on a cache miss.
pub enum Synthesizer<'a> {
    Backend(&'a mut dyn SynthesisBackend),
    /// Placeholder generation for environments with no reachable backend.
    /// Only reached when the caller explicitly opted in.
    Mock,
}

/// Per-run accounting, reported to the user key by key.
#[derive(Debug, Default)]
pub struct PopulateReport {
    pub hits: Vec<String>,
    pub generated: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// Advisory lock guarding the one shared mutable resource — the on-disk
/// index — against two concurrent population runs on the same project.
pub struct PopulationLock {
    path: PathBuf,
}

impl PopulationLock {
    pub fn acquire(output_dir: &Path) -> VoxResult<Self> {
        std::fs::create_dir_all(output_dir)?;
        let path = output_dir.join(".populate.lock");
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                let _ = write!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(VoxError::Locked(path))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for PopulationLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Populate the cache: walk narration units in declaration order, keep valid
/// entries untouched, regenerate the rest, then persist the full index in
/// one atomic write. The freshness marker is rewritten only when every unit
/// succeeded, so a partially failed run never short-circuits the next one.
pub fn populate(
    narration: &NarrationSource,
    mut index: CacheIndex,
    reference: &VoiceReference,
    synthesizer: &mut Synthesizer,
    config: &ProjectConfig,
    output_dir: &Path,
    policy: FailurePolicy,
) -> VoxResult<(CacheIndex, PopulateReport)> {
    validate_keys(&narration.units)?;
    std::fs::create_dir_all(output_dir)?;

    let mut report = PopulateReport::default();
    let mut prepared = false;

    for unit in &narration.units {
        let valid = index
            .get_by_key(&unit.key)
            .is_some_and(|entry| is_entry_valid(entry, &unit.text, reference, output_dir));
        if valid {
            tracing::debug!(key = %unit.key, "cache hit");
            report.hits.push(unit.key.clone());
            continue;
        }

        // Spawn/load the backend lazily so an all-hits run never pays for it.
        if !prepared {
            if let Synthesizer::Backend(backend) = synthesizer {
                backend.prepare(reference)?;
            }
            prepared = true;
        }

        tracing::info!(key = %unit.key, "synthesizing");
        match synthesize_unit(unit, reference, synthesizer, config, output_dir) {
            Ok(entry) => {
                index.upsert(entry);
                report.generated.push(unit.key.clone());
            }
            Err(e) => match policy {
                FailurePolicy::Abort => {
                    release(synthesizer);
                    return Err(VoxError::Generation(format!("key '{}': {e}", unit.key)));
                }
                FailurePolicy::KeepGoing => {
                    tracing::error!(key = %unit.key, "synthesis failed: {e}");
                    report.failed.push((unit.key.clone(), e.to_string()));
                }
            },
        }
    }

    release(synthesizer);
    index.save(output_dir)?;

    if report.failed.is_empty() {
        crate::cache::freshness::write_marker(
            output_dir,
            &crate::cache::freshness::Marker {
                narration_digest: narration.digest.clone(),
                reference_digest: reference.identity_digest(),
            },
        )?;
    }

    Ok((index, report))
}

fn release(synthesizer: &mut Synthesizer) {
    if let Synthesizer::Backend(backend) = synthesizer {
        backend.release();
    }
}

/// Narration keys become file names; reject anything that would escape the
/// output directory.
fn validate_keys(units: &[NarrationUnit]) -> VoxResult<()> {
    for unit in units {
        let k = &unit.key;
        if k.is_empty() || k.contains('/') || k.contains('\\') || k.contains("..") {
            return Err(VoxError::Configuration(format!(
                "invalid narration key '{k}': keys must be non-empty and free of path separators"
            )));
        }
    }
    Ok(())
}

fn synthesize_unit(
    unit: &NarrationUnit,
    reference: &VoiceReference,
    synthesizer: &mut Synthesizer,
    config: &ProjectConfig,
    output_dir: &Path,
) -> VoxResult<CacheEntry> {
    let file_name = audio_file_name(&unit.key, &config.store_format);
    let artifact_path = output_dir.join(&file_name);

    let (duration_seconds, model_id) = match synthesizer {
        Synthesizer::Mock => {
            let mock = fallback::generate(
                &unit.text,
                &artifact_path,
                config.sample_rate,
                &config.fallback,
            )?;
            (mock.duration_seconds, MOCK_MODEL_ID.to_string())
        }
        Synthesizer::Backend(backend) => {
            // An explicitly empty string is a deliberately silent scene:
            // emit a near-zero silent artifact without touching the backend.
            let waveform = if unit.text.is_empty() {
                Waveform::silence(SILENT_UNIT_SECS, config.sample_rate)
            } else {
                backend.synthesize(&unit.text, &config.language)?
            };
            let duration = waveform.duration_seconds();
            store_waveform(&waveform, &artifact_path, config)?;
            (duration, backend.id().to_string())
        }
    };

    Ok(CacheEntry {
        narration_key: unit.key.clone(),
        text: unit.text.clone(),
        audio_file: file_name,
        model_id,
        ref_audio: reference.audio_digest.clone(),
        ref_text: reference.transcript.clone(),
        duration_seconds,
        created_at: Utc::now(),
    })
}

/// Write a waveform to its durable storage form: straight WAV, or a
/// compressed transcode with the uncompressed intermediate discarded.
fn store_waveform(waveform: &Waveform, artifact_path: &Path, config: &ProjectConfig) -> VoxResult<()> {
    if config.store_format == "wav" {
        return audio::write_wav(artifact_path, waveform);
    }
    let intermediate = artifact_path.with_extension("tmp.wav");
    audio::write_wav(&intermediate, waveform)?;
    let result = audio::transcode(&intermediate, artifact_path, config.sample_rate);
    let _ = std::fs::remove_file(&intermediate);
    result
}
