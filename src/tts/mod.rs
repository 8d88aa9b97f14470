pub mod cloud;
pub mod fallback;
pub mod isolated;
pub mod resident;

use crate::audio::Waveform;
use crate::config::{ProjectConfig, Settings};
use crate::error::{VoxError, VoxResult};
use crate::reference::VoiceReference;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Uniform interface over the TTS execution strategies. Implementations are
/// pure adapters: no caching, no retries, no silence fallback — those
/// decisions belong to the caller.
pub trait SynthesisBackend {
    /// Identifier recorded in cache entries (model/backend id).
    fn id(&self) -> &str;

    /// Anchor the cloned voice for the whole run. Must be called once before
    /// `synthesize`.
    fn prepare(&mut self, reference: &VoiceReference) -> VoxResult<()>;

    /// Synthesize one narration string. The returned waveform carries the
    /// backend-defined sample rate; callers never assume one.
    fn synthesize(&mut self, text: &str, language: &str) -> VoxResult<Waveform>;

    /// Release the backend's resident resources. Also invoked from `Drop`,
    /// so every exit path reaps worker processes and model memory.
    fn release(&mut self);
}

/// The closed set of execution strategies. Selected once per process from
/// `voice.json`; never mixed per call.
pub enum Backend {
    /// Full model loaded in a long-lived worker process. Heaviest resident
    /// footprint; the default path.
    Resident(resident::ResidentBackend),
    /// One-shot worker process per synthesis call, so model memory and any
    /// accelerator pool are released when the process exits.
    Isolated(isolated::IsolatedBackend),
    /// Legacy cloud voice API. Retained for older projects.
    Cloud(cloud::CloudBackend),
}

impl Backend {
    /// Factory: build the configured strategy, verifying its prerequisites
    /// (worker binary on PATH, API key present) up front.
    pub fn create(config: &ProjectConfig, settings: &Settings) -> VoxResult<Backend> {
        match config.backend.as_str() {
            "resident" => Ok(Backend::Resident(resident::ResidentBackend::new(config)?)),
            "isolated" => Ok(Backend::Isolated(isolated::IsolatedBackend::new(config)?)),
            "cloud" => Ok(Backend::Cloud(cloud::CloudBackend::new(config, settings)?)),
            other => Err(VoxError::Configuration(format!(
                "unknown backend: '{other}'. Supported: resident, isolated, cloud"
            ))),
        }
    }
}

impl SynthesisBackend for Backend {
    fn id(&self) -> &str {
        match self {
            Backend::Resident(b) => b.id(),
            Backend::Isolated(b) => b.id(),
            Backend::Cloud(b) => b.id(),
        }
    }

    fn prepare(&mut self, reference: &VoiceReference) -> VoxResult<()> {
        match self {
            Backend::Resident(b) => b.prepare(reference),
            Backend::Isolated(b) => b.prepare(reference),
            Backend::Cloud(b) => b.prepare(reference),
        }
    }

    fn synthesize(&mut self, text: &str, language: &str) -> VoxResult<Waveform> {
        match self {
            Backend::Resident(b) => b.synthesize(text, language),
            Backend::Isolated(b) => b.synthesize(text, language),
            Backend::Cloud(b) => b.synthesize(text, language),
        }
    }

    fn release(&mut self) {
        match self {
            Backend::Resident(b) => b.release(),
            Backend::Isolated(b) => b.release(),
            Backend::Cloud(b) => b.release(),
        }
    }
}

/// One synthesis request item sent to a worker process.
#[derive(Debug, Serialize, Deserialize)]
pub struct WorkerItem {
    pub id: String,
    pub text: String,
}

/// Full request object written to a one-shot worker's stdin.
#[derive(Debug, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub items: Vec<WorkerItem>,
    pub model: String,
    pub device: String,
    pub dtype: String,
    pub ref_audio: PathBuf,
    pub ref_text: String,
    pub language: String,
    /// Directory the worker writes its WAV outputs into.
    pub output_dir: PathBuf,
}

/// One synthesized output record reported by a worker.
#[derive(Debug, Serialize, Deserialize)]
pub struct WorkerOutput {
    pub id: String,
    pub path: PathBuf,
    pub duration_seconds: f64,
    #[serde(default)]
    pub cached: bool,
}

/// Full response object read from a worker's stdout. Diagnostics go to
/// stderr and are never parsed.
#[derive(Debug, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub outputs: Vec<WorkerOutput>,
}

/// Verify a worker binary is reachable on PATH.
pub(crate) fn check_binary(name: &str) -> VoxResult<()> {
    let check = Command::new("which")
        .arg(name)
        .output()
        .map_err(|e| VoxError::BackendUnavailable(format!("failed to check for '{name}': {e}")))?;

    if !check.status.success() {
        return Err(VoxError::BackendUnavailable(format!(
            "model runtime '{name}' not found on PATH"
        )));
    }
    Ok(())
}

/// Resolve a worker output path against the scratch directory it was asked
/// to write into. Workers may report absolute or scratch-relative paths.
pub(crate) fn resolve_output_path(scratch: &Path, reported: &Path) -> PathBuf {
    if reported.is_absolute() {
        reported.to_path_buf()
    } else {
        scratch.join(reported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;

    #[test]
    fn test_create_unknown_backend() {
        let config = ProjectConfig {
            backend: "nonexistent".into(),
            ..Default::default()
        };
        let result = Backend::create(&config, &Settings::default());
        assert!(matches!(result, Err(VoxError::Configuration(_))));
    }

    #[test]
    fn test_create_cloud_without_key() {
        let config = ProjectConfig {
            backend: "cloud".into(),
            ..Default::default()
        };
        let result = Backend::create(&config, &Settings::default());
        assert!(matches!(result, Err(VoxError::BackendUnavailable(_))));
    }

    #[test]
    fn test_create_resident_missing_binary() {
        let config = ProjectConfig {
            backend: "resident".into(),
            model: "definitely-not-a-real-binary-9f2c".into(),
            ..Default::default()
        };
        let result = Backend::create(&config, &Settings::default());
        assert!(matches!(result, Err(VoxError::BackendUnavailable(_))));
    }

    #[test]
    fn test_worker_request_shape() {
        let request = WorkerRequest {
            items: vec![WorkerItem {
                id: "intro".into(),
                text: "Hello world".into(),
            }],
            model: "tts-worker".into(),
            device: "cpu".into(),
            dtype: "float32".into(),
            ref_audio: PathBuf::from("/ref/reference.wav"),
            ref_text: "anchor".into(),
            language: "en".into(),
            output_dir: PathBuf::from("/tmp/scratch"),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"items\""));
        assert!(json.contains("\"ref_audio\""));
        assert!(json.contains("\"output_dir\""));
    }

    #[test]
    fn test_worker_response_cached_defaults_false() {
        let json = r#"{"outputs": [{"id": "intro", "path": "intro.wav", "duration_seconds": 1.2}]}"#;
        let response: WorkerResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.outputs.len(), 1);
        assert!(!response.outputs[0].cached);
    }

    #[test]
    fn test_resolve_output_path() {
        let scratch = Path::new("/scratch");
        assert_eq!(
            resolve_output_path(scratch, Path::new("a.wav")),
            PathBuf::from("/scratch/a.wav")
        );
        assert_eq!(
            resolve_output_path(scratch, Path::new("/abs/a.wav")),
            PathBuf::from("/abs/a.wav")
        );
    }
}
