use crate::error::{VoxError, VoxResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Per-project voice configuration, loaded from `<project>/voice.json`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectConfig {
    /// Directory (relative to the project) where cached audio and the index live.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Reference audio path, relative to the project directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_audio: Option<String>,

    /// Reference transcript path, relative to the project directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_transcript: Option<String>,

    /// Backend strategy: "resident", "isolated", or "cloud".
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Model runtime identifier — the worker binary for local backends,
    /// or the cloud model id for the cloud backend.
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_device")]
    pub device: String,

    #[serde(default = "default_dtype")]
    pub dtype: String,

    #[serde(default = "default_language")]
    pub language: String,

    /// Storage container for cached artifacts: "mp3" (transcoded) or "wav".
    #[serde(default = "default_store_format")]
    pub store_format: String,

    /// Storage sample rate for cached artifacts, in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Wall-clock timeout for one-shot worker subprocesses, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub fallback: FallbackConfig,
}

/// Tuning for the mock/silence generator used when no real backend is reachable.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
    #[serde(default = "default_words_per_second")]
    pub words_per_second: f64,

    /// Minimum artifact duration, so empty or near-empty text never yields a
    /// zero-length clip.
    #[serde(default = "default_min_duration")]
    pub min_duration: f64,
}

fn default_output_dir() -> String {
    "audio".into()
}
fn default_backend() -> String {
    "resident".into()
}
fn default_model() -> String {
    "tts-worker".into()
}
fn default_device() -> String {
    "cpu".into()
}
fn default_dtype() -> String {
    "float32".into()
}
fn default_language() -> String {
    "en".into()
}
fn default_store_format() -> String {
    "mp3".into()
}
fn default_sample_rate() -> u32 {
    24_000
}
fn default_timeout_secs() -> u64 {
    600
}
fn default_words_per_second() -> f64 {
    2.5
}
fn default_min_duration() -> f64 {
    0.5
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            reference_audio: None,
            reference_transcript: None,
            backend: default_backend(),
            model: default_model(),
            device: default_device(),
            dtype: default_dtype(),
            language: default_language(),
            store_format: default_store_format(),
            sample_rate: default_sample_rate(),
            timeout_secs: default_timeout_secs(),
            fallback: FallbackConfig::default(),
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            words_per_second: default_words_per_second(),
            min_duration: default_min_duration(),
        }
    }
}

impl ProjectConfig {
    /// Absolute output directory for cached audio and the index.
    pub fn output_path(&self, project_path: &Path) -> PathBuf {
        let rel = self.output_dir.strip_prefix("./").unwrap_or(&self.output_dir);
        project_path.join(rel)
    }
}

/// Process-level overrides, captured once at startup and passed explicitly
/// into the resolver and backend factory.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// Override directory containing `reference.wav` + `reference.txt`.
    /// Takes precedence over the per-project reference paths.
    pub reference_dir: Option<PathBuf>,

    /// API key for the legacy cloud backend.
    pub api_key: Option<String>,
}

impl Settings {
    /// Capture overrides from the environment. Called once in `main`, after
    /// `.env` loading; nothing else in the crate reads env vars.
    pub fn from_env() -> Self {
        Self {
            reference_dir: std::env::var("VOXCACHE_REFERENCE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            api_key: std::env::var("VOXCACHE_API_KEY")
                .ok()
                .filter(|v| !v.is_empty()),
        }
    }
}

/// Load config from `project_path/voice.json`.
pub fn load_config(project_path: &Path) -> VoxResult<ProjectConfig> {
    let config_path = project_path.join("voice.json");
    if !config_path.exists() {
        return Err(VoxError::ConfigNotFound(config_path));
    }
    let content = std::fs::read_to_string(&config_path)?;
    serde_json::from_str(&content).map_err(|e| VoxError::ConfigParse(e.to_string()))
}

/// Save a `ProjectConfig` to `project_path/voice.json`.
pub fn save_config(project_path: &Path, config: &ProjectConfig) -> VoxResult<()> {
    let json =
        serde_json::to_string_pretty(config).map_err(|e| VoxError::ConfigParse(e.to_string()))?;
    std::fs::write(project_path.join("voice.json"), json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "output_dir": "voiceover",
            "reference_audio": "ref/voice.wav",
            "reference_transcript": "ref/voice.txt",
            "backend": "isolated",
            "model": "qtts-worker",
            "device": "cuda",
            "dtype": "bfloat16",
            "language": "en",
            "store_format": "mp3",
            "sample_rate": 24000,
            "timeout_secs": 300,
            "fallback": { "words_per_second": 3.0, "min_duration": 0.25 }
        }"#;
        let config: ProjectConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.output_dir, "voiceover");
        assert_eq!(config.backend, "isolated");
        assert_eq!(config.model, "qtts-worker");
        assert_eq!(config.device, "cuda");
        assert_eq!(config.dtype, "bfloat16");
        assert_eq!(config.timeout_secs, 300);
        assert!((config.fallback.words_per_second - 3.0).abs() < f64::EPSILON);
        assert!((config.fallback.min_duration - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: ProjectConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.output_dir, "audio");
        assert_eq!(config.backend, "resident");
        assert_eq!(config.sample_rate, 24_000);
        assert_eq!(config.timeout_secs, 600);
        assert!((config.fallback.words_per_second - 2.5).abs() < f64::EPSILON);
        assert!((config.fallback.min_duration - 0.5).abs() < f64::EPSILON);
        assert!(config.reference_audio.is_none());
    }

    #[test]
    fn test_parse_invalid_json() {
        let result = serde_json::from_str::<ProjectConfig>("not json {{{");
        assert!(result.is_err());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig {
            reference_audio: Some("ref.wav".into()),
            reference_transcript: Some("ref.txt".into()),
            backend: "isolated".into(),
            ..Default::default()
        };
        save_config(dir.path(), &config).unwrap();
        let loaded = load_config(dir.path()).unwrap();
        assert_eq!(loaded.backend, "isolated");
        assert_eq!(loaded.reference_audio.as_deref(), Some("ref.wav"));
        assert_eq!(loaded.output_dir, "audio");
    }

    #[test]
    fn test_load_config_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(dir.path());
        assert!(matches!(result, Err(VoxError::ConfigNotFound(_))));
    }

    #[test]
    fn test_output_path_strips_dot_slash() {
        let config = ProjectConfig {
            output_dir: "./voiceover".into(),
            ..Default::default()
        };
        let out = config.output_path(Path::new("/proj"));
        assert_eq!(out, Path::new("/proj/voiceover"));
    }

    #[test]
    fn test_settings_default_empty() {
        let settings = Settings::default();
        assert!(settings.reference_dir.is_none());
        assert!(settings.api_key.is_none());
    }
}
