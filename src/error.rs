use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxError {
    #[error("Project not found: {0}")]
    ProjectNotFound(PathBuf),

    #[error("Config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("Failed to parse config: {0}")]
    ConfigParse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("TTS backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Synthesis failed: {0}")]
    Generation(String),

    #[error("Cache index corrupt: {0}")]
    CacheCorruption(String),

    #[error("Another population run holds the lock: {0}")]
    Locked(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl VoxError {
    /// Return an actionable hint for the user, if applicable.
    pub fn hint(&self) -> Option<String> {
        match self {
            VoxError::ProjectNotFound(_) => Some(
                "Run 'voxcache init <path>' to create a new project, or check the path.".into(),
            ),
            VoxError::ConfigNotFound(_) => Some(
                "A valid project needs a voice.json file. Run 'voxcache init' to create one."
                    .into(),
            ),
            VoxError::ConfigParse(msg) => {
                if msg.contains("missing field") {
                    Some("voice.json is missing a required field. Run 'voxcache init <path>' to generate a valid example config.".into())
                } else {
                    Some("Check voice.json syntax. It must be a JSON object.".into())
                }
            }
            VoxError::Configuration(_) => Some(
                "The voice reference needs an audio file and a non-empty transcript. Set reference_audio/reference_transcript in voice.json, or point VOXCACHE_REFERENCE_DIR at a directory containing reference.wav and reference.txt.".into(),
            ),
            VoxError::BackendUnavailable(_) => Some(
                "Ensure the configured model runtime is installed and on PATH, or re-run with --allow-fallback to generate placeholder audio.".into(),
            ),
            VoxError::Locked(_) => Some(
                "Wait for the other run to finish, or delete the lock file if it is stale.".into(),
            ),
            _ => None,
        }
    }
}

pub type VoxResult<T> = Result<T, VoxError>;
