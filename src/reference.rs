use crate::config::{ProjectConfig, Settings};
use crate::error::{VoxError, VoxResult};
use crate::narration::hex_digest;
use std::path::{Path, PathBuf};

/// Conventional file names expected inside a reference override directory.
const OVERRIDE_AUDIO: &str = "reference.wav";
const OVERRIDE_TRANSCRIPT: &str = "reference.txt";

/// The voice identity anchor for a project: reference audio plus its
/// transcript. A different reference changes every output, so the audio
/// digest participates in cache validity alongside the transcript content.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceReference {
    pub audio_path: PathBuf,
    pub transcript: String,
    /// SHA-256 of the reference audio bytes.
    pub audio_digest: String,
}

impl VoiceReference {
    /// Digest of the full voice identity (audio bytes + transcript), used by
    /// the coarse freshness marker. Either half changing changes the digest.
    pub fn identity_digest(&self) -> String {
        hex_digest(format!("{}\0{}", self.audio_digest, self.transcript).as_bytes())
    }
}

/// Resolve the voice reference for a project.
///
/// The settings override directory wins when set; otherwise the paths from
/// `voice.json` are resolved relative to the project directory. Pure read +
/// validate — call once per population run and reuse the result.
pub fn resolve(
    project_path: &Path,
    config: &ProjectConfig,
    settings: &Settings,
) -> VoxResult<VoiceReference> {
    let (audio_path, transcript_path) = if let Some(dir) = &settings.reference_dir {
        (dir.join(OVERRIDE_AUDIO), dir.join(OVERRIDE_TRANSCRIPT))
    } else {
        let audio = config.reference_audio.as_deref().ok_or_else(|| {
            VoxError::Configuration(
                "no reference audio configured (reference_audio in voice.json, or VOXCACHE_REFERENCE_DIR)".into(),
            )
        })?;
        let transcript = config.reference_transcript.as_deref().ok_or_else(|| {
            VoxError::Configuration(
                "no reference transcript configured (reference_transcript in voice.json, or VOXCACHE_REFERENCE_DIR)".into(),
            )
        })?;
        (project_path.join(audio), project_path.join(transcript))
    };

    if !audio_path.is_file() {
        return Err(VoxError::Configuration(format!(
            "reference audio not found: {}",
            audio_path.display()
        )));
    }
    if !transcript_path.is_file() {
        return Err(VoxError::Configuration(format!(
            "reference transcript not found: {}",
            transcript_path.display()
        )));
    }

    let transcript = std::fs::read_to_string(&transcript_path)?;
    if transcript.trim().is_empty() {
        return Err(VoxError::Configuration(format!(
            "reference transcript is empty: {}",
            transcript_path.display()
        )));
    }

    let audio_bytes = std::fs::read(&audio_path)?;
    let audio_digest = hex_digest(&audio_bytes);

    Ok(VoiceReference {
        audio_path,
        transcript: transcript.trim().to_string(),
        audio_digest,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_with_reference(audio: &[u8], transcript: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("voice_ref.wav"), audio).unwrap();
        std::fs::write(dir.path().join("voice_ref.txt"), transcript).unwrap();
        dir
    }

    fn config_with_paths() -> ProjectConfig {
        ProjectConfig {
            reference_audio: Some("voice_ref.wav".into()),
            reference_transcript: Some("voice_ref.txt".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_from_config() {
        let dir = project_with_reference(b"fake-wav", "This is the anchor sentence.");
        let reference = resolve(dir.path(), &config_with_paths(), &Settings::default()).unwrap();
        assert_eq!(reference.transcript, "This is the anchor sentence.");
        assert_eq!(reference.audio_digest.len(), 64);
        assert!(reference.audio_path.ends_with("voice_ref.wav"));
    }

    #[test]
    fn test_resolve_no_reference_configured() {
        let dir = tempfile::tempdir().unwrap();
        let result = resolve(dir.path(), &ProjectConfig::default(), &Settings::default());
        assert!(matches!(result, Err(VoxError::Configuration(_))));
    }

    #[test]
    fn test_resolve_missing_audio() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("voice_ref.txt"), "transcript").unwrap();
        let result = resolve(dir.path(), &config_with_paths(), &Settings::default());
        assert!(matches!(result, Err(VoxError::Configuration(_))));
    }

    #[test]
    fn test_resolve_missing_transcript() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("voice_ref.wav"), b"fake").unwrap();
        let result = resolve(dir.path(), &config_with_paths(), &Settings::default());
        assert!(matches!(result, Err(VoxError::Configuration(_))));
    }

    #[test]
    fn test_resolve_whitespace_transcript_rejected() {
        let dir = project_with_reference(b"fake", "   \n\t  ");
        let result = resolve(dir.path(), &config_with_paths(), &Settings::default());
        assert!(matches!(result, Err(VoxError::Configuration(_))));
    }

    #[test]
    fn test_override_dir_takes_precedence() {
        let project = project_with_reference(b"project-audio", "project transcript");
        let override_dir = tempfile::tempdir().unwrap();
        std::fs::write(override_dir.path().join("reference.wav"), b"override-audio").unwrap();
        std::fs::write(
            override_dir.path().join("reference.txt"),
            "override transcript",
        )
        .unwrap();

        let settings = Settings {
            reference_dir: Some(override_dir.path().to_path_buf()),
            api_key: None,
        };
        let reference = resolve(project.path(), &config_with_paths(), &settings).unwrap();
        assert_eq!(reference.transcript, "override transcript");
    }

    #[test]
    fn test_override_dir_missing_files_fails() {
        let project = project_with_reference(b"audio", "transcript");
        let empty_override = tempfile::tempdir().unwrap();
        let settings = Settings {
            reference_dir: Some(empty_override.path().to_path_buf()),
            api_key: None,
        };
        // Override dir wins even when incomplete — it must not silently fall
        // back to the project paths.
        let result = resolve(project.path(), &config_with_paths(), &settings);
        assert!(matches!(result, Err(VoxError::Configuration(_))));
    }

    #[test]
    fn test_identity_digest_covers_both_halves() {
        let base = VoiceReference {
            audio_path: PathBuf::from("/ref/reference.wav"),
            transcript: "anchor".into(),
            audio_digest: "aaa".into(),
        };
        let audio_changed = VoiceReference {
            audio_digest: "bbb".into(),
            ..base.clone()
        };
        let transcript_changed = VoiceReference {
            transcript: "different".into(),
            ..base.clone()
        };
        assert_ne!(base.identity_digest(), audio_changed.identity_digest());
        assert_ne!(base.identity_digest(), transcript_changed.identity_digest());
        assert_eq!(base.identity_digest(), base.clone().identity_digest());
    }

    #[test]
    fn test_audio_digest_tracks_content() {
        let a = project_with_reference(b"audio-one", "same transcript");
        let b = project_with_reference(b"audio-two", "same transcript");
        let ref_a = resolve(a.path(), &config_with_paths(), &Settings::default()).unwrap();
        let ref_b = resolve(b.path(), &config_with_paths(), &Settings::default()).unwrap();
        assert_ne!(ref_a.audio_digest, ref_b.audio_digest);
    }
}
