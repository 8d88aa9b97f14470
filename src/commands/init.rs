use crate::config::{self, ProjectConfig};
use crate::error::{VoxError, VoxResult};
use colored::*;
use std::path::Path;

const SAMPLE_NARRATION: &str = r#"{
  "intro": "Welcome. In this video we explore a small idea with big consequences.",
  "definition": "First, a precise definition, because everything that follows depends on it.",
  "outro": ""
}
"#;

const SAMPLE_TRANSCRIPT: &str =
    "This is a clean studio recording of my voice, used to anchor the cloned narration.\n";

/// Scaffold a new project: voice.json with defaults, a sample narration
/// file, and a placeholder reference transcript next to where the reference
/// audio belongs.
pub fn run(path: &Path) -> VoxResult<()> {
    if path.join("voice.json").exists() {
        return Err(VoxError::Other(format!(
            "{} already contains a voice.json",
            path.display()
        )));
    }
    std::fs::create_dir_all(path.join("reference"))?;

    let config = ProjectConfig {
        reference_audio: Some("reference/reference.wav".into()),
        reference_transcript: Some("reference/reference.txt".into()),
        ..Default::default()
    };
    config::save_config(path, &config)?;
    std::fs::write(path.join("narration.json"), SAMPLE_NARRATION)?;
    std::fs::write(path.join("reference/reference.txt"), SAMPLE_TRANSCRIPT)?;

    println!("{} {}", "Created project at".green(), path.display());
    println!("  voice.json               backend/model configuration");
    println!("  narration.json           narration keys and text");
    println!("  reference/reference.txt  reference transcript (replace with yours)");
    println!();
    println!(
        "Next: drop your reference audio at {} and run {}",
        "reference/reference.wav".bold(),
        format!("voxcache populate {}", path.display()).bold()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_project_files() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path()).unwrap();

        assert!(dir.path().join("voice.json").exists());
        assert!(dir.path().join("narration.json").exists());
        assert!(dir.path().join("reference/reference.txt").exists());

        let config = crate::config::load_config(dir.path()).unwrap();
        assert_eq!(
            config.reference_audio.as_deref(),
            Some("reference/reference.wav")
        );

        let narration = crate::narration::load_narration(dir.path()).unwrap();
        assert_eq!(narration.units.len(), 3);
        assert_eq!(narration.units[0].key, "intro");
        // the sample includes a deliberately silent unit
        assert_eq!(narration.units[2].text, "");
    }

    #[test]
    fn test_init_refuses_existing_project() {
        let dir = tempfile::tempdir().unwrap();
        run(dir.path()).unwrap();
        let result = run(dir.path());
        assert!(matches!(result, Err(VoxError::Other(_))));
    }
}
