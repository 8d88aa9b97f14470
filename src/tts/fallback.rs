use crate::config::FallbackConfig;
use crate::error::{VoxError, VoxResult};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Uniform word timing synthesized for caption/timing consumers. This is a
/// crude even split of the estimated duration, not a transcription.
#[derive(Debug, Clone, PartialEq)]
pub struct WordBoundary {
    pub word: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

/// Result of mock generation: a silent placeholder clip plus its estimated
/// duration and word timing.
#[derive(Debug)]
pub struct MockSynthesis {
    pub audio_path: PathBuf,
    pub duration_seconds: f64,
    pub word_boundaries: Vec<WordBoundary>,
}

/// Estimate speech duration from word count at a configurable rate, floored
/// so empty or near-empty text never yields a zero-length artifact.
pub fn estimate_duration(text: &str, config: &FallbackConfig) -> f64 {
    let words = text.split_whitespace().count() as f64;
    (words / config.words_per_second).max(config.min_duration)
}

/// Evenly divide `duration` across the words of `text`.
pub fn word_boundaries(text: &str, duration: f64) -> Vec<WordBoundary> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || duration <= 0.0 {
        return Vec::new();
    }
    let slot = duration / words.len() as f64;
    words
        .iter()
        .enumerate()
        .map(|(i, word)| WordBoundary {
            word: word.to_string(),
            start_seconds: i as f64 * slot,
            end_seconds: (i + 1) as f64 * slot,
        })
        .collect()
}

/// Generate placeholder audio for `text` when no real TTS backend is
/// reachable, so the downstream pipeline keeps moving.
///
/// Silence chain: ffmpeg, then sox, then an empty file that consumers treat
/// as zero duration. The reported duration always comes from the word-count
/// estimate, whichever tool produced the clip.
pub fn generate(
    text: &str,
    out_path: &Path,
    sample_rate: u32,
    config: &FallbackConfig,
) -> VoxResult<MockSynthesis> {
    let duration = estimate_duration(text, config);

    if !write_silence_ffmpeg(out_path, duration, sample_rate)
        && !write_silence_sox(out_path, duration, sample_rate)
    {
        tracing::warn!(
            path = %out_path.display(),
            "no silence tool available, writing empty placeholder"
        );
        std::fs::File::create(out_path).map_err(VoxError::Io)?;
    }

    Ok(MockSynthesis {
        audio_path: out_path.to_path_buf(),
        duration_seconds: duration,
        word_boundaries: word_boundaries(text, duration),
    })
}

fn write_silence_ffmpeg(out_path: &Path, duration: f64, sample_rate: u32) -> bool {
    let result = Command::new("ffmpeg")
        .args(["-y", "-f", "lavfi", "-i"])
        .arg(format!("anullsrc=r={sample_rate}:cl=mono"))
        .args(["-t", &format!("{duration:.3}")])
        .arg(out_path)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status();
    match result {
        Ok(status) if status.success() => true,
        Ok(_) | Err(_) => {
            tracing::debug!("ffmpeg silence generation unavailable, trying sox");
            false
        }
    }
}

fn write_silence_sox(out_path: &Path, duration: f64, sample_rate: u32) -> bool {
    let result = Command::new("sox")
        .args(["-n", "-r", &sample_rate.to_string(), "-c", "1"])
        .arg(out_path)
        .args(["trim", "0.0", &format!("{duration:.3}")])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status();
    matches!(result, Ok(status) if status.success())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_floor_for_empty_text() {
        let config = FallbackConfig::default();
        assert!((estimate_duration("", &config) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_duration_at_default_rate() {
        let config = FallbackConfig::default();
        let text = vec!["x"; 25].join(" ");
        assert!((estimate_duration(&text, &config) - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_duration_floor_for_single_word() {
        // 1 word / 2.5 wps = 0.4s, below the 0.5s floor
        let config = FallbackConfig::default();
        assert!((estimate_duration("hello", &config) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_duration_custom_rate() {
        let config = FallbackConfig {
            words_per_second: 2.0,
            min_duration: 0.5,
        };
        assert!((estimate_duration("one two three four", &config) - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_word_boundaries_uniform() {
        let bounds = word_boundaries("a b c d", 2.0);
        assert_eq!(bounds.len(), 4);
        for (i, b) in bounds.iter().enumerate() {
            assert!((b.start_seconds - i as f64 * 0.5).abs() < 1e-9);
            assert!((b.end_seconds - (i + 1) as f64 * 0.5).abs() < 1e-9);
        }
        assert!((bounds.last().unwrap().end_seconds - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_word_boundaries_empty() {
        assert!(word_boundaries("", 1.0).is_empty());
        assert!(word_boundaries("   ", 1.0).is_empty());
        assert!(word_boundaries("hello", 0.0).is_empty());
    }

    #[test]
    fn test_generate_reports_estimated_duration() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("mock.wav");
        let config = FallbackConfig::default();
        let result = generate("", &out, 24_000, &config).unwrap();

        // the file exists even when every silence tool is missing
        assert!(out.exists());
        assert!((result.duration_seconds - 0.5).abs() < f64::EPSILON);
        assert!(result.word_boundaries.is_empty());
    }

    #[test]
    fn test_generate_word_boundaries_cover_duration() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("mock.wav");
        let config = FallbackConfig::default();
        let text = vec!["x"; 25].join(" ");
        let result = generate(&text, &out, 24_000, &config).unwrap();

        assert_eq!(result.word_boundaries.len(), 25);
        assert!((result.duration_seconds - 10.0).abs() < f64::EPSILON);
        assert!(
            (result.word_boundaries.last().unwrap().end_seconds - 10.0).abs() < 1e-9
        );
    }
}
