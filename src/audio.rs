use crate::error::{VoxError, VoxResult};
use std::path::Path;
use std::process::Command;

/// A decoded audio buffer: single-precision mono samples plus the sample rate
/// they were produced at. All duration and concatenation arithmetic happens
/// on this representation; the rate is backend-defined and travels with the
/// samples rather than being assumed.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn silence(duration_secs: f64, sample_rate: u32) -> Self {
        let count = (duration_secs * sample_rate as f64).round() as usize;
        Self {
            samples: vec![0.0; count],
            sample_rate,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode a WAV file into a normalized mono `Waveform`.
///
/// Integer sample formats are scaled into [-1.0, 1.0]; multi-channel input
/// is averaged down to mono.
pub fn read_wav(path: &Path) -> VoxResult<Waveform> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| VoxError::Generation(format!("failed to read {}: {e}", path.display())))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| VoxError::Generation(format!("bad float sample: {e}")))?,
        hound::SampleFormat::Int => {
            let scale = ((1i64 << (spec.bits_per_sample - 1)) as f32).max(1.0);
            let ints: Vec<i32> = reader
                .into_samples::<i32>()
                .collect::<Result<_, _>>()
                .map_err(|e| VoxError::Generation(format!("bad int sample: {e}")))?;
            ints.into_iter().map(|s| s as f32 / scale).collect()
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(Waveform {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Encode a `Waveform` as 16-bit mono WAV.
pub fn write_wav(path: &Path, waveform: &Waveform) -> VoxResult<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| VoxError::Generation(format!("failed to create {}: {e}", path.display())))?;
    for &sample in &waveform.samples {
        let clamped = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(clamped)
            .map_err(|e| VoxError::Generation(format!("failed to write sample: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| VoxError::Generation(format!("failed to finalize WAV: {e}")))?;
    Ok(())
}

/// Decode raw 16-bit little-endian PCM (as returned by the cloud API) into a
/// `Waveform` at the given rate.
pub fn pcm16le_to_waveform(bytes: &[u8], sample_rate: u32) -> Waveform {
    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / i16::MAX as f32)
        .collect();
    Waveform {
        samples,
        sample_rate,
    }
}

/// Transcode a WAV intermediate to a compressed mono container at a fixed
/// sample rate via the ffmpeg CLI. The WAV is left in place; the caller
/// decides when to discard it.
pub fn transcode(wav_path: &Path, out_path: &Path, sample_rate: u32) -> VoxResult<()> {
    let output = Command::new("ffmpeg")
        .args(["-y", "-i"])
        .arg(wav_path)
        .args(["-ac", "1", "-ar", &sample_rate.to_string()])
        .arg(out_path)
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::piped())
        .output()
        .map_err(|e| VoxError::Generation(format!("failed to run ffmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(VoxError::Generation(format!(
            "ffmpeg transcode failed: {stderr}"
        )));
    }
    Ok(())
}

/// Duration of a WAV file, tolerating unreadable or empty input as 0.0 so
/// consumers of last-resort placeholder artifacts never crash on them.
pub fn safe_wav_duration(path: &Path) -> f64 {
    match hound::WavReader::open(path) {
        Ok(reader) => {
            let spec = reader.spec();
            if spec.sample_rate == 0 {
                return 0.0;
            }
            reader.duration() as f64 / spec.sample_rate as f64
        }
        Err(_) => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_duration() {
        let wave = Waveform::silence(0.5, 24_000);
        assert_eq!(wave.samples.len(), 12_000);
        assert!((wave.duration_seconds() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_empty_waveform_zero_duration() {
        let wave = Waveform {
            samples: vec![],
            sample_rate: 24_000,
        };
        assert_eq!(wave.duration_seconds(), 0.0);
    }

    #[test]
    fn test_zero_rate_zero_duration() {
        let wave = Waveform {
            samples: vec![0.0; 100],
            sample_rate: 0,
        };
        assert_eq!(wave.duration_seconds(), 0.0);
    }

    #[test]
    fn test_wav_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let original = Waveform {
            samples: (0..2400)
                .map(|i| (i as f32 * 0.01).sin() * 0.5)
                .collect(),
            sample_rate: 24_000,
        };
        write_wav(&path, &original).unwrap();
        let decoded = read_wav(&path).unwrap();

        assert_eq!(decoded.sample_rate, 24_000);
        assert_eq!(decoded.samples.len(), 2400);
        // 16-bit quantization bounds the roundtrip error
        for (a, b) in original.samples.iter().zip(&decoded.samples) {
            assert!((a - b).abs() < 1.0 / 16_000.0);
        }
    }

    #[test]
    fn test_read_wav_downmixes_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 24_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(i16::MAX).unwrap(); // left
            writer.write_sample(0i16).unwrap(); // right
        }
        writer.finalize().unwrap();

        let wave = read_wav(&path).unwrap();
        assert_eq!(wave.samples.len(), 100);
        // average of full-scale and zero
        assert!((wave.samples[0] - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_pcm16le_decode() {
        // two samples: 0 and i16::MAX
        let bytes = [0u8, 0, 0xFF, 0x7F];
        let wave = pcm16le_to_waveform(&bytes, 24_000);
        assert_eq!(wave.samples.len(), 2);
        assert_eq!(wave.samples[0], 0.0);
        assert!((wave.samples[1] - 1.0).abs() < 1e-6);
        assert_eq!(wave.sample_rate, 24_000);
    }

    #[test]
    fn test_safe_duration_missing_file() {
        assert_eq!(safe_wav_duration(Path::new("/nonexistent/a.wav")), 0.0);
    }

    #[test]
    fn test_safe_duration_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        std::fs::write(&path, b"").unwrap();
        assert_eq!(safe_wav_duration(&path), 0.0);
    }

    #[test]
    fn test_safe_duration_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.wav");
        write_wav(&path, &Waveform::silence(0.25, 24_000)).unwrap();
        assert!((safe_wav_duration(&path) - 0.25).abs() < 1e-3);
    }
}
