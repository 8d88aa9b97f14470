use crate::audio::{self, Waveform};
use crate::config::ProjectConfig;
use crate::error::{VoxError, VoxResult};
use crate::reference::VoiceReference;
use crate::tts::{check_binary, resolve_output_path, SynthesisBackend};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{Duration, Instant};

/// Backend keeping the full model resident in one long-lived worker process
/// for the duration of a population run.
///
/// Protocol is JSON lines over the worker's stdio: one voice-prompt line at
/// startup, then one request line and one response line per synthesis call.
/// Worker diagnostics go to its stderr, which is passed through untouched.
pub struct ResidentBackend {
    model: String,
    device: String,
    dtype: String,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout: Option<BufReader<ChildStdout>>,
    scratch: tempfile::TempDir,
    counter: u64,
}

/// Voice-prompt line sent once after spawn.
#[derive(Serialize)]
struct PromptLine<'a> {
    ref_audio: &'a std::path::Path,
    ref_text: &'a str,
}

/// Per-call request line.
#[derive(Serialize)]
struct RequestLine<'a> {
    id: &'a str,
    text: &'a str,
    language: &'a str,
    output_dir: &'a std::path::Path,
}

/// Per-call response line: either an output record or an error report.
#[derive(Deserialize)]
struct ResponseLine {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    path: Option<PathBuf>,
    #[serde(default)]
    error: Option<String>,
}

impl ResidentBackend {
    pub fn new(config: &ProjectConfig) -> VoxResult<Self> {
        check_binary(&config.model)?;
        let scratch = tempfile::tempdir()?;
        Ok(Self {
            model: config.model.clone(),
            device: config.device.clone(),
            dtype: config.dtype.clone(),
            child: None,
            stdin: None,
            stdout: None,
            scratch,
            counter: 0,
        })
    }

    fn write_line<T: Serialize>(&mut self, value: &T) -> VoxResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| VoxError::Generation("model worker is not running".into()))?;
        let line = serde_json::to_string(value)
            .map_err(|e| VoxError::Generation(format!("failed to encode request: {e}")))?;
        writeln!(stdin, "{line}")
            .map_err(|e| VoxError::Generation(format!("failed to write to model worker: {e}")))?;
        stdin
            .flush()
            .map_err(|e| VoxError::Generation(format!("failed to flush model worker: {e}")))?;
        Ok(())
    }

    fn read_line(&mut self) -> VoxResult<ResponseLine> {
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| VoxError::Generation("model worker is not running".into()))?;
        let mut line = String::new();
        let n = stdout
            .read_line(&mut line)
            .map_err(|e| VoxError::Generation(format!("failed to read from model worker: {e}")))?;
        if n == 0 {
            return Err(VoxError::Generation(
                "model worker closed its output unexpectedly".into(),
            ));
        }
        serde_json::from_str(&line)
            .map_err(|e| VoxError::Generation(format!("unparseable model worker reply: {e}")))
    }
}

impl SynthesisBackend for ResidentBackend {
    fn id(&self) -> &str {
        &self.model
    }

    fn prepare(&mut self, reference: &VoiceReference) -> VoxResult<()> {
        let mut child = Command::new(&self.model)
            .args(["--device", &self.device])
            .args(["--dtype", &self.dtype])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                VoxError::BackendUnavailable(format!("failed to spawn '{}': {e}", self.model))
            })?;

        self.stdin = child.stdin.take();
        self.stdout = child.stdout.take().map(BufReader::new);
        self.child = Some(child);

        self.write_line(&PromptLine {
            ref_audio: &reference.audio_path,
            ref_text: &reference.transcript,
        })?;

        tracing::info!(model = %self.model, device = %self.device, "model worker started");
        Ok(())
    }

    fn synthesize(&mut self, text: &str, language: &str) -> VoxResult<Waveform> {
        self.counter += 1;
        let id = format!("u{}", self.counter);
        let scratch = self.scratch.path().to_path_buf();

        self.write_line(&RequestLine {
            id: &id,
            text,
            language,
            output_dir: &scratch,
        })?;
        let reply = self.read_line()?;

        if let Some(error) = reply.error {
            return Err(VoxError::Generation(error));
        }
        if reply.id.as_deref() != Some(id.as_str()) {
            return Err(VoxError::Generation(format!(
                "model worker answered for '{}', expected '{id}'",
                reply.id.unwrap_or_default()
            )));
        }
        let path = reply
            .path
            .ok_or_else(|| VoxError::Generation("model worker reply has no output path".into()))?;
        let path = resolve_output_path(&scratch, &path);

        let waveform = audio::read_wav(&path)?;
        let _ = std::fs::remove_file(&path);
        Ok(waveform)
    }

    fn release(&mut self) {
        // Close stdin so a well-behaved worker exits on its own, then reap.
        self.stdin = None;
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let deadline = Instant::now() + Duration::from_secs(2);
            loop {
                match child.try_wait() {
                    Ok(Some(_)) => break,
                    Ok(None) if Instant::now() < deadline => {
                        std::thread::sleep(Duration::from_millis(50));
                    }
                    _ => {
                        let _ = child.kill();
                        let _ = child.wait();
                        break;
                    }
                }
            }
            tracing::debug!(model = %self.model, "model worker released");
        }
    }
}

impl Drop for ResidentBackend {
    fn drop(&mut self) {
        self.release();
    }
}
