use crate::audio::{self, Waveform};
use crate::config::ProjectConfig;
use crate::error::{VoxError, VoxResult};
use crate::reference::VoiceReference;
use crate::tts::{
    check_binary, resolve_output_path, SynthesisBackend, WorkerItem, WorkerRequest, WorkerResponse,
};
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Backend spawning a fresh one-shot worker process per synthesis call.
///
/// Process exit is the release mechanism: model weights and any accelerator
/// memory pool are gone when the worker terminates, so nothing accumulates
/// across a long batch. The parent blocks on the worker, bounded by a hard
/// wall-clock timeout; timeout, non-zero exit, and unparseable output are
/// all terminal failures for that unit — this adapter never substitutes
/// silence on its own.
pub struct IsolatedBackend {
    model: String,
    device: String,
    dtype: String,
    timeout: Duration,
    reference: Option<VoiceReference>,
    scratch: tempfile::TempDir,
    counter: u64,
}

impl IsolatedBackend {
    pub fn new(config: &ProjectConfig) -> VoxResult<Self> {
        check_binary(&config.model)?;
        Ok(Self {
            model: config.model.clone(),
            device: config.device.clone(),
            dtype: config.dtype.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            reference: None,
            scratch: tempfile::tempdir()?,
            counter: 0,
        })
    }

    #[cfg(test)]
    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl SynthesisBackend for IsolatedBackend {
    fn id(&self) -> &str {
        &self.model
    }

    fn prepare(&mut self, reference: &VoiceReference) -> VoxResult<()> {
        // The reference travels with every request; each worker builds its
        // own voice prompt and discards it on exit.
        self.reference = Some(reference.clone());
        Ok(())
    }

    fn synthesize(&mut self, text: &str, language: &str) -> VoxResult<Waveform> {
        let reference = self
            .reference
            .as_ref()
            .ok_or_else(|| VoxError::Generation("backend not prepared with a voice".into()))?;

        self.counter += 1;
        let id = format!("u{}", self.counter);
        let request = WorkerRequest {
            items: vec![WorkerItem {
                id: id.clone(),
                text: text.to_string(),
            }],
            model: self.model.clone(),
            device: self.device.clone(),
            dtype: self.dtype.clone(),
            ref_audio: reference.audio_path.clone(),
            ref_text: reference.transcript.clone(),
            language: language.to_string(),
            output_dir: self.scratch.path().to_path_buf(),
        };

        let mut child = Command::new(&self.model)
            .args(["--device", &self.device])
            .args(["--dtype", &self.dtype])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                VoxError::BackendUnavailable(format!("failed to spawn '{}': {e}", self.model))
            })?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| VoxError::Generation("worker stdin unavailable".into()))?;
            let body = serde_json::to_vec(&request)
                .map_err(|e| VoxError::Generation(format!("failed to encode request: {e}")))?;
            stdin
                .write_all(&body)
                .map_err(|e| VoxError::Generation(format!("failed to write to worker: {e}")))?;
            // stdin drops here, closing the pipe
        }

        // Drain stdout/stderr on threads so a chatty worker can't fill a
        // pipe buffer and stall behind it while we wait for exit.
        let mut stdout_pipe = child
            .stdout
            .take()
            .ok_or_else(|| VoxError::Generation("worker stdout unavailable".into()))?;
        let mut stderr_pipe = child
            .stderr
            .take()
            .ok_or_else(|| VoxError::Generation("worker stderr unavailable".into()))?;
        let stdout_thread = std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stdout_pipe.read_to_end(&mut buf);
            buf
        });
        let stderr_thread = std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stderr_pipe.read_to_end(&mut buf);
            buf
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(VoxError::Generation(format!(
                            "worker timed out after {}s",
                            self.timeout.as_secs()
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    return Err(VoxError::Generation(format!(
                        "failed to wait for worker: {e}"
                    )))
                }
            }
        };

        let stdout = stdout_thread.join().unwrap_or_default();
        let stderr = stderr_thread.join().unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(VoxError::Generation(format!(
                "worker exited with {status}: {}",
                stderr.trim()
            )));
        }

        let response: WorkerResponse = serde_json::from_slice(&stdout).map_err(|e| {
            let stderr = String::from_utf8_lossy(&stderr);
            VoxError::Generation(format!(
                "unparseable worker output: {e} (stderr: {})",
                stderr.trim()
            ))
        })?;

        let record = response
            .outputs
            .iter()
            .find(|o| o.id == id)
            .ok_or_else(|| {
                VoxError::Generation(format!("worker response has no record for '{id}'"))
            })?;

        let path = resolve_output_path(self.scratch.path(), &record.path);
        let waveform = audio::read_wav(&path)?;
        let _ = std::fs::remove_file(&path);
        Ok(waveform)
    }

    fn release(&mut self) {
        // Nothing resident between calls; each worker released itself on
        // exit. Kept for interface symmetry.
        self.reference = None;
    }
}
