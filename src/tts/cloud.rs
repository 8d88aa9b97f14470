use crate::audio::{self, Waveform};
use crate::config::{ProjectConfig, Settings};
use crate::error::{VoxError, VoxResult};
use crate::reference::VoiceReference;
use crate::tts::SynthesisBackend;

const API_BASE: &str = "https://api.voicevault.dev/v1";

/// PCM rate requested from the API so decoding stays in-process.
const CLOUD_SAMPLE_RATE: u32 = 24_000;

/// Legacy cloud voice-cloning backend, retained for projects that predate
/// the local runtimes. The cloned voice lives server-side under the
/// configured model id; the local reference is not uploaded here, it only
/// anchors cache identity.
pub struct CloudBackend {
    api_key: String,
    model: String,
}

impl CloudBackend {
    pub fn new(config: &ProjectConfig, settings: &Settings) -> VoxResult<Self> {
        let api_key = settings.api_key.clone().ok_or_else(|| {
            VoxError::BackendUnavailable(
                "VOXCACHE_API_KEY not set (required by the cloud backend)".into(),
            )
        })?;
        Ok(Self {
            api_key,
            model: config.model.clone(),
        })
    }
}

impl SynthesisBackend for CloudBackend {
    fn id(&self) -> &str {
        &self.model
    }

    fn prepare(&mut self, _reference: &VoiceReference) -> VoxResult<()> {
        Ok(())
    }

    fn synthesize(&mut self, text: &str, language: &str) -> VoxResult<Waveform> {
        let url = format!("{API_BASE}/synthesize?output_format=pcm_{CLOUD_SAMPLE_RATE}");
        let body = serde_json::json!({
            "text": text,
            "voice_id": self.model,
            "language": language,
        });

        let response = ureq::post(&url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send(body.to_string().as_bytes())
            .map_err(|e| VoxError::Generation(format!("cloud API request failed: {e}")))?;

        let bytes = response
            .into_body()
            .read_to_vec()
            .map_err(|e| VoxError::Generation(format!("failed to read cloud response: {e}")))?;

        Ok(audio::pcm16le_to_waveform(&bytes, CLOUD_SAMPLE_RATE))
    }

    fn release(&mut self) {}
}
