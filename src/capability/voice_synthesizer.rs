use crate::error::Result;
use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// Turns a text script into an audio file. `None` is the non-fatal
/// "synthesis failed or unavailable" outcome — callers render without
/// voice rather than failing the segment.
#[async_trait]
pub trait VoiceSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, output_dir: &Path) -> Result<Option<PathBuf>>;
}

pub struct NullVoiceSynthesizer;

#[async_trait]
impl VoiceSynthesizer for NullVoiceSynthesizer {
    async fn synthesize(&self, _text: &str, _output_dir: &Path) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// Voice synthesizer backed by an ElevenLabs-style text-to-speech API.
pub struct ElevenLabsVoiceSynthesizer {
    client: reqwest::Client,
    api_key: String,
    voice_id: String,
    model_id: String,
}

impl ElevenLabsVoiceSynthesizer {
    pub fn new(api_key: String, voice_id: String, model_id: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("failed to build reqwest client"),
            api_key,
            voice_id,
            model_id,
        }
    }
}

#[async_trait]
impl VoiceSynthesizer for ElevenLabsVoiceSynthesizer {
    async fn synthesize(&self, text: &str, output_dir: &Path) -> Result<Option<PathBuf>> {
        let payload = json!({
            "text": text,
            "model_id": self.model_id,
            "voice_settings": { "stability": 0.5, "similarity_boost": 0.75 },
        });

        let resp = match self
            .client
            .post(format!(
                "https://api.elevenlabs.io/v1/text-to-speech/{}",
                self.voice_id
            ))
            .header("xi-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("voice synthesis request failed, rendering without voice: {e}");
                return Ok(None);
            }
        };

        if !resp.status().is_success() {
            tracing::warn!(
                "voice synthesis returned {}, rendering without voice",
                resp.status()
            );
            return Ok(None);
        }

        let bytes = resp.bytes().await?;
        tokio::fs::create_dir_all(output_dir).await?;
        let output_path = output_dir.join(format!("tts_{}.mp3", Uuid::new_v4()));
        tokio::fs::write(&output_path, &bytes).await?;

        Ok(Some(output_path))
    }
}
