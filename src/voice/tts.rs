//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::voice::AudioPlayback;
use crate::{Error, Result};

/// Speaks text aloud: synthesis followed by synchronous playback
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text` and play it, returning once playback finishes
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Synthesizes speech with `ElevenLabs` and plays it on the default output
pub struct ElevenLabsSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    voice_id: String,
    model: String,
}

impl ElevenLabsSpeech {
    /// Create a new `ElevenLabs` synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: SecretString, voice_id: String, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice_id,
            model,
        })
    }

    /// Synthesize text to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the API rejects it
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}",
            self.voice_id
        );

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .header("Accept", "audio/mpeg")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Speech(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Speech(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Speech(e.to_string()))?;
        tracing::debug!(bytes = audio.len(), voice = %self.voice_id, "speech synthesized");
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSpeech {
    async fn speak(&self, text: &str) -> Result<()> {
        let mp3 = self.synthesize(text).await?;

        // cpal streams are not Send, so the device is opened on the blocking thread
        tokio::task::spawn_blocking(move || -> Result<()> { AudioPlayback::new()?.play_mp3(&mp3) })
            .await
            .map_err(|e| Error::Speech(format!("playback task failed: {e}")))?
            .map_err(|e| Error::Speech(e.to_string()))
    }
}
