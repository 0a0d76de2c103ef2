//! Configuration management
//!
//! A [`Config`] is an immutable snapshot of `config.json`, `system_prompt.txt`
//! and environment overrides (env > file > default). Reloading produces a new
//! snapshot; nothing mutates a loaded config in place.

pub mod file;

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::{Error, Result};

/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-5-nano";

/// Default `ElevenLabs` voice
pub const DEFAULT_VOICE_ID: &str = "Cb8NLd0sUB8jI4MW2f9M";

/// Default `ElevenLabs` synthesis model
pub const DEFAULT_TTS_MODEL: &str = "eleven_multilingual_v2";

/// Default transcription model
pub const DEFAULT_STT_MODEL: &str = "gpt-4o-mini-transcribe";

/// Default reasoning effort for reasoning models
pub const DEFAULT_REASONING_EFFORT: &str = "minimal";

/// Response-length cap sent with every chat request
pub const MAX_COMPLETION_TOKENS: u32 = 400;

/// Fixed voice recording length in seconds
pub const RECORD_SECS: u64 = 5;

/// Environment variable selecting the configuration directory
pub const HOME_ENV: &str = "JOHN_HOME";

/// Assistant configuration snapshot
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `config.json`, `system_prompt.txt` and `logs/`
    pub dir: PathBuf,

    /// `OpenAI` API key (chat and transcription)
    pub openai_api_key: SecretString,

    /// `ElevenLabs` API key; speech is unavailable without it
    pub eleven_api_key: Option<SecretString>,

    /// Chat model identifier
    pub model: String,

    /// `reasoning_effort` sent with chat requests; `None` omits it
    pub reasoning_effort: Option<String>,

    /// Speak replies aloud
    pub speak: bool,

    /// Persona / system prompt
    pub persona: String,

    /// Voice settings
    pub voice: VoiceConfig,
}

/// Speech-to-text and text-to-speech settings
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// `ElevenLabs` voice identifier
    pub voice_id: String,

    /// `ElevenLabs` synthesis model
    pub tts_model: String,

    /// Transcription model
    pub stt_model: String,

    /// Recording length in seconds
    pub record_secs: u64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice_id: DEFAULT_VOICE_ID.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            stt_model: DEFAULT_STT_MODEL.to_string(),
            record_secs: RECORD_SECS,
        }
    }
}

/// The subset of a config shown to the user after a reload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveSettings {
    /// Active chat model
    pub model: String,
    /// Whether replies are spoken
    pub speak: bool,
}

impl Config {
    /// Path of the durable conversation log
    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.dir.join("logs").join("history.jsonl")
    }

    /// Path the voice recorder writes its WAV file to
    #[must_use]
    pub fn recording_path(&self) -> PathBuf {
        self.dir.join("input.wav")
    }

    /// Whether speech synthesis can run at all (credential present)
    #[must_use]
    pub const fn speech_available(&self) -> bool {
        self.eleven_api_key.is_some()
    }

    /// Model and speak flag, for display
    #[must_use]
    pub fn effective(&self) -> EffectiveSettings {
        EffectiveSettings {
            model: self.model.clone(),
            speak: self.speak,
        }
    }
}

/// Reads [`Config`] snapshots from a configuration directory
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    dir: PathBuf,
    use_env: bool,
}

impl ConfigLoader {
    /// Create a loader for `dir` that honours environment overrides
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            use_env: true,
        }
    }

    /// Ignore environment overrides (files only)
    #[must_use]
    pub const fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Configuration directory this loader reads from
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load a fresh configuration snapshot
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if either file is missing or malformed, or if
    /// no `OpenAI` API key is configured
    pub fn load(&self) -> Result<Config> {
        let fc = file::load_config_file(&self.dir)?;
        let persona = file::load_persona(&self.dir)?;

        let env = |key: &str| {
            if self.use_env {
                std::env::var(key).ok().filter(|v| !v.is_empty())
            } else {
                None
            }
        };

        let openai_api_key = env("OPENAI_API_KEY")
            .or(fc.openai_api_key)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("OPENAI_API_KEY is required".to_string()))?;

        let eleven_api_key = env("ELEVEN_API_KEY")
            .or(fc.eleven_api_key)
            .filter(|k| !k.trim().is_empty());

        let model = env("JOHN_MODEL")
            .or(fc.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let speak = env("JOHN_SPEAK")
            .map(|v| file::parse_flag(&v).unwrap_or(false))
            .or(fc.speak)
            .unwrap_or(false);

        let reasoning_effort = match fc.reasoning_effort {
            None => Some(DEFAULT_REASONING_EFFORT.to_string()),
            Some(effort) if effort.trim().is_empty() => None,
            Some(effort) => Some(effort.trim().to_string()),
        };

        let defaults = VoiceConfig::default();
        let voice = VoiceConfig {
            voice_id: fc.voice_id.unwrap_or(defaults.voice_id),
            tts_model: fc.tts_model.unwrap_or(defaults.tts_model),
            stt_model: fc.stt_model.unwrap_or(defaults.stt_model),
            record_secs: defaults.record_secs,
        };

        if speak && eleven_api_key.is_none() {
            tracing::warn!("SPEAK is enabled but ELEVEN_API_KEY is missing, replies will not be spoken");
        }

        tracing::info!(dir = %self.dir.display(), model = %model, speak, "configuration loaded");

        Ok(Config {
            dir: self.dir.clone(),
            openai_api_key: SecretString::from(openai_api_key),
            eleven_api_key: eleven_api_key.map(SecretString::from),
            model,
            reasoning_effort,
            speak,
            persona,
            voice,
        })
    }
}

/// Resolve the configuration directory: explicit flag, then `JOHN_HOME`, then
/// the current working directory
#[must_use]
pub fn resolve_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| std::env::var_os(HOME_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}
