//! `config.json` and `system_prompt.txt` loading
//!
//! Both files live in the configuration directory. Keys in `config.json` use
//! upper-case names (`OPENAI_API_KEY`, `MODEL`, ...); every key except the
//! `OpenAI` credential is optional.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

/// Settings file name inside the configuration directory
pub const CONFIG_FILE: &str = "config.json";

/// Persona file name inside the configuration directory
pub const PROMPT_FILE: &str = "system_prompt.txt";

/// On-disk schema of `config.json`
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct ConfigFile {
    /// `OpenAI` API key (chat and transcription)
    #[serde(rename = "OPENAI_API_KEY", default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,

    /// `ElevenLabs` API key (speech synthesis)
    #[serde(rename = "ELEVEN_API_KEY", default, skip_serializing_if = "Option::is_none")]
    pub eleven_api_key: Option<String>,

    /// Chat model identifier
    #[serde(rename = "MODEL", default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Speak replies aloud (`true`/`false`, `1`/`0` or a string spelling of either)
    #[serde(
        rename = "SPEAK",
        default,
        deserialize_with = "deserialize_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub speak: Option<bool>,

    /// Reasoning effort sent with chat requests; empty omits the field
    #[serde(rename = "REASONING_EFFORT", default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,

    /// `ElevenLabs` voice identifier
    #[serde(rename = "VOICE_ID", default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,

    /// `ElevenLabs` synthesis model
    #[serde(rename = "TTS_MODEL", default, skip_serializing_if = "Option::is_none")]
    pub tts_model: Option<String>,

    /// Transcription model
    #[serde(rename = "STT_MODEL", default, skip_serializing_if = "Option::is_none")]
    pub stt_model: Option<String>,
}

/// Parse a loosely written boolean (`true`, `1`, `yes`, `on` and their opposites)
#[must_use]
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }

    match Option::<Flag>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Flag::Bool(b)) => Ok(Some(b)),
        Some(Flag::Int(n)) => Ok(Some(n != 0)),
        Some(Flag::Text(text)) => parse_flag(&text)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid boolean {text:?}"))),
    }
}

/// Path of `config.json` inside `dir`
#[must_use]
pub fn config_file_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

/// Path of `system_prompt.txt` inside `dir`
#[must_use]
pub fn prompt_file_path(dir: &Path) -> PathBuf {
    dir.join(PROMPT_FILE)
}

/// Read and parse `config.json`
///
/// # Errors
///
/// Returns `Error::Config` if the file is missing, unreadable, or not valid JSON
pub fn load_config_file(dir: &Path) -> Result<ConfigFile> {
    let path = config_file_path(dir);
    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("malformed {}: {e}", path.display())))?;

    tracing::debug!(path = %path.display(), "loaded config file");
    Ok(parsed)
}

/// Read `system_prompt.txt`, trimmed of surrounding whitespace
///
/// # Errors
///
/// Returns `Error::Config` if the file is missing or unreadable
pub fn load_persona(dir: &Path) -> Result<String> {
    let path = prompt_file_path(dir);
    std::fs::read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))
}

/// Write `config.json` (pretty-printed) into `dir`, creating it if needed
///
/// # Errors
///
/// Returns error if the directory or file cannot be written
pub fn write_config_file(dir: &Path, file: &ConfigFile) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = config_file_path(dir);
    let json = serde_json::to_string_pretty(file)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

/// Write `system_prompt.txt` into `dir`, creating it if needed
///
/// # Errors
///
/// Returns error if the directory or file cannot be written
pub fn write_persona(dir: &Path, persona: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = prompt_file_path(dir);
    std::fs::write(&path, persona.trim())?;
    Ok(path)
}
