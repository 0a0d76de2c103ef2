//! Interactive first-run setup wizard (`john setup`)

use std::path::Path;

use dialoguer::{Confirm, Input};

use crate::config::file::{self, ConfigFile};
use crate::config::{DEFAULT_MODEL, DEFAULT_VOICE_ID};

/// Persona written when no `system_prompt.txt` exists yet
const DEFAULT_PERSONA: &str = "You are John, a friendly personal assistant. Keep answers short and conversational.";

/// Run the interactive setup wizard, writing into `dir`
///
/// # Errors
///
/// Returns error if user input fails or the files cannot be written
pub fn run_setup(dir: &Path) -> anyhow::Result<()> {
    println!("John Setup\n");

    let config_path = file::config_file_path(dir);
    let existing = if config_path.exists() {
        println!("Existing config found at {}\n", config_path.display());
        file::load_config_file(dir).unwrap_or_default()
    } else {
        ConfigFile::default()
    };

    // 1. OpenAI key (required)
    let openai_api_key = prompt_key(
        "OpenAI API key (OPENAI_API_KEY)",
        existing.openai_api_key.as_deref(),
        false,
    )?;

    // 2. Chat model
    let model: String = Input::new()
        .with_prompt("Chat model")
        .default(existing.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()))
        .interact_text()?;

    // 3. Speech (optional)
    let speak = Confirm::new()
        .with_prompt("Speak replies aloud with ElevenLabs?")
        .default(existing.speak.unwrap_or(false))
        .interact()?;

    let (eleven_api_key, voice_id) = if speak {
        let key = prompt_key(
            "ElevenLabs API key (ELEVEN_API_KEY)",
            existing.eleven_api_key.as_deref(),
            true,
        )?;
        let voice: String = Input::new()
            .with_prompt("ElevenLabs voice id")
            .default(existing.voice_id.clone().unwrap_or_else(|| DEFAULT_VOICE_ID.to_string()))
            .interact_text()?;
        (key, Some(voice))
    } else {
        (existing.eleven_api_key.clone(), existing.voice_id.clone())
    };

    let config = ConfigFile {
        openai_api_key,
        eleven_api_key,
        model: Some(model),
        speak: Some(speak),
        voice_id,
        ..existing
    };

    let written = file::write_config_file(dir, &config)?;
    println!("\nConfig written to {}", written.display());

    // 4. Persona
    let prompt_path = file::prompt_file_path(dir);
    if prompt_path.exists() {
        println!("Keeping existing persona at {}", prompt_path.display());
    } else {
        let persona: String = Input::new()
            .with_prompt("Persona (system prompt)")
            .default(DEFAULT_PERSONA.to_string())
            .interact_text()?;
        let written = file::write_persona(dir, &persona)?;
        println!("Persona written to {}", written.display());
    }

    println!("\nRun `john` to start chatting.");
    Ok(())
}

/// Ask for an API key, showing a masked current value that blank input keeps
fn prompt_key(label: &str, current: Option<&str>, allow_none: bool) -> anyhow::Result<Option<String>> {
    let prompt = current.map_or_else(
        || label.to_string(),
        |k| format!("{label} (current: {}, leave blank to keep)", mask(k)),
    );

    let input: String = Input::new()
        .with_prompt(&prompt)
        .allow_empty(current.is_some() || allow_none)
        .interact_text()?;

    Ok(if input.trim().is_empty() {
        current.map(str::to_string)
    } else {
        Some(input.trim().to_string())
    })
}

fn mask(key: &str) -> String {
    if key.len() > 8 {
        format!("{}...{}", &key[..4], &key[key.len() - 4..])
    } else {
        "****".to_string()
    }
}
