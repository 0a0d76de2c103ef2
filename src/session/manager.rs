//! Session manager - owns conversation state and drives the collaborators
//!
//! Every state transition is written to the durable history log before the
//! in-memory session changes, so the log never records a message the session
//! does not hold (or the reverse).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::chat::{ChatClient, OpenAiChat};
use crate::config::{Config, ConfigLoader, EffectiveSettings, MAX_COMPLETION_TOKENS};
use crate::history::{HistoryLog, LogRecord};
use crate::session::{Message, Role, Session};
use crate::voice::{
    AudioRecorder, ElevenLabsSpeech, MicRecorder, OpenAiTranscriber, SpeechSynthesizer,
    Transcriber,
};
use crate::{Error, Result};

/// Handles to the external services a session talks to
#[derive(Clone)]
pub struct Collaborators {
    pub chat: Arc<dyn ChatClient>,
    pub transcriber: Arc<dyn Transcriber>,
    pub recorder: Arc<dyn AudioRecorder>,
    /// Absent when no `ElevenLabs` key is configured
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
}

impl Collaborators {
    /// Build HTTP and device-backed collaborators for `config`
    ///
    /// # Errors
    ///
    /// Returns error if a required credential is empty
    pub fn from_config(config: &Config) -> Result<Self> {
        let chat = OpenAiChat::new(config.openai_api_key.clone())?
            .with_reasoning_effort(config.reasoning_effort.clone());
        let transcriber = OpenAiTranscriber::new(
            config.openai_api_key.clone(),
            config.voice.stt_model.clone(),
        )?;
        let recorder = MicRecorder::new(config.recording_path());

        let speech = config
            .eleven_api_key
            .clone()
            .map(|key| {
                ElevenLabsSpeech::new(
                    key,
                    config.voice.voice_id.clone(),
                    config.voice.tts_model.clone(),
                )
            })
            .transpose()?
            .map(|s| Arc::new(s) as Arc<dyn SpeechSynthesizer>);

        Ok(Self {
            chat: Arc::new(chat),
            transcriber: Arc::new(transcriber),
            recorder: Arc::new(recorder),
            speech,
        })
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("speech", &self.speech.is_some())
            .finish_non_exhaustive()
    }
}

/// A completed voice turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    /// Transcribed user input
    pub user: String,
    /// Assistant reply
    pub reply: String,
}

/// Coordinates one conversation's state, logging and collaborator calls
#[derive(Debug)]
pub struct SessionManager {
    config: Arc<Config>,
    loader: Option<ConfigLoader>,
    collaborators: Collaborators,
    history: HistoryLog,
    speak: bool,
}

impl SessionManager {
    /// Create a manager from an existing snapshot and collaborators
    ///
    /// The history log is written to `config.history_path()`.
    #[must_use]
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        let history = HistoryLog::new(config.history_path());
        let speak = config.speak;
        Self {
            config: Arc::new(config),
            loader: None,
            collaborators,
            history,
            speak,
        }
    }

    /// Load configuration through `loader` and build real collaborators
    ///
    /// The loader is retained so [`Self::reload`] can re-read the same source.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if configuration cannot be loaded
    pub fn from_loader(loader: ConfigLoader) -> Result<Self> {
        let config = loader.load()?;
        let collaborators = Collaborators::from_config(&config)?;
        Ok(Self::new(config, collaborators).with_loader(loader))
    }

    /// Attach the configuration source used by [`Self::reload`]
    #[must_use]
    pub fn with_loader(mut self, loader: ConfigLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Active configuration snapshot
    #[must_use]
    pub const fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Active chat model
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Whether replies are spoken
    #[must_use]
    pub const fn speak(&self) -> bool {
        self.speak
    }

    /// Toggle speaking replies for the rest of the run
    pub fn set_speak(&mut self, speak: bool) {
        tracing::info!(speak, "speech toggled");
        self.speak = speak;
    }

    /// Location of the durable history log
    #[must_use]
    pub fn history_path(&self) -> &Path {
        self.history.path()
    }

    /// Start a session with `persona` as its system message
    ///
    /// # Errors
    ///
    /// Returns error if the opening record cannot be logged
    pub fn start_session(&mut self, persona: &str) -> Result<Session> {
        let session = Session::new(persona);
        let record = LogRecord::message(session.id(), Role::System, persona).with_model(self.model());
        self.history.log(record)?;

        tracing::info!(session_id = %session.id(), model = %self.model(), "session started");
        Ok(session)
    }

    /// Start a session using the configured persona
    ///
    /// # Errors
    ///
    /// Returns error if the opening record cannot be logged
    pub fn start_default_session(&mut self) -> Result<Session> {
        let persona = self.config.persona.clone();
        self.start_session(&persona)
    }

    /// Append a user message
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` for blank text, `Error::InvalidState` for an
    /// ended session, or an IO error if the record cannot be logged
    pub fn append_user_turn(&mut self, session: &mut Session, text: &str) -> Result<()> {
        session.ensure_live()?;
        if text.trim().is_empty() {
            return Err(Error::Validation("message is empty".to_string()));
        }

        self.history
            .log(LogRecord::message(session.id(), Role::User, text))?;
        session.push(Message::user(text));
        Ok(())
    }

    /// Apply the trimming policy, returning how many messages were dropped
    pub fn trim(&self, session: &mut Session) -> usize {
        let removed = session.trim();
        if removed > 0 {
            tracing::debug!(session_id = %session.id(), removed, "history trimmed");
        }
        removed
    }

    /// Ask the chat collaborator for a reply to the current history
    ///
    /// # Errors
    ///
    /// Returns `Error::Chat` if the collaborator fails or replies with blank text
    pub async fn request_reply(&self, session: &Session) -> Result<String> {
        let reply = self
            .collaborators
            .chat
            .complete(session.messages(), self.model(), MAX_COMPLETION_TOKENS)
            .await
            .map_err(|e| match e {
                chat @ Error::Chat(_) => chat,
                other => Error::Chat(other.to_string()),
            })?;

        if reply.trim().is_empty() {
            return Err(Error::Chat("empty reply".to_string()));
        }
        Ok(reply)
    }

    /// Append an assistant message
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` for an ended session, or an IO error if
    /// the record cannot be logged
    pub fn append_assistant_turn(&mut self, session: &mut Session, text: &str) -> Result<()> {
        session.ensure_live()?;

        let record =
            LogRecord::message(session.id(), Role::Assistant, text).with_model(self.model());
        self.history.log(record)?;
        session.push(Message::assistant(text));
        Ok(())
    }

    /// End the session; no further mutation is accepted
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` if already ended
    pub fn end_session(&mut self, session: &mut Session) -> Result<()> {
        session.ensure_live()?;
        self.history.log(LogRecord::meta(session.id(), "end"))?;
        session.mark_ended();

        tracing::info!(session_id = %session.id(), messages = session.len(), "session ended");
        Ok(())
    }

    /// Discard the conversation, keeping only the current persona
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidState` for an ended session
    pub fn clear(&mut self, session: &mut Session) -> Result<()> {
        session.ensure_live()?;
        self.history.log(LogRecord::meta(session.id(), "clear"))?;
        session.reset(self.config.persona.clone());

        tracing::info!(session_id = %session.id(), "history cleared");
        Ok(())
    }

    /// Run a full text turn: append, trim, reply, append, speak
    ///
    /// A chat failure leaves the user message in place and the session usable.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation`, `Error::InvalidState` or `Error::Chat`
    pub async fn submit_text(&mut self, session: &mut Session, text: &str) -> Result<String> {
        self.append_user_turn(session, text)?;
        self.trim(session);

        let reply = self.request_reply(session).await?;
        self.append_assistant_turn(session, &reply)?;
        self.speak_reply(&reply).await;
        Ok(reply)
    }

    /// Record a clip and transcribe it
    ///
    /// # Errors
    ///
    /// Returns `Error::Audio` or `Error::Transcription` from the collaborators,
    /// or `Error::Validation` if nothing was understood
    pub async fn listen(&self) -> Result<String> {
        capture_utterance(
            self.collaborators.recorder.as_ref(),
            self.collaborators.transcriber.as_ref(),
            self.record_duration(),
        )
        .await
    }

    /// Run a full voice turn: record, transcribe, then [`Self::submit_text`]
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::listen`] or [`Self::submit_text`]
    pub async fn submit_voice(&mut self, session: &mut Session) -> Result<Turn> {
        session.ensure_live()?;
        let user = self.listen().await?;
        let reply = self.submit_text(session, &user).await?;
        Ok(Turn { user, reply })
    }

    /// Speak `text` if speech is on; failures are reported, never returned
    pub async fn speak_reply(&self, text: &str) {
        if let Some(speech) = self.speech_handle() {
            speak_best_effort(speech.as_ref(), text).await;
        }
    }

    /// Synthesizer to use for the next reply, if speech is on and available
    #[must_use]
    pub fn speech_handle(&self) -> Option<Arc<dyn SpeechSynthesizer>> {
        if self.speak {
            self.collaborators.speech.clone()
        } else {
            None
        }
    }

    /// Chat collaborator and model, for running a reply off the manager
    #[must_use]
    pub fn chat_handle(&self) -> (Arc<dyn ChatClient>, String) {
        (Arc::clone(&self.collaborators.chat), self.model().to_string())
    }

    /// Recorder, transcriber and clip length, for running capture off the manager
    #[must_use]
    pub fn voice_handles(&self) -> (Arc<dyn AudioRecorder>, Arc<dyn Transcriber>, Duration) {
        (
            Arc::clone(&self.collaborators.recorder),
            Arc::clone(&self.collaborators.transcriber),
            self.record_duration(),
        )
    }

    /// Re-read configuration and rebuild every collaborator
    ///
    /// On failure the previous configuration and collaborators stay active.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if no source is attached or loading fails
    pub fn reload(&mut self, session: &Session) -> Result<EffectiveSettings> {
        let loader = self
            .loader
            .as_ref()
            .ok_or_else(|| Error::Config("no configuration source to reload from".to_string()))?;

        let config = loader.load()?;
        let collaborators = Collaborators::from_config(&config)?;
        Ok(self.install(session, config, collaborators))
    }

    /// Swap in a new configuration snapshot and matching collaborators
    pub fn install(
        &mut self,
        session: &Session,
        config: Config,
        collaborators: Collaborators,
    ) -> EffectiveSettings {
        let history_path = config.history_path();
        if history_path != self.history.path() {
            self.history = HistoryLog::new(history_path);
        }

        self.speak = config.speak;
        self.config = Arc::new(config);
        self.collaborators = collaborators;

        let record = LogRecord::meta(session.id(), "reload").with_model(self.model());
        if let Err(e) = self.history.log(record) {
            tracing::warn!(error = %e, "failed to log reload");
        }

        tracing::info!(model = %self.model(), speak = self.speak, "configuration reloaded");
        self.config.effective()
    }

    fn record_duration(&self) -> Duration {
        Duration::from_secs(self.config.voice.record_secs)
    }
}

/// Record a clip of `duration` and transcribe it
///
/// # Errors
///
/// Returns `Error::Audio` or `Error::Transcription` from the collaborators,
/// or `Error::Validation` if the transcript is blank
pub async fn capture_utterance(
    recorder: &dyn AudioRecorder,
    transcriber: &dyn Transcriber,
    duration: Duration,
) -> Result<String> {
    let path = recorder.record(duration).await?;
    let text = transcriber.transcribe(&path).await?;

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(Error::Validation("no speech recognized".to_string()));
    }
    Ok(text)
}

/// Speak `text`, reporting failures on the console instead of returning them
pub async fn speak_best_effort(speech: &dyn SpeechSynthesizer, text: &str) {
    if let Err(e) = speech.speak(text).await {
        tracing::warn!(error = %e, "speech failed");
        eprintln!("[TTS error] {e}");
    }
}
