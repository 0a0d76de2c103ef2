//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use john::config::file::{CONFIG_FILE, PROMPT_FILE};
use john::session::Collaborators;
use john::voice::{AudioRecorder, SpeechSynthesizer, Transcriber};
use john::{ChatClient, Config, ConfigLoader, Error, Message, Result, SessionManager};

/// Chat collaborator that replays scripted replies and records every request
#[derive(Default)]
pub struct MockChat {
    replies: Mutex<VecDeque<Result<String>>>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
    delay: Option<Duration>,
}

impl MockChat {
    pub fn replying(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| Ok((*r).to_string())).collect()),
            ..Self::default()
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(Error::Chat(reason.to_string()))])),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn then(self, reply: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
        self
    }

    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared handle to the histories the collaborator was called with
    pub fn requests(&self) -> Arc<Mutex<Vec<Vec<Message>>>> {
        Arc::clone(&self.requests)
    }
}

#[async_trait]
impl ChatClient for MockChat {
    async fn complete(&self, messages: &[Message], _model: &str, _max_tokens: u32) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("ok".to_string()))
    }
}

/// Transcriber returning a fixed transcript
pub struct MockTranscriber {
    pub text: String,
}

impl MockTranscriber {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, _path: &Path) -> Result<String> {
        Ok(self.text.clone())
    }
}

/// Recorder that never touches a device
pub struct MockRecorder {
    pub path: PathBuf,
    pub calls: Arc<AtomicUsize>,
}

impl MockRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl AudioRecorder for MockRecorder {
    async fn record(&self, _duration: Duration) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.path.clone())
    }
}

/// Speech collaborator counting calls, optionally failing every one
#[derive(Default)]
pub struct MockSpeech {
    pub fail: bool,
    pub spoken: Arc<Mutex<Vec<String>>>,
}

impl MockSpeech {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSpeech {
    async fn speak(&self, text: &str) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(Error::Speech("quota exceeded".to_string()));
        }
        Ok(())
    }
}

/// Write `config.json` and `system_prompt.txt` into `dir`
pub fn write_config(dir: &Path, config_json: &str, persona: &str) {
    std::fs::write(dir.join(CONFIG_FILE), config_json).expect("failed to write config");
    std::fs::write(dir.join(PROMPT_FILE), persona).expect("failed to write persona");
}

/// Loader over `dir` that ignores the process environment
pub fn loader(dir: &Path) -> ConfigLoader {
    ConfigLoader::new(dir).without_env()
}

/// Load a test config from a fresh minimal directory
pub fn test_config(dir: &Path, persona: &str) -> Config {
    write_config(dir, r#"{"OPENAI_API_KEY": "sk-test"}"#, persona);
    loader(dir).load().expect("failed to load test config")
}

/// Collaborators backed by `chat` with silent voice mocks
pub fn collaborators(dir: &Path, chat: MockChat) -> Collaborators {
    Collaborators {
        chat: Arc::new(chat),
        transcriber: Arc::new(MockTranscriber::new("What time is it?")),
        recorder: Arc::new(MockRecorder::new(dir.join("input.wav"))),
        speech: None,
    }
}

/// Manager over a tempdir config, wired to mock collaborators
pub fn test_manager(dir: &Path, chat: MockChat) -> SessionManager {
    let config = test_config(dir, "Be brief.");
    SessionManager::new(config, collaborators(dir, chat)).with_loader(loader(dir))
}
