//! John - personal voice and text chat assistant
//!
//! This library provides the pieces behind the `john` binary:
//! - Conversation sessions with a fixed persona and bounded history
//! - A durable, append-only JSONL conversation log
//! - Chat, transcription, speech synthesis and audio capture collaborators
//! - Console and event-loop shells
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Shells                          │
//! │   Console  │  Voice console  │  Event loop           │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                 Session manager                      │
//! │   History  │  Trimming  │  Config snapshot  │  Log   │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Collaborators                       │
//! │   Chat  │  STT  │  TTS + playback  │  Microphone     │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod chat;
pub mod config;
pub mod error;
pub mod history;
pub mod session;
pub mod setup;
pub mod shell;
pub mod voice;
pub mod worker;

pub use chat::{ChatClient, OpenAiChat};
pub use config::{Config, ConfigLoader, EffectiveSettings};
pub use error::{Error, Result};
pub use history::{HistoryLog, LogEntry, LogRecord, LogRole};
pub use session::{Collaborators, Message, Role, Session, SessionManager, Turn};
pub use worker::{Completion, TaskSlot};
