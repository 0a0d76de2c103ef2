//! Voice collaborators
//!
//! Microphone capture, speech-to-text, text-to-speech and speaker playback.
//! Each capability is a trait so the session manager can run against mocks.

mod capture;
mod playback;
mod stt;
mod tts;

pub use capture::{AudioCapture, AudioRecorder, MicRecorder, SAMPLE_RATE, samples_to_wav, write_wav};
pub use playback::{AudioPlayback, decode_mp3};
pub use stt::{OpenAiTranscriber, Transcriber};
pub use tts::{ElevenLabsSpeech, SpeechSynthesizer};
