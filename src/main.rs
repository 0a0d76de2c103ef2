use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use john::config::{self, ConfigLoader};
use john::shell::{run_console, run_events};
use john::voice::{AudioCapture, AudioPlayback, ElevenLabsSpeech, SpeechSynthesizer};
use john::SessionManager;

/// John - personal voice and text chat assistant
#[derive(Parser)]
#[command(name = "john", version, about)]
struct Cli {
    /// Directory holding config.json, system_prompt.txt and logs/ (default: current directory)
    #[arg(long, env = config::HOME_ENV)]
    config_dir: Option<PathBuf>,

    /// Enable voice input: an empty line records a clip
    #[arg(long, conflicts_with = "events")]
    voice: bool,

    /// Run the event-loop shell (background replies, /voice /speak /reload /clear)
    #[arg(long)]
    events: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
    /// Interactive first-run setup
    Setup,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Diagnostics go to stderr so they never interleave with the chat
    let filter = match cli.verbose {
        0 => "warn,john=info",
        1 => "info,john=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let dir = config::resolve_dir(cli.config_dir);

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&dir, &text).await,
            Command::Setup => john::setup::run_setup(&dir),
        };
    }

    let mut manager = SessionManager::from_loader(ConfigLoader::new(&dir))?;
    tracing::debug!(config = ?manager.config(), "loaded configuration");

    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let mut out = std::io::stdout();

    if cli.events {
        run_events(&mut manager, input, &mut out).await?;
    } else {
        run_console(&mut manager, input, &mut out, cli.voice).await?;
    }

    Ok(())
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    // cpal streams are not Send, so the meter runs on a blocking thread
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let mut capture = AudioCapture::new()?;
        capture.start()?;
        println!("Sample rate: {} Hz", capture.sample_rate());
        println!("---");

        for i in 0..duration {
            std::thread::sleep(Duration::from_secs(1));

            let samples = capture.peek_buffer();
            let energy = calculate_rms(&samples);
            let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let meter_len = (energy * 100.0).min(50.0) as usize;
            let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

            println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
            capture.clear_buffer();
        }

        capture.stop();
        Ok(())
    })
    .await??;

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: arecord -l (to list devices)");
    println!("  3. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {sample_rate} Hz...", samples.len());
    tokio::task::spawn_blocking(move || -> john::Result<()> {
        AudioPlayback::new()?.play(samples, sample_rate)
    })
    .await??;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl list sinks short");
    println!("  2. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Test TTS output via ElevenLabs
async fn test_tts(dir: &std::path::Path, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = ConfigLoader::new(dir).load()?;
    let key = config
        .eleven_api_key
        .clone()
        .ok_or_else(|| anyhow::anyhow!("ELEVEN_API_KEY is not configured"))?;

    let speech = ElevenLabsSpeech::new(key, config.voice.voice_id.clone(), config.voice.tts_model.clone())?;

    println!("Synthesizing and playing speech...");
    speech.speak(text).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
