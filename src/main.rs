use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use voicelog::audio::FrameClassifier;
use voicelog::{Config, NoopResolver, SessionHandle};

#[derive(Parser, Debug)]
#[command(name = "voicelog", version, about = "Voice-channel transcription pipeline")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Streams a WAV capture through the pipeline as a live participant,
    /// then prints the resulting transcript.
    Run(RunArgs),
    /// Renders an existing session log as a plain transcript, ordered by
    /// capture time.
    Render {
        /// Path to a log.jsonl file
        #[arg(long)]
        log: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// TOML configuration file (defaults apply if absent)
    #[arg(long, default_value = "voicelog.toml")]
    config: String,

    /// Session name; owns data/<name>/log.jsonl
    #[arg(long)]
    session: String,

    /// Input WAV file (48 kHz, 16-bit) standing in for the capture source
    #[arg(long)]
    input: PathBuf,

    /// Participant id to attribute the audio to
    #[arg(long, default_value = "participant-0")]
    participant: String,

    /// Override the inference worker URL
    #[arg(long)]
    url: Option<String>,

    /// Seconds to wait for late transcriptions before closing the log
    #[arg(long, default_value_t = 5)]
    drain_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    match Cli::parse().command {
        CliCommand::Run(args) => run(args).await,
        CliCommand::Render { log } => render(&log),
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let mut config = if Path::new(&args.config).exists() {
        Config::load(&args.config).context("failed to load configuration")?
    } else {
        Config::default()
    };
    if let Some(url) = args.url {
        config.worker.url = url;
    }

    info!(
        session = %args.session,
        input = %args.input.display(),
        worker = %config.worker.url,
        "starting voicelog session"
    );

    let gate_config = config.clone();
    let session = SessionHandle::start(
        &args.session,
        &config,
        Arc::new(NoopResolver),
        Arc::new(move || Box::new(gate_config.vad_gate()) as Box<dyn FrameClassifier>),
    )?;

    stream_wav(&session, &args.input, &args.participant).await?;
    session.flush_all().await;

    // Give the worker a moment to answer outstanding segments.
    tokio::time::sleep(Duration::from_secs(args.drain_secs)).await;
    if let Some(stats) = session.stats().await {
        info!(
            participants = stats.participants,
            dispatched = stats.segments_dispatched,
            committed = stats.entries_committed,
            worker_errors = stats.worker_errors,
            "session summary"
        );
    }
    session.stop().await?;

    let log_path = config.data_dir.join(&args.session).join("log.jsonl");
    render(&log_path)
}

fn render(log_path: &Path) -> Result<()> {
    let entries = voicelog::read_back(log_path)
        .with_context(|| format!("failed to read {}", log_path.display()))?;
    info!(entries = entries.len(), path = %log_path.display(), "rendering transcript");
    print!("{}", voicelog::render_transcript(&entries));
    Ok(())
}

/// Feeds the WAV file to the session in 100 ms pushes, paced like a live
/// capture so the silence clock behaves realistically.
async fn stream_wav(session: &SessionHandle, path: &Path, participant: &str) -> Result<()> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open WAV input {}", path.display()))?;
    let spec = reader.spec();
    anyhow::ensure!(
        spec.sample_rate == 48_000 && spec.bits_per_sample == 16,
        "input must be 48 kHz 16-bit PCM, got {} Hz {}-bit",
        spec.sample_rate,
        spec.bits_per_sample
    );

    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<std::result::Result<_, _>>()
        .context("failed to decode WAV samples")?;

    // Normalize to interleaved stereo for the capture boundary.
    let stereo: Vec<i16> = match spec.channels {
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        2 => samples,
        n => anyhow::bail!("input must be mono or stereo, got {n} channels"),
    };

    let push_frames = 4800; // 100 ms at 48 kHz
    for chunk in stereo.chunks(push_frames * 2) {
        let mut bytes = Vec::with_capacity(chunk.len() * 2);
        for s in chunk {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        session.ingest_stereo48(participant, bytes).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Ok(())
}
