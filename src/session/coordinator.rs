//! Session coordinator.
//!
//! Owns the wiring: capture pushes come in over a command channel, flow
//! through the resampler and per-participant segmenters, finished
//! segments go out on the worker transport with a prompt snapshot, and
//! worker transcriptions come back to be correlated, name-resolved and
//! committed to the session log. All mutable session state lives on one
//! actor task; nothing here needs a lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::audio::resample;
use crate::audio::segmenter::{Segmenter, SegmenterConfig, VoiceSegment};
use crate::audio::vad::FrameClassifier;
use crate::config::Config;
use crate::error::{Result, VoicelogError};
use crate::session::log::{LogEntry, Origin, SessionLog};
use crate::session::names::{NameCache, NameResolver};
use crate::session::prompt::PromptContext;
use crate::session::stats::SessionStats;
use crate::transport::client::{WorkerClient, WorkerEvent};
use crate::transport::messages::AudioSegmentMsg;

const COMMAND_QUEUE_DEPTH: usize = 256;
const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Builds one VAD classifier per participant (the classifier carries
/// adaptive state and cannot be shared).
pub type ClassifierFactory = Arc<dyn Fn() -> Box<dyn FrameClassifier> + Send + Sync>;

/// Wall-clock epoch seconds.
pub fn now_epoch() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

enum Command {
    IngestStereo48 {
        participant_id: String,
        bytes: Vec<u8>,
    },
    FlushAll,
    LogText {
        user_id: String,
        display_name: String,
        created_ts: f64,
        text: String,
    },
    Stats {
        reply: oneshot::Sender<SessionStats>,
    },
    Stop {
        ack: oneshot::Sender<()>,
    },
}

/// Handle to a running session. The capture and text listeners share it
/// by reference; `stop` consumes it.
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<Result<()>>,
}

impl SessionHandle {
    /// Opens the session log, starts the worker transport, and spawns the
    /// coordinator actor.
    pub fn start(
        session_name: &str,
        config: &Config,
        resolver: Arc<dyn NameResolver>,
        classifiers: ClassifierFactory,
    ) -> Result<SessionHandle> {
        let log = SessionLog::open(&config.data_dir, session_name)?;
        let (client, events) = WorkerClient::connect(config.worker.url.clone());
        let (commands, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);

        info!(session = session_name, worker = %config.worker.url, "session started");

        let inner = SessionInner {
            session_name: session_name.to_string(),
            started_at: chrono::Utc::now(),
            log,
            client,
            segmenters: HashMap::new(),
            segmenter_config: config.segmenter_config(),
            classifiers,
            prompt: PromptContext::new(config.asr.prompt.clone(), config.asr.context_words),
            names: NameCache::new(),
            resolver,
            segments_dispatched: 0,
            entries_committed: 0,
            worker_errors: 0,
        };
        let task = tokio::spawn(inner.run(command_rx, events));

        Ok(SessionHandle { commands, task })
    }

    /// Pushes interleaved stereo 16-bit LE samples at 48 kHz for one
    /// participant.
    pub async fn ingest_stereo48(&self, participant_id: &str, bytes: Vec<u8>) {
        self.send(Command::IngestStereo48 {
            participant_id: participant_id.to_string(),
            bytes,
        })
        .await;
    }

    /// Idempotent "stopped speaking" signal from the platform; flushes
    /// every participant's segmenter.
    pub async fn flush_all(&self) {
        self.send(Command::FlushAll).await;
    }

    /// Records a text message into the session log and prompt context.
    pub async fn log_text(&self, user_id: &str, display_name: &str, created_ts: f64, text: &str) {
        self.send(Command::LogText {
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            created_ts,
            text: text.to_string(),
        })
        .await;
    }

    /// Current session statistics, or `None` if the session has ended.
    pub async fn stats(&self) -> Option<SessionStats> {
        let (reply, replied) = oneshot::channel();
        self.send(Command::Stats { reply }).await;
        replied.await.ok()
    }

    /// Stops the session: closes the transport (dropping in-flight
    /// sends), flushes the log, and surfaces any fatal error the actor
    /// hit.
    pub async fn stop(self) -> Result<()> {
        let (ack, acked) = oneshot::channel();
        let _ = self.commands.send(Command::Stop { ack }).await;
        let _ = acked.await;
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "session task aborted");
                Ok(())
            }
        }
    }

    async fn send(&self, command: Command) {
        if self.commands.send(command).await.is_err() {
            warn!("session is no longer running; command dropped");
        }
    }
}

struct SessionInner {
    session_name: String,
    started_at: chrono::DateTime<chrono::Utc>,
    log: SessionLog,
    client: WorkerClient,
    segmenters: HashMap<String, Segmenter>,
    segmenter_config: SegmenterConfig,
    classifiers: ClassifierFactory,
    prompt: PromptContext,
    names: NameCache,
    resolver: Arc<dyn NameResolver>,
    segments_dispatched: u64,
    entries_committed: u64,
    worker_errors: u64,
}

impl SessionInner {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut events: mpsc::Receiver<WorkerEvent>,
    ) -> Result<()> {
        let mut flush_tick = tokio::time::interval(FLUSH_INTERVAL);
        flush_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events_open = true;

        let ack = loop {
            let step: Result<()> = tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::IngestStereo48 { participant_id, bytes }) => {
                        self.ingest(participant_id, &bytes)
                    }
                    Some(Command::FlushAll) => self.flush_all(),
                    Some(Command::LogText { user_id, display_name, created_ts, text }) => {
                        self.log_text(user_id, display_name, created_ts, &text)
                    }
                    Some(Command::Stats { reply }) => {
                        let _ = reply.send(self.stats());
                        Ok(())
                    }
                    Some(Command::Stop { ack }) => break Some(ack),
                    None => {
                        warn!(session = %self.session_name, "handle dropped without stop; closing session");
                        break None;
                    }
                },
                event = events.recv(), if events_open => match event {
                    Some(event) => self.on_worker_event(event).await,
                    None => {
                        // Transport task gone; commands may still arrive.
                        events_open = false;
                        Ok(())
                    }
                },
                _ = flush_tick.tick() => self.flush_all(),
            };
            if let Err(e) = step {
                // Fatal by policy: configuration errors and log-write
                // failures abort the session.
                let Self { client, log, .. } = self;
                client.stop().await;
                let _ = log.close();
                return Err(e);
            }
        };

        // Orderly shutdown: transport first (drops in-flight sends, late
        // transcriptions are discarded), then the log.
        let Self { client, log, .. } = self;
        client.stop().await;
        log.close()?;
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
        info!("session stopped");
        Ok(())
    }

    /// C1 + C3: normalize the capture push and run a flush pass for that
    /// participant. Also warms the display-name cache.
    fn ingest(&mut self, participant_id: String, bytes: &[u8]) -> Result<()> {
        let mono16k = resample::stereo48_to_mono16(bytes)?;
        self.names
            .prefetch(self.resolver.clone(), participant_id.clone());

        let config = self.segmenter_config.clone();
        let factory = Arc::clone(&self.classifiers);
        let segmenter = self
            .segmenters
            .entry(participant_id)
            .or_insert_with_key(|id| {
                debug!(id = %id, "new participant");
                Segmenter::new(id.clone(), config, factory())
            });
        segmenter.push(&mono16k);
        let finished = segmenter.flush(now_epoch())?;
        self.dispatch(finished);
        Ok(())
    }

    fn flush_all(&mut self) -> Result<()> {
        let now = now_epoch();
        let mut finished = Vec::new();
        for segmenter in self.segmenters.values_mut() {
            finished.extend(segmenter.flush(now)?);
        }
        self.dispatch(finished);
        Ok(())
    }

    /// Stamps the current prompt window on each segment and enqueues it
    /// on the transport.
    fn dispatch(&mut self, segments: Vec<VoiceSegment>) {
        for mut segment in segments {
            segment.prompt = self.prompt.snapshot();
            debug!(
                id = %segment.participant_id,
                index = segment.index,
                duration_ms = segment.duration_ms,
                "segment dispatched"
            );
            self.segments_dispatched += 1;
            self.client.send_segment(AudioSegmentMsg::from_segment(&segment));
        }
    }

    fn stats(&self) -> SessionStats {
        let now = chrono::Utc::now();
        SessionStats {
            session_name: self.session_name.clone(),
            started_at: self.started_at,
            duration_secs: now.signed_duration_since(self.started_at).num_milliseconds() as f64
                / 1000.0,
            participants: self.segmenters.len(),
            segments_dispatched: self.segments_dispatched,
            entries_committed: self.entries_committed,
            worker_errors: self.worker_errors,
        }
    }

    async fn on_worker_event(&mut self, event: WorkerEvent) -> Result<()> {
        match event {
            WorkerEvent::Transcription(msg) => {
                if msg.text.trim().is_empty() {
                    debug!(id = %msg.id, "empty transcription skipped");
                    return Ok(());
                }
                let display_name = self.names.resolve_or_id(&msg.id).await;
                let entry = LogEntry {
                    user_id: msg.id.clone(),
                    display_name,
                    start_ts: msg.capture_ts,
                    end_ts: msg.end_ts,
                    origin: Origin::Voice,
                    text: msg.text.clone(),
                };
                self.log.append(&entry)?;
                self.entries_committed += 1;
                self.prompt.push_text(&msg.text);
                info!(id = %msg.id, chars = msg.text.len(), "transcription committed");
            }
            WorkerEvent::Error(msg) => {
                // Non-fatal per job: the affected segment simply never
                // produces a log entry.
                self.worker_errors += 1;
                let err = VoicelogError::Worker {
                    code: msg.code,
                    message: msg.message,
                };
                warn!(error = %err, "segment skipped");
            }
        }
        Ok(())
    }

    fn log_text(
        &mut self,
        user_id: String,
        display_name: String,
        created_ts: f64,
        text: &str,
    ) -> Result<()> {
        let entry = LogEntry {
            user_id,
            display_name,
            start_ts: created_ts,
            end_ts: created_ts,
            origin: Origin::Text,
            text: text.to_string(),
        };
        self.log.append(&entry)?;
        self.entries_committed += 1;
        self.prompt.push_text(text);
        Ok(())
    }
}
