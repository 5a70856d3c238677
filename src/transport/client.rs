//! WebSocket client for the inference worker.
//!
//! One logical connection per session. On disconnect the client retries
//! with a fixed 3 second backoff for as long as the session is alive;
//! jobs in flight at the moment of a disconnect are lost and never
//! resubmitted. Sends are best-effort: when the outbound queue is full
//! or the transport is down, segments are dropped with a warning and the
//! log simply never sees those indices.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::connect_async;
use tracing::{debug, info, warn};

use crate::error::VoicelogError;
use crate::transport::messages::{AudioSegmentMsg, Inbound, Outbound, TranscriptionMsg, WorkerErrorMsg};

/// Fixed delay between reconnect attempts.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Bound on queued outbound segments. Past this, data loss beats
/// unbounded memory.
const OUTBOUND_QUEUE_DEPTH: usize = 64;
const EVENT_QUEUE_DEPTH: usize = 256;

/// Validated worker message surfaced to the coordinator.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Transcription(TranscriptionMsg),
    Error(WorkerErrorMsg),
}

/// Handle to the connection task. Dropping it without `stop` leaves the
/// task running until its channels close.
pub struct WorkerClient {
    outbound: mpsc::Sender<AudioSegmentMsg>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerClient {
    /// Spawns the connection task. Events (transcriptions and worker
    /// errors) arrive on the returned receiver.
    pub fn connect(url: String) -> (Self, mpsc::Receiver<WorkerEvent>) {
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(run_connection(url, outbound_rx, event_tx, shutdown_rx));
        (
            Self {
                outbound,
                shutdown,
                task,
            },
            event_rx,
        )
    }

    /// Best-effort enqueue of a segment for transcription.
    pub fn send_segment(&self, msg: AudioSegmentMsg) {
        if let Err(err) = self.outbound.try_send(msg) {
            let dropped = match err {
                mpsc::error::TrySendError::Full(m) => m,
                mpsc::error::TrySendError::Closed(m) => m,
            };
            warn!(
                id = %dropped.id,
                index = dropped.index,
                "dropping segment: worker transport unavailable or backlogged"
            );
        }
    }

    /// Closes the connection and waits for the task to exit. Queued and
    /// in-flight sends are dropped.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

/// Why a connected session loop ended.
enum SessionEnd {
    Shutdown,
    Disconnected(String),
    Protocol(String),
}

async fn run_connection(
    url: String,
    mut outbound: mpsc::Receiver<AudioSegmentMsg>,
    events: mpsc::Sender<WorkerEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        let connected = tokio::select! {
            res = connect_async(url.as_str()) => res,
            _ = shutdown.changed() => break,
        };
        let ws = match connected {
            Ok((ws, _)) => ws,
            Err(e) => {
                warn!(%url, error = %e, "worker connection failed; retrying in {}s", RECONNECT_DELAY.as_secs());
                if wait_for_retry(&mut shutdown).await {
                    break;
                }
                continue;
            }
        };
        info!(%url, "connected to inference worker");

        let (mut sink, mut stream) = ws.split();
        let reason = loop {
            tokio::select! {
                _ = shutdown.changed() => break SessionEnd::Shutdown,
                msg = outbound.recv() => {
                    let Some(msg) = msg else { break SessionEnd::Shutdown };
                    let payload = match serde_json::to_string(&Outbound::AudioSegment(msg)) {
                        Ok(p) => p,
                        Err(e) => {
                            warn!(error = %e, "failed to serialize segment; dropping");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(payload)).await {
                        break SessionEnd::Disconnected(e.to_string());
                    }
                }
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<Inbound>(&text) {
                            Ok(Inbound::Transcription(t)) => {
                                debug!(id = %t.id, "transcription received");
                                if events.send(WorkerEvent::Transcription(t)).await.is_err() {
                                    break SessionEnd::Shutdown;
                                }
                            }
                            Ok(Inbound::Error(e)) => {
                                warn!(code = %e.code, message = %e.message, "worker reported an error");
                                if events.send(WorkerEvent::Error(e)).await.is_err() {
                                    break SessionEnd::Shutdown;
                                }
                            }
                            Err(e) => break SessionEnd::Protocol(e.to_string()),
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        break SessionEnd::Protocol("binary frames are not part of the protocol".to_string());
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break SessionEnd::Disconnected("connection closed by worker".to_string());
                    }
                    Some(Ok(_)) => {} // ping/pong handled by the stream
                    Some(Err(e)) => break SessionEnd::Disconnected(e.to_string()),
                }
            }
        };

        match reason {
            SessionEnd::Shutdown => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            SessionEnd::Disconnected(detail) => {
                let err = VoicelogError::TransportDisconnected { message: detail };
                warn!(%url, error = %err, "reconnecting; in-flight jobs are lost");
            }
            SessionEnd::Protocol(detail) => {
                let err = VoicelogError::ProtocolViolation { message: detail };
                warn!(%url, error = %err, "closing connection");
                let _ = sink.send(Message::Close(None)).await;
            }
        }
        if wait_for_retry(&mut shutdown).await {
            break;
        }
    }
    info!("worker transport stopped");
}

/// Sleeps the reconnect delay; returns true if shutdown was requested.
async fn wait_for_retry(shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(RECONNECT_DELAY) => false,
        _ = shutdown.changed() => true,
    }
}
