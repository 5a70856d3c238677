//! Wire protocol between the session and the inference worker.
//!
//! Every message is a single JSON text frame carrying `{v, type, ...}`.
//! Outbound PCM travels base64-encoded; inbound frames are validated
//! against the discriminated `Inbound` type and anything unknown is a
//! protocol violation.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::audio::segmenter::VoiceSegment;

pub const PROTOCOL_VERSION: u8 = 1;

fn default_version() -> u8 {
    PROTOCOL_VERSION
}

/// PCM layout descriptor attached to outbound audio.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PcmFormat {
    pub sr: u32,
    pub channels: u16,
    pub sample_width: u8,
}

impl PcmFormat {
    /// The canonical internal format: mono 16 kHz 16-bit.
    pub fn mono_16k() -> Self {
        Self {
            sr: 16_000,
            channels: 1,
            sample_width: 2,
        }
    }
}

/// Session → worker messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Outbound {
    #[serde(rename = "audio.segment")]
    AudioSegment(AudioSegmentMsg),
}

/// A finalized utterance submitted for transcription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioSegmentMsg {
    #[serde(default = "default_version")]
    pub v: u8,
    /// Participant id; correlation is `(id, index)`.
    pub id: String,
    pub index: u32,
    pub pcm_format: PcmFormat,
    pub started_ts: f64,
    pub capture_ts: f64,
    pub data_b64: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl AudioSegmentMsg {
    pub fn from_segment(segment: &VoiceSegment) -> Self {
        let mut bytes = Vec::with_capacity(segment.pcm.len() * 2);
        for sample in &segment.pcm {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        Self {
            v: PROTOCOL_VERSION,
            id: segment.participant_id.clone(),
            index: segment.index,
            pcm_format: PcmFormat::mono_16k(),
            started_ts: segment.started_ts,
            capture_ts: segment.captured_ts,
            data_b64: base64::engine::general_purpose::STANDARD.encode(&bytes),
            prompt: segment.prompt.clone(),
        }
    }
}

/// Worker → session messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Inbound {
    #[serde(rename = "transcription")]
    Transcription(TranscriptionMsg),
    #[serde(rename = "error")]
    Error(WorkerErrorMsg),
}

/// Text for a previously submitted segment. The worker preserves
/// per-participant FIFO order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptionMsg {
    #[serde(default = "default_version")]
    pub v: u8,
    pub id: String,
    pub text: String,
    pub capture_ts: f64,
    pub end_ts: f64,
}

/// Per-job failure. Non-fatal; the affected segment produces no log
/// entry. Codes observed from the worker include `bad_json`,
/// `bad_request`, `bad_audio_format` and `unknown_type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerErrorMsg {
    #[serde(default = "default_version")]
    pub v: u8,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
