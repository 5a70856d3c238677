//! Per-participant utterance segmentation.
//!
//! Accumulates mono 16 kHz PCM, classifies it frame-by-frame through the
//! VAD gate, and emits finalized utterance segments when:
//! - a silence gap of `silence_gap_ms` follows active speech, or
//! - the segment reaches `max_segment_ms`.
//!
//! Short silences inside an utterance are buffered and stitched back in
//! when speech resumes, so natural pauses do not split words apart.
//! Segments whose active content is shorter than `min_segment_ms` are
//! dropped at finalization and never consume an index.

use std::time::Instant;

use tracing::{debug, trace};

use crate::audio::vad::{FrameClass, FrameClassifier, VAD_SAMPLE_RATE};
use crate::error::Result;

/// One finalized utterance, ready for the inference transport.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSegment {
    pub participant_id: String,
    /// Per-participant monotone counter, starting at 0.
    pub index: u32,
    /// Wall-clock epoch seconds when the first active frame was seen.
    pub started_ts: f64,
    /// End of active audio: `started_ts` plus the trimmed duration.
    pub captured_ts: f64,
    pub duration_ms: u32,
    /// Mono 16 kHz samples, trailing silence trimmed.
    pub pcm: Vec<i16>,
    /// Contextual hint for the recognizer, stamped by the coordinator.
    pub prompt: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    pub frame_ms: u32,
    pub silence_gap_ms: u32,
    pub min_segment_ms: u32,
    pub max_segment_ms: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            frame_ms: 30,
            silence_gap_ms: 1250,
            min_segment_ms: 200,
            max_segment_ms: 30_000,
        }
    }
}

pub struct Segmenter {
    participant_id: String,
    config: SegmenterConfig,
    classifier: Box<dyn FrameClassifier>,
    frame_samples: usize,

    /// Samples awaiting VAD framing.
    in_queue: Vec<i16>,
    /// Tail samples from the previous pass that did not fill a frame.
    carry: Vec<i16>,

    in_speech: bool,
    /// Samples committed to the current segment (active frames plus any
    /// stitched-back silence).
    frames: Vec<i16>,
    /// Offset just past the last active sample in `frames`; finalization
    /// trims to this point.
    active_len: usize,
    /// Contiguous inactive samples observed during speech, held for
    /// stitch-back if speech resumes before the gap elapses.
    pending_silence: Vec<i16>,
    silence_samples: usize,
    started_ts: f64,
    /// Instant of the most recent active frame, for the wall-clock
    /// silence fallback when a flush pass sees no new audio.
    last_active_at: Option<Instant>,
    next_index: u32,
    in_flush: bool,
}

impl Segmenter {
    pub fn new(
        participant_id: impl Into<String>,
        config: SegmenterConfig,
        classifier: Box<dyn FrameClassifier>,
    ) -> Self {
        let frame_samples = (VAD_SAMPLE_RATE * config.frame_ms / 1000) as usize;
        Self {
            participant_id: participant_id.into(),
            config,
            classifier,
            frame_samples,
            in_queue: Vec::new(),
            carry: Vec::new(),
            in_speech: false,
            frames: Vec::new(),
            active_len: 0,
            pending_silence: Vec::new(),
            silence_samples: 0,
            started_ts: 0.0,
            last_active_at: None,
            next_index: 0,
            in_flush: false,
        }
    }

    pub fn participant_id(&self) -> &str {
        &self.participant_id
    }

    /// Index the next emitted segment will receive.
    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    /// Queues mono 16 kHz samples for the next flush pass.
    pub fn push(&mut self, samples: &[i16]) {
        self.in_queue.extend_from_slice(samples);
    }

    /// Runs one flush pass: frames queued audio through the classifier,
    /// advances the speech state machine, and returns any segments that
    /// finalized. Overlapping flushes coalesce.
    pub fn flush(&mut self, now_epoch: f64) -> Result<Vec<VoiceSegment>> {
        if self.in_flush {
            return Ok(Vec::new());
        }
        self.in_flush = true;
        let result = self.flush_inner(now_epoch);
        self.in_flush = false;
        result
    }

    fn flush_inner(&mut self, now_epoch: f64) -> Result<Vec<VoiceSegment>> {
        let mut emitted = Vec::new();

        let mut work = std::mem::take(&mut self.carry);
        work.append(&mut self.in_queue);

        let mut offset = 0;
        let mut processed = 0usize;
        while work.len() - offset >= self.frame_samples {
            let start = offset;
            offset += self.frame_samples;
            processed += 1;
            let class = self.classifier.classify(&work[start..offset])?;
            self.step(&work[start..offset], class, now_epoch, &mut emitted);
        }
        self.carry = work.split_off(offset);

        // Silence can also elapse with no audio arriving at all (the
        // upstream stops sending once the participant releases the key).
        if self.in_speech && processed == 0 {
            let silent_ms = self
                .last_active_at
                .map(|t| t.elapsed().as_millis() as u64)
                .unwrap_or(0);
            if silent_ms >= self.config.silence_gap_ms as u64 {
                self.finalize(&mut emitted);
            }
        }

        Ok(emitted)
    }

    /// Advances the state machine by one classified frame.
    fn step(
        &mut self,
        frame: &[i16],
        class: FrameClass,
        now_epoch: f64,
        emitted: &mut Vec<VoiceSegment>,
    ) {
        match class {
            FrameClass::Active => {
                if !self.in_speech {
                    self.begin_segment(now_epoch);
                } else if !self.pending_silence.is_empty() {
                    // Speech resumed before the gap elapsed: the buffered
                    // silence belongs inside the utterance.
                    let silence = std::mem::take(&mut self.pending_silence);
                    let frame_samples = self.frame_samples;
                    for chunk in silence.chunks(frame_samples) {
                        if !self.in_speech {
                            break; // length cap hit mid-stitch
                        }
                        self.commit(chunk, false, emitted);
                    }
                    if !self.in_speech {
                        self.begin_segment(now_epoch);
                    }
                }
                self.silence_samples = 0;
                self.last_active_at = Some(Instant::now());
                self.commit(frame, true, emitted);
            }
            FrameClass::Inactive => {
                if self.in_speech {
                    self.pending_silence.extend_from_slice(frame);
                    self.silence_samples += frame.len();
                    let silent_ms =
                        (self.silence_samples as u64 * 1000) / VAD_SAMPLE_RATE as u64;
                    if silent_ms >= self.config.silence_gap_ms as u64 {
                        self.finalize(emitted);
                    }
                } else {
                    trace!(id = %self.participant_id, "dropping idle frame");
                }
            }
        }
    }

    fn begin_segment(&mut self, now_epoch: f64) {
        self.in_speech = true;
        self.started_ts = now_epoch;
        self.pending_silence.clear();
        self.silence_samples = 0;
        debug!(id = %self.participant_id, started_ts = now_epoch, "speech start");
    }

    /// Appends one frame to the current segment and enforces the length
    /// cap. The cap check uses committed length so overshoot is bounded
    /// by a single frame even across a stitch.
    fn commit(&mut self, frame: &[i16], active: bool, emitted: &mut Vec<VoiceSegment>) {
        self.frames.extend_from_slice(frame);
        if active {
            self.active_len = self.frames.len();
        }
        let committed_ms = (self.frames.len() as u64 * 1000) / VAD_SAMPLE_RATE as u64;
        if committed_ms >= self.config.max_segment_ms as u64 {
            debug!(id = %self.participant_id, committed_ms, "length cap reached");
            self.finalize(emitted);
        }
    }

    /// Trims trailing silence, emits the segment if it is long enough,
    /// and resets speech state. `carry` and `next_index` survive.
    fn finalize(&mut self, emitted: &mut Vec<VoiceSegment>) {
        let trimmed_len = self.active_len;
        let duration_ms = ((trimmed_len as u64 * 1000) / VAD_SAMPLE_RATE as u64) as u32;
        if trimmed_len == 0 || duration_ms < self.config.min_segment_ms {
            debug!(
                id = %self.participant_id,
                duration_ms,
                "discarding segment below minimum length"
            );
        } else {
            self.frames.truncate(trimmed_len);
            let pcm = std::mem::take(&mut self.frames);
            let captured_ts = self.started_ts + trimmed_len as f64 / VAD_SAMPLE_RATE as f64;
            let index = self.next_index;
            self.next_index += 1;
            debug!(
                id = %self.participant_id,
                index,
                duration_ms,
                "segment finalized"
            );
            emitted.push(VoiceSegment {
                participant_id: self.participant_id.clone(),
                index,
                started_ts: self.started_ts,
                captured_ts,
                duration_ms,
                pcm,
                prompt: None,
            });
        }

        self.frames.clear();
        self.active_len = 0;
        self.pending_silence.clear();
        self.silence_samples = 0;
        self.in_speech = false;
        self.started_ts = 0.0;
        self.last_active_at = None;
    }
}
