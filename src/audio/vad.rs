//! Two-stage voice activity gate.
//!
//! Stage one is a cheap RMS energy check in dBFS that rejects obviously
//! quiet frames without touching the classifier. Stage two is a
//! WebRTC-style VAD in aggressive mode. A frame counts as active only if
//! it passes both.

use earshot::{VoiceActivityDetector, VoiceActivityProfile};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VoicelogError};

/// Sample rate the gate operates at.
pub const VAD_SAMPLE_RATE: u32 = 16_000;

/// Classification of a single fixed-length frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameClass {
    Active,
    Inactive,
}

/// Frame classification capability consumed by the segmenter.
///
/// The default implementation is the two-stage gate below; tests inject
/// deterministic stand-ins.
pub trait FrameClassifier: Send {
    fn classify(&mut self, frame: &[i16]) -> Result<FrameClass>;
}

/// WebRTC VAD operating point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VadMode {
    Normal,
    LowBitrate,
    Aggressive,
    VeryAggressive,
}

impl VadMode {
    fn profile(self) -> VoiceActivityProfile {
        match self {
            VadMode::Normal => VoiceActivityProfile::QUALITY,
            VadMode::LowBitrate => VoiceActivityProfile::LBR,
            VadMode::Aggressive => VoiceActivityProfile::AGGRESSIVE,
            VadMode::VeryAggressive => VoiceActivityProfile::VERY_AGGRESSIVE,
        }
    }
}

/// RMS level of a frame in dBFS, floored at -180 dB.
pub fn rms_dbfs(frame: &[i16]) -> f32 {
    if frame.is_empty() {
        return -180.0;
    }
    let mean_sq: f64 = frame
        .iter()
        .map(|&s| {
            let x = s as f64 / 32768.0;
            x * x
        })
        .sum::<f64>()
        / frame.len() as f64;
    let rms = mean_sq.sqrt().max(1e-9);
    (20.0 * rms.log10()) as f32
}

/// The default two-stage gate. One instance per participant: the WebRTC
/// VAD carries adaptive state across frames.
pub struct VadGate {
    detector: VoiceActivityDetector,
    frame_samples: usize,
    db_threshold: f32,
}

impl VadGate {
    pub fn new(mode: VadMode, frame_ms: u32, db_threshold: f32) -> Self {
        Self {
            detector: VoiceActivityDetector::new(mode.profile()),
            frame_samples: (VAD_SAMPLE_RATE * frame_ms / 1000) as usize,
            db_threshold,
        }
    }
}

impl FrameClassifier for VadGate {
    fn classify(&mut self, frame: &[i16]) -> Result<FrameClass> {
        if frame.len() != self.frame_samples {
            return Err(VoicelogError::InvalidFrame {
                message: format!(
                    "expected {} samples per VAD frame, got {}",
                    self.frame_samples,
                    frame.len()
                ),
            });
        }
        if rms_dbfs(frame) < self.db_threshold {
            return Ok(FrameClass::Inactive);
        }
        match self.detector.predict_16khz(frame) {
            Ok(true) => Ok(FrameClass::Active),
            Ok(false) => Ok(FrameClass::Inactive),
            Err(_) => Err(VoicelogError::InvalidFrame {
                message: format!("VAD rejected frame of {} samples", frame.len()),
            }),
        }
    }
}
