use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::audio::segmenter::SegmenterConfig;
use crate::audio::vad::{VadGate, VadMode};

/// Root configuration structure. Every field has a sensible default, so
/// a partial (or absent) file works.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Base directory for per-session data (`<data_dir>/<session>/log.jsonl`).
    pub data_dir: PathBuf,
    pub vad: VadSettings,
    pub segmenter: SegmenterSettings,
    pub worker: WorkerSettings,
    pub asr: AsrSettings,
}

/// Voice activity gate tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VadSettings {
    /// Energy prefilter threshold in dBFS; frames below it never reach
    /// the second stage.
    pub db_threshold: f32,
    /// VAD frame length in milliseconds (10, 20 or 30).
    pub frame_ms: u32,
    pub mode: VadMode,
}

/// Utterance boundary tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmenterSettings {
    pub silence_gap_ms: u32,
    pub min_segment_ms: u32,
    pub max_segment_ms: u32,
}

/// Inference worker endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerSettings {
    pub url: String,
}

/// Recognizer prompt settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AsrSettings {
    /// Static prompt prepended to the rolling context window.
    pub prompt: String,
    /// Word capacity of the rolling context window.
    pub context_words: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            vad: VadSettings::default(),
            segmenter: SegmenterSettings::default(),
            worker: WorkerSettings::default(),
            asr: AsrSettings::default(),
        }
    }
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            db_threshold: -45.0,
            frame_ms: 30,
            mode: VadMode::Aggressive,
        }
    }
}

impl Default for SegmenterSettings {
    fn default() -> Self {
        Self {
            silence_gap_ms: 1250,
            min_segment_ms: 200,
            max_segment_ms: 30_000,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8765".to_string(),
        }
    }
}

impl Default for AsrSettings {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            context_words: 40,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Segmenter tuning derived from the VAD and segmenter sections.
    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            frame_ms: self.vad.frame_ms,
            silence_gap_ms: self.segmenter.silence_gap_ms,
            min_segment_ms: self.segmenter.min_segment_ms,
            max_segment_ms: self.segmenter.max_segment_ms,
        }
    }

    /// A fresh two-stage gate configured from the VAD section.
    pub fn vad_gate(&self) -> VadGate {
        VadGate::new(self.vad.mode, self.vad.frame_ms, self.vad.db_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_expected_tuning() {
        let config = Config::default();
        assert_eq!(config.vad.db_threshold, -45.0);
        assert_eq!(config.vad.frame_ms, 30);
        assert_eq!(config.vad.mode, VadMode::Aggressive);
        assert_eq!(config.segmenter.silence_gap_ms, 1250);
        assert_eq!(config.segmenter.min_segment_ms, 200);
        assert_eq!(config.segmenter.max_segment_ms, 30_000);
        assert_eq!(config.asr.context_words, 40);
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let toml_content = r#"
            [worker]
            url = "ws://asr.internal:9000"

            [vad]
            mode = "very_aggressive"
        "#;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voicelog.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.worker.url, "ws://asr.internal:9000");
        assert_eq!(config.vad.mode, VadMode::VeryAggressive);
        // Untouched sections keep their defaults
        assert_eq!(config.segmenter.silence_gap_ms, 1250);
        assert_eq!(config.asr.context_words, 40);
    }

    #[test]
    fn test_segmenter_config_combines_sections() {
        let mut config = Config::default();
        config.vad.frame_ms = 20;
        config.segmenter.silence_gap_ms = 900;
        let seg = config.segmenter_config();
        assert_eq!(seg.frame_ms, 20);
        assert_eq!(seg.silence_gap_ms, 900);
    }
}
