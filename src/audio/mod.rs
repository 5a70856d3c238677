pub mod resample;
pub mod segmenter;
pub mod vad;

pub use resample::{downmix, resample, stereo48_to_mono16};
pub use segmenter::{Segmenter, SegmenterConfig, VoiceSegment};
pub use vad::{rms_dbfs, FrameClass, FrameClassifier, VadGate, VadMode};
