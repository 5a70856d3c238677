pub mod audio;
pub mod config;
pub mod error;
pub mod session;
pub mod transport;

pub use audio::{
    downmix, resample, stereo48_to_mono16, FrameClass, FrameClassifier, Segmenter,
    SegmenterConfig, VadGate, VadMode, VoiceSegment,
};
pub use config::Config;
pub use error::{Result, VoicelogError};
pub use session::{
    now_epoch, read_back, render_transcript, LogEntry, NameCache, NameResolver, NoopResolver,
    Origin, PromptContext, SessionHandle, SessionLog, SessionStats,
};
pub use transport::{AudioSegmentMsg, Inbound, Outbound, PcmFormat, WorkerClient, WorkerEvent};
