//! Session lifecycle
//!
//! This module provides the per-session machinery:
//! - Append-only JSON-lines log with crash-tolerant read-back
//! - Rolling prompt context fed by transcriptions and text messages
//! - Best-effort display-name resolution with a read-mostly cache
//! - The coordinator actor that binds capture, segmentation, the worker
//!   transport, and the log together

pub mod coordinator;
pub mod log;
pub mod names;
pub mod prompt;
pub mod stats;

pub use coordinator::{now_epoch, ClassifierFactory, SessionHandle};
pub use log::{read_back, render_transcript, LogEntry, Origin, SessionLog};
pub use names::{NameCache, NameResolver, NoopResolver};
pub use prompt::PromptContext;
pub use stats::SessionStats;
