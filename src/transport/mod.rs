pub mod client;
pub mod messages;

pub use client::{WorkerClient, WorkerEvent, RECONNECT_DELAY};
pub use messages::{
    AudioSegmentMsg, Inbound, Outbound, PcmFormat, TranscriptionMsg, WorkerErrorMsg,
    PROTOCOL_VERSION,
};
