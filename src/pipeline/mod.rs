//! Per-session processing pipeline
//!
//! - `Event`: typed items flowing through a session's stream
//! - `FrameLogger`: pass-through stage that logs significant events
//! - `Pipeline`: the unit of work supervised for each new session

mod dictation;
mod event;
mod logger;

pub use dictation::{DictationPipeline, Pipeline};
pub use event::{AudioFrame, Event, EventKind, MetricsData, Transcription};
pub use logger::{logged, FrameLogger, LogClass, AUDIO_LOG_EVERY, AUDIO_LOG_HEAD};
