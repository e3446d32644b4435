use super::event::{Event, EventKind};
use futures::stream::{Stream, StreamExt};
use std::collections::HashMap;
use tracing::{debug, info};

/// Audio frames logged unconditionally at the start of a stream
pub const AUDIO_LOG_HEAD: u64 = 3;

/// After the head, log every Nth audio frame
pub const AUDIO_LOG_EVERY: u64 = 500;

/// How an event kind is treated by [`FrameLogger`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogClass {
    /// State transitions and results
    Always,
    /// High-frequency payloads, logged for the first few and then every Nth
    RateLimited,
    /// Keep-alive and metrics noise
    Never,
    /// Everything else, at debug level
    Debug,
}

impl LogClass {
    pub fn of(kind: EventKind) -> Self {
        match kind {
            EventKind::UserStartedSpeaking
            | EventKind::UserStoppedSpeaking
            | EventKind::Transcription
            | EventKind::OutboundMessage => LogClass::Always,
            EventKind::InputAudio => LogClass::RateLimited,
            EventKind::UserSpeaking | EventKind::Metrics => LogClass::Never,
            EventKind::Other => LogClass::Debug,
        }
    }
}

/// Observational stage that logs significant events on a session's stream.
///
/// The logger only reads events. Counters for rate-limited kinds live in the
/// instance, so each stream gets its own logger.
#[derive(Debug)]
pub struct FrameLogger {
    name: String,
    head: u64,
    every: u64,
    counters: HashMap<EventKind, u64>,
}

impl FrameLogger {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_rate_limit(name, AUDIO_LOG_HEAD, AUDIO_LOG_EVERY)
    }

    pub fn with_rate_limit(name: impl Into<String>, head: u64, every: u64) -> Self {
        Self {
            name: name.into(),
            head,
            every: every.max(1),
            counters: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Occurrences of `kind` seen so far (rate-limited kinds only)
    pub fn count(&self, kind: EventKind) -> u64 {
        self.counters.get(&kind).copied().unwrap_or(0)
    }

    /// Inspect one event. Returns whether a log line was emitted at info level.
    pub fn observe(&mut self, event: &Event) -> bool {
        match LogClass::of(event.kind()) {
            LogClass::Always => {
                self.log_significant(event);
                true
            }
            LogClass::RateLimited => {
                let count = self.counters.entry(event.kind()).or_insert(0);
                *count += 1;
                let n = *count;

                if n <= self.head || n % self.every == 0 {
                    self.log_sampled(event, n);
                    true
                } else {
                    false
                }
            }
            LogClass::Never => false,
            LogClass::Debug => {
                debug!("[{}] Frame: {}", self.name, event.name());
                false
            }
        }
    }

    fn log_significant(&self, event: &Event) {
        match event {
            Event::UserStartedSpeaking => info!("[{}] Speech started", self.name),
            Event::UserStoppedSpeaking => info!("[{}] Speech stopped", self.name),
            Event::Transcription(t) => info!("[{}] TRANSCRIPTION: '{}'", self.name, t.text),
            Event::OutboundMessage(message) => {
                let text = message
                    .get("data")
                    .and_then(|data| data.get("text"))
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("");
                info!("[{}] Sending to client: '{}'", self.name, text);
            }
            other => info!("[{}] {}", self.name, other.name()),
        }
    }

    fn log_sampled(&self, event: &Event, n: u64) {
        if let Event::InputAudio(frame) = event {
            info!(
                "[{}] Audio frame #{}: {} bytes, {}Hz, {}ch",
                self.name,
                n,
                frame.byte_len(),
                frame.sample_rate,
                frame.channels
            );
        } else {
            info!("[{}] {} #{}", self.name, event.name(), n);
        }
    }
}

/// Wrap `stream` so every event passes through `logger` unchanged
pub fn logged<S>(stream: S, mut logger: FrameLogger) -> impl Stream<Item = Event>
where
    S: Stream<Item = Event>,
{
    stream.inspect(move |event| {
        logger.observe(event);
    })
}
