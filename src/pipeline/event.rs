use serde::{Deserialize, Serialize};

/// Raw audio received from the client (16-bit PCM, interleaved)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Milliseconds since the stream started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    pub fn byte_len(&self) -> usize {
        self.samples.len() * std::mem::size_of::<i16>()
    }
}

/// A transcription result from the STT stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,

    /// Confidence score (0.0 to 1.0), if the provider reports one
    #[serde(default)]
    pub confidence: Option<f32>,

    /// Whether this is an interim result
    #[serde(default)]
    pub partial: bool,
}

/// Processing metrics emitted by pipeline stages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsData {
    pub processor: String,
    pub name: String,
    pub value: f64,
}

/// One item flowing through a session's processing stream
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    InputAudio(AudioFrame),
    UserStartedSpeaking,
    UserStoppedSpeaking,
    /// Emitted by VAD roughly every 15ms while the user is talking
    UserSpeaking,
    Transcription(Transcription),
    /// Message sent back to the client over the data channel
    OutboundMessage(serde_json::Value),
    Metrics(MetricsData),
    /// Any other frame, identified by name only
    Other(String),
}

/// Discriminant of [`Event`], used for classification and counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    InputAudio,
    UserStartedSpeaking,
    UserStoppedSpeaking,
    UserSpeaking,
    Transcription,
    OutboundMessage,
    Metrics,
    Other,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::InputAudio(_) => EventKind::InputAudio,
            Event::UserStartedSpeaking => EventKind::UserStartedSpeaking,
            Event::UserStoppedSpeaking => EventKind::UserStoppedSpeaking,
            Event::UserSpeaking => EventKind::UserSpeaking,
            Event::Transcription(_) => EventKind::Transcription,
            Event::OutboundMessage(_) => EventKind::OutboundMessage,
            Event::Metrics(_) => EventKind::Metrics,
            Event::Other(_) => EventKind::Other,
        }
    }

    /// Human-readable name for debug logging
    pub fn name(&self) -> &str {
        match self {
            Event::InputAudio(_) => "InputAudio",
            Event::UserStartedSpeaking => "UserStartedSpeaking",
            Event::UserStoppedSpeaking => "UserStoppedSpeaking",
            Event::UserSpeaking => "UserSpeaking",
            Event::Transcription(_) => "Transcription",
            Event::OutboundMessage(_) => "OutboundMessage",
            Event::Metrics(_) => "Metrics",
            Event::Other(name) => name,
        }
    }
}
