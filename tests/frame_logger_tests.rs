// Tests for the frame logging stage
//
// Whatever the logger decides to log, the stream coming out must be the
// stream that went in.

use futures::stream::{self, StreamExt};
use serde_json::json;
use tambourine_server::pipeline::{
    logged, AudioFrame, Event, EventKind, FrameLogger, MetricsData, Transcription,
};

fn audio(timestamp_ms: u64) -> Event {
    Event::InputAudio(AudioFrame {
        samples: vec![timestamp_ms as i16; 160],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms,
    })
}

fn mixed_stream() -> Vec<Event> {
    let mut events = Vec::new();
    events.push(Event::UserStartedSpeaking);
    for i in 0..1200 {
        events.push(audio(i * 10));
        if i % 7 == 0 {
            events.push(Event::UserSpeaking);
        }
        if i % 100 == 0 {
            events.push(Event::Metrics(MetricsData {
                processor: "stt".to_string(),
                name: "processing_time".to_string(),
                value: i as f64 / 1000.0,
            }));
        }
    }
    events.push(Event::UserStoppedSpeaking);
    events.push(Event::Transcription(Transcription {
        text: "hello world".to_string(),
        confidence: Some(0.93),
        partial: false,
    }));
    events.push(Event::Other("LLMFullResponseStartFrame".to_string()));
    events.push(Event::OutboundMessage(json!({
        "label": "rtvi-ai",
        "type": "server-message",
        "data": {"text": "Hello, world."}
    })));
    events
}

#[tokio::test]
async fn test_stream_passes_through_unchanged() {
    let input = mixed_stream();

    let output: Vec<Event> = logged(stream::iter(input.clone()), FrameLogger::new("input"))
        .collect()
        .await;

    assert_eq!(output, input);
}

#[tokio::test]
async fn test_chained_loggers_pass_through_unchanged() {
    let input = mixed_stream();

    let first = logged(stream::iter(input.clone()), FrameLogger::new("input"));
    let output: Vec<Event> = logged(first, FrameLogger::with_rate_limit("after-stt", 1, 2))
        .collect()
        .await;

    assert_eq!(output, input);
}

#[test]
fn test_audio_sampling_counts_every_frame() {
    let mut logger = FrameLogger::new("input");
    let mut emitted = 0;

    for event in mixed_stream() {
        if matches!(event.kind(), EventKind::InputAudio) && logger.observe(&event) {
            emitted += 1;
        }
    }

    // Frames 1, 2, 3, 500 and 1000
    assert_eq!(emitted, 5);
    assert_eq!(logger.count(EventKind::InputAudio), 1200);
    assert_eq!(logger.count(EventKind::UserSpeaking), 0);
}

#[test]
fn test_new_logger_starts_counting_from_zero() {
    let mut first = FrameLogger::new("input");
    for i in 0..10 {
        first.observe(&audio(i));
    }

    let mut second = FrameLogger::new("input");

    assert!(second.observe(&audio(0)));
    assert_eq!(second.count(EventKind::InputAudio), 1);
    assert_eq!(first.count(EventKind::InputAudio), 10);
}
