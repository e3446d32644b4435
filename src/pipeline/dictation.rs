use super::logger::{logged, FrameLogger};
use crate::connection::PeerConnection;
use crate::providers::ProviderCatalog;
use anyhow::{bail, Result};
use futures::StreamExt;
use std::sync::Arc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Unit of work run in the background for each new session.
///
/// Implementations must watch `cancel` at every wait so shutdown can bound
/// how long they take to finish.
#[async_trait::async_trait]
pub trait Pipeline: Send + Sync {
    async fn run(&self, connection: Arc<dyn PeerConnection>, cancel: CancellationToken)
        -> Result<()>;
}

/// Default pipeline: drains the client's audio stream through the frame
/// logger until the client disconnects or the session is cancelled.
pub struct DictationPipeline {
    catalog: Arc<ProviderCatalog>,
}

impl DictationPipeline {
    pub fn new(catalog: Arc<ProviderCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait::async_trait]
impl Pipeline for DictationPipeline {
    async fn run(
        &self,
        connection: Arc<dyn PeerConnection>,
        cancel: CancellationToken,
    ) -> Result<()> {
        let session_id = connection
            .answer()
            .map(|answer| answer.session_id)
            .unwrap_or_default();

        info!("Starting pipeline for session {}", session_id);

        if let Some(stt) = self.catalog.default_stt {
            info!("Default STT provider: {}", stt);
        }
        if let Some(llm) = self.catalog.default_llm {
            info!("Default LLM provider: {}", llm);
        }

        let Some(events) = connection.take_events() else {
            bail!("Event stream for session {} was already taken", session_id);
        };

        // One logger per stage; audio input is the only stage run in-process
        let events = logged(ReceiverStream::new(events), FrameLogger::new("input"));
        tokio::pin!(events);

        let mut processed: u64 = 0;
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Pipeline for session {} cancelled", session_id);
                    break;
                }
                event = events.next() => match event {
                    Some(_) => processed += 1,
                    None => {
                        info!("Client disconnected: {}", session_id);
                        break;
                    }
                },
            }
        }

        info!(
            "Pipeline for session {} finished after {} events",
            session_id, processed
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderCredentials, ProvidersConfig};
    use crate::connection::{ClosedNotifier, LocalConnection};
    use crate::pipeline::{AudioFrame, Event};
    use tokio::sync::mpsc;
    use std::time::Duration;

    fn catalog() -> Arc<ProviderCatalog> {
        let creds = ProviderCredentials {
            api_key: Some("key".to_string()),
            base_url: None,
        };
        let mut config = ProvidersConfig::default();
        config.stt.insert("deepgram".to_string(), creds.clone());
        config.llm.insert("openai".to_string(), creds);
        Arc::new(ProviderCatalog::from_config(&config).unwrap())
    }

    async fn local_connection() -> Arc<LocalConnection> {
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = Arc::new(LocalConnection::new(Vec::new(), ClosedNotifier::new(tx)));
        conn.initialize("v=0\r\n", "offer").await.unwrap();
        conn
    }

    #[tokio::test]
    async fn test_pipeline_ends_when_stream_closes() {
        let conn = local_connection().await;
        let injector = conn.injector().unwrap();
        let pipeline = DictationPipeline::new(catalog());

        let handle = {
            let conn: Arc<dyn PeerConnection> = conn.clone();
            tokio::spawn(async move { pipeline.run(conn, CancellationToken::new()).await })
        };

        injector
            .send(Event::InputAudio(AudioFrame {
                samples: vec![0; 160],
                sample_rate: 16000,
                channels: 1,
                timestamp_ms: 0,
            }))
            .await
            .unwrap();
        drop(injector);
        conn.disconnect().await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_pipeline_honors_cancellation() {
        let conn = local_connection().await;
        let pipeline = DictationPipeline::new(catalog());
        let cancel = CancellationToken::new();

        let handle = {
            let cancel = cancel.clone();
            let conn: Arc<dyn PeerConnection> = conn.clone();
            tokio::spawn(async move { pipeline.run(conn, cancel).await })
        };

        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_second_run_fails_without_stream() {
        let conn: Arc<dyn PeerConnection> = local_connection().await;
        let _events = conn.take_events();
        let pipeline = DictationPipeline::new(catalog());

        assert!(pipeline.run(conn, CancellationToken::new()).await.is_err());
    }
}
