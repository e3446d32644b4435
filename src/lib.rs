pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod providers;
pub mod session;

pub use config::Settings;
pub use connection::{
    ClosedNotifier, ConnectionFactory, IceServer, LocalConnection, LocalConnectionFactory,
    PeerConnection, SdpAnswer,
};
pub use error::{SessionError, SessionResult};
pub use http::{create_router, AppState};
pub use pipeline::{DictationPipeline, Event, FrameLogger, Pipeline};
pub use providers::{LlmProvider, ProviderCatalog, SttProvider};
pub use session::{Offer, SessionManager, ShutdownReport, TaskSupervisor};
