//! HTTP API for the dictation client
//!
//! - POST /api/offer - Signaling: create or renegotiate a session
//! - GET /api/sessions - Registered sessions and running tasks
//! - GET /api/providers - Available STT/LLM providers
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::ErrorResponse;
pub use routes::create_router;
pub use state::AppState;
