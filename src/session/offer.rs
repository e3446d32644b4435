use crate::error::{SessionError, SessionResult};
use serde::Deserialize;

/// Signaling request from a client.
///
/// `pc_id` and `restart_pc` are accepted as aliases for older clients.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Offer {
    #[serde(default)]
    pub sdp: Option<String>,

    #[serde(rename = "type", default)]
    pub sdp_type: Option<String>,

    /// Existing session to renegotiate
    #[serde(default, alias = "pc_id")]
    pub session_id: Option<String>,

    /// Request an ICE restart during renegotiation
    #[serde(default, alias = "restart_pc")]
    pub restart: bool,
}

impl Offer {
    pub fn new(sdp: impl Into<String>, sdp_type: impl Into<String>) -> Self {
        Self {
            sdp: Some(sdp.into()),
            sdp_type: Some(sdp_type.into()),
            ..Self::default()
        }
    }

    pub fn for_session(mut self, session_id: impl Into<String>, restart: bool) -> Self {
        self.session_id = Some(session_id.into());
        self.restart = restart;
        self
    }

    /// Required fields, or `InvalidOffer` if either is missing or blank
    pub fn validate(&self) -> SessionResult<(&str, &str)> {
        let sdp = self
            .sdp
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| SessionError::InvalidOffer("missing 'sdp'".to_string()))?;
        let sdp_type = self
            .sdp_type
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| SessionError::InvalidOffer("missing 'type'".to_string()))?;
        Ok((sdp, sdp_type))
    }

    /// Session id to renegotiate, ignoring blank values
    pub fn existing_session(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|id| !id.is_empty())
    }
}
