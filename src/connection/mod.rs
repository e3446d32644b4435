//! Connection handles consumed by the session core
//!
//! The media transport and negotiation protocol live behind the
//! `PeerConnection` trait. `LocalConnection` is the in-process default used
//! by the server binary and the tests.

mod local;
mod peer;

pub use local::{LocalConnection, LocalConnectionFactory};
pub use peer::{
    ClosedEvent, ClosedNotifier, ConnectionFactory, IceServer, PeerConnection, SdpAnswer,
};
