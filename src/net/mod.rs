//! Networking: wire protocol, reconciliation rules, relay server, peer client

pub mod client;
pub mod protocol;
pub mod relay;
pub mod sync;

pub use client::{NetError, PeerConnection};
pub use protocol::{Envelope, StatePatch, UpdateMsg};
pub use relay::RelayState;
