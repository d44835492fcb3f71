//! Furball: distributed simulation core and relay for multiplayer arcade air
//! combat.
//!
//! There is no authoritative game server. Every peer runs the full
//! simulation in [`sim`], owns its own aircraft and missiles, and reconciles
//! everyone else's entities through the rules in [`net::sync`]. The relay in
//! [`net::relay`] only forwards traffic and answers clock-synchronization
//! pings.

pub mod config;
pub mod net;
pub mod peer;
pub mod sim;
pub mod util;

pub use config::Config;
pub use net::{Envelope, PeerConnection, RelayState};
pub use peer::Peer;
pub use sim::{Controls, World};
