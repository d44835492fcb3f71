//! Wire protocol
//!
//! Every message is a JSON object tagged by its `id` field. The relay parses
//! only as far as the tag; peers parse the full payload. Unknown tags
//! deserialize into a catch-all variant and are ignored, so mixed protocol
//! versions degrade instead of disconnecting.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::sim::EntityKind;

/// A protocol message, tagged by `id`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "id", rename_all = "lowercase")]
pub enum Envelope {
    /// Relay to client on accept, confirms the socket is live
    Connection,
    /// Client to relay after connecting, announces identity
    Data { username: String, uuid: Uuid },
    /// Clock-sync ping/pong. The client sends `time` (its transmit time);
    /// the relay echoes it back as `txTime` alongside its own `time`.
    Synchronization {
        time: f64,
        #[serde(rename = "txTime", skip_serializing_if = "Option::is_none")]
        tx_time: Option<f64>,
    },
    Update(UpdateMsg),
    /// An entity left the simulation normally (expiry, impact)
    Remove {
        #[serde(rename = "type")]
        kind: EntityKind,
        uuid: Uuid,
    },
    /// An aircraft was destroyed or its peer disconnected
    Death {
        #[serde(rename = "type")]
        kind: EntityKind,
        uuid: Uuid,
    },
    /// Forward compatibility: unrecognized tags are no-ops
    #[serde(other)]
    Unknown,
}

/// State broadcast for a single entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpdateMsg {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub uuid: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Uuid>,
    /// Shared-clock millis at the sender when the state was sampled
    pub time: f64,
    pub state: StatePatch,
    /// State sequence counter; receivers drop anything not newer
    #[serde(default)]
    pub ssc: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Partial entity state. Absent fields mean "unchanged", so patches merge
/// rather than overwrite.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub v: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle_of_attack: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angle_of_bank: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub throttle_position: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub life: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuel: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_bearing: Option<f64>,
}
