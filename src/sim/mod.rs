//! Distributed entity-simulation core
//!
//! Every peer runs this same simulation locally: its own aircraft plus every
//! entity it has been told about over the relay. There is no authoritative
//! server; peers reconcile each other's state through the rules in `net::sync`.

pub mod aircraft;
pub mod ballistic;
pub mod clock;
pub mod entity;
pub mod missile;
pub mod registry;
pub mod sensor;
pub mod world;

pub use clock::Clock;
pub use entity::{Entity, KindState};
pub use registry::Registry;
pub use sensor::{IrSensor, SensorView, TargetView};
pub use world::World;

use serde::{Deserialize, Serialize};

/// Simulation entity kinds, also the `type` discriminator on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Airplane,
    Bullet,
    Missile,
    Flare,
    Debris,
}

/// Per-frame control sample from the input source.
///
/// Analog values, when present, override the discrete booleans for angle of
/// attack and bank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Controls {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub gun: bool,
    pub missile: bool,
    pub flare: bool,

    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub thrust: Option<f64>,
}

/// Infrared seeker gains.
///
/// These were tuned empirically and drifted across revisions of the original
/// game, so they are configuration rather than constants.
#[derive(Debug, Clone, Copy)]
pub struct SeekerTuning {
    /// Sensor cone half-angle, radians
    pub sensor_cone: f64,
    /// Gimbal limit of the sensor head, radians off boresight
    pub max_bearing: f64,
    /// First-order head slew gain; high values can cause instability
    pub head_rate_multiplier: f64,
    /// Scale from head slew rate to commanded turn rate
    pub command_multiplier: f64,
    /// Commanded turn rate clamp, rad/s
    pub maximum_omega: f64,
}

impl Default for SeekerTuning {
    fn default() -> Self {
        Self {
            sensor_cone: 5.0_f64.to_radians(),
            max_bearing: 1.0,
            head_rate_multiplier: 0.25,
            command_multiplier: 1.0,
            maximum_omega: 1.0,
        }
    }
}
