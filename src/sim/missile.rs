//! Missile dynamics and seeker-driven guidance

use rand::Rng;
use uuid::Uuid;

use crate::sim::entity::{Entity, KindState};
use crate::sim::sensor::{SensorView, TargetView};
use crate::sim::{IrSensor, SeekerTuning};

/// Missile motor and airframe constants
#[derive(Debug, Clone, Copy)]
pub struct MissileTuning {
    pub max_thrust: f64,
    pub drag_coefficient: f64,
    /// Fuel burned per second while the motor runs
    pub burn_rate: f64,
    pub fuel_capacity: f64,
    /// Below this speed a burned-out missile expires
    pub min_speed: f64,
    /// Hard lifetime cap, seconds
    pub max_lifetime: f64,
    /// Seconds after launch before the warhead arms
    pub arming_delay: f64,
    /// Proximity-fuse radius
    pub hit_radius: f64,
    pub damage: f64,
}

impl Default for MissileTuning {
    fn default() -> Self {
        Self {
            max_thrust: 1000.0,
            drag_coefficient: 0.25e-2,
            burn_rate: 100.0,
            fuel_capacity: 100.0,
            min_speed: 100.0,
            max_lifetime: 20.0,
            arming_delay: 0.5,
            hit_radius: 10.0,
            damage: 50.0,
        }
    }
}

/// Mutable missile state beyond the shared kinematics
#[derive(Debug, Clone)]
pub struct MissileState {
    /// Remaining motor burn
    pub fuel: f64,
    /// Seconds since launch
    pub age: f64,
    /// Turn-rate command from the seeker, rad/s
    pub commanded_omega: f64,
    pub sensor: IrSensor,
    pub tuning: MissileTuning,
}

impl MissileState {
    pub fn new(seeker: SeekerTuning) -> Self {
        let tuning = MissileTuning::default();
        Self {
            fuel: tuning.fuel_capacity,
            age: 0.0,
            commanded_omega: 0.0,
            sensor: IrSensor::new(seeker),
            tuning,
        }
    }

    pub fn pre_step(&mut self, dt: f64) {
        self.fuel -= self.tuning.burn_rate * dt;
        self.age += dt;
    }

    /// Motor thrust while fuel remains
    pub fn thrust(&self) -> f64 {
        if self.fuel > 0.0 {
            self.tuning.max_thrust
        } else {
            0.0
        }
    }

    pub fn drag(&self, v: f64) -> f64 {
        self.tuning.drag_coefficient * v * v
    }

    /// The commanded turn rate fed back through the shared integrator, which
    /// divides lift by v/200 again, so omega comes out as commanded.
    pub fn lift(&self, v: f64) -> f64 {
        self.commanded_omega * (v / 200.0)
    }

    pub fn armed(&self) -> bool {
        self.age >= self.tuning.arming_delay
    }

    pub fn expired(&self, v: f64) -> bool {
        self.age > self.tuning.max_lifetime || (self.fuel <= 0.0 && v < self.tuning.min_speed)
    }
}

/// One guidance step: re-arbitrate the lock, slew the head, and derive the
/// turn-rate command from the head's angular rate (a proportional-navigation
/// approximation), clamped to the maximum commanded rate.
pub fn guide<R: Rng>(entity: &mut Entity, targets: &[TargetView], dt: f64, rng: &mut R) {
    let id = entity.id;
    let (x, y, track) = (entity.x, entity.y, entity.track);

    let KindState::Missile(missile) = &mut entity.kind else {
        return;
    };

    let view = SensorView {
        x,
        y,
        track,
        head_bearing: missile.sensor.head_bearing,
        cone: missile.sensor.tuning.sensor_cone,
    };

    if let Some(target) = missile.sensor.acquire(&view, targets, id, rng) {
        let command = missile.sensor.slew_to(&view, target.x, target.y, dt);
        let tuning = missile.sensor.tuning;
        missile.commanded_omega = (command * tuning.command_multiplier)
            .clamp(-tuning.maximum_omega, tuning.maximum_omega);
    }
    // Unlocked: hold the last command; tone decay is handled by the sensor.
}
