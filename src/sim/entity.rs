//! Concrete simulation entity and the fixed integration step
//!
//! One entity type covers every kind; the kind tag selects the
//! thrust/drag/lift strategy and carries kind-specific state. This replaces
//! the inheritance chain the design grew out of.

use std::collections::VecDeque;

use uuid::Uuid;

use crate::net::protocol::StatePatch;
use crate::sim::aircraft::AircraftState;
use crate::sim::ballistic::{
    BULLET_DRAG, BULLET_MIN_SPEED, BULLET_MUZZLE_SPEED, DEBRIS_DRAG, DEBRIS_MIN_SPEED, FLARE_DRAG,
    FLARE_MIN_SPEED,
};
use crate::sim::missile::MissileState;
use crate::sim::sensor::{SensorView, TargetView};
use crate::sim::{EntityKind, SeekerTuning};
use crate::util::angles::normalize_angle;

/// Most recent positions kept for the trail
pub const TRAIL_CAPACITY: usize = 350;

/// Reference speed for the lift-to-turn-rate conversion
pub const REFERENCE_SPEED: f64 = 200.0;

/// Kind tag plus kind-specific state
#[derive(Debug, Clone)]
pub enum KindState {
    Aircraft(AircraftState),
    Bullet,
    Missile(MissileState),
    Flare,
    Debris,
}

/// A live simulation entity. Owned by the registry from creation to removal.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: Uuid,
    pub x: f64,
    pub y: f64,
    /// Heading, radians in (-PI, PI]
    pub track: f64,
    /// Scalar speed
    pub v: f64,
    /// Turn rate from the last integration step
    pub omega: f64,
    pub trail: VecDeque<(f64, f64)>,
    /// Update sequence counter; incoming state older than this is rejected
    pub ssc: u64,
    /// Shared-clock millis of the last applied network update
    pub last_update: f64,
    /// True when this peer simulates the entity authoritatively
    pub owned: bool,
    /// Firing aircraft for bullets/missiles/flares
    pub parent: Option<Uuid>,
    pub kind: KindState,
}

impl Entity {
    fn base(id: Uuid, owned: bool, parent: Option<Uuid>, kind: KindState) -> Self {
        Self {
            id,
            x: 0.0,
            y: 0.0,
            track: 0.0,
            v: 0.0,
            omega: 0.0,
            trail: VecDeque::with_capacity(TRAIL_CAPACITY),
            ssc: 0,
            last_update: 0.0,
            owned,
            parent,
            kind,
        }
    }

    pub fn aircraft(id: Uuid, owned: bool, username: String, seeker: SeekerTuning) -> Self {
        let mut entity = Self::base(
            id,
            owned,
            None,
            KindState::Aircraft(AircraftState::new(username, seeker)),
        );
        entity.v = 100.0;
        entity
    }

    pub fn bullet(id: Uuid, owned: bool, parent: Uuid) -> Self {
        let mut entity = Self::base(id, owned, Some(parent), KindState::Bullet);
        entity.v = BULLET_MUZZLE_SPEED;
        entity
    }

    pub fn missile(id: Uuid, parent: Uuid, owned: bool, seeker: SeekerTuning) -> Self {
        Self::base(
            id,
            owned,
            Some(parent),
            KindState::Missile(MissileState::new(seeker)),
        )
    }

    pub fn flare(id: Uuid, owned: bool, parent: Option<Uuid>) -> Self {
        Self::base(id, owned, parent, KindState::Flare)
    }

    pub fn debris(id: Uuid) -> Self {
        Self::base(id, true, None, KindState::Debris)
    }

    pub fn kind_tag(&self) -> EntityKind {
        match self.kind {
            KindState::Aircraft(_) => EntityKind::Airplane,
            KindState::Bullet => EntityKind::Bullet,
            KindState::Missile(_) => EntityKind::Missile,
            KindState::Flare => EntityKind::Flare,
            KindState::Debris => EntityKind::Debris,
        }
    }

    /// Advance one fixed step.
    ///
    /// Order matters and is shared by every kind: acceleration from thrust
    /// minus drag, velocity clamp, lift-to-turn-rate conversion, heading
    /// normalization, explicit Euler position update, trail push.
    pub fn integrate(&mut self, dt: f64, add_trail: bool) {
        match &mut self.kind {
            KindState::Aircraft(aircraft) => aircraft.pre_step(dt),
            KindState::Missile(missile) => missile.pre_step(dt),
            _ => {}
        }

        self.v += (self.thrust() - self.drag()) * dt;
        self.clamp_velocity();

        let lift = self.lift();
        self.omega = if self.v.abs() > f64::EPSILON {
            lift / (self.v / REFERENCE_SPEED)
        } else {
            0.0
        };
        self.track = normalize_angle(self.track + self.omega * dt);

        let vx = self.v * self.track.cos();
        let vy = self.v * self.track.sin();
        self.x += vx * dt;
        self.y += vy * dt;

        if add_trail {
            self.trail.push_back((self.x, self.y));
            while self.trail.len() > TRAIL_CAPACITY {
                self.trail.pop_front();
            }
        }
    }

    fn thrust(&self) -> f64 {
        match &self.kind {
            KindState::Aircraft(aircraft) => aircraft.thrust(self.v),
            KindState::Missile(missile) => missile.thrust(),
            // Bullets, flares and debris coast
            _ => 0.0,
        }
    }

    fn drag(&self) -> f64 {
        match &self.kind {
            KindState::Aircraft(aircraft) => aircraft.drag(self.v),
            KindState::Missile(missile) => missile.drag(self.v),
            KindState::Bullet => BULLET_DRAG * self.v * self.v,
            KindState::Flare => FLARE_DRAG * self.v * self.v,
            KindState::Debris => DEBRIS_DRAG * self.v * self.v,
        }
    }

    fn lift(&mut self) -> f64 {
        let v = self.v;
        match &mut self.kind {
            KindState::Aircraft(aircraft) => aircraft.lift(v),
            KindState::Missile(missile) => missile.lift(v),
            _ => 0.0,
        }
    }

    fn clamp_velocity(&mut self) {
        if let KindState::Aircraft(aircraft) = &self.kind {
            if self.v < aircraft.tuning.min_speed {
                self.v = aircraft.tuning.min_speed;
            }
        }
    }

    /// Local expiry condition, checked after each step
    pub fn expired(&self) -> bool {
        match &self.kind {
            KindState::Aircraft(_) => false,
            KindState::Bullet => self.v < BULLET_MIN_SPEED,
            KindState::Missile(missile) => missile.expired(self.v),
            KindState::Flare => self.v < FLARE_MIN_SPEED,
            KindState::Debris => self.v < DEBRIS_MIN_SPEED,
        }
    }

    /// Snapshot used for lock arbitration
    pub fn target_view(&self) -> TargetView {
        TargetView {
            id: self.id,
            kind: self.kind_tag(),
            x: self.x,
            y: self.y,
            track: self.track,
            v: self.v,
            throttle: match &self.kind {
                KindState::Aircraft(aircraft) => aircraft.throttle,
                _ => 0.0,
            },
        }
    }

    /// Snapshot of the carried sensor, for aircraft and missiles
    pub fn sensor_view(&self) -> Option<SensorView> {
        let sensor = match &self.kind {
            KindState::Aircraft(aircraft) => &aircraft.sensor,
            KindState::Missile(missile) => &missile.sensor,
            _ => return None,
        };
        Some(SensorView {
            x: self.x,
            y: self.y,
            track: self.track,
            head_bearing: sensor.head_bearing,
            cone: sensor.tuning.sensor_cone,
        })
    }

    /// Merge a network state patch. Missing fields keep their current value.
    pub fn apply_patch(&mut self, patch: &StatePatch) {
        if let Some(x) = patch.x {
            self.x = x;
        }
        if let Some(y) = patch.y {
            self.y = y;
        }
        if let Some(v) = patch.v {
            self.v = v;
        }
        if let Some(track) = patch.track {
            self.track = track;
        }

        match &mut self.kind {
            KindState::Aircraft(aircraft) => {
                if let Some(aoa) = patch.angle_of_attack {
                    aircraft.angle_of_attack = aoa;
                }
                if let Some(bank) = patch.angle_of_bank {
                    aircraft.angle_of_bank = bank;
                }
                if let Some(throttle) = patch.throttle_position {
                    aircraft.throttle = throttle;
                }
                if let Some(life) = patch.life {
                    aircraft.life = life;
                }
                if let Some(fuel) = patch.fuel {
                    aircraft.fuel.amount = fuel;
                }
            }
            KindState::Missile(missile) => {
                if let Some(fuel) = patch.fuel {
                    missile.fuel = fuel;
                }
                if let Some(bearing) = patch.head_bearing {
                    missile.sensor.head_bearing = bearing;
                }
            }
            _ => {}
        }
    }

    /// Current state as a wire patch, shaped per kind
    pub fn state_patch(&self) -> StatePatch {
        let mut patch = StatePatch {
            x: Some(self.x),
            y: Some(self.y),
            v: Some(self.v),
            track: Some(self.track),
            ..StatePatch::default()
        };
        match &self.kind {
            KindState::Aircraft(aircraft) => {
                patch.angle_of_attack = Some(aircraft.angle_of_attack);
                patch.angle_of_bank = Some(aircraft.angle_of_bank);
                patch.throttle_position = Some(aircraft.throttle);
                patch.life = Some(aircraft.life);
                patch.fuel = Some(aircraft.fuel.amount);
            }
            KindState::Missile(missile) => {
                patch.fuel = Some(missile.fuel);
                patch.head_bearing = Some(missile.sensor.head_bearing);
            }
            _ => {}
        }
        patch
    }
}
