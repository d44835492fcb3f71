//! Infrared sensor: heat signatures, lock arbitration, head slewing
//!
//! Carried by aircraft and missiles. Every entity kind exposes a heat
//! signature toward a given sensor; the sensor re-arbitrates its lock every
//! integration step and slews a gimballed head toward the locked target.

use rand::Rng;
use uuid::Uuid;

use crate::sim::{EntityKind, SeekerTuning};
use crate::util::angles::{azimuth, distance, normalize_angle};

/// Heat signature base for an aircraft
const AIRCRAFT_BASE_SIGNATURE: f64 = 1.0;
/// Constant elevated base of a flare. Chosen above the product of the
/// aircraft throttle and aspect caps so a flare outscores any aircraft at
/// equal distance and bearing.
const FLARE_BASE_SIGNATURE: f64 = 2.5;
/// Reference range for the inverse-square distance term
const SIGNATURE_REFERENCE_RANGE: f64 = 500.0;
/// Cap on every graded multiplier
const MULTIPLIER_CAP: f64 = 1.5;
/// Tone decay per step while unlocked
const TONE_DECAY: f64 = 0.1;

/// Where a sensor is and where its head points, snapshotted from the carrier
#[derive(Debug, Clone, Copy)]
pub struct SensorView {
    pub x: f64,
    pub y: f64,
    pub track: f64,
    pub head_bearing: f64,
    pub cone: f64,
}

/// A lock candidate, snapshotted from the registry before iteration
#[derive(Debug, Clone, Copy)]
pub struct TargetView {
    pub id: Uuid,
    pub kind: EntityKind,
    pub x: f64,
    pub y: f64,
    pub track: f64,
    pub v: f64,
    /// Throttle position for aircraft, 0 for everything else
    pub throttle: f64,
}

/// Heat signature of a target as seen by a sensor, in [0, ~3.4]
pub fn heat_signature(target: &TargetView, sensor: &SensorView) -> f64 {
    match target.kind {
        EntityKind::Airplane => {
            AIRCRAFT_BASE_SIGNATURE
                * throttle_multiplier(target.throttle)
                * aspect_multiplier(target, sensor)
                * distance_multiplier(target, sensor)
                * bearing_multiplier(target, sensor)
        }
        EntityKind::Flare => {
            FLARE_BASE_SIGNATURE
                * distance_multiplier(target, sensor)
                * bearing_multiplier(target, sensor)
        }
        // Bullets and debris are never seeker targets
        EntityKind::Bullet | EntityKind::Missile | EntityKind::Debris => 0.0,
    }
}

/// Afterburner glow: hotter the further the throttle is pushed
fn throttle_multiplier(throttle: f64) -> f64 {
    0.5 + throttle.clamp(0.0, 1.0)
}

/// Tailpipe exposure: hottest when the sensor looks straight up the tail
fn aspect_multiplier(target: &TargetView, sensor: &SensorView) -> f64 {
    let target_to_sensor = azimuth(target.x, target.y, sensor.x, sensor.y);
    let aspect = normalize_angle(target_to_sensor - target.track).abs();
    0.5 + aspect / std::f64::consts::PI
}

/// Inverse-square range term, capped
fn distance_multiplier(target: &TargetView, sensor: &SensorView) -> f64 {
    let range = distance(sensor.x, sensor.y, target.x, target.y).max(1.0);
    (SIGNATURE_REFERENCE_RANGE / range).powi(2).min(MULTIPLIER_CAP)
}

/// Full gain inside the sensor cone, linear falloff to zero just outside it
fn bearing_multiplier(target: &TargetView, sensor: &SensorView) -> f64 {
    let boresight = sensor.track + sensor.head_bearing;
    let off = normalize_angle(azimuth(sensor.x, sensor.y, target.x, target.y) - boresight).abs();
    if off <= sensor.cone {
        1.0
    } else {
        (1.0 - (off - sensor.cone) / (2.0 * sensor.cone)).max(0.0)
    }
}

/// Infrared sensor head state
#[derive(Debug, Clone)]
pub struct IrSensor {
    pub tuning: SeekerTuning,
    /// Head bearing relative to carrier heading, clamped to the gimbal limit
    pub head_bearing: f64,
    /// Lock tone strength; the score of the locked target, decaying when unlocked
    pub tone: f64,
    /// Identity of the locked target, looked up through the registry, never owned
    pub locked_target: Option<Uuid>,
}

impl IrSensor {
    pub fn new(tuning: SeekerTuning) -> Self {
        Self {
            tuning,
            head_bearing: 0.0,
            tone: 0.0,
            locked_target: None,
        }
    }

    /// Re-arbitrate the lock across all candidates.
    ///
    /// The best-scoring candidate wins only if it passes the probabilistic
    /// accept test `random() < score`. Candidates are scanned in the caller's
    /// order; only a strictly greater score replaces the incumbent, so lock
    /// selection is deterministic for a fixed iteration order.
    pub fn acquire<R: Rng>(
        &mut self,
        view: &SensorView,
        targets: &[TargetView],
        exclude: Uuid,
        rng: &mut R,
    ) -> Option<TargetView> {
        let mut best: Option<(TargetView, f64)> = None;
        for target in targets {
            if target.id == exclude {
                continue;
            }
            let score = heat_signature(target, view);
            match &best {
                Some((_, best_score)) if score <= *best_score => {}
                _ => best = Some((*target, score)),
            }
        }

        match best {
            Some((target, score)) if rng.gen::<f64>() < score => {
                self.tone = score;
                self.locked_target = Some(target.id);
                Some(target)
            }
            _ => {
                self.tone = (self.tone - TONE_DECAY).max(0.0);
                self.locked_target = None;
                None
            }
        }
    }

    /// Slew the head a fraction of the way toward the target bearing.
    ///
    /// First-order lag rather than instantaneous slaving, to avoid
    /// oscillation from an overly aggressive gain. Returns the commanded
    /// head rate, which guidance converts into a turn-rate command.
    pub fn slew_to(&mut self, view: &SensorView, target_x: f64, target_y: f64, dt: f64) -> f64 {
        if dt <= 0.0 {
            return 0.0;
        }
        let bearing =
            normalize_angle(azimuth(view.x, view.y, target_x, target_y) - view.track);
        let delta_bearing = bearing - self.head_bearing;

        let command = self.tuning.head_rate_multiplier * delta_bearing / dt;
        self.head_bearing += command * dt;
        self.head_bearing = self
            .head_bearing
            .clamp(-self.tuning.max_bearing, self.tuning.max_bearing);

        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sensor_at_origin() -> SensorView {
        SensorView {
            x: 0.0,
            y: 0.0,
            track: 0.0,
            head_bearing: 0.0,
            cone: 5.0_f64.to_radians(),
        }
    }

    fn aircraft_target(x: f64, y: f64, track: f64, throttle: f64) -> TargetView {
        TargetView {
            id: Uuid::new_v4(),
            kind: EntityKind::Airplane,
            x,
            y,
            track,
            v: 100.0,
            throttle,
        }
    }

    #[test]
    fn aircraft_signature_stays_within_cap_product() {
        let sensor = sensor_at_origin();
        // Hot case: tail-on afterburning aircraft dead ahead at point-blank range.
        let hot = aircraft_target(10.0, 0.0, 0.0, 1.0);
        let sig = heat_signature(&hot, &sensor);
        assert!(sig <= 1.5 * 1.5 * 1.5 * 1.0 + 1e-9);
        assert!(sig >= 0.0);

        // Cold case: head-on idle aircraft far outside the cone.
        let cold = aircraft_target(-2000.0, 2000.0, 0.7, 0.0);
        assert_eq!(heat_signature(&cold, &sensor), 0.0);
    }

    #[test]
    fn flare_outscores_aircraft_at_equal_geometry() {
        let sensor = sensor_at_origin();
        for range in [50.0, 200.0, 800.0] {
            let aircraft = aircraft_target(range, 0.0, 0.0, 1.0);
            let flare = TargetView {
                kind: EntityKind::Flare,
                ..aircraft
            };
            assert!(
                heat_signature(&flare, &sensor) >= heat_signature(&aircraft, &sensor),
                "flare must dominate at range {range}"
            );
        }
    }

    #[test]
    fn bullets_and_debris_are_never_targets() {
        let sensor = sensor_at_origin();
        for kind in [EntityKind::Bullet, EntityKind::Debris] {
            let target = TargetView {
                kind,
                ..aircraft_target(50.0, 0.0, 0.0, 1.0)
            };
            assert_eq!(heat_signature(&target, &sensor), 0.0);
        }
    }

    #[test]
    fn equal_scores_keep_the_incumbent() {
        let sensor = sensor_at_origin();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        // Two identical flares; the first in iteration order must win.
        let first = TargetView {
            id: Uuid::new_v4(),
            kind: EntityKind::Flare,
            x: 100.0,
            y: 0.0,
            track: 0.0,
            v: 0.0,
            throttle: 0.0,
        };
        let second = TargetView {
            id: Uuid::new_v4(),
            ..first
        };

        let mut seeker = IrSensor::new(SeekerTuning::default());
        // Score is well above 1 at this range, so the accept test always passes.
        let locked = seeker
            .acquire(&sensor, &[first, second], Uuid::new_v4(), &mut rng)
            .expect("lock should succeed");
        assert_eq!(locked.id, first.id);
    }

    #[test]
    fn head_respects_gimbal_limit() {
        let view = sensor_at_origin();
        let mut seeker = IrSensor::new(SeekerTuning::default());
        // Target far off boresight; repeated slews must never exceed the limit.
        for _ in 0..100 {
            seeker.slew_to(&view, 0.0, 1000.0, 1.0 / 60.0);
            assert!(seeker.head_bearing.abs() <= seeker.tuning.max_bearing + 1e-12);
        }
    }

    #[test]
    fn tone_decays_toward_zero_when_unlocked() {
        let sensor = sensor_at_origin();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut seeker = IrSensor::new(SeekerTuning::default());
        seeker.tone = 0.35;

        // No candidates at all: lock fails, tone decays and clamps at zero.
        for _ in 0..10 {
            assert!(seeker
                .acquire(&sensor, &[], Uuid::new_v4(), &mut rng)
                .is_none());
        }
        assert_eq!(seeker.tone, 0.0);
    }
}
