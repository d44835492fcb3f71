//! Per-peer world: owns the registry, the shared clock, and the ownship.
//!
//! Each peer simulates everything locally and is authoritative only for the
//! entities it owns (its aircraft and the missiles it fires). Remote entities
//! are advanced by the same integrator between network updates.

use std::f64::consts::PI;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::net::protocol::{Envelope, UpdateMsg};
use crate::net::sync;
use crate::sim::ballistic::{
    BULLET_DAMAGE, BULLET_HIT_RADIUS, BULLET_MUZZLE_SPEED, DEBRIS_BURST_COUNT,
};
use crate::sim::clock::{delta_sample, Clock};
use crate::sim::entity::{Entity, KindState};
use crate::sim::sensor::TargetView;
use crate::sim::{missile, Controls, EntityKind, Registry, SeekerTuning};
use crate::util::angles::{distance, normalize_angle};
use crate::util::time::{unix_millis, REMOTE_TIMEOUT_MILLIS};

/// Bullets leave the muzzle this far ahead of the aircraft
const GUN_MUZZLE_OFFSET: f64 = 10.0;
/// Launch-direction deflection per unit angle of attack, for guns and rails
const LAUNCH_AOA_DEFLECTION: f64 = 0.25;
/// Uniform gun dispersion half-angle, radians
const GUN_JITTER: f64 = 0.025;
/// Missiles drop off the rail this far ahead of the aircraft
const RAIL_OFFSET: f64 = 20.0;
/// Flares leave at this fraction of carrier speed
const FLARE_EJECT_SPEED: f64 = 0.3;
/// Flare ejection angle off the tail, away from the banked side
const FLARE_EJECT_ANGLE: f64 = 0.5;

pub struct World {
    pub registry: Registry,
    pub clock: Clock,
    pub ownship: Uuid,
    rng: ChaCha8Rng,
    username: String,
    seeker: SeekerTuning,
    outbound: Vec<Envelope>,
}

impl World {
    pub fn new(username: String, seeker: SeekerTuning) -> Self {
        Self::seeded(username, seeker, rand::random())
    }

    /// Deterministic constructor for tests and replays
    pub fn seeded(username: String, seeker: SeekerTuning, seed: u64) -> Self {
        let ownship = Uuid::new_v4();
        let mut registry = Registry::new();
        registry.insert(Entity::aircraft(ownship, true, username.clone(), seeker));
        Self {
            registry,
            clock: Clock::new(),
            ownship,
            rng: ChaCha8Rng::seed_from_u64(seed),
            username,
            seeker,
            outbound: Vec::new(),
        }
    }

    pub fn ownship_alive(&self) -> bool {
        self.registry.contains(self.ownship)
    }

    /// Messages produced since the last call, in order
    pub fn take_outbound(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.outbound)
    }

    /// Advance the whole world by one frame
    pub fn step(&mut self, dt: f64, controls: &Controls) {
        let now = self.clock.now();

        // Lock candidates are snapshotted once so every sensor this frame
        // arbitrates over the same world state, in registry order.
        let targets: Vec<TargetView> = self.registry.iter().map(Entity::target_view).collect();

        if self.ownship_alive() {
            self.steer_ownship(controls, dt);
            self.run_ownship_sensor(&targets, dt);
            self.fire_weapons(controls, now);
        }

        self.guide_missiles(&targets, dt);

        for entity in self.registry.iter_mut() {
            entity.integrate(dt, true);
        }

        self.reap_expired();
        self.reap_silent_aircraft(now);
        self.resolve_hits();
        self.publish(now);
    }

    /// Apply one inbound message
    pub fn apply_message(&mut self, envelope: &Envelope) {
        match envelope {
            Envelope::Update(msg) => {
                sync::apply_update(&mut self.registry, self.clock.now(), self.seeker, msg);
            }
            Envelope::Remove { uuid, .. } => {
                self.remove_with_effects(*uuid);
            }
            Envelope::Death { uuid, kind } => {
                info!(uuid = %uuid, kind = ?kind, "death received");
                self.remove_with_effects(*uuid);
            }
            Envelope::Synchronization {
                time,
                tx_time: Some(tx_time),
            } => {
                self.clock
                    .add_delta_sample(delta_sample(*tx_time, *time, unix_millis()));
            }
            _ => {}
        }
    }

    fn steer_ownship(&mut self, controls: &Controls, dt: f64) {
        if let Some(entity) = self.registry.get_mut(self.ownship) {
            if let KindState::Aircraft(aircraft) = &mut entity.kind {
                aircraft.apply_controls(controls, dt);
            }
        }
    }

    /// Continuous seeker sweep on the ownship sensor. The head is seeded into
    /// fired missiles, so keeping it slaved to the lock is what makes a
    /// boresight launch track.
    fn run_ownship_sensor(&mut self, targets: &[TargetView], dt: f64) {
        let Some(entity) = self.registry.get_mut(self.ownship) else {
            return;
        };
        let id = entity.id;
        let Some(view) = entity.sensor_view() else {
            return;
        };
        if let KindState::Aircraft(aircraft) = &mut entity.kind {
            if let Some(target) = aircraft.sensor.acquire(&view, targets, id, &mut self.rng) {
                aircraft.sensor.slew_to(&view, target.x, target.y, dt);
            }
        }
    }

    fn guide_missiles(&mut self, targets: &[TargetView], dt: f64) {
        let ids: Vec<Uuid> = self
            .registry
            .iter()
            .filter(|entity| entity.owned && matches!(entity.kind, KindState::Missile(_)))
            .map(|entity| entity.id)
            .collect();
        for id in ids {
            if let Some(entity) = self.registry.get_mut(id) {
                missile::guide(entity, targets, dt, &mut self.rng);
            }
        }
    }

    fn fire_weapons(&mut self, controls: &Controls, now: f64) {
        let Some(entity) = self.registry.get_mut(self.ownship) else {
            return;
        };
        let (x, y, track, v) = (entity.x, entity.y, entity.track, entity.v);
        let KindState::Aircraft(aircraft) = &mut entity.kind else {
            return;
        };

        // Pulling into the turn deflects the launch direction off the nose.
        let deflection =
            LAUNCH_AOA_DEFLECTION * aircraft.angle_of_attack * aircraft.angle_of_bank.signum();

        let mut fire_gun = false;
        if controls.gun && aircraft.gun_cooldown <= 0.0 && aircraft.bullets.try_take() {
            aircraft.gun_cooldown = aircraft.tuning.gun_period;
            fire_gun = true;
        }

        let mut missile_seed = None;
        if controls.missile && aircraft.missile_cooldown <= 0.0 && aircraft.missiles.try_take() {
            aircraft.missile_cooldown = 1.0;
            missile_seed = Some((
                aircraft.sensor.head_bearing,
                aircraft.sensor.locked_target,
            ));
        }

        let mut flare_bank = None;
        if controls.flare && aircraft.flare_cooldown <= 0.0 && aircraft.flares.try_take() {
            aircraft.flare_cooldown = aircraft.tuning.flare_period;
            flare_bank = Some(aircraft.angle_of_bank);
        }

        if fire_gun {
            let jitter = self.rng.gen_range(-GUN_JITTER..GUN_JITTER);
            let mut bullet = Entity::bullet(Uuid::new_v4(), true, self.ownship);
            bullet.track = normalize_angle(track + deflection + jitter);
            bullet.v = BULLET_MUZZLE_SPEED + v;
            bullet.x = x + GUN_MUZZLE_OFFSET * track.cos();
            bullet.y = y + GUN_MUZZLE_OFFSET * track.sin();
            self.spawn_and_announce(bullet, now);
        }

        if let Some((head_bearing, locked_target)) = missile_seed {
            let mut round = Entity::missile(Uuid::new_v4(), self.ownship, true, self.seeker);
            round.track = normalize_angle(track + deflection);
            round.v = v;
            round.x = x + RAIL_OFFSET * track.cos();
            round.y = y + RAIL_OFFSET * track.sin();
            if let KindState::Missile(state) = &mut round.kind {
                state.sensor.head_bearing = head_bearing;
                state.sensor.locked_target = locked_target;
            }
            debug!(uuid = %round.id, "missile away");
            self.spawn_and_announce(round, now);
        }

        if let Some(bank) = flare_bank {
            let mut flare = Entity::flare(Uuid::new_v4(), true, Some(self.ownship));
            flare.track = normalize_angle(track + PI - FLARE_EJECT_ANGLE * bank.signum());
            flare.v = v * FLARE_EJECT_SPEED;
            flare.x = x;
            flare.y = y;
            self.spawn_and_announce(flare, now);
        }
    }

    /// Insert a freshly fired entity and broadcast its birth update
    fn spawn_and_announce(&mut self, mut entity: Entity, now: f64) {
        entity.ssc = 1;
        let msg = self.update_for(&entity, now);
        self.registry.insert(entity);
        self.outbound.push(Envelope::Update(msg));
    }

    fn update_for(&self, entity: &Entity, now: f64) -> UpdateMsg {
        UpdateMsg {
            kind: entity.kind_tag(),
            uuid: entity.id,
            parent: entity.parent,
            time: now,
            state: entity.state_patch(),
            ssc: entity.ssc,
            username: match &entity.kind {
                KindState::Aircraft(_) => Some(self.username.clone()),
                _ => None,
            },
        }
    }

    fn reap_expired(&mut self) {
        let expired: Vec<(Uuid, EntityKind, bool)> = self
            .registry
            .iter()
            .filter(|entity| entity.expired())
            .map(|entity| (entity.id, entity.kind_tag(), entity.owned))
            .collect();

        for (id, kind, owned) in expired {
            self.remove_with_effects(id);
            // Bullets, flares and debris expire identically on every peer;
            // missiles are guided only by their owner, who must announce.
            if owned && kind == EntityKind::Missile {
                self.outbound.push(Envelope::Remove { kind, uuid: id });
            }
        }
    }

    /// Drop remote aircraft whose peer has gone silent
    fn reap_silent_aircraft(&mut self, now: f64) {
        let silent: Vec<Uuid> = self
            .registry
            .of_kind(EntityKind::Airplane)
            .filter(|entity| !entity.owned && now - entity.last_update > REMOTE_TIMEOUT_MILLIS)
            .map(|entity| entity.id)
            .collect();
        for id in silent {
            debug!(uuid = %id, "removing silent remote aircraft");
            self.remove_with_effects(id);
        }
    }

    /// Local damage resolution. Each peer is authoritative for its own life,
    /// so only hits against the ownship are scored here; other peers score
    /// hits against themselves and broadcast the result.
    fn resolve_hits(&mut self) {
        let Some(ownship) = self.registry.get(self.ownship) else {
            return;
        };
        let (ox, oy) = (ownship.x, ownship.y);

        let mut damage = 0.0;
        let mut spent: Vec<(Uuid, EntityKind)> = Vec::new();
        for entity in self.registry.iter() {
            match &entity.kind {
                KindState::Missile(state) => {
                    if state.armed()
                        && distance(ox, oy, entity.x, entity.y) <= state.tuning.hit_radius
                    {
                        damage += state.tuning.damage;
                        spent.push((entity.id, EntityKind::Missile));
                    }
                }
                KindState::Bullet => {
                    if entity.parent != Some(self.ownship)
                        && distance(ox, oy, entity.x, entity.y) <= BULLET_HIT_RADIUS
                    {
                        damage += BULLET_DAMAGE;
                        spent.push((entity.id, EntityKind::Bullet));
                    }
                }
                _ => {}
            }
        }

        for (id, kind) in spent {
            self.remove_with_effects(id);
            self.outbound.push(Envelope::Remove { kind, uuid: id });
        }

        if damage > 0.0 {
            let Some(entity) = self.registry.get_mut(self.ownship) else {
                return;
            };
            let KindState::Aircraft(aircraft) = &mut entity.kind else {
                return;
            };
            aircraft.life -= damage;
            let life = aircraft.life;
            info!(damage, life, "ownship hit");
            if life <= 0.0 {
                self.outbound.push(Envelope::Death {
                    kind: EntityKind::Airplane,
                    uuid: self.ownship,
                });
                self.remove_with_effects(self.ownship);
                info!("ownship destroyed");
            }
        }
    }

    /// Remove an entity; aircraft and missiles burst into debris
    pub fn remove_with_effects(&mut self, id: Uuid) -> Option<Entity> {
        let entity = sync::apply_remove(&mut self.registry, id)?;
        if matches!(
            entity.kind_tag(),
            EntityKind::Airplane | EntityKind::Missile
        ) {
            for _ in 0..DEBRIS_BURST_COUNT {
                let mut debris = Entity::debris(Uuid::new_v4());
                debris.x = entity.x;
                debris.y = entity.y;
                debris.track = self.rng.gen_range(-PI..PI);
                debris.v = entity.v * 0.25 + self.rng.gen_range(20.0..80.0);
                self.registry.insert(debris);
            }
        }
        Some(entity)
    }

    /// Broadcast fresh state for everything this peer owns
    fn publish(&mut self, now: f64) {
        let owned: Vec<Uuid> = self
            .registry
            .iter()
            .filter(|entity| {
                entity.owned
                    && matches!(entity.kind, KindState::Aircraft(_) | KindState::Missile(_))
            })
            .map(|entity| entity.id)
            .collect();

        for id in owned {
            let Some(entity) = self.registry.get_mut(id) else {
                continue;
            };
            entity.ssc += 1;
            entity.last_update = now;
            let snapshot = entity.clone();
            let msg = self.update_for(&snapshot, now);
            self.outbound.push(Envelope::Update(msg));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 1.0 / 60.0;

    fn world() -> World {
        World::seeded("tester".into(), SeekerTuning::default(), 42)
    }

    fn gun_controls() -> Controls {
        Controls {
            gun: true,
            ..Controls::default()
        }
    }

    fn ownship_life(world: &World) -> f64 {
        let entity = world.registry.get(world.ownship).unwrap();
        let KindState::Aircraft(aircraft) = &entity.kind else {
            panic!("ownship is not an aircraft");
        };
        aircraft.life
    }

    #[test]
    fn ownship_publishes_every_frame_with_rising_ssc() {
        let mut world = world();
        world.step(DT, &Controls::default());
        world.step(DT, &Controls::default());

        let sscs: Vec<u64> = world
            .take_outbound()
            .into_iter()
            .filter_map(|envelope| match envelope {
                Envelope::Update(msg) if msg.uuid == world.ownship => Some(msg.ssc),
                _ => None,
            })
            .collect();
        assert_eq!(sscs, vec![1, 2]);
    }

    #[test]
    fn gun_fires_at_the_cooldown_rate() {
        let mut world = world();
        // Half a second of trigger held: the 0.08s period allows a shot
        // every fifth frame, and none are old enough to expire yet.
        for _ in 0..30 {
            world.step(DT, &gun_controls());
        }
        let bullets = world.registry.of_kind(EntityKind::Bullet).count();
        assert!(
            (5..=7).contains(&bullets),
            "expected about 6 bullets, got {bullets}"
        );

        // Inventory went down accordingly.
        let entity = world.registry.get(world.ownship).unwrap();
        let KindState::Aircraft(aircraft) = &entity.kind else {
            panic!("ownship is not an aircraft");
        };
        assert_eq!(aircraft.bullets.count, 100 - bullets as u32);
    }

    #[test]
    fn bullets_fly_faster_than_the_carrier() {
        let mut world = world();
        world.step(DT, &gun_controls());
        let bullet = world
            .registry
            .of_kind(EntityKind::Bullet)
            .next()
            .expect("bullet fired");
        assert!(bullet.v > 500.0);
        assert_eq!(bullet.parent, Some(world.ownship));
    }

    #[test]
    fn missile_inherits_the_carrier_seeker_head() {
        let mut world = world();
        {
            let entity = world.registry.get_mut(world.ownship).unwrap();
            let KindState::Aircraft(aircraft) = &mut entity.kind else {
                panic!("ownship is not an aircraft");
            };
            aircraft.sensor.head_bearing = 0.4;
        }

        let controls = Controls {
            missile: true,
            ..Controls::default()
        };
        world.step(DT, &controls);

        let round = world
            .registry
            .of_kind(EntityKind::Missile)
            .next()
            .expect("missile fired");
        let KindState::Missile(state) = &round.kind else {
            panic!("wrong kind");
        };
        // The head keeps tracking after launch, so allow one frame of slew.
        assert!((state.sensor.head_bearing - 0.4).abs() < 0.2);
        assert_eq!(round.parent, Some(world.ownship));
    }

    #[test]
    fn missile_launch_track_is_biased_by_angle_of_attack() {
        let mut world = world();
        {
            let entity = world.registry.get_mut(world.ownship).unwrap();
            let KindState::Aircraft(aircraft) = &mut entity.kind else {
                panic!("ownship is not an aircraft");
            };
            aircraft.angle_of_attack = 0.6;
            aircraft.angle_of_bank = 1.0;
        }

        let controls = Controls {
            missile: true,
            ..Controls::default()
        };
        world.step(DT, &controls);

        let round = world
            .registry
            .of_kind(EntityKind::Missile)
            .next()
            .expect("missile fired");
        // No lock, no commanded turn: the launch track survives the first
        // frame unchanged, deflected off the nose by 0.25 * aoa.
        assert!((round.track - 0.25 * 0.6).abs() < 1e-9);
    }

    #[test]
    fn enemy_bullet_on_top_of_ownship_scores_a_hit() {
        let mut world = world();
        let (ox, oy) = {
            let ownship = world.registry.get(world.ownship).unwrap();
            (ownship.x, ownship.y)
        };

        let mut bullet = Entity::bullet(Uuid::new_v4(), false, Uuid::new_v4());
        // Place slightly behind so one frame of flight keeps it inside the fuse radius.
        bullet.x = ox - 5.0;
        bullet.y = oy;
        bullet.track = 0.0;
        world.registry.insert(bullet);

        world.step(DT, &Controls::default());
        assert!(ownship_life(&world) < 100.0);
        assert_eq!(world.registry.of_kind(EntityKind::Bullet).count(), 0);
        assert!(world
            .take_outbound()
            .iter()
            .any(|envelope| matches!(envelope, Envelope::Remove { kind: EntityKind::Bullet, .. })));
    }

    #[test]
    fn own_bullets_never_hurt_the_ownship() {
        let mut world = world();
        let (ox, oy) = {
            let ownship = world.registry.get(world.ownship).unwrap();
            (ownship.x, ownship.y)
        };
        let mut bullet = Entity::bullet(Uuid::new_v4(), true, world.ownship);
        bullet.x = ox;
        bullet.y = oy;
        world.registry.insert(bullet);

        world.step(DT, &Controls::default());
        assert_eq!(ownship_life(&world), 100.0);
    }

    #[test]
    fn fatal_damage_broadcasts_death_and_spawns_debris() {
        let mut world = world();
        {
            let entity = world.registry.get_mut(world.ownship).unwrap();
            let KindState::Aircraft(aircraft) = &mut entity.kind else {
                panic!("ownship is not an aircraft");
            };
            aircraft.life = 5.0;
        }
        let (ox, oy) = {
            let ownship = world.registry.get(world.ownship).unwrap();
            (ownship.x, ownship.y)
        };
        let mut bullet = Entity::bullet(Uuid::new_v4(), false, Uuid::new_v4());
        bullet.x = ox - 5.0;
        bullet.y = oy;
        world.registry.insert(bullet);

        world.step(DT, &Controls::default());
        assert!(!world.ownship_alive());
        assert!(world.registry.of_kind(EntityKind::Debris).count() >= DEBRIS_BURST_COUNT);
        assert!(world.take_outbound().iter().any(|envelope| matches!(
            envelope,
            Envelope::Death { kind: EntityKind::Airplane, .. }
        )));
    }

    #[test]
    fn silent_remote_aircraft_are_dropped() {
        let mut world = world();
        let remote_id = Uuid::new_v4();
        let mut remote = Entity::aircraft(
            remote_id,
            false,
            "ghost".into(),
            SeekerTuning::default(),
        );
        remote.last_update = world.clock.now() - 1500.0;
        world.registry.insert(remote);

        world.step(DT, &Controls::default());
        assert!(!world.registry.contains(remote_id));

        // A fresh one stays.
        let fresh_id = Uuid::new_v4();
        let mut fresh = Entity::aircraft(fresh_id, false, "live".into(), SeekerTuning::default());
        fresh.last_update = world.clock.now();
        world.registry.insert(fresh);
        world.step(DT, &Controls::default());
        assert!(world.registry.contains(fresh_id));
    }

    #[test]
    fn remove_message_is_idempotent_and_final() {
        let mut world = world();
        let remote_id = Uuid::new_v4();
        let mut remote = Entity::aircraft(remote_id, false, "r".into(), SeekerTuning::default());
        remote.last_update = world.clock.now();
        world.registry.insert(remote);

        let remove = Envelope::Remove {
            kind: EntityKind::Airplane,
            uuid: remote_id,
        };
        world.apply_message(&remove);
        assert!(!world.registry.contains(remote_id));
        world.apply_message(&remove);
        assert!(world.registry.is_removed(remote_id));
    }
}
