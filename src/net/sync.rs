//! State reconciliation rules for incoming updates
//!
//! Peers exchange full-state patches instead of deltas, so conflict
//! resolution is per message: a patch is applied only when it is fresh
//! (younger than the staleness threshold on the shared clock) and newer
//! (a strictly greater sequence counter) than what we already hold. Applied
//! patches are then caught up to local time with trail-less sub-steps.

use tracing::{debug, trace};
use uuid::Uuid;

use crate::net::protocol::UpdateMsg;
use crate::sim::entity::Entity;
use crate::sim::{EntityKind, Registry, SeekerTuning};
use crate::util::time::{frame_delta, STALE_THRESHOLD_SECS};

/// Apply one update message against the registry.
///
/// `now` is the shared-clock time in millis at the receiver. Returns true
/// when the patch was applied.
pub fn apply_update(
    registry: &mut Registry,
    now: f64,
    seeker: SeekerTuning,
    msg: &UpdateMsg,
) -> bool {
    if registry.is_removed(msg.uuid) {
        trace!(uuid = %msg.uuid, "dropping update for removed entity");
        return false;
    }

    // Birth precedes the staleness check: a stale first update still
    // introduces the entity at its spawn state, and the next fresh update
    // fills the state in.
    if !registry.contains(msg.uuid) {
        let Some(entity) = birth(msg, seeker) else {
            debug!(uuid = %msg.uuid, kind = ?msg.kind, "update cannot birth entity");
            return false;
        };
        registry.insert(entity);
        debug!(uuid = %msg.uuid, kind = ?msg.kind, "entity joined from update");
    }

    let age = (now - msg.time) / 1000.0;
    if age >= STALE_THRESHOLD_SECS {
        debug!(uuid = %msg.uuid, age, "dropping stale update");
        return false;
    }

    let Some(entity) = registry.get_mut(msg.uuid) else {
        return false;
    };
    // Never let the network steer our own simulation, and never step
    // backwards through the sequence counter.
    if entity.owned {
        return false;
    }
    if msg.ssc <= entity.ssc {
        trace!(uuid = %msg.uuid, theirs = msg.ssc, ours = entity.ssc, "dropping old update");
        return false;
    }

    entity.apply_patch(&msg.state);
    entity.ssc = msg.ssc;
    entity.last_update = msg.time;
    if let Some(username) = &msg.username {
        if let crate::sim::KindState::Aircraft(aircraft) = &mut entity.kind {
            aircraft.username = username.clone();
        }
    }

    catch_up(entity, age.max(0.0));
    true
}

/// Advance a freshly patched entity from its sample time to local time with
/// frame-sized sub-steps. The trail is skipped so remote trails do not jump.
fn catch_up(entity: &mut Entity, mut remaining: f64) {
    let step = frame_delta();
    while remaining > 0.0 {
        entity.integrate(remaining.min(step), false);
        remaining -= step;
    }
}

/// Construct a remote entity from its first update
fn birth(msg: &UpdateMsg, seeker: SeekerTuning) -> Option<Entity> {
    let entity = match msg.kind {
        EntityKind::Airplane => Entity::aircraft(
            msg.uuid,
            false,
            msg.username.clone().unwrap_or_default(),
            seeker,
        ),
        EntityKind::Bullet => Entity::bullet(msg.uuid, false, msg.parent?),
        EntityKind::Missile => Entity::missile(msg.uuid, msg.parent?, false, seeker),
        EntityKind::Flare => Entity::flare(msg.uuid, false, msg.parent),
        EntityKind::Debris => Entity::debris(msg.uuid),
    };
    Some(entity)
}

/// Remove an entity on a remove or death message. Idempotent; the removed
/// entity is returned on the first call so the caller can run side effects.
pub fn apply_remove(registry: &mut Registry, id: Uuid) -> Option<Entity> {
    registry.remove(id)
}
