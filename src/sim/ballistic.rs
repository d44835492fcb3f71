//! Lightweight kinematic kinds: bullets, flares and explosion debris
//!
//! All three are drag-only bodies with a per-kind expiry speed. Flares carry
//! a constant elevated heat signature (see `sensor`); bullets and debris are
//! never seeker targets.

/// Bullet constants
pub const BULLET_DRAG: f64 = 0.25e-2;
/// Muzzle velocity added to the carrier speed at firing
pub const BULLET_MUZZLE_SPEED: f64 = 500.0;
/// Bullets slower than this are spent
pub const BULLET_MIN_SPEED: f64 = 250.0;
/// Proximity radius for ownship hits
pub const BULLET_HIT_RADIUS: f64 = 10.0;
pub const BULLET_DAMAGE: f64 = 10.0;

/// Flare constants
pub const FLARE_DRAG: f64 = 1e-1;
pub const FLARE_MIN_SPEED: f64 = 5.0;

/// Debris constants
pub const DEBRIS_DRAG: f64 = 0.5e-1;
pub const DEBRIS_MIN_SPEED: f64 = 5.0;
/// Debris pieces spawned when an aircraft or missile is destroyed
pub const DEBRIS_BURST_COUNT: usize = 6;
