//! Aircraft flight dynamics, controls and weapon inventory

use crate::sim::{Controls, IrSensor, SeekerTuning};

/// Aircraft performance and armament constants
#[derive(Debug, Clone, Copy)]
pub struct AircraftTuning {
    /// Maximum engine thrust
    pub max_thrust: f64,
    /// Lift slope
    pub lift_coefficient: f64,
    /// Parasitic drag coefficient
    pub drag_coefficient: f64,
    /// Induced-drag efficiency factor
    pub efficiency: f64,
    /// Stall-protected minimum speed
    pub min_speed: f64,
    /// Stall threshold angle of attack, radians
    pub max_angle_of_attack: f64,
    /// Bank response inertia, seconds to full deflection
    pub roll_inertia: f64,
    /// Throttle exponent; makes the top of the range disproportionately
    /// powerful, modeling afterburner
    pub thrust_exponent: f64,

    pub fuel_capacity: f64,
    /// Fuel burned per second at full throttle
    pub fuel_burn_rate: f64,
    pub fuel_reload_period: f64,

    pub bullet_capacity: u32,
    pub bullet_reload_period: f64,
    pub missile_capacity: u32,
    pub missile_reload_period: f64,
    pub flare_capacity: u32,
    pub flare_reload_period: f64,

    /// Seconds between gun shots
    pub gun_period: f64,
    /// Seconds for the missile cooldown fraction to decay from 1 to 0
    pub missile_cooldown_period: f64,
    /// Seconds between flare deployments
    pub flare_period: f64,
}

impl Default for AircraftTuning {
    fn default() -> Self {
        Self {
            max_thrust: 100.0,
            lift_coefficient: 2.0,
            drag_coefficient: 1e-3,
            efficiency: 1.0,
            min_speed: 50.0,
            max_angle_of_attack: 0.8,
            roll_inertia: 0.3,
            thrust_exponent: 2.0,

            fuel_capacity: 100.0,
            fuel_burn_rate: 0.8,
            fuel_reload_period: 20.0,

            bullet_capacity: 100,
            bullet_reload_period: 5.0,
            missile_capacity: 4,
            missile_reload_period: 10.0,
            flare_capacity: 30,
            flare_reload_period: 10.0,

            gun_period: 0.08,
            missile_cooldown_period: 5.0,
            flare_period: 0.2,
        }
    }
}

/// Counted resource with a depleted-waiting reload state.
///
/// Reload triggers only after the reload period elapses with no further
/// consumption attempts; attempts while depleted are ignored and restart the
/// wait.
#[derive(Debug, Clone)]
pub struct Reservoir {
    pub count: u32,
    pub capacity: u32,
    pub reload_period: f64,
    wait: Option<f64>,
}

impl Reservoir {
    pub fn new(capacity: u32, reload_period: f64) -> Self {
        Self {
            count: capacity,
            capacity,
            reload_period,
            wait: None,
        }
    }

    /// Consume one unit. Returns false (and restarts the reload wait) while depleted.
    pub fn try_take(&mut self) -> bool {
        if self.wait.is_some() {
            self.wait = Some(self.reload_period);
            return false;
        }
        if self.count == 0 {
            // Unreachable in practice: count hitting zero always sets the wait.
            self.wait = Some(self.reload_period);
            return false;
        }
        self.count -= 1;
        if self.count == 0 {
            self.wait = Some(self.reload_period);
        }
        true
    }

    pub fn tick(&mut self, dt: f64) {
        if let Some(wait) = &mut self.wait {
            *wait -= dt;
            if *wait <= 0.0 {
                self.count = self.capacity;
                self.wait = None;
            }
        }
    }

    pub fn depleted(&self) -> bool {
        self.wait.is_some()
    }
}

/// Continuous fuel reservoir with the same depleted-waiting behavior
#[derive(Debug, Clone)]
pub struct FuelTank {
    pub amount: f64,
    pub capacity: f64,
    pub reload_period: f64,
    wait: Option<f64>,
}

impl FuelTank {
    pub fn new(capacity: f64, reload_period: f64) -> Self {
        Self {
            amount: capacity,
            capacity,
            reload_period,
            wait: None,
        }
    }

    pub fn burn(&mut self, quantity: f64) {
        if self.wait.is_some() {
            return;
        }
        self.amount -= quantity;
        if self.amount <= 0.0 {
            self.amount = 0.0;
            self.wait = Some(self.reload_period);
        }
    }

    pub fn tick(&mut self, dt: f64) {
        if let Some(wait) = &mut self.wait {
            *wait -= dt;
            if *wait <= 0.0 {
                self.amount = self.capacity;
                self.wait = None;
            }
        }
    }

    pub fn empty(&self) -> bool {
        self.amount <= 0.0
    }
}

/// Mutable aircraft state beyond the shared kinematics
#[derive(Debug, Clone)]
pub struct AircraftState {
    pub life: f64,
    pub throttle: f64,
    pub angle_of_attack: f64,
    pub angle_of_bank: f64,
    pub stalled: bool,

    pub fuel: FuelTank,
    pub bullets: Reservoir,
    pub missiles: Reservoir,
    pub flares: Reservoir,

    pub gun_cooldown: f64,
    /// Cooldown fraction set to 1.0 on launch, decaying at 1/period per second
    pub missile_cooldown: f64,
    pub flare_cooldown: f64,

    pub controls: Controls,
    pub sensor: IrSensor,
    pub username: String,
    pub tuning: AircraftTuning,
}

impl AircraftState {
    pub fn new(username: String, seeker: SeekerTuning) -> Self {
        let tuning = AircraftTuning::default();
        Self {
            life: 100.0,
            throttle: 0.5,
            angle_of_attack: 0.0,
            angle_of_bank: 0.0,
            stalled: false,
            fuel: FuelTank::new(tuning.fuel_capacity, tuning.fuel_reload_period),
            bullets: Reservoir::new(tuning.bullet_capacity, tuning.bullet_reload_period),
            missiles: Reservoir::new(tuning.missile_capacity, tuning.missile_reload_period),
            flares: Reservoir::new(tuning.flare_capacity, tuning.flare_reload_period),
            gun_cooldown: 0.0,
            missile_cooldown: 0.0,
            flare_cooldown: 0.0,
            controls: Controls::default(),
            sensor: IrSensor::new(seeker),
            username,
            tuning,
        }
    }

    /// Apply one frame of control input.
    ///
    /// Discrete keys steer bank and throttle; pulling into the bank raises
    /// angle of attack. Analog axes, when present, override the discrete
    /// channels for angle of attack and bank.
    pub fn apply_controls(&mut self, controls: &Controls, dt: f64) {
        self.controls = controls.clone();
        let roll_rate = 1.0 / self.tuning.roll_inertia;

        if controls.left {
            self.angle_of_bank = (self.angle_of_bank - roll_rate * dt).max(-1.0);
            if self.angle_of_bank < 0.0 {
                self.angle_of_attack = (self.angle_of_attack + dt).min(1.0);
            } else {
                self.angle_of_attack -= dt;
            }
        } else if controls.right {
            self.angle_of_bank = (self.angle_of_bank + roll_rate * dt).min(1.0);
            if self.angle_of_bank >= 0.0 {
                self.angle_of_attack = (self.angle_of_attack + dt).min(1.0);
            } else {
                self.angle_of_attack -= dt;
            }
        }

        if controls.up {
            self.throttle = (self.throttle + dt).min(1.0);
        } else if controls.down {
            self.throttle = (self.throttle - dt).max(0.0);
        }

        if let Some(pitch) = controls.pitch {
            self.angle_of_attack = if pitch > 0.0 { pitch } else { pitch * 0.3 };
        }
        if let Some(roll) = controls.roll {
            self.angle_of_bank = (self.angle_of_bank + roll_rate * roll * dt).clamp(-1.0, 1.0);
        }
        if let Some(thrust) = controls.thrust {
            self.throttle = thrust.clamp(0.0, 1.0);
        }
    }

    /// Per-step housekeeping independent of input: aerodynamic self-centering
    /// of angle of attack, fuel burn, cooldown and reload timers.
    pub fn pre_step(&mut self, dt: f64) {
        self.angle_of_attack -= 0.5 * self.angle_of_attack * dt;

        self.fuel.burn(self.tuning.fuel_burn_rate * self.throttle * dt);
        self.fuel.tick(dt);
        self.bullets.tick(dt);
        self.missiles.tick(dt);
        self.flares.tick(dt);

        self.gun_cooldown = (self.gun_cooldown - dt).max(0.0);
        self.flare_cooldown = (self.flare_cooldown - dt).max(0.0);
        if self.missile_cooldown > 0.0 {
            self.missile_cooldown =
                (self.missile_cooldown - dt / self.tuning.missile_cooldown_period).max(0.0);
        }
    }

    /// Two-regime lift: linear in angle of attack below stall; beyond it the
    /// magnitude is pinned at the stall value, decays with the excess, and the
    /// sign follows angle of attack (post-stall departure). Turns only develop
    /// with meaningful bank.
    pub fn lift(&mut self, v: f64) -> f64 {
        let bank_gate = if self.angle_of_bank.abs() > 0.3 { 1.0 } else { 0.0 };
        let q = (v / 200.0) * (v / 200.0);
        let aoa = self.angle_of_attack;
        let max_aoa = self.tuning.max_angle_of_attack;

        if aoa.abs() < max_aoa {
            self.stalled = false;
            q * self.tuning.lift_coefficient * aoa * self.angle_of_bank.signum() * bank_gate
        } else {
            self.stalled = true;
            q * max_aoa
                * self.tuning.lift_coefficient
                * (1.0 + (max_aoa - aoa.abs()) / max_aoa * 2.0)
                * aoa.signum()
                * self.angle_of_bank.signum()
                * bank_gate
        }
    }

    /// Parasitic drag plus induced drag growing with the square of angle of attack
    pub fn drag(&self, v: f64) -> f64 {
        self.tuning.drag_coefficient
            * v
            * v
            * (1.0 + 1.0 / self.tuning.efficiency * self.angle_of_attack.powi(2))
    }

    /// Throttle-curve thrust with a ram term, zero on empty tanks
    pub fn thrust(&self, v: f64) -> f64 {
        if self.fuel.empty() {
            return 0.0;
        }
        self.tuning.max_thrust
            * self.throttle.max(0.0).powf(self.tuning.thrust_exponent)
            * (1.0 + 0.8 * v / 360.0)
    }
}
