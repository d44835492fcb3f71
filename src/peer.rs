//! Peer runtime: the fixed-rate loop tying input, simulation and network
//! together.
//!
//! A peer is one participant in a session: it connects to the relay,
//! announces its aircraft, synchronizes its clock, then runs the frame loop
//! until the ownship dies or the relay goes away. Rendering and input are
//! behind traits so the loop runs identically under a real front end and in
//! tests.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::Config;
use crate::net::protocol::Envelope;
use crate::net::{NetError, PeerConnection};
use crate::sim::{Controls, World};
use crate::util::time::{Timer, FRAME_DURATION_MICROS, STALE_THRESHOLD_SECS};

/// Source of per-frame control samples
pub trait InputSource {
    fn sample(&mut self) -> Controls;
}

/// Consumer of the world state after each frame
pub trait FrameSink {
    fn present(&mut self, world: &World);
}

/// Hands-off input, useful for tests and observers
#[derive(Debug, Default)]
pub struct IdleInput;

impl InputSource for IdleInput {
    fn sample(&mut self) -> Controls {
        Controls::default()
    }
}

/// Discards every frame
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _world: &World) {}
}

pub struct Peer {
    pub world: World,
    conn: PeerConnection,
}

impl Peer {
    /// Connect, announce, and run the clock-synchronization phase
    pub async fn connect(config: &Config) -> Result<Self, NetError> {
        let mut conn = PeerConnection::connect(&config.relay_url).await?;
        let mut world = World::new(config.username.clone(), config.seeker);

        conn.send(&Envelope::Data {
            username: config.username.clone(),
            uuid: world.ownship,
        })
        .await?;
        conn.synchronize_time(&mut world.clock).await?;

        info!(username = %config.username, ownship = %world.ownship, "peer ready");
        Ok(Self { world, conn })
    }

    /// Run the frame loop until the ownship is destroyed or the relay
    /// connection drops.
    pub async fn run(
        &mut self,
        input: &mut impl InputSource,
        sink: &mut impl FrameSink,
    ) -> Result<(), NetError> {
        let mut interval = tokio::time::interval(Duration::from_micros(FRAME_DURATION_MICROS));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stats = Timer::new();
        let mut frames: u64 = 0;
        let mut last = self.world.clock.now();

        loop {
            interval.tick().await;

            for envelope in self.conn.drain()? {
                self.world.apply_message(&envelope);
            }

            // Wall-clock delta, capped so a stall never causes one giant step.
            let now = self.world.clock.now();
            let dt = ((now - last) / 1000.0).clamp(0.0, STALE_THRESHOLD_SECS);
            last = now;

            let controls = input.sample();
            self.world.step(dt, &controls);

            for envelope in self.world.take_outbound() {
                self.conn.send(&envelope).await?;
            }

            sink.present(&self.world);

            frames += 1;
            if frames % 600 == 0 {
                debug!(
                    frames,
                    elapsed_ms = stats.elapsed_ms(),
                    entities = self.world.registry.len(),
                    "frame stats"
                );
                stats.reset();
            }

            if !self.world.ownship_alive() {
                info!("ownship destroyed, leaving session");
                return Ok(());
            }
        }
    }
}
