//! End-to-end relay behavior over real sockets: broadcast isolation,
//! synchronization replies, and synthesized deaths on disconnect.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

use furball::net::protocol::{StatePatch, UpdateMsg};
use furball::net::relay::{router, RelayState};
use furball::sim::{Controls, EntityKind, SeekerTuning, World};
use furball::{Envelope, PeerConnection};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

async fn start_relay() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(RelayState::new()))
            .await
            .unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> PeerConnection {
    PeerConnection::connect(&format!("ws://{addr}/ws"))
        .await
        .expect("peer should connect")
}

fn aircraft_update(uuid: Uuid, time: f64) -> Envelope {
    Envelope::Update(UpdateMsg {
        kind: EntityKind::Airplane,
        uuid,
        parent: None,
        time,
        state: StatePatch {
            x: Some(1.0),
            y: Some(2.0),
            v: Some(100.0),
            track: Some(0.0),
            ..StatePatch::default()
        },
        ssc: 1,
        username: Some("sender".into()),
    })
}

#[tokio::test]
async fn connect_reports_a_timeout_when_no_relay_listens() {
    // Bind then drop a listener to get a port nothing is listening on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let err = PeerConnection::connect(&format!("ws://{addr}/ws"))
        .await
        .expect_err("connect must fail without a relay");
    assert!(matches!(err, furball::net::NetError::ConnectTimeout));
}

#[tokio::test]
async fn updates_reach_everyone_except_the_sender() {
    let addr = start_relay().await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    let mut c = connect(addr).await;

    let uuid = Uuid::new_v4();
    let msg = aircraft_update(uuid, 0.0);
    a.send(&msg).await.unwrap();

    for peer in [&mut b, &mut c] {
        let received = timeout(RECV_TIMEOUT, peer.recv()).await.unwrap().unwrap();
        assert_eq!(received, msg);
    }

    // The sender must not hear its own update back.
    sleep(Duration::from_millis(200)).await;
    assert!(a.drain().unwrap().is_empty());
}

#[tokio::test]
async fn synchronization_is_answered_only_to_the_sender() {
    let addr = start_relay().await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;

    a.send(&Envelope::Synchronization {
        time: 123.5,
        tx_time: None,
    })
    .await
    .unwrap();

    let reply = timeout(RECV_TIMEOUT, a.recv()).await.unwrap().unwrap();
    let Envelope::Synchronization { time, tx_time } = reply else {
        panic!("expected a synchronization reply, got {reply:?}");
    };
    assert_eq!(tx_time, Some(123.5), "reply must echo the transmit time");
    assert!(time > 0.0, "reply must carry the relay clock");

    sleep(Duration::from_millis(200)).await;
    assert!(b.drain().unwrap().is_empty());
}

#[tokio::test]
async fn disconnect_synthesizes_a_death_for_the_announced_aircraft() {
    let addr = start_relay().await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;

    let ownship = Uuid::new_v4();
    a.send(&Envelope::Data {
        username: "casualty".into(),
        uuid: ownship,
    })
    .await
    .unwrap();

    // Give the relay a moment to record the announcement, then vanish.
    sleep(Duration::from_millis(100)).await;
    drop(a);

    let received = timeout(RECV_TIMEOUT, b.recv()).await.unwrap().unwrap();
    assert_eq!(
        received,
        Envelope::Death {
            kind: EntityKind::Airplane,
            uuid: ownship,
        }
    );
}

#[tokio::test]
async fn unannounced_disconnect_stays_silent() {
    let addr = start_relay().await;
    let a = connect(addr).await;
    let mut b = connect(addr).await;

    drop(a);
    sleep(Duration::from_millis(200)).await;
    assert!(b.drain().unwrap().is_empty());
}

#[tokio::test]
async fn relayed_updates_populate_a_remote_world() {
    let addr = start_relay().await;
    let mut sender = connect(addr).await;
    let mut receiver_conn = connect(addr).await;

    let mut sender_world = World::seeded("sender".into(), SeekerTuning::default(), 1);
    let mut receiver_world = World::seeded("receiver".into(), SeekerTuning::default(), 2);

    // One simulated frame on the sender, flushed through the relay.
    sender_world.step(1.0 / 60.0, &Controls::default());
    for envelope in sender_world.take_outbound() {
        sender.send(&envelope).await.unwrap();
    }

    let received = timeout(RECV_TIMEOUT, receiver_conn.recv())
        .await
        .unwrap()
        .unwrap();
    receiver_world.apply_message(&received);

    assert!(
        receiver_world.registry.contains(sender_world.ownship),
        "the sender's aircraft should be born on the receiving peer"
    );
    let remote = receiver_world.registry.get(sender_world.ownship).unwrap();
    assert!(!remote.owned);
    assert_eq!(remote.ssc, 1);
}
