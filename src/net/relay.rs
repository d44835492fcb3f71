//! Relay server
//!
//! The relay holds no simulation state. It parses inbound frames only as far
//! as the protocol tag: synchronization pings are answered directly, identity
//! announcements are recorded, and everything else is forwarded verbatim to
//! every other connected peer. When a peer drops, the relay synthesizes a
//! death message for the aircraft it announced so the rest of the session
//! does not wait out the silence timeout.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::net::protocol::Envelope;
use crate::sim::EntityKind;
use crate::util::time::unix_millis;

/// One connected peer
struct Peer {
    tx: mpsc::UnboundedSender<String>,
    username: Option<String>,
    /// Aircraft uuid from the peer's data announcement
    announced: Option<Uuid>,
}

/// Shared relay state
#[derive(Clone, Default)]
pub struct RelayState {
    peers: Arc<DashMap<Uuid, Peer>>,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Queue a frame to every peer except the sender
    fn broadcast(&self, sender: Uuid, text: &str) {
        for peer in self.peers.iter() {
            if *peer.key() == sender {
                continue;
            }
            if peer.value().tx.send(text.to_owned()).is_err() {
                debug!(conn = %peer.key(), "peer channel closed during broadcast");
            }
        }
    }
}

pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

async fn health(State(state): State<RelayState>) -> String {
    format!("ok {} peers", state.peer_count())
}

/// Bind-and-serve entry point, shared by main and the integration tests
pub async fn run(listener: TcpListener, state: RelayState) -> anyhow::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!(error = %e, "failed to install SIGTERM handler"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<RelayState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: RelayState) {
    let conn = Uuid::new_v4();
    info!(conn = %conn, "peer connected");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    state.peers.insert(
        conn,
        Peer {
            tx: tx.clone(),
            username: None,
            announced: None,
        },
    );

    // The connection acknowledgment tells the peer the socket is live and it
    // may start the synchronization phase.
    if let Ok(text) = serde_json::to_string(&Envelope::Connection) {
        let _ = tx.send(text);
    }

    // Writer task: queued frames -> socket
    let writer_conn = conn;
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if let Err(e) = ws_sink.send(Message::Text(text)).await {
                debug!(conn = %writer_conn, error = %e, "send failed");
                break;
            }
        }
    });

    // Reader loop: socket -> relay
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => handle_frame(&state, conn, &text),
            Ok(Message::Binary(_)) => {
                warn!(conn = %conn, "binary frame ignored");
            }
            Ok(Message::Close(_)) => {
                info!(conn = %conn, "peer initiated close");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!(conn = %conn, error = %e, "socket error");
                break;
            }
        }
    }

    writer.abort();
    disconnect(&state, conn);
}

/// Route one inbound frame. Forwarded frames go out as the original text,
/// never re-serialized, so peers running a newer protocol still interoperate.
fn handle_frame(state: &RelayState, conn: Uuid, text: &str) {
    let envelope = match serde_json::from_str::<Envelope>(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(conn = %conn, error = %e, "unparseable frame dropped");
            return;
        }
    };

    match envelope {
        Envelope::Synchronization { time, .. } => {
            // Answer only the sender: their transmit time comes back as
            // txTime next to the relay's own clock reading.
            let reply = Envelope::Synchronization {
                time: unix_millis(),
                tx_time: Some(time),
            };
            if let (Ok(text), Some(peer)) = (serde_json::to_string(&reply), state.peers.get(&conn))
            {
                let _ = peer.tx.send(text);
            }
        }
        Envelope::Data { username, uuid } => {
            info!(conn = %conn, username = %username, uuid = %uuid, "peer announced");
            if let Some(mut peer) = state.peers.get_mut(&conn) {
                peer.username = Some(username);
                peer.announced = Some(uuid);
            }
        }
        Envelope::Update(_) | Envelope::Remove { .. } | Envelope::Death { .. } => {
            state.broadcast(conn, text);
        }
        Envelope::Connection | Envelope::Unknown => {}
    }
}

fn disconnect(state: &RelayState, conn: Uuid) {
    let Some((_, peer)) = state.peers.remove(&conn) else {
        return;
    };
    info!(conn = %conn, username = ?peer.username, "peer disconnected");

    // The departed aircraft will never send another update; tell everyone
    // now instead of letting it time out on each peer.
    if let Some(uuid) = peer.announced {
        let death = Envelope::Death {
            kind: EntityKind::Airplane,
            uuid,
        };
        if let Ok(text) = serde_json::to_string(&death) {
            state.broadcast(conn, &text);
        }
    }
}
