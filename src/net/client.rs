//! Peer-side relay connection
//!
//! A reader task parses inbound frames into protocol envelopes and pushes
//! them onto a bounded channel; the frame loop drains that channel once per
//! frame, so message handling never interleaves with integration. Sends go
//! straight out on the write half.

use std::collections::VecDeque;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::net::protocol::Envelope;
use crate::sim::clock::{delta_sample, Clock};
use crate::util::time::unix_millis;

/// Connection attempts before giving up
const CONNECT_ATTEMPTS: u32 = 10;
const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Inbound channel depth; the reader backpressures when the loop stalls
const INBOUND_CAPACITY: usize = 256;

/// Synchronization rounds run at startup
const SYNC_ROUNDS: u32 = 10;
const SYNC_ROUND_INTERVAL: Duration = Duration::from_millis(100);
const SYNC_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("relay did not accept a connection after {CONNECT_ATTEMPTS} attempts")]
    ConnectTimeout,
    #[error("socket error: {0}")]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("relay closed the connection")]
    ChannelClosed,
}

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

#[derive(Debug)]
pub struct PeerConnection {
    sink: WsSink,
    inbound: mpsc::Receiver<Envelope>,
    reader: JoinHandle<()>,
    /// Frames that arrived while waiting for something else
    pending: VecDeque<Envelope>,
}

impl PeerConnection {
    /// Dial the relay, retrying briefly, and wait for its connection
    /// acknowledgment.
    pub async fn connect(url: &str) -> Result<Self, NetError> {
        for attempt in 1..=CONNECT_ATTEMPTS {
            match connect_async(url).await {
                Ok((socket, _)) => {
                    debug!(url, attempt, "socket open, awaiting acknowledgment");
                    let (sink, stream) = socket.split();
                    let (tx, inbound) = mpsc::channel(INBOUND_CAPACITY);
                    let reader = tokio::spawn(read_frames(stream, tx));
                    let mut conn = Self {
                        sink,
                        inbound,
                        reader,
                        pending: VecDeque::new(),
                    };
                    conn.await_acknowledgment().await?;
                    info!(url, "connected to relay");
                    return Ok(conn);
                }
                Err(e) => {
                    debug!(url, attempt, error = %e, "connect attempt failed");
                    tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                }
            }
        }
        Err(NetError::ConnectTimeout)
    }

    async fn await_acknowledgment(&mut self) -> Result<(), NetError> {
        loop {
            match self.recv().await? {
                Envelope::Connection => return Ok(()),
                other => self.pending.push_back(other),
            }
        }
    }

    pub async fn send(&mut self, envelope: &Envelope) -> Result<(), NetError> {
        let text = serde_json::to_string(envelope)?;
        self.sink.send(Message::Text(text)).await?;
        Ok(())
    }

    /// Wait for the next protocol frame
    pub async fn recv(&mut self) -> Result<Envelope, NetError> {
        if let Some(envelope) = self.pending.pop_front() {
            return Ok(envelope);
        }
        self.inbound.recv().await.ok_or(NetError::ChannelClosed)
    }

    /// Everything that has already arrived, without blocking
    pub fn drain(&mut self) -> Result<Vec<Envelope>, NetError> {
        let mut frames: Vec<Envelope> = self.pending.drain(..).collect();
        loop {
            match self.inbound.try_recv() {
                Ok(envelope) => frames.push(envelope),
                Err(mpsc::error::TryRecvError::Empty) => return Ok(frames),
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    // Hand over whatever arrived before the close.
                    if frames.is_empty() {
                        return Err(NetError::ChannelClosed);
                    }
                    return Ok(frames);
                }
            }
        }
    }

    /// Run the startup clock-synchronization phase: ten round trips, spaced
    /// out, each feeding one delta sample into the clock. Non-sync frames
    /// that arrive meanwhile are buffered for the main loop.
    pub async fn synchronize_time(&mut self, clock: &mut Clock) -> Result<(), NetError> {
        for round in 0..SYNC_ROUNDS {
            let ping = Envelope::Synchronization {
                time: unix_millis(),
                tx_time: None,
            };
            self.send(&ping).await?;

            let reply = tokio::time::timeout(SYNC_REPLY_TIMEOUT, async {
                loop {
                    match self.recv().await? {
                        Envelope::Synchronization {
                            time,
                            tx_time: Some(tx_time),
                        } => return Ok::<_, NetError>((time, tx_time)),
                        other => self.pending.push_back(other),
                    }
                }
            })
            .await;

            match reply {
                Ok(Ok((server_time, tx_time))) => {
                    let sample = delta_sample(tx_time, server_time, unix_millis());
                    clock.add_delta_sample(sample);
                    debug!(round, sample, delta = clock.delta(), "sync sample");
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => warn!(round, "sync reply timed out, skipping sample"),
            }

            tokio::time::sleep(SYNC_ROUND_INTERVAL).await;
        }
        info!(delta = clock.delta(), "clock synchronized");
        Ok(())
    }
}

impl Drop for PeerConnection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Reader task: socket frames -> parsed envelopes
async fn read_frames(mut stream: WsStream, tx: mpsc::Sender<Envelope>) {
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str(&text) {
                Ok(envelope) => {
                    if tx.send(envelope).await.is_err() {
                        return;
                    }
                }
                Err(e) => warn!(error = %e, "unparseable frame dropped"),
            },
            Ok(Message::Close(_)) => {
                debug!("relay closed the socket");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "socket read error");
                return;
            }
        }
    }
}
