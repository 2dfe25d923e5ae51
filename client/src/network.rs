//! Client network session: connect with retry, a receive loop, and a
//! fixed-rate send loop over one long-lived TCP stream.

use log::{debug, error, info, warn};
use shared::protocol::{AttackEvent, JoinReply, JoinRequest, ServerMessage, StateUpdate};
use shared::{PlayerState, CONNECT_ATTEMPTS, CONNECT_RETRY_DELAY, NETWORK_UPDATE_RATE};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};

/// Why a connection could not be established. Surfaced to the UI
/// collaborator once the retries are exhausted; the game does not start.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("server rejected join: duplicate identity")]
    Duplicate,
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("server closed the connection during the handshake")]
    HandshakeClosed,
    #[error("server sent an unintelligible join reply")]
    BadReply,
}

/// Inbound traffic and lifecycle notifications, dispatched by message kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A full snapshot of every connected player's authoritative state.
    Players(Vec<PlayerState>),
    /// Someone swung; purely cosmetic for the collaborator layer.
    Attack(AttackEvent),
    /// Any line the dispatcher did not recognize.
    Message(String),
    /// Emitted exactly once when the stream dies, however it dies.
    ConnectionLost,
}

enum Outbound {
    Line(String),
    Shutdown,
}

/// A live connection to the server.
///
/// Owns three background tasks: a reader that turns inbound lines into
/// [`SessionEvent`]s, a writer that drains the outbound queue, and a send
/// loop that transmits the most recently published local state at a fixed
/// rate. Dropping the session disconnects.
pub struct Session {
    player_id: u32,
    connected: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<Outbound>,
    local: Arc<Mutex<Option<StateUpdate>>>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Session {
    /// Connects at the default send rate. Up to [`CONNECT_ATTEMPTS`] tries
    /// separated by [`CONNECT_RETRY_DELAY`] milliseconds; the last failure
    /// is returned once the attempts run out and no further retries happen.
    pub async fn connect(
        host: &str,
        port: u16,
        skin_id: u32,
        name: &str,
    ) -> Result<Self, ConnectError> {
        Self::connect_with_rate(host, port, skin_id, name, NETWORK_UPDATE_RATE).await
    }

    pub async fn connect_with_rate(
        host: &str,
        port: u16,
        skin_id: u32,
        name: &str,
        rate: u32,
    ) -> Result<Self, ConnectError> {
        let mut last_error = None;

        for attempt in 1..=CONNECT_ATTEMPTS {
            match Self::try_connect(host, port, skin_id, name, rate).await {
                Ok(session) => {
                    info!("Connected, assigned player id {}", session.player_id);
                    return Ok(session);
                }
                Err(e) => {
                    warn!("Connect attempt {}/{} failed: {}", attempt, CONNECT_ATTEMPTS, e);
                    last_error = Some(e);
                }
            }
            if attempt < CONNECT_ATTEMPTS {
                sleep(Duration::from_millis(CONNECT_RETRY_DELAY)).await;
            }
        }

        Err(last_error.unwrap_or(ConnectError::HandshakeClosed))
    }

    async fn try_connect(
        host: &str,
        port: u16,
        skin_id: u32,
        name: &str,
        rate: u32,
    ) -> Result<Self, ConnectError> {
        let stream = TcpStream::connect((host, port)).await?;
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        let hello = format!("{}\n", JoinRequest::new(skin_id, name).encode());
        write_half.write_all(hello.as_bytes()).await?;

        let mut reply = String::new();
        if reader.read_line(&mut reply).await? == 0 {
            return Err(ConnectError::HandshakeClosed);
        }
        let player_id = match JoinReply::decode(reply.trim_end()) {
            Ok(JoinReply::Assigned(id)) => id,
            Ok(JoinReply::Duplicate) => return Err(ConnectError::Duplicate),
            Err(_) => return Err(ConnectError::BadReply),
        };

        let connected = Arc::new(AtomicBool::new(true));
        let lost_reported = Arc::new(AtomicBool::new(false));
        let local = Arc::new(Mutex::new(None));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        spawn_reader(
            reader,
            events_tx.clone(),
            Arc::clone(&connected),
            Arc::clone(&lost_reported),
        );
        spawn_writer(
            write_half,
            outbound_rx,
            events_tx,
            Arc::clone(&connected),
            lost_reported,
        );
        spawn_send_loop(
            outbound_tx.clone(),
            Arc::clone(&local),
            Arc::clone(&connected),
            rate,
        );

        Ok(Session {
            player_id,
            connected,
            outbound: outbound_tx,
            local,
            events: events_rx,
        })
    }

    pub fn player_id(&self) -> u32 {
        self.player_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Publishes the local state the send loop will transmit on its next
    /// tick. The server never dictates local movement back; this is the
    /// only path by which it learns it.
    pub fn publish_state(&self, update: StateUpdate) {
        if let Ok(mut local) = self.local.lock() {
            *local = Some(update);
        }
    }

    /// Fire-and-forget swing notification, sent ahead of the next state
    /// tick.
    pub fn send_attack(&self, event: &AttackEvent) {
        if self.is_connected() {
            let _ = self.outbound.send(Outbound::Line(event.encode()));
        }
    }

    /// Waits for the next inbound event.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Non-blocking poll for render-loop consumers.
    pub fn try_event(&mut self) -> Option<SessionEvent> {
        self.events.try_recv().ok()
    }

    /// Stops the send loop and closes the stream. The receive loop unblocks
    /// on the resulting end-of-stream and reports the loss once.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.outbound.send(Outbound::Shutdown);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn classify(line: String) -> SessionEvent {
    match ServerMessage::decode(&line) {
        ServerMessage::Snapshot(players) => SessionEvent::Players(players),
        ServerMessage::Attack(event) => SessionEvent::Attack(event),
        ServerMessage::Duplicate | ServerMessage::Other(_) => SessionEvent::Message(line),
    }
}

fn report_lost(
    events: &mpsc::UnboundedSender<SessionEvent>,
    connected: &AtomicBool,
    lost_reported: &AtomicBool,
) {
    connected.store(false, Ordering::SeqCst);
    if !lost_reported.swap(true, Ordering::SeqCst) {
        let _ = events.send(SessionEvent::ConnectionLost);
    }
}

fn spawn_reader(
    reader: BufReader<OwnedReadHalf>,
    events: mpsc::UnboundedSender<SessionEvent>,
    connected: Arc<AtomicBool>,
    lost_reported: Arc<AtomicBool>,
) {
    tokio::spawn(async move {
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if events.send(classify(line)).is_err() {
                        // Consumer is gone; nobody left to notify.
                        return;
                    }
                }
                Ok(None) => {
                    debug!("Server closed the connection");
                    break;
                }
                Err(e) => {
                    error!("Read error: {}", e);
                    break;
                }
            }
        }
        report_lost(&events, &connected, &lost_reported);
    });
}

fn spawn_writer(
    mut write_half: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<SessionEvent>,
    connected: Arc<AtomicBool>,
    lost_reported: Arc<AtomicBool>,
) {
    tokio::spawn(async move {
        while let Some(item) = outbound.recv().await {
            match item {
                Outbound::Line(line) => {
                    if write_half.write_all(line.as_bytes()).await.is_err()
                        || write_half.write_all(b"\n").await.is_err()
                    {
                        report_lost(&events, &connected, &lost_reported);
                        break;
                    }
                }
                Outbound::Shutdown => {
                    let _ = write_half.shutdown().await;
                    break;
                }
            }
        }
    });
}

fn spawn_send_loop(
    outbound: mpsc::UnboundedSender<Outbound>,
    local: Arc<Mutex<Option<StateUpdate>>>,
    connected: Arc<AtomicBool>,
    rate: u32,
) {
    tokio::spawn(async move {
        let period = Duration::from_millis(1000 / rate.max(1) as u64);
        let mut ticker = interval(period);

        loop {
            ticker.tick().await;
            if !connected.load(Ordering::SeqCst) {
                break;
            }

            let line = match local.lock() {
                Ok(state) => state.as_ref().map(|update| update.encode()),
                Err(_) => None,
            };
            if let Some(line) = line {
                if outbound.send(Outbound::Line(line)).is_err() {
                    break;
                }
            }
        }
    });
}
