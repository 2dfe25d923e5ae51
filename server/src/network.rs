//! Server network layer: TCP accept loop, per-connection tasks and
//! snapshot fan-out
//!
//! One task is spawned per accepted connection. The player roster and the
//! id-to-connection table live behind a single mutex so that registry
//! mutation, combat resolution and snapshot construction are atomic with
//! respect to every connect and disconnect. Socket writes never happen
//! inside that lock: each connection drains its own bounded outbound queue
//! on a dedicated writer task, so one slow client cannot stall the rest.

use crate::combat;
use crate::registry::{PlayerRegistry, ReconnectGuard};
use log::{debug, error, info, warn};
use shared::protocol::{encode_snapshot, ClientMessage, JoinReply, JoinRequest};
use shared::{now_ms, BROADCAST_MIN_INTERVAL};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

/// Outbound lines queued per connection before further traffic is dropped.
/// Snapshots are full-state, so anything dropped is superseded by the next
/// broadcast.
const OUTBOUND_QUEUE: usize = 64;

/// Registry plus connection table, guarded together by one mutex.
pub struct ServerState {
    pub registry: PlayerRegistry,
    connections: HashMap<u32, mpsc::Sender<String>>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            registry: PlayerRegistry::new(),
            connections: HashMap::new(),
        }
    }

    fn add_connection(&mut self, id: u32, tx: mpsc::Sender<String>) {
        self.connections.insert(id, tx);
    }

    fn remove_connection(&mut self, id: u32) {
        self.connections.remove(&id);
    }

    /// Queues a line for a single connection.
    fn send_to(&self, id: u32, line: String) {
        if let Some(tx) = self.connections.get(&id) {
            if tx.try_send(line).is_err() {
                warn!("Dropping message to player {}: outbound queue unavailable", id);
            }
        }
    }

    /// Queues a line for every connection. A full or closed queue on one
    /// connection is logged and skipped; delivery to the rest continues.
    fn broadcast_line(&self, line: &str) {
        for (id, tx) in &self.connections {
            if tx.try_send(line.to_string()).is_err() {
                warn!("Dropping broadcast to player {}: outbound queue unavailable", id);
            }
        }
    }

    /// Serializes the roster once and fans the snapshot out to everyone.
    fn broadcast_snapshot(&self) {
        let line = encode_snapshot(&self.registry.snapshot());
        self.broadcast_line(&line);
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Authoritative game server: accepts connections and spawns a handler task
/// for each.
pub struct Server {
    listener: TcpListener,
    state: Arc<Mutex<ServerState>>,
    guard: Arc<Mutex<ReconnectGuard>>,
}

impl Server {
    pub async fn bind(addr: &str) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            state: Arc::new(Mutex::new(ServerState::new())),
            guard: Arc::new(Mutex::new(ReconnectGuard::new())),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop. Runs until the listener fails.
    pub async fn run(&self) -> std::io::Result<()> {
        loop {
            let (socket, addr) = self.listener.accept().await?;
            debug!("Accepted connection from {}", addr);

            let state = Arc::clone(&self.state);
            let guard = Arc::clone(&self.guard);
            tokio::spawn(async move {
                handle_connection(state, guard, socket, addr).await;
            });
        }
    }
}

/// Drives one client connection from handshake to cleanup.
async fn handle_connection(
    state: Arc<Mutex<ServerState>>,
    guard: Arc<Mutex<ReconnectGuard>>,
    socket: TcpStream,
    addr: SocketAddr,
) {
    let (read_half, mut write_half) = socket.into_split();
    let mut lines = BufReader::new(read_half).lines();

    // Handshake: one line, or the connection is dropped.
    let join = match lines.next_line().await {
        Ok(Some(line)) => match JoinRequest::decode(&line) {
            Ok(join) => join,
            Err(e) => {
                debug!("Dropping connection from {}: bad handshake ({})", addr, e);
                return;
            }
        },
        _ => return,
    };

    // The dedup guard has its own lock and is never held together with the
    // state lock.
    {
        let mut guard = guard.lock().await;
        if !guard.try_accept(addr.ip(), &join.name, now_ms()) {
            info!("Rejecting duplicate join from {} ({})", addr, join.name);
            let reply = format!("{}\n", JoinReply::Duplicate.encode());
            let _ = write_half.write_all(reply.as_bytes()).await;
            return;
        }
    }

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);

    let writer = tokio::spawn(async move {
        while let Some(line) = outbound_rx.recv().await {
            if write_half.write_all(line.as_bytes()).await.is_err()
                || write_half.write_all(b"\n").await.is_err()
            {
                error!("Write failed, abandoning outbound queue for {}", addr);
                break;
            }
        }
    });

    // Registration is one critical section: id assignment, roster insert,
    // connection-table insert, the id reply and the join broadcast are
    // atomic relative to every other connect and disconnect.
    let player_id = {
        let mut state = state.lock().await;
        let id = state.registry.add_player(join.skin_id, &join.name);
        state.add_connection(id, outbound_tx.clone());
        state.send_to(id, JoinReply::Assigned(id).encode());
        state.broadcast_snapshot();
        id
    };
    info!("Player {} ({}) connected from {}", player_id, join.name, addr);

    let mut last_broadcast: Option<Instant> = None;

    while let Ok(Some(line)) = lines.next_line().await {
        match ClientMessage::decode(&line) {
            Ok(ClientMessage::Attack(event)) => {
                // Swing notifications fan out to everyone, sender included,
                // with no throttle.
                let state = state.lock().await;
                state.broadcast_line(&event.encode());
            }
            Ok(ClientMessage::State(update)) => {
                let mut state = state.lock().await;
                state.registry.apply_update(player_id, &update);
                combat::resolve_attacks(state.registry.players_mut(), now_ms());

                let due = last_broadcast
                    .map_or(true, |at| at.elapsed() >= Duration::from_millis(BROADCAST_MIN_INTERVAL));
                if due {
                    state.broadcast_snapshot();
                    last_broadcast = Some(Instant::now());
                }
            }
            Err(e) => {
                // A bad line is dropped; the connection stays open.
                debug!("Ignoring malformed line from player {}: {}", player_id, e);
            }
        }
    }

    // Read error or EOF: graceful disconnect. The departure is visible to
    // everyone in the very next snapshot.
    {
        let mut state = state.lock().await;
        state.registry.remove_player(player_id);
        state.remove_connection(player_id);
        state.broadcast_snapshot();
        info!(
            "Player {} disconnected, {} player(s) remaining",
            player_id,
            state.registry.len()
        );
    }

    drop(outbound_tx);
    let _ = writer.await;
}
