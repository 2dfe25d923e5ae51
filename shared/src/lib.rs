use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub mod protocol;

pub const MAP_WIDTH: f64 = 1200.0;
pub const MAP_HEIGHT: f64 = 700.0;
pub const PLAYER_SIZE: f64 = 96.0;

pub const MAX_HEALTH: i32 = 150;
pub const ATTACK_DAMAGE: i32 = 3;
/// Milliseconds a swing stays live after its start timestamp.
pub const ATTACK_COOLDOWN: u64 = 1000;
pub const ATTACK_RANGE: f64 = 90.0;
pub const KNOCKBACK_FORCE: f64 = 15.0;

pub const DASH_DISTANCE: f64 = 90.0;
pub const DASH_COOLDOWN: u64 = 7000;
pub const RESPAWN_TIME: u64 = 10000;

pub const SERVER_PORT: u16 = 7777;
pub const PROTOCOL_VERSION: u32 = 1;
/// Client state transmissions per second.
pub const NETWORK_UPDATE_RATE: u32 = 22;
/// Minimum milliseconds between snapshot broadcasts triggered by one connection.
pub const BROADCAST_MIN_INTERVAL: u64 = 50;
/// Window in which a repeat join from the same (address, name) is rejected.
pub const DUPLICATE_JOIN_WINDOW: u64 = 5000;
/// A remote player unseen for this long is dropped from the client's view.
pub const REMOTE_TIMEOUT: u64 = 10000;

/// Per-render-tick easing factor toward the last authoritative position.
pub const INTERPOLATION_FACTOR: f64 = 0.15;
pub const KNOCKBACK_DELAY: u64 = 100;
pub const KNOCKBACK_DECAY: f64 = 0.7;
pub const KNOCKBACK_MIN_SPEED: f64 = 0.1;
pub const DASH_TRAVEL_DELAY: u64 = 150;

pub const CONNECT_ATTEMPTS: u32 = 3;
pub const CONNECT_RETRY_DELAY: u64 = 2000;

/// Authoritative per-player state as held by the server registry and
/// mirrored to clients in snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub id: u32,
    pub skin_id: u32,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub attacking: bool,
    /// Epoch milliseconds of the most recent attack initiation.
    pub last_attack_time: u64,
    pub name: String,
    pub health: i32,
    pub kill_count: u32,
    pub dashing: bool,
}

impl PlayerState {
    pub fn new(id: u32, x: f64, y: f64, skin_id: u32, name: &str) -> Self {
        Self {
            id,
            skin_id,
            x,
            y,
            angle: 0.0,
            attacking: false,
            last_attack_time: 0,
            name: name.to_string(),
            health: MAX_HEALTH,
            kill_count: 0,
            dashing: false,
        }
    }

    /// Applies damage, flooring health at zero.
    pub fn apply_damage(&mut self, amount: i32) {
        self.health = (self.health - amount).max(0);
    }

    pub fn is_alive(&self) -> bool {
        self.health > 0
    }
}

// Get current timestamp in milliseconds
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
