//! Canonical player roster and join dedup for the multiplayer server
//!
//! This module holds the single source of truth for every connected player:
//! - Player id assignment and lifecycle (join, update intake, leave)
//! - Clamping of client-reported values into legal ranges
//! - Time-windowed rejection of rapid repeat joins from the same identity
//!
//! All mutation happens under the server's state lock; nothing here touches
//! sockets or blocks.

use log::info;
use shared::protocol::StateUpdate;
use shared::{PlayerState, DUPLICATE_JOIN_WINDOW, MAP_HEIGHT, MAP_WIDTH, MAX_HEALTH};
use std::collections::HashMap;
use std::net::IpAddr;

/// Authoritative mapping of player id to state.
///
/// The registry owns the id counter: ids are handed out monotonically from 1
/// for the lifetime of the process and an id is only ever vacated by the
/// disconnect cleanup of the connection that held it.
#[derive(Debug)]
pub struct PlayerRegistry {
    players: HashMap<u32, PlayerState>,
    next_player_id: u32,
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            next_player_id: 1,
        }
    }

    /// Registers a new player at the map center with full health and
    /// returns the assigned id.
    pub fn add_player(&mut self, skin_id: u32, name: &str) -> u32 {
        let id = self.next_player_id;
        self.next_player_id += 1;

        let player = PlayerState::new(id, MAP_WIDTH / 2.0, MAP_HEIGHT / 2.0, skin_id, name);
        info!("Player {} ({}) joined at map center", id, name);
        self.players.insert(id, player);

        id
    }

    /// Removes a player from the roster. Returns true if they were present.
    pub fn remove_player(&mut self, id: u32) -> bool {
        if let Some(player) = self.players.remove(&id) {
            info!("Player {} ({}) removed from game", id, player.name);
            true
        } else {
            false
        }
    }

    /// Copies a client self-report into the authoritative state.
    ///
    /// Position is clamped to the map extents and health to
    /// `[0, MAX_HEALTH]`; a client can report its own respawn or
    /// self-tracked damage but can never leave the legal range. Combat
    /// outcomes for *other* players are only ever written by the resolver.
    pub fn apply_update(&mut self, id: u32, update: &StateUpdate) {
        if let Some(player) = self.players.get_mut(&id) {
            player.x = update.x.clamp(0.0, MAP_WIDTH);
            player.y = update.y.clamp(0.0, MAP_HEIGHT);
            player.angle = update.angle;
            player.attacking = update.attacking;
            player.last_attack_time = update.last_attack_time;
            player.health = update.health.clamp(0, MAX_HEALTH);
            player.kill_count = update.kill_count;
            player.dashing = update.dashing;
        }
    }

    /// Clones out the current roster for snapshot serialization.
    pub fn snapshot(&self) -> Vec<PlayerState> {
        self.players.values().cloned().collect()
    }

    pub fn get(&self, id: u32) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    /// Mutable access for the combat resolver, which operates on the whole
    /// map in one pass.
    pub fn players_mut(&mut self) -> &mut HashMap<u32, PlayerState> {
        &mut self.players
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

/// Time-windowed rejection of repeat joins.
///
/// A client whose connection drops tends to reconnect in a tight loop; the
/// guard keeps one accept per (address, name) per window so the roster is
/// not flooded with ghosts of the same identity.
#[derive(Debug)]
pub struct ReconnectGuard {
    window: u64,
    recent: HashMap<(IpAddr, String), u64>,
}

impl ReconnectGuard {
    pub fn new() -> Self {
        Self::with_window(DUPLICATE_JOIN_WINDOW)
    }

    pub fn with_window(window: u64) -> Self {
        Self {
            window,
            recent: HashMap::new(),
        }
    }

    /// Returns true and records the accept if this identity has not been
    /// accepted within the window; false means reject. Expired entries are
    /// pruned on every check so the table stays bounded by recent traffic.
    pub fn try_accept(&mut self, ip: IpAddr, name: &str, now: u64) -> bool {
        let window = self.window;
        self.recent
            .retain(|_, accepted_at| now.saturating_sub(*accepted_at) < window);

        let key = (ip, name.to_string());
        if self.recent.contains_key(&key) {
            return false;
        }
        self.recent.insert(key, now);
        true
    }
}

impl Default for ReconnectGuard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::MAX_HEALTH;

    fn test_ip() -> IpAddr {
        "127.0.0.1".parse().unwrap()
    }

    #[test]
    fn test_ids_assigned_from_one() {
        let mut registry = PlayerRegistry::new();
        assert_eq!(registry.add_player(1, "first"), 1);
        assert_eq!(registry.add_player(2, "second"), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_ids_not_reused_after_disconnect() {
        let mut registry = PlayerRegistry::new();
        let first = registry.add_player(1, "first");
        assert!(registry.remove_player(first));
        assert_eq!(registry.add_player(1, "second"), 2);
    }

    #[test]
    fn test_new_player_spawns_at_map_center() {
        let mut registry = PlayerRegistry::new();
        let id = registry.add_player(2, "center");
        let player = registry.get(id).unwrap();
        assert_eq!(player.x, MAP_WIDTH / 2.0);
        assert_eq!(player.y, MAP_HEIGHT / 2.0);
        assert_eq!(player.health, MAX_HEALTH);
        assert_eq!(player.skin_id, 2);
    }

    #[test]
    fn test_remove_unknown_player() {
        let mut registry = PlayerRegistry::new();
        assert!(!registry.remove_player(99));
    }

    #[test]
    fn test_update_intake_clamps_position_and_health() {
        let mut registry = PlayerRegistry::new();
        let id = registry.add_player(1, "clamped");

        let update = StateUpdate {
            x: -50.0,
            y: MAP_HEIGHT + 400.0,
            angle: 1.0,
            attacking: true,
            last_attack_time: 42,
            health: MAX_HEALTH + 500,
            kill_count: 3,
            dashing: true,
        };
        registry.apply_update(id, &update);

        let player = registry.get(id).unwrap();
        assert_eq!(player.x, 0.0);
        assert_eq!(player.y, MAP_HEIGHT);
        assert_eq!(player.health, MAX_HEALTH);
        assert_eq!(player.kill_count, 3);
        assert!(player.attacking);
        assert!(player.dashing);
        assert_eq!(player.last_attack_time, 42);
    }

    #[test]
    fn test_update_for_unknown_id_is_ignored() {
        let mut registry = PlayerRegistry::new();
        registry.apply_update(5, &StateUpdate::default());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_contains_every_player() {
        let mut registry = PlayerRegistry::new();
        registry.add_player(1, "a");
        registry.add_player(2, "b");

        let mut ids: Vec<u32> = registry.snapshot().iter().map(|p| p.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_guard_rejects_within_window() {
        let mut guard = ReconnectGuard::new();
        assert!(guard.try_accept(test_ip(), "dup", 1_000));
        assert!(!guard.try_accept(test_ip(), "dup", 2_000));
        assert!(!guard.try_accept(test_ip(), "dup", 5_999));
    }

    #[test]
    fn test_guard_accepts_after_window() {
        let mut guard = ReconnectGuard::new();
        assert!(guard.try_accept(test_ip(), "dup", 1_000));
        assert!(guard.try_accept(test_ip(), "dup", 1_000 + DUPLICATE_JOIN_WINDOW));
    }

    #[test]
    fn test_guard_distinguishes_names() {
        let mut guard = ReconnectGuard::new();
        assert!(guard.try_accept(test_ip(), "one", 1_000));
        assert!(guard.try_accept(test_ip(), "two", 1_000));
    }

    #[test]
    fn test_guard_prunes_expired_entries() {
        let mut guard = ReconnectGuard::new();
        for i in 0..100 {
            assert!(guard.try_accept(test_ip(), &format!("p{}", i), 1_000));
        }
        guard.try_accept(test_ip(), "late", 1_000 + DUPLICATE_JOIN_WINDOW);
        assert!(guard.recent.len() <= 2);
    }
}
