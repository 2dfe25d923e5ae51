//! Client-side view of everyone else, reconciled from server snapshots.
//!
//! Remote players ease toward their last authoritative position each render
//! tick instead of jumping to it, which smooths the ~22 Hz update stream
//! over a 60 Hz render loop. Health and kills are discrete and apply
//! directly. The local player's own record is never allowed to move the
//! local avatar, but a drop in authoritative health is taken as damage the
//! local prediction missed.

use log::{debug, info};
use shared::protocol::StateUpdate;
use shared::{
    PlayerState, DASH_DISTANCE, DASH_TRAVEL_DELAY, INTERPOLATION_FACTOR, KNOCKBACK_DECAY,
    KNOCKBACK_DELAY, KNOCKBACK_FORCE, KNOCKBACK_MIN_SPEED, MAP_HEIGHT, MAP_WIDTH, MAX_HEALTH,
    PLAYER_SIZE, REMOTE_TIMEOUT, RESPAWN_TIME,
};
use std::collections::HashMap;

fn clamp_to_map(x: f64, y: f64) -> (f64, f64) {
    (
        x.clamp(PLAYER_SIZE / 2.0, MAP_WIDTH - PLAYER_SIZE / 2.0),
        y.clamp(PLAYER_SIZE / 2.0, MAP_HEIGHT - PLAYER_SIZE / 2.0),
    )
}

/// One remote player as displayed locally: authoritative targets plus the
/// interpolated position actually drawn.
#[derive(Debug, Clone)]
pub struct RemotePlayer {
    pub id: u32,
    pub skin_id: u32,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub attacking: bool,
    pub dashing: bool,
    pub health: i32,
    pub kill_count: u32,
    target_x: f64,
    target_y: f64,
    target_angle: f64,
    last_seen: u64,
    death_time: u64,
    knockback_vel_x: f64,
    knockback_vel_y: f64,
    knockback_start: u64,
    dash_vel_x: f64,
    dash_vel_y: f64,
    dash_start: u64,
}

impl RemotePlayer {
    fn from_record(record: &PlayerState, now: u64) -> Self {
        Self {
            id: record.id,
            skin_id: record.skin_id,
            name: record.name.clone(),
            x: record.x,
            y: record.y,
            angle: record.angle,
            attacking: record.attacking,
            dashing: false,
            health: record.health,
            kill_count: record.kill_count,
            target_x: record.x,
            target_y: record.y,
            target_angle: record.angle,
            last_seen: now,
            death_time: if record.health <= 0 { now } else { 0 },
            knockback_vel_x: 0.0,
            knockback_vel_y: 0.0,
            knockback_start: 0,
            dash_vel_x: 0.0,
            dash_vel_y: 0.0,
            dash_start: 0,
        }
    }

    fn apply_record(&mut self, record: &PlayerState, now: u64) {
        self.target_x = record.x;
        self.target_y = record.y;
        self.target_angle = record.angle;
        self.attacking = record.attacking;
        self.last_seen = now;

        // A rising dash flag arms one travel impulse along the currently
        // displayed facing; the flag clears locally once the travel lands.
        if record.dashing && !self.dashing {
            self.dashing = true;
            self.dash_start = now;
            self.dash_vel_x = self.angle.cos() * DASH_DISTANCE;
            self.dash_vel_y = self.angle.sin() * DASH_DISTANCE;
        }

        self.set_health(record.health, now);
        self.kill_count = record.kill_count;
    }

    fn set_health(&mut self, health: i32, now: u64) {
        if health == 0 && self.health > 0 {
            self.death_time = now;
        }
        self.health = health;
    }

    /// Advances knockback, dash travel and interpolation by one render tick.
    pub fn integrate(&mut self, now: u64) {
        self.apply_knockback(now);
        self.apply_dash(now);

        if !self.attacking && !self.dashing {
            self.x += (self.target_x - self.x) * INTERPOLATION_FACTOR;
            self.y += (self.target_y - self.y) * INTERPOLATION_FACTOR;
            self.angle += (self.target_angle - self.angle) * INTERPOLATION_FACTOR;
        } else {
            // Swings and dashes read badly when eased; pin them to the
            // authoritative position.
            self.x = self.target_x;
            self.y = self.target_y;
            self.angle = self.target_angle;
        }
    }

    fn apply_knockback(&mut self, now: u64) {
        if self.knockback_vel_x == 0.0 && self.knockback_vel_y == 0.0 {
            return;
        }

        // The impulse decays from the moment of the hit but only starts
        // displacing after the delay.
        if now.saturating_sub(self.knockback_start) >= KNOCKBACK_DELAY {
            let (x, y) = clamp_to_map(self.x + self.knockback_vel_x, self.y + self.knockback_vel_y);
            self.x = x;
            self.y = y;
        }

        self.knockback_vel_x *= KNOCKBACK_DECAY;
        self.knockback_vel_y *= KNOCKBACK_DECAY;
        if self.knockback_vel_x.abs() < KNOCKBACK_MIN_SPEED {
            self.knockback_vel_x = 0.0;
        }
        if self.knockback_vel_y.abs() < KNOCKBACK_MIN_SPEED {
            self.knockback_vel_y = 0.0;
        }
    }

    fn apply_dash(&mut self, now: u64) {
        if self.dashing && now.saturating_sub(self.dash_start) >= DASH_TRAVEL_DELAY {
            let (x, y) = clamp_to_map(self.x + self.dash_vel_x, self.y + self.dash_vel_y);
            self.x = x;
            self.y = y;
            self.dashing = false;
            self.dash_vel_x = 0.0;
            self.dash_vel_y = 0.0;
        }
    }

    pub fn apply_knockback_from(&mut self, attacker_x: f64, attacker_y: f64, force: f64, now: u64) {
        let toward = (attacker_y - self.y).atan2(attacker_x - self.x);
        self.knockback_vel_x = -toward.cos() * force;
        self.knockback_vel_y = -toward.sin() * force;
        self.knockback_start = now;
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    pub fn is_timed_out(&self, now: u64) -> bool {
        now.saturating_sub(self.last_seen) > REMOTE_TIMEOUT
    }

    /// Milliseconds until this player respawns, while dead.
    pub fn respawn_remaining(&self, now: u64) -> Option<u64> {
        if !self.is_dead() {
            return None;
        }
        let since_death = now.saturating_sub(self.death_time);
        (since_death < RESPAWN_TIME).then(|| RESPAWN_TIME - since_death)
    }
}

/// The combat-relevant mirror of the locally predicted player.
///
/// Movement and aim are written by the input/render collaborator; health,
/// kills and knockback are reconciled here against the server.
#[derive(Debug, Clone)]
pub struct LocalPlayer {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub attacking: bool,
    pub dashing: bool,
    pub last_attack_time: u64,
    pub health: i32,
    pub kill_count: u32,
    pub skin_id: u32,
    pub name: String,
    death_time: u64,
    knockback_vel_x: f64,
    knockback_vel_y: f64,
    knockback_start: u64,
}

impl LocalPlayer {
    pub fn new(skin_id: u32, name: &str) -> Self {
        Self {
            x: MAP_WIDTH / 2.0,
            y: MAP_HEIGHT / 2.0,
            angle: 0.0,
            attacking: false,
            dashing: false,
            last_attack_time: 0,
            health: MAX_HEALTH,
            kill_count: 0,
            skin_id,
            name: name.to_string(),
            death_time: 0,
            knockback_vel_x: 0.0,
            knockback_vel_y: 0.0,
            knockback_start: 0,
        }
    }

    pub fn take_damage(&mut self, amount: i32, now: u64) {
        let was_alive = self.health > 0;
        self.health = (self.health - amount).max(0);
        if was_alive && self.health == 0 {
            self.death_time = now;
            info!("Local player died");
        }
    }

    pub fn add_kill(&mut self) {
        self.kill_count += 1;
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0
    }

    /// Revives at the map center once the respawn delay has passed.
    /// Returns true on the tick the revival happens.
    pub fn try_respawn(&mut self, now: u64) -> bool {
        if self.is_dead() && now.saturating_sub(self.death_time) >= RESPAWN_TIME {
            self.health = MAX_HEALTH;
            self.death_time = 0;
            self.x = MAP_WIDTH / 2.0;
            self.y = MAP_HEIGHT / 2.0;
            true
        } else {
            false
        }
    }

    pub fn apply_knockback_from(&mut self, attacker_x: f64, attacker_y: f64, force: f64, now: u64) {
        let toward = (attacker_y - self.y).atan2(attacker_x - self.x);
        self.knockback_vel_x = -toward.cos() * force;
        self.knockback_vel_y = -toward.sin() * force;
        self.knockback_start = now;
    }

    /// Advances the knockback impulse by one render tick.
    pub fn integrate(&mut self, now: u64) {
        if self.knockback_vel_x == 0.0 && self.knockback_vel_y == 0.0 {
            return;
        }

        if now.saturating_sub(self.knockback_start) >= KNOCKBACK_DELAY {
            let (x, y) = clamp_to_map(self.x + self.knockback_vel_x, self.y + self.knockback_vel_y);
            self.x = x;
            self.y = y;
        }

        self.knockback_vel_x *= KNOCKBACK_DECAY;
        self.knockback_vel_y *= KNOCKBACK_DECAY;
        if self.knockback_vel_x.abs() < KNOCKBACK_MIN_SPEED {
            self.knockback_vel_x = 0.0;
        }
        if self.knockback_vel_y.abs() < KNOCKBACK_MIN_SPEED {
            self.knockback_vel_y = 0.0;
        }
    }

    /// Projects the state the send loop transmits.
    pub fn as_update(&self) -> StateUpdate {
        StateUpdate {
            x: self.x,
            y: self.y,
            angle: self.angle,
            attacking: self.attacking,
            last_attack_time: self.last_attack_time,
            health: self.health,
            kill_count: self.kill_count,
            dashing: self.dashing,
        }
    }
}

/// Every remote player currently known, keyed by id.
#[derive(Debug, Default)]
pub struct RemoteWorld {
    remotes: HashMap<u32, RemotePlayer>,
}

impl RemoteWorld {
    pub fn new() -> Self {
        Self {
            remotes: HashMap::new(),
        }
    }

    /// Applies one authoritative snapshot.
    ///
    /// Remote records update or create views; ids absent from the snapshot
    /// are removed at once. The local record is reconciled instead: health
    /// drops become local damage with knockback from the nearest attacker,
    /// and an authoritative kill count ahead of the local one registers a
    /// kill credit.
    pub fn apply_snapshot(
        &mut self,
        records: &[PlayerState],
        local_id: u32,
        local: &mut LocalPlayer,
        now: u64,
    ) {
        for record in records {
            if record.id == local_id {
                self.reconcile_local(record, local, now);
                continue;
            }

            match self.remotes.get_mut(&record.id) {
                Some(remote) => remote.apply_record(record, now),
                None => {
                    debug!("Tracking new remote player {} ({})", record.id, record.name);
                    self.remotes
                        .insert(record.id, RemotePlayer::from_record(record, now));
                }
            }
        }

        self.remotes
            .retain(|id, _| records.iter().any(|record| record.id == *id));
    }

    fn reconcile_local(&self, record: &PlayerState, local: &mut LocalPlayer, now: u64) {
        let old_health = local.health;
        if record.health < old_health {
            local.take_damage(old_health - record.health, now);
            if let Some((attacker_x, attacker_y)) = self.closest_attacker(local.x, local.y) {
                local.apply_knockback_from(attacker_x, attacker_y, KNOCKBACK_FORCE, now);
            }
        }
        if record.kill_count > local.kill_count {
            local.add_kill();
        }
    }

    /// Position of the nearest remote currently mid-swing.
    pub fn closest_attacker(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        self.remotes
            .values()
            .filter(|remote| remote.attacking)
            .min_by(|a, b| {
                let da = (a.x - x).powi(2) + (a.y - y).powi(2);
                let db = (b.x - x).powi(2) + (b.y - y).powi(2);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|remote| (remote.x, remote.y))
    }

    /// One render tick: integrate every view, then drop the stale ones.
    /// Staleness eviction runs regardless of snapshot arrival, so a dead
    /// connection cannot leave ghosts behind.
    pub fn tick(&mut self, now: u64) {
        for remote in self.remotes.values_mut() {
            remote.integrate(now);
        }
        self.remotes.retain(|_, remote| !remote.is_timed_out(now));
    }

    pub fn players(&self) -> impl Iterator<Item = &RemotePlayer> {
        self.remotes.values()
    }

    pub fn get(&self, id: u32) -> Option<&RemotePlayer> {
        self.remotes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.remotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remotes.is_empty()
    }
}
