//! Authoritative hit resolution, run under the registry lock after every
//! applied state update.

use log::debug;
use shared::{PlayerState, ATTACK_COOLDOWN, ATTACK_DAMAGE, ATTACK_RANGE, MAX_HEALTH, PLAYER_SIZE};
use std::collections::HashMap;

/// Resolves every live swing against the current roster.
///
/// Each player flagged as attacking whose swing started within
/// `ATTACK_COOLDOWN` projects a hit point `ATTACK_RANGE` along their facing
/// angle; every other living player within `PLAYER_SIZE` of that point takes
/// `ATTACK_DAMAGE`. A target dropping to zero health counts as a kill, and a
/// kill restores the attacker to full health in the same pass.
///
/// The scan covers all attackers on every call, so one inbound update can
/// resolve damage between an unrelated pair already in range, and a single
/// swing can connect with several targets at once.
pub fn resolve_attacks(players: &mut HashMap<u32, PlayerState>, now: u64) {
    let attacker_ids: Vec<u32> = players.keys().copied().collect();

    for attacker_id in attacker_ids {
        let (hit_x, hit_y) = match players.get(&attacker_id) {
            Some(attacker)
                if attacker.attacking
                    && now.saturating_sub(attacker.last_attack_time) < ATTACK_COOLDOWN =>
            {
                (
                    attacker.x + attacker.angle.cos() * ATTACK_RANGE,
                    attacker.y + attacker.angle.sin() * ATTACK_RANGE,
                )
            }
            _ => continue,
        };

        let mut kills = 0;
        for (&target_id, target) in players.iter_mut() {
            if target_id == attacker_id || !target.is_alive() {
                continue;
            }

            let distance = ((hit_x - target.x).powi(2) + (hit_y - target.y).powi(2)).sqrt();
            if distance < PLAYER_SIZE {
                target.apply_damage(ATTACK_DAMAGE);
                if !target.is_alive() {
                    kills += 1;
                    debug!("Player {} killed player {}", attacker_id, target_id);
                }
            }
        }

        // A kill both scores and fully restores the killer.
        if kills > 0 {
            if let Some(attacker) = players.get_mut(&attacker_id) {
                attacker.kill_count += kills;
                attacker.health = MAX_HEALTH;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(players: Vec<PlayerState>) -> HashMap<u32, PlayerState> {
        players.into_iter().map(|p| (p.id, p)).collect()
    }

    fn attacker_at(id: u32, x: f64, y: f64, angle: f64, now: u64) -> PlayerState {
        let mut player = PlayerState::new(id, x, y, 1, &format!("p{}", id));
        player.angle = angle;
        player.attacking = true;
        player.last_attack_time = now;
        player
    }

    #[test]
    fn test_swing_in_range_applies_damage() {
        let now = 10_000;
        let mut players = roster(vec![
            attacker_at(1, 100.0, 100.0, 0.0, now),
            PlayerState::new(2, 190.0, 100.0, 1, "target"),
        ]);

        resolve_attacks(&mut players, now);

        assert_eq!(players[&2].health, MAX_HEALTH - ATTACK_DAMAGE);
        assert_eq!(players[&1].kill_count, 0);
    }

    #[test]
    fn test_swing_misses_outside_player_size() {
        let now = 10_000;
        let mut players = roster(vec![
            attacker_at(1, 100.0, 100.0, 0.0, now),
            // Hit point lands at (190, 100); this target sits exactly
            // PLAYER_SIZE away and the check is strict.
            PlayerState::new(2, 190.0 + PLAYER_SIZE, 100.0, 1, "far"),
        ]);

        resolve_attacks(&mut players, now);

        assert_eq!(players[&2].health, MAX_HEALTH);
    }

    #[test]
    fn test_expired_swing_does_nothing() {
        let now = 10_000;
        let mut players = roster(vec![
            attacker_at(1, 100.0, 100.0, 0.0, now - ATTACK_COOLDOWN),
            PlayerState::new(2, 190.0, 100.0, 1, "target"),
        ]);

        resolve_attacks(&mut players, now);

        assert_eq!(players[&2].health, MAX_HEALTH);
    }

    #[test]
    fn test_idle_player_does_not_hit() {
        let now = 10_000;
        let mut idle = attacker_at(1, 100.0, 100.0, 0.0, now);
        idle.attacking = false;
        let mut players = roster(vec![idle, PlayerState::new(2, 190.0, 100.0, 1, "target")]);

        resolve_attacks(&mut players, now);

        assert_eq!(players[&2].health, MAX_HEALTH);
    }

    #[test]
    fn test_dead_target_is_skipped() {
        let now = 10_000;
        let mut corpse = PlayerState::new(2, 190.0, 100.0, 1, "corpse");
        corpse.health = 0;
        let mut players = roster(vec![attacker_at(1, 100.0, 100.0, 0.0, now), corpse]);

        resolve_attacks(&mut players, now);

        assert_eq!(players[&2].health, 0);
        assert_eq!(players[&1].kill_count, 0);
        assert_eq!(players[&1].health, MAX_HEALTH);
    }

    #[test]
    fn test_kill_scores_and_restores_damaged_attacker() {
        let now = 10_000;
        let mut attacker = attacker_at(1, 100.0, 100.0, 0.0, now);
        attacker.health = 10;
        let mut target = PlayerState::new(2, 190.0, 100.0, 1, "target");
        target.health = ATTACK_DAMAGE;
        let mut players = roster(vec![attacker, target]);

        resolve_attacks(&mut players, now);

        assert_eq!(players[&2].health, 0);
        assert_eq!(players[&1].kill_count, 1);
        assert_eq!(players[&1].health, MAX_HEALTH);
    }

    #[test]
    fn test_one_swing_hits_every_target_in_range() {
        let now = 10_000;
        let mut players = roster(vec![
            attacker_at(1, 100.0, 100.0, 0.0, now),
            PlayerState::new(2, 190.0, 100.0, 1, "front"),
            PlayerState::new(3, 190.0, 140.0, 1, "flank"),
            PlayerState::new(4, 600.0, 600.0, 1, "safe"),
        ]);

        resolve_attacks(&mut players, now);

        assert_eq!(players[&2].health, MAX_HEALTH - ATTACK_DAMAGE);
        assert_eq!(players[&3].health, MAX_HEALTH - ATTACK_DAMAGE);
        assert_eq!(players[&4].health, MAX_HEALTH);
    }

    #[test]
    fn test_double_kill_counts_both() {
        let now = 10_000;
        let mut first = PlayerState::new(2, 190.0, 100.0, 1, "first");
        first.health = 1;
        let mut second = PlayerState::new(3, 190.0, 130.0, 1, "second");
        second.health = 2;
        let mut players = roster(vec![attacker_at(1, 100.0, 100.0, 0.0, now), first, second]);

        resolve_attacks(&mut players, now);

        assert_eq!(players[&1].kill_count, 2);
        assert_eq!(players[&1].health, MAX_HEALTH);
    }

    #[test]
    fn test_every_live_swing_resolves_each_pass() {
        // Two attackers facing each other both land damage in one call,
        // regardless of whose update triggered the resolution.
        let now = 10_000;
        let mut players = roster(vec![
            attacker_at(1, 100.0, 100.0, 0.0, now),
            attacker_at(2, 190.0, 100.0, std::f64::consts::PI, now),
        ]);

        resolve_attacks(&mut players, now);

        assert_eq!(players[&1].health, MAX_HEALTH - ATTACK_DAMAGE);
        assert_eq!(players[&2].health, MAX_HEALTH - ATTACK_DAMAGE);
    }

    #[test]
    fn test_dead_attacker_still_lands_live_swing() {
        let now = 10_000;
        let mut ghost = attacker_at(1, 100.0, 100.0, 0.0, now);
        ghost.health = 0;
        let mut players = roster(vec![ghost, PlayerState::new(2, 190.0, 100.0, 1, "target")]);

        resolve_attacks(&mut players, now);

        assert_eq!(players[&2].health, MAX_HEALTH - ATTACK_DAMAGE);
    }

    #[test]
    fn test_health_never_leaves_range_under_repeated_resolution() {
        let now = 10_000;
        let mut players = roster(vec![
            attacker_at(1, 100.0, 100.0, 0.0, now),
            PlayerState::new(2, 190.0, 100.0, 1, "target"),
        ]);

        for _ in 0..200 {
            resolve_attacks(&mut players, now);
            for player in players.values() {
                assert!(player.health >= 0);
                assert!(player.health <= MAX_HEALTH);
            }
        }
        assert_eq!(players[&2].health, 0);
        assert_eq!(players[&1].kill_count, 1);
    }
}
