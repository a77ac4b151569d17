//! Player movement inside the arena.
//!
//! None of the active phases score on positions, but every State message
//! still carries them, so the step keeps running each tick.

use shared::math::mix;
use shared::{Player, Vector2, ARENA_MAX, ARENA_MIN, PLAYER_ACCEL_HALFLIFE, PLAYER_RADIUS, PLAYER_SPEED};

///Advances every player by `elapsed` seconds, then resolves collisions.
/// Press counters are cleared once the controls have been consumed.
pub fn step(players: &mut [Player], elapsed: f32) {
    for player in players.iter_mut() {
        steer(player, elapsed);
        player.position += player.velocity * elapsed;
        player.controls.reset_downs();
    }

    // One player at a time: earlier players first, then the walls.
    for i in 0..players.len() {
        resolve_player_collisions(players, i);
        resolve_arena_collision(&mut players[i]);
    }
}

///Direction requested by the held movement buttons, not normalized.
fn input_direction(player: &Player) -> Vector2 {
    let controls = &player.controls;
    let mut dir = Vector2::ZERO;
    if controls.left.pressed {
        dir.x -= 1.0;
    }
    if controls.right.pressed {
        dir.x += 1.0;
    }
    if controls.down.pressed {
        dir.y -= 1.0;
    }
    if controls.up.pressed {
        dir.y += 1.0;
    }
    dir
}

fn steer(player: &mut Player, elapsed: f32) {
    let dir = input_direction(player);

    if dir == Vector2::ZERO {
        // Drift to a stop.
        let amt = 1.0 - 0.5f32.powf(elapsed / (PLAYER_ACCEL_HALFLIFE * 2.0));
        player.velocity = player.velocity * (1.0 - amt);
        return;
    }

    let dir = dir.normalize();
    let amt = 1.0 - 0.5f32.powf(elapsed / PLAYER_ACCEL_HALFLIFE);

    let mut along = player.velocity.dot(&dir);
    if along < PLAYER_SPEED {
        along = mix(along, PLAYER_SPEED, amt);
    }

    let side = dir.perpendicular();
    let perp = mix(player.velocity.dot(&side), 0.0, amt);

    player.velocity = dir * along + side * perp;
}

///Resolves player `i` against every player before it in the list.
fn resolve_player_collisions(players: &mut [Player], i: usize) {
    let min_dist = 2.0 * PLAYER_RADIUS;
    for j in 0..i {
        let offset = players[i].position - players[j].position;
        let len2 = offset.length_squared();
        if len2 > min_dist * min_dist || len2 == 0.0 {
            continue;
        }
        let dir = offset * (1.0 / len2.sqrt());
        // Mirror the relative velocity so the pair separates.
        let relative = players[i].velocity - players[j].velocity;
        let delta = dir * (-1.75 * dir.dot(&relative)).max(0.0);
        players[i].velocity += delta * 0.5;
        players[j].velocity -= delta * 0.5;
    }
}

fn resolve_arena_collision(player: &mut Player) {
    if player.position.x < ARENA_MIN.x + PLAYER_RADIUS {
        player.position.x = ARENA_MIN.x + PLAYER_RADIUS;
        player.velocity.x = player.velocity.x.abs();
    }
    if player.position.x > ARENA_MAX.x - PLAYER_RADIUS {
        player.position.x = ARENA_MAX.x - PLAYER_RADIUS;
        player.velocity.x = -player.velocity.x.abs();
    }
    if player.position.y < ARENA_MIN.y + PLAYER_RADIUS {
        player.position.y = ARENA_MIN.y + PLAYER_RADIUS;
        player.velocity.y = player.velocity.y.abs();
    }
    if player.position.y > ARENA_MAX.y - PLAYER_RADIUS {
        player.position.y = ARENA_MAX.y - PLAYER_RADIUS;
        player.velocity.y = -player.velocity.y.abs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::PlayerId;

    fn player_at(id: u32, x: f32, y: f32) -> Player {
        let mut player = Player::new(PlayerId(id), format!("Player {}", id));
        player.position = Vector2::new(x, y);
        player
    }

    #[test]
    fn test_idle_player_drifts_to_stop() {
        let mut players = vec![player_at(1, 0.0, 0.0)];
        players[0].velocity = Vector2::new(1.0, 0.0);

        // One full drift half-life.
        step(&mut players, PLAYER_ACCEL_HALFLIFE * 2.0);
        assert_approx_eq!(players[0].velocity.x, 0.5, 1e-5);
        assert!(players[0].position.x > 0.0);
    }

    #[test]
    fn test_held_direction_accelerates_toward_speed() {
        let mut players = vec![player_at(1, 0.0, 0.0)];
        players[0].controls.right.pressed = true;

        step(&mut players, PLAYER_ACCEL_HALFLIFE);
        assert_approx_eq!(players[0].velocity.x, PLAYER_SPEED / 2.0, 1e-5);
        assert_approx_eq!(players[0].velocity.y, 0.0, 1e-6);

        for _ in 0..200 {
            step(&mut players, 1.0 / 30.0);
        }
        assert!(players[0].velocity.x <= PLAYER_SPEED + 1e-4);
    }

    #[test]
    fn test_perpendicular_velocity_is_damped() {
        let mut players = vec![player_at(1, 0.0, 0.0)];
        players[0].velocity = Vector2::new(0.0, 1.0);
        players[0].controls.right.pressed = true;

        step(&mut players, PLAYER_ACCEL_HALFLIFE);
        assert_approx_eq!(players[0].velocity.y, 0.5, 1e-5);
    }

    #[test]
    fn test_step_clears_downs() {
        let mut players = vec![player_at(1, 0.0, 0.0)];
        players[0].controls.jump.downs = 4;
        players[0].controls.left.downs = 1;
        players[0].controls.left.pressed = true;

        step(&mut players, 1.0 / 30.0);
        assert_eq!(players[0].controls.jump.downs, 0);
        assert_eq!(players[0].controls.left.downs, 0);
        assert!(players[0].controls.left.pressed);
    }

    #[test]
    fn test_arena_walls_clamp_and_reflect() {
        let mut players = vec![player_at(1, ARENA_MAX.x + 0.5, ARENA_MIN.y - 0.5)];
        players[0].velocity = Vector2::new(1.0, -1.0);

        step(&mut players, 0.0);
        assert_approx_eq!(players[0].position.x, ARENA_MAX.x - PLAYER_RADIUS);
        assert_approx_eq!(players[0].position.y, ARENA_MIN.y + PLAYER_RADIUS);
        assert!(players[0].velocity.x < 0.0);
        assert!(players[0].velocity.y > 0.0);
    }

    #[test]
    fn test_approaching_players_bounce_apart() {
        let mut players = vec![player_at(1, 0.0, 0.0), player_at(2, 0.1, 0.0)];
        players[0].velocity = Vector2::new(1.0, 0.0);
        players[1].velocity = Vector2::new(-1.0, 0.0);

        step(&mut players, 0.0);
        assert!(players[0].velocity.x < 0.0);
        assert!(players[1].velocity.x > 0.0);
    }

    #[test]
    fn test_wall_bounce_feeds_later_collisions() {
        let edge = ARENA_MAX.x - PLAYER_RADIUS;
        let mut players = vec![player_at(1, ARENA_MAX.x + 0.5, 0.0), player_at(2, edge - 0.1, 0.0)];
        players[0].velocity = Vector2::new(1.0, 0.0);

        step(&mut players, 0.0);
        // The first player is clamped and reflected before the second checks it.
        assert_approx_eq!(players[0].position.x, edge);
        assert_approx_eq!(players[0].velocity.x, -0.125, 1e-5);
        assert_approx_eq!(players[1].velocity.x, -0.875, 1e-5);
    }

    #[test]
    fn test_coincident_players_are_left_alone() {
        let mut players = vec![player_at(1, 0.0, 0.0), player_at(2, 0.0, 0.0)];
        players[0].velocity = Vector2::new(1.0, 0.0);

        step(&mut players, 0.0);
        assert_eq!(players[0].velocity, Vector2::new(1.0, 0.0));
        assert_eq!(players[1].velocity, Vector2::ZERO);
    }
}
