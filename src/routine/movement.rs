use crate::constants::MOVE_SPEED;

use super::{BotContext, RoutineError};

/// Must not be called with the zero vector; callers short-circuit on equal
/// positions before normalizing.
pub fn normalize(dx: f64, dy: f64) -> (f64, f64) {
    let dist = (dx * dx + dy * dy).sqrt();
    (dx / dist, dy / dist)
}

/// One interpolation step: walk `step` units along `dir` while the target
/// is at least that far away, otherwise snap exactly onto it. Never
/// overshoots, and the remaining distance strictly decreases whenever
/// `step` is positive.
pub fn advance(
    ax: f64,
    ay: f64,
    bx: f64,
    by: f64,
    dir: (f64, f64),
    step: f64,
) -> (f64, f64, bool) {
    let (rx, ry) = (bx - ax, by - ay);
    let remaining = (rx * rx + ry * ry).sqrt();
    if remaining >= step {
        (ax + dir.0 * step, ay + dir.1 * step, false)
    } else {
        (bx, by, true)
    }
}

impl BotContext {
    /// Walks the controlled actor to the target at constant speed, one
    /// registry write per scheduling tick. Facing is computed once from
    /// the initial direction and held for the whole traversal; every
    /// intermediate write carries `moving = true` and the final snap onto
    /// the target carries `moving = false`. Float positions live in locals
    /// across ticks; the registry only ever sees rounded integers.
    pub async fn go_to(&self, bx: f64, by: f64) -> Result<(), RoutineError> {
        let me = self.me().await?;
        let (mut ax, mut ay) = (f64::from(me.x), f64::from(me.y));
        if ax == bx && ay == by {
            return Ok(());
        }

        let dir = normalize(bx - ax, by - ay);
        let angle = dir.1.atan2(dir.0);

        let mut last = self.time().await;
        loop {
            self.next_tick().await;
            let mut registry = self.registry().lock().await;
            let now = registry.time();
            let step = MOVE_SPEED * (now - last);
            last = now;

            let (nx, ny, arrived) = advance(ax, ay, bx, by, dir, step);
            ax = nx;
            ay = ny;
            registry.update_player(self.pid(), ax, ay, angle, !arrived);
            if arrived {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::routine::SharedRegistry;
    use crate::types::Outbound;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{mpsc, Mutex};
    use tokio::time::{advance as advance_time, timeout};

    fn context_with_player(x: f64, y: f64) -> (BotContext, mpsc::Receiver<Outbound>) {
        let mut registry = Registry::new();
        registry.add_player(1, "A");
        registry.update_player(1, x, y, 0.0, false);
        let shared: SharedRegistry = Arc::new(Mutex::new(registry));
        let (tx, rx) = mpsc::channel(16);
        (BotContext::new(shared, tx, 1), rx)
    }

    #[test]
    fn normalize_yields_unit_vectors() {
        let (dx, dy) = normalize(3.0, 4.0);
        assert!((dx - 0.6).abs() < 1e-12);
        assert!((dy - 0.8).abs() < 1e-12);
    }

    #[test]
    fn advance_strictly_decreases_distance_until_exact_snap() {
        let (bx, by) = (1_000.0, -500.0);
        let (mut ax, mut ay) = (0.0, 0.0);
        let dir = normalize(bx - ax, by - ay);

        let mut remaining = (bx * bx + by * by).sqrt();
        let mut steps = 0;
        loop {
            let (nx, ny, arrived) = advance(ax, ay, bx, by, dir, 137.5);
            ax = nx;
            ay = ny;
            let now_remaining = ((bx - ax).powi(2) + (by - ay).powi(2)).sqrt();
            assert!(now_remaining < remaining, "distance must shrink every step");
            remaining = now_remaining;
            steps += 1;
            if arrived {
                break;
            }
            assert!(steps < 100, "interpolation must terminate");
        }

        // Exact snap, no float drift.
        assert_eq!((ax, ay), (bx, by));
        assert_eq!(remaining, 0.0);
    }

    #[test]
    fn advance_with_zero_step_holds_position() {
        let dir = normalize(1.0, 0.0);
        let (nx, ny, arrived) = advance(10.0, 0.0, 500.0, 0.0, dir, 0.0);
        assert_eq!((nx, ny), (10.0, 0.0));
        assert!(!arrived);
    }

    #[tokio::test(start_paused = true)]
    async fn go_to_ends_exactly_on_target_with_moving_cleared() {
        let (ctx, _rx) = context_with_player(0.0, 0.0);
        timeout(Duration::from_secs(30), ctx.go_to(1_000.0, 0.0))
            .await
            .expect("go_to must finish")
            .expect("actor present");

        let registry = ctx.registry().lock().await;
        let me = registry.player(1).expect("player present");
        assert_eq!((me.x, me.y), (1_000, 0));
        assert!(!me.moving);
        assert_eq!(me.angle, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn go_to_marks_moving_during_the_traversal() {
        let (ctx, _rx) = context_with_player(0.0, 0.0);
        let walker = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.go_to(0.0, 100_000.0).await })
        };

        // 12_500 units/s: after ~1s the actor is mid-flight.
        advance_time(Duration::from_secs(1)).await;
        {
            let registry = ctx.registry().lock().await;
            let me = registry.player(1).expect("player present");
            assert!(me.moving);
            assert!(me.y > 0 && me.y < 100_000);
            let expected_angle = std::f64::consts::FRAC_PI_2;
            assert!((me.angle - expected_angle).abs() < 1e-9);
        }

        timeout(Duration::from_secs(60), walker)
            .await
            .expect("go_to must finish")
            .expect("walker must not panic")
            .expect("actor present");
        let registry = ctx.registry().lock().await;
        let me = registry.player(1).expect("player present");
        assert_eq!((me.x, me.y), (0, 100_000));
        assert!(!me.moving);
    }

    #[tokio::test(start_paused = true)]
    async fn go_to_with_equal_positions_returns_without_writing() {
        let (ctx, _rx) = context_with_player(25.0, -25.0);
        {
            // Plant a sentinel angle; an emitted update would overwrite it.
            let mut registry = ctx.registry().lock().await;
            registry.face_player(1, 9.9);
        }
        ctx.go_to(25.0, -25.0).await.expect("actor present");

        let registry = ctx.registry().lock().await;
        let me = registry.player(1).expect("player present");
        assert_eq!(me.angle, 9.9);
        assert!(!me.moving);
    }

    #[tokio::test(start_paused = true)]
    async fn removing_the_actor_mid_flight_does_not_panic() {
        let (ctx, _rx) = context_with_player(0.0, 0.0);
        let walker = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.go_to(50_000.0, 0.0).await })
        };

        advance_time(Duration::from_millis(500)).await;
        ctx.registry().lock().await.remove_player(1);

        // Later writes are silent no-ops; the traversal still terminates.
        let result = timeout(Duration::from_secs(60), walker)
            .await
            .expect("go_to must finish")
            .expect("walker must not panic");
        assert!(result.is_ok());
    }
}
