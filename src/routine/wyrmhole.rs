use futures_util::future::BoxFuture;

use crate::rng::consistent_shuffle;

use super::{BehaviorRoutine, BotContext, RoutineError};

const NIDSTINIEN_SIZE: f64 = 19_500.0;

const GROUP_1: u32 = 9;
const GROUP_2: u32 = 10;
const GROUP_3: u32 = 11;
const JUMP_CIRCLE: u32 = 12;
const JUMP_FRONT: u32 = 13;
const JUMP_BACK: u32 = 14;

fn circle_x(radius: f64, angle: f64) -> f64 {
    (radius * angle.cos()).round()
}

fn circle_y(radius: f64, angle: f64) -> f64 {
    (radius * angle.sin()).round()
}

/// The Wyrmhole encounter opener: park on the boss's forward anchor, read
/// the group and jump buffs as they land, claim a spread slot through the
/// consistent shuffle, and ride out the first in/out sequence.
pub struct WyrmholeRoutine;

impl BehaviorRoutine for WyrmholeRoutine {
    fn name(&self) -> &'static str {
        "wyrmhole"
    }

    fn run(&self, ctx: BotContext) -> BoxFuture<'static, Result<(), RoutineError>> {
        Box::pin(mainloop(ctx))
    }
}

struct Anchors {
    front: (f64, f64),
    spread: [(f64, f64); 3],
    face_angle: f64,
}

async fn read_anchors(ctx: &BotContext, enemy_id: u32) -> Result<Anchors, RoutineError> {
    let registry = ctx.registry().lock().await;
    let boss = registry
        .enemy(enemy_id)
        .ok_or(RoutineError::EnemyGone(enemy_id))?;
    let (bx, by, angle) = (f64::from(boss.x), f64::from(boss.y), boss.angle);

    let front = (
        bx + circle_x(NIDSTINIEN_SIZE, angle),
        by + circle_y(NIDSTINIEN_SIZE, angle),
    );
    let back = (
        bx + circle_x(NIDSTINIEN_SIZE, -angle),
        by + circle_y(NIDSTINIEN_SIZE, -angle),
    );
    let left = (
        bx + circle_x(NIDSTINIEN_SIZE, angle + std::f64::consts::FRAC_PI_2),
        by + circle_y(NIDSTINIEN_SIZE, angle + std::f64::consts::FRAC_PI_2),
    );
    let right = (
        bx + circle_x(NIDSTINIEN_SIZE, angle - std::f64::consts::FRAC_PI_2),
        by + circle_y(NIDSTINIEN_SIZE, angle - std::f64::consts::FRAC_PI_2),
    );

    Ok(Anchors {
        front,
        spread: [back, left, right],
        face_angle: left.1.atan2(left.0),
    })
}

async fn mainloop(ctx: BotContext) -> Result<(), RoutineError> {
    let boss = ctx.until_enemy_spawn("Nidstinein").await;
    let anchors = read_anchors(&ctx, boss).await?;

    ctx.go_to(anchors.front.0, anchors.front.1).await?;

    ctx.until_any_buff(ctx.pid(), &[GROUP_1, GROUP_2, GROUP_3])
        .await;
    ctx.until_delay(0.5).await;

    let me = ctx.me().await?;
    let my_group = [GROUP_1, GROUP_2, GROUP_3]
        .into_iter()
        .find(|&group| me.has_buff(group))
        .unwrap_or(GROUP_3);

    // Everyone in the group runs the same shuffle over the same ids, so the
    // slot assignment needs no coordination.
    let mut group_ids = ctx.registry().lock().await.players_with_buff(my_group);
    consistent_shuffle(&mut group_ids);
    let slot = group_ids
        .iter()
        .position(|&id| id == ctx.pid())
        .unwrap_or(0)
        .min(anchors.spread.len() - 1);

    let mut spot = anchors.spread[slot];
    // Pre-position toward the claimed slot while the jump buffs are dealt.
    ctx.go_to(spot.0 / 3.0, spot.1 / 3.0).await?;
    ctx.until_any_buff(ctx.pid(), &[JUMP_CIRCLE, JUMP_FRONT, JUMP_BACK])
        .await;

    // Arrow jumps override the shuffled assignment.
    let arrows = {
        let registry = ctx.registry().lock().await;
        group_ids
            .iter()
            .any(|&id| !registry.has_buff(id, JUMP_CIRCLE))
    };
    if arrows {
        let me = ctx.me().await?;
        if me.has_buff(JUMP_CIRCLE) {
            spot = anchors.spread[0];
        } else if me.has_buff(JUMP_BACK) {
            spot = anchors.spread[1];
        } else if me.has_buff(JUMP_FRONT) {
            spot = anchors.spread[2];
        }
    } else {
        let spot_label = ["south", "left", "right"][slot];
        ctx.chat(&format!("[G{}] going {spot_label}!", group_index(my_group)))
            .await?;
    }

    ctx.go_to(spot.0, spot.1).await?;
    ctx.face(anchors.face_angle).await;
    ctx.until_delay(2.0).await;

    let out_first = ctx.is_ability_casting("Gnash and Lash").await;
    ctx.until_buff_gone(ctx.pid(), my_group).await;
    ctx.go_to(anchors.front.0 * 0.9, anchors.front.1 * 0.9)
        .await?;
    gnash_lash(&ctx, out_first).await?;
    ctx.go_to(anchors.front.0, anchors.front.1).await?;

    Ok(())
}

fn group_index(group: u32) -> u32 {
    group - GROUP_1 + 1
}

/// The in/out dodge: stand wide for Gnash then close for Lash, or the
/// reverse, depending on which cast was seen first.
async fn gnash_lash(ctx: &BotContext, out_first: bool) -> Result<(), RoutineError> {
    let me = ctx.me().await?;
    let (px, py) = (f64::from(me.x), f64::from(me.y));
    if px == 0.0 && py == 0.0 {
        // Dead center has no radial direction to dodge along.
        return Ok(());
    }
    let (ux, uy) = super::movement::normalize(px, py);
    let (x, y) = (ux * NIDSTINIEN_SIZE, uy * NIDSTINIEN_SIZE);

    if out_first {
        ctx.go_to(x * 1.2, y * 1.2).await?;
        ctx.until_ability_triggers("Gnash").await;
        ctx.go_to(x * 0.9, y * 0.9).await?;
        ctx.until_ability_triggers("Lash").await;
    } else {
        ctx.go_to(x * 0.9, y * 0.9).await?;
        ctx.until_ability_triggers("Lash").await;
        ctx.go_to(x * 1.2, y * 1.2).await?;
        ctx.until_ability_triggers("Gnash").await;
    }
    Ok(())
}
