pub const MOVE_SPEED: f64 = 12_500.0; // units per simulation second

pub const RUN_TICK_MS: u64 = 30;
pub const PAUSED_TICK_MS: u64 = 200;
pub const REBROADCAST_MS: u64 = 50;

pub const ABILITY_GC_GRACE_SECS: f64 = 1.0;

pub const SETTLE_MIN_MS: u64 = 100;
pub const SETTLE_MAX_MS: u64 = 300;
pub const SHORT_SETTLE_MIN_MS: u64 = 50;
pub const SHORT_SETTLE_MAX_MS: u64 = 150;

pub const FACING_SCALE: f64 = 10_000.0;

pub fn tick_ms(paused: bool) -> u64 {
    if paused {
        PAUSED_TICK_MS
    } else {
        RUN_TICK_MS
    }
}
