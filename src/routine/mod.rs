use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use rand::Rng as _;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::constants::{
    tick_ms, SETTLE_MAX_MS, SETTLE_MIN_MS, SHORT_SETTLE_MAX_MS, SHORT_SETTLE_MIN_MS,
};
use crate::protocol;
use crate::registry::Registry;
use crate::types::{Outbound, Player};

pub mod movement;
pub mod wyrmhole;

pub type SharedRegistry = Arc<Mutex<Registry>>;

#[derive(Debug)]
pub enum RoutineError {
    ActorGone(u32),
    EnemyGone(u32),
    ChannelClosed,
}

impl fmt::Display for RoutineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ActorGone(id) => write!(f, "controlled actor {id} left the registry"),
            Self::EnemyGone(id) => write!(f, "enemy {id} left the registry"),
            Self::ChannelClosed => write!(f, "outbound channel closed"),
        }
    }
}

/// One scripted choreography. Implementations get fresh handles to the
/// session's registry, clock and outbound channel through the context and
/// drive themselves with the wait primitives below.
pub trait BehaviorRoutine: Send + Sync {
    fn name(&self) -> &'static str;
    fn run(&self, ctx: BotContext) -> BoxFuture<'static, Result<(), RoutineError>>;
}

/// Cue-keyed dispatch: the server's announcement text selects the routine.
pub fn find_routine(cue: &str) -> Option<Arc<dyn BehaviorRoutine>> {
    match cue {
        "Starting Wyrmhole" => Some(Arc::new(wyrmhole::WyrmholeRoutine)),
        _ => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoutineStatus {
    Idle,
    Running,
    Completed,
    Cancelled,
    Faulted,
}

const STATUS_RUNNING: u8 = 1;
const STATUS_COMPLETED: u8 = 2;
const STATUS_CANCELLED: u8 = 3;
const STATUS_FAULTED: u8 = 4;

fn status_from_u8(raw: u8) -> RoutineStatus {
    match raw {
        STATUS_RUNNING => RoutineStatus::Running,
        STATUS_COMPLETED => RoutineStatus::Completed,
        STATUS_CANCELLED => RoutineStatus::Cancelled,
        _ => RoutineStatus::Faulted,
    }
}

/// Handle to one running routine. Terminal states are final; running the
/// same script again means spawning a fresh handle.
pub struct RoutineHandle {
    name: &'static str,
    task: JoinHandle<()>,
    status: Arc<AtomicU8>,
}

impl RoutineHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn status(&self) -> RoutineStatus {
        status_from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.status() == RoutineStatus::Running
    }

    /// Cancels the routine at its current suspension point. Registry writes
    /// already committed stand; nothing is rolled back.
    pub fn stop(&self) {
        if self
            .status
            .compare_exchange(
                STATUS_RUNNING,
                STATUS_CANCELLED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.task.abort();
        }
    }
}

/// Starts the routine as its own task. A fault inside the script is logged
/// and absorbed here; it never takes the session down.
pub fn spawn_routine(routine: Arc<dyn BehaviorRoutine>, ctx: BotContext) -> RoutineHandle {
    let name = routine.name();
    let status = Arc::new(AtomicU8::new(STATUS_RUNNING));
    let task_status = status.clone();
    let task = tokio::spawn(async move {
        match routine.run(ctx).await {
            Ok(()) => {
                let _ = task_status.compare_exchange(
                    STATUS_RUNNING,
                    STATUS_COMPLETED,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
            }
            Err(error) => {
                eprintln!("[routine] {name} faulted: {error}");
                let _ = task_status.compare_exchange(
                    STATUS_RUNNING,
                    STATUS_FAULTED,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
            }
        }
    });
    RoutineHandle { name, task, status }
}

/// Per-routine view of the session: shared registry handle, outbound
/// channel and the controlled actor's id. Every wait primitive polls its
/// predicate under a short lock, then suspends for one scheduling tick and
/// retries, so the event loop interleaves freely between checks.
#[derive(Clone)]
pub struct BotContext {
    registry: SharedRegistry,
    outbound: mpsc::Sender<Outbound>,
    pid: u32,
}

impl BotContext {
    pub fn new(registry: SharedRegistry, outbound: mpsc::Sender<Outbound>, pid: u32) -> Self {
        Self {
            registry,
            outbound,
            pid,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub async fn time(&self) -> f64 {
        self.registry.lock().await.time()
    }

    /// Polling is coarser while the simulation is paused; there is nothing
    /// to react to until it resumes.
    pub async fn next_tick(&self) {
        let paused = self.registry.lock().await.clock.is_paused();
        sleep(Duration::from_millis(tick_ms(paused))).await;
    }

    pub async fn me(&self) -> Result<Player, RoutineError> {
        self.registry
            .lock()
            .await
            .player(self.pid)
            .cloned()
            .ok_or(RoutineError::ActorGone(self.pid))
    }

    pub async fn face(&self, angle: f64) {
        self.registry.lock().await.face_player(self.pid, angle);
    }

    pub async fn chat(&self, text: &str) -> Result<(), RoutineError> {
        let name = self.me().await?.name;
        self.outbound
            .send(protocol::chat_message(&name, text))
            .await
            .map_err(|_| RoutineError::ChannelClosed)
    }

    pub async fn is_ability_casting(&self, name: &str) -> bool {
        self.registry.lock().await.is_ability_casting(name)
    }

    /// Resolves once an enemy of the given name exists, yielding its id.
    pub async fn until_enemy_spawn(&self, name: &str) -> u32 {
        loop {
            let found = self
                .registry
                .lock()
                .await
                .enemy_named(name)
                .map(|enemy| enemy.id);
            if let Some(id) = found {
                self.settle(SETTLE_MIN_MS, SETTLE_MAX_MS).await;
                return id;
            }
            self.next_tick().await;
        }
    }

    /// Resolves once the player holds any buff from the set.
    pub async fn until_any_buff(&self, player_id: u32, buff_ids: &[u32]) {
        loop {
            let held = {
                let registry = self.registry.lock().await;
                buff_ids.iter().any(|&buff| registry.has_buff(player_id, buff))
            };
            if held {
                self.settle(SETTLE_MIN_MS, SETTLE_MAX_MS).await;
                return;
            }
            self.next_tick().await;
        }
    }

    /// Resolves once the buff is no longer held. The settle window is
    /// shorter here; buff drops usually demand a prompt reaction.
    pub async fn until_buff_gone(&self, player_id: u32, buff_id: u32) {
        loop {
            if !self.registry.lock().await.has_buff(player_id, buff_id) {
                self.settle(SHORT_SETTLE_MIN_MS, SHORT_SETTLE_MAX_MS).await;
                return;
            }
            self.next_tick().await;
        }
    }

    /// Polls until simulation time passes `now + secs`. Precision is one
    /// scheduling tick, and a paused clock stretches the wait with it.
    pub async fn until_delay(&self, secs: f64) {
        let deadline = self.time().await + secs;
        while self.time().await < deadline {
            self.next_tick().await;
        }
    }

    /// Resolves once an ability with the name has started casting. Does not
    /// wait for it to go off.
    pub async fn until_ability_starts(&self, name: &str) {
        loop {
            if self.registry.lock().await.ability_started(name) {
                return;
            }
            self.next_tick().await;
        }
    }

    /// Resolves once an ability with the name has a cast deadline in the
    /// past, i.e. its effect has gone off.
    pub async fn until_ability_triggers(&self, name: &str) {
        loop {
            if self.registry.lock().await.ability_triggered(name) {
                return;
            }
            self.next_tick().await;
        }
    }

    /// Humanizing jitter: reacting at the exact instant a condition flips
    /// would look robotic, so waits settle for a random slice of simulation
    /// time first.
    async fn settle(&self, min_ms: u64, max_ms: u64) {
        let jitter_ms = rand::rng().random_range(min_ms..=max_ms);
        self.until_delay(jitter_ms as f64 / 1000.0).await;
    }
}
