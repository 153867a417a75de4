use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::time::{sleep, Duration};

use crate::constants::REBROADCAST_MS;
use crate::protocol::{self, ServerEvent};
use crate::registry::Registry;
use crate::routine::{find_routine, spawn_routine, BotContext, RoutineHandle, RoutineStatus};
use crate::routine::SharedRegistry;
use crate::types::Outbound;

/// One controlled actor: its private registry/clock pair, the outbound
/// channel to the transport writer, and at most one behavior routine.
/// Events are applied strictly in arrival order by a single caller, so the
/// registry only ever sees one writer at a time.
pub struct Session {
    registry: SharedRegistry,
    outbound: mpsc::Sender<Outbound>,
    name: String,
    pid: Option<u32>,
    routine: Option<RoutineHandle>,
}

impl Session {
    pub fn new(name: &str, outbound: mpsc::Sender<Outbound>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::new())),
            outbound,
            name: name.to_string(),
            pid: None,
            routine: None,
        }
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn routine_status(&self) -> RoutineStatus {
        self.routine
            .as_ref()
            .map_or(RoutineStatus::Idle, RoutineHandle::status)
    }

    /// Applies one event to the mirror. Returns `false` once the session is
    /// over (our own disconnect); the caller drops the transport then.
    pub async fn apply(&mut self, event: ServerEvent) -> bool {
        match event {
            ServerEvent::PassOk { map } => {
                println!("[session] {} accepted, current map: {map}", self.name);
            }
            ServerEvent::SetId { id, roster } => {
                println!("[session] {} got id {id}", self.name);
                self.pid = Some(id);
                {
                    let mut registry = self.registry.lock().await;
                    registry.add_player(id, &self.name);
                    for entry in roster {
                        if let Some(name) = entry.name {
                            registry.add_player(entry.id, &name);
                        }
                    }
                }
                let _ = self.outbound.send(protocol::player_data(id, &self.name)).await;
                let _ = self.outbound.send(protocol::map_loaded(id)).await;
                self.start_rebroadcast(id);
            }
            ServerEvent::NewPlayer { id, name } => {
                self.registry.lock().await.add_player(id, &name);
            }
            ServerEvent::MapChange { map } => {
                println!("[session] {} map change to {map}", self.name);
                if let Some(id) = self.pid {
                    let _ = self.outbound.send(protocol::map_loaded(id)).await;
                }
            }
            ServerEvent::PlayerDisconnected { id } => {
                self.registry.lock().await.remove_player(id);
                if self.pid == Some(id) {
                    self.stop_routine();
                    return false;
                }
            }
            ServerEvent::Buff {
                player_id,
                buff_id,
                duration_ms,
            } => {
                self.registry
                    .lock()
                    .await
                    .add_buff(player_id, buff_id, duration_ms as f64 / 1000.0);
            }
            ServerEvent::BuffExpired { player_id, buff_id } => {
                self.registry.lock().await.remove_buff(player_id, buff_id);
            }
            ServerEvent::NewEnemy {
                id,
                name,
                x,
                y,
                dir_j,
                dir_k,
            } => {
                let angle = dir_k.atan2(dir_j);
                self.registry
                    .lock()
                    .await
                    .add_enemy(id, &name, x, y, angle);
            }
            ServerEvent::RemoveEnemy { id } => {
                self.registry.lock().await.remove_enemy(id);
            }
            ServerEvent::NewAbility {
                id,
                name,
                cast_time_ms,
            } => {
                self.registry
                    .lock()
                    .await
                    .add_ability(id, &name, cast_time_ms as f64 / 1000.0);
            }
            ServerEvent::Reset => {
                self.registry.lock().await.reset_encounter();
                self.stop_routine();
            }
            ServerEvent::Paused => {
                self.registry.lock().await.clock.pause();
            }
            ServerEvent::Unpaused { offset_ms } => {
                self.registry
                    .lock()
                    .await
                    .clock
                    .unpause(offset_ms as f64 / 1000.0);
            }
            ServerEvent::Cue { message } => {
                self.start_routine_for_cue(&message);
            }
            ServerEvent::PlayerUpdate {
                id,
                x,
                y,
                facing_x,
                facing_y,
                moving,
            } => {
                // Our own echoes come back on the same channel; the local
                // interpolator is authoritative for the controlled actor.
                if self.pid != Some(id) {
                    let angle = (facing_y as f64).atan2(facing_x as f64);
                    self.registry
                        .lock()
                        .await
                        .update_player(id, f64::from(x), f64::from(y), angle, moving);
                }
            }
        }
        true
    }

    fn start_routine_for_cue(&mut self, cue: &str) {
        if let Some(handle) = &self.routine {
            if handle.is_running() {
                eprintln!(
                    "[session] cue {cue:?} ignored, routine {} still running",
                    handle.name()
                );
                return;
            }
        }
        let Some(pid) = self.pid else {
            eprintln!("[session] cue {cue:?} before roster assignment, ignored");
            return;
        };
        let Some(routine) = find_routine(cue) else {
            return;
        };
        println!("[session] {} starting routine {}", self.name, routine.name());
        let ctx = BotContext::new(self.registry.clone(), self.outbound.clone(), pid);
        self.routine = Some(spawn_routine(routine, ctx));
    }

    pub fn stop_routine(&mut self) {
        if let Some(handle) = self.routine.take() {
            handle.stop();
        }
    }

    /// Re-emits our position tuple every 50 ms until we leave the roster or
    /// the transport goes away.
    fn start_rebroadcast(&self, pid: u32) {
        let registry = self.registry.clone();
        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            loop {
                sleep(Duration::from_millis(REBROADCAST_MS)).await;
                let line = {
                    let registry = registry.lock().await;
                    match registry.player(pid) {
                        None => return,
                        Some(me) => {
                            protocol::position_update_line(pid, me.x, me.y, me.angle, me.moving)
                        }
                    }
                };
                if outbound.send(Outbound::Raw(line)).await.is_err() {
                    return;
                }
            }
        });
    }

    /// Transport teardown: cancel whatever is still scheduled.
    pub fn shutdown(&mut self) {
        self.stop_routine();
    }
}
