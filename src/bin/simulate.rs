use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use clap::Parser;
use raidsim_bot::protocol;
use raidsim_bot::session::Session;
use raidsim_bot::types::{Outbound, RegistrySnapshot};
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Duration, Instant};

/// Offline smoke harness: replays a scripted encounter timeline through
/// in-process sessions and reports what each actor emitted. No transport,
/// no server; the script plays the role of the event relay.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Number of bot actors to run side by side.
    #[arg(long, default_value_t = 3)]
    actors: usize,
    /// First roster id; actors take consecutive ids from here.
    #[arg(long, default_value_t = 1)]
    base_id: u32,
    /// Wall-clock seconds to let the scenario play out.
    #[arg(long, default_value_t = 25)]
    duration_secs: u64,
    /// Also dump each actor's final registry snapshot as JSON.
    #[arg(long)]
    snapshot: bool,
}

#[derive(Clone, Debug, Serialize)]
struct ActorSummary {
    name: String,
    pid: u32,
    #[serde(rename = "routineStatus")]
    routine_status: String,
    #[serde(rename = "positionUpdates")]
    position_updates: u64,
    chats: u64,
    #[serde(rename = "chatLines")]
    chat_lines: Vec<String>,
    x: i32,
    y: i32,
    moving: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot: Option<RegistrySnapshot>,
}

fn scenario_script(pid: u32, roster: &[(u32, String)]) -> Vec<(u64, String)> {
    let roster_entries: Vec<serde_json::Value> = roster
        .iter()
        .map(|(id, name)| json!({ "id": id, "name": name }))
        .collect();

    let mut script = vec![
        (
            0,
            json!({ "type": "passOK", "payload": { "m": "wyrmhole" } }).to_string(),
        ),
        (
            50,
            json!({ "type": "setId", "payload": { "id": pid, "players": roster_entries } })
                .to_string(),
        ),
        (
            200,
            json!({
                "type": "newEnemy",
                "payload": { "i": 900, "name": "Nidstinein", "x": 0, "z": 0, "j": 1.0, "k": 0.0 }
            })
            .to_string(),
        ),
        (
            300,
            json!({ "type": "tts", "payload": { "m": "Starting Wyrmhole" } }).to_string(),
        ),
        // A short server pause mid-walk; the offset keeps sim time seamless.
        (1_000, json!({ "type": "gamePaused" }).to_string()),
        (1_500, json!({ "type": "gameUnpaused", "payload": 500 }).to_string()),
        (
            14_000,
            json!({
                "type": "newEnemyAbility",
                "payload": { "id": 70, "name": "Lash", "castTime": 6_000 }
            })
            .to_string(),
        ),
        (
            14_000,
            json!({
                "type": "newEnemyAbility",
                "payload": { "id": 71, "name": "Gnash", "castTime": 8_000 }
            })
            .to_string(),
        ),
    ];

    for (id, _) in roster {
        script.push((
            4_000,
            json!({ "type": "buff", "payload": { "p": id, "i": 9, "d": 60_000 } }).to_string(),
        ));
        script.push((
            4_000,
            json!({ "type": "buff", "payload": { "p": id, "i": 12, "d": 60_000 } }).to_string(),
        ));
        script.push((
            14_000,
            json!({ "type": "buffExpired", "payload": { "p": id, "i": 9 } }).to_string(),
        ));
    }

    script.sort_by_key(|(at_ms, _)| *at_ms);
    script
}

async fn run_actor(
    pid: u32,
    name: String,
    roster: Vec<(u32, String)>,
    duration: Duration,
    want_snapshot: bool,
) -> ActorSummary {
    let (tx, mut rx) = mpsc::channel::<Outbound>(256);

    let position_updates = Arc::new(AtomicU64::new(0));
    let chats = Arc::new(AtomicU64::new(0));
    let chat_lines = Arc::new(tokio::sync::Mutex::new(Vec::new()));

    let collector = {
        let position_updates = position_updates.clone();
        let chats = chats.clone();
        let chat_lines = chat_lines.clone();
        tokio::spawn(async move {
            while let Some(outbound) = rx.recv().await {
                match outbound {
                    Outbound::Raw(_) => {
                        position_updates.fetch_add(1, Ordering::Relaxed);
                    }
                    Outbound::Message { kind, payload } if kind == "chat" => {
                        chats.fetch_add(1, Ordering::Relaxed);
                        if let Some(text) = payload.get("m").and_then(|value| value.as_str()) {
                            chat_lines.lock().await.push(text.to_string());
                        }
                    }
                    _ => {}
                }
            }
        })
    };

    let mut session = Session::new(&name, tx);
    let started = Instant::now();
    for (at_ms, line) in scenario_script(pid, &roster) {
        sleep_until(started + Duration::from_millis(at_ms)).await;
        let Some(event) = protocol::parse_server_message(&line) else {
            eprintln!("[simulate] unparseable script line: {line}");
            continue;
        };
        if !session.apply(event).await {
            break;
        }
    }
    sleep_until(started + duration).await;

    let routine_status = format!("{:?}", session.routine_status()).to_lowercase();
    let (x, y, moving, snapshot) = {
        let registry = session.registry();
        let registry = registry.lock().await;
        let me = registry.player(pid);
        (
            me.map_or(0, |p| p.x),
            me.map_or(0, |p| p.y),
            me.is_some_and(|p| p.moving),
            want_snapshot.then(|| registry.snapshot()),
        )
    };
    session.shutdown();
    // The rebroadcast task still holds a sender clone, so the channel will
    // not close on its own; stop the collector explicitly.
    collector.abort();
    let _ = collector.await;

    let chat_lines = chat_lines.lock().await.clone();
    ActorSummary {
        name,
        pid,
        routine_status,
        position_updates: position_updates.load(Ordering::Relaxed),
        chats: chats.load(Ordering::Relaxed),
        chat_lines,
        x,
        y,
        moving,
        snapshot,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let actor_count = cli.actors.clamp(1, 24);
    let duration = Duration::from_secs(cli.duration_secs);

    let roster: Vec<(u32, String)> = (0..actor_count)
        .map(|index| (cli.base_id + index as u32, format!("sim{}", index + 1)))
        .collect();

    println!(
        "[simulate] running {actor_count} actor(s) for {}s",
        cli.duration_secs
    );

    let mut tasks = Vec::new();
    for (pid, name) in roster.clone() {
        tasks.push(tokio::spawn(run_actor(
            pid,
            name,
            roster.clone(),
            duration,
            cli.snapshot,
        )));
    }

    let mut completed = 0usize;
    for task in tasks {
        let summary = task.await.expect("actor task must not panic");
        if summary.routine_status == "completed" {
            completed += 1;
        }
        println!(
            "{}",
            serde_json::to_string(&summary).expect("summary serializes")
        );
    }
    println!("[simulate] {completed}/{actor_count} routines completed");
}
