use serde_json::{json, Value};

use crate::constants::FACING_SCALE;
use crate::types::Outbound;

/// Typed view of the server's event stream, one variant per wire message
/// the session reacts to. Unknown message types parse to `None` and are
/// dropped by the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerEvent {
    PassOk { map: String },
    SetId { id: u32, roster: Vec<RosterEntry> },
    NewPlayer { id: u32, name: String },
    MapChange { map: String },
    PlayerDisconnected { id: u32 },
    Buff { player_id: u32, buff_id: u32, duration_ms: u64 },
    BuffExpired { player_id: u32, buff_id: u32 },
    NewEnemy { id: u32, name: String, x: f64, y: f64, dir_j: f64, dir_k: f64 },
    RemoveEnemy { id: u32 },
    NewAbility { id: u32, name: String, cast_time_ms: u64 },
    Reset,
    Paused,
    Unpaused { offset_ms: i64 },
    Cue { message: String },
    PlayerUpdate { id: u32, x: i32, y: i32, facing_x: i64, facing_y: i64, moving: bool },
}

#[derive(Clone, Debug, PartialEq)]
pub struct RosterEntry {
    pub id: u32,
    pub name: Option<String>,
}

pub fn parse_server_message(raw: &str) -> Option<ServerEvent> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "passOK" => {
            let map = object.get("payload")?.get("m")?.as_str()?.to_string();
            Some(ServerEvent::PassOk { map })
        }
        "setId" => {
            let payload = object.get("payload")?;
            let id = parse_id(payload.get("id"))?;
            let mut roster = Vec::new();
            for entry in payload.get("players")?.as_array()? {
                let entry_id = parse_id(entry.get("id"))?;
                let name = match entry.get("name") {
                    None => None,
                    Some(value) => Some(value.as_str()?.to_string()),
                };
                roster.push(RosterEntry { id: entry_id, name });
            }
            Some(ServerEvent::SetId { id, roster })
        }
        "newPlayer" => {
            let payload = object.get("payload")?;
            Some(ServerEvent::NewPlayer {
                id: parse_id(payload.get("id"))?,
                name: payload.get("name")?.as_str()?.to_string(),
            })
        }
        "mapChange" => {
            let map = object.get("payload")?.get("m")?.as_str()?.to_string();
            Some(ServerEvent::MapChange { map })
        }
        "playerDisconnected" => {
            let id = parse_id(object.get("payload")?.get("id"))?;
            Some(ServerEvent::PlayerDisconnected { id })
        }
        "buff" => {
            let payload = object.get("payload")?;
            Some(ServerEvent::Buff {
                player_id: parse_id(payload.get("p"))?,
                buff_id: parse_id(payload.get("i"))?,
                duration_ms: payload.get("d")?.as_u64()?,
            })
        }
        "buffExpired" => {
            let payload = object.get("payload")?;
            Some(ServerEvent::BuffExpired {
                player_id: parse_id(payload.get("p"))?,
                buff_id: parse_id(payload.get("i"))?,
            })
        }
        "newEnemy" => {
            let payload = object.get("payload")?;
            Some(ServerEvent::NewEnemy {
                id: parse_id(payload.get("i"))?,
                name: payload.get("name")?.as_str()?.to_string(),
                x: payload.get("x")?.as_f64()?,
                y: payload.get("z")?.as_f64()?,
                dir_j: payload.get("j")?.as_f64()?,
                dir_k: payload.get("k")?.as_f64()?,
            })
        }
        "rEnemy" => {
            let id = parse_id(object.get("payload")?.get("id"))?;
            Some(ServerEvent::RemoveEnemy { id })
        }
        "newEnemyAbility" => {
            let payload = object.get("payload")?;
            Some(ServerEvent::NewAbility {
                id: parse_id(payload.get("id"))?,
                name: payload.get("name")?.as_str()?.to_string(),
                cast_time_ms: payload.get("castTime")?.as_u64()?,
            })
        }
        "reset" => Some(ServerEvent::Reset),
        "gamePaused" => Some(ServerEvent::Paused),
        "gameUnpaused" => {
            let offset_ms = object.get("payload")?.as_i64()?;
            Some(ServerEvent::Unpaused { offset_ms })
        }
        "tts" => {
            let message = object.get("payload")?.get("m")?.as_str()?.to_string();
            Some(ServerEvent::Cue { message })
        }
        "_rawstr" => parse_raw_update(object.get("payload")?.as_str()?),
        _ => None,
    }
}

/// Position lines ride a side channel as pipe-delimited integers:
/// `0|id|x|y|fx|fy|moving|0|0`. The leading `0` tags the line as a player
/// update; other tags are not ours to handle.
pub fn parse_raw_update(line: &str) -> Option<ServerEvent> {
    let mut fields = line.split('|');
    if fields.next()? != "0" {
        return None;
    }
    let mut next_i64 = || fields.next()?.parse::<i64>().ok();
    let id = u32::try_from(next_i64()?).ok()?;
    let x = i32::try_from(next_i64()?).ok()?;
    let y = i32::try_from(next_i64()?).ok()?;
    let facing_x = next_i64()?;
    let facing_y = next_i64()?;
    let moving = next_i64()? != 0;
    Some(ServerEvent::PlayerUpdate {
        id,
        x,
        y,
        facing_x,
        facing_y,
        moving,
    })
}

fn parse_id(value: Option<&Value>) -> Option<u32> {
    u32::try_from(value?.as_u64()?).ok()
}

pub fn encode_outbound(outbound: &Outbound) -> String {
    match outbound {
        Outbound::Message { kind, payload } => {
            json!({ "type": kind, "payload": payload }).to_string()
        }
        Outbound::Reliable { kind, payload } => {
            json!({ "type": kind, "payload": payload, "reliable": true }).to_string()
        }
        Outbound::Raw(line) => json!({ "type": "_rawstr", "payload": line }).to_string(),
    }
}

pub fn chat_message(user: &str, text: &str) -> Outbound {
    Outbound::Message {
        kind: "chat".to_string(),
        payload: json!({ "u": user, "m": text }),
    }
}

pub fn player_data(id: u32, name: &str) -> Outbound {
    Outbound::Reliable {
        kind: "setPlayerData".to_string(),
        payload: json!({ "id": id, "job": "rdm", "name": name, "inputType": 0 }),
    }
}

pub fn map_loaded(id: u32) -> Outbound {
    Outbound::Message {
        kind: "mapLoaded".to_string(),
        payload: json!({ "pid": id }),
    }
}

/// The periodic rebroadcast tuple: position plus the facing direction as
/// scaled integer components, trailing fields reserved.
pub fn position_update_line(id: u32, x: i32, y: i32, angle: f64, moving: bool) -> String {
    let facing_x = (FACING_SCALE * angle.cos()) as i64;
    let facing_y = (FACING_SCALE * angle.sin()) as i64;
    format!(
        "0|{id}|{x}|{y}|{facing_x}|{facing_y}|{}|0|0",
        u8::from(moving)
    )
}
