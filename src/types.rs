use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Buff {
    pub id: u32,
    pub deadline: f64,
}

#[derive(Clone, Debug)]
pub struct Player {
    pub id: u32,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub angle: f64,
    pub moving: bool,
    pub buffs: HashMap<u32, Buff>,
}

impl Player {
    pub fn new(id: u32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            x: 0,
            y: 0,
            angle: 0.0,
            moving: false,
            buffs: HashMap::new(),
        }
    }

    /// Clears transient encounter state but keeps identity.
    pub fn reset(&mut self) {
        self.x = 0;
        self.y = 0;
        self.angle = 0.0;
        self.moving = false;
        self.buffs.clear();
    }

    /// Re-adding an id replaces the previous buff.
    pub fn add_buff(&mut self, id: u32, deadline: f64) {
        self.buffs.insert(id, Buff { id, deadline });
    }

    pub fn remove_buff(&mut self, id: u32) {
        self.buffs.remove(&id);
    }

    pub fn has_buff(&self, id: u32) -> bool {
        self.buffs.contains_key(&id)
    }
}

#[derive(Clone, Debug)]
pub struct Enemy {
    pub id: u32,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub angle: f64,
}

#[derive(Clone, Debug)]
pub struct Ability {
    pub id: u32,
    pub name: String,
    pub cast_deadline: f64,
    pub gc_deadline: f64,
}

/// One message handed to the transport writer. `Reliable` maps to the
/// transport's acknowledged channel, `Raw` to its unframed string channel.
#[derive(Clone, Debug, PartialEq)]
pub enum Outbound {
    Message { kind: String, payload: Value },
    Reliable { kind: String, payload: Value },
    Raw(String),
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub id: u32,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub angle: f64,
    pub moving: bool,
    pub buffs: Vec<u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EnemyView {
    pub id: u32,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub angle: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct AbilityView {
    pub id: u32,
    pub name: String,
    #[serde(rename = "castDeadline")]
    pub cast_deadline: f64,
    #[serde(rename = "gcDeadline")]
    pub gc_deadline: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct RegistrySnapshot {
    pub time: f64,
    pub paused: bool,
    pub players: Vec<PlayerView>,
    pub enemies: Vec<EnemyView>,
    pub abilities: Vec<AbilityView>,
}
