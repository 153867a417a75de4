use std::collections::HashMap;

use crate::clock::VirtualClock;
use crate::constants::ABILITY_GC_GRACE_SECS;
use crate::types::{
    Ability, AbilityView, Enemy, EnemyView, Player, PlayerView, RegistrySnapshot,
};

/// The session's live mirror of the simulation. The registry is the single
/// owner of every entity map; the event loop and the movement interpolator
/// both mutate it only through these methods, one at a time on the
/// cooperative scheduler.
///
/// Mutations targeting an unknown id are silent no-ops: with network
/// reordering, a late update for a removed entity is expected traffic, not
/// an error.
pub struct Registry {
    pub clock: VirtualClock,
    players: HashMap<u32, Player>,
    enemies: HashMap<u32, Enemy>,
    abilities: HashMap<u32, Ability>,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_clock(VirtualClock::new())
    }

    pub fn with_clock(clock: VirtualClock) -> Self {
        Self {
            clock,
            players: HashMap::new(),
            enemies: HashMap::new(),
            abilities: HashMap::new(),
        }
    }

    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    pub fn add_player(&mut self, id: u32, name: &str) {
        self.players.insert(id, Player::new(id, name));
    }

    pub fn remove_player(&mut self, id: u32) {
        self.players.remove(&id);
    }

    /// Positions are stored integer-rounded; fractional simulation
    /// positions are not representable on the wire.
    pub fn update_player(&mut self, id: u32, x: f64, y: f64, angle: f64, moving: bool) {
        let Some(player) = self.players.get_mut(&id) else {
            return;
        };
        player.x = x.round() as i32;
        player.y = y.round() as i32;
        player.angle = angle;
        player.moving = moving;
    }

    pub fn face_player(&mut self, id: u32, angle: f64) {
        if let Some(player) = self.players.get_mut(&id) {
            player.angle = angle;
        }
    }

    pub fn player(&self, id: u32) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn players_with_buff(&self, buff_id: u32) -> Vec<u32> {
        self.players
            .values()
            .filter(|player| player.has_buff(buff_id))
            .map(|player| player.id)
            .collect()
    }

    pub fn add_buff(&mut self, player_id: u32, buff_id: u32, duration_secs: f64) {
        let deadline = self.clock.time() + duration_secs;
        if let Some(player) = self.players.get_mut(&player_id) {
            player.add_buff(buff_id, deadline);
        }
    }

    pub fn remove_buff(&mut self, player_id: u32, buff_id: u32) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.remove_buff(buff_id);
        }
    }

    pub fn has_buff(&self, player_id: u32, buff_id: u32) -> bool {
        self.players
            .get(&player_id)
            .is_some_and(|player| player.has_buff(buff_id))
    }

    pub fn add_enemy(&mut self, id: u32, name: &str, x: f64, y: f64, angle: f64) {
        self.enemies.insert(
            id,
            Enemy {
                id,
                name: name.to_string(),
                x: x.round() as i32,
                y: y.round() as i32,
                angle,
            },
        );
    }

    pub fn remove_enemy(&mut self, id: u32) {
        self.enemies.remove(&id);
    }

    pub fn enemy(&self, id: u32) -> Option<&Enemy> {
        self.enemies.get(&id)
    }

    pub fn enemy_named(&self, name: &str) -> Option<&Enemy> {
        self.enemies.values().find(|enemy| enemy.name == name)
    }

    pub fn add_ability(&mut self, id: u32, name: &str, duration_secs: f64) {
        let cast_deadline = self.clock.time() + duration_secs;
        self.abilities.insert(
            id,
            Ability {
                id,
                name: name.to_string(),
                cast_deadline,
                gc_deadline: cast_deadline + ABILITY_GC_GRACE_SECS,
            },
        );
    }

    pub fn ability(&self, id: u32) -> Option<&Ability> {
        self.abilities.get(&id)
    }

    /// Drops every ability whose grace deadline has passed. This is the
    /// registry's only cleanup mechanism; every name-based lookup below
    /// runs it first to bound the map's size.
    pub fn gc_abilities(&mut self) {
        let now = self.clock.time();
        self.abilities.retain(|_, ability| ability.gc_deadline >= now);
    }

    /// Whether any live ability with this name has been observed. Matching
    /// is existential, so duplicate names cannot give a wrong answer.
    pub fn ability_started(&mut self, name: &str) -> bool {
        self.gc_abilities();
        self.abilities.values().any(|ability| ability.name == name)
    }

    /// Whether any live ability with this name has a cast deadline in the
    /// past (its effect has gone off but the grace window keeps it visible).
    pub fn ability_triggered(&mut self, name: &str) -> bool {
        self.gc_abilities();
        let now = self.clock.time();
        self.abilities
            .values()
            .any(|ability| ability.name == name && ability.cast_deadline < now)
    }

    pub fn is_ability_casting(&mut self, name: &str) -> bool {
        self.gc_abilities();
        let now = self.clock.time();
        self.abilities
            .values()
            .any(|ability| ability.name == name && ability.cast_deadline > now)
    }

    /// Encounter reset: all enemies are dropped and every player returns to
    /// default transient state while keeping identity. Abilities are left
    /// in place on purpose; they expire through the normal GC sweep.
    pub fn reset_encounter(&mut self) {
        self.enemies.clear();
        for player in self.players.values_mut() {
            player.reset();
        }
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut players: Vec<PlayerView> = self
            .players
            .values()
            .map(|player| {
                let mut buffs: Vec<u32> = player.buffs.keys().copied().collect();
                buffs.sort_unstable();
                PlayerView {
                    id: player.id,
                    name: player.name.clone(),
                    x: player.x,
                    y: player.y,
                    angle: player.angle,
                    moving: player.moving,
                    buffs,
                }
            })
            .collect();
        players.sort_by_key(|view| view.id);

        let mut enemies: Vec<EnemyView> = self
            .enemies
            .values()
            .map(|enemy| EnemyView {
                id: enemy.id,
                name: enemy.name.clone(),
                x: enemy.x,
                y: enemy.y,
                angle: enemy.angle,
            })
            .collect();
        enemies.sort_by_key(|view| view.id);

        let mut abilities: Vec<AbilityView> = self
            .abilities
            .values()
            .map(|ability| AbilityView {
                id: ability.id,
                name: ability.name.clone(),
                cast_deadline: ability.cast_deadline,
                gc_deadline: ability.gc_deadline,
            })
            .collect();
        abilities.sort_by_key(|view| view.id);

        RegistrySnapshot {
            time: self.clock.time(),
            paused: self.clock.is_paused(),
            players,
            enemies,
            abilities,
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn update_for_removed_player_is_a_no_op() {
        let mut registry = Registry::new();
        registry.add_player(1, "A");
        registry.remove_player(1);
        registry.update_player(1, 100.0, 200.0, 0.5, true);
        assert!(registry.player(1).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn update_rounds_positions_to_integers() {
        let mut registry = Registry::new();
        registry.add_player(1, "A");
        registry.update_player(1, 10.6, -3.4, 1.0, true);
        let player = registry.player(1).expect("player present");
        assert_eq!((player.x, player.y), (11, -3));
        assert!(player.moving);
    }

    #[tokio::test(start_paused = true)]
    async fn readding_a_buff_replaces_the_deadline() {
        let mut registry = Registry::new();
        registry.add_player(1, "A");
        registry.add_buff(1, 10, 1.0);
        registry.add_buff(1, 10, 5.0);
        let player = registry.player(1).expect("player present");
        assert_eq!(player.buffs.len(), 1);
        let deadline = player.buffs[&10].deadline;
        assert!((deadline - 5.0).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn buff_mutations_for_unknown_targets_are_no_ops() {
        let mut registry = Registry::new();
        registry.add_buff(7, 10, 1.0);
        registry.remove_buff(7, 10);
        assert!(!registry.has_buff(7, 10));

        registry.add_player(1, "A");
        registry.remove_buff(1, 99);
        assert!(!registry.has_buff(1, 99));
    }

    #[tokio::test(start_paused = true)]
    async fn gc_removes_exactly_the_expired_abilities() {
        let mut registry = Registry::new();
        // gc deadline = cast (2.0) + grace (1.0) = 3.0
        registry.add_ability(1, "Gnash", 2.0);

        advance(Duration::from_millis(2_900)).await;
        registry.gc_abilities();
        assert!(registry.ability(1).is_some());

        advance(Duration::from_millis(600)).await;
        registry.gc_abilities();
        assert!(registry.ability(1).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn gc_is_idempotent_without_clock_advance() {
        let mut registry = Registry::new();
        registry.add_ability(1, "Gnash", 0.5);
        registry.add_ability(2, "Lash", 10.0);

        advance(Duration::from_secs(2)).await;
        registry.gc_abilities();
        assert!(registry.ability(1).is_none());
        assert!(registry.ability(2).is_some());

        registry.gc_abilities();
        assert!(registry.ability(2).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn ability_predicates_track_the_cast_deadline() {
        let mut registry = Registry::new();
        registry.add_ability(1, "Gnash", 2.0);

        assert!(registry.ability_started("Gnash"));
        assert!(registry.is_ability_casting("Gnash"));
        assert!(!registry.ability_triggered("Gnash"));
        assert!(!registry.ability_started("Lash"));

        advance(Duration::from_millis(2_500)).await;
        assert!(registry.ability_started("Gnash"));
        assert!(!registry.is_ability_casting("Gnash"));
        assert!(registry.ability_triggered("Gnash"));

        // Past the grace window the instance is forgotten entirely.
        advance(Duration::from_secs(1)).await;
        assert!(!registry.ability_triggered("Gnash"));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_drops_enemies_and_clears_player_transients() {
        let mut registry = Registry::new();
        registry.add_player(1, "A");
        registry.update_player(1, 50.0, 60.0, 1.2, true);
        registry.add_buff(1, 10, 30.0);
        registry.add_enemy(5, "Nidstinein", 0.0, 0.0, 0.0);
        registry.add_ability(9, "Gnash", 60.0);

        registry.reset_encounter();

        let player = registry.player(1).expect("identity survives reset");
        assert_eq!(player.name, "A");
        assert_eq!((player.x, player.y), (0, 0));
        assert!(!player.moving);
        assert!(player.buffs.is_empty());
        assert!(registry.enemy(5).is_none());
        // Abilities are not force-cleared on reset; they age out via GC.
        assert!(registry.ability(9).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn players_with_buff_filters_the_roster() {
        let mut registry = Registry::new();
        for id in 1..=3 {
            registry.add_player(id, &format!("P{id}"));
        }
        registry.add_buff(1, 9, 10.0);
        registry.add_buff(3, 9, 10.0);
        registry.add_buff(2, 10, 10.0);

        let mut holders = registry.players_with_buff(9);
        holders.sort_unstable();
        assert_eq!(holders, vec![1, 3]);
    }
}
