use serde::{Deserialize, Serialize};

/// Relay-assigned identifier for a peer in a room (the "actor number").
pub type ActorId = u32;

/// A player connected to a diceguess room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub actor_id: ActorId,
    pub display_name: String,
    pub is_master: bool,
}

impl Player {
    pub fn new(actor_id: ActorId, display_name: impl Into<String>) -> Self {
        Self {
            actor_id,
            display_name: display_name.into(),
            is_master: false,
        }
    }
}

/// Name shown for an actor whose player entry is unknown or has an empty name.
pub fn fallback_name(actor_id: ActorId) -> String {
    format!("Player {actor_id}")
}

/// The set of players currently connected to the room, plus which one is master.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    players: Vec<Player>,
    master: Option<ActorId>,
}

impl Roster {
    /// Build a roster from a player list. The master is the player flagged
    /// `is_master`, or the first player if none is flagged.
    pub fn new(players: Vec<Player>) -> Self {
        let master = players
            .iter()
            .find(|p| p.is_master)
            .or_else(|| players.first())
            .map(|p| p.actor_id);
        let mut roster = Self { players, master };
        roster.sync_master_flags();
        roster
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn master(&self) -> Option<ActorId> {
        self.master
    }

    pub fn is_master(&self, actor_id: ActorId) -> bool {
        self.master == Some(actor_id)
    }

    pub fn contains(&self, actor_id: ActorId) -> bool {
        self.players.iter().any(|p| p.actor_id == actor_id)
    }

    pub fn get(&self, actor_id: ActorId) -> Option<&Player> {
        self.players.iter().find(|p| p.actor_id == actor_id)
    }

    /// Current display name for an actor, falling back to `"Player {id}"`.
    pub fn display_name(&self, actor_id: ActorId) -> String {
        self.get(actor_id)
            .map(|p| p.display_name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| fallback_name(actor_id))
    }

    /// Add a player, replacing any existing entry with the same actor id.
    pub fn insert(&mut self, player: Player) {
        let becomes_master = player.is_master || self.master.is_none();
        let actor_id = player.actor_id;
        self.players.retain(|p| p.actor_id != actor_id);
        self.players.push(player);
        if becomes_master {
            self.master = Some(actor_id);
        }
        self.sync_master_flags();
    }

    /// Remove a player. Returns the removed entry if it was present.
    pub fn remove(&mut self, actor_id: ActorId) -> Option<Player> {
        let idx = self.players.iter().position(|p| p.actor_id == actor_id)?;
        let removed = self.players.remove(idx);
        if self.master == Some(actor_id) {
            self.master = None;
        }
        Some(removed)
    }

    pub fn set_master(&mut self, actor_id: ActorId) {
        self.master = Some(actor_id);
        self.sync_master_flags();
    }

    fn sync_master_flags(&mut self) {
        for p in &mut self.players {
            p.is_master = self.master == Some(p.actor_id);
        }
    }
}

/// Explicitly constructed per-peer session context: who this peer is and who
/// else is in the room. Passed into the coordinator at construction instead of
/// being reached through a global.
#[derive(Debug, Clone)]
pub struct SessionContext {
    local: ActorId,
    roster: Roster,
}

impl SessionContext {
    pub fn new(local: ActorId, roster: Roster) -> Self {
        Self { local, roster }
    }

    pub fn local_actor(&self) -> ActorId {
        self.local
    }

    /// Whether this peer currently holds the authoritative (master) role.
    pub fn is_master(&self) -> bool {
        self.roster.is_master(self.local)
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    pub fn player_count(&self) -> usize {
        self.roster.player_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_players() -> Vec<Player> {
        vec![
            Player::new(1, "Alice"),
            Player::new(2, "Bob"),
            Player::new(3, ""),
        ]
    }

    #[test]
    fn first_player_is_master_when_none_flagged() {
        let roster = Roster::new(three_players());
        assert_eq!(roster.master(), Some(1));
        assert!(roster.players()[0].is_master);
        assert!(!roster.players()[1].is_master);
    }

    #[test]
    fn flagged_player_is_master() {
        let mut players = three_players();
        players[1].is_master = true;
        let roster = Roster::new(players);
        assert_eq!(roster.master(), Some(2));
    }

    #[test]
    fn display_name_falls_back_for_blank_or_unknown() {
        let roster = Roster::new(three_players());
        assert_eq!(roster.display_name(1), "Alice");
        assert_eq!(roster.display_name(3), "Player 3");
        assert_eq!(roster.display_name(99), "Player 99");
    }

    #[test]
    fn removing_master_clears_role_until_reassigned() {
        let mut roster = Roster::new(three_players());
        roster.remove(1);
        assert_eq!(roster.master(), None);
        roster.set_master(2);
        assert!(roster.is_master(2));
        assert!(roster.get(2).is_some_and(|p| p.is_master));
        assert_eq!(roster.player_count(), 2);
    }

    #[test]
    fn insert_replaces_existing_actor() {
        let mut roster = Roster::new(three_players());
        roster.insert(Player::new(2, "Bobby"));
        assert_eq!(roster.player_count(), 3);
        assert_eq!(roster.display_name(2), "Bobby");
        assert_eq!(roster.master(), Some(1));
    }

    #[test]
    fn session_context_reports_local_authority() {
        let ctx = SessionContext::new(1, Roster::new(three_players()));
        assert!(ctx.is_master());
        let ctx = SessionContext::new(2, Roster::new(three_players()));
        assert!(!ctx.is_master());
        assert_eq!(ctx.player_count(), 3);
    }
}
