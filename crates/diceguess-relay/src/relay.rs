use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{RwLock, mpsc};

use diceguess_core::coordinator::Outbound;
use diceguess_core::net::messages::MessageType;
use diceguess_core::net::protocol::encode_game_message;
use diceguess_core::player::{ActorId, Player};
use diceguess_core::room::{
    MAX_PLAYERS_PER_ROOM, PropertyWrite, RoomProperties, generate_room_code,
};

/// Per-peer channel for relay events.
pub type EventSender = mpsc::UnboundedSender<RelayEvent>;

/// Everything the relay tells a connected peer.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// Sent once, to the joining peer only, with a snapshot of the room.
    Joined {
        actor_id: ActorId,
        room_code: String,
        players: Vec<Player>,
        master: ActorId,
        properties: PropertyWrite,
        revision: u64,
    },
    PlayerJoined(Player),
    PlayerLeft(ActorId),
    MasterChanged(ActorId),
    /// An encoded game message routed from another peer.
    Message { from: ActorId, data: Bytes },
    PropertiesChanged { revision: u64, write: PropertyWrite },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    RoomNotFound(String),
    RoomExists(String),
    RoomFull { code: String, max_players: usize },
    MaxRoomsReached(usize),
    PlayerNotFound(ActorId),
    /// A master-only operation was attempted by another peer.
    NotMaster(ActorId),
    /// The message type byte is missing or unknown.
    Unroutable(Option<u8>),
    Encode(String),
}

impl std::fmt::Display for RelayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoomNotFound(code) => write!(f, "room not found: {code}"),
            Self::RoomExists(code) => write!(f, "room already exists: {code}"),
            Self::RoomFull { code, max_players } => {
                write!(f, "room {code} is full ({max_players} players)")
            },
            Self::MaxRoomsReached(max) => write!(f, "maximum room limit reached ({max})"),
            Self::PlayerNotFound(id) => write!(f, "actor {id} is not in the room"),
            Self::NotMaster(id) => write!(f, "actor {id} is not the room master"),
            Self::Unroutable(Some(b)) => write!(f, "unroutable message type: 0x{b:02x}"),
            Self::Unroutable(None) => write!(f, "unroutable empty message"),
            Self::Encode(e) => write!(f, "encode error: {e}"),
        }
    }
}

impl std::error::Error for RelayError {}

/// A connected peer in a relay room.
struct RelayPeer {
    player: Player,
    tx: EventSender,
}

/// A relay room: first joiner is master. Actor ids are never reused within
/// a room.
struct RelayRoom {
    peers: BTreeMap<ActorId, RelayPeer>,
    master: ActorId,
    next_actor: ActorId,
    properties: RoomProperties,
    revision: u64,
}

impl RelayRoom {
    fn new(player_name: String, tx: EventSender) -> Self {
        let mut room = Self {
            peers: BTreeMap::new(),
            master: 1,
            next_actor: 1,
            properties: RoomProperties::default(),
            revision: 0,
        };
        room.add_peer(player_name, tx);
        room
    }

    fn add_peer(&mut self, player_name: String, tx: EventSender) -> ActorId {
        let actor_id = self.next_actor;
        self.next_actor += 1;
        let mut player = Player::new(actor_id, player_name);
        player.is_master = actor_id == self.master;
        self.peers.insert(actor_id, RelayPeer { player, tx });
        actor_id
    }

    fn players(&self) -> Vec<Player> {
        self.peers.values().map(|p| p.player.clone()).collect()
    }

    fn send(&self, actor_id: ActorId, event: RelayEvent) {
        if let Some(peer) = self.peers.get(&actor_id)
            && let Err(e) = peer.tx.send(event)
        {
            tracing::debug!(actor_id, error = %e, "peer channel closed");
        }
    }

    fn send_all_except(&self, exclude: Option<ActorId>, event: &RelayEvent) {
        for (&actor_id, peer) in &self.peers {
            if Some(actor_id) != exclude
                && let Err(e) = peer.tx.send(event.clone())
            {
                tracing::debug!(actor_id, error = %e, "peer channel closed");
            }
        }
    }

    fn set_master(&mut self, actor_id: ActorId) {
        self.master = actor_id;
        for peer in self.peers.values_mut() {
            peer.player.is_master = peer.player.actor_id == actor_id;
        }
    }
}

/// Manages all relay rooms.
pub struct RelayState {
    rooms: HashMap<String, RelayRoom>,
    max_rooms: usize,
    max_players: usize,
}

impl RelayState {
    pub fn new(max_rooms: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            max_rooms,
            max_players: MAX_PLAYERS_PER_ROOM,
        }
    }

    pub fn with_max_players(mut self, max_players: usize) -> Self {
        self.max_players = max_players.max(1);
        self
    }

    /// A fresh room code not used by any live room.
    pub fn unique_room_code(&self) -> String {
        loop {
            let code = generate_room_code();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    /// Create a room. The creator is actor 1 and the master.
    pub fn create_room(
        &mut self,
        code: String,
        player_name: String,
        tx: EventSender,
    ) -> Result<ActorId, RelayError> {
        if self.rooms.len() >= self.max_rooms {
            return Err(RelayError::MaxRoomsReached(self.max_rooms));
        }
        if self.rooms.contains_key(&code) {
            return Err(RelayError::RoomExists(code));
        }
        let room = RelayRoom::new(player_name, tx);
        let actor_id = room.master;
        room.send(
            actor_id,
            RelayEvent::Joined {
                actor_id,
                room_code: code.clone(),
                players: room.players(),
                master: room.master,
                properties: PropertyWrite::default(),
                revision: 0,
            },
        );
        tracing::info!(room = %code, actor_id, "room created");
        self.rooms.insert(code, room);
        Ok(actor_id)
    }

    /// Join an existing room. The joiner receives a snapshot; everyone else
    /// is told about the new player.
    pub fn join_room(
        &mut self,
        code: &str,
        player_name: String,
        tx: EventSender,
    ) -> Result<ActorId, RelayError> {
        let max_players = self.max_players;
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RelayError::RoomNotFound(code.to_string()))?;
        if room.peers.len() >= max_players {
            return Err(RelayError::RoomFull {
                code: code.to_string(),
                max_players,
            });
        }

        let actor_id = room.add_peer(player_name, tx);
        room.send(
            actor_id,
            RelayEvent::Joined {
                actor_id,
                room_code: code.to_string(),
                players: room.players(),
                master: room.master,
                properties: room.properties.as_write(),
                revision: room.revision,
            },
        );
        if let Some(peer) = room.peers.get(&actor_id) {
            let event = RelayEvent::PlayerJoined(peer.player.clone());
            room.send_all_except(Some(actor_id), &event);
        }
        tracing::info!(room = code, actor_id, players = room.peers.len(), "player joined");
        Ok(actor_id)
    }

    /// Remove a peer. Returns true if the room was destroyed (last peer left).
    ///
    /// When the master leaves, the remaining peer with the lowest actor id
    /// becomes master and every peer is notified.
    pub fn leave_room(&mut self, code: &str, actor_id: ActorId) -> Result<bool, RelayError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RelayError::RoomNotFound(code.to_string()))?;
        if room.peers.remove(&actor_id).is_none() {
            return Err(RelayError::PlayerNotFound(actor_id));
        }

        if room.peers.is_empty() {
            self.rooms.remove(code);
            tracing::info!(room = code, "room destroyed");
            return Ok(true);
        }

        room.send_all_except(None, &RelayEvent::PlayerLeft(actor_id));

        if room.master == actor_id
            && let Some(&next) = room.peers.keys().next()
        {
            room.set_master(next);
            tracing::info!(room = code, old = actor_id, new = next, "master migrated");
            room.send_all_except(None, &RelayEvent::MasterChanged(next));
        }
        Ok(false)
    }

    /// Route an encoded game message by its type byte: requests go to the
    /// master, broadcasts (master only) go to every other peer.
    pub fn relay_message(&self, code: &str, from: ActorId, data: Bytes) -> Result<(), RelayError> {
        let room = self
            .rooms
            .get(code)
            .ok_or_else(|| RelayError::RoomNotFound(code.to_string()))?;
        if !room.peers.contains_key(&from) {
            return Err(RelayError::PlayerNotFound(from));
        }
        let msg_type = peek_message_type(&data).ok_or(RelayError::Unroutable(data.first().copied()))?;

        if is_master_bound(msg_type) {
            room.send(room.master, RelayEvent::Message { from, data });
            return Ok(());
        }
        if from != room.master {
            return Err(RelayError::NotMaster(from));
        }
        room.send_all_except(Some(from), &RelayEvent::Message { from, data });
        Ok(())
    }

    /// Stamp a property write with the next revision, fold it into the room
    /// copy and notify every peer (the writer included). Master only.
    pub fn set_properties(
        &mut self,
        code: &str,
        from: ActorId,
        write: PropertyWrite,
    ) -> Result<u64, RelayError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RelayError::RoomNotFound(code.to_string()))?;
        if from != room.master {
            return Err(RelayError::NotMaster(from));
        }
        room.revision += 1;
        let revision = room.revision;
        room.properties.merge(&write, revision);
        room.send_all_except(None, &RelayEvent::PropertiesChanged { revision, write });
        Ok(revision)
    }

    /// Carry out one coordinator action on behalf of `from`.
    pub fn dispatch(
        &mut self,
        code: &str,
        from: ActorId,
        outbound: Outbound,
    ) -> Result<(), RelayError> {
        match outbound {
            Outbound::ToMaster(msg) | Outbound::Broadcast(msg) => {
                let data =
                    encode_game_message(&msg).map_err(|e| RelayError::Encode(e.to_string()))?;
                self.relay_message(code, from, Bytes::from(data))
            },
            Outbound::SetProperties(write) => self.set_properties(code, from, write).map(|_| ()),
        }
    }

    pub fn room_exists(&self, code: &str) -> bool {
        self.rooms.contains_key(code)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn player_count(&self, code: &str) -> Option<usize> {
        self.rooms.get(code).map(|r| r.peers.len())
    }

    pub fn players(&self, code: &str) -> Option<Vec<Player>> {
        self.rooms.get(code).map(RelayRoom::players)
    }

    pub fn master(&self, code: &str) -> Option<ActorId> {
        self.rooms.get(code).map(|r| r.master)
    }

    pub fn properties(&self, code: &str) -> Option<&RoomProperties> {
        self.rooms.get(code).map(|r| &r.properties)
    }
}

/// Shared relay state behind an async RwLock.
pub type SharedRelayState = Arc<RwLock<RelayState>>;

/// Peek at the first byte of a message to determine routing.
pub fn peek_message_type(data: &[u8]) -> Option<MessageType> {
    data.first().copied().and_then(MessageType::from_byte)
}

/// Whether a message type is addressed to the master rather than everyone.
pub fn is_master_bound(msg_type: MessageType) -> bool {
    msg_type.is_to_master()
}
