pub mod bot;
pub mod config;
pub mod error;
pub mod peer_loop;
pub mod presenter;
pub mod sim;

pub use error::SessionError;
pub use peer_loop::{PeerCommand, PeerConfig, PeerHandle, PeerReport, RoomEntry, spawn_peer};
pub use sim::{SimulationReport, run_simulation};
