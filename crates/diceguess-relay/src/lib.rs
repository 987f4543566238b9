pub mod relay;

pub use relay::{RelayError, RelayEvent, RelayState, SharedRelayState};
