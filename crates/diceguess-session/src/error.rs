use diceguess_relay::RelayError;

#[derive(Debug)]
pub enum SessionError {
    Relay(RelayError),
    Config(String),
    /// The game did not finish within the configured time.
    TimedOut(u64),
    /// Every peer task exited before the game finished.
    Aborted,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relay(e) => write!(f, "relay error: {e}"),
            Self::Config(e) => write!(f, "invalid configuration: {e}"),
            Self::TimedOut(secs) => write!(f, "game did not finish within {secs}s"),
            Self::Aborted => write!(f, "all peers exited before the game finished"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Relay(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RelayError> for SessionError {
    fn from(e: RelayError) -> Self {
        Self::Relay(e)
    }
}
