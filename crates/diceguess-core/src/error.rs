use crate::player::ActorId;

/// Local, non-fatal game errors. None of these abort a round: callers log
/// them and continue with degraded data.
#[derive(Debug, Clone, PartialEq)]
pub enum GameError {
    /// A referenced collaborator or asset (die catalog entry, presenter
    /// element) is absent.
    ConfigurationMissing(String),
    /// Player input that does not parse as an integer answer.
    MalformedAnswer(String),
    /// No non-overlapping spawn position was found within the attempt budget.
    SpawnPositionExhausted { attempts: u32 },
    /// An authority-only operation was invoked on a non-master peer.
    AuthorityMismatch {
        operation: &'static str,
        actor_id: ActorId,
    },
}

impl std::fmt::Display for GameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigurationMissing(what) => write!(f, "configuration missing: {what}"),
            Self::MalformedAnswer(input) => write!(f, "malformed answer: {input:?}"),
            Self::SpawnPositionExhausted { attempts } => {
                write!(f, "no free spawn position after {attempts} attempts")
            },
            Self::AuthorityMismatch {
                operation,
                actor_id,
            } => write!(
                f,
                "{operation} requires the master role (actor {actor_id} is not master)"
            ),
        }
    }
}

impl std::error::Error for GameError {}

/// Parse raw player input into an integer answer.
///
/// Surrounding whitespace is ignored; anything else that `i64::from_str`
/// rejects (empty input, signs only, digits that overflow) is malformed.
pub fn parse_answer(input: &str) -> Result<i64, GameError> {
    let trimmed = input.trim();
    trimmed
        .parse::<i64>()
        .map_err(|_| GameError::MalformedAnswer(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_integers() {
        assert_eq!(parse_answer("24"), Ok(24));
        assert_eq!(parse_answer("  120\n"), Ok(120));
        assert_eq!(parse_answer("-3"), Ok(-3));
    }

    #[test]
    fn rejects_non_integers() {
        assert!(matches!(
            parse_answer(""),
            Err(GameError::MalformedAnswer(_))
        ));
        assert!(matches!(
            parse_answer("12a"),
            Err(GameError::MalformedAnswer(_))
        ));
        assert!(matches!(
            parse_answer("99999999999999999999999"),
            Err(GameError::MalformedAnswer(_))
        ));
    }

    #[test]
    fn display_messages() {
        let err = GameError::AuthorityMismatch {
            operation: "judge",
            actor_id: 3,
        };
        assert_eq!(
            err.to_string(),
            "judge requires the master role (actor 3 is not master)"
        );
        let err = GameError::SpawnPositionExhausted { attempts: 100 };
        assert_eq!(err.to_string(), "no free spawn position after 100 attempts");
    }
}
