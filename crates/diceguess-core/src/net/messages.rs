use serde::{Deserialize, Serialize};

use crate::answers::RoundResult;
use crate::dice::DiceValue;
use crate::player::ActorId;

use super::protocol::ProtocolError;

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Peer -> Master
    SubmitAnswer = 0x01,
    RequestIncrementAnswered = 0x02,
    RequestIncrementReady = 0x03,

    // Master -> All
    DiceSpawned = 0x10,
    ShowResults = 0x11,
    StartNextRound = 0x12,
    GameOver = 0x13,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::SubmitAnswer),
            0x02 => Some(Self::RequestIncrementAnswered),
            0x03 => Some(Self::RequestIncrementReady),
            0x10 => Some(Self::DiceSpawned),
            0x11 => Some(Self::ShowResults),
            0x12 => Some(Self::StartNextRound),
            0x13 => Some(Self::GameOver),
            _ => None,
        }
    }

    /// Whether this message is addressed to the master only.
    pub fn is_to_master(self) -> bool {
        matches!(
            self,
            Self::SubmitAnswer | Self::RequestIncrementAnswered | Self::RequestIncrementReady
        )
    }
}

// ============================================================================
// Peer -> Master messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAnswerMsg {
    pub actor_id: ActorId,
    pub answer: i64,
    pub response_time: f32,
    pub round: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestIncrementAnsweredMsg {
    pub actor_id: ActorId,
    pub round: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestIncrementReadyMsg {
    pub actor_id: ActorId,
    pub round: u32,
}

// ============================================================================
// Master -> All messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceSpawnedMsg {
    pub round: u32,
    pub dice: Vec<DiceValue>,
}

/// Judged results for a round, as parallel arrays (one index per player).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowResultsMsg {
    pub player_names: Vec<String>,
    pub answers: Vec<Option<i64>>,
    pub actor_ids: Vec<ActorId>,
    pub correct_flags: Vec<bool>,
    pub response_times: Vec<f32>,
    pub ranks: Vec<u32>,
    pub correct_answer: i64,
    pub round: u32,
}

impl ShowResultsMsg {
    pub fn from_results(round: u32, correct_answer: i64, results: &[RoundResult]) -> Self {
        Self {
            player_names: results.iter().map(|r| r.display_name.clone()).collect(),
            answers: results.iter().map(|r| r.answer).collect(),
            actor_ids: results.iter().map(|r| r.actor_id).collect(),
            correct_flags: results.iter().map(|r| r.is_correct).collect(),
            response_times: results.iter().map(|r| r.response_time_seconds).collect(),
            ranks: results.iter().map(|r| r.rank).collect(),
            correct_answer,
            round,
        }
    }

    /// Zip the arrays back into results. Every array must have the same length.
    pub fn to_results(&self) -> Result<Vec<RoundResult>, ProtocolError> {
        let n = self.actor_ids.len();
        let lengths = [
            self.player_names.len(),
            self.answers.len(),
            self.correct_flags.len(),
            self.response_times.len(),
            self.ranks.len(),
        ];
        if lengths.iter().any(|&len| len != n) {
            return Err(ProtocolError::MalformedPayload(format!(
                "ShowResults arrays differ in length (actor_ids={n}, others={lengths:?})"
            )));
        }
        Ok((0..n)
            .map(|i| RoundResult {
                actor_id: self.actor_ids[i],
                display_name: self.player_names[i].clone(),
                answer: self.answers[i],
                is_correct: self.correct_flags[i],
                response_time_seconds: self.response_times[i],
                rank: self.ranks[i],
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartNextRoundMsg {
    pub round: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameOverMsg {
    pub round: u32,
}

// ============================================================================
// Unified message enum
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameMessage {
    SubmitAnswer(SubmitAnswerMsg),
    RequestIncrementAnswered(RequestIncrementAnsweredMsg),
    RequestIncrementReady(RequestIncrementReadyMsg),
    DiceSpawned(DiceSpawnedMsg),
    ShowResults(ShowResultsMsg),
    StartNextRound(StartNextRoundMsg),
    GameOver(GameOverMsg),
}

impl GameMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::SubmitAnswer(_) => MessageType::SubmitAnswer,
            Self::RequestIncrementAnswered(_) => MessageType::RequestIncrementAnswered,
            Self::RequestIncrementReady(_) => MessageType::RequestIncrementReady,
            Self::DiceSpawned(_) => MessageType::DiceSpawned,
            Self::ShowResults(_) => MessageType::ShowResults,
            Self::StartNextRound(_) => MessageType::StartNextRound,
            Self::GameOver(_) => MessageType::GameOver,
        }
    }

    /// The round this message belongs to.
    pub fn round(&self) -> u32 {
        match self {
            Self::SubmitAnswer(m) => m.round,
            Self::RequestIncrementAnswered(m) => m.round,
            Self::RequestIncrementReady(m) => m.round,
            Self::DiceSpawned(m) => m.round,
            Self::ShowResults(m) => m.round,
            Self::StartNextRound(m) => m.round,
            Self::GameOver(m) => m.round,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_results() -> Vec<RoundResult> {
        vec![
            RoundResult {
                actor_id: 1,
                display_name: "Alice".into(),
                answer: Some(24),
                is_correct: true,
                response_time_seconds: 1.2,
                rank: 1,
            },
            RoundResult {
                actor_id: 2,
                display_name: "Bob".into(),
                answer: None,
                is_correct: false,
                response_time_seconds: 3.0,
                rank: 2,
            },
        ]
    }

    #[test]
    fn message_type_bytes_are_stable() {
        for t in [
            MessageType::SubmitAnswer,
            MessageType::RequestIncrementAnswered,
            MessageType::RequestIncrementReady,
            MessageType::DiceSpawned,
            MessageType::ShowResults,
            MessageType::StartNextRound,
            MessageType::GameOver,
        ] {
            assert_eq!(MessageType::from_byte(t as u8), Some(t));
        }
        assert_eq!(MessageType::from_byte(0xFF), None);
        assert!(MessageType::SubmitAnswer.is_to_master());
        assert!(!MessageType::ShowResults.is_to_master());
    }

    #[test]
    fn show_results_arrays_zip_back() {
        let results = sample_results();
        let msg = ShowResultsMsg::from_results(3, 24, &results);
        assert_eq!(msg.actor_ids, vec![1, 2]);
        assert_eq!(msg.answers, vec![Some(24), None]);
        assert_eq!(msg.to_results().unwrap(), results);
    }

    #[test]
    fn show_results_rejects_ragged_arrays() {
        let mut msg = ShowResultsMsg::from_results(1, 6, &sample_results());
        msg.ranks.pop();
        assert!(matches!(
            msg.to_results(),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn every_message_carries_its_round() {
        let msg = GameMessage::RequestIncrementReady(RequestIncrementReadyMsg {
            actor_id: 4,
            round: 7,
        });
        assert_eq!(msg.round(), 7);
        assert_eq!(msg.message_type(), MessageType::RequestIncrementReady);
    }
}
