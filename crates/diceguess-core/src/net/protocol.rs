use serde::{Deserialize, Serialize};

use super::messages::{
    DiceSpawnedMsg, GameMessage, GameOverMsg, MessageType, RequestIncrementAnsweredMsg,
    RequestIncrementReadyMsg, ShowResultsMsg, StartNextRoundMsg, SubmitAnswerMsg,
};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Default peer tick rate in Hz.
pub const DEFAULT_TICK_RATE_HZ: u32 = 10;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024; // 16 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
    /// Decoded fine but violates a structural rule of the message.
    MalformedPayload(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
            Self::MalformedPayload(e) => write!(f, "malformed payload: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `GameMessage` to wire format.
pub fn encode_game_message(msg: &GameMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        GameMessage::SubmitAnswer(m) => encode_message(MessageType::SubmitAnswer, m),
        GameMessage::RequestIncrementAnswered(m) => {
            encode_message(MessageType::RequestIncrementAnswered, m)
        },
        GameMessage::RequestIncrementReady(m) => {
            encode_message(MessageType::RequestIncrementReady, m)
        },
        GameMessage::DiceSpawned(m) => encode_message(MessageType::DiceSpawned, m),
        GameMessage::ShowResults(m) => encode_message(MessageType::ShowResults, m),
        GameMessage::StartNextRound(m) => encode_message(MessageType::StartNextRound, m),
        GameMessage::GameOver(m) => encode_message(MessageType::GameOver, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(data.len()));
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `GameMessage`.
pub fn decode_game_message(data: &[u8]) -> Result<GameMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    let msg = match msg_type {
        MessageType::SubmitAnswer => {
            GameMessage::SubmitAnswer(decode_payload::<SubmitAnswerMsg>(data)?)
        },
        MessageType::RequestIncrementAnswered => GameMessage::RequestIncrementAnswered(
            decode_payload::<RequestIncrementAnsweredMsg>(data)?,
        ),
        MessageType::RequestIncrementReady => GameMessage::RequestIncrementReady(
            decode_payload::<RequestIncrementReadyMsg>(data)?,
        ),
        MessageType::DiceSpawned => {
            GameMessage::DiceSpawned(decode_payload::<DiceSpawnedMsg>(data)?)
        },
        MessageType::ShowResults => {
            let m = decode_payload::<ShowResultsMsg>(data)?;
            // Reject ragged arrays at the boundary
            m.to_results()?;
            GameMessage::ShowResults(m)
        },
        MessageType::StartNextRound => {
            GameMessage::StartNextRound(decode_payload::<StartNextRoundMsg>(data)?)
        },
        MessageType::GameOver => GameMessage::GameOver(decode_payload::<GameOverMsg>(data)?),
    };
    Ok(msg)
}
