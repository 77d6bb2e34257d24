//! Shared event model and JSON codec for the realtime chat socket.
//!
//! This crate owns the wire representation exchanged between the chat page
//! and the server. Every socket message is a JSON text frame shaped as
//! `{"event": "<name>", "data": <payload>}`; payload field names follow the
//! server's chat handlers (`message_id`, `message`, `system`, ...).

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

/// Avatar shown for messages whose payload carries no picture URL.
pub const PLACEHOLDER_AVATAR_URL: &str = "/static/images/profile-placeholder.png";

/// Error returned by [`decode_server_event`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text frame is not a JSON `{event, data}` envelope.
    #[error("failed to decode event envelope: {0}")]
    Envelope(#[from] serde_json::Error),
    /// The envelope names an event this client does not understand.
    #[error("unknown event: {0}")]
    UnknownEvent(String),
    /// The envelope is well formed but its payload does not match the event.
    #[error("invalid payload for `{event}`: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Opaque message identifier, unique within a session.
///
/// The server assigns integer row ids while moderator commands carry them as
/// text, so both JSON strings and integers deserialize into the same id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl<'de> Deserialize<'de> for MessageId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserialize_string_or_number(deserializer).map(Self)
    }
}

/// A chat message as broadcast by the server or returned by a history page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Row id; live broadcasts send `message_id`, history pages send `id`.
    /// System notices carry none.
    #[serde(rename = "message_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    /// Author display name (`"System"` for server notices).
    pub username: String,
    /// Message body.
    #[serde(rename = "message")]
    pub text: String,
    /// Avatar URL. History pages omit it.
    #[serde(default = "placeholder_avatar_url")]
    pub profile_picture_url: String,
    /// Transient server notice, removed from the view after a short window.
    #[serde(rename = "system", default)]
    pub is_system: bool,
    /// Server-side creation time, when the payload includes one.
    #[serde(
        default,
        deserialize_with = "deserialize_opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<String>,
}

/// Events the server pushes to the chat page.
#[derive(Clone, Debug, PartialEq)]
pub enum ServerEvent {
    /// A new chat row (user message or system notice).
    Message(ChatMessage),
    /// A moderator removed a message.
    MessageDeleted { message_id: MessageId },
    /// Full list of connected usernames.
    UpdateUserList(Vec<String>),
    UserTyping { username: String },
    UserStoppedTyping { username: String },
    UserJoined { username: String },
    UserLeft { username: String },
    /// The server closed this session (e.g. the user logged in elsewhere).
    ForceDisconnect { message: String },
}

impl ServerEvent {
    /// Wire name of the event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::MessageDeleted { .. } => "message_deleted",
            Self::UpdateUserList(_) => "update_user_list",
            Self::UserTyping { .. } => "user_typing",
            Self::UserStoppedTyping { .. } => "user_stopped_typing",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
            Self::ForceDisconnect { .. } => "force_disconnect",
        }
    }
}

/// Events the chat page sends to the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClientEvent {
    Typing,
    StopTyping,
    /// Post a chat line. Slash commands other than `/delete` travel here too
    /// and are interpreted by the server.
    Message { message: String },
    DeleteMessage { message_id: MessageId },
}

impl ClientEvent {
    /// Wire name of the event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Typing => "typing",
            Self::StopTyping => "stop_typing",
            Self::Message { .. } => "message",
            Self::DeleteMessage { .. } => "delete_message",
        }
    }

    fn data(&self) -> Option<Value> {
        match self {
            Self::Typing | Self::StopTyping => None,
            Self::Message { message } => Some(json!({ "message": message })),
            Self::DeleteMessage { message_id } => Some(json!({ "message_id": message_id })),
        }
    }
}

/// Encode an outbound event as a JSON text frame.
///
/// Events without a payload omit the `data` field.
#[must_use]
pub fn encode_client_event(event: &ClientEvent) -> String {
    let mut envelope = json!({ "event": event.name() });
    if let (Some(data), Value::Object(map)) = (event.data(), &mut envelope) {
        map.insert("data".to_owned(), data);
    }
    envelope.to_string()
}

/// Decode an inbound JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Envelope`] for text that is not an event envelope,
/// [`CodecError::UnknownEvent`] for unrecognised event names, and
/// [`CodecError::Payload`] when the payload does not fit the named event.
pub fn decode_server_event(text: &str) -> Result<ServerEvent, CodecError> {
    let Envelope { event, data } = serde_json::from_str(text)?;

    match event.as_str() {
        "message" => payload(&event, data).map(ServerEvent::Message),
        "message_deleted" => payload::<MessageIdPayload>(&event, data)
            .map(|p| ServerEvent::MessageDeleted { message_id: p.message_id }),
        "update_user_list" => payload(&event, data).map(ServerEvent::UpdateUserList),
        "user_typing" => {
            payload::<UserPayload>(&event, data).map(|p| ServerEvent::UserTyping { username: p.username })
        }
        "user_stopped_typing" => payload::<UserPayload>(&event, data)
            .map(|p| ServerEvent::UserStoppedTyping { username: p.username }),
        "user_joined" => {
            payload::<UserPayload>(&event, data).map(|p| ServerEvent::UserJoined { username: p.username })
        }
        "user_left" => {
            payload::<UserPayload>(&event, data).map(|p| ServerEvent::UserLeft { username: p.username })
        }
        "force_disconnect" => payload::<NoticePayload>(&event, data)
            .map(|p| ServerEvent::ForceDisconnect { message: p.message }),
        _ => Err(CodecError::UnknownEvent(event)),
    }
}

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Deserialize)]
struct MessageIdPayload {
    message_id: MessageId,
}

#[derive(Deserialize)]
struct UserPayload {
    username: String,
}

#[derive(Deserialize)]
struct NoticePayload {
    message: String,
}

fn payload<T: DeserializeOwned>(event: &str, data: Value) -> Result<T, CodecError> {
    serde_json::from_value(data).map_err(|source| CodecError::Payload { event: event.to_owned(), source })
}

fn placeholder_avatar_url() -> String {
    PLACEHOLDER_AVATAR_URL.to_owned()
}

fn deserialize_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(D::Error::custom(format!("expected string or number, got {other}"))),
    }
}

fn deserialize_opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text)),
        Value::Number(number) => Ok(Some(number.to_string())),
        other => Err(D::Error::custom(format!("expected string or number, got {other}"))),
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
