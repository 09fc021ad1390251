//! Wire shapes of the summarization backend's REST API.
//!
//! Response bodies come in several historical shapes. Each is decoded here
//! into one canonical type so the stores never look at raw payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::REQUEST_FAILED;
use crate::error::ProtocolError;
use crate::types::{Conversation, Message, MessageId, Role, UserProfile};

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: UserProfile,
}

/// Register answers `{message, user}`; profile answers the bare record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserEnvelope {
    Wrapped { user: UserProfile },
    Bare(UserProfile),
}

impl UserEnvelope {
    pub fn into_user(self) -> UserProfile {
        match self {
            UserEnvelope::Wrapped { user } => user,
            UserEnvelope::Bare(user) => user,
        }
    }
}

/// A message record as stored by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(
        rename = "_id",
        alias = "id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default)]
    pub history_id: Option<String>,
    /// `None` when the backend sent an empty or unknown role.
    #[serde(default, deserialize_with = "known_role")]
    pub role: Option<Role>,
    #[serde(default)]
    pub content: String,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize_optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

impl WireMessage {
    /// Outgoing form of a local message, as embedded in a history save.
    pub fn from_message(message: &Message, history_id: Option<&str>) -> Self {
        Self {
            id: (!message.is_temporary()).then(|| message.id.0.clone()),
            history_id: Some(history_id.unwrap_or_default().to_string()),
            role: Some(message.role),
            content: message.content.clone(),
            timestamp: message.timestamp,
        }
    }

    fn history_id(&self) -> Option<String> {
        non_empty(self.history_id.as_deref())
    }
}

impl TryFrom<WireMessage> for Message {
    type Error = ProtocolError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let id = non_empty(wire.id.as_deref())
            .ok_or_else(|| ProtocolError::Malformed("message record without _id".into()))?;
        let role = wire
            .role
            .ok_or_else(|| ProtocolError::Malformed(format!("message {id} has no known role")))?;
        Ok(Message {
            id: MessageId(id),
            role,
            content: wire.content,
            timestamp: wire.timestamp,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveMessageRequest {
    pub history_id: Option<String>,
    pub role: Role,
    pub content: String,
}

/// Every shape the save-message endpoint has answered with.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SaveMessageResponse {
    /// Current shape: persisted user message plus generated summary.
    Pair {
        #[serde(default)]
        history_id: Option<String>,
        user_message: WireMessage,
        #[serde(default)]
        assistant_message: Option<WireMessage>,
    },
    /// Legacy `{message}` wrapper.
    Wrapped { message: WireMessage },
    /// Legacy bare record.
    Bare(WireMessage),
}

/// Canonical result of saving a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedMessages {
    /// Conversation the messages were filed under, if the backend said.
    pub history_id: Option<String>,
    /// Confirmed records in response order.
    pub messages: Vec<Message>,
}

impl TryFrom<SaveMessageResponse> for SavedMessages {
    type Error = ProtocolError;

    fn try_from(resp: SaveMessageResponse) -> Result<Self, Self::Error> {
        match resp {
            SaveMessageResponse::Pair {
                history_id,
                user_message,
                assistant_message,
            } => {
                let history_id =
                    non_empty(history_id.as_deref()).or_else(|| user_message.history_id());
                let mut messages = vec![Message::try_from(user_message)?];
                if let Some(assistant) = assistant_message {
                    messages.push(Message::try_from(assistant)?);
                }
                Ok(SavedMessages {
                    history_id,
                    messages,
                })
            }
            SaveMessageResponse::Wrapped { message } | SaveMessageResponse::Bare(message) => {
                Ok(SavedMessages {
                    history_id: message.history_id(),
                    messages: vec![Message::try_from(message)?],
                })
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessagesResponse {
    Wrapped { messages: Vec<WireMessage> },
    Bare(Vec<WireMessage>),
}

impl MessagesResponse {
    /// Records without a known role are dropped rather than failing the list.
    pub fn into_messages(self) -> Result<Vec<Message>, ProtocolError> {
        let wire = match self {
            MessagesResponse::Wrapped { messages } => messages,
            MessagesResponse::Bare(messages) => messages,
        };
        wire.into_iter()
            .filter(|m| m.role.is_some())
            .map(Message::try_from)
            .collect()
    }
}

/// A history record (conversation header) as stored by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryRecord {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "timestamp::deserialize_optional")]
    pub created_at: Option<DateTime<Utc>>,
}

impl From<HistoryRecord> for Conversation {
    fn from(record: HistoryRecord) -> Self {
        Conversation {
            id: record.id,
            created_at: record.created_at,
            preview: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub history: Vec<HistoryRecord>,
    #[serde(default)]
    pub has_more: Option<bool>,
}

/// One page of the conversation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPage {
    pub entries: Vec<Conversation>,
    pub has_more: bool,
}

impl HistoryResponse {
    /// Without an explicit `has_more`, a full page implies there may be more.
    pub fn into_page(self, limit: u32) -> HistoryPage {
        let has_more = self
            .has_more
            .unwrap_or(self.history.len() >= limit as usize && limit > 0);
        HistoryPage {
            entries: self.history.into_iter().map(Conversation::from).collect(),
            has_more,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveHistoryRequest {
    pub user_id: String,
    pub messages: Vec<WireMessage>,
}

/// Save-history answers `{message, data}` or the bare record.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SaveHistoryResponse {
    Wrapped { data: HistoryRecord },
    Bare(HistoryRecord),
}

impl From<SaveHistoryResponse> for Conversation {
    fn from(resp: SaveHistoryResponse) -> Self {
        match resp {
            SaveHistoryResponse::Wrapped { data } => data.into(),
            SaveHistoryResponse::Bare(record) => record.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SummarizeRequest {
    pub text: String,
}

/// Body of a non-2xx response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// User-visible failure text. Validation errors carry a structured
    /// `detail`, which is rendered as JSON.
    pub fn into_detail(self) -> String {
        match self.detail {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s,
            Some(serde_json::Value::Null) | None => REQUEST_FAILED.to_string(),
            Some(serde_json::Value::String(_)) => REQUEST_FAILED.to_string(),
            Some(other) => other.to_string(),
        }
    }
}

fn known_role<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|v| serde_json::from_value(v).ok()))
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.filter(|s| !s.is_empty()).map(str::to_string)
}

/// Timestamps arrive as RFC 3339 or as naive ISO-8601 in UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").map(|naive| naive.and_utc())
    }

    pub fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(s) if !s.trim().is_empty() => parse(s.trim())
                .map(Some)
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_saved(json: &str) -> SavedMessages {
        let resp: SaveMessageResponse = serde_json::from_str(json).unwrap();
        SavedMessages::try_from(resp).unwrap()
    }

    #[test]
    fn save_response_pair() {
        let saved = decode_saved(
            r#"{
                "history_id": "h1",
                "user_message": {"_id": "m1", "history_id": "h1", "role": "user", "content": "Summarize this."},
                "assistant_message": {"_id": "m2", "history_id": "h1", "role": "assistant", "content": "Here is a summary."}
            }"#,
        );
        assert_eq!(saved.history_id.as_deref(), Some("h1"));
        assert_eq!(saved.messages.len(), 2);
        assert_eq!(saved.messages[0].id, MessageId::from("m1"));
        assert_eq!(saved.messages[1].role, Role::Assistant);
    }

    #[test]
    fn save_response_pair_takes_history_id_from_user_message() {
        let saved = decode_saved(
            r#"{
                "user_message": {"_id": "m1", "history_id": "h9", "role": "user", "content": "x"},
                "assistant_message": null
            }"#,
        );
        assert_eq!(saved.history_id.as_deref(), Some("h9"));
        assert_eq!(saved.messages.len(), 1);
    }

    #[test]
    fn save_response_legacy_wrapper() {
        let saved = decode_saved(
            r#"{"message": {"_id": "m1", "history_id": "", "role": "user", "content": "x"}}"#,
        );
        assert_eq!(saved.history_id, None);
        assert_eq!(saved.messages[0].content, "x");
    }

    #[test]
    fn save_response_bare_record() {
        let saved = decode_saved(
            r#"{"_id": "m7", "history_id": "h2", "role": "assistant", "content": "ok", "timestamp": "2024-05-01T10:20:30.123456"}"#,
        );
        assert_eq!(saved.history_id.as_deref(), Some("h2"));
        assert_eq!(saved.messages[0].id, MessageId::from("m7"));
        assert!(saved.messages[0].timestamp.is_some());
    }

    #[test]
    fn message_without_id_is_rejected() {
        let resp: SaveMessageResponse =
            serde_json::from_str(r#"{"role": "user", "content": "x"}"#).unwrap();
        assert!(SavedMessages::try_from(resp).is_err());
    }

    #[test]
    fn messages_response_shapes() {
        let wrapped: MessagesResponse = serde_json::from_str(
            r#"{"messages": [{"_id": "a", "role": "user", "content": "hi", "timestamp": null}]}"#,
        )
        .unwrap();
        assert_eq!(wrapped.into_messages().unwrap().len(), 1);

        let bare: MessagesResponse =
            serde_json::from_str(r#"[{"_id": "a", "role": "assistant", "content": "hi"}]"#)
                .unwrap();
        assert_eq!(bare.into_messages().unwrap()[0].role, Role::Assistant);
    }

    #[test]
    fn messages_with_unknown_role_are_skipped() {
        let resp: MessagesResponse = serde_json::from_str(
            r#"{"messages": [
                {"_id": "a", "role": "", "content": "system note"},
                {"_id": "b", "role": "user", "content": "hi"},
                {"_id": "c", "role": "tool", "content": "x"},
                {"_id": "d", "content": "no role"}
            ]}"#,
        )
        .unwrap();

        let messages = resp.into_messages().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, MessageId::from("b"));
    }

    #[test]
    fn saved_message_still_needs_a_role() {
        let resp: SaveMessageResponse = serde_json::from_str(
            r#"{"message": {"_id": "m1", "role": "", "content": "x"}}"#,
        )
        .unwrap();
        assert!(SavedMessages::try_from(resp).is_err());
    }

    #[test]
    fn history_page_has_more_fallback() {
        let resp: HistoryResponse =
            serde_json::from_str(r#"{"history": [{"_id": "h1"}, {"_id": "h2"}]}"#).unwrap();
        assert!(resp.into_page(2).has_more);

        let resp: HistoryResponse =
            serde_json::from_str(r#"{"history": [{"_id": "h1"}]}"#).unwrap();
        assert!(!resp.into_page(2).has_more);

        let resp: HistoryResponse =
            serde_json::from_str(r#"{"history": [{"_id": "h1"}], "has_more": true}"#).unwrap();
        assert!(resp.into_page(20).has_more);
    }

    #[test]
    fn save_history_response_shapes() {
        let wrapped: SaveHistoryResponse = serde_json::from_str(
            r#"{"message": "History saved", "data": {"_id": "h1", "user_id": "u1", "created_at": "2024-05-01T10:20:30"}}"#,
        )
        .unwrap();
        let conversation = Conversation::from(wrapped);
        assert_eq!(conversation.id, "h1");
        assert!(conversation.created_at.is_some());

        let bare: SaveHistoryResponse = serde_json::from_str(r#"{"_id": "h2"}"#).unwrap();
        assert_eq!(Conversation::from(bare).id, "h2");
    }

    #[test]
    fn user_envelope_shapes() {
        let wrapped: UserEnvelope = serde_json::from_str(
            r#"{"message": "User created successfully", "user": {"_id": "u1", "username": "ada", "email": "a@b.c"}}"#,
        )
        .unwrap();
        assert_eq!(wrapped.into_user().username, "ada");

        let bare: UserEnvelope =
            serde_json::from_str(r#"{"_id": "u1", "username": "ada", "email": "a@b.c"}"#).unwrap();
        assert_eq!(bare.into_user().email, "a@b.c");
    }

    #[test]
    fn error_body_detail() {
        let body: ErrorBody = serde_json::from_str(r#"{"detail": "Invalid token"}"#).unwrap();
        assert_eq!(body.into_detail(), "Invalid token");

        let body: ErrorBody = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(body.into_detail(), REQUEST_FAILED);

        let body: ErrorBody =
            serde_json::from_str(r#"{"detail": [{"loc": ["body"], "msg": "field required"}]}"#)
                .unwrap();
        assert!(body.into_detail().contains("field required"));
    }

    #[test]
    fn timestamp_formats() {
        assert!(timestamp::parse("2024-05-01T10:20:30Z").is_ok());
        assert!(timestamp::parse("2024-05-01T10:20:30+02:00").is_ok());
        assert!(timestamp::parse("2024-05-01T10:20:30").is_ok());
        assert!(timestamp::parse("2024-05-01T10:20:30.5").is_ok());
        assert!(timestamp::parse("yesterday").is_err());
    }

    #[test]
    fn outgoing_history_message_drops_temporary_id() {
        let local = Message::temporary(Role::User, "x");
        let wire = WireMessage::from_message(&local, Some("h1"));
        assert_eq!(wire.id, None);
        assert_eq!(wire.history_id.as_deref(), Some("h1"));

        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("_id").is_none());
    }
}
