//! Scripted in-memory [`Gateway`] for store tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use precis_shared::protocol::{
    HistoryPage, LoginRequest, LoginResponse, RegisterRequest, SaveHistoryRequest,
    SaveMessageRequest, SavedMessages,
};
use precis_shared::{Conversation, GatewayError, Message, MessageId, Role, Summary, UserProfile};

use crate::gateway::{Gateway, GatewayResult};

type Script<T> = Mutex<VecDeque<GatewayResult<T>>>;

#[derive(Default)]
pub struct FakeGateway {
    pub calls: Mutex<Vec<String>>,
    pub register: Script<UserProfile>,
    pub login: Script<LoginResponse>,
    pub profile: Script<UserProfile>,
    pub messages: Script<Vec<Message>>,
    /// Per-conversation answers for `messages`, consulted before the queue.
    pub messages_by_id: Mutex<HashMap<String, GatewayResult<Vec<Message>>>>,
    pub save_message: Script<SavedMessages>,
    pub history: Script<HistoryPage>,
    pub save_history: Script<Conversation>,
    pub delete_history: Script<()>,
    pub summarize: Script<Summary>,
    pub saved_requests: Mutex<Vec<SaveMessageRequest>>,
    pub saved_histories: Mutex<Vec<SaveHistoryRequest>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T>(script: &Script<T>, result: GatewayResult<T>) {
        script.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn next<T>(script: &Script<T>, op: &str) -> GatewayResult<T> {
        script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Network(format!("unscripted call: {op}"))))
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn register(&self, req: &RegisterRequest) -> GatewayResult<UserProfile> {
        self.record(format!("register {}", req.email));
        Self::next(&self.register, "register")
    }

    async fn login(&self, req: &LoginRequest) -> GatewayResult<LoginResponse> {
        self.record(format!("login {}", req.email));
        Self::next(&self.login, "login")
    }

    async fn profile(&self) -> GatewayResult<UserProfile> {
        self.record("profile".into());
        Self::next(&self.profile, "profile")
    }

    async fn messages(&self, history_id: Option<&str>, limit: u32) -> GatewayResult<Vec<Message>> {
        self.record(format!("messages {} limit={limit}", history_id.unwrap_or("-")));
        if let Some(id) = history_id {
            if let Some(result) = self.messages_by_id.lock().unwrap().get(id) {
                return result.clone();
            }
        }
        Self::next(&self.messages, "messages")
    }

    async fn save_message(&self, req: &SaveMessageRequest) -> GatewayResult<SavedMessages> {
        self.record(format!("save_message {}", req.content));
        self.saved_requests.lock().unwrap().push(req.clone());
        Self::next(&self.save_message, "save_message")
    }

    async fn history(&self, limit: u32, skip: u32) -> GatewayResult<HistoryPage> {
        self.record(format!("history limit={limit} skip={skip}"));
        // Suspend once, like a real round trip, so overlapping callers interleave.
        tokio::task::yield_now().await;
        Self::next(&self.history, "history")
    }

    async fn save_history(&self, req: &SaveHistoryRequest) -> GatewayResult<Conversation> {
        self.record(format!("save_history {}", req.messages.len()));
        self.saved_histories.lock().unwrap().push(req.clone());
        Self::next(&self.save_history, "save_history")
    }

    async fn delete_history(&self, history_id: &str) -> GatewayResult<()> {
        self.record(format!("delete_history {history_id}"));
        Self::next(&self.delete_history, "delete_history")
    }

    async fn summarize(&self, text: &str) -> GatewayResult<Summary> {
        self.record(format!("summarize {text}"));
        Self::next(&self.summarize, "summarize")
    }
}

pub fn message(id: &str, role: Role, content: &str) -> Message {
    Message {
        id: MessageId::from(id),
        role,
        content: content.to_string(),
        timestamp: None,
    }
}

pub fn ada() -> UserProfile {
    UserProfile {
        id: Some("u1".into()),
        username: "ada".into(),
        email: "ada@example.com".into(),
    }
}

pub fn conversations(ids: impl IntoIterator<Item = String>) -> Vec<Conversation> {
    ids.into_iter().map(Conversation::new).collect()
}

pub fn http_error(status: u16, detail: &str) -> GatewayError {
    GatewayError::Http {
        status,
        detail: detail.to_string(),
    }
}
