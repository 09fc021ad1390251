//! Conversation store: the active message list and its reconciliation
//! with what the backend confirms.
//!
//! Sending is optimistic. The user's message is appended under a temporary
//! id before the request goes out; when the backend answers, each returned
//! record is [reconciled](reconcile) into the list. Responses are applied in
//! arrival order, so matching is by id, then by role, never by request order.
//!
//! Two sends in flight at once can swap placeholders: both confirmations
//! look for "the latest temporary user message". Requests carry no
//! correlation token the backend would echo back.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use precis_shared::protocol::SaveMessageRequest;
use precis_shared::{Message, Role};

use crate::error::Result;
use crate::gateway::Gateway;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationState {
    /// Append order.
    pub messages: Vec<Message>,
    /// Pending text in the composer.
    pub input: String,
    /// Backend id of the conversation on screen; `None` for a new chat.
    pub active_conversation_id: Option<String>,
    pub is_loading: bool,
    pub pending_sends: usize,
    pub error: Option<String>,
}

impl ConversationState {
    pub fn is_sending(&self) -> bool {
        self.pending_sends > 0
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Append unless a message with the same id is already present.
pub fn append_unique(messages: &mut Vec<Message>, message: Message) -> bool {
    if messages.iter().any(|m| m.id == message.id) {
        return false;
    }
    messages.push(message);
    true
}

/// Merge one server-confirmed message into the list:
/// 1. same id already present: overwrite it (redelivery);
/// 2. otherwise the latest temporary message of the same role is replaced
///    in place;
/// 3. otherwise append.
pub fn reconcile(messages: &mut Vec<Message>, confirmed: Message) {
    if let Some(existing) = messages.iter_mut().find(|m| m.id == confirmed.id) {
        *existing = confirmed;
        return;
    }

    if let Some(placeholder) = messages
        .iter_mut()
        .rev()
        .find(|m| m.role == confirmed.role && m.is_temporary())
    {
        *placeholder = confirmed;
        return;
    }

    messages.push(confirmed);
}

pub struct ConversationStore {
    gateway: Arc<dyn Gateway>,
    state: Mutex<ConversationState>,
    message_limit: u32,
}

impl ConversationStore {
    pub fn new(gateway: Arc<dyn Gateway>, message_limit: u32) -> Self {
        Self {
            gateway,
            state: Mutex::new(ConversationState::default()),
            message_limit,
        }
    }

    fn state(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> ConversationState {
        self.state().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    pub fn active_conversation_id(&self) -> Option<String> {
        self.state().active_conversation_id.clone()
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.state().input = text.into();
    }

    pub fn clear_input(&self) {
        self.state().input.clear();
    }

    pub fn append_local(&self, message: Message) -> bool {
        append_unique(&mut self.state().messages, message)
    }

    /// Send the composer's content.
    pub async fn submit_input(&self) -> Result<()> {
        let input = self.state().input.clone();
        self.send_message(&input).await
    }

    /// Optimistically append `content` as a user message and persist it.
    ///
    /// Blank content is ignored. On failure the temporary message stays in
    /// the list, unconfirmed; resending is the recovery path.
    pub async fn send_message(&self, content: &str) -> Result<()> {
        let content = content.trim();
        if content.is_empty() {
            debug!("ignoring blank message");
            return Ok(());
        }

        let history_id = {
            let mut state = self.state();
            append_unique(&mut state.messages, Message::temporary(Role::User, content));
            state.input.clear();
            state.pending_sends += 1;
            state.error = None;
            state.active_conversation_id.clone()
        };

        let req = SaveMessageRequest {
            history_id,
            role: Role::User,
            content: content.to_string(),
        };
        let result = self.gateway.save_message(&req).await;

        let mut state = self.state();
        state.pending_sends = state.pending_sends.saturating_sub(1);
        match result {
            Ok(saved) => {
                if state.active_conversation_id.is_none() {
                    if let Some(id) = saved.history_id {
                        info!(history_id = %id, "new conversation started");
                        state.active_conversation_id = Some(id);
                    }
                }
                for message in saved.messages {
                    reconcile(&mut state.messages, message);
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "message not saved");
                state.error = Some(e.detail());
                Err(e.into())
            }
        }
    }

    /// Replace the list with conversation `id` as stored by the backend.
    pub async fn load_conversation(&self, id: &str) -> Result<()> {
        {
            let mut state = self.state();
            state.is_loading = true;
            state.error = None;
        }

        let result = self.gateway.messages(Some(id), self.message_limit).await;

        let mut state = self.state();
        state.is_loading = false;
        match result {
            Ok(fetched) => {
                let mut messages = Vec::with_capacity(fetched.len());
                for message in fetched {
                    append_unique(&mut messages, message);
                }
                info!(history_id = %id, count = messages.len(), "conversation loaded");
                state.messages = messages;
                state.active_conversation_id = Some(id.to_string());
                Ok(())
            }
            Err(e) => {
                warn!(history_id = %id, error = %e, "conversation load failed");
                state.error = Some(e.detail());
                Err(e.into())
            }
        }
    }

    /// Empty the list and forget the active conversation (new chat).
    pub fn clear(&self) {
        let mut state = self.state();
        state.messages.clear();
        state.active_conversation_id = None;
    }

    pub fn clear_error(&self) {
        self.state().error = None;
    }
}
