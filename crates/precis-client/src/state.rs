//! Application state shared by every front-end command.
//!
//! [`AppState`] owns the storage handle, the gateway and the three stores,
//! and implements the transitions that touch more than one store.

use std::sync::Arc;

use tracing::{info, warn};

use precis_shared::protocol::{SaveHistoryRequest, WireMessage};
use precis_shared::{Conversation, Summary};
use precis_store::{Database, Storage};

use crate::config::ClientConfig;
use crate::conversation::ConversationStore;
use crate::error::{ClientError, Result};
use crate::gateway::{Gateway, HttpGateway};
use crate::history::HistoryStore;
use crate::session::SessionStore;

pub struct AppState {
    pub config: ClientConfig,
    pub gateway: Arc<dyn Gateway>,
    pub session: SessionStore,
    pub conversation: ConversationStore,
    pub history: HistoryStore,
}

impl AppState {
    /// Assemble the stores around an existing storage and gateway.
    pub fn new(
        config: ClientConfig,
        storage: Arc<dyn Storage>,
        gateway: Arc<dyn Gateway>,
    ) -> Result<Self> {
        let session = SessionStore::hydrate(gateway.clone(), storage)?;
        let conversation = ConversationStore::new(gateway.clone(), config.message_limit);
        let history = HistoryStore::new(gateway.clone(), config.history_page_size);

        Ok(Self {
            config,
            gateway,
            session,
            conversation,
            history,
        })
    }

    /// Open the on-disk database and connect to the configured backend.
    pub fn connect(config: ClientConfig) -> Result<Self> {
        let database = match &config.data_dir {
            Some(dir) => Database::open_in(dir)?,
            None => Database::new()?,
        };
        let storage: Arc<dyn Storage> = Arc::new(database);
        let gateway: Arc<dyn Gateway> = Arc::new(HttpGateway::new(&config, storage.clone())?);

        info!(api_url = %config.api_url, "client ready");
        Self::new(config, storage, gateway)
    }

    pub async fn open_conversation(&self, id: &str) -> Result<()> {
        self.conversation.load_conversation(id).await
    }

    pub fn start_new_chat(&self) {
        self.conversation.clear();
    }

    /// File the active messages as a history record, put it on top of the
    /// sidebar, start a fresh chat, then reload history from page 1.
    ///
    /// Returns `None` when there is nothing to save.
    pub async fn save_conversation(&self) -> Result<Option<Conversation>> {
        let user_id = self
            .session
            .identity()
            .and_then(|user| user.id)
            .ok_or(ClientError::NotAuthenticated)?;

        let snapshot = self.conversation.snapshot();
        if snapshot.messages.is_empty() {
            return Ok(None);
        }

        let history_id = snapshot.active_conversation_id.as_deref();
        let req = SaveHistoryRequest {
            user_id,
            messages: snapshot
                .messages
                .iter()
                .map(|m| WireMessage::from_message(m, history_id))
                .collect(),
        };

        let saved = self.gateway.save_history(&req).await?;
        info!(history_id = %saved.id, messages = req.messages.len(), "conversation saved");

        self.history.record_saved(saved.clone());
        self.conversation.clear();
        if let Err(e) = self.history.reload().await {
            warn!(error = %e, "history reload after save failed");
        }
        Ok(Some(saved))
    }

    /// Delete a conversation remotely and drop it from every store.
    pub async fn delete_conversation(&self, id: &str) -> Result<()> {
        self.gateway.delete_history(id).await?;
        self.history.remove(id);
        if self.conversation.active_conversation_id().as_deref() == Some(id) {
            self.conversation.clear();
        }
        info!(history_id = %id, "conversation deleted");
        Ok(())
    }

    pub async fn summarize(&self, text: &str) -> Result<Summary> {
        Ok(self.gateway.summarize(text).await?)
    }

    /// Sign out and drop everything cached for the previous user.
    pub fn logout(&self) {
        self.session.logout();
        self.conversation.clear();
        self.conversation.clear_input();
        self.history.reset();
    }
}
