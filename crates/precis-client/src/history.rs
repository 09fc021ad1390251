//! History store: a paginated, most-recent-first cache of past
//! conversations, as shown in the sidebar.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use tracing::{debug, info, warn};

use precis_shared::constants::{PREVIEW_WINDOW, SCROLL_FETCH_THRESHOLD};
use precis_shared::{preview_for, Conversation};

use crate::error::Result;
use crate::gateway::Gateway;
use crate::inflight::InFlight;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub skip: u32,
    /// `false` replaces the cache (page 1); `true` extends it.
    pub append: bool,
}

impl PageRequest {
    pub fn first(limit: u32) -> Self {
        Self {
            limit,
            skip: 0,
            append: false,
        }
    }
}

/// Geometry of the scrollable sidebar, in whatever unit the view uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    /// Distance left between the viewport's bottom edge and the content's.
    pub fn remaining(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }

    pub fn near_bottom(&self) -> bool {
        self.remaining() < SCROLL_FETCH_THRESHOLD
    }

    /// Content does not fill the viewport, so no scroll event will come.
    pub fn underfilled(&self) -> bool {
        self.scroll_height <= self.client_height
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryState {
    pub entries: Vec<Conversation>,
    pub has_more: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    /// Entries whose messages contain no user message.
    pub previewless: HashSet<String>,
}

impl Default for HistoryState {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            has_more: true,
            is_loading: false,
            error: None,
            previewless: HashSet::new(),
        }
    }
}

impl HistoryState {
    /// Entries the sidebar renders: those with a preview.
    pub fn visible_entries(&self) -> Vec<&Conversation> {
        self.entries.iter().filter(|e| e.preview.is_some()).collect()
    }

    fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }
}

pub struct HistoryStore {
    gateway: Arc<dyn Gateway>,
    state: Mutex<HistoryState>,
    page_size: u32,
    page_in_flight: InFlight,
}

impl HistoryStore {
    pub fn new(gateway: Arc<dyn Gateway>, page_size: u32) -> Self {
        Self {
            gateway,
            state: Mutex::new(HistoryState::default()),
            page_size,
            page_in_flight: InFlight::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, HistoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> HistoryState {
        self.state().clone()
    }

    /// Fetch one page and merge it into the cache.
    pub async fn load_page(&self, req: PageRequest) -> Result<()> {
        {
            let mut state = self.state();
            state.is_loading = true;
            state.error = None;
        }

        let result = self.gateway.history(req.limit, req.skip).await;

        let mut state = self.state();
        state.is_loading = false;
        let page = match result {
            Ok(page) => page,
            Err(e) => {
                warn!(skip = req.skip, error = %e, "history page failed");
                state.error = Some(e.detail());
                return Err(e.into());
            }
        };

        let fetched = page.entries.len();
        if req.append {
            let mut seen: HashSet<String> = state.entries.iter().map(|e| e.id.clone()).collect();
            let fresh: Vec<Conversation> = page
                .entries
                .into_iter()
                .filter(|e| seen.insert(e.id.clone()))
                .collect();
            state.entries.extend(fresh);
        } else {
            let previews: HashMap<String, String> = state
                .entries
                .drain(..)
                .filter_map(|e| e.preview.map(|p| (e.id, p)))
                .collect();
            state.previewless.clear();
            let mut seen = HashSet::new();
            state.entries = page
                .entries
                .into_iter()
                .filter(|e| seen.insert(e.id.clone()))
                .map(|mut e| {
                    if e.preview.is_none() {
                        e.preview = previews.get(&e.id).cloned();
                    }
                    e
                })
                .collect();
        }
        state.has_more = page.has_more;

        info!(
            skip = req.skip,
            append = req.append,
            fetched,
            total = state.entries.len(),
            has_more = state.has_more,
            "history page loaded"
        );
        Ok(())
    }

    /// Reload from page 1.
    pub async fn reload(&self) -> Result<()> {
        self.load_page(PageRequest::first(self.page_size)).await
    }

    /// Fetch the next page unless one is already in flight or none is left.
    /// Returns whether a fetch was made.
    pub async fn load_more(&self) -> Result<bool> {
        let skip = {
            let state = self.state();
            if !state.has_more || state.is_loading {
                return Ok(false);
            }
            state.entries.len() as u32
        };

        let Some(_token) = self.page_in_flight.try_begin() else {
            debug!("next history page already in flight");
            return Ok(false);
        };

        self.load_page(PageRequest {
            limit: self.page_size,
            skip,
            append: true,
        })
        .await?;
        Ok(true)
    }

    /// Scroll handler: fetch the next page when close to the bottom.
    pub async fn on_scroll(&self, metrics: ScrollMetrics) -> Result<bool> {
        if !metrics.near_bottom() {
            return Ok(false);
        }
        self.load_more().await
    }

    /// Mount / post-load check: keep fetching while the list cannot scroll.
    pub async fn ensure_filled(&self, metrics: ScrollMetrics) -> Result<bool> {
        if !metrics.underfilled() {
            return Ok(false);
        }
        self.load_more().await
    }

    /// Put a just-saved conversation on top, unless it is already listed.
    pub fn record_saved(&self, conversation: Conversation) -> bool {
        let mut state = self.state();
        if state.contains(&conversation.id) {
            return false;
        }
        state.entries.insert(0, conversation);
        true
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut state = self.state();
        let before = state.entries.len();
        state.entries.retain(|e| e.id != id);
        state.previewless.remove(id);
        state.entries.len() != before
    }

    pub fn reset(&self) {
        *self.state() = HistoryState::default();
    }

    /// Derive missing previews: fetch the first messages of every entry
    /// without one, concurrently. Returns how many previews were found.
    pub async fn load_previews(&self) -> usize {
        let pending: Vec<String> = {
            let state = self.state();
            state
                .entries
                .iter()
                .filter(|e| e.preview.is_none() && !state.previewless.contains(&e.id))
                .map(|e| e.id.clone())
                .collect()
        };
        if pending.is_empty() {
            return 0;
        }

        let fetches = pending.iter().map(|id| async move {
            let result = self.gateway.messages(Some(id.as_str()), PREVIEW_WINDOW).await;
            (id, result)
        });
        let results = join_all(fetches).await;

        let mut state = self.state();
        let mut found = 0;
        for (id, result) in results {
            match result {
                Ok(messages) => match preview_for(&messages) {
                    Some(preview) => {
                        if let Some(entry) = state.entries.iter_mut().find(|e| &e.id == id) {
                            entry.preview = Some(preview);
                            found += 1;
                        }
                    }
                    None => {
                        state.previewless.insert(id.clone());
                    }
                },
                Err(e) => warn!(history_id = %id, error = %e, "preview fetch failed"),
            }
        }
        debug!(requested = pending.len(), found, "previews loaded");
        found
    }
}
