use std::fmt::Write as _;

use tracing::debug;

use crate::history::{HistoryState, ScrollMetrics};
use crate::state::AppState;

/// Terminal rows, in the sidebar's scroll units.
const ROW_HEIGHT: f64 = 24.0;
const VIEWPORT_ROWS: f64 = 20.0;
/// Upper bound on back-to-back fill fetches for one command.
const MAX_FILL_ROUNDS: usize = 10;

fn metrics(state: &HistoryState, at_bottom: bool) -> ScrollMetrics {
    let scroll_height = state.visible_entries().len() as f64 * ROW_HEIGHT;
    let client_height = VIEWPORT_ROWS * ROW_HEIGHT;
    let scroll_top = if at_bottom {
        (scroll_height - client_height).max(0.0)
    } else {
        0.0
    };
    ScrollMetrics {
        scroll_top,
        scroll_height,
        client_height,
    }
}

pub fn render(state: &HistoryState) -> String {
    let visible = state.visible_entries();
    if visible.is_empty() {
        return "No saved conversations.".into();
    }

    let mut out = String::new();
    for entry in visible {
        let preview = entry.preview.as_deref().unwrap_or_default();
        match entry.created_at {
            Some(at) => {
                let _ = writeln!(out, "{}  {}  {}", entry.id, at.format("%Y-%m-%d %H:%M"), preview);
            }
            None => {
                let _ = writeln!(out, "{}  {}", entry.id, preview);
            }
        }
    }
    if state.has_more {
        out.push_str("(more with /more)");
    }
    out.trim_end().to_string()
}

/// Keep loading pages while the visible list cannot fill the viewport.
async fn fill(app: &AppState) -> Result<(), String> {
    for _ in 0..MAX_FILL_ROUNDS {
        let fetched = app
            .history
            .ensure_filled(metrics(&app.history.snapshot(), false))
            .await
            .map_err(|e| e.detail())?;
        if !fetched {
            break;
        }
        app.history.load_previews().await;
    }
    Ok(())
}

/// Reload history from page 1 and show it.
pub async fn list(app: &AppState) -> Result<String, String> {
    app.history.reload().await.map_err(|e| e.detail())?;
    let found = app.history.load_previews().await;
    debug!(found, "sidebar previews after reload");
    fill(app).await?;
    Ok(render(&app.history.snapshot()))
}

/// Scroll to the bottom of the list, fetching the next page.
pub async fn more(app: &AppState) -> Result<String, String> {
    let fetched = app
        .history
        .on_scroll(metrics(&app.history.snapshot(), true))
        .await
        .map_err(|e| e.detail())?;
    if !fetched {
        return Ok("Nothing more to load.".into());
    }
    app.history.load_previews().await;
    fill(app).await?;
    Ok(render(&app.history.snapshot()))
}

pub async fn save(app: &AppState) -> Result<String, String> {
    match app.save_conversation().await.map_err(|e| e.detail())? {
        Some(saved) => Ok(format!("Saved as {}. Started a new chat.", saved.id)),
        None => Ok("Nothing to save.".into()),
    }
}

pub async fn delete(app: &AppState, id: &str) -> Result<String, String> {
    app.delete_conversation(id).await.map_err(|e| e.detail())?;
    Ok(format!("Deleted {id}."))
}
