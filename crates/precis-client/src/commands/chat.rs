use std::fmt::Write as _;

use precis_shared::Message;

use crate::state::AppState;

/// Render the message list the way the transcript pane shows it.
pub fn render(messages: &[Message]) -> String {
    let mut out = String::new();
    for m in messages {
        let marker = if m.is_temporary() { " (sending)" } else { "" };
        let _ = writeln!(out, "[{}{}] {}", m.role, marker, m.content);
    }
    out.trim_end().to_string()
}

/// Send a chat message through the composer and show the updated transcript.
pub async fn send(app: &AppState, text: &str) -> Result<String, String> {
    app.conversation.set_input(text);
    let result = app.conversation.submit_input().await;
    let transcript = render(&app.conversation.messages());
    match result {
        Ok(()) => Ok(transcript),
        Err(e) => {
            app.conversation.clear_error();
            Err(format!("{transcript}\n{}", e.detail()))
        }
    }
}

pub async fn open(app: &AppState, id: &str) -> Result<String, String> {
    app.open_conversation(id).await.map_err(|e| e.detail())?;
    let messages = app.conversation.messages();
    if messages.is_empty() {
        return Ok(format!("Conversation {id} is empty."));
    }
    Ok(render(&messages))
}

pub fn new_chat(app: &AppState) -> String {
    app.start_new_chat();
    "Started a new chat.".into()
}

pub async fn summarize(app: &AppState, text: &str) -> Result<String, String> {
    let summary = app.summarize(text).await.map_err(|e| e.detail())?;
    Ok(format!(
        "{}\n({} -> {} characters)",
        summary.summary, summary.original_length, summary.summary_length
    ))
}
