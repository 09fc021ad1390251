//! Terminal command handlers.
//!
//! Each sub-module groups related commands by domain. Handlers take the
//! shared [`AppState`], drive the stores and return the text to print;
//! failures come back as the user-facing detail string.

pub mod auth;
pub mod chat;
pub mod history;

use crate::state::AppState;

/// One line of user input, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Register {
        username: String,
        email: String,
        password: String,
    },
    Login {
        email: String,
        password: String,
    },
    Logout,
    Profile,
    History,
    More,
    Open(String),
    New,
    Save,
    Delete(String),
    Summarize(String),
    Send(String),
    Help,
    Quit,
}

pub const HELP: &str = "\
/register <username> <email> <password>   create an account
/login <email> <password>                 sign in
/logout                                   sign out
/profile                                  show the signed-in user
/history                                  list past conversations
/more                                     load the next page of history
/open <id>                                load a past conversation
/new                                      start a new chat
/save                                     file the current chat in history
/delete <id>                              delete a past conversation
/summarize <text>                         summarize text directly
/help                                     show this help
/quit                                     exit
anything else is sent as a chat message";

/// Parse a line of input. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if !line.starts_with('/') {
        return Ok(Some(Command::Send(line.to_string())));
    }

    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };
    let args: Vec<&str> = rest.split_whitespace().collect();

    let cmd = match (name, args.as_slice()) {
        ("/register", [username, email, password]) => Command::Register {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        },
        ("/register", _) => return Err("usage: /register <username> <email> <password>".into()),
        ("/login", [email, password]) => Command::Login {
            email: email.to_string(),
            password: password.to_string(),
        },
        ("/login", _) => return Err("usage: /login <email> <password>".into()),
        ("/logout", []) => Command::Logout,
        ("/profile", []) => Command::Profile,
        ("/history", []) => Command::History,
        ("/more", []) => Command::More,
        ("/open", [id]) => Command::Open(id.to_string()),
        ("/open", _) => return Err("usage: /open <id>".into()),
        ("/new", []) => Command::New,
        ("/save", []) => Command::Save,
        ("/delete", [id]) => Command::Delete(id.to_string()),
        ("/delete", _) => return Err("usage: /delete <id>".into()),
        ("/summarize", _) if !rest.is_empty() => Command::Summarize(rest.to_string()),
        ("/summarize", _) => return Err("usage: /summarize <text>".into()),
        ("/help", _) => Command::Help,
        ("/quit" | "/exit", _) => Command::Quit,
        (other, _) => return Err(format!("unknown command {other}, try /help")),
    };
    Ok(Some(cmd))
}

impl Command {
    fn needs_session(&self) -> bool {
        !matches!(
            self,
            Command::Register { .. } | Command::Login { .. } | Command::Help | Command::Quit
        )
    }
}

/// Run one command. Chat and history commands need a signed-in session.
pub async fn dispatch(app: &AppState, cmd: Command) -> Result<String, String> {
    if cmd.needs_session() && !app.session.is_authenticated() {
        return Err("Not signed in, use /login first".into());
    }

    match cmd {
        Command::Register {
            username,
            email,
            password,
        } => auth::register(app, &username, &email, &password).await,
        Command::Login { email, password } => auth::login(app, &email, &password).await,
        Command::Logout => Ok(auth::logout(app)),
        Command::Profile => auth::profile(app).await,
        Command::History => history::list(app).await,
        Command::More => history::more(app).await,
        Command::Open(id) => chat::open(app, &id).await,
        Command::New => Ok(chat::new_chat(app)),
        Command::Save => history::save(app).await,
        Command::Delete(id) => history::delete(app, &id).await,
        Command::Summarize(text) => chat::summarize(app, &text).await,
        Command::Send(text) => chat::send(app, &text).await,
        Command::Help => Ok(HELP.to_string()),
        Command::Quit => Ok(String::new()),
    }
}
