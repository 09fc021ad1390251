pub mod commands;
pub mod config;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod history;
pub mod inflight;
pub mod session;
pub mod state;

#[cfg(test)]
mod testing;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use precis_shared::constants::APP_NAME;

use crate::commands::Command;
use crate::config::ClientConfig;
use crate::state::AppState;

/// Install the tracing subscriber. Respects `RUST_LOG`; logs go to stderr
/// so they never interleave with command output.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("precis_client_lib=debug,precis_store=info,warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Run the terminal front end until `/quit` or end of input.
pub async fn run(config: ClientConfig) -> anyhow::Result<()> {
    info!("Starting {APP_NAME} terminal client v{}", env!("CARGO_PKG_VERSION"));
    let app = AppState::connect(config)?;

    if app.session.is_authenticated() {
        match commands::auth::profile(&app).await {
            Ok(user) => println!("Welcome back, {user}."),
            Err(e) => warn!(detail = %e, "could not refresh profile at startup"),
        }
    } else {
        println!("Not signed in. Type /help for commands.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let cmd = match commands::parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        if cmd == Command::Quit {
            break;
        }

        match commands::dispatch(&app, cmd).await {
            Ok(out) if out.is_empty() => {}
            Ok(out) => println!("{out}"),
            Err(e) => println!("error: {e}"),
        }
    }

    info!("terminal client stopped");
    Ok(())
}
