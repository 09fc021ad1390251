use tracing::info;

use precis_shared::UserProfile;

use crate::state::AppState;

fn describe(user: &UserProfile) -> String {
    format!("{} <{}>", user.username, user.email)
}

pub async fn register(
    app: &AppState,
    username: &str,
    email: &str,
    password: &str,
) -> Result<String, String> {
    let user = app
        .session
        .register(username, email, password)
        .await
        .map_err(|e| e.detail())?;
    Ok(format!("Registered {}. Sign in with /login.", describe(&user)))
}

pub async fn login(app: &AppState, email: &str, password: &str) -> Result<String, String> {
    let user = app.session.login(email, password).await.map_err(|e| e.detail())?;
    info!(user = %user.email, "session started from terminal");
    Ok(format!("Signed in as {}.", describe(&user)))
}

pub fn logout(app: &AppState) -> String {
    app.logout();
    "Signed out.".into()
}

/// Re-fetch the profile; a rejected credential ends the session.
pub async fn profile(app: &AppState) -> Result<String, String> {
    match app.session.refresh_profile().await {
        Ok(user) => Ok(describe(&user)),
        Err(e) => {
            if !app.session.is_authenticated() {
                app.logout();
                return Err("Session expired, sign in again.".into());
            }
            Err(e.detail())
        }
    }
}
