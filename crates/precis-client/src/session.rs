//! Session store: who is signed in, with which credential.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};

use precis_shared::protocol::{LoginRequest, RegisterRequest};
use precis_shared::UserProfile;
use precis_store::{session, Storage};

use crate::error::{ClientError, Result};
use crate::gateway::Gateway;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub identity: Option<UserProfile>,
    pub credential: Option<String>,
    pub is_loading: bool,
    pub error: Option<String>,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some() && self.credential.is_some()
    }
}

/// Anonymous → (login) → Authenticated → (logout | stale credential) → Anonymous.
///
/// Registration never changes the state; the user signs in afterwards.
pub struct SessionStore {
    gateway: Arc<dyn Gateway>,
    storage: Arc<dyn Storage>,
    state: Mutex<SessionState>,
}

impl SessionStore {
    /// Build the store from whatever session was persisted last time.
    pub fn hydrate(gateway: Arc<dyn Gateway>, storage: Arc<dyn Storage>) -> Result<Self> {
        let mut state = SessionState::default();
        if let Some(persisted) = session::load_session(storage.as_ref())? {
            info!(user = %persisted.identity.email, "restored persisted session");
            state.credential = Some(persisted.credential);
            state.identity = Some(persisted.identity);
        }

        Ok(Self {
            gateway,
            storage,
            state: Mutex::new(state),
        })
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> SessionState {
        self.state().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated()
    }

    pub fn identity(&self) -> Option<UserProfile> {
        self.state().identity.clone()
    }

    fn begin(&self) {
        let mut state = self.state();
        state.is_loading = true;
        state.error = None;
    }

    fn fail(&self, e: ClientError) -> ClientError {
        let mut state = self.state();
        state.is_loading = false;
        state.error = Some(e.detail());
        e
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<UserProfile> {
        self.begin();
        let req = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };

        match self.gateway.register(&req).await {
            Ok(user) => {
                self.state().is_loading = false;
                info!(user = %user.email, "registered");
                Ok(user)
            }
            Err(e) => {
                warn!(error = %e, "registration failed");
                Err(self.fail(e.into()))
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        self.begin();
        let req = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let resp = match self.gateway.login(&req).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "login failed");
                return Err(self.fail(e.into()));
            }
        };

        if let Err(e) = session::persist_session(self.storage.as_ref(), &resp.access_token, &resp.user) {
            warn!(error = %e, "could not persist session; it will not survive a restart");
        }

        let mut state = self.state();
        state.is_loading = false;
        state.credential = Some(resp.access_token);
        state.identity = Some(resp.user.clone());
        info!(user = %resp.user.email, "logged in");
        Ok(resp.user)
    }

    /// Re-fetch the profile. A rejected credential signs the user out.
    pub async fn refresh_profile(&self) -> Result<UserProfile> {
        let has_credential = self.state().credential.is_some();
        if !has_credential {
            return Err(ClientError::NotAuthenticated);
        }

        {
            let mut state = self.state();
            state.is_loading = true;
        }

        match self.gateway.profile().await {
            Ok(user) => {
                if let Err(e) = session::persist_identity(self.storage.as_ref(), &user) {
                    warn!(error = %e, "could not persist refreshed identity");
                }
                let mut state = self.state();
                state.is_loading = false;
                state.identity = Some(user.clone());
                Ok(user)
            }
            Err(e) if e.is_stale_credential() => {
                info!(detail = %e.detail(), "credential rejected, signing out");
                self.logout();
                Err(e.into())
            }
            Err(e) => {
                warn!(error = %e, "profile refresh failed");
                Err(self.fail(e.into()))
            }
        }
    }

    /// Forget the session, in memory and in storage.
    pub fn logout(&self) {
        *self.state() = SessionState::default();
        if let Err(e) = session::clear_session(self.storage.as_ref()) {
            warn!(error = %e, "could not clear persisted session");
        }
        info!("logged out");
    }

    pub fn clear_error(&self) {
        self.state().error = None;
    }
}
