//! Typed access to the persisted credential and identity.

use precis_shared::constants::{KEY_CREDENTIAL, KEY_IDENTITY};
use precis_shared::UserProfile;

use crate::error::Result;
use crate::storage::Storage;

/// Credential and identity as found in storage at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedSession {
    pub credential: String,
    pub identity: UserProfile,
}

/// Read the persisted session. Both halves must be present; an identity
/// that no longer parses is treated as absent.
pub fn load_session(storage: &dyn Storage) -> Result<Option<PersistedSession>> {
    let Some(credential) = storage.get(KEY_CREDENTIAL)? else {
        return Ok(None);
    };
    let Some(raw_identity) = storage.get(KEY_IDENTITY)? else {
        return Ok(None);
    };

    match serde_json::from_str::<UserProfile>(&raw_identity) {
        Ok(identity) => Ok(Some(PersistedSession {
            credential,
            identity,
        })),
        Err(e) => {
            tracing::warn!(error = %e, "discarding unreadable persisted identity");
            Ok(None)
        }
    }
}

pub fn persist_session(storage: &dyn Storage, credential: &str, identity: &UserProfile) -> Result<()> {
    storage.set(KEY_CREDENTIAL, credential)?;
    persist_identity(storage, identity)
}

pub fn persist_identity(storage: &dyn Storage, identity: &UserProfile) -> Result<()> {
    let json = serde_json::to_string(identity)?;
    storage.set(KEY_IDENTITY, &json)
}

pub fn load_credential(storage: &dyn Storage) -> Result<Option<String>> {
    storage.get(KEY_CREDENTIAL)
}

pub fn clear_session(storage: &dyn Storage) -> Result<()> {
    storage.remove(KEY_CREDENTIAL)?;
    storage.remove(KEY_IDENTITY)
}
