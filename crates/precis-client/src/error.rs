use precis_shared::GatewayError;
use precis_store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Not signed in")]
    NotAuthenticated,
}

impl ClientError {
    /// Text shown to the user for this failure.
    pub fn detail(&self) -> String {
        match self {
            ClientError::Gateway(e) => e.detail(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
