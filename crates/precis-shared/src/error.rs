use thiserror::Error;

/// A backend payload that does not fit any known shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed payload: {0}")]
    Malformed(String),
}

/// Uniform failure of a call to the backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Transport failure; no response was received.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx status, with the backend-supplied detail.
    #[error("{detail}")]
    Http { status: u16, detail: String },

    /// 2xx response whose body could not be decoded.
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Text shown to the user for this failure.
    pub fn detail(&self) -> String {
        match self {
            GatewayError::Http { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the backend rejected the bearer credential.
    pub fn is_stale_credential(&self) -> bool {
        match self {
            GatewayError::Http { status: 401, .. } => true,
            GatewayError::Http { detail, .. } => detail.contains("Invalid") || detail.contains("401"),
            _ => false,
        }
    }
}

impl From<ProtocolError> for GatewayError {
    fn from(e: ProtocolError) -> Self {
        GatewayError::Decode(e.to_string())
    }
}
