/// Application name
pub const APP_NAME: &str = "Précis";

/// Default backend base URL
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Reserved prefix of client-synthesized message ids (`temp-user-<uuid>`)
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Maximum preview length, in characters
pub const PREVIEW_MAX_CHARS: usize = 32;

/// Number of messages fetched when deriving a conversation preview
pub const PREVIEW_WINDOW: u32 = 10;

/// Default page size of the history sidebar
pub const DEFAULT_HISTORY_PAGE_SIZE: u32 = 20;

/// Default number of messages fetched when opening a conversation
pub const DEFAULT_MESSAGE_LIMIT: u32 = 50;

/// Remaining scroll distance under which the next history page is fetched
pub const SCROLL_FETCH_THRESHOLD: f64 = 200.0;

/// Persisted storage keys
pub const KEY_CREDENTIAL: &str = "credential";
pub const KEY_IDENTITY: &str = "identity";

/// Fallback error details when the backend gives nothing usable
pub const GENERIC_FAILURE: &str = "An error occurred";
pub const REQUEST_FAILED: &str = "Request failed";
