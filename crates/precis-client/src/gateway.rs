//! Remote gateway to the summarization backend.
//!
//! [`Gateway`] is the seam the stores depend on; [`HttpGateway`] is the
//! reqwest implementation. Every failure is normalized into a
//! [`GatewayError`]. Nothing is retried here.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use precis_shared::constants::GENERIC_FAILURE;
use precis_shared::protocol::{
    ErrorBody, HistoryPage, HistoryResponse, LoginRequest, LoginResponse, MessagesResponse,
    RegisterRequest, SaveHistoryRequest, SaveHistoryResponse, SaveMessageRequest,
    SaveMessageResponse, SavedMessages, SummarizeRequest, UserEnvelope,
};
use precis_shared::{Conversation, GatewayError, Message, Summary, UserProfile};
use precis_store::{session, Storage};

use crate::config::ClientConfig;

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Operations offered by the backend.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn register(&self, req: &RegisterRequest) -> GatewayResult<UserProfile>;

    async fn login(&self, req: &LoginRequest) -> GatewayResult<LoginResponse>;

    async fn profile(&self) -> GatewayResult<UserProfile>;

    /// Messages of one conversation (or of the user, without `history_id`).
    async fn messages(&self, history_id: Option<&str>, limit: u32) -> GatewayResult<Vec<Message>>;

    /// Persist a user message. The backend answers with the stored message
    /// and, normally, the generated assistant reply.
    async fn save_message(&self, req: &SaveMessageRequest) -> GatewayResult<SavedMessages>;

    async fn history(&self, limit: u32, skip: u32) -> GatewayResult<HistoryPage>;

    async fn save_history(&self, req: &SaveHistoryRequest) -> GatewayResult<Conversation>;

    async fn delete_history(&self, history_id: &str) -> GatewayResult<()>;

    async fn summarize(&self, text: &str) -> GatewayResult<Summary>;
}

/// HTTP implementation of [`Gateway`].
///
/// The bearer credential is read from storage on every request, so a login
/// or logout is visible to the next call without touching the gateway.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: Url,
    storage: Arc<dyn Storage>,
}

impl HttpGateway {
    pub fn new(config: &ClientConfig, storage: Arc<dyn Storage>) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to build HTTP client: {e}")))?;

        let base_url = Url::parse(config.api_url.trim_end_matches('/'))
            .map_err(|e| GatewayError::Network(format!("invalid API URL {}: {e}", config.api_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Network(format!(
                "invalid API URL {}: not a base URL",
                config.api_url
            )));
        }

        Ok(Self {
            client,
            base_url,
            storage,
        })
    }

    /// Base URL extended by `segments`, each percent-encoded as one path
    /// segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.url(segments);
        debug!(%method, %url, "backend request");

        let builder = self.client.request(method, url);
        match session::load_credential(self.storage.as_ref()) {
            Ok(Some(token)) => builder.bearer_auth(token),
            Ok(None) => builder,
            Err(e) => {
                warn!(error = %e, "could not read credential, sending anonymously");
                builder
            }
        }
    }

    /// Send the request; non-2xx answers become [`GatewayError::Http`].
    async fn execute(&self, builder: RequestBuilder) -> GatewayResult<Response> {
        let resp = builder
            .send()
            .await
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = match resp.json::<ErrorBody>().await {
                Ok(body) => body.into_detail(),
                Err(_) => GENERIC_FAILURE.to_string(),
            };
            warn!(status = status.as_u16(), %detail, "backend rejected request");
            return Err(GatewayError::Http {
                status: status.as_u16(),
                detail,
            });
        }
        Ok(resp)
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> GatewayResult<T> {
        self.execute(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn register(&self, req: &RegisterRequest) -> GatewayResult<UserProfile> {
        let envelope: UserEnvelope = self
            .send(self.request(Method::POST, &["api", "auth", "register"]).json(req))
            .await?;
        Ok(envelope.into_user())
    }

    async fn login(&self, req: &LoginRequest) -> GatewayResult<LoginResponse> {
        self.send(self.request(Method::POST, &["api", "auth", "login"]).json(req))
            .await
    }

    async fn profile(&self) -> GatewayResult<UserProfile> {
        let envelope: UserEnvelope = self
            .send(self.request(Method::GET, &["api", "user", "profile"]))
            .await?;
        Ok(envelope.into_user())
    }

    async fn messages(&self, history_id: Option<&str>, limit: u32) -> GatewayResult<Vec<Message>> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(id) = history_id {
            query.insert(0, ("history_id", id.to_string()));
        }

        let resp: MessagesResponse = self
            .send(self.request(Method::GET, &["api", "messages"]).query(&query))
            .await?;
        Ok(resp.into_messages()?)
    }

    async fn save_message(&self, req: &SaveMessageRequest) -> GatewayResult<SavedMessages> {
        let resp: SaveMessageResponse = self
            .send(self.request(Method::POST, &["api", "messages"]).json(req))
            .await?;
        Ok(SavedMessages::try_from(resp)?)
    }

    async fn history(&self, limit: u32, skip: u32) -> GatewayResult<HistoryPage> {
        let query = [("limit", limit), ("skip", skip)];
        let resp: HistoryResponse = self
            .send(self.request(Method::GET, &["api", "history"]).query(&query))
            .await?;
        Ok(resp.into_page(limit))
    }

    async fn save_history(&self, req: &SaveHistoryRequest) -> GatewayResult<Conversation> {
        let resp: SaveHistoryResponse = self
            .send(self.request(Method::POST, &["api", "history"]).json(req))
            .await?;
        Ok(resp.into())
    }

    async fn delete_history(&self, history_id: &str) -> GatewayResult<()> {
        self.execute(self.request(Method::DELETE, &["api", "history", history_id]))
            .await?;
        Ok(())
    }

    async fn summarize(&self, text: &str) -> GatewayResult<Summary> {
        let req = SummarizeRequest {
            text: text.to_string(),
        };
        self.send(self.request(Method::POST, &["api", "summarize"]).json(&req))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{delete, get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use precis_shared::constants::{KEY_CREDENTIAL, REQUEST_FAILED};
    use precis_shared::{MessageId, Role};
    use precis_store::MemoryStorage;

    use super::*;

    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn gateway(base_url: &str, storage: Arc<dyn Storage>) -> HttpGateway {
        let config = ClientConfig {
            api_url: base_url.to_string(),
            ..ClientConfig::default()
        };
        HttpGateway::new(&config, storage).unwrap()
    }

    async fn profile_handler(headers: HeaderMap) -> (StatusCode, Json<Value>) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if auth == "Bearer tok-1" {
            (
                StatusCode::OK,
                Json(json!({"_id": "u1", "username": "ada", "email": "ada@example.com"})),
            )
        } else {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"detail": "Invalid token"})),
            )
        }
    }

    #[tokio::test]
    async fn attaches_bearer_credential_when_present() {
        let base = spawn_backend(Router::new().route("/api/user/profile", get(profile_handler))).await;
        let storage = Arc::new(MemoryStorage::new());
        storage.set(KEY_CREDENTIAL, "tok-1").unwrap();

        let user = gateway(&base, storage).profile().await.unwrap();
        assert_eq!(user.username, "ada");
        assert_eq!(user.id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn non_success_carries_backend_detail() {
        let base = spawn_backend(Router::new().route("/api/user/profile", get(profile_handler))).await;

        let err = gateway(&base, Arc::new(MemoryStorage::new()))
            .profile()
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::Http {
                status: 401,
                detail: "Invalid token".into()
            }
        );
    }

    #[tokio::test]
    async fn unparseable_error_body_uses_generic_detail() {
        let router = Router::new().route(
            "/api/summarize",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
        );
        let base = spawn_backend(router).await;

        let err = gateway(&base, Arc::new(MemoryStorage::new()))
            .summarize("text")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.detail(), GENERIC_FAILURE);
    }

    #[tokio::test]
    async fn error_body_without_detail_uses_request_failed() {
        let router = Router::new().route(
            "/api/history/:id",
            delete(|| async { (StatusCode::NOT_FOUND, Json(json!({"error": "nope"}))) }),
        );
        let base = spawn_backend(router).await;

        let err = gateway(&base, Arc::new(MemoryStorage::new()))
            .delete_history("h1")
            .await
            .unwrap_err();
        assert_eq!(err.detail(), REQUEST_FAILED);
    }

    #[tokio::test]
    async fn transport_failure_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = gateway(&format!("http://{addr}"), Arc::new(MemoryStorage::new()))
            .profile()
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Network(_)));
    }

    #[tokio::test]
    async fn save_message_decodes_pair() {
        let router = Router::new().route(
            "/api/messages",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["role"], "user");
                assert_eq!(body["history_id"], Value::Null);
                Json(json!({
                    "history_id": "h1",
                    "user_message": {"_id": "m1", "history_id": "h1", "role": "user", "content": body["content"]},
                    "assistant_message": {"_id": "m2", "history_id": "h1", "role": "assistant", "content": "Here is a summary."}
                }))
            }),
        );
        let base = spawn_backend(router).await;

        let saved = gateway(&base, Arc::new(MemoryStorage::new()))
            .save_message(&SaveMessageRequest {
                history_id: None,
                role: Role::User,
                content: "Summarize this.".into(),
            })
            .await
            .unwrap();

        assert_eq!(saved.history_id.as_deref(), Some("h1"));
        assert_eq!(saved.messages[0].id, MessageId::from("m1"));
        assert_eq!(saved.messages[0].content, "Summarize this.");
        assert_eq!(saved.messages[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn history_sends_pagination_query() {
        let router = Router::new().route(
            "/api/history",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("limit").map(String::as_str), Some("20"));
                assert_eq!(params.get("skip").map(String::as_str), Some("40"));
                Json(json!({"history": [{"_id": "h41"}, {"_id": "h42"}], "has_more": false}))
            }),
        );
        let base = spawn_backend(router).await;

        let page = gateway(&base, Arc::new(MemoryStorage::new()))
            .history(20, 40)
            .await
            .unwrap();
        assert_eq!(page.entries.len(), 2);
        assert_eq!(page.entries[0].id, "h41");
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn messages_filters_by_history_id() {
        let router = Router::new().route(
            "/api/messages",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("history_id").map(String::as_str), Some("h1"));
                assert_eq!(params.get("limit").map(String::as_str), Some("10"));
                Json(json!({"messages": [
                    {"_id": "m1", "role": "user", "content": "hello", "timestamp": "2024-05-01T10:20:30.123"}
                ]}))
            }),
        );
        let base = spawn_backend(router).await;

        let messages = gateway(&base, Arc::new(MemoryStorage::new()))
            .messages(Some("h1"), 10)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].timestamp.is_some());
    }

    #[tokio::test]
    async fn delete_history_targets_id_path() {
        let router = Router::new().route(
            "/api/history/:id",
            delete(|Path(id): Path<String>| async move {
                assert_eq!(id, "h7");
                Json(json!({"message": "History deleted successfully"}))
            }),
        );
        let base = spawn_backend(router).await;

        gateway(&base, Arc::new(MemoryStorage::new()))
            .delete_history("h7")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn delete_encodes_id_as_one_segment() {
        let router = Router::new().route(
            "/api/history/:id",
            delete(|Path(id): Path<String>| async move {
                assert_eq!(id, "a/b?c#d");
                StatusCode::NO_CONTENT
            }),
        );
        let base = spawn_backend(router).await;

        gateway(&base, Arc::new(MemoryStorage::new()))
            .delete_history("a/b?c#d")
            .await
            .unwrap();
    }

    #[test]
    fn urls_keep_base_path_prefix() {
        let gw = gateway("http://localhost:8000/backend/", Arc::new(MemoryStorage::new()));
        assert_eq!(
            gw.url(&["api", "history", "h 1"]).as_str(),
            "http://localhost:8000/backend/api/history/h%201"
        );
    }

    #[test]
    fn rejects_unusable_api_url() {
        let config = ClientConfig {
            api_url: "not a url".into(),
            ..ClientConfig::default()
        };
        let err = HttpGateway::new(&config, Arc::new(MemoryStorage::new()))
            .err()
            .unwrap();
        assert!(matches!(err, GatewayError::Network(_)));
    }

    #[tokio::test]
    async fn delete_accepts_empty_body() {
        let router = Router::new().route(
            "/api/history/:id",
            delete(|| async { StatusCode::NO_CONTENT }),
        );
        let base = spawn_backend(router).await;

        gateway(&base, Arc::new(MemoryStorage::new()))
            .delete_history("h7")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn login_and_register_shapes() {
        let router = Router::new()
            .route(
                "/api/auth/login",
                post(|| async {
                    Json(json!({
                        "access_token": "tok-1",
                        "token_type": "bearer",
                        "user": {"_id": "u1", "username": "ada", "email": "ada@example.com"}
                    }))
                }),
            )
            .route(
                "/api/auth/register",
                post(|| async {
                    (
                        StatusCode::CREATED,
                        Json(json!({
                            "message": "User created successfully",
                            "user": {"_id": "u2", "username": "bob", "email": "bob@example.com"}
                        })),
                    )
                }),
            );
        let base = spawn_backend(router).await;
        let gw = gateway(&base, Arc::new(MemoryStorage::new()));

        let login = gw
            .login(&LoginRequest {
                email: "ada@example.com".into(),
                password: "pw".into(),
            })
            .await
            .unwrap();
        assert_eq!(login.access_token, "tok-1");

        let user = gw
            .register(&RegisterRequest {
                username: "bob".into(),
                email: "bob@example.com".into(),
                password: "pw".into(),
            })
            .await
            .unwrap();
        assert_eq!(user.id.as_deref(), Some("u2"));
    }
}
