//! Conversation endpoints.

use crate::entity::RequireEntity;
use crate::error::ApiError;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    routing::{get, post},
};
use lucy_conversation::{ClaimOutcome, Conversation, ConversationController, ConversationView};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::sync::{Arc, LazyLock};

static WALLET_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9_.\-]+[a-z0-9]$").expect("wallet address pattern compiles")
});

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<ConversationController>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(controller: Arc<ConversationController>) -> Self {
        Self { controller }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/conversation", get(conversation).post(submit_turn))
        .route("/conversation/claim", post(claim))
        .route("/conversation/history", get(history))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn conversation(
    State(state): State<AppState>,
    RequireEntity(entity): RequireEntity,
) -> Result<Json<ConversationView>, ApiError> {
    Ok(Json(state.controller.snapshot(&entity).await?))
}

/// Body of a turn submission.
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    #[serde(default, alias = "message")]
    pub text: String,
}

async fn submit_turn(
    State(state): State<AppState>,
    RequireEntity(entity): RequireEntity,
    Json(request): Json<TurnRequest>,
) -> Result<Json<ConversationView>, ApiError> {
    Ok(Json(
        state.controller.submit_turn(&entity, &request.text).await?,
    ))
}

/// Body of a claim. The body itself is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    pub wallet_address: Option<String>,
}

fn claim_metadata(body: &[u8]) -> Result<Map<String, JsonValue>, ApiError> {
    let request: ClaimRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ClaimRequest::default()
    } else {
        serde_json::from_slice(body).map_err(|e| ApiError::InvalidBody {
            details: e.to_string(),
        })?
    };

    let mut extra = Map::new();
    if let Some(address) = request.wallet_address {
        if !WALLET_ADDRESS.is_match(&address) {
            return Err(ApiError::InvalidWalletAddress);
        }
        extra.insert("walletAddress".to_string(), JsonValue::String(address));
    }
    Ok(extra)
}

async fn claim(
    State(state): State<AppState>,
    RequireEntity(entity): RequireEntity,
    body: Bytes,
) -> Result<Json<ClaimOutcome>, ApiError> {
    let extra = claim_metadata(&body)?;
    Ok(Json(state.controller.claim(&entity, extra).await?))
}

/// Archived conversations, most recent first.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<Conversation>,
}

async fn history(
    State(state): State<AppState>,
    RequireEntity(entity): RequireEntity,
) -> Result<Json<HistoryResponse>, ApiError> {
    let history = state.controller.history(&entity).await?;
    Ok(Json(HistoryResponse { history }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::ENTITY_HEADER;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use lucy_ai::{
        CompletionBackend, CompletionRequest, CompletionResponse, Dispatcher, LlmError, Provider,
        ProviderTable, TokenUsage,
    };
    use lucy_conversation::{ControllerConfig, EntityRegistry, InMemoryStore, StoreConfig};
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tower::ServiceExt;

    const PLAIN: &str = r#"{"message":"hehe, go on","mood":"playful"}"#;
    const FINISH: &str = r#"{"message":"gotta run!","mood":"happy","finished":true}"#;
    const VERDICT: &str = r#"{"points":85,"evaluation":"well done"}"#;

    /// Backend replaying scripted replies; unscripted calls get a plain reply.
    #[derive(Default)]
    struct ScriptedBackend {
        script: Mutex<VecDeque<&'static str>>,
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(
            &self,
            request: &CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            let content = self.script.lock().unwrap().pop_front().unwrap_or(PLAIN);
            Ok(CompletionResponse {
                content: content.to_string(),
                usage: TokenUsage::default(),
                model: request.model.clone(),
            })
        }

        fn provider(&self) -> Provider {
            Provider::Cerebras
        }
    }

    fn app(backend: Arc<ScriptedBackend>) -> Router {
        let dispatcher = Dispatcher::new(ProviderTable {
            cerebras: backend.clone(),
            deepseek: backend.clone(),
            fallback: backend,
        });
        let registry = EntityRegistry::new(Arc::new(InMemoryStore::new()), StoreConfig::default());
        let controller = ConversationController::new(registry, dispatcher, ControllerConfig::default());
        router(AppState::new(Arc::new(controller)))
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(ENTITY_HEADER, "alice");
        match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = app(Arc::default());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn missing_entity_is_unauthorized() {
        let app = app(Arc::default());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/conversation")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn fresh_entity_has_empty_conversation() {
        let app = app(Arc::default());
        let (status, body) = send(&app, request("GET", "/conversation", None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"], json!([]));
        assert_eq!(body["cooldownEnds"], Value::Null);
        assert_eq!(body["canSendMessage"], true);
    }

    #[tokio::test]
    async fn first_turn_appends_both_messages() {
        let app = app(Arc::default());
        let (status, body) = send(
            &app,
            request("POST", "/conversation", Some(json!({ "text": "hi" }))),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["text"], "hi");
        assert_eq!(messages[1]["text"], "hehe, go on");
        assert_eq!(body["canSendMessage"], true);
    }

    #[tokio::test]
    async fn empty_and_long_input_are_rejected() {
        let app = app(Arc::default());

        let (status, body) = send(
            &app,
            request("POST", "/conversation", Some(json!({ "text": "   " }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "message is required");

        let long = "a".repeat(201);
        let (status, body) = send(
            &app,
            request("POST", "/conversation", Some(json!({ "text": long }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("200"));
    }

    #[tokio::test]
    async fn claim_before_end_is_bad_request() {
        let app = app(Arc::default());

        let (status, body) = send(&app, request("POST", "/conversation/claim", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No active conversation");

        send(
            &app,
            request("POST", "/conversation", Some(json!({ "text": "hi" }))),
        )
        .await;
        let (status, body) = send(&app, request("POST", "/conversation/claim", None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Conversation has not ended yet");
    }

    #[tokio::test]
    async fn finished_conversation_cools_down_and_claims() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.script.lock().unwrap().extend([FINISH, VERDICT]);
        let app = app(backend);

        let (status, body) = send(
            &app,
            request("POST", "/conversation", Some(json!({ "text": "bye lucy" }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["score"], 85);
        assert_eq!(body["scoreRationale"], "well done");
        assert_eq!(body["canSendMessage"], false);
        let cooldown_ends = body["cooldownEnds"].clone();
        assert!(cooldown_ends.is_i64());

        let (status, body) = send(
            &app,
            request("POST", "/conversation", Some(json!({ "text": "again" }))),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["cooldownEnds"], cooldown_ends);

        let (status, _) = send(
            &app,
            request(
                "POST",
                "/conversation/claim",
                Some(json!({ "walletAddress": "Not A Wallet" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            request(
                "POST",
                "/conversation/claim",
                Some(json!({ "walletAddress": "alice.near" })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages"], json!([]));
        assert_eq!(body["archived"]["extra"]["walletAddress"], "alice.near");

        let (status, body) = send(&app, request("GET", "/conversation/history", None)).await;
        assert_eq!(status, StatusCode::OK);
        let history = body["history"].as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["finalScore"], 85);
    }

    #[test]
    fn wallet_pattern() {
        assert!(WALLET_ADDRESS.is_match("alice.near"));
        assert!(WALLET_ADDRESS.is_match("a-b_c.d9"));
        assert!(!WALLET_ADDRESS.is_match("alice."));
        assert!(!WALLET_ADDRESS.is_match("Alice.near"));
        assert!(!WALLET_ADDRESS.is_match("a"));
    }
}
