//! Social network post interface and the X API client.

use crate::error::SocialError;
use crate::thread::split_thread;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::fmt;
use tracing::{debug, instrument};

/// Default X API base URL.
pub const DEFAULT_API_URL: &str = "https://api.x.com/2";

/// Default per-post character limit.
pub const DEFAULT_MAX_POST_CHARS: usize = 4_000;

/// Identifier of a published post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    /// Wraps a provider post id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<PostId> for String {
    fn from(id: PostId) -> Self {
        id.0
    }
}

/// Trait for social networks that accept text posts.
#[async_trait]
pub trait SocialNetwork: Send + Sync {
    /// Publishes a single post, optionally as a reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the network rejects the post or is unreachable.
    async fn post(&self, text: &str, in_reply_to: Option<&PostId>) -> Result<PostId, SocialError>;

    /// Hard per-post character limit.
    fn max_post_chars(&self) -> usize;
}

/// Publishes `text` as a thread: the first part as a post, each further part
/// as a reply to the previous one. Returns the id of the first post.
///
/// # Errors
///
/// Returns the first posting error. Parts already published stay published.
#[instrument(skip(network, text), fields(len = text.chars().count()))]
pub async fn post_thread(network: &dyn SocialNetwork, text: &str) -> Result<PostId, SocialError> {
    let parts = split_thread(text, network.max_post_chars());
    let mut first: Option<PostId> = None;
    let mut previous: Option<PostId> = None;

    for part in &parts {
        let id = network.post(part, previous.as_ref()).await?;
        if first.is_none() {
            first = Some(id.clone());
        }
        previous = Some(id);
    }

    debug!(parts = parts.len(), "thread published");
    first.ok_or_else(|| SocialError::InvalidPost {
        reason: "nothing to post".to_string(),
    })
}

/// Connection settings for the X API.
#[derive(Debug, Clone)]
pub struct XApiConfig {
    /// Base URL, without the `/tweets` suffix.
    pub api_url: String,
    /// OAuth2 user-context bearer token.
    pub bearer_token: String,
    /// Per-post character limit.
    pub max_post_chars: usize,
}

impl XApiConfig {
    /// Creates a configuration with the default URL and limit.
    #[must_use]
    pub fn new(bearer_token: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            bearer_token: bearer_token.into(),
            max_post_chars: DEFAULT_MAX_POST_CHARS,
        }
    }
}

/// Builds the JSON body for creating a post.
#[must_use]
pub fn post_body(text: &str, in_reply_to: Option<&PostId>) -> JsonValue {
    let mut body = json!({ "text": text });
    if let Some(parent) = in_reply_to {
        body["reply"] = json!({ "in_reply_to_tweet_id": parent.as_str() });
    }
    body
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    data: CreatedPostData,
}

#[derive(Debug, Deserialize)]
struct CreatedPostData {
    id: String,
}

/// Extracts the post id from a create-post response body.
///
/// # Errors
///
/// Returns an error if the body does not carry `data.id`.
pub fn parse_created(body: &str) -> Result<PostId, SocialError> {
    let created: CreatedPost = serde_json::from_str(body).map_err(|e| SocialError::ProtocolError {
        status: None,
        reason: format!("unexpected response: {e}"),
    })?;
    Ok(PostId::new(created.data.id))
}

/// Client for the X API v2 post endpoint.
#[derive(Debug, Clone)]
pub struct XApiClient {
    config: XApiConfig,
    client: reqwest::Client,
}

impl XApiClient {
    /// Creates a client with its own HTTP client.
    #[must_use]
    pub fn new(config: XApiConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Creates a client sharing an existing HTTP client.
    #[must_use]
    pub fn with_client(config: XApiConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn endpoint(&self) -> String {
        format!("{}/tweets", self.config.api_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SocialNetwork for XApiClient {
    async fn post(&self, text: &str, in_reply_to: Option<&PostId>) -> Result<PostId, SocialError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.bearer_token)
            .json(&post_body(text, in_reply_to))
            .send()
            .await
            .map_err(|e| SocialError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(SocialError::RateLimited { retry_after_secs });
        }

        let body = response
            .text()
            .await
            .map_err(|e| SocialError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(SocialError::AuthenticationFailed { reason: body });
        }
        if !status.is_success() {
            return Err(SocialError::ProtocolError {
                status: Some(status.as_u16()),
                reason: body,
            });
        }

        let id = parse_created(&body)?;
        debug!(post = %id, reply = in_reply_to.is_some(), "post created");
        Ok(id)
    }

    fn max_post_chars(&self) -> usize {
        self.config.max_post_chars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Network recording posts and handing out sequential ids.
    struct RecordingNetwork {
        limit: usize,
        posts: Mutex<Vec<(String, Option<PostId>)>>,
        fail_after: Option<usize>,
    }

    impl RecordingNetwork {
        fn new(limit: usize) -> Self {
            Self {
                limit,
                posts: Mutex::new(Vec::new()),
                fail_after: None,
            }
        }
    }

    #[async_trait]
    impl SocialNetwork for RecordingNetwork {
        async fn post(
            &self,
            text: &str,
            in_reply_to: Option<&PostId>,
        ) -> Result<PostId, SocialError> {
            let mut posts = self.posts.lock().unwrap();
            if self.fail_after == Some(posts.len()) {
                return Err(SocialError::RateLimited {
                    retry_after_secs: None,
                });
            }
            posts.push((text.to_string(), in_reply_to.cloned()));
            Ok(PostId::new(format!("p{}", posts.len())))
        }

        fn max_post_chars(&self) -> usize {
            self.limit
        }
    }

    #[tokio::test]
    async fn short_text_is_single_post() {
        let network = RecordingNetwork::new(280);
        let id = post_thread(&network, "Score: 85/100").await.unwrap();

        assert_eq!(id, PostId::new("p1"));
        let posts = network.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].1, None);
    }

    #[tokio::test]
    async fn long_text_becomes_reply_chain() {
        let network = RecordingNetwork::new(10);
        let id = post_thread(&network, "aaaa bbbb cccc dddd").await.unwrap();

        assert_eq!(id, PostId::new("p1"));
        let posts = network.posts.lock().unwrap();
        assert_eq!(
            *posts,
            vec![
                ("aaaa bbbb".to_string(), None),
                ("cccc dddd".to_string(), Some(PostId::new("p1"))),
            ]
        );
    }

    #[tokio::test]
    async fn thread_stops_at_first_failure() {
        let network = RecordingNetwork {
            fail_after: Some(1),
            ..RecordingNetwork::new(5)
        };
        let err = post_thread(&network, "aaaa bbbb cccc").await.unwrap_err();

        assert!(matches!(err, SocialError::RateLimited { .. }));
        assert_eq!(network.posts.lock().unwrap().len(), 1);
    }

    #[test]
    fn body_includes_reply_target() {
        let body = post_body("hi", Some(&PostId::new("42")));
        assert_eq!(body["text"], "hi");
        assert_eq!(body["reply"]["in_reply_to_tweet_id"], "42");

        assert!(post_body("hi", None).get("reply").is_none());
    }

    #[test]
    fn parses_created_post() {
        let id = parse_created(r#"{"data":{"id":"1880","text":"hi"}}"#).unwrap();
        assert_eq!(id.as_str(), "1880");

        let err = parse_created(r#"{"errors":[]}"#).unwrap_err();
        assert!(matches!(err, SocialError::ProtocolError { status: None, .. }));
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let client = XApiClient::new(XApiConfig {
            api_url: "https://api.x.com/2/".to_string(),
            ..XApiConfig::new("token")
        });
        assert_eq!(client.endpoint(), "https://api.x.com/2/tweets");
    }
}
