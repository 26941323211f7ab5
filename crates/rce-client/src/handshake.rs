//! HTTP negotiation with the master manager.
//!
//! ```text
//! GET <base>?userID=..&password=..&robotID=..&version=<CLIENT_VERSION>
//! 200 {"key": "...", "url": "ws://...", "current": "..." | null}
//! ```
//!
//! The result is turned into the streaming URL
//! `<url>?userID=..&robotID=..&key=..`.

use std::sync::OnceLock;
use std::time::Duration;

use rce_core::codec::binary_references;
use rce_core::constants::CLIENT_VERSION;
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::errors::ClientError;

/// Identity presented to the master manager.
#[derive(Clone)]
pub struct Credentials {
    /// User identity.
    pub user_id: String,
    /// User secret.
    pub password: String,
    /// Robot identity.
    pub robot_id: String,
}

impl Credentials {
    /// Bundle the three identifiers.
    pub fn new(
        user_id: impl Into<String>,
        password: impl Into<String>,
        robot_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            password: password.into(),
            robot_id: robot_id.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("password", &"<redacted>")
            .field("robot_id", &self.robot_id)
            .finish()
    }
}

/// Successful negotiation result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Negotiation {
    /// One-time session key.
    pub key: String,
    /// Streaming endpoint.
    pub url: String,
    /// Newest client version the server knows about, when advertised.
    pub current: Option<String>,
}

impl Negotiation {
    /// Whether the server advertises a version other than ours.
    pub fn is_outdated(&self) -> bool {
        self.current.as_deref().is_some_and(|v| v != CLIENT_VERSION)
    }

    /// Streaming URL with the identity query parameters appended.
    pub fn session_url(&self, credentials: &Credentials) -> Result<String, ClientError> {
        let mut url = Url::parse(&self.url).map_err(|e| {
            ClientError::ProtocolViolation(format!("invalid session url '{}': {e}", self.url))
        })?;
        let _ = url
            .query_pairs_mut()
            .append_pair("userID", &credentials.user_id)
            .append_pair("robotID", &credentials.robot_id)
            .append_pair("key", &self.key);
        Ok(url.into())
    }
}

static HTTP_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Process-wide HTTP client, built on first use.
pub fn http_client() -> &'static reqwest::Client {
    HTTP_CLIENT.get_or_init(|| {
        build_client(
            reqwest::Client::builder()
                .user_agent(concat!("rce-client/", env!("CARGO_PKG_VERSION"))),
        )
    })
}

fn build_client(builder: reqwest::ClientBuilder) -> reqwest::Client {
    builder.build().unwrap_or_else(|e| {
        warn!(error = %e, "HTTP client configuration rejected, using defaults");
        reqwest::Client::new()
    })
}

/// Run the HTTP exchange with the master manager.
#[instrument(
    skip(credentials),
    fields(user_id = %credentials.user_id, robot_id = %credentials.robot_id)
)]
pub async fn negotiate(
    base_url: &str,
    credentials: &Credentials,
    timeout: Duration,
) -> Result<Negotiation, ClientError> {
    let resp = http_client()
        .get(base_url)
        .query(&[
            ("userID", credentials.user_id.as_str()),
            ("password", credentials.password.as_str()),
            ("robotID", credentials.robot_id.as_str()),
            ("version", CLIENT_VERSION),
        ])
        .timeout(timeout)
        .send()
        .await?;

    let status = resp.status().as_u16();
    if status != 200 {
        let text = resp.text().await.unwrap_or_default();
        return Err(ClientError::Transport {
            status,
            message: text,
        });
    }

    let body = resp.text().await?;
    let negotiation = parse_response(&body)?;
    if negotiation.is_outdated() {
        info!(
            current = negotiation.current.as_deref().unwrap_or(""),
            running = CLIENT_VERSION,
            "a newer client version is available"
        );
    }
    debug!(url = %negotiation.url, "handshake complete");
    Ok(negotiation)
}

/// Validate a handshake response body.
pub fn parse_response(body: &str) -> Result<Negotiation, ClientError> {
    let value: Value = serde_json::from_str(body).map_err(|e| {
        ClientError::ProtocolViolation(format!("handshake response is not JSON: {e}"))
    })?;
    let Some(obj) = value.as_object() else {
        return Err(ClientError::ProtocolViolation(
            "handshake response is not an object".into(),
        ));
    };
    if !binary_references(&value).is_empty() {
        return Err(ClientError::ProtocolViolation(
            "handshake response carries binary attachments".into(),
        ));
    }

    let field = |name: &str| -> Result<String, ClientError> {
        obj.get(name)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                ClientError::ProtocolViolation(format!(
                    "handshake response field '{name}' is missing or not a string"
                ))
            })
    };
    let key = field("key")?;
    let url = field("url")?;
    let current = match obj.get("current") {
        None | Some(Value::Null) => None,
        Some(Value::String(v)) => Some(v.clone()),
        Some(_) => {
            return Err(ClientError::ProtocolViolation(
                "handshake response field 'current' is not a string".into(),
            ));
        }
    };

    Ok(Negotiation { key, url, current })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rce_core::logging::capture_logs;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn creds() -> Credentials {
        Credentials::new("alice", "s3cret", "robot-1")
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn parse_minimal_response() {
        let n = parse_response(r#"{"key": "abc", "url": "ws://robot/ws"}"#).unwrap();
        assert_eq!(n.key, "abc");
        assert_eq!(n.url, "ws://robot/ws");
        assert!(n.current.is_none());
        assert!(!n.is_outdated());
    }

    #[test]
    fn parse_null_current() {
        let n = parse_response(r#"{"key": "k", "url": "ws://h/", "current": null}"#).unwrap();
        assert!(n.current.is_none());
    }

    #[test]
    fn parse_rejects_non_object() {
        assert_matches!(
            parse_response(r#"["key", "url"]"#),
            Err(ClientError::ProtocolViolation(_))
        );
        assert_matches!(
            parse_response("overloaded"),
            Err(ClientError::ProtocolViolation(_))
        );
    }

    #[test]
    fn parse_rejects_missing_or_non_string_fields() {
        assert_matches!(
            parse_response(r#"{"url": "ws://h/"}"#),
            Err(ClientError::ProtocolViolation(m)) if m.contains("'key'")
        );
        assert_matches!(
            parse_response(r#"{"key": "k", "url": 5}"#),
            Err(ClientError::ProtocolViolation(m)) if m.contains("'url'")
        );
        assert_matches!(
            parse_response(r#"{"key": "k", "url": "ws://h/", "current": 3}"#),
            Err(ClientError::ProtocolViolation(_))
        );
    }

    #[test]
    fn parse_rejects_binary_attachments() {
        let body = json!({
            "key": "k",
            "url": "ws://h/",
            "blob*": "0123456789abcdef0123456789abcdef"
        });
        assert_matches!(
            parse_response(&body.to_string()),
            Err(ClientError::ProtocolViolation(m)) if m.contains("binary")
        );
    }

    #[test]
    fn session_url_appends_identity() {
        let n = Negotiation {
            key: "abc".into(),
            url: "ws://robot:9010/ws".into(),
            current: None,
        };
        let url = n.session_url(&creds()).unwrap();
        assert_eq!(url, "ws://robot:9010/ws?userID=alice&robotID=robot-1&key=abc");
    }

    #[test]
    fn session_url_rejects_garbage() {
        let n = Negotiation {
            key: "abc".into(),
            url: "not a url".into(),
            current: None,
        };
        assert_matches!(n.session_url(&creds()), Err(ClientError::ProtocolViolation(_)));
    }

    #[test]
    fn rejected_client_config_falls_back_with_warning() {
        let (logs, _guard) = capture_logs();
        // rustls has no protocol version at or below TLS 1.1.
        let builder =
            reqwest::Client::builder().max_tls_version(reqwest::tls::Version::TLS_1_1);
        let _client = build_client(builder);
        assert!(logs.has_event(tracing::Level::WARN, "HTTP client configuration rejected"));
    }

    #[test]
    fn valid_client_config_builds_quietly() {
        let (logs, _guard) = capture_logs();
        let _client = build_client(reqwest::Client::builder().user_agent("test"));
        assert_eq!(logs.count_at_level(tracing::Level::WARN), 0);
    }

    #[test]
    fn credentials_debug_hides_password() {
        let rendered = format!("{:?}", creds());
        assert!(!rendered.contains("s3cret"));
        assert!(rendered.contains("alice"));
    }

    #[tokio::test]
    async fn negotiate_sends_identity_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/session"))
            .and(query_param("userID", "alice"))
            .and(query_param("password", "s3cret"))
            .and(query_param("robotID", "robot-1"))
            .and(query_param("version", CLIENT_VERSION))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"key": "abc", "url": "ws://robot/ws"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let n = negotiate(&format!("{}/session", server.uri()), &creds(), TIMEOUT)
            .await
            .unwrap();
        assert_eq!(n.key, "abc");
        assert_eq!(n.url, "ws://robot/ws");
    }

    #[tokio::test]
    async fn negotiate_error_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = negotiate(&server.uri(), &creds(), TIMEOUT).await.unwrap_err();
        assert_matches!(
            err,
            ClientError::Transport { status: 500, ref message } if message.contains("overloaded")
        );
    }

    #[tokio::test]
    async fn negotiate_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = negotiate(&format!("http://127.0.0.1:{port}/"), &creds(), TIMEOUT)
            .await
            .unwrap_err();
        assert_matches!(err, ClientError::Transport { status: 0, .. });
    }

    #[tokio::test]
    async fn negotiate_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"key": "k", "url": "ws://h/"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = negotiate(&server.uri(), &creds(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_matches!(err, ClientError::Transport { .. });
    }

    #[tokio::test]
    async fn negotiate_logs_version_advisory() {
        let (logs, _guard) = capture_logs();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "key": "k",
                "url": "ws://h/",
                "current": "20991231"
            })))
            .mount(&server)
            .await;

        let n = negotiate(&server.uri(), &creds(), TIMEOUT).await.unwrap();
        assert!(n.is_outdated());
        assert_eq!(n.current.as_deref(), Some("20991231"));
        assert!(logs.has_event(tracing::Level::INFO, "newer client version"));
    }
}
