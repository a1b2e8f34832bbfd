//! Vendor snapshot client.
//!
//! One GET against the configured endpoint. No retries: callers decide
//! whether a failed run is rerun. Redirects are capped and every non-success
//! status maps to a typed error so the CLI and server can answer precisely.

use reqwest::{header, redirect, Client, StatusCode};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::EngineError;

/// Header carrying the vendor license key.
pub const LICENSE_HEADER: &str = "X-ComplyMap-License";

#[derive(Debug, Clone)]
pub struct SnapshotClient {
    client: Client,
    endpoint: String,
    license_key: String,
}

impl SnapshotClient {
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .redirect(redirect::Policy::limited(config.max_redirects))
            .user_agent(concat!("complymap/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            license_key: config.license_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetch and parse the compliance snapshot. The license key is checked
    /// before any network traffic; a blank key never leaves the process.
    pub async fn fetch(&self) -> Result<Value, EngineError> {
        let key = self.license_key.trim();
        if key.is_empty() {
            return Err(EngineError::MissingCredential);
        }

        let response = self
            .client
            .get(&self.endpoint)
            .header(header::ACCEPT, "application/json")
            .header(LICENSE_HEADER, key)
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, &self.endpoint));
        }

        let body = response.text().await?;
        let value: Value = serde_json::from_str(&body)
            .map_err(|err| EngineError::MalformedSnapshot(err.to_string()))?;
        if !value.is_object() {
            return Err(EngineError::SnapshotNotObject);
        }
        Ok(value)
    }
}

fn classify_status(status: StatusCode, endpoint: &str) -> EngineError {
    match status.as_u16() {
        401 | 403 => EngineError::AuthRejected(status.as_u16()),
        404 => EngineError::NotFound(endpoint.to_string()),
        526 => EngineError::EdgeUnavailable,
        code if code >= 500 => EngineError::UpstreamServer(code),
        code => EngineError::UnexpectedStatus(code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    async fn spawn(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });
        format!("http://{addr}")
    }

    fn client_for(endpoint: &str, license: &str) -> SnapshotClient {
        let config = EngineConfig::default()
            .with_endpoint(endpoint)
            .with_license_key(license);
        SnapshotClient::from_config(&config).expect("client")
    }

    #[test]
    fn status_classification_covers_the_taxonomy() {
        let classify = |code: u16| {
            classify_status(
                StatusCode::from_u16(code).expect("status"),
                "https://api.example/snapshot",
            )
        };
        assert!(matches!(classify(401), EngineError::AuthRejected(401)));
        assert!(matches!(classify(403), EngineError::AuthRejected(403)));
        assert!(matches!(classify(404), EngineError::NotFound(_)));
        assert!(matches!(classify(526), EngineError::EdgeUnavailable));
        assert!(matches!(classify(500), EngineError::UpstreamServer(500)));
        assert!(matches!(classify(503), EngineError::UpstreamServer(503)));
        assert!(matches!(classify(418), EngineError::UnexpectedStatus(418)));
    }

    #[tokio::test]
    async fn blank_license_fails_before_any_request() {
        let client = client_for("http://127.0.0.1:1/unreachable", "   ");
        let err = client.fetch().await.expect_err("missing credential");
        assert!(matches!(err, EngineError::MissingCredential));
    }

    #[tokio::test]
    async fn license_header_is_forwarded() {
        let router = Router::new().route(
            "/snapshot",
            get(|headers: HeaderMap| async move {
                let licensed = headers
                    .get("x-complymap-license")
                    .and_then(|value| value.to_str().ok())
                    == Some("secret-key");
                if licensed {
                    Json(json!({"company": {"name": "Acme"}})).into_response()
                } else {
                    axum::http::StatusCode::UNAUTHORIZED.into_response()
                }
            }),
        );
        let base = spawn(router).await;
        let client = client_for(&format!("{base}/snapshot"), "secret-key");
        let snapshot = client.fetch().await.expect("snapshot");
        assert_eq!(snapshot["company"]["name"], "Acme");

        let rejected = client_for(&format!("{base}/snapshot"), "wrong-key");
        let err = rejected.fetch().await.expect_err("401");
        assert!(matches!(err, EngineError::AuthRejected(401)));
    }

    #[tokio::test]
    async fn edge_526_maps_to_a_retry_hint() {
        let router = Router::new().route(
            "/snapshot",
            get(|| async {
                (
                    axum::http::StatusCode::from_u16(526).expect("status"),
                    "ssl error",
                )
            }),
        );
        let base = spawn(router).await;
        let client = client_for(&format!("{base}/snapshot"), "secret-key");
        let err = client.fetch().await.expect_err("526");
        assert!(matches!(err, EngineError::EdgeUnavailable));
        assert!(err.to_string().contains("try again shortly"));
    }

    #[tokio::test]
    async fn non_object_bodies_are_rejected() {
        let router = Router::new()
            .route("/array", get(|| async { Json(json!([1, 2, 3])) }))
            .route("/garbage", get(|| async { "not json at all" }));
        let base = spawn(router).await;

        let client = client_for(&format!("{base}/array"), "secret-key");
        let err = client.fetch().await.expect_err("array body");
        assert!(matches!(err, EngineError::SnapshotNotObject));

        let client = client_for(&format!("{base}/garbage"), "secret-key");
        let err = client.fetch().await.expect_err("garbage body");
        assert!(matches!(err, EngineError::MalformedSnapshot(_)));
    }
}
