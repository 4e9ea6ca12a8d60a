//! HTTP-backed account store
//!
//! Talks to the external account data store over its REST interface:
//!
//! - `GET  {base}/accounts?active=true&order=updated_desc` — list candidates
//! - `PATCH {base}/accounts/{id}` with `{"usageCount": n}` — patch usage
//! - `POST {base}/accounts/usage/reset` — pool-wide quota rollover
//!
//! Authentication is a bearer API key. Recency ordering is delegated to the
//! store so every caller sees the same candidate ordering rules.

use std::future::Future;
use std::pin::Pin;

use common::Secret;
use tracing::debug;

use crate::account::Account;
use crate::error::{Error, Result};
use crate::store::AccountStore;

/// Account store client over the external REST data store.
pub struct RestStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<Secret<String>>,
}

impl RestStore {
    pub fn new(client: reqwest::Client, base_url: String, api_key: Option<Secret<String>>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key.expose()),
            None => request,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        if status.as_u16() == 404 {
            return Err(Error::NotFound(message));
        }
        Err(Error::Status {
            status: status.as_u16(),
            message,
        })
    }
}

impl AccountStore for RestStore {
    fn list_active(&self) -> Pin<Box<dyn Future<Output = Result<Vec<Account>>> + Send + '_>> {
        Box::pin(async move {
            let url = format!("{}/accounts?active=true&order=updated_desc", self.base_url);
            let response = self
                .authorize(self.client.get(&url))
                .send()
                .await
                .map_err(|e| Error::Http(format!("listing accounts: {e}")))?;
            let response = Self::check_status(response).await?;

            let accounts: Vec<Account> = response
                .json()
                .await
                .map_err(|e| Error::Parse(format!("account list body: {e}")))?;
            debug!(count = accounts.len(), "fetched active accounts");
            Ok(accounts)
        })
    }

    fn set_usage<'a>(
        &'a self,
        account_id: &'a str,
        usage_count: u32,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/accounts/{}", self.base_url, account_id);
            let response = self
                .authorize(self.client.patch(&url))
                .json(&serde_json::json!({ "usageCount": usage_count }))
                .send()
                .await
                .map_err(|e| Error::Http(format!("patching usage for {account_id}: {e}")))?;
            Self::check_status(response).await?;
            debug!(account_id, usage_count, "patched usage counter");
            Ok(())
        })
    }

    fn reset_usage(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let url = format!("{}/accounts/usage/reset", self.base_url);
            let response = self
                .authorize(self.client.post(&url))
                .send()
                .await
                .map_err(|e| Error::Http(format!("resetting usage counters: {e}")))?;
            Self::check_status(response).await?;
            debug!("reset usage counters for all active accounts");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Path;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::{get, patch, post};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::net::TcpListener;

    /// Start a mock data store that serves a fixed account list and records
    /// usage patches.
    async fn start_mock_store(
        accounts_body: &'static str,
    ) -> (String, Arc<AtomicU32>, Arc<AtomicU32>) {
        let patched = Arc::new(AtomicU32::new(u32::MAX));
        let resets = Arc::new(AtomicU32::new(0));
        let patched_clone = patched.clone();
        let resets_clone = resets.clone();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let app = Router::new()
            .route(
                "/accounts",
                get(move |headers: HeaderMap| async move {
                    // Bearer key must be forwarded
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("");
                    if auth != "Bearer store-key" {
                        return (StatusCode::UNAUTHORIZED, "missing key").into_response();
                    }
                    (
                        StatusCode::OK,
                        [(axum::http::header::CONTENT_TYPE, "application/json")],
                        accounts_body,
                    )
                        .into_response()
                }),
            )
            .route(
                "/accounts/{id}",
                patch(move |Path(_id): Path<String>, body: String| async move {
                    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
                    patched_clone
                        .store(json["usageCount"].as_u64().unwrap() as u32, Ordering::SeqCst);
                    StatusCode::NO_CONTENT
                }),
            )
            .route(
                "/accounts/usage/reset",
                post(move || async move {
                    resets_clone.fetch_add(1, Ordering::SeqCst);
                    StatusCode::NO_CONTENT
                }),
            );

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), patched, resets)
    }

    fn test_store(base_url: &str) -> RestStore {
        RestStore::new(
            reqwest::Client::new(),
            base_url.to_string(),
            Some(Secret::new("store-key".to_string())),
        )
    }

    #[tokio::test]
    async fn list_active_parses_wire_format() {
        let body = r#"[
            {"id":"a","accessToken":"tok_a","projectId":"p","usageCount":1,"usageLimit":5,"isActive":true},
            {"id":"b","accessToken":"tok_b","usageCount":0}
        ]"#;
        let (url, _, _) = start_mock_store(body).await;

        let store = test_store(&url);
        let accounts = store.list_active().await.unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].id, "a");
        assert_eq!(accounts[0].usage_limit, 5);
        assert_eq!(accounts[1].usage_limit, 100, "store default applies");
    }

    #[tokio::test]
    async fn list_active_requires_api_key() {
        let (url, _, _) = start_mock_store("[]").await;
        let store = RestStore::new(reqwest::Client::new(), url, None);

        let err = store.list_active().await.unwrap_err();
        assert!(matches!(err, Error::Status { status: 401, .. }), "got: {err}");
    }

    #[tokio::test]
    async fn list_active_malformed_body_is_parse_error() {
        let (url, _, _) = start_mock_store("<html>oops</html>").await;
        let store = test_store(&url);

        let err = store.list_active().await.unwrap_err();
        assert!(matches!(err, Error::Parse(_)), "got: {err}");
    }

    #[tokio::test]
    async fn set_usage_sends_patch_with_counter() {
        let (url, patched, _) = start_mock_store("[]").await;
        let store = test_store(&url);

        store.set_usage("acct-1", 42).await.unwrap();
        assert_eq!(patched.load(Ordering::SeqCst), 42);
    }

    #[tokio::test]
    async fn reset_usage_posts_rollover() {
        let (url, _, resets) = start_mock_store("[]").await;
        let store = test_store(&url);

        store.reset_usage().await.unwrap();
        assert_eq!(resets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_store_is_http_error() {
        let store = RestStore::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1".to_string(),
            None,
        );
        let err = store.list_active().await.unwrap_err();
        assert!(matches!(err, Error::Http(_)), "got: {err}");
    }
}
