//! Refresh-token persistence and the token exchange protocol
//!
//! `TokenManager` is stateless: it borrows its collaborators and re-reads the
//! refresh-token cookie on every exchange. It never caches access tokens and
//! never persists the result of an exchange on its own. Callers validate
//! the response first, then commit the refresh token with
//! `set_refresh_token`.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, info, warn};

use crate::config::HeadlessConfig;
use crate::constants::{
    CLIENT_SECRET_HEADER, DEFAULT_REFRESH_TOKEN_MAX_AGE_SECS, REFRESH_TOKEN_COOKIE_SUFFIX,
};
use crate::cookies::{CookieOptions, CookieStore, SameSite};
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::token::{ExchangeFailure, TokenResponse, is_token_pair};

/// Token lifecycle operations for one backend.
pub struct TokenManager<'a> {
    config: &'a HeadlessConfig,
    cookies: &'a dyn CookieStore,
    http: &'a dyn HttpClient,
    token_key: String,
}

impl<'a> TokenManager<'a> {
    pub fn new(
        config: &'a HeadlessConfig,
        cookies: &'a dyn CookieStore,
        http: &'a dyn HttpClient,
    ) -> Self {
        Self {
            config,
            cookies,
            http,
            token_key: refresh_token_key(config.backend_url()),
        }
    }

    /// Name of the refresh-token cookie: `{backend_url}-rt`.
    pub fn token_key(&self) -> &str {
        &self.token_key
    }

    /// The stored refresh token, if any. The value is opaque and returned
    /// as-is.
    pub fn get_refresh_token(&self) -> Result<Option<String>> {
        self.cookies.get_cookie(&self.token_key)
    }

    /// Persist `token` as the refresh token, or delete the cookie when
    /// `token` is `None` or empty.
    ///
    /// With `expires` (unix seconds) the cookie gets that absolute expiry;
    /// without it, a 30-day max-age. Never both.
    pub fn set_refresh_token(&self, token: Option<&str>, expires: Option<i64>) -> Result<()> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            debug!(key = %self.token_key, "clearing refresh token");
            return self.cookies.remove_cookie(&self.token_key);
        };

        debug!(key = %self.token_key, expires, "storing refresh token");
        self.cookies
            .set_cookie(&self.token_key, token, &refresh_cookie_options(expires))
    }

    /// Exchange an authorization code and/or the stored refresh token for a
    /// new token pair.
    ///
    /// Fails with `Error::MissingClientSecret` before any I/O when no client
    /// secret is configured. A non-2xx reply is returned as
    /// `TokenResponse::Failed`, not as an error. A 2xx body is returned
    /// unvalidated.
    pub async fn fetch_tokens(&self, code: Option<&str>) -> Result<TokenResponse> {
        let secret = self
            .config
            .client_secret()
            .ok_or(Error::MissingClientSecret)?;

        let mut secret_value =
            HeaderValue::from_str(secret.expose()).map_err(|_| Error::InvalidClientSecret)?;
        secret_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(HeaderName::from_static(CLIENT_SECRET_HEADER), secret_value);

        let refresh_token = self.get_refresh_token()?;
        debug!(
            backend_url = self.config.backend_url(),
            has_code = code.is_some(),
            has_refresh_token = refresh_token.is_some(),
            "requesting tokens"
        );

        // Absent members are left out of the body entirely
        let mut body = serde_json::Map::new();
        if let Some(code) = code {
            body.insert("code".into(), code.into());
        }
        if let Some(refresh_token) = refresh_token {
            body.insert("refreshToken".into(), refresh_token.into());
        }
        let body = serde_json::Value::Object(body);

        let url = self.config.authorize_url();
        let response = self.http.post_json(&url, headers, &body).await?;

        if !response.status.is_success() {
            warn!(status = %response.status, "token exchange rejected by backend");
            return Ok(TokenResponse::Failed(ExchangeFailure {
                status: response.status,
                result: response.body,
            }));
        }

        info!(status = %response.status, "token exchange succeeded");
        Ok(TokenResponse::Issued(response.body))
    }

    /// See `token::is_token_pair`.
    pub fn is_token_pair(&self, value: &serde_json::Value) -> bool {
        is_token_pair(value)
    }
}

/// Cookie name under which the refresh token for `backend_url` is stored.
pub fn refresh_token_key(backend_url: &str) -> String {
    format!("{backend_url}{REFRESH_TOKEN_COOKIE_SUFFIX}")
}

fn refresh_cookie_options(expires: Option<i64>) -> CookieOptions {
    let max_age = match expires {
        Some(_) => None,
        None => Some(DEFAULT_REFRESH_TOKEN_MAX_AGE_SECS),
    };
    CookieOptions {
        expires,
        max_age,
        path: "/".into(),
        same_site: SameSite::Strict,
        secure: true,
        http_only: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::MemoryCookieStore;
    use crate::http::HttpResponse;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    const BACKEND: &str = "https://cms.example.com";
    const KEY: &str = "https://cms.example.com-rt";

    struct RecordedRequest {
        url: String,
        headers: HeaderMap,
        body: serde_json::Value,
    }

    /// Replies with a canned response and records every request.
    struct FakeBackend {
        status: StatusCode,
        reply: serde_json::Value,
        requests: Mutex<Vec<RecordedRequest>>,
    }

    impl FakeBackend {
        fn new(status: u16, reply: serde_json::Value) -> Self {
            Self {
                status: StatusCode::from_u16(status).unwrap(),
                reply,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    impl HttpClient for FakeBackend {
        fn post_json<'a>(
            &'a self,
            url: &'a str,
            headers: HeaderMap,
            body: &'a serde_json::Value,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + 'a>> {
            self.requests.lock().unwrap().push(RecordedRequest {
                url: url.to_string(),
                headers,
                body: body.clone(),
            });
            let response = HttpResponse {
                status: self.status,
                body: self.reply.clone(),
            };
            Box::pin(async move { Ok(response) })
        }
    }

    fn tokens_json() -> serde_json::Value {
        json!({
            "accessToken": "at_new",
            "accessTokenExpiration": 1_700_000_300,
            "refreshToken": "rt_new",
            "refreshTokenExpiration": 1_702_592_000,
        })
    }

    fn configured() -> HeadlessConfig {
        HeadlessConfig::new(BACKEND).with_client_secret("s3cret")
    }

    #[test]
    fn token_key_is_derived_from_backend_url() {
        let a = HeadlessConfig::new("https://a.example.com");
        let a_again = HeadlessConfig::new("https://a.example.com");
        let b = HeadlessConfig::new("https://b.example.com");
        let cookies = MemoryCookieStore::new();
        let http = FakeBackend::new(200, json!({}));

        let first = TokenManager::new(&a, &cookies, &http);
        let second = TokenManager::new(&a_again, &cookies, &http);
        let other = TokenManager::new(&b, &cookies, &http);

        assert_eq!(first.token_key(), "https://a.example.com-rt");
        assert_eq!(first.token_key(), second.token_key());
        assert_ne!(first.token_key(), other.token_key());
    }

    #[test]
    fn switching_backends_does_not_reuse_tokens() {
        let a = HeadlessConfig::new("https://a.example.com");
        let b = HeadlessConfig::new("https://b.example.com");
        let cookies = MemoryCookieStore::new();
        let http = FakeBackend::new(200, json!({}));

        TokenManager::new(&a, &cookies, &http)
            .set_refresh_token(Some("rt_a"), None)
            .unwrap();

        let manager_b = TokenManager::new(&b, &cookies, &http);
        assert_eq!(manager_b.get_refresh_token().unwrap(), None);
    }

    #[test]
    fn set_with_expiry_uses_absolute_expiry_only() {
        let config = configured();
        let cookies = MemoryCookieStore::new();
        let http = FakeBackend::new(200, json!({}));
        let manager = TokenManager::new(&config, &cookies, &http);

        for expires in [1_702_592_000_i64, 4_102_444_800, 1] {
            manager.set_refresh_token(Some("rt_1"), Some(expires)).unwrap();

            let options = cookies.stored(KEY).unwrap().options.unwrap();
            assert_eq!(options.expires, Some(expires));
            assert_eq!(options.max_age, None);
        }
    }

    #[test]
    fn set_without_expiry_uses_thirty_day_max_age() {
        let config = configured();
        let cookies = MemoryCookieStore::new();
        let http = FakeBackend::new(200, json!({}));
        let manager = TokenManager::new(&config, &cookies, &http);

        manager.set_refresh_token(Some("rt_1"), None).unwrap();

        let stored = cookies.stored(KEY).unwrap();
        assert_eq!(stored.value, "rt_1");
        let options = stored.options.unwrap();
        assert_eq!(options.max_age, Some(2_592_000));
        assert_eq!(options.expires, None);
    }

    #[test]
    fn cookie_security_attributes_are_always_set() {
        let config = configured();
        let cookies = MemoryCookieStore::new();
        let http = FakeBackend::new(200, json!({}));
        let manager = TokenManager::new(&config, &cookies, &http);

        for expires in [None, Some(1_702_592_000)] {
            manager.set_refresh_token(Some("rt_1"), expires).unwrap();
            let options = cookies.stored(KEY).unwrap().options.unwrap();
            assert_eq!(options.path, "/");
            assert_eq!(options.same_site, SameSite::Strict);
            assert!(options.secure);
            assert!(options.http_only);
        }
    }

    #[test]
    fn missing_or_empty_token_deletes_cookie() {
        let config = configured();
        let http = FakeBackend::new(200, json!({}));

        for token in [None, Some("")] {
            let cookies = MemoryCookieStore::new().with_cookie(KEY, "rt_old");
            let manager = TokenManager::new(&config, &cookies, &http);

            manager.set_refresh_token(token, Some(1_702_592_000)).unwrap();

            assert!(cookies.stored(KEY).is_none(), "cookie kept for {token:?}");
            assert_eq!(manager.get_refresh_token().unwrap(), None);
        }
    }

    #[test]
    fn get_returns_last_written_value() {
        let config = configured();
        let cookies = MemoryCookieStore::new();
        let http = FakeBackend::new(200, json!({}));
        let manager = TokenManager::new(&config, &cookies, &http);

        assert_eq!(manager.get_refresh_token().unwrap(), None);
        manager.set_refresh_token(Some("rt_1"), None).unwrap();
        manager.set_refresh_token(Some("rt_2"), Some(10)).unwrap();
        assert_eq!(manager.get_refresh_token().unwrap().as_deref(), Some("rt_2"));
        manager.set_refresh_token(None, None).unwrap();
        assert_eq!(manager.get_refresh_token().unwrap(), None);
    }

    #[tokio::test]
    async fn missing_secret_fails_without_network() {
        let http = FakeBackend::new(200, tokens_json());
        let cookies = MemoryCookieStore::new();

        for config in [
            HeadlessConfig::new(BACKEND),
            HeadlessConfig::new(BACKEND).with_client_secret(""),
        ] {
            let manager = TokenManager::new(&config, &cookies, &http);
            let result = manager.fetch_tokens(Some("code")).await;
            assert!(
                matches!(result, Err(Error::MissingClientSecret)),
                "got: {result:?}"
            );
        }
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn request_shape_matches_authorize_endpoint() {
        let config = configured();
        let cookies = MemoryCookieStore::new().with_cookie(KEY, "rt_old");
        let http = FakeBackend::new(200, tokens_json());
        let manager = TokenManager::new(&config, &cookies, &http);

        manager.fetch_tokens(Some("auth_code")).await.unwrap();

        let requests = http.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(
            request.url,
            "https://cms.example.com/wp-json/wpac/v1/authorize"
        );
        assert_eq!(request.headers[CONTENT_TYPE], "application/json");
        assert_eq!(request.headers["x-wpe-headless-secret"], "s3cret");
        assert!(request.headers["x-wpe-headless-secret"].is_sensitive());
        assert_eq!(
            request.body,
            json!({ "code": "auth_code", "refreshToken": "rt_old" })
        );
    }

    #[tokio::test]
    async fn absent_code_and_token_are_omitted_from_body() {
        let config = configured();
        let cookies = MemoryCookieStore::new();
        let http = FakeBackend::new(200, tokens_json());
        let manager = TokenManager::new(&config, &cookies, &http);

        manager.fetch_tokens(None).await.unwrap();
        cookies.set_cookie(KEY, "rt_only", &refresh_cookie_options(None)).unwrap();
        manager.fetch_tokens(None).await.unwrap();

        let requests = http.requests.lock().unwrap();
        assert_eq!(requests[0].body, json!({}));
        assert_eq!(requests[1].body, json!({ "refreshToken": "rt_only" }));
    }

    #[tokio::test]
    async fn rejection_is_reported_as_value() {
        let config = configured();
        let cookies = MemoryCookieStore::new();
        let http = FakeBackend::new(401, json!({ "message": "invalid_grant" }));
        let manager = TokenManager::new(&config, &cookies, &http);

        let response = manager.fetch_tokens(Some("expired")).await.unwrap();

        assert_eq!(
            response,
            TokenResponse::Failed(ExchangeFailure {
                status: StatusCode::UNAUTHORIZED,
                result: json!({ "message": "invalid_grant" }),
            })
        );
        assert!(response.is_error());
    }

    #[tokio::test]
    async fn success_returns_body_that_validates() {
        let config = configured();
        let cookies = MemoryCookieStore::new();
        let http = FakeBackend::new(200, tokens_json());
        let manager = TokenManager::new(&config, &cookies, &http);

        let response = manager.fetch_tokens(Some("auth_code")).await.unwrap();

        let TokenResponse::Issued(body) = &response else {
            panic!("expected issued tokens, got {response:?}");
        };
        assert_eq!(body, &tokens_json());
        assert!(manager.is_token_pair(body));
        assert_eq!(response.token_pair().unwrap().refresh_token, "rt_new");
    }

    #[tokio::test]
    async fn exchange_does_not_persist_tokens() {
        let config = configured();
        let cookies = MemoryCookieStore::new().with_cookie(KEY, "rt_old");
        let http = FakeBackend::new(200, tokens_json());
        let manager = TokenManager::new(&config, &cookies, &http);

        manager.fetch_tokens(None).await.unwrap();

        assert_eq!(manager.get_refresh_token().unwrap().as_deref(), Some("rt_old"));
    }

    #[tokio::test]
    async fn malformed_success_body_is_passed_through() {
        let config = configured();
        let cookies = MemoryCookieStore::new();
        let http = FakeBackend::new(200, json!({ "accessToken": "a" }));
        let manager = TokenManager::new(&config, &cookies, &http);

        let response = manager.fetch_tokens(Some("code")).await.unwrap();

        assert_eq!(response, TokenResponse::Issued(json!({ "accessToken": "a" })));
        assert!(response.token_pair().is_none());
    }

    #[tokio::test]
    async fn non_ascii_secret_is_rejected_before_network() {
        let config = HeadlessConfig::new(BACKEND).with_client_secret("bad\nsecret");
        let cookies = MemoryCookieStore::new();
        let http = FakeBackend::new(200, tokens_json());
        let manager = TokenManager::new(&config, &cookies, &http);

        let result = manager.fetch_tokens(None).await;
        assert!(matches!(result, Err(Error::InvalidClientSecret)), "got: {result:?}");
        assert_eq!(http.request_count(), 0);
    }

    #[tokio::test]
    async fn exchange_against_live_backend_then_persist() {
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let backend_url = format!("http://{}", listener.local_addr().unwrap());
        let _server = tokio::spawn(async move {
            let app = axum::Router::new().route(
                "/wp-json/wpac/v1/authorize",
                axum::routing::post(|| async { axum::Json(tokens_json()) }),
            );
            axum::serve(listener, app).await.unwrap();
        });

        let config = HeadlessConfig::new(backend_url).with_client_secret("s3cret");
        let cookies = MemoryCookieStore::new();
        let http = reqwest::Client::new();
        let manager = TokenManager::new(&config, &cookies, &http);

        let pair = manager
            .fetch_tokens(Some("auth_code"))
            .await
            .unwrap()
            .token_pair()
            .unwrap();
        manager
            .set_refresh_token(Some(pair.refresh_token.as_str()), Some(pair.refresh_token_expiration))
            .unwrap();

        assert_eq!(manager.get_refresh_token().unwrap().as_deref(), Some("rt_new"));
        let options = cookies.stored(manager.token_key()).unwrap().options.unwrap();
        assert_eq!(options.expires, Some(1_702_592_000));
    }
}
