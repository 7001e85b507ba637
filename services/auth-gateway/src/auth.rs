//! Browser-facing token routes
//!
//! Endpoints:
//! - GET  /api/auth/wpe-headless?code=...  exchange a code or the stored
//!   refresh token, persist the new refresh token, return the access token
//! - POST /api/auth/logout                 drop the refresh-token cookie
//!
//! Each request gets its own cookie jar seeded from the `Cookie` header and
//! its own `TokenManager`; whatever the manager writes to the jar is sent
//! back as `Set-Cookie`.

use std::time::Instant;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use headless_auth::{JarCookieStore, TokenManager, TokenPair, TokenResponse};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::AppState;
use crate::metrics;

#[derive(Debug, Deserialize)]
pub struct AuthorizeParams {
    code: Option<String>,
}

/// Outcome label, response status, response body.
type AuthorizeResult = (&'static str, StatusCode, serde_json::Value);

/// GET /api/auth/wpe-headless: exchange for a fresh access token.
///
/// The refresh token only ever travels in the HttpOnly cookie; the body
/// carries the access token and its expiration.
pub async fn authorize_handler(
    State(state): State<AppState>,
    Query(params): Query<AuthorizeParams>,
    headers: HeaderMap,
) -> Response {
    let cookies = request_cookies(&headers);
    let manager = TokenManager::new(&state.headless, &cookies, &state.http);
    let code = params.code.as_deref().filter(|c| !c.is_empty());

    let started = Instant::now();
    let (outcome, status, body) = authorize(&manager, code).await;
    metrics::record_exchange(outcome, started.elapsed().as_secs_f64());

    with_set_cookies((status, Json(body)).into_response(), &cookies)
}

async fn authorize(manager: &TokenManager<'_>, code: Option<&str>) -> AuthorizeResult {
    let stored = match manager.get_refresh_token() {
        Ok(stored) => stored,
        Err(e) => return internal_error("reading refresh token", &e),
    };

    if code.is_none() && stored.is_none() {
        return (
            "unauthorized",
            StatusCode::UNAUTHORIZED,
            serde_json::json!({ "error": "Unauthorized" }),
        );
    }

    let response = match manager.fetch_tokens(code).await {
        Ok(response) => response,
        Err(e) => return internal_error("token exchange", &e),
    };

    let body = match response {
        TokenResponse::Issued(body) => body,
        TokenResponse::Failed(failure) => {
            // The stored token is useless once the backend refuses it
            if let Err(e) = manager.set_refresh_token(None, None) {
                warn!(error = %e, "failed to clear rejected refresh token");
            }
            let status =
                StatusCode::from_u16(failure.status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            return ("rejected", status, failure.result);
        }
    };

    let Some(pair) = TokenPair::from_value(&body) else {
        warn!("backend issued a response without the token pair shape");
        return (
            "malformed",
            StatusCode::INTERNAL_SERVER_ERROR,
            serde_json::json!({ "error": "malformed token response" }),
        );
    };

    if let Err(e) = manager.set_refresh_token(
        Some(pair.refresh_token.as_str()),
        Some(pair.refresh_token_expiration),
    ) {
        return internal_error("storing refresh token", &e);
    }

    info!(
        access_token_expiration = pair.access_token_expiration,
        "access token issued"
    );
    (
        "issued",
        StatusCode::OK,
        serde_json::json!({
            "accessToken": pair.access_token,
            "accessTokenExpiration": pair.access_token_expiration,
        }),
    )
}

fn internal_error(context: &str, e: &headless_auth::Error) -> AuthorizeResult {
    error!(error = %e, context, "authorize failed");
    (
        "error",
        StatusCode::INTERNAL_SERVER_ERROR,
        serde_json::json!({ "error": e.to_string() }),
    )
}

/// POST /api/auth/logout: expire the refresh-token cookie.
pub async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let cookies = request_cookies(&headers);
    let manager = TokenManager::new(&state.headless, &cookies, &state.http);

    if let Err(e) = manager.set_refresh_token(None, None) {
        error!(error = %e, "failed to clear refresh token");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        )
            .into_response();
    }

    metrics::record_logout();
    info!("refresh token cleared");
    with_set_cookies(StatusCode::RESET_CONTENT.into_response(), &cookies)
}

/// Jar holding every cookie the browser sent, across all `Cookie` headers.
fn request_cookies(headers: &HeaderMap) -> JarCookieStore {
    let joined = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");
    if joined.is_empty() {
        JarCookieStore::new()
    } else {
        JarCookieStore::from_header(&joined)
    }
}

/// Attach the jar's changes to `response`. If they cannot be rendered the
/// cookie write is lost, so the response becomes a 500 instead.
fn with_set_cookies(mut response: Response, cookies: &JarCookieStore) -> Response {
    let rendered = match cookies.set_cookie_headers() {
        Ok(rendered) => rendered,
        Err(e) => {
            error!(error = %e, "failed to render Set-Cookie headers");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response();
        }
    };
    for cookie in rendered {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "dropping unencodable Set-Cookie header"),
        }
    }
    response
}
