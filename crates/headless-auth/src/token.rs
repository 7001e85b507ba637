//! Token exchange results and response shape validation
//!
//! A successful exchange hands back the backend's JSON body untouched
//! (`TokenResponse::Issued`). Nothing guarantees that body is a well-formed
//! token pair until the caller checks it with `is_token_pair` or
//! `TokenResponse::token_pair`.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

/// Access/refresh token pair issued by the authorize endpoint.
///
/// Expirations are absolute unix timestamps in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub access_token_expiration: i64,
    pub refresh_token: String,
    pub refresh_token_expiration: i64,
}

impl TokenPair {
    /// Build a `TokenPair` from a JSON value that passes `is_token_pair`.
    ///
    /// Fractional expirations are truncated to whole seconds.
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        if !is_token_pair(value) {
            return None;
        }
        Some(Self {
            access_token: value["accessToken"].as_str()?.to_owned(),
            access_token_expiration: epoch_seconds(&value["accessTokenExpiration"])?,
            refresh_token: value["refreshToken"].as_str()?.to_owned(),
            refresh_token_expiration: epoch_seconds(&value["refreshTokenExpiration"])?,
        })
    }
}

fn epoch_seconds(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|secs| secs as i64))
}

/// The backend rejected the exchange.
///
/// `result` is the backend's JSON body, passed through unmodified.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeFailure {
    pub status: StatusCode,
    pub result: serde_json::Value,
}

/// Outcome of `TokenManager::fetch_tokens`.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenResponse {
    /// 2xx from the backend. The body has not been shape-checked.
    Issued(serde_json::Value),
    /// Non-2xx from the backend.
    Failed(ExchangeFailure),
}

impl TokenResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, TokenResponse::Failed(_))
    }

    /// The issued token pair, if this is a success whose body has the
    /// token pair shape.
    pub fn token_pair(&self) -> Option<TokenPair> {
        match self {
            TokenResponse::Issued(body) => TokenPair::from_value(body),
            TokenResponse::Failed(_) => None,
        }
    }
}

/// True iff `value` is an object carrying string `accessToken` and
/// `refreshToken` and numeric `accessTokenExpiration` and
/// `refreshTokenExpiration`.
///
/// Ranges and emptiness are not checked, and neither is an `error` member.
pub fn is_token_pair(value: &serde_json::Value) -> bool {
    if value.is_null() {
        return false;
    }
    value["accessToken"].is_string()
        && value["refreshToken"].is_string()
        && value["accessTokenExpiration"].is_number()
        && value["refreshTokenExpiration"].is_number()
}
