//! Refresh-token lifecycle for a headless WordPress backend
//!
//! Persists the long-lived refresh token in a cookie, exchanges an
//! authorization code or the stored refresh token for a fresh token pair at
//! the backend authorize endpoint, and checks the shape of what comes back.
//!
//! Typical flow:
//! 1. Build a `TokenManager` over a `HeadlessConfig`, a `CookieStore` and an
//!    `HttpClient` (e.g. `reqwest::Client`)
//! 2. Call `TokenManager::fetch_tokens()` with the authorization code, if any
//! 3. On `TokenResponse::Issued`, validate with `TokenResponse::token_pair()`
//! 4. Persist via `TokenManager::set_refresh_token()`; clear it by passing
//!    `None` after a rejected exchange or on logout

pub mod config;
pub mod constants;
pub mod cookies;
pub mod error;
pub mod http;
pub mod manager;
pub mod token;

pub use config::HeadlessConfig;
pub use constants::*;
pub use cookies::{
    CookieOptions, CookieStore, JarCookieStore, MemoryCookieStore, SameSite, StoredCookie,
};
pub use error::{Error, Result};
pub use http::{HttpClient, HttpResponse};
pub use manager::{TokenManager, refresh_token_key};
pub use token::{ExchangeFailure, TokenPair, TokenResponse, is_token_pair};
