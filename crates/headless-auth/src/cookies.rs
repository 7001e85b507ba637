//! Cookie storage for the refresh token
//!
//! `CookieStore` is the seam between the token manager and wherever cookies
//! actually live. Two implementations ship with the crate:
//!
//! - `MemoryCookieStore`: a plain map, useful for tests and non-browser callers
//! - `JarCookieStore`: a `cookie::CookieJar` seeded from an incoming request's
//!   `Cookie` header; writes accumulate as a delta that the server renders
//!   into `Set-Cookie` headers on the response
//!
//! The jar percent-encodes names and values on the way out and decodes them
//! on the way in, so opaque tokens containing `;`, spaces or `=` survive the
//! trip through the browser.

use std::collections::HashMap;
use std::sync::Mutex;

use ::cookie::time::{Duration, OffsetDateTime};
use ::cookie::{Cookie, CookieJar};
use tracing::debug;

pub use ::cookie::SameSite;

use crate::error::{Error, Result};

/// Attributes written alongside a cookie value.
///
/// `expires` is an absolute unix timestamp in seconds; `max_age` is a
/// relative lifetime in seconds. Callers set at most one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub expires: Option<i64>,
    pub max_age: Option<i64>,
    pub path: String,
    pub same_site: SameSite,
    pub secure: bool,
    pub http_only: bool,
}

/// Read/write/delete a named cookie.
///
/// Methods take `&self` so a single store can be shared by reference across
/// an async request; implementations provide their own interior locking.
pub trait CookieStore: Send + Sync {
    fn get_cookie(&self, name: &str) -> Result<Option<String>>;

    fn set_cookie(&self, name: &str, value: &str, options: &CookieOptions) -> Result<()>;

    fn remove_cookie(&self, name: &str) -> Result<()>;
}

/// A cookie held by `MemoryCookieStore`, with the options it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCookie {
    pub value: String,
    /// `None` for cookies inserted with `MemoryCookieStore::with_cookie`
    pub options: Option<CookieOptions>,
}

/// In-process cookie store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    cookies: Mutex<HashMap<String, StoredCookie>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a cookie as if it had arrived from a browser.
    pub fn with_cookie(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Ok(mut cookies) = self.cookies.lock() {
            cookies.insert(
                name.into(),
                StoredCookie {
                    value: value.into(),
                    options: None,
                },
            );
        }
        self
    }

    /// The cookie stored under `name`, including its write options.
    pub fn stored(&self, name: &str) -> Option<StoredCookie> {
        self.cookies.lock().ok()?.get(name).cloned()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, StoredCookie>>> {
        self.cookies
            .lock()
            .map_err(|_| Error::Cookie("memory cookie store lock poisoned".into()))
    }
}

impl CookieStore for MemoryCookieStore {
    fn get_cookie(&self, name: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(name).map(|c| c.value.clone()))
    }

    fn set_cookie(&self, name: &str, value: &str, options: &CookieOptions) -> Result<()> {
        self.lock()?.insert(
            name.to_owned(),
            StoredCookie {
                value: value.to_owned(),
                options: Some(options.clone()),
            },
        );
        Ok(())
    }

    fn remove_cookie(&self, name: &str) -> Result<()> {
        self.lock()?.remove(name);
        Ok(())
    }
}

/// Server-side cookie jar for one request/response cycle.
pub struct JarCookieStore {
    jar: Mutex<CookieJar>,
}

impl JarCookieStore {
    /// Empty jar: no cookies were sent with the request.
    pub fn new() -> Self {
        Self {
            jar: Mutex::new(CookieJar::new()),
        }
    }

    /// Seed the jar from a request `Cookie` header value
    /// (`name=value; other=value`), percent-decoding each pair. Malformed
    /// pairs are skipped.
    pub fn from_header(header: &str) -> Self {
        let mut jar = CookieJar::new();
        for parsed in Cookie::split_parse_encoded(header) {
            match parsed {
                Ok(cookie) => jar.add_original(cookie.into_owned()),
                Err(e) => debug!(error = %e, "skipping malformed request cookie"),
            }
        }
        Self {
            jar: Mutex::new(jar),
        }
    }

    /// Render every change made through this store as percent-encoded
    /// `Set-Cookie` values, removals included.
    pub fn set_cookie_headers(&self) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .delta()
            .map(|c| c.encoded().to_string())
            .collect())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, CookieJar>> {
        self.jar
            .lock()
            .map_err(|_| Error::Cookie("cookie jar lock poisoned".into()))
    }
}

impl Default for JarCookieStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieStore for JarCookieStore {
    fn get_cookie(&self, name: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(name).map(|c| c.value().to_owned()))
    }

    fn set_cookie(&self, name: &str, value: &str, options: &CookieOptions) -> Result<()> {
        let mut builder = Cookie::build((name.to_owned(), value.to_owned()))
            .path(options.path.clone())
            .same_site(options.same_site)
            .secure(options.secure)
            .http_only(options.http_only);

        if let Some(expires) = options.expires {
            let at = OffsetDateTime::from_unix_timestamp(expires)
                .map_err(|e| Error::Cookie(format!("cookie expiry {expires} out of range: {e}")))?;
            builder = builder.expires(at);
        }
        if let Some(max_age) = options.max_age {
            builder = builder.max_age(Duration::seconds(max_age));
        }

        self.lock()?.add(builder);
        Ok(())
    }

    fn remove_cookie(&self, name: &str) -> Result<()> {
        // Removal cookies must carry the path the cookie was written with.
        self.lock()?
            .remove(Cookie::build((name.to_owned(), String::new())).path("/"));
        Ok(())
    }
}
