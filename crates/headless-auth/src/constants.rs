//! Wire constants shared with the WP Engine headless plugin

/// Path of the token endpoint, relative to the backend URL.
pub const AUTHORIZE_PATH: &str = "/wp-json/wpac/v1/authorize";

/// Header carrying the client secret on every exchange.
pub const CLIENT_SECRET_HEADER: &str = "x-wpe-headless-secret";

/// Appended to the backend URL to form the refresh-token cookie name.
pub const REFRESH_TOKEN_COOKIE_SUFFIX: &str = "-rt";

/// Cookie lifetime used when the backend gives no refresh-token expiration.
pub const DEFAULT_REFRESH_TOKEN_MAX_AGE_SECS: i64 = 2_592_000; // 30 days
