//! Backend connection settings injected into the token manager

use common::Secret;

use crate::constants::AUTHORIZE_PATH;

/// Where the headless backend lives and how to authenticate to it.
///
/// Passed to `TokenManager::new` by reference. One value per backend; the
/// backend URL also namespaces the refresh-token cookie.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    backend_url: String,
    client_secret: Option<Secret<String>>,
}

impl HeadlessConfig {
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            client_secret: None,
        }
    }

    pub fn with_client_secret(mut self, secret: impl Into<Secret<String>>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    /// The configured client secret. An empty secret counts as unset.
    pub fn client_secret(&self) -> Option<&Secret<String>> {
        self.client_secret.as_ref().filter(|s| !s.expose().is_empty())
    }

    /// `{backend_url}/wp-json/wpac/v1/authorize`
    pub fn authorize_url(&self) -> String {
        format!("{}{}", self.backend_url, AUTHORIZE_PATH)
    }
}
