//! Transport seam for the token exchange
//!
//! The manager only needs "POST this JSON, give me the status and the parsed
//! JSON body back". `reqwest::Client` implements that directly; tests swap
//! in a recording fake.

use std::future::Future;
use std::pin::Pin;

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use tracing::debug;

use crate::error::{Error, Result};

/// Status and parsed JSON body of a backend response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: serde_json::Value,
}

/// Minimal POST-JSON client.
///
/// The body is parsed as JSON regardless of status, since the backend sends
/// JSON error payloads too. A body that is not JSON is `Error::ResponseParse`.
pub trait HttpClient: Send + Sync {
    fn post_json<'a>(
        &'a self,
        url: &'a str,
        headers: HeaderMap,
        body: &'a serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + 'a>>;
}

impl HttpClient for reqwest::Client {
    fn post_json<'a>(
        &'a self,
        url: &'a str,
        headers: HeaderMap,
        body: &'a serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse>> + Send + 'a>> {
        Box::pin(async move {
            let response = self
                .post(url)
                .headers(headers)
                .json(body)
                .send()
                .await
                .map_err(|e| Error::Http(format!("POST {url} failed: {e}")))?;

            let status = response.status();
            let body = response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| Error::ResponseParse(format!("{status} from {url}: {e}")))?;

            debug!(%status, url, "backend responded");
            Ok(HttpResponse { status, body })
        })
    }
}
