//! Common HTTP plumbing shared by the source, destination and image-host
//! clients: client construction, status classification, JSON helpers and
//! bounded downloads.

use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, LOCATION, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{Error, Result};

/// Default HTTP timeout for API calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Response bodies are truncated to this many bytes in error messages.
const MAX_ERROR_BODY: usize = 512;

/// Creates a configured API client with timeout.
///
/// Redirects are followed by reqwest for JSON APIs.
#[must_use]
pub fn create_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("cms-migrate/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Creates the image-host client. Redirects are disabled so [`download`]
/// can follow them itself under a hop guard.
#[must_use]
pub fn create_download_client() -> Client {
    Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(10))
        .user_agent(concat!("cms-migrate/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Reads `Retry-After` as whole seconds.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Maps a non-success HTTP response to the error taxonomy.
pub fn handle_http_error(status: u16, body: &str, url: &str, retry_after: Option<u64>) -> Error {
    let mut body = body.trim().to_string();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }

    match status {
        429 => Error::RateLimit { retry_after },
        401 | 403 => Error::Authentication(format!("HTTP {status} from {url}: {body}")),
        409 => Error::Conflict(format!("{url}: {body}")),
        _ => Error::HttpStatus {
            status,
            url: url.to_string(),
            body,
        },
    }
}

/// Passes successful responses through, converting everything else into a
/// typed error.
pub async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let retry_after = parse_retry_after(response.headers());
    let body = response.text().await.unwrap_or_default();
    Err(handle_http_error(status.as_u16(), &body, &url, retry_after))
}

/// Thin JSON API client: base URL, optional bearer token, one attempt per
/// call. Callers wrap calls in [`crate::retry::with_retry`].
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Creates a client for `base_url`.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Self {
        Self {
            client: create_http_client(timeout),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    /// Joins `path` onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.header(AUTHORIZATION, format!("Bearer {token}")),
            None => req,
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let response = check_response(self.authorize(req).send().await?).await?;
        let bytes = response.bytes().await?;
        // 204 and empty 200 bodies decode as `null`.
        let payload: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice(payload)
            .map_err(|e| Error::Extraction(format!("malformed response payload: {e}")))
    }

    /// `GET {base}/{path}?{query}` decoded as JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(path);
        debug!("GET {} {:?}", url, query);
        self.send_json(self.client.get(&url).query(query)).await
    }

    /// `POST {base}/{path}` with a JSON body.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.url(path);
        debug!("POST {}", url);
        self.send_json(self.client.post(&url).json(body)).await
    }

    /// `PUT {base}/{path}` with a JSON body.
    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.url(path);
        debug!("PUT {}", url);
        self.send_json(self.client.put(&url).json(body)).await
    }
}

/// Bounds applied to one image download.
#[derive(Debug, Clone, Copy)]
pub struct DownloadLimits {
    /// Hard deadline for the whole request, body included.
    pub timeout: Duration,
    /// Byte ceiling.
    pub max_bytes: u64,
    /// Redirect hop guard.
    pub max_redirects: usize,
}

/// Bytes fetched from the image host.
#[derive(Debug, Clone)]
pub struct Downloaded {
    /// Body.
    pub bytes: Vec<u8>,
    /// `Content-Type` without parameters, lowercased.
    pub content_type: Option<String>,
    /// URL after redirects.
    pub final_url: String,
}

fn is_image_content_type(content_type: &str) -> bool {
    content_type.starts_with("image/")
        || content_type == "application/octet-stream"
        || content_type == "binary/octet-stream"
}

/// GETs `url`, following redirects iteratively up to `limits.max_redirects`
/// hops and refusing bodies above `limits.max_bytes`.
pub async fn download(client: &Client, url: &str, limits: &DownloadLimits) -> Result<Downloaded> {
    let mut current = reqwest::Url::parse(url)
        .map_err(|e| Error::Network(format!("invalid URL '{url}': {e}")))?;

    for hop in 0..=limits.max_redirects {
        let response = client
            .get(current.clone())
            .timeout(limits.timeout)
            .send()
            .await?;

        if response.status().is_redirection() && response.status() != StatusCode::NOT_MODIFIED {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| Error::Network(format!("redirect from {current} without Location")))?;
            let next = current
                .join(location)
                .map_err(|e| Error::Network(format!("bad redirect target '{location}': {e}")))?;
            debug!("redirect hop {} {} -> {}", hop + 1, current, next);
            current = next;
            continue;
        }

        let mut response = check_response(response).await?;

        let declared_len = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        if declared_len.is_some_and(|len| len > limits.max_bytes) {
            return Err(Error::TooLarge {
                limit: limits.max_bytes,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| {
                v.split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_ascii_lowercase()
            })
            .filter(|v| !v.is_empty());
        if let Some(ct) = content_type.as_deref() {
            if !is_image_content_type(ct) {
                return Err(Error::InvalidContentType(ct.to_string()));
            }
        }

        let mut bytes = Vec::with_capacity(declared_len.unwrap_or(0) as usize);
        while let Some(chunk) = response.chunk().await? {
            if (bytes.len() + chunk.len()) as u64 > limits.max_bytes {
                return Err(Error::TooLarge {
                    limit: limits.max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        return Ok(Downloaded {
            bytes,
            content_type,
            final_url: current.to_string(),
        });
    }

    Err(Error::TooManyRedirects(limits.max_redirects))
}

#[cfg(test)]
#[path = "common_tests.rs"]
mod tests;
