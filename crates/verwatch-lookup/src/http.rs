//! HTTP fetching for `url` lookups

use std::error::Error as StdError;
use std::time::Duration;

use reqwest::Method;

use crate::error::{LookupError, Result};

/// Most bytes of a body that are read
pub(crate) const MAX_BODY_BYTES: usize = 10 << 20;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A fully resolved request (env vars expanded, defaults applied)
#[derive(Debug, Clone)]
pub(crate) struct FetchRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub basic_auth: Option<(String, String)>,
    pub body: Option<String>,
    pub allow_invalid_certs: bool,
    /// Take the version from this response header instead of the body
    pub target_header: Option<String>,
}

/// Send the request and return the raw version text
pub(crate) async fn fetch(request: &FetchRequest) -> Result<String> {
    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(request.allow_invalid_certs)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| LookupError::Transport {
            message: error_chain(&e),
        })?;

    let method = Method::from_bytes(request.method.as_bytes()).map_err(|e| LookupError::Request {
        url: request.url.clone(),
        message: e.to_string(),
    })?;

    let mut builder = client
        .request(method, &request.url)
        .header(reqwest::header::CONNECTION, "close");
    for (key, value) in &request.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    if let Some((username, password)) = &request.basic_auth {
        builder = builder.basic_auth(username, Some(password));
    }
    if let Some(body) = &request.body {
        builder = builder.body(body.clone());
    }

    let mut response = builder.send().await.map_err(|e| classify(&e, &request.url))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LookupError::HttpStatus {
            status: status.as_u16(),
        });
    }

    if let Some(name) = &request.target_header {
        return response
            .headers()
            .get(name.as_str())
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                LookupError::extraction(format!("target header {:?} not found", name))
            });
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| classify(&e, &request.url))?
    {
        if push_capped(&mut body, &chunk, MAX_BODY_BYTES) {
            break;
        }
    }

    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// Append `chunk` without growing `body` past `cap`. Returns true once full.
fn push_capped(body: &mut Vec<u8>, chunk: &[u8], cap: usize) -> bool {
    let remaining = cap.saturating_sub(body.len());
    if chunk.len() >= remaining {
        body.extend_from_slice(&chunk[..remaining]);
        return true;
    }
    body.extend_from_slice(chunk);
    false
}

/// Map a reqwest failure, singling out certificate problems
fn classify(error: &reqwest::Error, url: &str) -> LookupError {
    if error.is_builder() {
        return LookupError::Request {
            url: url.to_string(),
            message: error_chain(error),
        };
    }

    let message = error_chain(error);
    if is_certificate_error(&message) {
        LookupError::CertificateInvalid
    } else {
        LookupError::Transport { message }
    }
}

/// An error and all its sources, `: `-joined
fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn is_certificate_error(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("x509") || message.contains("certificate")
}
