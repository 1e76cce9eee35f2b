//! Blocking JSON POST over libcurl, shared by the provider client and the verifier.

use std::time::Duration;

use crate::retry::ClientError;

/// Status code and body of a completed request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub code: u32,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn json(&self) -> Result<serde_json::Value, ClientError> {
        serde_json::from_slice(&self.body).map_err(|e| ClientError::Malformed(e.to_string()))
    }

    /// First `max` characters of the body for error messages.
    pub fn body_snippet(&self, max: usize) -> String {
        String::from_utf8_lossy(&self.body).chars().take(max).collect()
    }
}

/// POST `payload` as JSON with a bearer token. Any HTTP status is returned as
/// `Ok`; only transport failures are errors.
///
/// Runs in the current thread; call from `spawn_blocking` if used from async code.
pub fn post_json(
    url: &str,
    bearer: &str,
    origin: &str,
    payload: &serde_json::Value,
    timeout: Duration,
) -> Result<HttpResponse, ClientError> {
    let body = serde_json::to_vec(payload).map_err(|e| ClientError::Malformed(e.to_string()))?;
    let mut response_body = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.post(true)?;
    easy.post_fields_copy(&body)?;
    easy.follow_location(true)?;
    easy.connect_timeout(timeout.min(Duration::from_secs(15)))?;
    easy.timeout(timeout)?;

    let mut list = curl::easy::List::new();
    list.append(&format!("authorization: Bearer {}", bearer.trim()))?;
    list.append("content-type: application/json; charset=utf-8")?;
    if !origin.is_empty() {
        list.append(&format!("origin: {}", origin))?;
        list.append(&format!("referer: {}/", origin.trim_end_matches('/')))?;
    }
    easy.http_headers(list)?;

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            response_body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    Ok(HttpResponse {
        code,
        body: response_body,
    })
}
