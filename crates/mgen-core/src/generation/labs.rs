//! curl-backed client for the Labs-style async generation API.
//!
//! Submit posts a batch of one request and returns `operations[0].operation.name`.
//! Poll posts to the async-status endpoint and maps the media generation status.

use base64::Engine;
use serde_json::{json, Value};
use std::time::Duration;

use super::extract;
use super::http::{post_json, HttpResponse};
use super::{GenerationClient, PollResult, SubmitRequest};
use crate::config::{MgenConfig, ProviderConfig};
use crate::credentials::Credential;
use crate::project::JobKind;
use crate::retry::ClientError;

const STATUS_SUCCESSFUL: &str = "MEDIA_GENERATION_STATUS_SUCCESSFUL";
const STATUS_FAILED: &str = "MEDIA_GENERATION_STATUS_FAILED";

#[derive(Debug, Clone)]
pub struct LabsClient {
    provider: ProviderConfig,
    project_id: Option<String>,
    timeout: Duration,
}

impl LabsClient {
    pub fn new(provider: ProviderConfig, project_id: Option<String>, timeout: Duration) -> Self {
        Self {
            provider,
            project_id,
            timeout,
        }
    }

    pub fn from_config(cfg: &MgenConfig) -> Self {
        Self::new(
            cfg.provider.clone(),
            cfg.default_project_id.clone(),
            cfg.request_timeout(),
        )
    }

    fn submit_url(&self, kind: JobKind) -> &str {
        match kind {
            JobKind::Image => &self.provider.image_submit_url,
            JobKind::Video => &self.provider.video_submit_url,
        }
    }

    fn submit_payload(&self, request: &SubmitRequest) -> Result<Value, ClientError> {
        let mut entry = json!({
            "aspectRatio": request.aspect_ratio,
            "textInput": { "prompt": request.prompt },
            "videoModelKey": request.model,
        });
        if let Some(path) = &request.reference_image {
            let bytes = std::fs::read(path).map_err(|e| {
                ClientError::Rejected(format!("reference image {}: {}", path.display(), e))
            })?;
            entry["referenceImage"] = json!({
                "bytesBase64Encoded": base64::engine::general_purpose::STANDARD.encode(bytes),
            });
        }
        let mut payload = json!({ "requests": [entry] });
        if let Some(pid) = &self.project_id {
            payload["clientContext"] = json!({ "projectId": pid });
        }
        Ok(payload)
    }

    fn post(&self, url: &str, credential: &Credential, payload: &Value) -> Result<Value, ClientError> {
        let response = post_json(url, &credential.secret, &self.provider.origin, payload, self.timeout)?;
        check_status(&response)?;
        response.json()
    }
}

fn check_status(response: &HttpResponse) -> Result<(), ClientError> {
    if response.is_success() {
        return Ok(());
    }
    tracing::debug!(
        code = response.code,
        body = %response.body_snippet(200),
        "provider returned error status"
    );
    Err(ClientError::Http(response.code))
}

/// First operation entry of a batch response.
fn first_operation(body: &Value) -> Option<&Value> {
    body.get("operations")?.as_array()?.first()
}

/// Map one status entry to a poll result.
fn parse_poll_entry(op: &Value) -> PollResult {
    let status = op.get("status").and_then(Value::as_str).unwrap_or_default();
    match status {
        STATUS_SUCCESSFUL => match extract::artifact_url(op) {
            Some(url) => PollResult::ready(url),
            None => PollResult::failed("operation succeeded but no artifact URL was returned"),
        },
        STATUS_FAILED => {
            let reason = extract::lookup(op, &["operation", "error", "message"])
                .and_then(Value::as_str)
                .unwrap_or("generation failed")
                .to_string();
            PollResult::failed(reason)
        }
        _ => PollResult::pending(),
    }
}

impl GenerationClient for LabsClient {
    fn submit(&self, request: &SubmitRequest, credential: &Credential) -> Result<String, ClientError> {
        let payload = self.submit_payload(request)?;
        let body = self.post(self.submit_url(request.kind), credential, &payload)?;
        let op = first_operation(&body)
            .ok_or_else(|| ClientError::Malformed("submit response has no operations".into()))?;
        if op.get("status").and_then(Value::as_str) == Some(STATUS_FAILED) {
            return Err(ClientError::Rejected(parse_poll_entry(op).error.unwrap_or_default()));
        }
        extract::lookup(op, &["operation", "name"])
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Malformed("submit response has no operation name".into()))
    }

    fn poll(&self, operation_id: &str, credential: &Credential) -> Result<PollResult, ClientError> {
        let payload = status_payload(operation_id);
        let body = self.post(&self.provider.status_url, credential, &payload)?;
        let op = first_operation(&body)
            .ok_or_else(|| ClientError::Malformed("status response has no operations".into()))?;
        Ok(parse_poll_entry(op))
    }
}

/// Async-status request body for one operation; also used by the verifier.
pub(crate) fn status_payload(operation_id: &str) -> Value {
    json!({ "operations": [ { "operation": { "name": operation_id } } ] })
}
