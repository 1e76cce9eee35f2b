//! Operation lookup against the provider's async-status endpoint.

use serde_json::Value;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::generation::{post_json, status_payload};
use crate::retry::ClientError;

/// Finds one remote operation by name. `Ok(None)` means the provider answered
/// but listed no such operation; any non-2xx status is an error.
pub trait OperationLookup {
    fn lookup(&self, operation_name: &str, token: &str) -> Result<Option<Value>, ClientError>;
}

/// curl-backed lookup (single attempt, no retry: the verifier reports what it sees).
#[derive(Debug, Clone)]
pub struct CurlLookup {
    provider: ProviderConfig,
    timeout: Duration,
}

impl CurlLookup {
    pub fn new(provider: ProviderConfig, timeout: Duration) -> Self {
        Self { provider, timeout }
    }
}

impl OperationLookup for CurlLookup {
    fn lookup(&self, operation_name: &str, token: &str) -> Result<Option<Value>, ClientError> {
        let response = post_json(
            &self.provider.status_url,
            token,
            &self.provider.origin,
            &status_payload(operation_name),
            self.timeout,
        )?;
        if !response.is_success() {
            return Err(ClientError::Http(response.code));
        }
        let body = response.json()?;
        Ok(body
            .get("operations")
            .and_then(Value::as_array)
            .and_then(|ops| ops.first())
            .cloned())
    }
}
