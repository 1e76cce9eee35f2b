//! Source verifier: audits a downloaded artifact against the provider.
//!
//! Read-only and runnable at any time. Only a missing or empty file stops the
//! audit early; every other check is reported independently so one report
//! shows everything that is wrong.

mod domain;
mod lookup;
mod report;
mod signature;

pub use domain::host_in_family;
pub use lookup::{CurlLookup, OperationLookup};
pub use report::VerificationReport;
pub use signature::{has_container_signature, SIGNATURE, SIGNATURE_OFFSET};

use std::path::Path;

use crate::checksum;
use crate::generation::extract;
use crate::retry::ClientError;

/// Inputs for the remote part of the audit.
#[derive(Debug, Clone, Default)]
pub struct VerifyOptions {
    pub operation_name: Option<String>,
    pub token: Option<String>,
    pub expected_project_id: Option<String>,
    /// Host suffixes the delivery URL must belong to.
    pub domain_family: Vec<String>,
}

/// Audit `path`. Remote checks run only when both an operation name and a
/// token are supplied and `lookup` is given.
pub fn verify_artifact(
    path: &Path,
    options: &VerifyOptions,
    lookup: Option<&dyn OperationLookup>,
) -> VerificationReport {
    let mut report = VerificationReport::new(path);

    let size = match std::fs::metadata(path) {
        Ok(m) if m.is_file() => m.len(),
        _ => {
            report.errors.push(format!("file not found: {}", path.display()));
            return report;
        }
    };
    report.video_exists = true;
    report.file_size = size;
    if size == 0 {
        report.errors.push("file is empty".to_string());
        return report;
    }

    match checksum::fingerprint(path) {
        Ok(fp) => {
            report.sha256 = Some(fp.sha256);
            report.valid_container_signature = has_container_signature(&fp.head);
            if !report.valid_container_signature {
                report.errors.push(format!(
                    "invalid signature: expected `ftyp` at byte offset {}",
                    SIGNATURE_OFFSET
                ));
            }
        }
        Err(e) => report.errors.push(format!("could not read file: {:#}", e)),
    }

    match (&options.operation_name, &options.token, lookup) {
        (Some(name), Some(token), Some(lookup)) => {
            check_operation(&mut report, name, token, options, lookup)
        }
        (Some(_), None, _) => report
            .warnings
            .push("no token supplied; provider lookup skipped".to_string()),
        (None, _, _) => report
            .warnings
            .push("no operation name supplied; provider lookup skipped".to_string()),
        (Some(_), Some(_), None) => report
            .warnings
            .push("provider lookup unavailable".to_string()),
    }

    report
}

fn check_operation(
    report: &mut VerificationReport,
    name: &str,
    token: &str,
    options: &VerifyOptions,
    lookup: &dyn OperationLookup,
) {
    let operation = match lookup.lookup(name, token) {
        Ok(Some(op)) => {
            report.api_accessible = true;
            report.operation_verified = true;
            op
        }
        Ok(None) => {
            report.api_accessible = true;
            report.errors.push(format!("operation not found: {}", name));
            return;
        }
        Err(ClientError::Http(code)) => {
            report
                .errors
                .push(format!("provider API returned HTTP {}", code));
            return;
        }
        Err(e) => {
            report.errors.push(format!("transport error: {}", e));
            return;
        }
    };

    match extract::artifact_url(&operation) {
        Some(url) => {
            let host = url::Url::parse(&url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_ascii_lowercase));
            if let Some(host) = &host {
                if !host_in_family(host, &options.domain_family) {
                    report.warnings.push(format!(
                        "suspicious delivery domain: {} is not a provider domain",
                        host
                    ));
                }
            }
            report.url_domain = host;
        }
        None => report
            .errors
            .push(format!("operation {} has no artifact URL", name)),
    }

    if let Some(expected) = &options.expected_project_id {
        match extract::project_id(&operation) {
            Some(actual) if &actual == expected => report.project_id_matches = Some(true),
            Some(actual) => {
                report.project_id_matches = Some(false);
                report.errors.push(format!(
                    "project id mismatch: expected {}, got {}",
                    expected, actual
                ));
            }
            // A missing owner counts as a mismatch.
            None => {
                report.project_id_matches = Some(false);
                report.errors.push(format!(
                    "project id mismatch: expected {}, got none",
                    expected
                ));
            }
        }
    }
}
