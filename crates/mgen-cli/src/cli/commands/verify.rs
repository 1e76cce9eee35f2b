//! `mgen verify <video>` – source audit of a downloaded artifact.

use anyhow::Result;
use mgen_core::config::MgenConfig;
use mgen_core::verifier::{verify_artifact, CurlLookup, VerifyOptions};
use std::path::Path;

/// Prints the report and returns exit code 0 on PASS, 1 on FAIL.
pub fn run_verify(
    cfg: &MgenConfig,
    video_path: &Path,
    operation_name: Option<String>,
    token: Option<String>,
    project_id: Option<String>,
    json: bool,
) -> Result<i32> {
    let options = VerifyOptions {
        operation_name,
        token: token.or_else(|| cfg.credentials.first().cloned()),
        expected_project_id: project_id.or_else(|| cfg.default_project_id.clone()),
        domain_family: cfg.provider.domain_family.clone(),
    };
    let lookup = CurlLookup::new(cfg.provider.clone(), cfg.request_timeout());
    let report = verify_artifact(video_path, &options, Some(&lookup));

    print!("{}", report.render());
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(if report.passed() { 0 } else { 1 })
}
