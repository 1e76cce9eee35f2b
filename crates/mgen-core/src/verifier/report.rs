//! Verification report and its human-readable rendering.

use serde::Serialize;
use std::fmt::Write;
use std::path::Path;

/// Outcome of one verifier run. Built fresh each time; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub video_path: String,
    pub video_exists: bool,
    pub file_size: u64,
    pub sha256: Option<String>,
    pub valid_container_signature: bool,
    pub operation_verified: bool,
    pub api_accessible: bool,
    /// `None` when no expected id was given or the operation carries none.
    pub project_id_matches: Option<bool>,
    pub url_domain: Option<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

fn yes_no(v: bool) -> &'static str {
    if v {
        "yes"
    } else {
        "no"
    }
}

impl VerificationReport {
    pub(crate) fn new(path: &Path) -> Self {
        Self {
            video_path: path.display().to_string(),
            video_exists: false,
            file_size: 0,
            sha256: None,
            valid_container_signature: false,
            operation_verified: false,
            api_accessible: false,
            project_id_matches: None,
            url_domain: None,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// No error findings (warnings allowed).
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Source verification: {}", self.video_path);
        let _ = writeln!(out, "  file exists:          {}", yes_no(self.video_exists));
        let _ = writeln!(out, "  file size:            {} bytes", self.file_size);
        let _ = writeln!(
            out,
            "  sha256:               {}",
            self.sha256.as_deref().unwrap_or("-")
        );
        let _ = writeln!(
            out,
            "  container signature:  {}",
            if self.valid_container_signature { "valid (ftyp)" } else { "invalid" }
        );
        let _ = writeln!(out, "  api accessible:       {}", yes_no(self.api_accessible));
        let _ = writeln!(out, "  operation verified:   {}", yes_no(self.operation_verified));
        let _ = writeln!(
            out,
            "  project id matches:   {}",
            match self.project_id_matches {
                Some(v) => yes_no(v),
                None => "unknown",
            }
        );
        let _ = writeln!(
            out,
            "  delivery domain:      {}",
            self.url_domain.as_deref().unwrap_or("-")
        );
        if !self.errors.is_empty() {
            let _ = writeln!(out, "errors:");
            for e in &self.errors {
                let _ = writeln!(out, "  - {}", e);
            }
        }
        if !self.warnings.is_empty() {
            let _ = writeln!(out, "warnings:");
            for w in &self.warnings {
                let _ = writeln!(out, "  - {}", w);
            }
        }
        let _ = writeln!(out, "RESULT: {}", if self.passed() { "PASS" } else { "FAIL" });
        out
    }
}
