//! Declarative extraction of values from unstable provider responses.
//!
//! The provider's response shape changes across versions, so the artifact URL
//! and the owning project id are looked up by trying an ordered list of
//! key-paths. New shapes are supported by adding a path here.

use serde_json::Value;

/// Key-paths (relative to one operation entry) where the delivery URL has been seen.
pub const ARTIFACT_URL_PATHS: &[&[&str]] = &[
    &["operation", "metadata", "video", "fifeUrl"],
    &["operation", "metadata", "image", "fifeUrl"],
    &["response", "operation", "metadata", "video", "fifeUrl"],
    &["response", "video", "url"],
    &["response", "downloadUrl"],
    &["video", "url"],
];

/// Key-paths (relative to one operation entry) of the provider project id.
pub const PROJECT_ID_PATHS: &[&[&str]] = &[
    &["operation", "metadata", "projectId"],
    &["metadata", "projectId"],
    &["projectId"],
];

/// Follow `path` through nested objects.
pub fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.as_object()?.get(*key))
}

/// First string at any of `paths` that satisfies `accept`.
pub fn first_string<'a>(
    value: &'a Value,
    paths: &[&[&str]],
    accept: impl Fn(&str) -> bool,
) -> Option<&'a str> {
    paths
        .iter()
        .filter_map(|p| lookup(value, p)?.as_str())
        .find(|s| accept(s))
}

/// True for syntactically valid absolute http(s) URLs with a host.
pub fn is_absolute_http_url(s: &str) -> bool {
    match url::Url::parse(s) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}

/// Delivery URL of an operation entry, if any known path holds a valid absolute URL.
pub fn artifact_url(operation: &Value) -> Option<String> {
    first_string(operation, ARTIFACT_URL_PATHS, is_absolute_http_url).map(str::to_string)
}

/// Provider project id embedded in an operation entry.
pub fn project_id(operation: &Value) -> Option<String> {
    first_string(operation, PROJECT_ID_PATHS, |s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn url_from_operation_metadata() {
        let op = json!({
            "operation": {"name": "op-1", "metadata": {"video": {"fifeUrl": "https://video.googleusercontent.com/abc"}}}
        });
        assert_eq!(
            artifact_url(&op).as_deref(),
            Some("https://video.googleusercontent.com/abc")
        );
    }

    #[test]
    fn skips_invalid_values_and_falls_through() {
        let op = json!({
            "operation": {"metadata": {"video": {"fifeUrl": "not a url"}}},
            "response": {"video": {"url": 42}, "downloadUrl": "https://storage.googleapis.com/x.mp4"}
        });
        assert_eq!(
            artifact_url(&op).as_deref(),
            Some("https://storage.googleapis.com/x.mp4")
        );
    }

    #[test]
    fn earlier_paths_win() {
        let op = json!({
            "operation": {"metadata": {"video": {"fifeUrl": "https://a.google.com/1"}}},
            "response": {"downloadUrl": "https://b.google.com/2"}
        });
        assert_eq!(artifact_url(&op).as_deref(), Some("https://a.google.com/1"));
    }

    #[test]
    fn relative_or_non_http_urls_rejected() {
        assert!(!is_absolute_http_url("/videos/1.mp4"));
        assert!(!is_absolute_http_url("ftp://example.com/1.mp4"));
        assert!(is_absolute_http_url("http://127.0.0.1:8080/v.mp4"));
        assert!(artifact_url(&json!({"response": {"downloadUrl": "/relative"}})).is_none());
    }

    #[test]
    fn project_id_lookup() {
        let op = json!({"operation": {"metadata": {"projectId": "p-42"}}});
        assert_eq!(project_id(&op).as_deref(), Some("p-42"));
        assert_eq!(project_id(&json!({"projectId": ""})), None);
        assert_eq!(project_id(&json!({"operation": "flat"})), None);
    }
}
