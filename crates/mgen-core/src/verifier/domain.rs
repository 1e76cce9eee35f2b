//! Provider domain family check for delivery URLs.

/// True if `host` equals a family suffix or is a subdomain of one.
/// `evilgoogle.com` does not match `google.com`.
pub fn host_in_family(host: &str, family: &[String]) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    family.iter().any(|suffix| {
        let suffix = suffix.trim().trim_start_matches('.').to_ascii_lowercase();
        !suffix.is_empty() && (host == suffix || host.ends_with(&format!(".{}", suffix)))
    })
}
