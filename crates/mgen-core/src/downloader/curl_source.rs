//! Plain GET over libcurl, streaming the body into the downloader's sink.

use std::cell::Cell;
use std::time::Duration;

use super::{ArtifactSource, ChunkSink, DownloadError};

/// HTTP(S) artifact source. Artifact URLs are pre-signed, so no auth header is sent.
#[derive(Debug, Clone)]
pub struct CurlSource {
    timeout: Duration,
}

impl CurlSource {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for CurlSource {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

/// Status code from an `HTTP/x.y NNN reason` line, if `line` is one.
fn parse_status_line(line: &[u8]) -> Option<u32> {
    let line = std::str::from_utf8(line).ok()?;
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

fn curl_err(e: curl::Error) -> DownloadError {
    DownloadError::Transfer(e.to_string())
}

impl ArtifactSource for CurlSource {
    fn fetch(&self, url: &str, sink: &mut ChunkSink<'_>) -> Result<u64, DownloadError> {
        let mut easy = curl::easy::Easy::new();
        easy.url(url).map_err(curl_err)?;
        easy.follow_location(true).map_err(curl_err)?;
        easy.max_redirections(10).map_err(curl_err)?;
        easy.connect_timeout(self.timeout.min(Duration::from_secs(30)))
            .map_err(curl_err)?;
        easy.low_speed_limit(1024).map_err(curl_err)?;
        easy.low_speed_time(Duration::from_secs(60)).map_err(curl_err)?;
        easy.timeout(self.timeout).map_err(curl_err)?;

        // Status of the current response; redirects reset it per hop.
        let status = Cell::new(0u32);
        let mut delivered = 0u64;
        let mut sink_error: Option<DownloadError> = None;

        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .header_function(|line| {
                    if let Some(code) = parse_status_line(line) {
                        status.set(code);
                    }
                    true
                })
                .map_err(curl_err)?;
            transfer
                .write_function(|data| {
                    // Error bodies never reach the file.
                    if !(200..300).contains(&status.get()) {
                        return Ok(data.len());
                    }
                    match sink(data) {
                        Ok(()) => {
                            delivered += data.len() as u64;
                            Ok(data.len())
                        }
                        Err(e) => {
                            sink_error = Some(e);
                            Ok(0) // abort transfer
                        }
                    }
                })
                .map_err(curl_err)?;
            transfer.perform()
        };

        if let Some(e) = sink_error {
            return Err(e);
        }
        performed.map_err(curl_err)?;

        let code = easy.response_code().map_err(curl_err)?;
        if !(200..300).contains(&code) {
            tracing::debug!(url, code, "artifact GET returned error status");
            return Err(DownloadError::Http(code));
        }
        Ok(delivered)
    }
}
