//! Single-pass fingerprint of a local artifact: SHA-256, byte count and the
//! leading bytes needed for the container signature check.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Bytes kept from the start of the file.
pub const HEAD_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Lowercase hex.
    pub sha256: String,
    pub size: u64,
    /// Up to `HEAD_LEN` leading bytes.
    pub head: Vec<u8>,
}

/// Hash `path` in bounded-size chunks while capturing its head.
pub fn fingerprint(path: &Path) -> Result<Fingerprint> {
    let mut file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut head = Vec::with_capacity(HEAD_LEN);
    let mut size = 0u64;
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        if head.len() < HEAD_LEN {
            let take = (HEAD_LEN - head.len()).min(n);
            head.extend_from_slice(&buf[..take]);
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok(Fingerprint {
        sha256: hex::encode(hasher.finalize()),
        size,
        head,
    })
}
