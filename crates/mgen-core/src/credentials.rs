//! Credential rotation under a global request spacing.
//!
//! The provider rate-limits by calling pattern, not per credential, so the pool
//! keeps a single "last request start" for all credentials. Credentials are
//! handed out least-recently-used first to spread load across accounts.

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// A secret enabling calls to the generation provider.
#[derive(Clone)]
pub struct Credential {
    pub id: String,
    pub secret: String,
    pub last_used_at: Option<Instant>,
}

impl Credential {
    /// Secret with everything but the last four characters hidden, for logs.
    pub fn masked(&self) -> String {
        let tail: String = self
            .secret
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("***{}", tail)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("secret", &self.masked())
            .field("last_used_at", &self.last_used_at)
            .finish()
    }
}

/// How the spacing applies to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpacingPolicy {
    /// The first request of a run starts immediately; later ones wait out the spacing.
    #[default]
    ExemptFirst,
    /// Always wait the full spacing before starting, even when first (thumbnail behaviour).
    AlwaysWait,
}

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("no credentials configured; add at least one to `credentials` in config.toml")]
    NoCredentials,
}

/// Result of `CredentialPool::acquire`: which credential to use and how long to wait first.
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub credential: Credential,
    /// How long the caller must sleep before starting the request.
    pub wait: Duration,
    /// Reserved start instant (`now + wait`).
    pub start_at: Instant,
}

/// Pool of credentials sharing one global spacing between request starts.
#[derive(Debug)]
pub struct CredentialPool {
    credentials: Vec<Credential>,
    min_spacing: Duration,
    last_start: Option<Instant>,
}

impl CredentialPool {
    /// Build a pool from secrets in config order. Ids are `cred-1`, `cred-2`, ...
    pub fn new(secrets: &[String], min_spacing: Duration) -> Result<Self, PoolError> {
        let credentials: Vec<Credential> = secrets
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(i, s)| Credential {
                id: format!("cred-{}", i + 1),
                secret: s.to_string(),
                last_used_at: None,
            })
            .collect();
        if credentials.is_empty() {
            return Err(PoolError::NoCredentials);
        }
        Ok(Self {
            credentials,
            min_spacing,
            last_start: None,
        })
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    /// Acquire a credential as of now. See `acquire_at`.
    pub fn acquire(&self, policy: SpacingPolicy) -> Acquisition {
        self.acquire_at(Instant::now(), policy)
    }

    /// Pick the least-recently-used credential and work out how long the caller
    /// must wait before its request may start. Never fails; at worst `wait` is long.
    ///
    /// Nothing is stamped here: the caller reports the real start with
    /// `mark_started` once the request has gone out, and the next acquisition
    /// is spaced from that instant.
    pub fn acquire_at(&self, now: Instant, policy: SpacingPolicy) -> Acquisition {
        let earliest = match (self.last_start, policy) {
            (None, SpacingPolicy::ExemptFirst) => now,
            (None, SpacingPolicy::AlwaysWait) => now + self.min_spacing,
            (Some(last), SpacingPolicy::ExemptFirst) => (last + self.min_spacing).max(now),
            (Some(last), SpacingPolicy::AlwaysWait) => {
                (last + self.min_spacing).max(now + self.min_spacing)
            }
        };
        let wait = earliest.saturating_duration_since(now);

        let credential = self
            .credentials
            .iter()
            .enumerate()
            .min_by_key(|(i, c)| (c.last_used_at, *i))
            .map(|(_, c)| c)
            .unwrap_or(&self.credentials[0]);

        tracing::debug!(
            credential = %credential.id,
            wait_ms = wait.as_millis() as u64,
            "credential acquired"
        );

        Acquisition {
            credential: credential.clone(),
            wait,
            start_at: earliest,
        }
    }

    /// Record that a request using `credential_id` started at `at`.
    pub fn mark_started(&mut self, credential_id: &str, at: Instant) {
        if let Some(c) = self.credentials.iter_mut().find(|c| c.id == credential_id) {
            c.last_used_at = Some(at);
        }
        self.last_start = Some(self.last_start.map_or(at, |last| last.max(at)));
    }

    /// Start of the most recent request, if any.
    pub fn last_start(&self) -> Option<Instant> {
        self.last_start
    }
}
