//! Credential validation state with a minimum interval between attempts.

use std::time::{Duration, Instant};

use serde::Serialize;

use super::{FetchError, FetchErrorKind};

/// Floor between two validation attempts.
pub const VALIDATION_COOLDOWN: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum CredentialStatus {
    /// No credential configured. Requests go out anonymously.
    Absent,
    /// Configured but never checked.
    Unchecked,
    Valid { login: String },
    /// Rejected by the catalog and dropped from further requests.
    Invalid,
    /// Throttled while checking; assumed still valid.
    RateLimited {
        #[serde(skip_serializing_if = "Option::is_none")]
        login: Option<String>,
    },
}

impl CredentialStatus {
    pub fn is_usable(&self) -> bool {
        matches!(
            self,
            CredentialStatus::Unchecked
                | CredentialStatus::Valid { .. }
                | CredentialStatus::RateLimited { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub status: CredentialStatus,
    /// True when the attempt was skipped because the previous one was too recent.
    pub cooling_down: bool,
}

/// Tracks the last validation attempt and its result.
#[derive(Debug)]
pub struct CredentialGate {
    min_interval: Duration,
    last_attempt: Option<Instant>,
    status: CredentialStatus,
}

impl CredentialGate {
    pub fn new(has_credential: bool, min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_attempt: None,
            status: if has_credential {
                CredentialStatus::Unchecked
            } else {
                CredentialStatus::Absent
            },
        }
    }

    pub fn status(&self) -> &CredentialStatus {
        &self.status
    }

    /// Claim the right to validate now. Returns `false` inside the cool-down window.
    pub fn try_begin(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_attempt {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_attempt = Some(now);
        true
    }

    /// Fold a viewer query result into the status.
    pub fn record(&mut self, result: Result<Option<String>, FetchError>) -> &CredentialStatus {
        self.status = match result {
            Ok(Some(login)) => CredentialStatus::Valid { login },
            Ok(None) => CredentialStatus::Absent,
            Err(err) => match err.kind {
                FetchErrorKind::RateLimited => CredentialStatus::RateLimited {
                    login: match &self.status {
                        CredentialStatus::Valid { login } => Some(login.clone()),
                        CredentialStatus::RateLimited { login } => login.clone(),
                        _ => None,
                    },
                },
                FetchErrorKind::Unauthorized => CredentialStatus::Invalid,
                // Transient; keep whatever we knew.
                FetchErrorKind::NotFound | FetchErrorKind::Transport => {
                    tracing::warn!("Credential check failed: {}", err);
                    self.status.clone()
                }
            },
        };
        &self.status
    }
}
