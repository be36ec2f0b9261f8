//! Vault store: per-account custody of encrypted backup-code envelopes.
//!
//! The store never interprets envelope contents. It owns three atomic
//! operations (`register`, `retrieve_next`, `reset`) plus an account count
//! for the status endpoint, and enforces the retrieval cooldown. Backings:
//!
//! - [`memory::MemoryVaultStore`]: map of per-account locks, no persistence.
//! - [`postgres::PgVaultStore`]: sqlx/PostgreSQL with a uniqueness
//!   constraint on `username` and row-level locking for redemption.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::{sync::Arc, time::Duration};

/// Minimum accepted username length.
pub const MIN_USERNAME_LEN: usize = 3;
/// Default cooldown between successful retrievals per account.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5 * 60);
/// Default lower bound on envelopes per registration.
pub const DEFAULT_MIN_CODES: usize = 1;
/// Default upper bound on envelopes per registration.
pub const DEFAULT_MAX_CODES: usize = 10;

/// Tunable store policy: retrieval cooldown and registration size bounds.
///
/// Deployments that require exactly ten codes set `min_codes == max_codes`.
#[derive(Clone, Copy, Debug)]
pub struct VaultPolicy {
    pub cooldown: Duration,
    pub min_codes: usize,
    pub max_codes: usize,
}

impl Default for VaultPolicy {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            min_codes: DEFAULT_MIN_CODES,
            max_codes: DEFAULT_MAX_CODES,
        }
    }
}

impl VaultPolicy {
    /// Validate registration input against the policy.
    ///
    /// # Errors
    /// Returns the `InvalidInput`-class variant describing the first failed
    /// precondition.
    pub fn check_register(&self, username: &str, envelopes: &[String]) -> Result<(), VaultError> {
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(VaultError::UsernameTooShort);
        }
        if envelopes.len() < self.min_codes || envelopes.len() > self.max_codes {
            return Err(VaultError::CodeCountOutOfRange {
                min: self.min_codes,
                max: self.max_codes,
            });
        }
        if envelopes.iter().any(String::is_empty) {
            return Err(VaultError::EmptyEnvelope);
        }
        Ok(())
    }
}

/// One successful redemption: the envelope and the counts after mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redemption {
    pub envelope: String,
    pub remaining: usize,
    pub total: usize,
}

/// Store outcomes. Display strings are the client-visible messages.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("Username must be at least 3 characters")]
    UsernameTooShort,
    #[error("Must provide between {min} and {max} encrypted codes")]
    CodeCountOutOfRange { min: usize, max: usize },
    #[error("Invalid encrypted code format")]
    EmptyEnvelope,
    #[error("Username already exists")]
    AlreadyExists,
    #[error("User not found")]
    NotFound,
    #[error("Please wait {} minute(s) before requesting another code", minutes_ceil(*.retry_after))]
    RateLimited { retry_after: Duration },
    #[error("No backup codes remaining")]
    Exhausted,
    #[error("vault store unavailable")]
    Backend(#[source] anyhow::Error),
}

impl VaultError {
    /// Remaining wait rounded up to whole minutes, for `RateLimited`.
    #[must_use]
    pub fn retry_after_minutes(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after } => Some(minutes_ceil(*retry_after)),
            _ => None,
        }
    }
}

fn minutes_ceil(wait: Duration) -> u64 {
    u64::try_from(wait.as_millis())
        .unwrap_or(u64::MAX)
        .div_ceil(60_000)
}

/// Backing-agnostic store interface.
///
/// Every method is atomic with respect to concurrent calls for the same
/// account; see the backing implementations for how that is achieved.
#[async_trait]
pub trait VaultStore: Send + Sync {
    /// Create an account holding the given envelopes, in registration order.
    /// Returns the number of stored envelopes.
    async fn register(&self, username: &str, envelopes: Vec<String>) -> Result<usize, VaultError>;

    /// Redeem the lowest-index unredeemed envelope, subject to the cooldown.
    async fn retrieve_next(&self, username: &str) -> Result<Redemption, VaultError>;

    /// Delete the account entirely, freeing the username.
    async fn reset(&self, username: &str) -> Result<(), VaultError>;

    /// Number of registered accounts.
    async fn total_accounts(&self) -> Result<u64, VaultError>;

    fn policy(&self) -> &VaultPolicy;
}

pub type SharedVaultStore = Arc<dyn VaultStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_defaults() {
        let policy = VaultPolicy::default();
        assert_eq!(policy.cooldown, Duration::from_secs(300));
        assert_eq!(policy.min_codes, 1);
        assert_eq!(policy.max_codes, 10);
    }

    #[test]
    fn check_register_enforces_bounds() {
        let policy = VaultPolicy::default();
        let envelopes = |n: usize| vec!["env".to_string(); n];

        assert!(matches!(
            policy.check_register("al", &envelopes(1)),
            Err(VaultError::UsernameTooShort)
        ));
        assert!(matches!(
            policy.check_register("alice", &envelopes(0)),
            Err(VaultError::CodeCountOutOfRange { min: 1, max: 10 })
        ));
        assert!(matches!(
            policy.check_register("alice", &envelopes(11)),
            Err(VaultError::CodeCountOutOfRange { min: 1, max: 10 })
        ));
        assert!(policy.check_register("alice", &envelopes(10)).is_ok());

        let mut with_empty = envelopes(3);
        with_empty[1] = String::new();
        assert!(matches!(
            policy.check_register("alice", &with_empty),
            Err(VaultError::EmptyEnvelope)
        ));
    }

    #[test]
    fn exact_count_policy() {
        let policy = VaultPolicy {
            min_codes: 10,
            max_codes: 10,
            ..VaultPolicy::default()
        };
        assert!(policy
            .check_register("alice", &vec!["env".to_string(); 10])
            .is_ok());
        assert!(matches!(
            policy.check_register("alice", &vec!["env".to_string(); 9]),
            Err(VaultError::CodeCountOutOfRange { min: 10, max: 10 })
        ));
    }

    #[test]
    fn rate_limited_wait_rounds_up_to_minutes() {
        let cases = [
            (Duration::from_secs(241), 5), // 4m01s rounds up
            (Duration::from_secs(300), 5),
            (Duration::from_secs(60), 1),
            (Duration::from_millis(100), 1),
            (Duration::from_secs(0), 0),
        ];
        for (wait, minutes) in cases {
            let err = VaultError::RateLimited { retry_after: wait };
            assert_eq!(err.retry_after_minutes(), Some(minutes), "wait={wait:?}");
        }
    }

    #[test]
    fn rate_limited_message_text() {
        let err = VaultError::RateLimited {
            retry_after: Duration::from_secs(241),
        };
        assert_eq!(
            err.to_string(),
            "Please wait 5 minute(s) before requesting another code"
        );
    }

    #[test]
    fn backend_error_hides_detail() {
        let err = VaultError::Backend(anyhow::anyhow!("connection refused on 10.0.0.7"));
        assert_eq!(err.to_string(), "vault store unavailable");
    }
}
