//! In-memory vault store.
//!
//! Accounts live in a map guarded by a read-write lock; each account carries
//! its own mutex so the cooldown check and the redemption write happen under
//! one critical section, and operations on different accounts never contend.

use chrono::{DateTime, Utc};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::sync::{Mutex, RwLock};

use super::{Redemption, VaultError, VaultPolicy, VaultStore};

#[derive(Debug)]
struct AccountRecord {
    envelopes: Vec<String>,
    redeemed: HashSet<usize>,
    last_retrieval: Option<DateTime<Utc>>,
}

/// Map-backed store. Cheap to construct, state dies with the process.
#[derive(Debug, Default)]
pub struct MemoryVaultStore {
    policy: VaultPolicy,
    accounts: RwLock<HashMap<String, Arc<Mutex<AccountRecord>>>>,
}

impl MemoryVaultStore {
    #[must_use]
    pub fn new(policy: VaultPolicy) -> Self {
        Self {
            policy,
            accounts: RwLock::new(HashMap::new()),
        }
    }

    async fn account(&self, username: &str) -> Option<Arc<Mutex<AccountRecord>>> {
        self.accounts.read().await.get(username).cloned()
    }

    /// Shift an account's last retrieval into the past, as if `by` had
    /// elapsed. Test-only stand-in for waiting out the cooldown.
    #[cfg(test)]
    async fn backdate_last_retrieval(&self, username: &str, by: std::time::Duration) {
        if let Some(account) = self.account(username).await {
            let mut record = account.lock().await;
            let by = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
            record.last_retrieval = record.last_retrieval.map(|at| at - by);
        }
    }
}

#[async_trait::async_trait]
impl VaultStore for MemoryVaultStore {
    async fn register(&self, username: &str, envelopes: Vec<String>) -> Result<usize, VaultError> {
        self.policy.check_register(username, &envelopes)?;

        // Write lock makes the exists-check and the insert one atomic step.
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(username) {
            return Err(VaultError::AlreadyExists);
        }

        let total = envelopes.len();
        accounts.insert(
            username.to_string(),
            Arc::new(Mutex::new(AccountRecord {
                envelopes,
                redeemed: HashSet::new(),
                last_retrieval: None,
            })),
        );

        Ok(total)
    }

    async fn retrieve_next(&self, username: &str) -> Result<Redemption, VaultError> {
        let account = self.account(username).await.ok_or(VaultError::NotFound)?;

        // Per-account critical section: cooldown check, index selection and
        // the write are serialized against concurrent retrievals.
        let mut record = account.lock().await;

        let now = Utc::now();
        if let Some(last) = record.last_retrieval {
            let cooldown = chrono::Duration::from_std(self.policy.cooldown)
                .unwrap_or_else(|_| chrono::Duration::MAX);
            let elapsed = now.signed_duration_since(last);
            if elapsed < cooldown {
                let retry_after = (cooldown - elapsed).to_std().unwrap_or_default();
                return Err(VaultError::RateLimited { retry_after });
            }
        }

        let total = record.envelopes.len();
        let index = (0..total)
            .find(|index| !record.redeemed.contains(index))
            .ok_or(VaultError::Exhausted)?;

        record.redeemed.insert(index);
        record.last_retrieval = Some(now);

        Ok(Redemption {
            envelope: record.envelopes[index].clone(),
            remaining: total - record.redeemed.len(),
            total,
        })
    }

    async fn reset(&self, username: &str) -> Result<(), VaultError> {
        let mut accounts = self.accounts.write().await;
        accounts
            .remove(username)
            .map(|_| ())
            .ok_or(VaultError::NotFound)
    }

    async fn total_accounts(&self) -> Result<u64, VaultError> {
        Ok(self.accounts.read().await.len() as u64)
    }

    fn policy(&self) -> &VaultPolicy {
        &self.policy
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn envelopes(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("env{i}")).collect()
    }

    fn store() -> MemoryVaultStore {
        MemoryVaultStore::new(VaultPolicy::default())
    }

    #[tokio::test]
    async fn register_and_count() {
        let store = store();
        assert_eq!(store.total_accounts().await.unwrap(), 0);
        assert_eq!(store.register("alice", envelopes(10)).await.unwrap(), 10);
        assert_eq!(store.total_accounts().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn register_rejects_duplicates() {
        let store = store();
        store.register("alice", envelopes(3)).await.unwrap();
        assert!(matches!(
            store.register("alice", envelopes(3)).await,
            Err(VaultError::AlreadyExists)
        ));
    }

    #[tokio::test]
    async fn register_validates_input() {
        let store = store();
        assert!(matches!(
            store.register("al", envelopes(3)).await,
            Err(VaultError::UsernameTooShort)
        ));
        assert!(matches!(
            store.register("alice", envelopes(11)).await,
            Err(VaultError::CodeCountOutOfRange { .. })
        ));
        assert!(matches!(
            store.register("alice", vec![String::new()]).await,
            Err(VaultError::EmptyEnvelope)
        ));
        // Nothing was created along the way.
        assert_eq!(store.total_accounts().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn retrieve_unknown_user() {
        let store = store();
        assert!(matches!(
            store.retrieve_next("nobody").await,
            Err(VaultError::NotFound)
        ));
    }

    #[tokio::test]
    async fn alice_scenario() {
        // Register ten envelopes, redeem one, hit the cooldown, then step
        // past it and redeem the next in order.
        let store = store();
        store.register("alice", envelopes(10)).await.unwrap();

        let first = store.retrieve_next("alice").await.unwrap();
        assert_eq!(first.envelope, "env0");
        assert_eq!(first.remaining, 9);
        assert_eq!(first.total, 10);

        let limited = store.retrieve_next("alice").await.unwrap_err();
        assert_eq!(limited.retry_after_minutes(), Some(5));

        store
            .backdate_last_retrieval("alice", Duration::from_secs(301))
            .await;

        let second = store.retrieve_next("alice").await.unwrap();
        assert_eq!(second.envelope, "env1");
        assert_eq!(second.remaining, 8);
    }

    #[tokio::test]
    async fn exhaustion_with_decreasing_remaining() {
        let store = MemoryVaultStore::new(VaultPolicy {
            cooldown: Duration::ZERO,
            ..VaultPolicy::default()
        });
        store.register("bob", envelopes(4)).await.unwrap();

        for round in 0..4 {
            let redemption = store.retrieve_next("bob").await.unwrap();
            assert_eq!(redemption.envelope, format!("env{round}"));
            assert_eq!(redemption.remaining, 3 - round);
        }

        assert!(matches!(
            store.retrieve_next("bob").await,
            Err(VaultError::Exhausted)
        ));
    }

    #[tokio::test]
    async fn concurrent_retrievals_admit_exactly_one() {
        let store = Arc::new(store());
        store.register("carol", envelopes(10)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(
                async move { store.retrieve_next("carol").await },
            ));
        }

        let mut successes = 0;
        let mut limited = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(redemption) => {
                    assert_eq!(redemption.envelope, "env0");
                    successes += 1;
                }
                Err(VaultError::RateLimited { .. }) => limited += 1,
                Err(other) => panic!("unexpected outcome: {other}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(limited, 9);
    }

    #[tokio::test]
    async fn reset_frees_the_username() {
        let store = store();
        store.register("dave", envelopes(2)).await.unwrap();
        store.retrieve_next("dave").await.unwrap();

        store.reset("dave").await.unwrap();
        assert!(matches!(
            store.retrieve_next("dave").await,
            Err(VaultError::NotFound)
        ));
        assert!(matches!(
            store.reset("dave").await,
            Err(VaultError::NotFound)
        ));

        // Re-registration starts from a clean slate, prior history gone.
        store.register("dave", envelopes(5)).await.unwrap();
        let redemption = store.retrieve_next("dave").await.unwrap();
        assert_eq!(redemption.envelope, "env0");
        assert_eq!(redemption.remaining, 4);
    }
}
