//! # Stem Pool
//!
//! This module contains [`StemPool`], the holding area for transactions in the stem phase.
//!
//! ### Keep Stem Transactions Hidden
//!
//! The stem pool is a separate namespace from the public pool, nothing in it should be given to peers except
//! to the peer it was stemmed to. A transaction leaves the stem pool when it's fluffed, either because its
//! embargo timer fired or because there was no one to stem it to.
use std::{
    fmt::{self, Debug},
    hash::Hash,
    time::Instant,
};

use dashmap::{mapref::entry::Entry, DashMap};
use tower::{Service, ServiceExt};

use crate::{
    traits::{TxValidity, ValidateRequest},
    EmbargoPolicy,
};

/// The result of [`StemPool::insert`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AcceptResult {
    /// The transaction was added to the stem pool.
    Accepted,
    /// The transaction was already in the stem pool.
    Duplicate,
    /// The validator rejected the transaction.
    Rejected,
}

/// A transaction in the stem pool.
#[derive(Debug, Clone)]
pub struct StemPoolEntry<Tx> {
    /// The transaction.
    pub tx: Tx,
    /// When the transaction entered the stem pool.
    pub inserted_at: Instant,
    /// When the transaction should be fluffed if it is still here.
    pub embargo_deadline: Instant,
}

/// The stem pool.
///
/// `V` is the validator service, it is cloned for every transaction validated.
pub struct StemPool<TxId: Hash + Eq, Tx, V> {
    entries: DashMap<TxId, StemPoolEntry<Tx>>,
    validator: V,
    embargo: Box<dyn EmbargoPolicy>,
}

impl<TxId: Hash + Eq + Debug, Tx, V> Debug for StemPool<TxId, Tx, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StemPool")
            .field("len", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl<TxId, Tx, V> StemPool<TxId, Tx, V>
where
    TxId: Hash + Eq + Clone + Debug,
    Tx: Clone,
    V: Service<ValidateRequest<Tx>, Response = TxValidity, Error = tower::BoxError> + Clone,
{
    /// Creates a new, empty [`StemPool`].
    pub fn new(validator: V, embargo: impl EmbargoPolicy + 'static) -> Self {
        Self {
            entries: DashMap::new(),
            validator,
            embargo: Box::new(embargo),
        }
    }

    /// Returns true if this transaction is in the stem pool.
    pub fn exists(&self, tx_id: &TxId) -> bool {
        self.entries.contains_key(tx_id)
    }

    /// Validates a transaction and adds it to the stem pool.
    ///
    /// If the same transaction is inserted concurrently exactly one call returns [`AcceptResult::Accepted`].
    pub async fn insert(&self, tx_id: TxId, tx: Tx) -> Result<AcceptResult, tower::BoxError> {
        if self.exists(&tx_id) {
            return Ok(AcceptResult::Duplicate);
        }

        let validity = self
            .validator
            .clone()
            .oneshot(ValidateRequest(tx.clone()))
            .await?;

        if validity == TxValidity::Invalid {
            tracing::debug!(?tx_id, "Validator rejected stem transaction.");
            return Ok(AcceptResult::Rejected);
        }

        match self.entries.entry(tx_id) {
            Entry::Occupied(_) => Ok(AcceptResult::Duplicate),
            Entry::Vacant(entry) => {
                let now = Instant::now();
                let embargo_timeout = self.embargo.embargo_timeout();

                tracing::debug!(
                    tx_id = ?entry.key(),
                    "Adding transaction to stem pool, embargo timer: {} seconds.",
                    embargo_timeout.as_secs_f64()
                );

                entry.insert(StemPoolEntry {
                    tx,
                    inserted_at: now,
                    embargo_deadline: now + embargo_timeout,
                });

                Ok(AcceptResult::Accepted)
            }
        }
    }

    /// Returns a copy of a transaction in the stem pool.
    pub fn get(&self, tx_id: &TxId) -> Option<Tx> {
        self.entries.get(tx_id).map(|entry| entry.tx.clone())
    }

    /// Returns a copy of a stem pool entry.
    pub fn entry(&self, tx_id: &TxId) -> Option<StemPoolEntry<Tx>> {
        self.entries.get(tx_id).map(|entry| entry.clone())
    }

    /// Removes a transaction from the stem pool, returning it.
    pub fn remove(&self, tx_id: &TxId) -> Option<Tx> {
        self.entries.remove(tx_id).map(|(_, entry)| entry.tx)
    }

    /// Removes and returns every transaction with an embargo deadline at or before `now`.
    pub fn take_expired(&self, now: Instant) -> Vec<(TxId, Tx)> {
        let mut expired = Vec::new();

        self.entries.retain(|tx_id, entry| {
            if entry.embargo_deadline > now {
                return true;
            }

            expired.push((tx_id.clone(), entry.tx.clone()));
            false
        });

        expired
    }

    /// The number of transactions in the stem pool.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the stem pool is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use tokio::sync::Barrier;

    use super::*;
    use crate::{tests::mock_validator_svc, FixedEmbargo};

    #[tokio::test]
    async fn insert_results() {
        let pool = StemPool::new(mock_validator_svc(), FixedEmbargo(Duration::from_secs(60)));

        assert_eq!(pool.insert(1_u64, 10_u64).await.unwrap(), AcceptResult::Accepted);
        assert_eq!(pool.insert(1, 10).await.unwrap(), AcceptResult::Duplicate);
        // the mock validator rejects odd transactions.
        assert_eq!(pool.insert(2, 11).await.unwrap(), AcceptResult::Rejected);

        assert!(pool.exists(&1));
        assert!(!pool.exists(&2));
        assert_eq!(pool.get(&1), Some(10));
        assert_eq!(pool.len(), 1);

        assert_eq!(pool.remove(&1), Some(10));
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn concurrent_inserts_accept_once() {
        // both inserts are past the duplicate check before either is validated.
        let barrier = Arc::new(Barrier::new(2));
        let validator = tower::service_fn(move |_: ValidateRequest<u64>| {
            let barrier = Arc::clone(&barrier);
            async move {
                barrier.wait().await;
                Ok::<_, tower::BoxError>(TxValidity::Valid)
            }
        });
        let pool = StemPool::new(validator, FixedEmbargo(Duration::from_secs(60)));

        let (first, second) = tokio::join!(pool.insert(1_u64, 10_u64), pool.insert(1, 10));
        let mut results = [first.unwrap(), second.unwrap()];
        results.sort_unstable_by_key(|res| *res == AcceptResult::Duplicate);

        assert_eq!(results, [AcceptResult::Accepted, AcceptResult::Duplicate]);
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn validator_errors_returned() {
        let validator = tower::service_fn(|_: ValidateRequest<u64>| {
            futures::future::ready(Err::<TxValidity, tower::BoxError>("validator down".into()))
        });
        let pool = StemPool::new(validator, FixedEmbargo(Duration::from_secs(60)));

        assert!(pool.insert(1_u64, 10).await.is_err());
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn expired_transactions_taken() {
        let pool = StemPool::new(mock_validator_svc(), FixedEmbargo(Duration::from_secs(60)));

        pool.insert(1_u64, 10_u64).await.unwrap();
        pool.insert(2, 20).await.unwrap();

        let entry = pool.entry(&1).unwrap();
        assert_eq!(entry.embargo_deadline - entry.inserted_at, Duration::from_secs(60));

        assert!(pool.take_expired(Instant::now()).is_empty());

        let mut expired = pool.take_expired(Instant::now() + Duration::from_secs(61));
        expired.sort_unstable();
        assert_eq!(expired, vec![(1, 10), (2, 20)]);
        assert!(pool.is_empty());
    }
}
