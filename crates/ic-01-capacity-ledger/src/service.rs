//! Capacity Ledger Service
//!
//! Two layers guard `current_funding`: a per-opportunity mutex serializes
//! writers inside this process, and the directory's compare-and-set rejects
//! any write computed from a stale read by another writer.

use crate::domain::{CapacitySnapshot, LedgerConfig, LedgerError, LedgerResult};
use crate::ports::CapacityApi;
use parking_lot::Mutex;
use shared_types::{
    Amount, InvestmentOpportunity, OpportunityDirectory, OpportunityId, OpportunityStatus,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Capacity ledger over an opportunity directory.
pub struct CapacityLedger<D>
where
    D: OpportunityDirectory,
{
    config: LedgerConfig,
    directory: Arc<D>,
    /// One lock per opportunity; never a global lock.
    locks: Mutex<HashMap<OpportunityId, Arc<Mutex<()>>>>,
}

impl<D> CapacityLedger<D>
where
    D: OpportunityDirectory,
{
    /// Create a new ledger.
    pub fn new(config: LedgerConfig, directory: Arc<D>) -> Self {
        Self {
            config,
            directory,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The directory this ledger writes to.
    pub fn directory(&self) -> &Arc<D> {
        &self.directory
    }

    /// Reserve `amount` and run `commit` inside the same critical section.
    ///
    /// If `commit` fails the reservation is released before returning, so
    /// callers never observe funding without the matching status change.
    pub fn reserve_with<T, E, F>(
        &self,
        opportunity_id: &OpportunityId,
        amount: Amount,
        commit: F,
    ) -> Result<(CapacitySnapshot, T), E>
    where
        F: FnOnce(&CapacitySnapshot) -> Result<T, E>,
        E: From<LedgerError>,
    {
        let lock = self.lock_for(opportunity_id);
        let _guard = lock.lock();

        let snapshot = self.reserve_locked(opportunity_id, amount)?;
        match commit(&snapshot) {
            Ok(value) => {
                info!(
                    "[ic-01] Reserved {} on {} ({} / {})",
                    amount, opportunity_id, snapshot.current_funding, snapshot.cap
                );
                self.close_if_full(&snapshot);
                Ok((snapshot, value))
            }
            Err(e) => {
                if let Err(undo) = self.restore_locked(opportunity_id, amount, Direction::Down) {
                    error!(
                        "[ic-01] Could not undo reservation of {} on {}: {}",
                        amount, opportunity_id, undo
                    );
                }
                Err(e)
            }
        }
    }

    /// Release `amount` and run `commit` inside the same critical section.
    ///
    /// If `commit` fails the released amount is added back.
    pub fn release_with<T, E, F>(
        &self,
        opportunity_id: &OpportunityId,
        amount: Amount,
        commit: F,
    ) -> Result<(CapacitySnapshot, T), E>
    where
        F: FnOnce(&CapacitySnapshot) -> Result<T, E>,
        E: From<LedgerError>,
    {
        let lock = self.lock_for(opportunity_id);
        let _guard = lock.lock();

        let snapshot = self.release_locked(opportunity_id, amount)?;
        match commit(&snapshot) {
            Ok(value) => {
                info!(
                    "[ic-01] Released {} on {} ({} / {})",
                    amount, opportunity_id, snapshot.current_funding, snapshot.cap
                );
                Ok((snapshot, value))
            }
            Err(e) => {
                if let Err(undo) = self.restore_locked(opportunity_id, amount, Direction::Up) {
                    error!(
                        "[ic-01] Could not undo release of {} on {}: {}",
                        amount, opportunity_id, undo
                    );
                }
                Err(e)
            }
        }
    }

    fn lock_for(&self, opportunity_id: &OpportunityId) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(*opportunity_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn load(&self, opportunity_id: &OpportunityId) -> LedgerResult<InvestmentOpportunity> {
        self.directory
            .get(opportunity_id)?
            .ok_or(LedgerError::OpportunityNotFound(*opportunity_id))
    }

    /// Applies `next_funding` through compare-and-set, re-reading on conflict.
    fn apply<F>(&self, opportunity_id: &OpportunityId, next_funding: F) -> LedgerResult<CapacitySnapshot>
    where
        F: Fn(&CapacitySnapshot) -> LedgerResult<Amount>,
    {
        let attempts = self.config.max_cas_retries.max(1);
        for attempt in 1..=attempts {
            let current = CapacitySnapshot::of(&self.load(opportunity_id)?);
            let new_funding = next_funding(&current)?;
            if self.directory.compare_and_set_funding(
                opportunity_id,
                current.current_funding,
                new_funding,
            )? {
                return Ok(current.with_funding(new_funding));
            }
            debug!(
                "[ic-01] Funding CAS lost on {} (attempt {}/{})",
                opportunity_id, attempt, attempts
            );
        }

        warn!(
            "[ic-01] Funding counter for {} contended after {} attempts",
            opportunity_id, attempts
        );
        Err(LedgerError::Contention {
            opportunity_id: *opportunity_id,
            attempts,
        })
    }

    fn reserve_locked(
        &self,
        opportunity_id: &OpportunityId,
        amount: Amount,
    ) -> LedgerResult<CapacitySnapshot> {
        self.apply(opportunity_id, |current| {
            if amount > current.remaining {
                return Err(LedgerError::InsufficientCapacity {
                    remaining: current.remaining,
                    attempted: amount,
                });
            }
            Ok(current.current_funding + amount)
        })
    }

    fn release_locked(
        &self,
        opportunity_id: &OpportunityId,
        amount: Amount,
    ) -> LedgerResult<CapacitySnapshot> {
        self.apply(opportunity_id, |current| {
            current
                .current_funding
                .checked_sub(amount)
                .ok_or(LedgerError::ReleaseUnderflow {
                    current_funding: current.current_funding,
                    attempted: amount,
                })
        })
    }

    /// Undo of a step whose commit failed. Skips the cap check.
    fn restore_locked(
        &self,
        opportunity_id: &OpportunityId,
        amount: Amount,
        direction: Direction,
    ) -> LedgerResult<CapacitySnapshot> {
        self.apply(opportunity_id, |current| {
            Ok(match direction {
                Direction::Up => current.current_funding.saturating_add(amount),
                Direction::Down => current.current_funding.saturating_sub(amount),
            })
        })
    }

    fn close_if_full(&self, snapshot: &CapacitySnapshot) {
        if !self.config.auto_close_on_target || !snapshot.is_full() {
            return;
        }
        match self
            .directory
            .set_status(&snapshot.opportunity_id, OpportunityStatus::Closed)
        {
            Ok(()) => info!(
                "[ic-01] {} reached its cap, closed",
                snapshot.opportunity_id
            ),
            Err(e) => warn!(
                "[ic-01] Could not close {} at cap: {}",
                snapshot.opportunity_id, e
            ),
        }
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Up,
    Down,
}

impl<D> CapacityApi for CapacityLedger<D>
where
    D: OpportunityDirectory,
{
    fn reserve(
        &self,
        opportunity_id: &OpportunityId,
        amount: Amount,
    ) -> Result<CapacitySnapshot, LedgerError> {
        self.reserve_with(opportunity_id, amount, |_| Ok::<(), LedgerError>(()))
            .map(|(snapshot, ())| snapshot)
    }

    fn release(
        &self,
        opportunity_id: &OpportunityId,
        amount: Amount,
    ) -> Result<CapacitySnapshot, LedgerError> {
        self.release_with(opportunity_id, amount, |_| Ok::<(), LedgerError>(()))
            .map(|(snapshot, ())| snapshot)
    }

    fn snapshot(&self, opportunity_id: &OpportunityId) -> Result<CapacitySnapshot, LedgerError> {
        Ok(CapacitySnapshot::of(&self.load(opportunity_id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{
        ContractBinding, InMemoryOpportunityDirectory, StoreError,
    };
    use std::thread;

    fn ledger_with(
        opportunity: InvestmentOpportunity,
        config: LedgerConfig,
    ) -> (CapacityLedger<InMemoryOpportunityDirectory>, OpportunityId) {
        let directory = Arc::new(InMemoryOpportunityDirectory::new());
        let id = opportunity.id;
        directory.insert(opportunity).unwrap();
        (CapacityLedger::new(config, directory), id)
    }

    fn active(target: Amount) -> InvestmentOpportunity {
        InvestmentOpportunity::new("Harbour Bond", "HRB", target, 100)
            .with_status(OpportunityStatus::Active)
    }

    #[test]
    fn test_reserve_within_cap() {
        let (ledger, id) = ledger_with(active(10_000), LedgerConfig::for_testing());

        let snapshot = ledger.reserve(&id, 500).unwrap();
        assert_eq!(snapshot.current_funding, 500);
        assert_eq!(snapshot.remaining, 9_500);
        assert_eq!(
            ledger.directory().get(&id).unwrap().unwrap().current_funding,
            500
        );
    }

    #[test]
    fn test_reserve_rejects_with_remaining() {
        let opp = active(10_000)
            .with_max_investment(8_000)
            .with_current_funding(7_850);
        let (ledger, id) = ledger_with(opp, LedgerConfig::for_testing());

        let err = ledger.reserve(&id, 200).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientCapacity {
                remaining: 150,
                attempted: 200
            }
        );
        assert_eq!(ledger.snapshot(&id).unwrap().current_funding, 7_850);
    }

    #[test]
    fn test_reserve_exactly_fills_cap() {
        let (ledger, id) = ledger_with(active(1_000), LedgerConfig::for_testing());
        let snapshot = ledger.reserve(&id, 1_000).unwrap();
        assert!(snapshot.is_full());
        // Not closed unless configured
        assert_eq!(
            ledger.directory().get(&id).unwrap().unwrap().status,
            OpportunityStatus::Active
        );
    }

    #[test]
    fn test_auto_close_on_target() {
        let config = LedgerConfig {
            auto_close_on_target: true,
            ..LedgerConfig::for_testing()
        };
        let (ledger, id) = ledger_with(active(1_000), config);
        ledger.reserve(&id, 1_000).unwrap();
        assert_eq!(
            ledger.directory().get(&id).unwrap().unwrap().status,
            OpportunityStatus::Closed
        );
    }

    #[test]
    fn test_release_never_underflows() {
        let (ledger, id) =
            ledger_with(active(10_000).with_current_funding(300), LedgerConfig::for_testing());

        let err = ledger.release(&id, 400).unwrap_err();
        assert_eq!(
            err,
            LedgerError::ReleaseUnderflow {
                current_funding: 300,
                attempted: 400
            }
        );

        let snapshot = ledger.release(&id, 300).unwrap();
        assert_eq!(snapshot.current_funding, 0);
    }

    #[test]
    fn test_unknown_opportunity() {
        let (ledger, _) = ledger_with(active(1_000), LedgerConfig::for_testing());
        let missing = OpportunityId::new();
        assert_eq!(
            ledger.reserve(&missing, 1).unwrap_err(),
            LedgerError::OpportunityNotFound(missing)
        );
    }

    #[test]
    fn test_reserve_with_undoes_on_commit_failure() {
        let (ledger, id) = ledger_with(active(1_000), LedgerConfig::for_testing());

        let result: Result<(CapacitySnapshot, ()), LedgerError> =
            ledger.reserve_with(&id, 400, |_| {
                Err(LedgerError::Store(StoreError::Backend("write failed".into())))
            });
        assert!(result.is_err());
        assert_eq!(ledger.snapshot(&id).unwrap().current_funding, 0);
    }

    #[test]
    fn test_release_with_undoes_on_commit_failure() {
        let (ledger, id) =
            ledger_with(active(1_000).with_current_funding(400), LedgerConfig::for_testing());

        let result: Result<(CapacitySnapshot, ()), LedgerError> =
            ledger.release_with(&id, 400, |snapshot| {
                assert_eq!(snapshot.current_funding, 0);
                Err(LedgerError::Store(StoreError::Backend("write failed".into())))
            });
        assert!(result.is_err());
        assert_eq!(ledger.snapshot(&id).unwrap().current_funding, 400);
    }

    #[test]
    fn test_concurrent_reservations_never_oversell() {
        let (ledger, id) = ledger_with(active(1_000), LedgerConfig::default());
        let ledger = Arc::new(ledger);

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || ledger.reserve(&id, 100).is_ok())
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(accepted, 10);
        assert_eq!(ledger.snapshot(&id).unwrap().current_funding, 1_000);
    }

    /// Directory whose funding CAS always loses, as if another process
    /// kept writing between our read and our write.
    struct AlwaysStale(InMemoryOpportunityDirectory);

    impl OpportunityDirectory for AlwaysStale {
        fn get(&self, id: &OpportunityId) -> Result<Option<InvestmentOpportunity>, StoreError> {
            self.0.get(id)
        }

        fn list(&self) -> Result<Vec<InvestmentOpportunity>, StoreError> {
            self.0.list()
        }

        fn insert(&self, opportunity: InvestmentOpportunity) -> Result<(), StoreError> {
            self.0.insert(opportunity)
        }

        fn set_status(
            &self,
            id: &OpportunityId,
            status: OpportunityStatus,
        ) -> Result<(), StoreError> {
            self.0.set_status(id, status)
        }

        fn set_min_investment(&self, id: &OpportunityId, price: Amount) -> Result<(), StoreError> {
            self.0.set_min_investment(id, price)
        }

        fn bind_contract(
            &self,
            id: &OpportunityId,
            binding: ContractBinding,
        ) -> Result<(), StoreError> {
            self.0.bind_contract(id, binding)
        }

        fn compare_and_set_funding(
            &self,
            _id: &OpportunityId,
            _expected: Amount,
            _new: Amount,
        ) -> Result<bool, StoreError> {
            Ok(false)
        }
    }

    #[test]
    fn test_contention_is_bounded() {
        let directory = Arc::new(AlwaysStale(InMemoryOpportunityDirectory::new()));
        let opp = active(1_000);
        let id = opp.id;
        directory.insert(opp).unwrap();
        let ledger = CapacityLedger::new(LedgerConfig::for_testing(), directory);

        assert_eq!(
            ledger.reserve(&id, 100).unwrap_err(),
            LedgerError::Contention {
                opportunity_id: id,
                attempts: 3
            }
        );
    }
}
