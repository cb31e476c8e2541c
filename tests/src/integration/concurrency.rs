//! # Concurrency Properties
//!
//! Races run on the multi-threaded runtime:
//!
//! - many confirms on one opportunity never push funding past the cap
//! - repeated or concurrent mint deliveries produce one on-chain mint
//! - competing terminal transitions on one investment apply exactly once

#[cfg(test)]
mod tests {
    use rand::Rng;
    use std::sync::Arc;

    use ic_01_capacity_ledger::CapacityApi;
    use ic_03_investment_lifecycle::{ConfirmOptions, LifecycleApi, LifecycleError};
    use ic_04_settlement::{SettlementApi, SettlementOutcome};
    use shared_types::{InvestmentRepository, InvestmentStatus};

    use crate::integration::fixtures::{container_with_opportunity, funding, submit};

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_confirms_never_oversell() {
        let (container, opp_id) = container_with_opportunity(5_000, 100, 0);

        let bond_counts: Vec<u64> = {
            let mut rng = rand::thread_rng();
            (0..40).map(|_| rng.gen_range(1..=5)).collect()
        };
        let mut pending = Vec::new();
        for (i, bonds) in bond_counts.iter().enumerate() {
            pending.push(submit(&container, opp_id, &format!("investor-{}", i), *bonds, None).await);
        }

        let handles: Vec<_> = pending
            .iter()
            .map(|investment| {
                let lifecycle = container.lifecycle.clone();
                let id = investment.id;
                tokio::spawn(async move { lifecycle.confirm(id, ConfirmOptions::default()).await })
            })
            .collect();

        let mut confirmed_total = 0u128;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(investment) => confirmed_total += investment.amount,
                Err(LifecycleError::FundingExceeded { .. }) => {}
                Err(other) => panic!("unexpected rejection: {}", other),
            }
        }

        let snapshot = container.ledger.snapshot(&opp_id).unwrap();
        assert!(snapshot.current_funding <= snapshot.cap);
        assert_eq!(snapshot.current_funding, confirmed_total);
        assert_eq!(funding(&container, opp_id), confirmed_total);

        let stored_total: u128 = container
            .repository
            .list_by_opportunity(&opp_id)
            .unwrap()
            .iter()
            .filter(|inv| inv.status == InvestmentStatus::Confirmed)
            .map(|inv| inv.amount)
            .sum();
        assert_eq!(stored_total, confirmed_total);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_mint_deliveries_mint_once() {
        let (container, opp_id) = container_with_opportunity(10_000, 100, 0);
        let binding = container.settlement.deploy_contract(opp_id).await.unwrap();
        let mut worker = container.take_settlement_worker().unwrap();
        let wallet = [0x42; 20];

        let investment = submit(&container, opp_id, "alice", 4, Some(wallet)).await;
        container
            .lifecycle
            .confirm(investment.id, ConfirmOptions::default())
            .await
            .unwrap();

        // First response is lost; the replayed receipt must not mint again.
        container.chain.lose_next_responses(1);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let settlement = container.settlement.clone();
                let id = investment.id;
                tokio::spawn(async move { settlement.on_confirmed(id).await })
            })
            .collect();

        let mut minted = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                SettlementOutcome::Minted { .. } => minted += 1,
                SettlementOutcome::InFlight | SettlementOutcome::AlreadySettled { .. } => {}
                other => panic!("unexpected outcome: {:?}", other),
            }
        }
        assert_eq!(minted, 1);

        // The scheduled job arrives late and is a no-op.
        assert_eq!(worker.drain().await, 1);

        assert_eq!(container.chain.mint_count(), 1);
        assert_eq!(container.chain.balance(&binding.contract_address, &wallet), 4);
        let stored = container.lifecycle.get(investment.id).unwrap();
        assert!(stored.settlement.mint_tx_hash.is_some());
        assert_eq!(stored.settlement.on_chain_bonds, Some(4));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_competing_refunds_release_once() {
        let (container, opp_id) = container_with_opportunity(10_000, 100, 0);
        let investment = submit(&container, opp_id, "alice", 6, None).await;
        container
            .lifecycle
            .confirm(investment.id, ConfirmOptions::default())
            .await
            .unwrap();
        assert_eq!(funding(&container, opp_id), 600);

        let refunds: Vec<_> = (0..3)
            .map(|_| {
                let lifecycle = container.lifecycle.clone();
                let id = investment.id;
                tokio::spawn(async move { lifecycle.refund(id).await })
            })
            .collect();
        let cancel = {
            let lifecycle = container.lifecycle.clone();
            let id = investment.id;
            tokio::spawn(async move { lifecycle.cancel(id, "duplicate".into()).await })
        };

        let mut succeeded = 0;
        for handle in refunds {
            if handle.await.unwrap().is_ok() {
                succeeded += 1;
            }
        }
        if cancel.await.unwrap().is_ok() {
            succeeded += 1;
        }

        assert_eq!(succeeded, 1);
        assert_eq!(funding(&container, opp_id), 0);
        assert_eq!(
            container.lifecycle.get(investment.id).unwrap().status,
            InvestmentStatus::Refunded
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_confirm_cancel_race_leaves_consistent_funding() {
        let (container, opp_id) = container_with_opportunity(10_000, 100, 0);

        for round in 0..20 {
            let investment =
                submit(&container, opp_id, &format!("investor-{}", round), 1, None).await;
            let before = funding(&container, opp_id);

            let confirm = {
                let lifecycle = container.lifecycle.clone();
                let id = investment.id;
                tokio::spawn(async move { lifecycle.confirm(id, ConfirmOptions::default()).await })
            };
            let cancel = {
                let lifecycle = Arc::clone(&container.lifecycle);
                let id = investment.id;
                tokio::spawn(async move { lifecycle.cancel(id, "withdrawn".into()).await })
            };
            let _ = confirm.await.unwrap();
            let _ = cancel.await.unwrap();

            let after = funding(&container, opp_id);
            match container.lifecycle.get(investment.id).unwrap().status {
                InvestmentStatus::Confirmed => assert_eq!(after, before + 100),
                // Confirm won, then cancel refunded it.
                InvestmentStatus::Refunded => assert_eq!(after, before),
                InvestmentStatus::Cancelled => assert_eq!(after, before),
                other => panic!("unexpected status {}", other),
            }
        }
    }
}
