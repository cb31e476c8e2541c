//! # Operator Scenarios
//!
//! End-to-end walks through admission, confirmation, settlement, audit and
//! refund on one opportunity (target 10,000, one bond = 100).
//!
//! | # | Flow |
//! |---|------|
//! | 1 | capacity consumed between submit and confirm → `FundingExceeded` |
//! | 2 | two investors race for the last bond → exactly one confirms |
//! | 3 | mint fails → confirmation kept, audit mismatched, retry → matched |
//! | 4 | opportunity paused → confirm refused, investment stays pending |
//! | 5 | refund frees capacity → a previously blocked confirm succeeds |

#[cfg(test)]
mod tests {
    use ic_01_capacity_ledger::CapacityApi;
    use ic_03_investment_lifecycle::{ConfirmOptions, LifecycleApi, LifecycleError};
    use ic_04_settlement::{SettlementApi, SettlementOutcome};
    use ic_05_consistency_audit::{AuditApi, Classification, MismatchReason};
    use shared_types::{InvestmentStatus, OpportunityDirectory, OpportunityStatus};

    use crate::integration::fixtures::{container_with_opportunity, funding, submit};

    const WALLET: [u8; 20] = [0x5A; 20];

    // =========================================================================
    // SCENARIO 1: hard check at confirmation
    // =========================================================================

    #[tokio::test]
    async fn test_confirm_rejects_when_capacity_was_taken_after_submit() {
        let (container, opp_id) = container_with_opportunity(10_000, 100, 9_900);

        // Soft check passes: 100 remaining.
        let investment = submit(&container, opp_id, "alice", 1, None).await;
        assert_eq!(investment.status, InvestmentStatus::Pending);
        assert_eq!(investment.amount, 100);

        // Another confirmation lands first and leaves 50.
        container.ledger.reserve(&opp_id, 50).unwrap();
        assert_eq!(funding(&container, opp_id), 9_950);

        let err = container
            .lifecycle
            .confirm(investment.id, ConfirmOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LifecycleError::FundingExceeded {
                remaining: 50,
                attempted: 100
            }
        );

        assert_eq!(funding(&container, opp_id), 9_950);
        let stored = container.lifecycle.get(investment.id).unwrap();
        assert_eq!(stored.status, InvestmentStatus::Pending);
    }

    // =========================================================================
    // SCENARIO 2: last bond race
    // =========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_investors_race_for_last_bond() {
        let (container, opp_id) = container_with_opportunity(10_000, 100, 9_900);

        let first = submit(&container, opp_id, "alice", 1, None).await;
        let second = submit(&container, opp_id, "bob", 1, None).await;

        let a = {
            let lifecycle = container.lifecycle.clone();
            tokio::spawn(async move { lifecycle.confirm(first.id, ConfirmOptions::default()).await })
        };
        let b = {
            let lifecycle = container.lifecycle.clone();
            tokio::spawn(
                async move { lifecycle.confirm(second.id, ConfirmOptions::default()).await },
            )
        };
        let results = [a.await.unwrap(), b.await.unwrap()];

        let confirmed = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(confirmed, 1);
        let rejected = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert_eq!(
            rejected,
            &LifecycleError::FundingExceeded {
                remaining: 0,
                attempted: 100
            }
        );
        assert_eq!(funding(&container, opp_id), 10_000);
    }

    // =========================================================================
    // SCENARIO 3: chain outage keeps the confirmation
    // =========================================================================

    #[tokio::test]
    async fn test_failed_mint_is_audited_then_repaired_by_retry() {
        let (container, opp_id) = container_with_opportunity(10_000, 100, 0);
        let binding = container.settlement.deploy_contract(opp_id).await.unwrap();
        let mut worker = container.take_settlement_worker().unwrap();

        let investment = submit(&container, opp_id, "alice", 5, Some(WALLET)).await;
        container.chain.set_unavailable(true);
        container
            .lifecycle
            .confirm(investment.id, ConfirmOptions::default())
            .await
            .unwrap();
        assert_eq!(worker.drain().await, 1);

        let stored = container.lifecycle.get(investment.id).unwrap();
        assert_eq!(stored.status, InvestmentStatus::Confirmed);
        assert!(stored.settlement.blockchain_error.is_some());
        assert_eq!(stored.settlement.mint_tx_hash, None);
        assert_eq!(funding(&container, opp_id), 500);

        container.chain.set_unavailable(false);
        let report = container.auditor.audit(Some(opp_id)).await.unwrap();
        let record = report.record_for(&investment.id).unwrap();
        assert_eq!(record.classification, Classification::Mismatched);
        assert!(matches!(
            record.reason,
            Some(MismatchReason::BlockchainError(_))
        ));

        let outcome = container.settlement.retry_mint(investment.id).await.unwrap();
        assert!(matches!(
            outcome,
            SettlementOutcome::Minted {
                on_chain_bonds: 5,
                ..
            }
        ));
        assert_eq!(
            container.chain.balance(&binding.contract_address, &WALLET),
            5
        );

        let report = container.auditor.audit(Some(opp_id)).await.unwrap();
        let record = report.record_for(&investment.id).unwrap();
        assert_eq!(record.classification, Classification::Matched);
        assert_eq!(record.observed_bonds, Some(5));
        assert_eq!(report.counts.mismatched, 0);
    }

    // =========================================================================
    // SCENARIO 4: paused opportunity
    // =========================================================================

    #[tokio::test]
    async fn test_confirm_refused_while_paused() {
        let (container, opp_id) = container_with_opportunity(10_000, 100, 0);
        let investment = submit(&container, opp_id, "alice", 2, None).await;

        container
            .directory
            .set_status(&opp_id, OpportunityStatus::Paused)
            .unwrap();

        let err = container
            .lifecycle
            .confirm(investment.id, ConfirmOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            LifecycleError::OpportunityNotActive {
                status: OpportunityStatus::Paused
            }
        );
        assert_eq!(
            container.lifecycle.get(investment.id).unwrap().status,
            InvestmentStatus::Pending
        );
        assert_eq!(funding(&container, opp_id), 0);
    }

    // =========================================================================
    // SCENARIO 5: refund frees capacity
    // =========================================================================

    #[tokio::test]
    async fn test_refund_unblocks_waiting_confirmation() {
        let (container, opp_id) = container_with_opportunity(10_000, 100, 9_000);

        let early = submit(&container, opp_id, "alice", 10, None).await;
        let late = submit(&container, opp_id, "bob", 3, None).await;

        container
            .lifecycle
            .confirm(early.id, ConfirmOptions::default())
            .await
            .unwrap();
        assert_eq!(funding(&container, opp_id), 10_000);

        let blocked = container
            .lifecycle
            .confirm(late.id, ConfirmOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            blocked,
            LifecycleError::FundingExceeded {
                remaining: 0,
                attempted: 300
            }
        );

        let refunded = container.lifecycle.refund(early.id).await.unwrap();
        assert_eq!(refunded.status, InvestmentStatus::Refunded);
        assert_eq!(funding(&container, opp_id), 9_000);

        let confirmed = container
            .lifecycle
            .confirm(late.id, ConfirmOptions::default())
            .await
            .unwrap();
        assert_eq!(confirmed.status, InvestmentStatus::Confirmed);
        assert_eq!(funding(&container, opp_id), 9_300);
    }
}
