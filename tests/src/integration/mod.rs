//! # Integration Tests
//!
//! Cross-subsystem flows driven through the platform container, the same
//! wiring the runtime uses: lifecycle → settlement queue → worker → chain,
//! with the auditor reading balances back through settlement.

pub mod concurrency;
pub mod scenarios;

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use ic_02_admission::AdmissionRequest;
    use ic_03_investment_lifecycle::LifecycleApi;
    use platform_runtime::{PlatformConfig, PlatformContainer};
    use shared_types::{
        Address, Amount, Investment, InvestmentOpportunity, OpportunityDirectory, OpportunityId,
        OpportunityStatus,
    };

    /// Test container with one active opportunity already `funded`.
    pub fn container_with_opportunity(
        target: Amount,
        price: Amount,
        funded: Amount,
    ) -> (Arc<PlatformContainer>, OpportunityId) {
        let container = Arc::new(PlatformContainer::new(PlatformConfig::for_testing()));
        let opportunity = InvestmentOpportunity::new("Harbour Bond", "HRB", target, price)
            .with_status(OpportunityStatus::Active)
            .with_current_funding(funded);
        let id = opportunity.id;
        container.directory.insert(opportunity).unwrap();
        (container, id)
    }

    pub async fn submit(
        container: &PlatformContainer,
        opportunity_id: OpportunityId,
        investor: &str,
        bonds: u64,
        wallet: Option<Address>,
    ) -> Investment {
        let mut request = AdmissionRequest::new(opportunity_id, investor, bonds, "card");
        if let Some(wallet) = wallet {
            request = request.with_wallet(wallet);
        }
        container.lifecycle.submit(request).await.unwrap()
    }

    pub fn funding(container: &PlatformContainer, opportunity_id: OpportunityId) -> Amount {
        container
            .directory
            .get(&opportunity_id)
            .unwrap()
            .unwrap()
            .current_funding
    }
}
