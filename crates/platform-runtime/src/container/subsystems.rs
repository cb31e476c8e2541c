//! # Subsystem Container
//!
//! Holds all subsystem instances and wires their ports.
//!
//! ## Initialization Order
//!
//! ```text
//! Shared: stores, time source, event bus, chain gateway, settlement queue
//! [1] Capacity Ledger      (directory)
//! [2] Admission Controller (directory, time)
//! [3] Lifecycle            (1, 2, repository, queue, bus)
//! [4] Settlement           (directory, repository, chain, bus)
//! [5] Consistency Auditor  (directory, repository, 4 as balance reader, bus)
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::info;

use ic_01_capacity_ledger::CapacityLedger;
use ic_02_admission::AdmissionController;
use ic_03_investment_lifecycle::LifecycleService;
use ic_04_settlement::{InMemoryChain, SettlementQueue, SettlementReconciler, SettlementWorker};
use ic_05_consistency_audit::{ConsistencyAuditor, SettlementBalanceReader};
use shared_bus::InMemoryEventBus;
use shared_types::{
    InMemoryInvestmentRepository, InMemoryOpportunityDirectory, SettlementJob, SystemTimeSource,
    TimeSource,
};

use crate::container::config::PlatformConfig;

/// Opportunity store.
pub type Directory = InMemoryOpportunityDirectory;
/// Investment store.
pub type Repository = InMemoryInvestmentRepository;
/// Capacity ledger over the directory.
pub type Ledger = CapacityLedger<Directory>;
/// Lifecycle over the shared stores.
pub type Lifecycle = LifecycleService<Directory, Repository>;
/// Settlement reconciler over the simulated chain.
pub type Reconciler = SettlementReconciler<Directory, Repository, InMemoryChain>;
/// Auditor over the shared stores.
pub type Auditor = ConsistencyAuditor<Directory, Repository>;

/// Central container holding all subsystem instances.
pub struct PlatformContainer {
    /// Opportunity store (admin collaborator).
    pub directory: Arc<Directory>,
    /// Investment store.
    pub repository: Arc<Repository>,
    /// Simulated chain gateway.
    pub chain: Arc<InMemoryChain>,
    /// Event bus feeding operators.
    pub event_bus: Arc<InMemoryEventBus>,
    /// Clock shared by every subsystem.
    pub time_source: Arc<dyn TimeSource>,

    /// Capacity Ledger (Subsystem 1).
    pub ledger: Arc<Ledger>,
    /// Admission Controller (Subsystem 2).
    pub admission: Arc<AdmissionController<Directory>>,
    /// Lifecycle State Machine (Subsystem 3).
    pub lifecycle: Arc<Lifecycle>,
    /// Settlement Reconciler (Subsystem 4).
    pub settlement: Arc<Reconciler>,
    /// Consistency Auditor (Subsystem 5).
    pub auditor: Arc<Auditor>,

    /// Scheduler the lifecycle writes to.
    pub queue: SettlementQueue,
    settlement_jobs: Mutex<Option<mpsc::UnboundedReceiver<SettlementJob>>>,

    /// Configuration (immutable after initialization).
    pub config: PlatformConfig,
}

impl PlatformContainer {
    /// Create a container on the system clock.
    pub fn new(config: PlatformConfig) -> Self {
        Self::with_time_source(config, Arc::new(SystemTimeSource))
    }

    /// Create a container on a given clock.
    pub fn with_time_source(config: PlatformConfig, time_source: Arc<dyn TimeSource>) -> Self {
        info!("Initializing investment core container");

        let directory = Arc::new(InMemoryOpportunityDirectory::new());
        let repository = Arc::new(InMemoryInvestmentRepository::new());
        let chain = Arc::new(InMemoryChain::new());
        let event_bus = Arc::new(InMemoryEventBus::with_capacity(
            config.runtime.event_channel_capacity,
        ));
        let (queue, settlement_jobs) = SettlementQueue::new();

        let ledger = Arc::new(CapacityLedger::new(config.ledger.clone(), directory.clone()));
        info!("  [ic-01] Capacity Ledger initialized");

        let admission = Arc::new(AdmissionController::new(
            directory.clone(),
            time_source.clone(),
        ));
        info!("  [ic-02] Admission Controller initialized");

        let lifecycle = Arc::new(LifecycleService::new(
            config.lifecycle.clone(),
            admission.clone(),
            ledger.clone(),
            repository.clone(),
            Arc::new(queue.clone()),
            event_bus.clone(),
            time_source.clone(),
        ));
        info!("  [ic-03] Lifecycle initialized");

        let settlement = Arc::new(SettlementReconciler::new(
            config.settlement.clone(),
            directory.clone(),
            repository.clone(),
            chain.clone(),
            event_bus.clone(),
            time_source.clone(),
        ));
        info!("  [ic-04] Settlement Reconciler initialized");

        let auditor = Arc::new(ConsistencyAuditor::new(
            config.audit.clone(),
            directory.clone(),
            repository.clone(),
            Arc::new(SettlementBalanceReader::new(settlement.clone())),
            event_bus.clone(),
            time_source.clone(),
        ));
        info!("  [ic-05] Consistency Auditor initialized");

        Self {
            directory,
            repository,
            chain,
            event_bus,
            time_source,
            ledger,
            admission,
            lifecycle,
            settlement,
            auditor,
            queue,
            settlement_jobs: Mutex::new(Some(settlement_jobs)),
            config,
        }
    }

    /// Take the settlement worker. Only the first call gets one.
    pub fn take_settlement_worker(&self) -> Option<SettlementWorker<Reconciler>> {
        self.settlement_jobs
            .lock()
            .take()
            .map(|jobs| SettlementWorker::new(self.settlement.clone(), jobs))
    }
}
