use std::sync::Arc;

use tracing::info;

use super::applications::ApplicationLedger;
use super::coordinator::{AllocationCoordinator, Clock, ReleaseReceipt, ReviewReceipt, SystemClock};
use super::domain::{
    AllocationError, Application, ApplicationFilter, ApplicationId, ApplicationRequest, NewStall,
    PaymentStatus, Rental, RentalFilter, RentalId, ReviewDecision, Stall, StallId, UserId,
};
use super::registry::StallRegistry;
use super::rentals::RentalLedger;
use super::store::MarketStore;
use crate::config::LedgerConfig;

/// Facade composing the store, the ledgers, and the allocation coordinator.
///
/// Every mutation runs as one store transaction; reads work off the last committed snapshot.
pub struct AllocationService<S> {
    store: Arc<S>,
    applications: Arc<ApplicationLedger>,
    coordinator: AllocationCoordinator<S>,
    clock: Arc<dyn Clock>,
}

impl<S> AllocationService<S>
where
    S: MarketStore + 'static,
{
    pub fn new(store: Arc<S>, config: LedgerConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        let applications = Arc::new(ApplicationLedger::new(config));
        let coordinator =
            AllocationCoordinator::new(store.clone(), applications.clone(), clock.clone());
        Self {
            store,
            applications,
            coordinator,
            clock,
        }
    }

    /// Register a stall on behalf of the administrative catalogue.
    pub fn register_stall(&self, stall: NewStall) -> Result<Stall, AllocationError> {
        let stall = self
            .store
            .transaction(|tables| StallRegistry::register(&mut tables.stalls, stall))?;
        info!(stall_id = %stall.id, stall_no = %stall.stall_no, "stall registered");
        Ok(stall)
    }

    /// Submit a lease application for an existing stall.
    pub fn submit(
        &self,
        requester: UserId,
        request: ApplicationRequest,
    ) -> Result<Application, AllocationError> {
        let now = self.clock.now();
        let application = self.store.transaction(|tables| {
            StallRegistry::lookup(&tables.stalls, request.stall_id)?;
            self.applications.submit(
                &mut tables.applications,
                requester,
                request.stall_id,
                request.period,
                request.business,
                now,
            )
        })?;
        info!(
            application_id = %application.id,
            reference = %application.reference,
            stall_id = %application.stall_id,
            requester = %requester,
            "application submitted"
        );
        Ok(application)
    }

    /// Requester cancellation; `Ok(false)` when the caller does not own the application or it
    /// is no longer pending.
    pub fn cancel(
        &self,
        application_id: ApplicationId,
        requester: UserId,
    ) -> Result<bool, AllocationError> {
        let cancelled = self.store.transaction(|tables| {
            self.applications
                .cancel(&mut tables.applications, application_id, requester)
        })?;
        info!(application_id = %application_id, requester = %requester, cancelled, "cancel requested");
        Ok(cancelled)
    }

    pub fn review(
        &self,
        application_id: ApplicationId,
        decision: ReviewDecision,
        opinion: Option<String>,
        reviewer: UserId,
    ) -> Result<ReviewReceipt, AllocationError> {
        self.coordinator
            .approve_and_allocate(application_id, decision, opinion, reviewer)
    }

    pub fn terminate(&self, rental_id: RentalId) -> Result<ReleaseReceipt, AllocationError> {
        self.coordinator.terminate_and_release(rental_id)
    }

    pub fn set_payment_status(
        &self,
        rental_id: RentalId,
        payment_status: PaymentStatus,
    ) -> Result<Rental, AllocationError> {
        let rental = self.store.transaction(|tables| {
            RentalLedger::set_payment_status(&mut tables.rentals, rental_id, payment_status)
        })?;
        info!(rental_id = %rental_id, payment_status = ?payment_status, "payment status updated");
        Ok(rental)
    }

    pub fn mark_paid(&self, rental_id: RentalId) -> Result<Rental, AllocationError> {
        self.set_payment_status(rental_id, PaymentStatus::Paid)
    }

    pub fn application(&self, application_id: ApplicationId) -> Result<Application, AllocationError> {
        let tables = self.store.snapshot()?;
        self.applications.get(&tables.applications, application_id)
    }

    pub fn applications(&self, filter: &ApplicationFilter) -> Result<Vec<Application>, AllocationError> {
        let tables = self.store.snapshot()?;
        Ok(self.applications.list(&tables.applications, filter))
    }

    pub fn rental(&self, rental_id: RentalId) -> Result<Rental, AllocationError> {
        let tables = self.store.snapshot()?;
        RentalLedger::get(&tables.rentals, rental_id)
    }

    pub fn rentals(&self, filter: &RentalFilter) -> Result<Vec<Rental>, AllocationError> {
        let tables = self.store.snapshot()?;
        Ok(RentalLedger::list(&tables.rentals, filter))
    }

    pub fn active_rental(&self, stall_id: StallId) -> Result<Option<Rental>, AllocationError> {
        let tables = self.store.snapshot()?;
        Ok(RentalLedger::active_for_stall(&tables.rentals, stall_id))
    }

    pub fn stall(&self, stall_id: StallId) -> Result<Stall, AllocationError> {
        let tables = self.store.snapshot()?;
        StallRegistry::get(&tables.stalls, stall_id)
    }

    pub fn available_stalls(&self) -> Result<Vec<Stall>, AllocationError> {
        let tables = self.store.snapshot()?;
        Ok(StallRegistry::available(&tables.stalls))
    }
}
