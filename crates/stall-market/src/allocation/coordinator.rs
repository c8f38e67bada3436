use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::applications::ApplicationLedger;
use super::domain::{
    AllocationError, Application, ApplicationId, ApplicationStatus, Occupancy, Rental, RentalId,
    RentalStatus, ReviewDecision, ReviewOutcome, Stall, UserId,
};
use super::registry::StallRegistry;
use super::rentals::RentalLedger;
use super::store::MarketStore;

/// Source of review and submission timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Result of a committed review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewReceipt {
    pub application: Application,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rental: Option<Rental>,
}

/// Result of a committed release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseReceipt {
    pub rental: Rental,
    pub stall: Stall,
}

/// Sequences the multi-entity workflows. Each workflow is one store transaction; the
/// coordinator itself holds no entity state.
pub struct AllocationCoordinator<S> {
    store: Arc<S>,
    applications: Arc<ApplicationLedger>,
    clock: Arc<dyn Clock>,
}

impl<S> AllocationCoordinator<S>
where
    S: MarketStore + 'static,
{
    pub fn new(store: Arc<S>, applications: Arc<ApplicationLedger>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            applications,
            clock,
        }
    }

    /// Review a pending application. Approval opens the rental before the stall is marked
    /// occupied, so no commit ever shows an occupied stall without its rental.
    pub fn approve_and_allocate(
        &self,
        application_id: ApplicationId,
        decision: ReviewDecision,
        opinion: Option<String>,
        reviewer: UserId,
    ) -> Result<ReviewReceipt, AllocationError> {
        let now = self.clock.now();
        let result: Result<ReviewReceipt, AllocationError> = self.store.transaction(|tables| {
            let application = self.applications.get(&tables.applications, application_id)?;
            if application.status != ApplicationStatus::Pending {
                return Err(AllocationError::InvalidState {
                    entity: "application",
                    id: application_id.0,
                    actual: application.status.label(),
                    expected: ApplicationStatus::Pending.label(),
                });
            }

            let outcome = match decision {
                ReviewDecision::Approved => ReviewOutcome::Approved,
                ReviewDecision::Rejected => ReviewOutcome::Rejected,
                ReviewDecision::Cancelled => {
                    let application =
                        self.applications
                            .withdraw(&mut tables.applications, application_id, opinion)?;
                    return Ok(ReviewReceipt {
                        application,
                        rental: None,
                    });
                }
            };

            let application = self.applications.decide(
                &mut tables.applications,
                application_id,
                outcome,
                opinion,
                reviewer,
                now,
            )?;
            if outcome == ReviewOutcome::Rejected {
                return Ok(ReviewReceipt {
                    application,
                    rental: None,
                });
            }

            let stall = StallRegistry::lookup(&tables.stalls, application.stall_id)?;
            if stall.occupancy == Occupancy::Maintenance {
                return Err(AllocationError::InvalidState {
                    entity: "stall",
                    id: stall.stall_id.0,
                    actual: stall.occupancy.label(),
                    expected: Occupancy::Available.label(),
                });
            }

            let rental = RentalLedger::open(
                &mut tables.rentals,
                application.id,
                application.requester,
                application.stall_id,
                application.period,
                stall.rent_price,
                now,
            )?;
            StallRegistry::set_occupancy(&mut tables.stalls, stall.stall_id, Occupancy::Occupied)?;
            debug!(stall_id = %stall.stall_id, rental_id = %rental.id, "stall marked occupied");

            Ok(ReviewReceipt {
                application,
                rental: Some(rental),
            })
        });

        match &result {
            Ok(receipt) => info!(
                application_id = %application_id,
                reviewer = %reviewer,
                status = receipt.application.status.label(),
                rental_id = ?receipt.rental.as_ref().map(|rental| rental.id.0),
                "application review committed"
            ),
            Err(AllocationError::Conflict {
                stall_id,
                rental_id,
            }) => warn!(
                application_id = %application_id,
                stall_id = %stall_id,
                rental_id = %rental_id,
                "approval lost the stall to an existing rental; rolled back"
            ),
            Err(err) => warn!(
                application_id = %application_id,
                kind = err.kind(),
                error = %err,
                "application review rolled back"
            ),
        }
        result
    }

    /// Terminate an active rental and return its stall to the available pool.
    pub fn terminate_and_release(
        &self,
        rental_id: RentalId,
    ) -> Result<ReleaseReceipt, AllocationError> {
        let result: Result<ReleaseReceipt, AllocationError> = self.store.transaction(|tables| {
            let rental = RentalLedger::get(&tables.rentals, rental_id)?;
            if rental.status != RentalStatus::Active {
                return Err(AllocationError::InvalidState {
                    entity: "rental",
                    id: rental_id.0,
                    actual: rental.status.label(),
                    expected: RentalStatus::Active.label(),
                });
            }

            let rental = RentalLedger::terminate(&mut tables.rentals, rental_id)?;
            StallRegistry::set_occupancy(&mut tables.stalls, rental.stall_id, Occupancy::Available)?;
            let stall = StallRegistry::get(&tables.stalls, rental.stall_id)?;
            Ok(ReleaseReceipt { rental, stall })
        });

        match &result {
            Ok(receipt) => info!(
                rental_id = %rental_id,
                stall_id = %receipt.stall.id,
                "rental terminated and stall released"
            ),
            Err(err) => warn!(
                rental_id = %rental_id,
                kind = err.kind(),
                error = %err,
                "rental release rolled back"
            ),
        }
        result
    }
}
