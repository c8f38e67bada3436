//! End-to-end allocation scenarios driven through the public service facade, including
//! approvals racing for the same stall from separate threads.

mod common {
    use std::sync::Arc;

    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use stall_market::allocation::{
        AllocationService, ApplicationRequest, BusinessInfo, Clock, DateRange,
        InMemoryMarketStore, NewStall, Occupancy, Stall, UserId,
    };
    use stall_market::config::LedgerConfig;

    pub(super) const REVIEWER: UserId = UserId(1);

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    pub(super) fn build_service() -> (
        Arc<AllocationService<InMemoryMarketStore>>,
        Arc<InMemoryMarketStore>,
        Stall,
    ) {
        let store = Arc::new(InMemoryMarketStore::new());
        let now = Utc
            .with_ymd_and_hms(2026, 1, 5, 10, 0, 0)
            .single()
            .expect("valid timestamp");
        let service = AllocationService::with_clock(
            store.clone(),
            LedgerConfig::new("STL").expect("valid prefix"),
            Arc::new(FixedClock(now)),
        );
        let stall = service
            .register_stall(NewStall {
                stall_no: "C-12".to_string(),
                name: "Corner hot food".to_string(),
                type_id: Some(3),
                rent_price: dec!(1500.00),
                occupancy: Occupancy::Available,
            })
            .expect("stall registered");
        (Arc::new(service), store, stall)
    }

    pub(super) fn request(stall: &Stall) -> ApplicationRequest {
        ApplicationRequest {
            stall_id: stall.id,
            period: DateRange {
                start: NaiveDate::from_ymd_opt(2026, 1, 15).expect("valid date"),
                end: NaiveDate::from_ymd_opt(2026, 7, 15).expect("valid date"),
            },
            business: BusinessInfo {
                business_type: "Street food".to_string(),
                business_license: None,
                reason: None,
            },
        }
    }
}

use std::sync::{Arc, Barrier};

use rust_decimal_macros::dec;

use common::*;
use stall_market::allocation::{
    AllocationError, ApplicationFilter, ApplicationStatus, MarketStore, Occupancy,
    PaymentStatus, RentalFilter, RentalLedger, RentalStatus, ReviewDecision, StallRegistry,
    UserId,
};

#[test]
fn submit_approve_and_terminate_scenario() {
    let (service, _, stall) = build_service();

    let application = service
        .submit(UserId(20), request(&stall))
        .expect("submission accepted");
    assert_eq!(application.status, ApplicationStatus::Pending);
    assert_eq!(application.reference, "STL-20260105-000001");

    let receipt = service
        .review(
            application.id,
            ReviewDecision::Approved,
            Some("Approved for the summer season".to_string()),
            REVIEWER,
        )
        .expect("approval commits");
    let rental = receipt.rental.expect("rental opened");
    assert_eq!(receipt.application.status, ApplicationStatus::Approved);
    assert_eq!(rental.rent_amount, dec!(9000.00));
    assert_eq!(rental.deposit, dec!(1500.00));
    assert_eq!(
        service.stall(stall.id).expect("present").occupancy,
        Occupancy::Occupied
    );
    assert!(service.available_stalls().expect("snapshot").is_empty());

    let paid = service.mark_paid(rental.id).expect("rental exists");
    assert_eq!(paid.payment_status, PaymentStatus::Paid);

    let released = service.terminate(rental.id).expect("termination commits");
    assert_eq!(released.rental.status, RentalStatus::Terminated);
    assert_eq!(released.stall.occupancy, Occupancy::Available);
    assert_eq!(service.available_stalls().expect("snapshot").len(), 1);
    assert!(service.active_rental(stall.id).expect("snapshot").is_none());
}

#[test]
fn concurrent_approvals_for_one_stall_allocate_it_once() {
    const CONTENDERS: u64 = 8;

    let (service, store, stall) = build_service();
    let applications: Vec<_> = (0..CONTENDERS)
        .map(|offset| {
            service
                .submit(UserId(100 + offset), request(&stall))
                .expect("submission accepted")
        })
        .collect();

    let barrier = Barrier::new(applications.len() + 1);
    let outcomes: Vec<_> = std::thread::scope(|scope| {
        let approvals: Vec<_> = applications
            .iter()
            .map(|application| {
                let service = Arc::clone(&service);
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    service.review(application.id, ReviewDecision::Approved, None, REVIEWER)
                })
            })
            .collect();

        // Readers racing the writers must never see an occupied stall without its rental.
        let observer = scope.spawn(|| {
            barrier.wait();
            for _ in 0..200 {
                let tables = store.snapshot().expect("snapshot");
                let occupancy =
                    StallRegistry::occupancy(&tables.stalls, stall.id).expect("stall present");
                let active = RentalLedger::active_for_stall(&tables.rentals, stall.id);
                assert_eq!(occupancy == Occupancy::Occupied, active.is_some());
            }
        });

        let outcomes: Vec<_> = approvals
            .into_iter()
            .map(|handle| handle.join().expect("approval thread"))
            .collect();
        observer.join().expect("observer thread");
        outcomes
    });

    let approved = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    let conflicts = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Err(AllocationError::Conflict { .. })))
        .count();
    assert_eq!(approved, 1);
    assert_eq!(conflicts, applications.len() - 1);

    let active = service
        .rentals(&RentalFilter {
            stall_id: Some(stall.id),
            status: Some(RentalStatus::Active),
            requester_id: None,
        })
        .expect("snapshot");
    assert_eq!(active.len(), 1);
    assert_eq!(
        service.stall(stall.id).expect("present").occupancy,
        Occupancy::Occupied
    );

    let statuses = service
        .applications(&ApplicationFilter {
            stall_id: Some(stall.id),
            ..ApplicationFilter::default()
        })
        .expect("snapshot");
    let approved_count = statuses
        .iter()
        .filter(|application| application.status == ApplicationStatus::Approved)
        .count();
    let pending_count = statuses
        .iter()
        .filter(|application| application.status == ApplicationStatus::Pending)
        .count();
    assert_eq!(approved_count, 1);
    assert_eq!(pending_count, applications.len() - 1);
    let winner = statuses
        .iter()
        .find(|application| application.status == ApplicationStatus::Approved)
        .expect("one winner");
    assert_eq!(active[0].requester, winner.requester);
    assert_eq!(active[0].application_id, winner.id);
}
