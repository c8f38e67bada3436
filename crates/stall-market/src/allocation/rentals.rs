use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::domain::{
    AllocationError, ApplicationId, DateRange, PaymentStatus, Rental, RentalFilter, RentalId,
    RentalStatus, StallId, UserId,
};
use super::store::StoreError;

/// Rental rows plus the storage-level index enforcing one active rental per stall.
#[derive(Debug, Clone, Default)]
pub struct RentalTable {
    rows: BTreeMap<RentalId, Rental>,
    active_by_stall: BTreeMap<StallId, RentalId>,
    next_id: u64,
}

impl RentalTable {
    fn insert(&mut self, mut rental: Rental) -> Result<Rental, StoreError> {
        if rental.status == RentalStatus::Active {
            if let Some(existing) = self.active_by_stall.get(&rental.stall_id) {
                return Err(StoreError::Constraint(format!(
                    "stall {} already has active rental {existing}",
                    rental.stall_id
                )));
            }
        }

        self.next_id += 1;
        rental.id = RentalId(self.next_id);
        if rental.status == RentalStatus::Active {
            self.active_by_stall.insert(rental.stall_id, rental.id);
        }
        self.rows.insert(rental.id, rental.clone());
        Ok(rental)
    }

    fn row_mut(&mut self, rental_id: RentalId) -> Result<&mut Rental, AllocationError> {
        self.rows
            .get_mut(&rental_id)
            .ok_or_else(|| AllocationError::rental_not_found(rental_id))
    }
}

/// Owner of rental records and rent computation.
pub struct RentalLedger;

impl RentalLedger {
    /// Months billed for a lease: whole calendar months, never less than one.
    pub fn billable_months(period: &DateRange) -> u32 {
        period.whole_months().max(1)
    }

    /// Open an `active`, `unpaid` rental priced at `monthly_rent` per billable month with one
    /// month held as deposit.
    pub fn open(
        table: &mut RentalTable,
        application_id: ApplicationId,
        requester: UserId,
        stall_id: StallId,
        period: DateRange,
        monthly_rent: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Rental, AllocationError> {
        if let Some(rental_id) = table.active_by_stall.get(&stall_id) {
            return Err(AllocationError::Conflict {
                stall_id,
                rental_id: *rental_id,
            });
        }
        period.validate()?;
        if monthly_rent.is_sign_negative() {
            return Err(AllocationError::InvalidArgument(format!(
                "monthly rent {monthly_rent} for stall {stall_id} is negative"
            )));
        }

        let months = Self::billable_months(&period);
        let rent_amount = monthly_rent
            .checked_mul(Decimal::from(months))
            .ok_or_else(|| {
                AllocationError::InvalidArgument(format!(
                    "rent of {monthly_rent} over {months} months for stall {stall_id} overflows"
                ))
            })?
            .round_dp(2);
        let rental = Rental {
            id: RentalId(0),
            application_id,
            requester,
            stall_id,
            period,
            rent_amount,
            deposit: monthly_rent.round_dp(2),
            payment_status: PaymentStatus::Unpaid,
            status: RentalStatus::Active,
            opened_at: now,
        };
        Ok(table.insert(rental)?)
    }

    pub fn set_payment_status(
        table: &mut RentalTable,
        rental_id: RentalId,
        payment_status: PaymentStatus,
    ) -> Result<Rental, AllocationError> {
        let row = table.row_mut(rental_id)?;
        row.payment_status = payment_status;
        Ok(row.clone())
    }

    pub fn mark_paid(table: &mut RentalTable, rental_id: RentalId) -> Result<Rental, AllocationError> {
        Self::set_payment_status(table, rental_id, PaymentStatus::Paid)
    }

    /// `active -> terminated`. Terminating twice is an error, not a no-op.
    pub fn terminate(table: &mut RentalTable, rental_id: RentalId) -> Result<Rental, AllocationError> {
        let row = table.row_mut(rental_id)?;
        if row.status != RentalStatus::Active {
            return Err(AllocationError::InvalidState {
                entity: "rental",
                id: rental_id.0,
                actual: row.status.label(),
                expected: RentalStatus::Active.label(),
            });
        }
        row.status = RentalStatus::Terminated;
        let rental = row.clone();
        table.active_by_stall.remove(&rental.stall_id);
        Ok(rental)
    }

    pub fn get(table: &RentalTable, rental_id: RentalId) -> Result<Rental, AllocationError> {
        table
            .rows
            .get(&rental_id)
            .cloned()
            .ok_or_else(|| AllocationError::rental_not_found(rental_id))
    }

    pub fn active_for_stall(table: &RentalTable, stall_id: StallId) -> Option<Rental> {
        table
            .active_by_stall
            .get(&stall_id)
            .and_then(|rental_id| table.rows.get(rental_id))
            .cloned()
    }

    /// Matching rentals, newest first.
    pub fn list(table: &RentalTable, filter: &RentalFilter) -> Vec<Rental> {
        table
            .rows
            .values()
            .rev()
            .filter(|rental| filter.matches(rental))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    fn range(start: &str, end: &str) -> DateRange {
        DateRange {
            start: NaiveDate::parse_from_str(start, "%Y-%m-%d").expect("valid start"),
            end: NaiveDate::parse_from_str(end, "%Y-%m-%d").expect("valid end"),
        }
    }

    fn open(table: &mut RentalTable, stall: u64, period: DateRange) -> Result<Rental, AllocationError> {
        RentalLedger::open(
            table,
            ApplicationId(stall * 10),
            UserId(5),
            StallId(stall),
            period,
            dec!(1500.00),
            now(),
        )
    }

    #[test]
    fn six_month_lease_bills_six_months_with_one_month_deposit() {
        let mut table = RentalTable::default();
        let rental = open(&mut table, 1, range("2026-01-15", "2026-07-15")).expect("opened");

        assert_eq!(rental.rent_amount, dec!(9000.00));
        assert_eq!(rental.deposit, dec!(1500.00));
        assert_eq!(rental.payment_status, PaymentStatus::Unpaid);
        assert_eq!(rental.status, RentalStatus::Active);
    }

    #[test]
    fn short_lease_is_billed_one_month() {
        let mut table = RentalTable::default();
        let rental = open(&mut table, 1, range("2026-02-01", "2026-02-20")).expect("opened");
        assert_eq!(rental.rent_amount, dec!(1500.00));
    }

    #[test]
    fn partial_months_are_floored() {
        assert_eq!(
            RentalLedger::billable_months(&range("2026-01-15", "2026-07-30")),
            6
        );
        assert_eq!(
            RentalLedger::billable_months(&range("2026-01-15", "2026-07-14")),
            5
        );
        assert_eq!(
            RentalLedger::billable_months(&range("2026-01-31", "2026-02-28")),
            1
        );
        assert_eq!(
            RentalLedger::billable_months(&range("2025-11-10", "2026-11-10")),
            12
        );
    }

    #[test]
    fn rent_overflow_is_invalid_argument() {
        let mut table = RentalTable::default();
        let result = RentalLedger::open(
            &mut table,
            ApplicationId(10),
            UserId(5),
            StallId(1),
            range("2026-01-15", "2026-07-15"),
            Decimal::MAX,
            now(),
        );

        match result {
            Err(AllocationError::InvalidArgument(message)) => assert!(message.contains("overflows")),
            other => panic!("expected overflow rejection, got {other:?}"),
        }
        assert!(RentalLedger::active_for_stall(&table, StallId(1)).is_none());
        open(&mut table, 1, range("2026-01-15", "2026-07-15")).expect("stall is still free");
    }

    #[test]
    fn second_active_rental_for_stall_conflicts() {
        let mut table = RentalTable::default();
        let first = open(&mut table, 3, range("2026-01-01", "2026-04-01")).expect("opened");

        match open(&mut table, 3, range("2026-02-01", "2026-05-01")) {
            Err(AllocationError::Conflict {
                stall_id,
                rental_id,
            }) => {
                assert_eq!(stall_id, StallId(3));
                assert_eq!(rental_id, first.id);
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        open(&mut table, 4, range("2026-02-01", "2026-05-01")).expect("other stall is free");
    }

    #[test]
    fn storage_index_rejects_duplicate_active_rows() {
        let mut table = RentalTable::default();
        let first = open(&mut table, 8, range("2026-01-01", "2026-04-01")).expect("opened");
        let mut duplicate = first.clone();
        duplicate.application_id = ApplicationId(99);

        assert!(matches!(
            table.insert(duplicate),
            Err(StoreError::Constraint(_))
        ));
    }

    #[test]
    fn terminate_twice_is_invalid_state() {
        let mut table = RentalTable::default();
        let rental = open(&mut table, 2, range("2026-01-01", "2026-03-01")).expect("opened");

        let terminated = RentalLedger::terminate(&mut table, rental.id).expect("active rental");
        assert_eq!(terminated.status, RentalStatus::Terminated);
        assert!(RentalLedger::active_for_stall(&table, StallId(2)).is_none());

        match RentalLedger::terminate(&mut table, rental.id) {
            Err(AllocationError::InvalidState { actual, .. }) => assert_eq!(actual, "terminated"),
            other => panic!("expected invalid state, got {other:?}"),
        }

        open(&mut table, 2, range("2026-03-01", "2026-06-01")).expect("stall can be leased again");
    }

    #[test]
    fn payment_status_updates() {
        let mut table = RentalTable::default();
        let rental = open(&mut table, 6, range("2026-01-01", "2026-02-01")).expect("opened");

        let paid = RentalLedger::mark_paid(&mut table, rental.id).expect("rental exists");
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        let reverted =
            RentalLedger::set_payment_status(&mut table, rental.id, PaymentStatus::Unpaid)
                .expect("rental exists");
        assert_eq!(reverted.payment_status, PaymentStatus::Unpaid);
        assert!(matches!(
            RentalLedger::mark_paid(&mut table, RentalId(77)),
            Err(AllocationError::NotFound { .. })
        ));
    }

    #[test]
    fn list_applies_filters() {
        let mut table = RentalTable::default();
        let first = open(&mut table, 1, range("2026-01-01", "2026-02-01")).expect("opened");
        open(&mut table, 2, range("2026-01-01", "2026-02-01")).expect("opened");
        RentalLedger::terminate(&mut table, first.id).expect("terminated");

        let active = RentalFilter {
            status: Some(RentalStatus::Active),
            ..RentalFilter::default()
        };
        let listed = RentalLedger::list(&table, &active);
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].stall_id, StallId(2));

        let by_stall = RentalFilter {
            stall_id: Some(StallId(1)),
            requester_id: Some(UserId(5)),
            status: None,
        };
        assert_eq!(RentalLedger::list(&table, &by_stall)[0].id, first.id);
    }
}
