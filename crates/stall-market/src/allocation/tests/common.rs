use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::allocation::{
    AllocationService, ApplicationRequest, BusinessInfo, Clock, DateRange, InMemoryMarketStore,
    MarketStore, MarketTables, NewStall, Occupancy, Stall, StoreError, UserId,
};
use crate::config::LedgerConfig;

pub(super) const APPLICANT: UserId = UserId(7);
pub(super) const OTHER_APPLICANT: UserId = UserId(8);
pub(super) const REVIEWER: UserId = UserId(1);

pub(super) struct FixedClock(pub(super) DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub(super) fn submitted_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// Six whole months starting next month.
pub(super) fn lease_period() -> DateRange {
    DateRange {
        start: date(2026, 4, 1),
        end: date(2026, 10, 1),
    }
}

pub(super) fn business() -> BusinessInfo {
    BusinessInfo {
        business_type: "Fresh produce".to_string(),
        business_license: Some("LIC-2026-118".to_string()),
        reason: Some("Expanding from the weekend market".to_string()),
    }
}

pub(super) fn request(stall: &Stall) -> ApplicationRequest {
    ApplicationRequest {
        stall_id: stall.id,
        period: lease_period(),
        business: business(),
    }
}

pub(super) fn new_stall(stall_no: &str, rent_price: Decimal, occupancy: Occupancy) -> NewStall {
    NewStall {
        stall_no: stall_no.to_string(),
        name: format!("Stall {stall_no}"),
        type_id: Some(1),
        rent_price,
        occupancy,
    }
}

/// Registered catalogue shared by the module tests.
pub(super) struct Catalogue {
    pub(super) fruit: Stall,
    pub(super) snacks: Stall,
    pub(super) closed: Stall,
}

pub(super) fn build_service() -> (
    Arc<AllocationService<InMemoryMarketStore>>,
    Arc<InMemoryMarketStore>,
    Catalogue,
) {
    let store = Arc::new(InMemoryMarketStore::new());
    let service = AllocationService::with_clock(
        store.clone(),
        LedgerConfig::new("mkt").expect("valid prefix"),
        Arc::new(FixedClock(submitted_at())),
    );
    let fruit = service
        .register_stall(new_stall("A-01", dec!(1500.00), Occupancy::Available))
        .expect("stall registered");
    let snacks = service
        .register_stall(new_stall("A-02", dec!(980.50), Occupancy::Available))
        .expect("stall registered");
    let closed = service
        .register_stall(new_stall("M-01", dec!(1200.00), Occupancy::Maintenance))
        .expect("stall registered");

    (
        Arc::new(service),
        store,
        Catalogue {
            fruit,
            snacks,
            closed,
        },
    )
}

/// Store whose backend is offline for every operation.
pub(super) struct UnavailableStore;

impl MarketStore for UnavailableStore {
    fn transaction<T, E, F>(&self, _work: F) -> Result<T, E>
    where
        F: FnOnce(&mut MarketTables) -> Result<T, E>,
        E: From<StoreError>,
    {
        Err(StoreError::Unavailable("database offline".to_string()).into())
    }

    fn snapshot(&self) -> Result<Arc<MarketTables>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn unavailable_service() -> Arc<AllocationService<UnavailableStore>> {
    Arc::new(AllocationService::with_clock(
        Arc::new(UnavailableStore),
        LedgerConfig::default(),
        Arc::new(FixedClock(submitted_at())),
    ))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
