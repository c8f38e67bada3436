use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::store::StoreError;

/// Identifier wrapper for stalls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StallId(pub u64);

/// Identifier wrapper for lease applications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub u64);

/// Identifier wrapper for rental records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RentalId(pub u64);

/// Identifier issued by the external credential store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for StallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RentalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller identity handed over by the authentication boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

/// Occupancy state of a stall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Occupancy {
    Available,
    Occupied,
    Maintenance,
}

impl Occupancy {
    pub const fn label(self) -> &'static str {
        match self {
            Occupancy::Available => "available",
            Occupancy::Occupied => "occupied",
            Occupancy::Maintenance => "maintenance",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "available" => Some(Self::Available),
            "occupied" => Some(Self::Occupied),
            "maintenance" => Some(Self::Maintenance),
            _ => None,
        }
    }
}

/// Lifecycle of a lease application. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Cancelled => "cancelled",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, ApplicationStatus::Pending)
    }
}

/// Outcome an administrator may record through [`ApplicationLedger::decide`](super::ApplicationLedger::decide).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    Approved,
    Rejected,
}

impl From<ReviewOutcome> for ApplicationStatus {
    fn from(value: ReviewOutcome) -> Self {
        match value {
            ReviewOutcome::Approved => ApplicationStatus::Approved,
            ReviewOutcome::Rejected => ApplicationStatus::Rejected,
        }
    }
}

/// Decision submitted to the allocation coordinator by a reviewing administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RentalStatus {
    Active,
    Expired,
    Terminated,
}

impl RentalStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RentalStatus::Active => "active",
            RentalStatus::Expired => "expired",
            RentalStatus::Terminated => "terminated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

/// Inclusive lease period requested by an applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AllocationError> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), AllocationError> {
        if self.start > self.end {
            return Err(AllocationError::InvalidArgument(format!(
                "lease start {} is after lease end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    /// Whole calendar months elapsed from `start` to `end`.
    ///
    /// A month only counts once the end day-of-month reaches the start day-of-month,
    /// so 2026-01-31 to 2026-02-28 is zero months.
    pub fn whole_months(&self) -> u32 {
        let mut months = (self.end.year() - self.start.year()) * 12 + self.end.month() as i32
            - self.start.month() as i32;
        if months > 0 && self.end.day() < self.start.day() {
            months -= 1;
        }
        months.max(0) as u32
    }
}

/// Free-form business details captured on the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessInfo {
    pub business_type: String,
    #[serde(default)]
    pub business_license: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stall {
    pub id: StallId,
    pub stall_no: String,
    pub name: String,
    pub type_id: Option<u64>,
    pub rent_price: Decimal,
    pub occupancy: Occupancy,
}

/// Administrative payload for registering a stall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStall {
    pub stall_no: String,
    pub name: String,
    #[serde(default)]
    pub type_id: Option<u64>,
    pub rent_price: Decimal,
    #[serde(default = "default_occupancy")]
    pub occupancy: Occupancy,
}

fn default_occupancy() -> Occupancy {
    Occupancy::Available
}

/// Price and occupancy view consumed by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallLookup {
    pub stall_id: StallId,
    pub rent_price: Decimal,
    pub occupancy: Occupancy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub reference: String,
    pub requester: UserId,
    pub stall_id: StallId,
    pub period: DateRange,
    pub business: BusinessInfo,
    pub status: ApplicationStatus,
    pub review_opinion: Option<String>,
    pub reviewer: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub submitted_at: DateTime<Utc>,
}

/// Body of a submission; the requester comes from the caller's principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRequest {
    pub stall_id: StallId,
    pub period: DateRange,
    pub business: BusinessInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rental {
    pub id: RentalId,
    pub application_id: ApplicationId,
    pub requester: UserId,
    pub stall_id: StallId,
    pub period: DateRange,
    pub rent_amount: Decimal,
    pub deposit: Decimal,
    pub payment_status: PaymentStatus,
    pub status: RentalStatus,
    pub opened_at: DateTime<Utc>,
}

/// Optional application filters; every populated field must match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationFilter {
    #[serde(default)]
    pub requester_id: Option<UserId>,
    #[serde(default)]
    pub stall_id: Option<StallId>,
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
}

impl ApplicationFilter {
    pub fn matches(&self, application: &Application) -> bool {
        self.requester_id
            .map_or(true, |requester| application.requester == requester)
            && self
                .stall_id
                .map_or(true, |stall| application.stall_id == stall)
            && self.status.map_or(true, |status| application.status == status)
    }
}

/// Optional rental filters; every populated field must match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalFilter {
    #[serde(default)]
    pub requester_id: Option<UserId>,
    #[serde(default)]
    pub stall_id: Option<StallId>,
    #[serde(default)]
    pub status: Option<RentalStatus>,
}

impl RentalFilter {
    pub fn matches(&self, rental: &Rental) -> bool {
        self.requester_id
            .map_or(true, |requester| rental.requester == requester)
            && self.stall_id.map_or(true, |stall| rental.stall_id == stall)
            && self.status.map_or(true, |status| rental.status == status)
    }
}

/// Failure taxonomy shared by the ledgers and the coordinator.
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{entity} {id} is {actual}, expected {expected}")]
    InvalidState {
        entity: &'static str,
        id: u64,
        actual: &'static str,
        expected: &'static str,
    },
    #[error("stall {stall_id} is already leased under rental {rental_id}")]
    Conflict { stall_id: StallId, rental_id: RentalId },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },
    #[error(transparent)]
    Infrastructure(#[from] StoreError),
}

impl AllocationError {
    pub fn stall_not_found(id: StallId) -> Self {
        Self::NotFound {
            entity: "stall",
            id: id.0,
        }
    }

    pub fn application_not_found(id: ApplicationId) -> Self {
        Self::NotFound {
            entity: "application",
            id: id.0,
        }
    }

    pub fn rental_not_found(id: RentalId) -> Self {
        Self::NotFound {
            entity: "rental",
            id: id.0,
        }
    }

    /// Stable machine-readable label used in API payloads.
    pub const fn kind(&self) -> &'static str {
        match self {
            AllocationError::InvalidArgument(_) => "invalid_argument",
            AllocationError::InvalidState { .. } => "invalid_state",
            AllocationError::Conflict { .. } => "conflict",
            AllocationError::NotFound { .. } => "not_found",
            AllocationError::Infrastructure(_) => "infrastructure",
        }
    }
}
