use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::domain::{
    AllocationError, Application, ApplicationFilter, ApplicationId, ApplicationStatus,
    BusinessInfo, DateRange, ReviewOutcome, StallId, UserId,
};
use crate::config::LedgerConfig;

/// Application rows keyed by id. Rows are never removed.
#[derive(Debug, Clone, Default)]
pub struct ApplicationTable {
    rows: BTreeMap<ApplicationId, Application>,
    next_id: u64,
}

/// Owner of the application lifecycle: `pending -> approved | rejected | cancelled`.
#[derive(Debug, Clone, Default)]
pub struct ApplicationLedger {
    config: LedgerConfig,
}

impl ApplicationLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self { config }
    }

    /// Record a new `pending` application.
    ///
    /// Stall availability is not checked here; competing applications are settled at review.
    pub fn submit(
        &self,
        table: &mut ApplicationTable,
        requester: UserId,
        stall_id: StallId,
        period: DateRange,
        business: BusinessInfo,
        now: DateTime<Utc>,
    ) -> Result<Application, AllocationError> {
        period.validate()?;
        let today = now.date_naive();
        if period.start < today {
            return Err(AllocationError::InvalidArgument(format!(
                "lease start {} is before the submission date {today}",
                period.start
            )));
        }
        let business = normalize_business(business)?;

        table.next_id += 1;
        let id = ApplicationId(table.next_id);
        let application = Application {
            id,
            reference: format!(
                "{}-{}-{:06}",
                self.config.reference_prefix(),
                now.format("%Y%m%d"),
                id.0
            ),
            requester,
            stall_id,
            period,
            business,
            status: ApplicationStatus::Pending,
            review_opinion: None,
            reviewer: None,
            reviewed_at: None,
            submitted_at: now,
        };
        table.rows.insert(id, application.clone());
        Ok(application)
    }

    /// Requester-initiated cancellation. Returns `false` without writing when the caller does
    /// not own the application or it has already left `pending`.
    pub fn cancel(
        &self,
        table: &mut ApplicationTable,
        application_id: ApplicationId,
        requester: UserId,
    ) -> Result<bool, AllocationError> {
        let row = pending_row(table, application_id)?;
        match row {
            Some(row) if row.requester == requester => {
                row.status = ApplicationStatus::Cancelled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Record a review outcome, stamping the reviewer and review time.
    pub fn decide(
        &self,
        table: &mut ApplicationTable,
        application_id: ApplicationId,
        outcome: ReviewOutcome,
        opinion: Option<String>,
        reviewer: UserId,
        now: DateTime<Utc>,
    ) -> Result<Application, AllocationError> {
        let row = require_pending(table, application_id)?;
        row.status = outcome.into();
        row.review_opinion = opinion;
        row.reviewer = Some(reviewer);
        row.reviewed_at = Some(now);
        Ok(row.clone())
    }

    /// Administrative cancellation. Unlike [`decide`](Self::decide) no reviewer is stamped.
    pub fn withdraw(
        &self,
        table: &mut ApplicationTable,
        application_id: ApplicationId,
        opinion: Option<String>,
    ) -> Result<Application, AllocationError> {
        let row = require_pending(table, application_id)?;
        row.status = ApplicationStatus::Cancelled;
        row.review_opinion = opinion;
        Ok(row.clone())
    }

    pub fn get(
        &self,
        table: &ApplicationTable,
        application_id: ApplicationId,
    ) -> Result<Application, AllocationError> {
        table
            .rows
            .get(&application_id)
            .cloned()
            .ok_or_else(|| AllocationError::application_not_found(application_id))
    }

    /// Matching applications, newest first.
    pub fn list(&self, table: &ApplicationTable, filter: &ApplicationFilter) -> Vec<Application> {
        table
            .rows
            .values()
            .rev()
            .filter(|application| filter.matches(application))
            .cloned()
            .collect()
    }
}

fn normalize_business(business: BusinessInfo) -> Result<BusinessInfo, AllocationError> {
    let business_type = business.business_type.trim().to_string();
    if business_type.is_empty() {
        return Err(AllocationError::InvalidArgument(
            "business type is required".to_string(),
        ));
    }
    let non_blank = |value: Option<String>| {
        value
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    };
    Ok(BusinessInfo {
        business_type,
        business_license: non_blank(business.business_license),
        reason: non_blank(business.reason),
    })
}

fn pending_row(
    table: &mut ApplicationTable,
    application_id: ApplicationId,
) -> Result<Option<&mut Application>, AllocationError> {
    let row = table
        .rows
        .get_mut(&application_id)
        .ok_or_else(|| AllocationError::application_not_found(application_id))?;
    Ok((row.status == ApplicationStatus::Pending).then_some(row))
}

fn require_pending(
    table: &mut ApplicationTable,
    application_id: ApplicationId,
) -> Result<&mut Application, AllocationError> {
    let row = table
        .rows
        .get_mut(&application_id)
        .ok_or_else(|| AllocationError::application_not_found(application_id))?;
    if row.status.is_terminal() {
        return Err(AllocationError::InvalidState {
            entity: "application",
            id: application_id.0,
            actual: row.status.label(),
            expected: ApplicationStatus::Pending.label(),
        });
    }
    Ok(row)
}
