use crate::infra::{build_market_service, parse_date, MarketService};
use chrono::{Datelike, Months, NaiveDate, Utc};
use clap::Args;
use stall_market::allocation::{
    AllocationError, ApplicationId, ApplicationRequest, BusinessInfo, DateRange, ReviewDecision,
    Stall, UserId,
};
use stall_market::config::LedgerConfig;
use stall_market::error::AppError;
use std::path::PathBuf;

const REVIEWER: UserId = UserId(1);
const APPLICANT: UserId = UserId(101);
const COMPETITOR: UserId = UserId(102);

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Stall catalogue CSV. Defaults to the built-in sample market.
    #[arg(long)]
    pub(crate) stalls: Option<PathBuf>,
    /// Lease start date (YYYY-MM-DD). Defaults to the first day of next month.
    #[arg(long, value_parser = parse_date)]
    pub(crate) start: Option<NaiveDate>,
    /// Lease length in whole months.
    #[arg(long, default_value_t = 6)]
    pub(crate) months: u32,
    /// Reference code prefix for the demo applications.
    #[arg(long, default_value = "DEMO")]
    pub(crate) prefix: String,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        stalls,
        start,
        months,
        prefix,
    } = args;

    let ledger = LedgerConfig::new(prefix)?;
    let (service, _) = build_market_service(ledger, stalls.as_deref(), true)?;
    let period = lease_period(start, months)?;

    println!("Stall market allocation demo");
    let available = service.available_stalls()?;
    print_stalls(&available);
    let Some(stall) = available.first() else {
        println!("No stalls are available; nothing to lease.");
        return Ok(());
    };

    println!(
        "\nLease period {} to {} ({} months requested)",
        period.start, period.end, months
    );
    let application = service.submit(APPLICANT, demo_request(stall, period, "Fresh produce"))?;
    let competing = service.submit(COMPETITOR, demo_request(stall, period, "Coffee cart"))?;
    println!(
        "- {} submitted by user {} for stall {}",
        application.reference, APPLICANT, stall.stall_no
    );
    println!(
        "- {} submitted by user {} for the same stall",
        competing.reference, COMPETITOR
    );

    let receipt = service.review(
        application.id,
        ReviewDecision::Approved,
        Some("Meets the produce quota".to_string()),
        REVIEWER,
    )?;
    println!(
        "\nReview of {} -> {}",
        receipt.application.reference,
        receipt.application.status.label()
    );
    if let Some(rental) = &receipt.rental {
        println!(
            "  Rental {} opened: rent {} | deposit {} | payment {:?}",
            rental.id, rental.rent_amount, rental.deposit, rental.payment_status
        );
    }

    report_competing_review(&service, &competing.reference, competing.id)?;

    if let Some(rental) = receipt.rental {
        let paid = service.mark_paid(rental.id)?;
        println!("\nRental {} payment recorded: {:?}", paid.id, paid.payment_status);
        let released = service.terminate(rental.id)?;
        println!(
            "Rental {} {} -> stall {} is {}",
            released.rental.id,
            released.rental.status.label(),
            released.stall.stall_no,
            released.stall.occupancy.label()
        );
    }

    println!();
    print_stalls(&service.available_stalls()?);
    Ok(())
}

fn report_competing_review(
    service: &MarketService,
    reference: &str,
    application_id: ApplicationId,
) -> Result<(), AppError> {
    match service.review(application_id, ReviewDecision::Approved, None, REVIEWER) {
        Ok(receipt) => println!(
            "Review of {} -> {}",
            reference,
            receipt.application.status.label()
        ),
        Err(err @ AllocationError::Conflict { .. }) => {
            println!("Review of {} -> refused: {}", reference, err);
            let rejected = service.review(
                application_id,
                ReviewDecision::Rejected,
                Some("Stall already leased".to_string()),
                REVIEWER,
            )?;
            println!(
                "  {} closed as {}",
                reference,
                rejected.application.status.label()
            );
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

fn lease_period(start: Option<NaiveDate>, months: u32) -> Result<DateRange, AppError> {
    let invalid = |message: String| AppError::from(AllocationError::InvalidArgument(message));
    let start = match start {
        Some(start) => start,
        None => {
            let today = Utc::now().date_naive();
            today
                .with_day(1)
                .and_then(|first| first.checked_add_months(Months::new(1)))
                .ok_or_else(|| invalid(format!("no month follows {today}")))?
        }
    };
    let end = start
        .checked_add_months(Months::new(months.max(1)))
        .ok_or_else(|| invalid(format!("lease of {months} months from {start} overflows")))?;
    Ok(DateRange::new(start, end)?)
}

fn demo_request(stall: &Stall, period: DateRange, business_type: &str) -> ApplicationRequest {
    ApplicationRequest {
        stall_id: stall.id,
        period,
        business: BusinessInfo {
            business_type: business_type.to_string(),
            business_license: None,
            reason: Some("Demo walkthrough".to_string()),
        },
    }
}

fn print_stalls(stalls: &[Stall]) {
    println!("Available stalls ({}):", stalls.len());
    for stall in stalls {
        println!(
            "  - {} {} | {} per month",
            stall.stall_no, stall.name, stall.rent_price
        );
    }
}
