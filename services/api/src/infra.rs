use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use stall_market::allocation::{
    AllocationService, InMemoryMarketStore, NewStall, Occupancy, Stall, StallSeedImporter,
};
use stall_market::config::LedgerConfig;
use stall_market::error::AppError;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type MarketService = AllocationService<InMemoryMarketStore>;

/// Build the in-memory service and register its stall catalogue.
///
/// Without a seed file the sample catalogue is used when `use_sample` is set; otherwise the
/// service starts with no stalls.
pub(crate) fn build_market_service(
    ledger: LedgerConfig,
    seed: Option<&Path>,
    use_sample: bool,
) -> Result<(Arc<MarketService>, Vec<Stall>), AppError> {
    let service = AllocationService::new(Arc::new(InMemoryMarketStore::new()), ledger);
    let catalogue = match seed {
        Some(path) => StallSeedImporter::from_path(path)?,
        None if use_sample => sample_catalogue(),
        None => Vec::new(),
    };
    let stalls = StallSeedImporter::load(&service, catalogue)?;
    Ok((Arc::new(service), stalls))
}

pub(crate) fn sample_catalogue() -> Vec<NewStall> {
    let stall = |stall_no: &str, name: &str, type_id: u64, cents: i64, occupancy: Occupancy| {
        NewStall {
            stall_no: stall_no.to_string(),
            name: name.to_string(),
            type_id: Some(type_id),
            rent_price: Decimal::new(cents, 2),
            occupancy,
        }
    };
    vec![
        stall("A-01", "North gate produce", 1, 150_000, Occupancy::Available),
        stall("A-02", "North gate snacks", 1, 98_050, Occupancy::Available),
        stall("B-07", "Covered hall hot food", 2, 220_000, Occupancy::Available),
        stall("M-01", "Loading bay kiosk", 3, 120_000, Occupancy::Maintenance),
    ]
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
