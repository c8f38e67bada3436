use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use super::domain::{AllocationError, NewStall, Occupancy, Stall};
use super::service::AllocationService;
use super::store::MarketStore;

#[derive(Debug)]
pub enum SeedError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, reason: String },
    Registration(AllocationError),
}

impl std::fmt::Display for SeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedError::Io(err) => write!(f, "failed to read stall seed file: {}", err),
            SeedError::Csv(err) => write!(f, "invalid stall seed CSV: {}", err),
            SeedError::InvalidRow { line, reason } => {
                write!(f, "stall seed line {}: {}", line, reason)
            }
            SeedError::Registration(err) => write!(f, "could not register seeded stall: {}", err),
        }
    }
}

impl std::error::Error for SeedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SeedError::Io(err) => Some(err),
            SeedError::Csv(err) => Some(err),
            SeedError::InvalidRow { .. } => None,
            SeedError::Registration(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for SeedError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for SeedError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<AllocationError> for SeedError {
    fn from(err: AllocationError) -> Self {
        Self::Registration(err)
    }
}

/// Loads the stall catalogue from CSV with the columns
/// `stall_no,name,type_id,rent_price,status` (`type_id` and `status` may be blank).
pub struct StallSeedImporter;

impl StallSeedImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<NewStall>, SeedError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<NewStall>, SeedError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let mut stalls = Vec::new();

        for record in csv_reader.records() {
            let record = record?;
            let line = record.position().map_or(0, |position| position.line());
            let row: StallRow = record.deserialize(Some(&headers))?;
            stalls.push(row.into_new_stall(line)?);
        }

        Ok(stalls)
    }

    /// Register every stall; stops at the first rejected row.
    pub fn load<S>(
        service: &AllocationService<S>,
        stalls: Vec<NewStall>,
    ) -> Result<Vec<Stall>, SeedError>
    where
        S: MarketStore + 'static,
    {
        stalls
            .into_iter()
            .map(|stall| service.register_stall(stall).map_err(SeedError::from))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct StallRow {
    stall_no: String,
    name: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    type_id: Option<String>,
    rent_price: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    status: Option<String>,
}

impl StallRow {
    fn into_new_stall(self, line: u64) -> Result<NewStall, SeedError> {
        let invalid = |reason: String| SeedError::InvalidRow { line, reason };

        let rent_price = Decimal::from_str(&self.rent_price)
            .map_err(|err| invalid(format!("rent_price '{}' ({err})", self.rent_price)))?;
        let type_id = self
            .type_id
            .as_deref()
            .map(str::parse::<u64>)
            .transpose()
            .map_err(|err| invalid(format!("type_id ({err})")))?;
        let occupancy = match self.status.as_deref() {
            None => Occupancy::Available,
            Some(raw) => {
                Occupancy::parse(raw).ok_or_else(|| invalid(format!("unknown status '{raw}'")))?
            }
        };
        if occupancy == Occupancy::Occupied {
            return Err(invalid(
                "stalls cannot be seeded as occupied without a rental".to_string(),
            ));
        }

        Ok(NewStall {
            stall_no: self.stall_no,
            name: self.name,
            type_id,
            rent_price,
            occupancy,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
