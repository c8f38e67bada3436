use std::sync::{Arc, Mutex, PoisonError, RwLock};

use super::applications::ApplicationTable;
use super::registry::StallTable;
use super::rentals::RentalTable;

/// Every table touched by the allocation workflows, committed as one unit.
#[derive(Debug, Clone, Default)]
pub struct MarketTables {
    pub stalls: StallTable,
    pub applications: ApplicationTable,
    pub rentals: RentalTable,
}

/// Persistence boundary supporting atomic multi-row commit and rollback.
pub trait MarketStore: Send + Sync {
    /// Run `work` as a single unit of work.
    ///
    /// Implementations serialize units of work and publish the mutated tables only when
    /// `work` returns `Ok`; an `Err` leaves the committed state untouched.
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut MarketTables) -> Result<T, E>,
        E: From<StoreError>;

    /// Last committed state. Never observes a unit of work in progress.
    fn snapshot(&self) -> Result<Arc<MarketTables>, StoreError>;
}

/// Storage-layer failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("store lock poisoned: {0}")]
    Poisoned(&'static str),
    #[error("storage constraint violated: {0}")]
    Constraint(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Process-local store: a writer lock serializes units of work, each of which runs
/// against a private copy that replaces the published tables on success.
#[derive(Debug, Default)]
pub struct InMemoryMarketStore {
    writer: Mutex<()>,
    published: RwLock<Arc<MarketTables>>,
}

impl InMemoryMarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(tables: MarketTables) -> Self {
        Self {
            writer: Mutex::new(()),
            published: RwLock::new(Arc::new(tables)),
        }
    }
}

impl MarketStore for InMemoryMarketStore {
    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut MarketTables) -> Result<T, E>,
        E: From<StoreError>,
    {
        // The writer guard protects no data; a panic inside `work` never reached the swap below.
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let mut working = MarketTables::clone(&*self.snapshot()?);
        let value = work(&mut working)?;

        let mut published = self
            .published
            .write()
            .map_err(|_| StoreError::Poisoned("published tables"))?;
        *published = Arc::new(working);
        Ok(value)
    }

    fn snapshot(&self) -> Result<Arc<MarketTables>, StoreError> {
        let published = self
            .published
            .read()
            .map_err(|_| StoreError::Poisoned("published tables"))?;
        Ok(Arc::clone(&published))
    }
}
