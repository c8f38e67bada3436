//! Stall lease applications, rentals, and occupancy.
//!
//! [`ApplicationLedger`], [`RentalLedger`], and [`StallRegistry`] each own one table of
//! [`MarketTables`]. [`AllocationCoordinator`] sequences the workflows that span tables
//! inside a single [`MarketStore::transaction`], and [`AllocationService`] is the facade
//! the HTTP router and the service binary talk to.

pub mod applications;
pub mod coordinator;
pub mod domain;
pub mod registry;
pub mod rentals;
pub mod router;
pub mod seed;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use applications::{ApplicationLedger, ApplicationTable};
pub use coordinator::{AllocationCoordinator, Clock, ReleaseReceipt, ReviewReceipt, SystemClock};
pub use domain::{
    AllocationError, Application, ApplicationFilter, ApplicationId, ApplicationRequest,
    ApplicationStatus, BusinessInfo, DateRange, NewStall, Occupancy, PaymentStatus, Principal,
    Rental, RentalFilter, RentalId, RentalStatus, ReviewDecision, ReviewOutcome, Role, Stall,
    StallId, StallLookup, UserId,
};
pub use registry::{StallRegistry, StallTable};
pub use rentals::{RentalLedger, RentalTable};
pub use router::allocation_router;
pub use seed::{SeedError, StallSeedImporter};
pub use service::AllocationService;
pub use store::{InMemoryMarketStore, MarketStore, MarketTables, StoreError};
