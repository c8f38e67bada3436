//! Stall allocation core for a marketplace leasing service.
//!
//! The [`allocation`] module owns the application, rental, and stall occupancy
//! workflows. Configuration, telemetry, and the top-level error type follow the
//! same layout as the HTTP service that embeds this crate.

pub mod allocation;
pub mod config;
pub mod error;
pub mod telemetry;
