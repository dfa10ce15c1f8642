//! # GridBill Common
//!
//! Shared types and errors for the GridBill utility billing platform.
//!
//! ## Core Types
//!
//! - [`Consumer`] / [`Connection`] / [`UtilityType`]: registry reference data
//! - [`TariffPlan`]: effective-dated rate configuration with optional slabs
//! - [`MeterReading`]: the unit of billing eligibility (`is_billed` gate)
//! - [`Bill`]: the priced, auditable output of the generation engine
//! - [`BillingCycle`]: operational record bounding bulk generation
//!
//! ## Charge Formula
//!
//! ```text
//! energy = units * rate        tax = (energy + fixed) * tax% / 100
//! total  = energy + fixed + tax + penalty + previous_balance
//! ```

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{GenerationError, GridbillError, Result};
pub use types::{
    bill::{round_money, Bill, BillStatus},
    consumer::{Connection, ConnectionStatus, Consumer, UtilityKind, UtilityType},
    cycle::{BillingCycle, CycleStatus},
    reading::MeterReading,
    tariff::{TariffPlan, TariffSlab},
};

/// GridBill version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Billing cycle lengths the period calculator supports
pub const SUPPORTED_CYCLE_MONTHS: [u32; 3] = [1, 2, 3];

/// Default due-date offset when no billing cycle governs a bill
pub const DEFAULT_DUE_DAYS: i64 = 15;

/// Default cap on late-payment penalty occurrences
pub const DEFAULT_MAX_PENALTY_COUNT: u32 = 3;
