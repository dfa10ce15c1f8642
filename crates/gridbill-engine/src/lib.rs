//! # GridBill Engine
//!
//! Bill generation for the GridBill utility billing platform: converts a
//! connection's unbilled meter readings into priced, auditable bills.
//!
//! ## Charge Formula
//!
//! ```text
//! energy = units * rate        tax = (energy + fixed) * tax% / 100
//! total  = energy + fixed + tax + penalty + previous_balance
//! ```
//!
//! The engine owns eligibility (the `is_billed` claim), the charge
//! breakdown, the penalty lifecycle, and the atomic commit of bill +
//! reading flip. Reference data (tariffs, connections, cycles) is read-only
//! to it; payments are applied by the external payment component through
//! [`store::BillStore::record_payment`].

pub mod engine;
pub mod events;
pub mod period;
pub mod reference;
pub mod store;

pub use engine::{BillingEngine, BulkOutcome, BulkReport, CancelHandle, Outcome};
pub use events::BillingEvent;
pub use reference::{InMemoryReferenceProvider, ReferenceProvider};
pub use store::{BillStore, InMemoryBillStore, InMemoryReadingStore, ReadingStore, UnbilledFilter};

use gridbill_common::{DEFAULT_DUE_DAYS, DEFAULT_MAX_PENALTY_COUNT};

/// Billing engine configuration
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Due-date offset in days when no billing cycle governs a bill
    pub due_days: i64,
    /// Cap on late-payment penalty occurrences per bill
    pub max_penalty_count: u32,
    /// Carry the prior bill's outstanding balance onto new bills
    pub carry_forward_balance: bool,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            due_days: DEFAULT_DUE_DAYS,
            max_penalty_count: DEFAULT_MAX_PENALTY_COUNT,
            carry_forward_balance: false,
        }
    }
}

impl BillingConfig {
    /// Load configuration from GRIDBILL_* environment variables
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(val) = std::env::var("GRIDBILL_DUE_DAYS") {
            if let Ok(v) = val.parse() {
                cfg.due_days = v;
            }
        }
        if let Ok(val) = std::env::var("GRIDBILL_MAX_PENALTY_COUNT") {
            if let Ok(v) = val.parse() {
                cfg.max_penalty_count = v;
            }
        }
        if let Ok(val) = std::env::var("GRIDBILL_CARRY_FORWARD") {
            if let Ok(v) = val.parse() {
                cfg.carry_forward_balance = v;
            }
        }

        cfg
    }
}
