//! Operational billing-cycle records
//!
//! A cycle record bounds which unbilled readings bulk generation may touch
//! and sources the due date stamped on the bills it produces. It is passed
//! into generation calls explicitly - there is no module-level "current
//! cycle" singleton.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a billing cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    /// Accepting readings, generation not started
    Open,
    /// Bulk generation running
    InProgress,
    /// Generation finished, cycle archived
    Closed,
}

/// One billing cycle for a calendar period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingCycle {
    /// Starting month of the period (1-12)
    pub month: u32,
    /// Year of the period
    pub year: i32,
    /// First day of the period
    pub start_date: NaiveDate,
    /// Last day of the period
    pub end_date: NaiveDate,
    /// Date bills for this cycle are generated
    pub bill_generation_date: NaiveDate,
    /// Due date applied to bills generated in this cycle
    pub due_date: NaiveDate,
    /// Lifecycle state
    pub status: CycleStatus,
}

impl BillingCycle {
    /// Whether the given date falls inside the cycle's period
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_date() {
        let cycle = BillingCycle {
            month: 6,
            year: 2024,
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
            bill_generation_date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, 7, 16).unwrap(),
            status: CycleStatus::Open,
        };

        assert!(cycle.contains_date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()));
        assert!(cycle.contains_date(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()));
        assert!(!cycle.contains_date(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()));
    }
}
