//! Billing period calculation
//!
//! Pure functions mapping a utility's billing-cycle length and a calendar
//! month onto canonical periods. Independent of any one connection; the
//! engine calls these to label bills and to bucket readings.
//!
//! Supported cycle lengths are 1 (monthly), 2 (bi-monthly), and 3
//! (quarterly). Anything else is a configuration error, never a silent
//! default.

use gridbill_common::{GenerationError, GridbillError, Result};
use serde::{Deserialize, Serialize};

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const MONTH_ABBREV: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// One canonical billing period within a year
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    /// Display label (e.g., "January" or "Jan - Mar")
    pub label: String,
    /// First calendar month of the period (1-12)
    pub start_month: u32,
}

fn check_cycle(cycle_months: u32) -> Result<()> {
    match cycle_months {
        1 | 2 | 3 => Ok(()),
        other => Err(GridbillError::Generation(
            GenerationError::InvalidBillingCycle(other),
        )),
    }
}

fn check_month(month: u32) -> Result<()> {
    if (1..=12).contains(&month) {
        Ok(())
    } else {
        Err(GridbillError::Config(format!(
            "calendar month must be 1-12, got {}",
            month
        )))
    }
}

fn label_for(cycle_months: u32, start_month: u32) -> String {
    match cycle_months {
        1 => MONTH_NAMES[start_month as usize - 1].to_string(),
        n => {
            let end_month = start_month + n - 1;
            format!(
                "{} - {}",
                MONTH_ABBREV[start_month as usize - 1],
                MONTH_ABBREV[end_month as usize - 1]
            )
        }
    }
}

/// All billing periods of a year for the given cycle length
///
/// Monthly cycles yield 12 periods, bi-monthly 6 (starting at the odd
/// months), quarterly 4 (starting at 1, 4, 7, 10).
pub fn periods_for(cycle_months: u32) -> Result<Vec<BillingPeriod>> {
    check_cycle(cycle_months)?;
    let periods = (1..=12u32)
        .step_by(cycle_months as usize)
        .map(|start_month| BillingPeriod {
            label: label_for(cycle_months, start_month),
            start_month,
        })
        .collect();
    Ok(periods)
}

/// Starting month of the period containing the given calendar month
pub fn current_period_start(cycle_months: u32, month: u32) -> Result<u32> {
    check_cycle(cycle_months)?;
    check_month(month)?;
    let start = match cycle_months {
        1 => month,
        2 => {
            if month % 2 == 1 {
                month
            } else {
                month - 1
            }
        }
        _ => (month - 1) / 3 * 3 + 1,
    };
    Ok(start)
}

/// Display label for the period containing the given month
///
/// The month is normalized to its period start first, so any month of a
/// bi-monthly or quarterly period yields the same label.
pub fn period_label(cycle_months: u32, month: u32, year: i32) -> Result<String> {
    let start_month = current_period_start(cycle_months, month)?;
    Ok(format!("{} {}", label_for(cycle_months, start_month), year))
}
