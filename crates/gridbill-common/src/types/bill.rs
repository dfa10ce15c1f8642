//! Bills and their payment state
//!
//! A bill is created once per eligible meter reading and never regenerated.
//! After creation only the payment fields move, and `status` is always a
//! function of the payment state and the clock - it is re-derived on read,
//! never advanced by a scheduler.
//!
//! Charge breakdown:
//!
//! ```text
//! energy_charges = units_consumed * rate_per_unit
//! tax_amount     = (energy_charges + fixed_charges) * tax_percentage / 100
//! total_amount   = energy_charges + fixed_charges + tax_amount
//!                  + penalty_amount + previous_balance
//! ```
//!
//! Every monetary component is rounded to 2 decimals before summing, so the
//! total is an exact sum with no floating drift.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GenerationError, GridbillError, Result};

/// Round a monetary amount to 2 decimals, half away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Payment state of a bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    /// Balance outstanding, due date not yet passed
    Due,
    /// Fully paid - terminal
    Paid,
    /// Balance outstanding past the due date
    Overdue,
}

/// A generated utility bill
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    /// Unique identifier
    pub id: Uuid,
    /// Unique human-readable bill number
    pub bill_number: String,
    /// Connection billed
    pub connection_id: Uuid,
    /// Meter serial number at generation time
    pub meter_number: String,
    /// Consumer who owes the bill
    pub consumer_id: Uuid,
    /// Billing month (start month of the period, 1-12)
    pub billing_month: u32,
    /// Billing year
    pub billing_year: i32,
    /// Display label of the billing period (e.g., "Jul - Aug 2024")
    pub billing_period: String,
    /// Date the bill was generated
    pub bill_date: NaiveDate,
    /// Date payment is due
    pub due_date: NaiveDate,
    /// Meter value at the previous reading
    pub previous_reading: Decimal,
    /// Meter value at this reading
    pub current_reading: Decimal,
    /// Units consumed this period
    pub units_consumed: Decimal,
    /// Rate applied per unit
    pub rate_per_unit: Decimal,
    /// units_consumed * rate_per_unit
    pub energy_charges: Decimal,
    /// Flat charge from the tariff
    pub fixed_charges: Decimal,
    /// Tax on energy + fixed charges
    pub tax_amount: Decimal,
    /// Total late-payment penalty applied
    pub penalty_amount: Decimal,
    /// Number of overdue occurrences the penalty covers
    pub penalty_count: u32,
    /// Per-occurrence penalty from the tariff
    pub base_penalty_amount: Decimal,
    /// Outstanding balance carried forward from prior bills
    pub previous_balance: Decimal,
    /// Sum of all charge components
    pub total_amount: Decimal,
    /// Amount paid so far
    pub amount_paid: Decimal,
    /// Amount still owed, clamped to >= 0
    pub outstanding_balance: Decimal,
    /// Payment state as of the last write or read
    pub status: BillStatus,
}

impl Bill {
    /// Derive the payment state as of `today`
    ///
    /// Paid iff nothing is outstanding; Overdue iff something is outstanding
    /// past the due date; Due otherwise. Paid is terminal because the
    /// outstanding balance never increases after generation.
    pub fn derived_status(&self, today: NaiveDate) -> BillStatus {
        if self.outstanding_balance.is_zero() {
            BillStatus::Paid
        } else if today > self.due_date {
            BillStatus::Overdue
        } else {
            BillStatus::Due
        }
    }

    /// Recompute the stored status as of `today`
    pub fn refresh_status(&mut self, today: NaiveDate) {
        self.status = self.derived_status(today);
    }

    /// Whether the bill is overdue as of `today`
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.derived_status(today) == BillStatus::Overdue
    }

    /// Apply a payment against the bill
    ///
    /// Owned by the payment component; the engine only initializes the
    /// payment fields. Overpayment clamps the outstanding balance at zero.
    pub fn record_payment(&mut self, amount: Decimal, today: NaiveDate) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(GridbillError::Generation(
                GenerationError::InvalidPaymentAmount(amount),
            ));
        }
        self.amount_paid += round_money(amount);
        self.outstanding_balance = (self.total_amount - self.amount_paid).max(Decimal::ZERO);
        self.refresh_status(today);
        Ok(())
    }
}
