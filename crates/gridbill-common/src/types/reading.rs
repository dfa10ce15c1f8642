//! Meter readings - the unit of billing eligibility
//!
//! A reading is created by a staff action and mutated exactly once
//! afterwards: the engine flips `is_billed` when a bill consumes it.
//! A billed reading is never deleted.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GenerationError, GridbillError, Result};

/// A recorded meter reading for one connection and billing period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterReading {
    /// Unique identifier
    pub id: Uuid,
    /// Connection the reading was taken from
    pub connection_id: Uuid,
    /// Meter value at the previous reading
    pub previous_reading: Decimal,
    /// Meter value at this reading
    pub current_reading: Decimal,
    /// Date the meter was read
    pub reading_date: NaiveDate,
    /// Billing month the reading belongs to (1-12)
    pub billing_month: u32,
    /// Billing year the reading belongs to
    pub billing_year: i32,
    /// Whether the value was estimated rather than read off the meter
    pub is_estimated: bool,
    /// Whether a bill has consumed this reading
    pub is_billed: bool,
    /// Timestamp the reading was recorded
    pub recorded_at: DateTime<Utc>,
}

impl MeterReading {
    /// Create a new unbilled reading
    pub fn new(
        connection_id: Uuid,
        previous_reading: Decimal,
        current_reading: Decimal,
        reading_date: NaiveDate,
        billing_month: u32,
        billing_year: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            connection_id,
            previous_reading,
            current_reading,
            reading_date,
            billing_month,
            billing_year,
            is_estimated: false,
            is_billed: false,
            recorded_at: Utc::now(),
        }
    }

    /// Mark the reading as estimated
    pub fn estimated(mut self) -> Self {
        self.is_estimated = true;
        self
    }

    /// Units consumed between the two meter values
    pub fn units_consumed(&self) -> Decimal {
        self.current_reading - self.previous_reading
    }

    /// Validate the reading
    ///
    /// The meter is cumulative, so `current_reading` can never fall below
    /// `previous_reading`.
    pub fn validate(&self) -> Result<()> {
        if self.current_reading < self.previous_reading {
            return Err(GridbillError::Generation(GenerationError::InvalidReading {
                previous: self.previous_reading,
                current: self.current_reading,
            }));
        }
        if !(1..=12).contains(&self.billing_month) {
            return Err(GridbillError::Config(format!(
                "billing_month must be 1-12, got {}",
                self.billing_month
            )));
        }
        Ok(())
    }
}
