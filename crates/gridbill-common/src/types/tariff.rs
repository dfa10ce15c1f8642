//! Tariff plans - the rate configuration that turns consumption into money
//!
//! Plans are effective-dated: the engine must resolve the plan effective at
//! the reading's date for the connection's utility type, never "the latest".

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A consumption slab bound and the rate it carries
///
/// `upto_units = None` marks the open-ended top slab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffSlab {
    /// Inclusive upper bound in units, None = unbounded
    pub upto_units: Option<Decimal>,
    /// Rate applied when total consumption lands in this slab
    pub rate_per_unit: Decimal,
}

/// Rate and charge configuration for a utility type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TariffPlan {
    /// Unique identifier
    pub id: Uuid,
    /// Utility type this plan prices
    pub utility_type_id: Uuid,
    /// Display name (e.g., "Domestic LT-1 2024")
    pub name: String,
    /// Flat rate per unit, used when no slab matches
    pub rate_per_unit: Decimal,
    /// Fixed charge per bill
    pub fixed_charges: Decimal,
    /// Tax percentage applied to energy + fixed charges
    pub tax_percentage: Decimal,
    /// Flat late-payment penalty per overdue occurrence
    pub late_payment_penalty: Decimal,
    /// Optional slab bounds, sorted by ascending bound (open-ended last)
    pub slabs: Vec<TariffSlab>,
    /// First day the plan is effective
    pub effective_from: NaiveDate,
    /// Last day the plan is effective, None = still current
    pub effective_to: Option<NaiveDate>,
}

impl TariffPlan {
    pub fn new(
        utility_type_id: Uuid,
        name: impl Into<String>,
        rate_per_unit: Decimal,
        fixed_charges: Decimal,
        tax_percentage: Decimal,
        late_payment_penalty: Decimal,
        effective_from: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            utility_type_id,
            name: name.into(),
            rate_per_unit,
            fixed_charges,
            tax_percentage,
            late_payment_penalty,
            slabs: Vec::new(),
            effective_from,
            effective_to: None,
        }
    }

    /// Close the plan's effective window
    pub fn with_effective_to(mut self, effective_to: NaiveDate) -> Self {
        self.effective_to = Some(effective_to);
        self
    }

    /// Add a consumption slab, keeping the slab list sorted by bound
    pub fn with_slab(mut self, upto_units: Option<Decimal>, rate_per_unit: Decimal) -> Self {
        self.slabs.push(TariffSlab {
            upto_units,
            rate_per_unit,
        });
        // Bounded slabs ascending, open-ended slab last
        self.slabs.sort_by(|a, b| match (a.upto_units, b.upto_units) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        self
    }

    /// Whether the plan is effective on the given date
    pub fn is_effective_at(&self, date: NaiveDate) -> bool {
        date >= self.effective_from
            && self.effective_to.map_or(true, |to| date <= to)
    }

    /// The rate applied to the given total consumption
    ///
    /// Slab-rate pricing: the whole consumption is priced at the rate of the
    /// first slab whose bound covers it. With no slabs configured the flat
    /// `rate_per_unit` applies.
    pub fn rate_for(&self, units: Decimal) -> Decimal {
        for slab in &self.slabs {
            match slab.upto_units {
                Some(bound) if units <= bound => return slab.rate_per_unit,
                None => return slab.rate_per_unit,
                _ => continue,
            }
        }
        self.rate_per_unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn plan() -> TariffPlan {
        TariffPlan::new(
            Uuid::new_v4(),
            "Test Plan",
            dec!(5),
            dec!(50),
            dec!(10),
            dec!(25),
            date(2024, 1, 1),
        )
    }

    #[test]
    fn test_effective_window() {
        let open = plan();
        assert!(!open.is_effective_at(date(2023, 12, 31)));
        assert!(open.is_effective_at(date(2024, 1, 1)));
        assert!(open.is_effective_at(date(2030, 6, 15)));

        let closed = plan().with_effective_to(date(2024, 6, 30));
        assert!(closed.is_effective_at(date(2024, 6, 30)));
        assert!(!closed.is_effective_at(date(2024, 7, 1)));
    }

    #[test]
    fn test_flat_rate_without_slabs() {
        let p = plan();
        assert_eq!(p.rate_for(dec!(0)), dec!(5));
        assert_eq!(p.rate_for(dec!(1000)), dec!(5));
    }

    #[test]
    fn test_slab_rate_selection() {
        let p = plan()
            .with_slab(None, dec!(8))
            .with_slab(Some(dec!(100)), dec!(4))
            .with_slab(Some(dec!(300)), dec!(6));

        // Sorted: <=100 @ 4, <=300 @ 6, open @ 8
        assert_eq!(p.rate_for(dec!(50)), dec!(4));
        assert_eq!(p.rate_for(dec!(100)), dec!(4));
        assert_eq!(p.rate_for(dec!(101)), dec!(6));
        assert_eq!(p.rate_for(dec!(500)), dec!(8));
    }
}
