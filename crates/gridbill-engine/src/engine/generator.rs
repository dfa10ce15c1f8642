//! Single-bill generation
//!
//! Converts one eligible meter reading into a persisted bill. The commit is
//! all-or-nothing: the reading claim and the bill insert either both land or
//! the claim is released.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use gridbill_common::{
    round_money, Bill, BillStatus, GenerationError, GridbillError, MeterReading, Result,
    TariffPlan,
};
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::events::BillingEvent;
use crate::period;
use crate::reference::ReferenceProvider;
use crate::store::{BillStore, ReadingStore, UnbilledFilter};
use crate::BillingConfig;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Monetary charge breakdown for one reading
#[derive(Debug, Clone, PartialEq, Eq)]
struct Charges {
    rate_per_unit: Decimal,
    energy_charges: Decimal,
    fixed_charges: Decimal,
    tax_amount: Decimal,
}

/// Compute the charge breakdown for the given consumption under a tariff
///
/// Every component is rounded to 2 decimals here, so downstream sums stay
/// exact. Tax base is energy + fixed charges; penalty and carried balances
/// are never taxed.
fn charges(tariff: &TariffPlan, units: Decimal) -> Charges {
    let rate_per_unit = tariff.rate_for(units);
    let energy_charges = round_money(units * rate_per_unit);
    let fixed_charges = round_money(tariff.fixed_charges);
    let tax_amount = round_money(
        (energy_charges + fixed_charges) * tariff.tax_percentage / Decimal::from(100),
    );
    Charges {
        rate_per_unit,
        energy_charges,
        fixed_charges,
        tax_amount,
    }
}

/// The bill generation engine
///
/// Holds the two mutable stores, the read-only reference provider, and the
/// event channel. No engine-held lock ever spans more than the single
/// reading/bill pair being committed.
pub struct BillingEngine {
    pub(super) config: BillingConfig,
    pub(super) readings: Arc<dyn ReadingStore>,
    pub(super) bills: Arc<dyn BillStore>,
    pub(super) reference: Arc<dyn ReferenceProvider>,
    pub(super) events_tx: broadcast::Sender<BillingEvent>,
}

impl BillingEngine {
    pub fn new(
        config: BillingConfig,
        readings: Arc<dyn ReadingStore>,
        bills: Arc<dyn BillStore>,
        reference: Arc<dyn ReferenceProvider>,
    ) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            readings,
            bills,
            reference,
            events_tx,
        }
    }

    /// Subscribe to billing events
    pub fn subscribe(&self) -> broadcast::Receiver<BillingEvent> {
        self.events_tx.subscribe()
    }

    /// Unbilled readings matching the filter
    pub async fn unbilled(&self, filter: &UnbilledFilter) -> Result<Vec<MeterReading>> {
        self.readings.list_unbilled(filter).await
    }

    /// Record a staff-entered meter reading
    pub async fn record_reading(&self, reading: MeterReading) -> Result<MeterReading> {
        self.readings.insert(reading).await
    }

    /// Fetch a bill with its payment summary
    pub async fn bill(&self, id: Uuid) -> Result<Option<Bill>> {
        self.bills.get(id).await
    }

    /// All bills for a connection, oldest period first
    pub async fn bills_for_connection(&self, connection_id: Uuid) -> Result<Vec<Bill>> {
        self.bills.list_for_connection(connection_id).await
    }

    /// Apply a payment to a bill (the payment component's write path)
    pub async fn record_payment(&self, bill_id: Uuid, amount: Decimal) -> Result<Bill> {
        let bill = self.bills.record_payment(bill_id, amount).await?;
        let _ = self.events_tx.send(BillingEvent::PaymentRecorded {
            bill_id: bill.id,
            amount,
            outstanding_balance: bill.outstanding_balance,
        });
        Ok(bill)
    }

    /// Generate a bill from one unbilled meter reading
    #[instrument(skip(self))]
    pub async fn generate(&self, reading_id: Uuid) -> Result<Bill> {
        let reading = self
            .readings
            .get(reading_id)
            .await?
            .ok_or(GridbillError::Generation(GenerationError::ReadingNotFound(
                reading_id,
            )))?;
        if reading.is_billed {
            return Err(GridbillError::Generation(GenerationError::AlreadyBilled(
                reading_id,
            )));
        }
        reading.validate()?;

        let connection = self
            .reference
            .connection(reading.connection_id)
            .await?
            .ok_or(GridbillError::Generation(
                GenerationError::ConnectionNotFound(reading.connection_id),
            ))?;
        let utility_type = self
            .reference
            .utility_type(connection.utility_type_id)
            .await?
            .ok_or_else(|| {
                GridbillError::Config(format!(
                    "utility type {} referenced by connection {} not found",
                    connection.utility_type_id, connection.id
                ))
            })?;
        let tariff = self
            .reference
            .tariff_effective_at(connection.utility_type_id, reading.reading_date)
            .await?
            .ok_or(GridbillError::Generation(GenerationError::NoActiveTariff {
                utility_type_id: connection.utility_type_id,
                date: reading.reading_date,
            }))?;

        let billing_period = period::period_label(
            utility_type.billing_cycle_months,
            reading.billing_month,
            reading.billing_year,
        )?;

        let today = Utc::now().date_naive();
        let units = reading.units_consumed();
        let breakdown = charges(&tariff, units);

        let prior = self.bills.latest_for_connection(connection.id).await?;
        let (penalty_amount, penalty_count, base_penalty_amount) =
            self.penalty(prior.as_ref(), &tariff, today);
        let previous_balance = if self.config.carry_forward_balance {
            prior
                .as_ref()
                .map(|b| b.outstanding_balance)
                .unwrap_or(Decimal::ZERO)
        } else {
            Decimal::ZERO
        };

        let total_amount = breakdown.energy_charges
            + breakdown.fixed_charges
            + breakdown.tax_amount
            + penalty_amount
            + previous_balance;

        let due_date = self
            .due_date(reading.billing_month, reading.billing_year, today)
            .await?;
        let bill_number = self
            .bills
            .next_bill_number(reading.billing_month, reading.billing_year)
            .await?;

        let bill = Bill {
            id: Uuid::new_v4(),
            bill_number,
            connection_id: connection.id,
            meter_number: connection.meter_number.clone(),
            consumer_id: connection.consumer_id,
            billing_month: reading.billing_month,
            billing_year: reading.billing_year,
            billing_period,
            bill_date: today,
            due_date,
            previous_reading: reading.previous_reading,
            current_reading: reading.current_reading,
            units_consumed: units,
            rate_per_unit: breakdown.rate_per_unit,
            energy_charges: breakdown.energy_charges,
            fixed_charges: breakdown.fixed_charges,
            tax_amount: breakdown.tax_amount,
            penalty_amount,
            penalty_count,
            base_penalty_amount,
            previous_balance,
            total_amount,
            amount_paid: Decimal::ZERO,
            outstanding_balance: total_amount,
            status: BillStatus::Due,
        };

        // Commit: claim the reading, then write the bill. The claim is the
        // per-reading serialization point; a failed bill write releases it.
        self.readings.claim(reading.id).await?;
        let bill = match self.bills.insert(bill).await {
            Ok(bill) => bill,
            Err(err) => {
                if let Err(release_err) = self.readings.release(reading.id).await {
                    warn!(reading_id = %reading.id, error = %release_err, "Failed to release claim");
                }
                return Err(err);
            }
        };

        info!(
            bill_number = %bill.bill_number,
            connection_id = %bill.connection_id,
            total = %bill.total_amount,
            "Generated bill"
        );
        let _ = self.events_tx.send(BillingEvent::BillGenerated {
            bill_id: bill.id,
            bill_number: bill.bill_number.clone(),
            connection_id: bill.connection_id,
            consumer_id: bill.consumer_id,
            total_amount: bill.total_amount,
        });

        Ok(bill)
    }

    /// Generate a bill for a connection's unbilled reading in a period
    #[instrument(skip(self))]
    pub async fn generate_for_connection(
        &self,
        connection_id: Uuid,
        billing_month: u32,
        billing_year: i32,
    ) -> Result<Bill> {
        let filter = UnbilledFilter::period(billing_month, billing_year).connection(connection_id);
        let reading = self
            .readings
            .list_unbilled(&filter)
            .await?
            .into_iter()
            .next()
            .ok_or(GridbillError::Generation(
                GenerationError::NoUnbilledReading {
                    connection_id,
                    billing_month,
                    billing_year,
                },
            ))?;
        self.generate(reading.id).await
    }

    /// Late-payment penalty for the connection's next bill
    ///
    /// Applied when the latest prior bill is still overdue at generation
    /// time. The occurrence count continues the prior bill's chain and is
    /// capped so long-unpaid accounts never compound without bound.
    fn penalty(
        &self,
        prior: Option<&Bill>,
        tariff: &TariffPlan,
        today: NaiveDate,
    ) -> (Decimal, u32, Decimal) {
        match prior {
            Some(prior_bill) if prior_bill.is_overdue(today) => {
                let count = (prior_bill.penalty_count + 1).min(self.config.max_penalty_count);
                let base = round_money(tariff.late_payment_penalty);
                let amount = round_money(base * Decimal::from(count));
                (amount, count, base)
            }
            _ => (Decimal::ZERO, 0, Decimal::ZERO),
        }
    }

    /// Due date from the governing billing cycle, else a fixed offset
    async fn due_date(
        &self,
        billing_month: u32,
        billing_year: i32,
        bill_date: NaiveDate,
    ) -> Result<NaiveDate> {
        if let Some(cycle) = self.reference.billing_cycle(billing_month, billing_year).await? {
            return Ok(cycle.due_date);
        }
        Ok(bill_date + Duration::days(self.config.due_days))
    }
}
