//! Bulk bill generation for a billing period
//!
//! Readings are grouped by connection, processed in reading-date order
//! within a connection (the penalty and carry-forward chains depend on it),
//! and fanned out concurrently across connections. Every reading's outcome
//! lands in the report; one reading's failure never aborts the batch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use gridbill_common::{MeterReading, Result};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::generator::BillingEngine;
use crate::store::UnbilledFilter;

/// Cooperative cancellation flag for a bulk run
///
/// Checked before each reading; already-committed bills are never undone by
/// a cancel.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the batch
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-reading outcome of a bulk run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    /// A bill was generated and committed
    Generated {
        bill_id: Uuid,
        bill_number: String,
        total_amount: rust_decimal::Decimal,
    },
    /// The reading was skipped; the reason is the generation error text
    Skipped { reason: String },
}

/// One reading's entry in the bulk report
#[derive(Debug, Clone, Serialize)]
pub struct BulkOutcome {
    pub reading_id: Uuid,
    pub connection_id: Uuid,
    pub outcome: Outcome,
}

/// Result of a bulk generation run
#[derive(Debug, Clone, Serialize)]
pub struct BulkReport {
    pub billing_month: u32,
    pub billing_year: i32,
    /// Every selected reading's outcome, no silent omissions
    pub outcomes: Vec<BulkOutcome>,
    pub generated: usize,
    pub skipped: usize,
    /// Whether the run was cancelled before draining the batch
    pub cancelled: bool,
}

impl BillingEngine {
    /// Generate bills for every unbilled reading in a billing period
    ///
    /// Safe to re-run: readings billed by a prior run lose the claim race
    /// and surface as skipped, never as duplicate bills.
    #[instrument(skip(self, cancel))]
    pub async fn generate_bulk(
        self: Arc<Self>,
        billing_month: u32,
        billing_year: i32,
        cancel: &CancelHandle,
    ) -> Result<BulkReport> {
        let filter = UnbilledFilter::period(billing_month, billing_year);
        let readings = self.unbilled(&filter).await?;
        info!(
            billing_month,
            billing_year,
            readings = readings.len(),
            "Starting bulk generation"
        );

        // Group by connection; within a connection readings stay in
        // reading-date order (list_unbilled returns them sorted)
        let mut by_connection: HashMap<Uuid, Vec<MeterReading>> = HashMap::new();
        for reading in readings {
            by_connection
                .entry(reading.connection_id)
                .or_default()
                .push(reading);
        }

        let tasks: Vec<_> = by_connection
            .into_values()
            .map(|chain| {
                let engine = Arc::clone(&self);
                let cancel = cancel.clone();
                tokio::spawn(async move { engine.process_connection_chain(chain, cancel).await })
            })
            .collect();

        let mut outcomes = Vec::new();
        for task in join_all(tasks).await {
            match task {
                Ok(chunk) => outcomes.extend(chunk),
                Err(err) => warn!(error = %err, "Bulk generation task panicked"),
            }
        }
        outcomes.sort_by_key(|o| (o.connection_id, o.reading_id));

        let generated = outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Generated { .. }))
            .count();
        let skipped = outcomes.len() - generated;
        let cancelled = cancel.is_cancelled();
        info!(generated, skipped, cancelled, "Bulk generation finished");

        Ok(BulkReport {
            billing_month,
            billing_year,
            outcomes,
            generated,
            skipped,
            cancelled,
        })
    }

    /// Process one connection's readings sequentially
    async fn process_connection_chain(
        &self,
        chain: Vec<MeterReading>,
        cancel: CancelHandle,
    ) -> Vec<BulkOutcome> {
        let mut outcomes = Vec::with_capacity(chain.len());
        for reading in chain {
            if cancel.is_cancelled() {
                outcomes.push(BulkOutcome {
                    reading_id: reading.id,
                    connection_id: reading.connection_id,
                    outcome: Outcome::Skipped {
                        reason: "batch cancelled".into(),
                    },
                });
                continue;
            }
            let outcome = match self.generate(reading.id).await {
                Ok(bill) => Outcome::Generated {
                    bill_id: bill.id,
                    bill_number: bill.bill_number,
                    total_amount: bill.total_amount,
                },
                Err(err) => Outcome::Skipped {
                    reason: err.to_string(),
                },
            };
            outcomes.push(BulkOutcome {
                reading_id: reading.id,
                connection_id: reading.connection_id,
                outcome,
            });
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::{InMemoryReferenceProvider, ReferenceProvider};
    use crate::store::{BillStore, InMemoryBillStore, InMemoryReadingStore, ReadingStore};
    use crate::BillingConfig;
    use chrono::NaiveDate;
    use gridbill_common::{Connection, Consumer, MeterReading, TariffPlan, UtilityKind, UtilityType};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    struct Fixture {
        engine: Arc<BillingEngine>,
        reference: Arc<InMemoryReferenceProvider>,
        electricity: UtilityType,
        consumer: Consumer,
    }

    fn fixture() -> Fixture {
        let readings = Arc::new(InMemoryReadingStore::new());
        let bills = Arc::new(InMemoryBillStore::new());
        let reference = Arc::new(InMemoryReferenceProvider::new());

        let consumer = reference.register_consumer(Consumer::new(
            "Bulk Test",
            "1 Grid Street",
            "bulk@example.com",
            "555-0100",
        ));
        let electricity = reference.register_utility_type(UtilityType::new(
            UtilityKind::Electricity,
            "Domestic Electricity",
            1,
        ));
        reference.register_tariff(TariffPlan::new(
            electricity.id,
            "Domestic 2024",
            dec!(5),
            dec!(50),
            dec!(10),
            dec!(25),
            date(2024, 1, 1),
        ));

        let engine = Arc::new(BillingEngine::new(
            BillingConfig::default(),
            readings as Arc<dyn ReadingStore>,
            bills as Arc<dyn BillStore>,
            reference.clone() as Arc<dyn ReferenceProvider>,
        ));

        Fixture {
            engine,
            reference,
            electricity,
            consumer,
        }
    }

    async fn seed_connection_with_reading(fx: &Fixture, utility_type_id: Uuid) -> Connection {
        let connection = fx.reference.register_connection(Connection::new(
            fx.consumer.id,
            utility_type_id,
            format!("MTR-{}", &Uuid::new_v4().to_string()[..8]),
            date(2024, 1, 1),
        ));
        fx.engine
            .record_reading(MeterReading::new(
                connection.id,
                dec!(100),
                dec!(150),
                date(2024, 6, 28),
                6,
                2024,
            ))
            .await
            .unwrap();
        connection
    }

    #[tokio::test]
    async fn test_bulk_generates_all_eligible_readings() {
        let fx = fixture();
        for _ in 0..3 {
            seed_connection_with_reading(&fx, fx.electricity.id).await;
        }

        let report = fx
            .engine
            .clone()
            .generate_bulk(6, 2024, &CancelHandle::new())
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.generated, 3);
        assert_eq!(report.skipped, 0);
        assert!(!report.cancelled);
    }

    #[tokio::test]
    async fn test_bulk_reports_tariff_gap_without_aborting() {
        let fx = fixture();
        seed_connection_with_reading(&fx, fx.electricity.id).await;
        seed_connection_with_reading(&fx, fx.electricity.id).await;

        // Third connection is on a utility type with no tariff at all
        let untariffed = fx.reference.register_utility_type(UtilityType::new(
            UtilityKind::Gas,
            "Gas (no tariff yet)",
            1,
        ));
        seed_connection_with_reading(&fx, untariffed.id).await;

        let report = fx
            .engine
            .clone()
            .generate_bulk(6, 2024, &CancelHandle::new())
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.generated, 2);
        assert_eq!(report.skipped, 1);

        let reasons: Vec<&str> = report
            .outcomes
            .iter()
            .filter_map(|o| match &o.outcome {
                Outcome::Skipped { reason } => Some(reason.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("No tariff plan active"));
    }

    #[tokio::test]
    async fn test_bulk_rerun_is_idempotent() {
        let fx = fixture();
        seed_connection_with_reading(&fx, fx.electricity.id).await;
        seed_connection_with_reading(&fx, fx.electricity.id).await;

        let first = fx
            .engine
            .clone()
            .generate_bulk(6, 2024, &CancelHandle::new())
            .await
            .unwrap();
        assert_eq!(first.generated, 2);

        // Re-run: everything is already billed, nothing is selected
        let second = fx
            .engine
            .clone()
            .generate_bulk(6, 2024, &CancelHandle::new())
            .await
            .unwrap();
        assert_eq!(second.outcomes.len(), 0);
        assert_eq!(second.generated, 0);
    }

    #[tokio::test]
    async fn test_bulk_same_connection_chain_in_date_order() {
        let fx = fixture();
        let connection = fx.reference.register_connection(Connection::new(
            fx.consumer.id,
            fx.electricity.id,
            "MTR-CHAIN",
            date(2024, 1, 1),
        ));

        // Two readings for the same connection and period, out of insert
        // order; the earlier one must be billed first
        fx.engine
            .record_reading(MeterReading::new(
                connection.id,
                dec!(150),
                dec!(210),
                date(2024, 6, 28),
                6,
                2024,
            ))
            .await
            .unwrap();
        fx.engine
            .record_reading(MeterReading::new(
                connection.id,
                dec!(100),
                dec!(150),
                date(2024, 6, 14),
                6,
                2024,
            ))
            .await
            .unwrap();

        let report = fx
            .engine
            .clone()
            .generate_bulk(6, 2024, &CancelHandle::new())
            .await
            .unwrap();

        // Both target the same (connection, month, year): the first in date
        // order wins, the second loses the period-uniqueness race and is
        // reported, not silently dropped
        assert_eq!(report.generated, 1);
        assert_eq!(report.skipped, 1);
        let generated: Vec<_> = report
            .outcomes
            .iter()
            .filter(|o| matches!(o.outcome, Outcome::Generated { .. }))
            .collect();
        assert_eq!(generated.len(), 1);

        let bill = fx
            .engine
            .bills_for_connection(connection.id)
            .await
            .unwrap()
            .pop()
            .unwrap();
        assert_eq!(bill.previous_reading, dec!(100));
        assert_eq!(bill.current_reading, dec!(150));
    }

    #[tokio::test]
    async fn test_bulk_cancellation_reports_partial_progress() {
        let fx = fixture();
        for _ in 0..4 {
            seed_connection_with_reading(&fx, fx.electricity.id).await;
        }

        // Cancel before the run starts: everything is enumerated as skipped
        let cancel = CancelHandle::new();
        cancel.cancel();
        let report = fx
            .engine
            .clone()
            .generate_bulk(6, 2024, &cancel)
            .await
            .unwrap();

        assert!(report.cancelled);
        assert_eq!(report.generated, 0);
        assert_eq!(report.outcomes.len(), 4);
        for outcome in &report.outcomes {
            match &outcome.outcome {
                Outcome::Skipped { reason } => assert_eq!(reason, "batch cancelled"),
                other => panic!("unexpected outcome: {:?}", other),
            }
        }

        // A fresh run afterwards picks the readings back up
        let report = fx
            .engine
            .clone()
            .generate_bulk(6, 2024, &CancelHandle::new())
            .await
            .unwrap();
        assert_eq!(report.generated, 4);
    }
}
