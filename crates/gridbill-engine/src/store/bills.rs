//! In-memory bill store backed by DashMap
//!
//! Uniqueness of (connection, billing_month, billing_year) is enforced with
//! a secondary index whose entry lock makes the occupied-check-then-insert
//! atomic. Payment status is re-derived against the clock on every read.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use gridbill_common::{Bill, GenerationError, GridbillError, Result};
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use super::BillStore;

type PeriodKey = (Uuid, u32, i32);

/// Concurrent in-memory bill store
#[derive(Default)]
pub struct InMemoryBillStore {
    bills: DashMap<Uuid, Bill>,
    /// (connection_id, billing_month, billing_year) -> bill id
    period_index: DashMap<PeriodKey, Uuid>,
    sequence: AtomicU64,
}

impl InMemoryBillStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bills (for tests and health output)
    pub fn len(&self) -> usize {
        self.bills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bills.is_empty()
    }
}

#[async_trait]
impl BillStore for InMemoryBillStore {
    async fn insert(&self, bill: Bill) -> Result<Bill> {
        let key = (bill.connection_id, bill.billing_month, bill.billing_year);
        match self.period_index.entry(key) {
            Entry::Occupied(_) => {
                return Err(GridbillError::Generation(
                    GenerationError::ConcurrentGenerationConflict(bill.id),
                ));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(bill.id);
            }
        }
        debug!(bill_id = %bill.id, bill_number = %bill.bill_number, "Stored bill");
        self.bills.insert(bill.id, bill.clone());
        Ok(bill)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Bill>> {
        let today = Utc::now().date_naive();
        Ok(self.bills.get(&id).map(|entry| {
            let mut bill = entry.clone();
            bill.refresh_status(today);
            bill
        }))
    }

    async fn list_for_connection(&self, connection_id: Uuid) -> Result<Vec<Bill>> {
        let today = Utc::now().date_naive();
        let mut bills: Vec<Bill> = self
            .bills
            .iter()
            .filter(|entry| entry.value().connection_id == connection_id)
            .map(|entry| {
                let mut bill = entry.value().clone();
                bill.refresh_status(today);
                bill
            })
            .collect();
        bills.sort_by_key(|b| (b.billing_year, b.billing_month, b.bill_date));
        Ok(bills)
    }

    async fn latest_for_connection(&self, connection_id: Uuid) -> Result<Option<Bill>> {
        Ok(self
            .list_for_connection(connection_id)
            .await?
            .into_iter()
            .last())
    }

    async fn record_payment(&self, id: Uuid, amount: Decimal) -> Result<Bill> {
        let today = Utc::now().date_naive();
        let mut entry = self
            .bills
            .get_mut(&id)
            .ok_or(GridbillError::Generation(GenerationError::BillNotFound(id)))?;
        entry.record_payment(amount, today)?;
        Ok(entry.clone())
    }

    async fn next_bill_number(&self, billing_month: u32, billing_year: i32) -> Result<String> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(format!(
            "BILL-{:04}{:02}-{:08}",
            billing_year, billing_month, seq
        ))
    }
}
