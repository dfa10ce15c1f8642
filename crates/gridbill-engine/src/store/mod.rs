//! Storage seams for readings and bills
//!
//! The meter reading store and the bill store are the only shared mutable
//! resources in the engine. Both are expressed as async traits so a durable
//! backend can replace the in-memory implementations without touching the
//! generation logic; storage calls are the engine's only suspension points.

mod bills;
mod readings;

pub use bills::InMemoryBillStore;
pub use readings::InMemoryReadingStore;

use async_trait::async_trait;
use gridbill_common::{Bill, MeterReading, Result};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Filter for unbilled-reading selection
#[derive(Debug, Clone, Copy, Default)]
pub struct UnbilledFilter {
    pub billing_month: Option<u32>,
    pub billing_year: Option<i32>,
    pub connection_id: Option<Uuid>,
}

impl UnbilledFilter {
    /// Scope to a billing period
    pub fn period(billing_month: u32, billing_year: i32) -> Self {
        Self {
            billing_month: Some(billing_month),
            billing_year: Some(billing_year),
            connection_id: None,
        }
    }

    /// Scope to a single connection
    pub fn connection(mut self, connection_id: Uuid) -> Self {
        self.connection_id = Some(connection_id);
        self
    }

    fn matches(&self, reading: &MeterReading) -> bool {
        self.billing_month.map_or(true, |m| reading.billing_month == m)
            && self.billing_year.map_or(true, |y| reading.billing_year == y)
            && self
                .connection_id
                .map_or(true, |c| reading.connection_id == c)
    }
}

/// Store of meter readings - the unit of billing eligibility
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Persist a new reading after validating it
    async fn insert(&self, reading: MeterReading) -> Result<MeterReading>;

    /// Fetch a reading by id
    async fn get(&self, id: Uuid) -> Result<Option<MeterReading>>;

    /// All readings with `is_billed = false`, optionally scoped
    ///
    /// This is the sole gate against double billing: a reading listed here
    /// can be consumed by at most one successful `claim`.
    async fn list_unbilled(&self, filter: &UnbilledFilter) -> Result<Vec<MeterReading>>;

    /// Atomically flip `is_billed` false -> true
    ///
    /// Serialized per reading: of two concurrent claims exactly one
    /// succeeds and the loser observes `AlreadyBilled`.
    async fn claim(&self, id: Uuid) -> Result<MeterReading>;

    /// Compensating rollback of a claim whose bill write failed
    async fn release(&self, id: Uuid) -> Result<()>;
}

/// Durable record of generated bills and their payment state
#[async_trait]
pub trait BillStore: Send + Sync {
    /// Persist a bill, enforcing one bill per (connection, month, year)
    ///
    /// A second insert for the same period loses the race and observes
    /// `ConcurrentGenerationConflict`.
    async fn insert(&self, bill: Bill) -> Result<Bill>;

    /// Fetch a bill, payment status re-derived as of now
    async fn get(&self, id: Uuid) -> Result<Option<Bill>>;

    /// All bills for a connection, oldest period first
    async fn list_for_connection(&self, connection_id: Uuid) -> Result<Vec<Bill>>;

    /// The connection's most recent bill, if any
    ///
    /// The penalty and carry-forward lookups go through this query so bulk
    /// generation stays stateless.
    async fn latest_for_connection(&self, connection_id: Uuid) -> Result<Option<Bill>>;

    /// Apply a payment and return the updated bill
    async fn record_payment(&self, id: Uuid, amount: Decimal) -> Result<Bill>;

    /// Allocate the next unique bill number for a period
    async fn next_bill_number(&self, billing_month: u32, billing_year: i32) -> Result<String>;
}
