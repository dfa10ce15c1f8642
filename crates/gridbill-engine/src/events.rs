//! Billing event notifications
//!
//! Downstream collaborators (notification dispatch, reporting) subscribe to
//! the engine's broadcast channel. Delivery is best-effort: a lagging or
//! absent subscriber never blocks generation.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Events emitted by the billing engine
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BillingEvent {
    /// A bill was generated and committed
    BillGenerated {
        bill_id: Uuid,
        bill_number: String,
        connection_id: Uuid,
        consumer_id: Uuid,
        total_amount: Decimal,
    },
    /// A payment was applied to a bill
    PaymentRecorded {
        bill_id: Uuid,
        amount: Decimal,
        outstanding_balance: Decimal,
    },
}
