//! Consumer and connection registry types
//!
//! Reference data owned by the registry side of the platform. The billing
//! engine reads these but never mutates them.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of metered utility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtilityKind {
    Electricity,
    Water,
    Gas,
}

/// A utility type and its billing-cycle configuration
///
/// `billing_cycle_months` groups calendar months into one billing period:
/// 1 = monthly, 2 = bi-monthly, 3 = quarterly. Any other value is a
/// configuration error and must be rejected, not defaulted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtilityType {
    /// Unique identifier
    pub id: Uuid,
    /// Utility kind
    pub kind: UtilityKind,
    /// Display name (e.g., "Domestic Electricity")
    pub name: String,
    /// Months per billing period (1, 2, or 3)
    pub billing_cycle_months: u32,
}

impl UtilityType {
    pub fn new(kind: UtilityKind, name: impl Into<String>, billing_cycle_months: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.into(),
            billing_cycle_months,
        }
    }
}

/// Registered consumer account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Consumer {
    /// Unique identifier
    pub id: Uuid,
    /// Full name
    pub name: String,
    /// Service address
    pub address: String,
    /// Contact email
    pub email: String,
    /// Contact phone
    pub phone: String,
    /// Registration timestamp
    pub registered_at: DateTime<Utc>,
}

impl Consumer {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            address: address.into(),
            email: email.into(),
            phone: phone.into(),
            registered_at: Utc::now(),
        }
    }
}

/// Service connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Active,
    Disconnected,
}

/// A metered service connection
///
/// Links a consumer's physical meter to a utility type. The meter number is
/// stamped onto every bill generated for the connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Unique identifier
    pub id: Uuid,
    /// Owning consumer
    pub consumer_id: Uuid,
    /// Utility type supplying this connection
    pub utility_type_id: Uuid,
    /// Physical meter serial number
    pub meter_number: String,
    /// Lifecycle state
    pub status: ConnectionStatus,
    /// Date the connection went live
    pub connected_on: NaiveDate,
}

impl Connection {
    pub fn new(
        consumer_id: Uuid,
        utility_type_id: Uuid,
        meter_number: impl Into<String>,
        connected_on: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            consumer_id,
            utility_type_id,
            meter_number: meter_number.into(),
            status: ConnectionStatus::Active,
            connected_on,
        }
    }

    /// Whether the connection can receive new readings and bills
    pub fn is_active(&self) -> bool {
        self.status == ConnectionStatus::Active
    }
}
