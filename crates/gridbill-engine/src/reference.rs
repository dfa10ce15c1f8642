//! Read-only reference data
//!
//! Consumers, connections, utility types, tariff plans, and billing-cycle
//! records are owned by the registry side of the platform; the engine only
//! reads them. The in-memory provider doubles as the seedable fixture for
//! the gateway demo and the tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use gridbill_common::{BillingCycle, Connection, Consumer, Result, TariffPlan, UtilityType};
use uuid::Uuid;

/// Reference-data lookups the engine depends on
#[async_trait]
pub trait ReferenceProvider: Send + Sync {
    async fn consumer(&self, id: Uuid) -> Result<Option<Consumer>>;

    async fn connection(&self, id: Uuid) -> Result<Option<Connection>>;

    async fn utility_type(&self, id: Uuid) -> Result<Option<UtilityType>>;

    /// The tariff plan effective for the utility type on the given date
    ///
    /// When several plans overlap, the one with the latest effective_from
    /// wins (the most recently introduced plan supersedes).
    async fn tariff_effective_at(
        &self,
        utility_type_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<TariffPlan>>;

    /// The operational cycle record governing a billing period, if any
    async fn billing_cycle(&self, month: u32, year: i32) -> Result<Option<BillingCycle>>;
}

/// In-memory reference registry
#[derive(Default)]
pub struct InMemoryReferenceProvider {
    consumers: DashMap<Uuid, Consumer>,
    connections: DashMap<Uuid, Connection>,
    utility_types: DashMap<Uuid, UtilityType>,
    tariffs: DashMap<Uuid, TariffPlan>,
    cycles: DashMap<(u32, i32), BillingCycle>,
}

impl InMemoryReferenceProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_consumer(&self, consumer: Consumer) -> Consumer {
        self.consumers.insert(consumer.id, consumer.clone());
        consumer
    }

    pub fn register_connection(&self, connection: Connection) -> Connection {
        self.connections.insert(connection.id, connection.clone());
        connection
    }

    pub fn register_utility_type(&self, utility_type: UtilityType) -> UtilityType {
        self.utility_types.insert(utility_type.id, utility_type.clone());
        utility_type
    }

    pub fn register_tariff(&self, tariff: TariffPlan) -> TariffPlan {
        self.tariffs.insert(tariff.id, tariff.clone());
        tariff
    }

    pub fn register_cycle(&self, cycle: BillingCycle) -> BillingCycle {
        self.cycles.insert((cycle.month, cycle.year), cycle.clone());
        cycle
    }

    /// All registered connections (gateway listing)
    pub fn connections(&self) -> Vec<Connection> {
        self.connections.iter().map(|e| e.value().clone()).collect()
    }
}

#[async_trait]
impl ReferenceProvider for InMemoryReferenceProvider {
    async fn consumer(&self, id: Uuid) -> Result<Option<Consumer>> {
        Ok(self.consumers.get(&id).map(|c| c.clone()))
    }

    async fn connection(&self, id: Uuid) -> Result<Option<Connection>> {
        Ok(self.connections.get(&id).map(|c| c.clone()))
    }

    async fn utility_type(&self, id: Uuid) -> Result<Option<UtilityType>> {
        Ok(self.utility_types.get(&id).map(|u| u.clone()))
    }

    async fn tariff_effective_at(
        &self,
        utility_type_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<TariffPlan>> {
        let mut candidates: Vec<TariffPlan> = self
            .tariffs
            .iter()
            .filter(|entry| {
                entry.value().utility_type_id == utility_type_id
                    && entry.value().is_effective_at(date)
            })
            .map(|entry| entry.value().clone())
            .collect();
        candidates.sort_by_key(|t| t.effective_from);
        Ok(candidates.pop())
    }

    async fn billing_cycle(&self, month: u32, year: i32) -> Result<Option<BillingCycle>> {
        Ok(self.cycles.get(&(month, year)).map(|c| c.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridbill_common::UtilityKind;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_effective_tariff_resolution() {
        let provider = InMemoryReferenceProvider::new();
        let utility = provider.register_utility_type(UtilityType::new(
            UtilityKind::Electricity,
            "Domestic Electricity",
            1,
        ));

        let old = TariffPlan::new(
            utility.id,
            "2023 rates",
            dec!(4),
            dec!(40),
            dec!(10),
            dec!(20),
            date(2023, 1, 1),
        )
        .with_effective_to(date(2023, 12, 31));
        let current = TariffPlan::new(
            utility.id,
            "2024 rates",
            dec!(5),
            dec!(50),
            dec!(10),
            dec!(25),
            date(2024, 1, 1),
        );
        provider.register_tariff(old);
        provider.register_tariff(current);

        let resolved = provider
            .tariff_effective_at(utility.id, date(2024, 6, 15))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.name, "2024 rates");

        let historical = provider
            .tariff_effective_at(utility.id, date(2023, 6, 15))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(historical.name, "2023 rates");

        // Gap before any plan existed
        let none = provider
            .tariff_effective_at(utility.id, date(2022, 6, 15))
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_overlapping_plans_latest_wins() {
        let provider = InMemoryReferenceProvider::new();
        let utility =
            provider.register_utility_type(UtilityType::new(UtilityKind::Water, "Water", 1));

        provider.register_tariff(TariffPlan::new(
            utility.id,
            "base",
            dec!(2),
            dec!(10),
            dec!(5),
            dec!(10),
            date(2024, 1, 1),
        ));
        provider.register_tariff(TariffPlan::new(
            utility.id,
            "revision",
            dec!(3),
            dec!(10),
            dec!(5),
            dec!(10),
            date(2024, 6, 1),
        ));

        let resolved = provider
            .tariff_effective_at(utility.id, date(2024, 7, 1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(resolved.name, "revision");
    }
}
