//! In-memory meter reading store backed by DashMap

use async_trait::async_trait;
use dashmap::DashMap;
use gridbill_common::{GenerationError, GridbillError, MeterReading, Result};
use tracing::debug;
use uuid::Uuid;

use super::{ReadingStore, UnbilledFilter};

/// Concurrent in-memory reading store
///
/// The claim CAS runs under the DashMap entry lock, which is the per-reading
/// serialization point the double-billing gate relies on.
#[derive(Default)]
pub struct InMemoryReadingStore {
    readings: DashMap<Uuid, MeterReading>,
}

impl InMemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored readings (for tests and health output)
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

#[async_trait]
impl ReadingStore for InMemoryReadingStore {
    async fn insert(&self, reading: MeterReading) -> Result<MeterReading> {
        reading.validate()?;
        debug!(reading_id = %reading.id, connection_id = %reading.connection_id, "Recorded meter reading");
        self.readings.insert(reading.id, reading.clone());
        Ok(reading)
    }

    async fn get(&self, id: Uuid) -> Result<Option<MeterReading>> {
        Ok(self.readings.get(&id).map(|r| r.clone()))
    }

    async fn list_unbilled(&self, filter: &UnbilledFilter) -> Result<Vec<MeterReading>> {
        let mut unbilled: Vec<MeterReading> = self
            .readings
            .iter()
            .filter(|entry| !entry.value().is_billed && filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        unbilled.sort_by_key(|r| (r.connection_id, r.reading_date));
        Ok(unbilled)
    }

    async fn claim(&self, id: Uuid) -> Result<MeterReading> {
        let mut entry = self
            .readings
            .get_mut(&id)
            .ok_or(GridbillError::Generation(GenerationError::ReadingNotFound(
                id,
            )))?;
        if entry.is_billed {
            return Err(GridbillError::Generation(GenerationError::AlreadyBilled(
                id,
            )));
        }
        entry.is_billed = true;
        Ok(entry.clone())
    }

    async fn release(&self, id: Uuid) -> Result<()> {
        let mut entry = self
            .readings
            .get_mut(&id)
            .ok_or(GridbillError::Generation(GenerationError::ReadingNotFound(
                id,
            )))?;
        entry.is_billed = false;
        debug!(reading_id = %id, "Released claimed reading after failed bill write");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn reading(connection_id: Uuid, month: u32, day: u32) -> MeterReading {
        MeterReading::new(
            connection_id,
            dec!(100),
            dec!(150),
            NaiveDate::from_ymd_opt(2024, month, day).unwrap(),
            month,
            2024,
        )
    }

    #[tokio::test]
    async fn test_insert_validates() {
        let store = InMemoryReadingStore::new();
        let mut bad = reading(Uuid::new_v4(), 6, 28);
        bad.current_reading = dec!(50);
        assert!(store.insert(bad).await.is_err());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_list_unbilled_filters() {
        let store = InMemoryReadingStore::new();
        let conn_a = Uuid::new_v4();
        let conn_b = Uuid::new_v4();

        store.insert(reading(conn_a, 6, 28)).await.unwrap();
        store.insert(reading(conn_a, 5, 28)).await.unwrap();
        store.insert(reading(conn_b, 6, 27)).await.unwrap();

        let june = store
            .list_unbilled(&UnbilledFilter::period(6, 2024))
            .await
            .unwrap();
        assert_eq!(june.len(), 2);

        let june_a = store
            .list_unbilled(&UnbilledFilter::period(6, 2024).connection(conn_a))
            .await
            .unwrap();
        assert_eq!(june_a.len(), 1);

        let all = store.list_unbilled(&UnbilledFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_claim_is_single_winner() {
        let store = InMemoryReadingStore::new();
        let r = store.insert(reading(Uuid::new_v4(), 6, 28)).await.unwrap();

        let first = store.claim(r.id).await.unwrap();
        assert!(first.is_billed);

        let second = store.claim(r.id).await.unwrap_err();
        assert!(matches!(
            second,
            GridbillError::Generation(GenerationError::AlreadyBilled(_))
        ));

        // Claimed readings drop out of the unbilled listing
        let unbilled = store.list_unbilled(&UnbilledFilter::default()).await.unwrap();
        assert!(unbilled.is_empty());
    }

    #[tokio::test]
    async fn test_release_restores_eligibility() {
        let store = InMemoryReadingStore::new();
        let r = store.insert(reading(Uuid::new_v4(), 6, 28)).await.unwrap();

        store.claim(r.id).await.unwrap();
        store.release(r.id).await.unwrap();
        assert!(store.claim(r.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_claim_missing_reading() {
        let store = InMemoryReadingStore::new();
        let err = store.claim(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(
            err,
            GridbillError::Generation(GenerationError::ReadingNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_claims_one_winner() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryReadingStore::new());
        let r = store.insert(reading(Uuid::new_v4(), 6, 28)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let id = r.id;
            handles.push(tokio::spawn(async move { store.claim(id).await.is_ok() }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
