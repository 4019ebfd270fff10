//! In-memory `RecordStore` for local development and unit tests.

use async_trait::async_trait;
use capitol_core::store::{ItemOutcome, RangePredicate, RecordStore, StoreError, TableStatus};
use capitol_core::validate::CanonicalRecord;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Index names follow the `{hash_field}-{range_field}-index` convention the
/// real table uses, e.g. `type-update_date-index`.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    items: Arc<Mutex<BTreeMap<String, Value>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all stored items (primarily for tests).
    pub async fn all_items(&self) -> BTreeMap<String, Value> {
        self.items.lock().await.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn describe_table(&self, _table: &str) -> Result<TableStatus, StoreError> {
        Ok(TableStatus::Exists)
    }

    async fn put_item(&self, record: &CanonicalRecord) -> Result<(), StoreError> {
        self.items
            .lock()
            .await
            .insert(record.id.clone(), Value::Object(record.to_item()));
        Ok(())
    }

    async fn batch_put(
        &self,
        records: &[CanonicalRecord],
    ) -> Result<Vec<ItemOutcome>, StoreError> {
        let mut items = self.items.lock().await;
        Ok(records
            .iter()
            .map(|r| {
                items.insert(r.id.clone(), Value::Object(r.to_item()));
                ItemOutcome {
                    id: r.id.clone(),
                    result: Ok(()),
                }
            })
            .collect())
    }

    async fn query_prefix(
        &self,
        index: &str,
        hash: &str,
        range: RangePredicate,
    ) -> Result<Vec<Value>, StoreError> {
        let mut fields = index.trim_end_matches("-index").splitn(2, '-');
        let hash_field = fields.next().unwrap_or_default().to_string();
        let range_field = fields.next().unwrap_or_default().to_string();
        if hash_field.is_empty() {
            return Err(StoreError::ValidationRejected(format!(
                "unparseable index name: {index}"
            )));
        }

        let items = self.items.lock().await;
        Ok(items
            .values()
            .filter(|item| {
                let hash_matches = item
                    .get(&hash_field)
                    .map(|v| json_scalar_string(v) == hash)
                    .unwrap_or(false);
                if !hash_matches {
                    return false;
                }
                let range_value = item
                    .get(&range_field)
                    .map(json_scalar_string)
                    .unwrap_or_default();
                match &range {
                    RangePredicate::Any => true,
                    RangePredicate::BeginsWith(prefix) => range_value.starts_with(prefix.as_str()),
                    RangePredicate::Between(lo, hi) => {
                        range_value.as_str() >= lo.as_str() && range_value.as_str() <= hi.as_str()
                    }
                }
            })
            .cloned()
            .collect())
    }
}

fn json_scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capitol_core::models::Family;
    use chrono::NaiveDate;

    fn record(id: &str, family: Family, date: &str) -> CanonicalRecord {
        CanonicalRecord {
            id: id.to_string(),
            family,
            congress: 118,
            update_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            version: 1,
            url: None,
            extras: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn batch_put_upserts_by_id() {
        let store = MemoryRecordStore::new();
        let outcomes = store
            .batch_put(&[
                record("a", Family::Bill, "2024-01-01"),
                record("a", Family::Bill, "2024-01-02"),
            ])
            .await
            .unwrap();
        assert!(outcomes.iter().all(|o| o.result.is_ok()));
        let items = store.all_items().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items["a"]["update_date"], "2024-01-02");
    }

    #[tokio::test]
    async fn query_prefix_filters_on_hash_and_range() {
        let store = MemoryRecordStore::new();
        store
            .batch_put(&[
                record("a", Family::Bill, "2024-01-01"),
                record("b", Family::Bill, "2024-02-01"),
                record("c", Family::Treaty, "2024-01-15"),
            ])
            .await
            .unwrap();

        let hits = store
            .query_prefix("type-update_date-index", "bill", RangePredicate::BeginsWith("2024-01".into()))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["id"], "a");

        let hits = store
            .query_prefix(
                "type-update_date-index",
                "bill",
                RangePredicate::Between("2024-01-01".into(), "2024-12-31".into()),
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }
}
