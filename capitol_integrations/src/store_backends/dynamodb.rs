//! DynamoDB-backed `RecordStore`.
//!
//! Items are marshalled from canonical records as flat JSON maps; the narrow
//! `DynamoApi` trait keeps the store logic testable without AWS credentials.
//! The real SDK adapter only compiles with the `dynamodb` feature.

use async_trait::async_trait;
use capitol_core::store::{ItemOutcome, RangePredicate, RecordStore, StoreError, TableStatus};
use capitol_core::validate::CanonicalRecord;
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::instrument;

/// Native batch-write size limit of `BatchWriteItem`.
const NATIVE_BATCH_LIMIT: usize = 25;

#[async_trait]
pub trait DynamoApi: Send + Sync {
    async fn describe_table(&self, table: &str) -> Result<bool, StoreError>;

    /// Conditional put: succeed when the id is absent or the stored version
    /// is older than `version`.
    async fn put_item_conditional(
        &self,
        table: &str,
        item: &Value,
        version: i64,
    ) -> Result<(), StoreError>;

    /// Write up to 25 items; returns the indexes of unprocessed items.
    async fn batch_write(&self, table: &str, items: &[Value]) -> Result<Vec<usize>, StoreError>;

    async fn query(
        &self,
        table: &str,
        index: &str,
        hash: &str,
        range: &RangePredicate,
    ) -> Result<Vec<Value>, StoreError>;
}

#[derive(Clone)]
pub struct DynamoRecordStore<C: DynamoApi> {
    client: C,
    table: String,
}

impl<C: DynamoApi> DynamoRecordStore<C> {
    pub fn new(client: C, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    /// Flat item map plus the write-time `timestamp` attribute.
    fn marshal(record: &CanonicalRecord) -> Value {
        let mut item = record.to_item();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        item.insert("timestamp".to_string(), Value::from(now));
        Value::Object(item)
    }
}

#[async_trait]
impl<C: DynamoApi> RecordStore for DynamoRecordStore<C> {
    #[instrument(level = "debug", skip(self))]
    async fn describe_table(&self, table: &str) -> Result<TableStatus, StoreError> {
        match self.client.describe_table(table).await {
            Ok(true) => Ok(TableStatus::Exists),
            Ok(false) => Ok(TableStatus::Missing),
            Err(StoreError::TableMissing(_)) => Ok(TableStatus::Missing),
            Err(e) => Err(e),
        }
    }

    #[instrument(level = "debug", skip(self, record), fields(id = %record.id))]
    async fn put_item(&self, record: &CanonicalRecord) -> Result<(), StoreError> {
        self.client
            .put_item_conditional(&self.table, &Self::marshal(record), record.version as i64)
            .await
    }

    #[instrument(level = "debug", skip(self, records), fields(count = records.len()))]
    async fn batch_put(
        &self,
        records: &[CanonicalRecord],
    ) -> Result<Vec<ItemOutcome>, StoreError> {
        let mut outcomes = Vec::with_capacity(records.len());
        for chunk in records.chunks(NATIVE_BATCH_LIMIT) {
            let items: Vec<Value> = chunk.iter().map(Self::marshal).collect();
            let unprocessed = self.client.batch_write(&self.table, &items).await?;
            for (idx, record) in chunk.iter().enumerate() {
                let result = if unprocessed.contains(&idx) {
                    Err(StoreError::ThroughputExceeded)
                } else {
                    Ok(())
                };
                outcomes.push(ItemOutcome {
                    id: record.id.clone(),
                    result,
                });
            }
        }
        Ok(outcomes)
    }

    #[instrument(level = "debug", skip(self, range))]
    async fn query_prefix(
        &self,
        index: &str,
        hash: &str,
        range: RangePredicate,
    ) -> Result<Vec<Value>, StoreError> {
        self.client.query(&self.table, index, hash, &range).await
    }
}

/// Real AWS SDK adapter (only compiled when the `dynamodb` feature is enabled).
#[cfg(feature = "dynamodb")]
pub mod real {
    use super::{DynamoApi, RangePredicate, StoreError};
    use aws_sdk_dynamodb::error::SdkError;
    use aws_sdk_dynamodb::types::AttributeValue;
    use aws_sdk_dynamodb::Client as DynamoClient;
    use serde_json::Value;
    use std::collections::HashMap;
    use tracing::instrument;

    #[derive(Clone)]
    pub struct AwsDynamoApi {
        inner: DynamoClient,
    }

    impl AwsDynamoApi {
        pub fn new(inner: DynamoClient) -> Self {
            Self { inner }
        }

        /// Build a client for the configured region using the ambient AWS
        /// credential chain.
        pub async fn from_region(region: impl Into<String>) -> Self {
            let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(aws_config::Region::new(region.into()))
                .load()
                .await;
            Self::new(DynamoClient::new(&config))
        }
    }

    fn attr_from_json(value: &Value) -> AttributeValue {
        match value {
            Value::Null => AttributeValue::Null(true),
            Value::Bool(b) => AttributeValue::Bool(*b),
            Value::Number(n) => AttributeValue::N(n.to_string()),
            Value::String(s) => AttributeValue::S(s.clone()),
            Value::Array(items) => {
                AttributeValue::L(items.iter().map(attr_from_json).collect())
            }
            Value::Object(map) => AttributeValue::M(
                map.iter()
                    .map(|(k, v)| (k.clone(), attr_from_json(v)))
                    .collect(),
            ),
        }
    }

    fn attr_to_json(value: &AttributeValue) -> Value {
        match value {
            AttributeValue::S(s) => Value::String(s.clone()),
            AttributeValue::N(n) => n
                .parse::<i64>()
                .map(Value::from)
                .or_else(|_| n.parse::<f64>().map(Value::from))
                .unwrap_or_else(|_| Value::String(n.clone())),
            AttributeValue::Bool(b) => Value::Bool(*b),
            AttributeValue::L(items) => Value::Array(items.iter().map(attr_to_json).collect()),
            AttributeValue::M(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), attr_to_json(v)))
                    .collect(),
            ),
            _ => Value::Null,
        }
    }

    fn item_attrs(item: &Value) -> HashMap<String, AttributeValue> {
        item.as_object()
            .map(|map| {
                map.iter()
                    .map(|(k, v)| (k.clone(), attr_from_json(v)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Map an SDK error using its typed service error where one exists, and
    /// fall back to message sniffing for the auth failures the SDK leaves
    /// unmodelled.
    fn map_sdk_error<E>(context: &str, err: SdkError<E>) -> StoreError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        match &err {
            SdkError::TimeoutError(_) => return StoreError::Timeout,
            SdkError::DispatchFailure(_) => {
                return StoreError::Transient(format!("{context}: dispatch failure"))
            }
            _ => {}
        }
        let message = format!("{context}: {err}");
        if message.contains("ProvisionedThroughputExceeded") {
            StoreError::ThroughputExceeded
        } else if message.contains("ConditionalCheckFailed") {
            StoreError::ConditionalCheckFailed
        } else if message.contains("ResourceNotFound") {
            StoreError::TableMissing(context.to_string())
        } else if message.contains("UnrecognizedClient")
            || message.contains("AccessDenied")
            || message.contains("security token")
        {
            StoreError::AuthFailed(message)
        } else if message.contains("ValidationException") {
            StoreError::ValidationRejected(message)
        } else {
            StoreError::Transient(message)
        }
    }

    #[async_trait::async_trait]
    impl DynamoApi for AwsDynamoApi {
        #[instrument(level = "debug", skip(self))]
        async fn describe_table(&self, table: &str) -> Result<bool, StoreError> {
            match self.inner.describe_table().table_name(table).send().await {
                Ok(_) => Ok(true),
                Err(e) => match map_sdk_error("describe_table", e) {
                    StoreError::TableMissing(_) => Ok(false),
                    other => Err(other),
                },
            }
        }

        #[instrument(level = "debug", skip(self, item))]
        async fn put_item_conditional(
            &self,
            table: &str,
            item: &Value,
            version: i64,
        ) -> Result<(), StoreError> {
            self.inner
                .put_item()
                .table_name(table)
                .set_item(Some(item_attrs(item)))
                .condition_expression("attribute_not_exists(id) OR version < :new_version")
                .expression_attribute_values(":new_version", AttributeValue::N(version.to_string()))
                .send()
                .await
                .map(|_| ())
                .map_err(|e| map_sdk_error("put_item", e))
        }

        #[instrument(level = "debug", skip(self, items), fields(count = items.len()))]
        async fn batch_write(
            &self,
            table: &str,
            items: &[Value],
        ) -> Result<Vec<usize>, StoreError> {
            use aws_sdk_dynamodb::types::{PutRequest, WriteRequest};

            let mut requests = Vec::with_capacity(items.len());
            for item in items {
                let put = PutRequest::builder()
                    .set_item(Some(item_attrs(item)))
                    .build()
                    .map_err(|e| StoreError::ValidationRejected(e.to_string()))?;
                requests.push(WriteRequest::builder().put_request(put).build());
            }

            let output = self
                .inner
                .batch_write_item()
                .request_items(table, requests)
                .send()
                .await
                .map_err(|e| map_sdk_error("batch_write", e))?;

            // Unprocessed items come back as full requests; match them to
            // input positions by their id attribute.
            let mut unprocessed = Vec::new();
            if let Some(remaining) = output.unprocessed_items {
                if let Some(write_requests) = remaining.get(table) {
                    for request in write_requests {
                        let id = request
                            .put_request()
                            .and_then(|p| p.item().get("id"))
                            .and_then(|v| v.as_s().ok().cloned());
                        if let Some(id) = id {
                            if let Some(pos) = items
                                .iter()
                                .position(|item| item.get("id").and_then(Value::as_str) == Some(id.as_str()))
                            {
                                unprocessed.push(pos);
                            }
                        }
                    }
                }
            }
            Ok(unprocessed)
        }

        #[instrument(level = "debug", skip(self, range))]
        async fn query(
            &self,
            table: &str,
            index: &str,
            hash: &str,
            range: &RangePredicate,
        ) -> Result<Vec<Value>, StoreError> {
            // Index names follow `{hash_field}-{range_field}-index`.
            let mut fields = index.trim_end_matches("-index").splitn(2, '-');
            let hash_field = fields.next().unwrap_or("id").to_string();
            let range_field = fields.next().unwrap_or("update_date").to_string();

            let mut query = self
                .inner
                .query()
                .table_name(table)
                .index_name(index)
                .expression_attribute_names("#h", hash_field)
                .expression_attribute_values(":h", AttributeValue::S(hash.to_string()));

            query = match range {
                RangePredicate::Any => query.key_condition_expression("#h = :h"),
                RangePredicate::BeginsWith(prefix) => query
                    .key_condition_expression("#h = :h AND begins_with(#r, :p)")
                    .expression_attribute_names("#r", range_field)
                    .expression_attribute_values(":p", AttributeValue::S(prefix.clone())),
                RangePredicate::Between(lo, hi) => query
                    .key_condition_expression("#h = :h AND #r BETWEEN :lo AND :hi")
                    .expression_attribute_names("#r", range_field)
                    .expression_attribute_values(":lo", AttributeValue::S(lo.clone()))
                    .expression_attribute_values(":hi", AttributeValue::S(hi.clone())),
            };

            let output = query.send().await.map_err(|e| map_sdk_error("query", e))?;
            Ok(output
                .items
                .unwrap_or_default()
                .iter()
                .map(|item| {
                    Value::Object(
                        item.iter()
                            .map(|(k, v)| (k.clone(), attr_to_json(v)))
                            .collect(),
                    )
                })
                .collect())
        }
    }
}
