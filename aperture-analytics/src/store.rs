//! Usage log storage.

use crate::error::AnalyticsResult;
use aperture_core::UsageRecord;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Append-only usage log, bucketed per flag and per day.
///
/// Entries are stored as serialized JSON lines; `scan` returns the raw
/// lines so the aggregation layer can skip malformed entries instead of
/// failing the whole query.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Append a record to the bucket for its flag and day.
    async fn append(&self, record: UsageRecord) -> AnalyticsResult<()>;

    /// Return the raw log lines for a flag across an inclusive day range.
    async fn scan(
        &self,
        flag_name: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AnalyticsResult<Vec<String>>;
}

/// In-memory usage log.
#[derive(Clone, Default)]
pub struct InMemoryAnalyticsStore {
    // flag name -> day -> serialized records
    buckets: Arc<RwLock<HashMap<String, BTreeMap<NaiveDate, Vec<String>>>>>,
}

impl InMemoryAnalyticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a raw log line, bypassing serialization. Test hook for
    /// exercising the malformed-entry path.
    pub async fn append_raw(&self, flag_name: &str, day: NaiveDate, line: String) {
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(flag_name.to_string())
            .or_default()
            .entry(day)
            .or_default()
            .push(line);
    }
}

#[async_trait]
impl AnalyticsStore for InMemoryAnalyticsStore {
    async fn append(&self, record: UsageRecord) -> AnalyticsResult<()> {
        let day = record.timestamp.date_naive();
        let line = serde_json::to_string(&record)?;

        let mut buckets = self.buckets.write().await;
        buckets
            .entry(record.flag_name)
            .or_default()
            .entry(day)
            .or_default()
            .push(line);
        Ok(())
    }

    async fn scan(
        &self,
        flag_name: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AnalyticsResult<Vec<String>> {
        let buckets = self.buckets.read().await;
        let Some(days) = buckets.get(flag_name) else {
            return Ok(Vec::new());
        };

        let lines = days
            .range(from..=to)
            .flat_map(|(_, entries)| entries.iter().cloned())
            .collect();
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record_on(day: u32) -> UsageRecord {
        UsageRecord {
            flag_name: "new-ui".to_string(),
            user_id: Some("u1".to_string()),
            enabled: true,
            variant: None,
            environment: "production".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, day, 12, 0, 0).unwrap(),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_scan_day_range() {
        let store = InMemoryAnalyticsStore::new();
        for day in [1, 2, 3, 10] {
            store.append(record_on(day)).await.unwrap();
        }

        let from = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 3, 3).unwrap();
        let lines = store.scan("new-ui", from, to).await.unwrap();
        assert_eq!(lines.len(), 3);
    }

    #[tokio::test]
    async fn test_scan_unknown_flag_is_empty() {
        let store = InMemoryAnalyticsStore::new();
        let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let lines = store.scan("missing", day, day).await.unwrap();
        assert!(lines.is_empty());
    }
}
