//! Usage recording and range aggregation.

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::store::AnalyticsStore;
use aperture_core::UsageRecord;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// Per-day slice of a flag's usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyUsage {
    pub total: u64,
    pub enabled: u64,
    pub disabled: u64,
}

/// Aggregated usage for one flag over a day range.
#[derive(Debug, Clone, Serialize)]
pub struct FlagAnalytics {
    pub flag_name: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Environment filter applied, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    pub total_evaluations: u64,
    pub enabled_count: u64,
    pub disabled_count: u64,
    /// Evaluations per variant name
    pub variant_counts: HashMap<String, u64>,
    /// Distinct identified users seen
    pub unique_users: u64,
    /// Breakdown by day (rendered as `YYYY-MM-DD`)
    pub daily: BTreeMap<NaiveDate, DailyUsage>,
    /// Log lines that failed to parse and were skipped
    pub skipped_records: u64,
}

/// Records usage and answers range queries over the log.
#[derive(Clone)]
pub struct AnalyticsRecorder {
    store: Arc<dyn AnalyticsStore>,
}

impl AnalyticsRecorder {
    pub fn new(store: Arc<dyn AnalyticsStore>) -> Self {
        Self { store }
    }

    /// Append one usage record.
    pub async fn record(&self, record: UsageRecord) -> AnalyticsResult<()> {
        self.store.append(record).await
    }

    /// Aggregate a flag's usage over an inclusive day range, optionally
    /// restricted to one environment.
    ///
    /// Malformed log entries are skipped and reported via
    /// [`FlagAnalytics::skipped_records`]; they never fail the query.
    pub async fn analytics(
        &self,
        flag_name: &str,
        from: NaiveDate,
        to: NaiveDate,
        environment: Option<&str>,
    ) -> AnalyticsResult<FlagAnalytics> {
        if from > to {
            return Err(AnalyticsError::InvalidRange(format!(
                "{from} is after {to}"
            )));
        }

        let lines = self.store.scan(flag_name, from, to).await?;

        let mut report = FlagAnalytics {
            flag_name: flag_name.to_string(),
            from,
            to,
            environment: environment.map(str::to_string),
            total_evaluations: 0,
            enabled_count: 0,
            disabled_count: 0,
            variant_counts: HashMap::new(),
            unique_users: 0,
            daily: BTreeMap::new(),
            skipped_records: 0,
        };

        let mut users: HashSet<String> = HashSet::new();

        for line in &lines {
            let record: UsageRecord = match serde_json::from_str(line) {
                Ok(record) => record,
                Err(e) => {
                    debug!(flag = flag_name, error = %e, "skipping malformed usage record");
                    report.skipped_records += 1;
                    continue;
                }
            };

            if let Some(env) = environment {
                if record.environment != env {
                    continue;
                }
            }

            report.total_evaluations += 1;
            if record.enabled {
                report.enabled_count += 1;
            } else {
                report.disabled_count += 1;
            }

            if let Some(variant) = &record.variant {
                *report.variant_counts.entry(variant.clone()).or_default() += 1;
            }

            if let Some(user_id) = &record.user_id {
                users.insert(user_id.clone());
            }

            let day = report.daily.entry(record.timestamp.date_naive()).or_default();
            day.total += 1;
            if record.enabled {
                day.enabled += 1;
            } else {
                day.disabled += 1;
            }
        }

        report.unique_users = users.len() as u64;
        Ok(report)
    }
}
