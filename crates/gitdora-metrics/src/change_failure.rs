//! Change failure rate: the share of commits per month that fix a failure.

use std::collections::BTreeMap;

use gitdora_core::{ChangeFailureConfig, YearMonth};
use serde::Serialize;
use tracing::debug;

use crate::record::CommitRecord;
use crate::stats::{round_to, PERCENT_PLACES};

/// Failure share of one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyFailureRate {
    pub month: YearMonth,
    /// Commits in the month.
    pub total: usize,
    /// Commits classified as failure fixes.
    pub failures: usize,
    /// `100 × failures / total`, one decimal place.
    pub failure_rate: f64,
}

/// Whether `subject` marks a failure-inducing fix.
///
/// A case-insensitive substring test with no word boundaries, so
/// `"prefix"` matches `fix`. Empty keywords never match.
///
/// # Examples
///
/// ```
/// use gitdora_core::ChangeFailureConfig;
/// use gitdora_metrics::change_failure::is_failure_fix;
///
/// let keywords = ChangeFailureConfig::default().keywords;
/// assert!(is_failure_fix("HOTFIX: patch login", &keywords));
/// assert!(is_failure_fix("Debugging output", &keywords));
/// assert!(!is_failure_fix("add feature", &keywords));
/// ```
pub fn is_failure_fix(subject: &str, keywords: &[String]) -> bool {
    let subject = subject.to_lowercase();
    keywords
        .iter()
        .map(|keyword| keyword.trim().to_lowercase())
        .any(|keyword| !keyword.is_empty() && subject.contains(&keyword))
}

/// Monthly change failure rate, ascending by month.
///
/// Months are taken in UTC. Months without commits are omitted.
///
/// # Examples
///
/// ```
/// use gitdora_core::ChangeFailureConfig;
/// use gitdora_metrics::change_failure::change_failure_rate;
/// use gitdora_metrics::record::ingest;
///
/// let ingested = ingest([
///     "commit aaa1\ndate 2023-03-01T00:00:00Z\n\n    fix bug\n",
///     "commit aaa2\ndate 2023-03-02T00:00:00Z\n\n    add feature\n",
///     "commit aaa3\ndate 2023-03-03T00:00:00Z\n\n    hotfix: patch\n",
///     "commit aaa4\ndate 2023-03-04T00:00:00Z\n\n    refactor\n",
/// ])
/// .unwrap();
/// let rates = change_failure_rate(&ingested.records, &ChangeFailureConfig::default());
/// assert_eq!(rates[0].failure_rate, 50.0);
/// ```
pub fn change_failure_rate<'a>(
    records: impl IntoIterator<Item = &'a CommitRecord>,
    config: &ChangeFailureConfig,
) -> Vec<MonthlyFailureRate> {
    let mut by_month: BTreeMap<YearMonth, (usize, usize)> = BTreeMap::new();
    for record in records {
        let entry = by_month.entry(YearMonth::of(&record.utc())).or_default();
        entry.0 += 1;
        if is_failure_fix(record.subject(), &config.keywords) {
            debug!(hash = %record.hash, subject = record.subject(), "failure fix");
            entry.1 += 1;
        }
    }

    by_month
        .into_iter()
        .map(|(month, (total, failures))| MonthlyFailureRate {
            month,
            total,
            failures,
            failure_rate: round_to(100.0 * failures as f64 / total as f64, PERCENT_PLACES),
        })
        .collect()
}
