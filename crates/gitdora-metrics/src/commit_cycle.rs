//! Cycle time between consecutive commits by the same author.
//!
//! Deltas are measured per author, bucketed into fixed-width intervals and
//! folded into sliding windows, then normalized by calendar month.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use gitdora_core::{CycleTimeConfig, DoraError, Result, YearMonth};
use serde::Serialize;
use tracing::debug;

use crate::record::CommitRecord;
use crate::stats::Summary;

/// Time since the same author's previous commit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitDelta {
    /// Author identity the delta belongs to.
    pub author: String,
    /// Hash of the later commit.
    pub hash: String,
    /// Timestamp of the later commit.
    pub at: DateTime<Utc>,
    /// Elapsed minutes since the previous commit.
    pub minutes: f64,
}

/// A half-open time range `[start, end)`; the last bucket of a run is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interval {
    /// Inclusive start.
    pub start: DateTime<Utc>,
    /// Exclusive end, inclusive for the final bucket.
    pub end: DateTime<Utc>,
}

/// Aggregate of one sliding window of buckets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowRow {
    /// Start of the window's first bucket.
    pub interval_start: DateTime<Utc>,
    /// End of the window's last bucket.
    pub interval_end: DateTime<Utc>,
    /// Statistics over every delta in the window, in minutes.
    #[serde(flatten)]
    pub summary: Summary,
}

/// Per-month aggregate of deltas, in minutes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCycleTime {
    /// Month containing the later commit of each delta.
    pub month: YearMonth,
    /// Statistics over the month's deltas.
    #[serde(flatten)]
    pub summary: Summary,
}

/// Windowed and monthly cycle time between commits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitCycleReport {
    /// Sliding windows in ascending start order.
    pub windows: Vec<WindowRow>,
    /// Calendar months in ascending order, without gaps.
    pub months: Vec<MonthlyCycleTime>,
}

/// Compute every author's inter-commit deltas.
///
/// Each author's commits are sorted by timestamp (ties by hash); an author's
/// first commit contributes nothing. The result is ordered by the later
/// commit's timestamp.
///
/// # Examples
///
/// ```
/// use gitdora_metrics::commit_cycle::commit_deltas;
/// use gitdora_metrics::record::ingest;
///
/// let ingested = ingest([
///     "commit bbbb\nauthor alice\ndate 2023-01-08T00:00:00Z\n",
///     "commit aaaa\nauthor alice\ndate 2023-01-01T00:00:00Z\n",
///     "commit cccc\nauthor bob\ndate 2023-01-05T00:00:00Z\n",
/// ])
/// .unwrap();
/// let deltas = commit_deltas(&ingested.records);
/// assert_eq!(deltas.len(), 1);
/// assert_eq!(deltas[0].minutes, 10080.0);
/// ```
pub fn commit_deltas<'a>(records: impl IntoIterator<Item = &'a CommitRecord>) -> Vec<CommitDelta> {
    let mut by_author: BTreeMap<String, Vec<&CommitRecord>> = BTreeMap::new();
    for record in records {
        by_author.entry(record.author_key()).or_default().push(record);
    }

    let mut deltas = Vec::new();
    for (author, mut commits) in by_author {
        commits.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.hash.cmp(&b.hash))
        });
        for pair in commits.windows(2) {
            let (previous, next) = (pair[0], pair[1]);
            let seconds = (next.timestamp - previous.timestamp).num_seconds();
            deltas.push(CommitDelta {
                author: author.clone(),
                hash: next.hash.clone(),
                at: next.utc(),
                minutes: seconds as f64 / 60.0,
            });
        }
    }

    deltas.sort_by(|a, b| {
        a.at.cmp(&b.at)
            .then_with(|| a.author.cmp(&b.author))
            .then_with(|| a.hash.cmp(&b.hash))
    });
    deltas
}

/// Partition `[earliest, latest]` into contiguous buckets of
/// `bucket_size × period`.
///
/// Buckets start at `earliest`; the last one is cut short so that it ends
/// exactly at `latest`. A zero-length span yields a single bucket.
///
/// # Errors
///
/// Returns [`DoraError::InvalidWindow`] for a zero bucket or window size.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use gitdora_core::CycleTimeConfig;
/// use gitdora_metrics::commit_cycle::bucket_intervals;
///
/// let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
/// let end = Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap();
/// let buckets = bucket_intervals(start, end, &CycleTimeConfig::default()).unwrap();
/// assert_eq!(buckets.len(), 3);
/// assert_eq!(buckets[0].start, start);
/// assert_eq!(buckets[2].end, end);
/// ```
pub fn bucket_intervals(
    earliest: DateTime<Utc>,
    latest: DateTime<Utc>,
    config: &CycleTimeConfig,
) -> Result<Vec<Interval>> {
    config.validate()?;
    let width = config.bucket_width_seconds();
    let span = (latest - earliest).num_seconds().max(0);
    let count = ((span + width - 1) / width).max(1);

    Ok((0..count)
        .map(|i| {
            let start = earliest + Duration::seconds(i * width);
            let end = if i == count - 1 {
                latest.max(start)
            } else {
                start + Duration::seconds(width)
            };
            Interval { start, end }
        })
        .collect())
}

/// Check that the configured window fits the buckets of this history.
///
/// # Errors
///
/// Returns [`DoraError::EmptyHistory`] for an empty sequence and
/// [`DoraError::InvalidWindow`] when `window_size` exceeds the number of
/// buckets or either size is zero.
pub fn check_window<'a>(
    records: impl IntoIterator<Item = &'a CommitRecord>,
    config: &CycleTimeConfig,
) -> Result<Vec<Interval>> {
    let (earliest, latest) = history_span(records)?;
    let buckets = bucket_intervals(earliest, latest, config)?;
    if config.window_size > buckets.len() as i64 {
        return Err(DoraError::InvalidWindow(format!(
            "window_size {} exceeds the {} available buckets",
            config.window_size,
            buckets.len()
        )));
    }
    Ok(buckets)
}

/// Aggregate deltas by the calendar month (UTC) of their later commit.
///
/// Every month from the first to the last one holding a delta is emitted;
/// months without deltas are zero rows.
pub fn monthly_cycle_time(deltas: &[CommitDelta]) -> Vec<MonthlyCycleTime> {
    let mut by_month: BTreeMap<YearMonth, Vec<f64>> = BTreeMap::new();
    for delta in deltas {
        by_month
            .entry(YearMonth::of(&delta.at))
            .or_default()
            .push(delta.minutes);
    }

    let (Some(&first), Some(&last)) = (by_month.keys().next(), by_month.keys().next_back()) else {
        return Vec::new();
    };
    first
        .through(last)
        .into_iter()
        .map(|month| MonthlyCycleTime {
            month,
            summary: Summary::from_samples(by_month.get(&month).map_or(&[][..], Vec::as_slice)),
        })
        .collect()
}

/// Cycle time between commits: sliding windows plus monthly normalization.
///
/// The window configuration is validated against the history span before
/// any delta is computed.
///
/// # Errors
///
/// Returns [`DoraError::EmptyHistory`] for an empty sequence and
/// [`DoraError::InvalidWindow`] for an unsatisfiable configuration.
///
/// # Examples
///
/// ```
/// use gitdora_core::CycleTimeConfig;
/// use gitdora_metrics::commit_cycle::cycle_time_by_commit;
/// use gitdora_metrics::record::ingest;
///
/// let ingested = ingest([
///     "commit cccc\nauthor alice\ndate 2023-01-15T00:00:00Z\n",
///     "commit bbbb\nauthor alice\ndate 2023-01-08T00:00:00Z\n",
///     "commit aaaa\nauthor alice\ndate 2023-01-01T00:00:00Z\n",
/// ])
/// .unwrap();
/// let report = cycle_time_by_commit(&ingested.records, &CycleTimeConfig::default()).unwrap();
/// let january = &report.months[0];
/// assert_eq!(january.month.to_string(), "2023-01");
/// assert_eq!(january.summary.count, 2);
/// assert_eq!(january.summary.sum, 20160.0);
/// ```
pub fn cycle_time_by_commit<'a>(
    records: impl IntoIterator<Item = &'a CommitRecord>,
    config: &CycleTimeConfig,
) -> Result<CommitCycleReport> {
    let records: Vec<&CommitRecord> = records.into_iter().collect();
    let buckets = check_window(records.iter().copied(), config)?;

    let deltas = commit_deltas(records.iter().copied());
    debug!(
        deltas = deltas.len(),
        buckets = buckets.len(),
        "computed commit deltas"
    );

    Ok(CommitCycleReport {
        windows: fold_windows(&buckets, &deltas, config.window_size as usize),
        months: monthly_cycle_time(&deltas),
    })
}

fn history_span<'a>(
    records: impl IntoIterator<Item = &'a CommitRecord>,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let mut span: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
    for record in records {
        let at = record.utc();
        span = Some(match span {
            Some((earliest, latest)) => (earliest.min(at), latest.max(at)),
            None => (at, at),
        });
    }
    span.ok_or(DoraError::EmptyHistory { rejected: 0 })
}

fn fold_windows(buckets: &[Interval], deltas: &[CommitDelta], window: usize) -> Vec<WindowRow> {
    let Some(first) = buckets.first() else {
        return Vec::new();
    };
    let width = buckets
        .get(1)
        .map_or(1, |second| (second.start - first.start).num_seconds().max(1));

    let mut samples: Vec<Vec<f64>> = vec![Vec::new(); buckets.len()];
    for delta in deltas {
        let offset = (delta.at - first.start).num_seconds().max(0);
        let index = ((offset / width) as usize).min(buckets.len() - 1);
        samples[index].push(delta.minutes);
    }

    (0..=buckets.len().saturating_sub(window))
        .map(|i| {
            let pooled: Vec<f64> = samples[i..i + window].iter().flatten().copied().collect();
            WindowRow {
                interval_start: buckets[i].start,
                interval_end: buckets[i + window - 1].end,
                summary: Summary::from_samples(&pooled),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::parse_record;
    use chrono::TimeZone;
    use gitdora_core::Period;

    fn commit(hash: &str, author: &str, at: &str) -> CommitRecord {
        parse_record(&format!("commit {hash}\nauthor {author}\ndate {at}\n")).unwrap()
    }

    fn daily(author: &str, days: &[(u32, u32)]) -> Vec<CommitRecord> {
        days.iter()
            .enumerate()
            .map(|(i, (month, day))| {
                commit(
                    &format!("{:04x}{i:04x}", author.len()),
                    author,
                    &format!("2023-{month:02}-{day:02}T00:00:00Z"),
                )
            })
            .collect()
    }

    #[test]
    fn single_author_weekly_commits() {
        let records = vec![
            commit("cccc", "alice", "2023-01-15T00:00:00Z"),
            commit("bbbb", "alice", "2023-01-08T00:00:00Z"),
            commit("aaaa", "alice", "2023-01-01T00:00:00Z"),
        ];
        let report = cycle_time_by_commit(&records, &CycleTimeConfig::default()).unwrap();
        assert_eq!(report.months.len(), 1);
        let january = report.months[0].summary;
        assert_eq!(january.count, 2);
        assert_eq!(january.sum, 20160.0);
        assert_eq!(january.average, 10080.0);
        assert_eq!(january.p75, 10080.0);
        assert_eq!(january.std, 0.0);
    }

    #[test]
    fn deltas_are_per_author_and_ignore_input_order() {
        let records = vec![
            commit("aaaa", "alice", "2023-01-01T00:00:00Z"),
            commit("bbbb", "bob", "2023-01-01T12:00:00Z"),
            commit("cccc", "alice", "2023-01-01T01:00:00Z"),
            commit("dddd", "bob", "2023-01-01T12:30:00Z"),
        ];
        let deltas = commit_deltas(&records);
        let summary: Vec<(&str, f64)> = deltas.iter().map(|d| (d.author.as_str(), d.minutes)).collect();
        assert_eq!(summary, vec![("alice", 60.0), ("bob", 30.0)]);
        assert_eq!(deltas[0].hash, "cccc");
    }

    #[test]
    fn single_commit_author_contributes_nothing() {
        let records = vec![
            commit("aaaa", "alice", "2023-01-01T00:00:00Z"),
            commit("bbbb", "alice", "2023-01-02T00:00:00Z"),
            commit("cccc", "carol", "2023-01-03T00:00:00Z"),
        ];
        let deltas = commit_deltas(&records);
        assert_eq!(deltas.len(), 1);
        assert!(deltas.iter().all(|d| d.author != "carol"));
    }

    #[test]
    fn offsets_do_not_distort_deltas() {
        let records = vec![
            commit("aaaa", "alice", "2023-01-01T10:00:00+02:00"),
            commit("bbbb", "alice", "2023-01-01T09:30:00+00:00"),
        ];
        let deltas = commit_deltas(&records);
        assert_eq!(deltas[0].minutes, 90.0);
    }

    #[test]
    fn months_are_assigned_by_later_commit_and_have_no_gaps() {
        // Sep 14 -> Nov 2 spans an empty October.
        let records = daily("alice", &[(9, 12), (9, 14), (11, 2), (11, 3)]);
        let months = monthly_cycle_time(&commit_deltas(&records));
        let keys: Vec<String> = months.iter().map(|m| m.month.to_string()).collect();
        assert_eq!(keys, vec!["2023-09", "2023-10", "2023-11"]);
        assert_eq!(months[0].summary.sum, 2880.0);
        assert_eq!(months[1].summary, Summary::default());
        assert_eq!(months[2].summary.count, 2);
        assert_eq!(months[2].summary.sum, 70560.0 + 1440.0);
    }

    #[test]
    fn monthly_statistics_use_population_std() {
        let records = daily(
            "alice",
            &[(9, 14), (10, 5), (10, 6), (10, 12), (10, 20), (10, 31)],
        );
        let months = monthly_cycle_time(&commit_deltas(&records));
        let october = months
            .iter()
            .find(|m| m.month.to_string() == "2023-10")
            .unwrap();
        assert_eq!(october.summary.count, 5);
        assert_eq!(october.summary.sum, 67680.0);
        assert_eq!(october.summary.average, 13536.0);
        assert_eq!(october.summary.p75, 15840.0);
        assert_eq!(october.summary.std, 9577.89);
    }

    #[test]
    fn buckets_cover_span_without_gaps() {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2023, 1, 20, 6, 0, 0).unwrap();
        let config = CycleTimeConfig {
            period: Period::Day,
            bucket_size: 7,
            window_size: 1,
        };
        let buckets = bucket_intervals(start, end, &config).unwrap();
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].start, start);
        for pair in buckets.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
        assert_eq!(buckets[2].end, end);
    }

    #[test]
    fn zero_length_span_is_one_bucket() {
        let at = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let buckets = bucket_intervals(at, at, &CycleTimeConfig::default()).unwrap();
        assert_eq!(buckets, vec![Interval { start: at, end: at }]);
    }

    #[test]
    fn windows_slide_over_buckets() {
        // Daily commits for twelve days, one-day buckets folded four at a time.
        let days: Vec<(u32, u32)> = (1..=12).map(|d| (9, d)).collect();
        let records = daily("alice", &days);
        let config = CycleTimeConfig {
            period: Period::Day,
            bucket_size: 1,
            window_size: 4,
        };
        let report = cycle_time_by_commit(&records, &config).unwrap();
        // 11 days of span -> 11 buckets -> 8 windows.
        assert_eq!(report.windows.len(), 8);
        let first = &report.windows[0];
        assert_eq!(first.interval_start.to_rfc3339(), "2023-09-01T00:00:00+00:00");
        assert_eq!(first.interval_end.to_rfc3339(), "2023-09-05T00:00:00+00:00");
        // Bucket 0 holds no delta (the first commit has none); buckets 1-3 hold one each.
        assert_eq!(first.summary.count, 3);
        assert_eq!(first.summary.average, 1440.0);
        // The final bucket is closed, so the last commit lands in it too.
        let last = report.windows.last().unwrap();
        assert_eq!(last.summary.count, 5);
    }

    #[test]
    fn window_larger_than_buckets_is_rejected() {
        let records = daily("alice", &[(1, 1), (1, 10)]);
        let config = CycleTimeConfig {
            period: Period::Week,
            bucket_size: 1,
            window_size: 5,
        };
        let err = cycle_time_by_commit(&records, &config).unwrap_err();
        assert!(matches!(err, DoraError::InvalidWindow(_)));
    }

    #[test]
    fn zero_bucket_size_is_rejected_before_computation() {
        let records = daily("alice", &[(1, 1), (1, 10)]);
        let config = CycleTimeConfig {
            period: Period::Week,
            bucket_size: 0,
            window_size: 1,
        };
        assert!(matches!(
            cycle_time_by_commit(&records, &config),
            Err(DoraError::InvalidWindow(_))
        ));
    }

    #[test]
    fn empty_input_is_empty_history() {
        let records: Vec<CommitRecord> = Vec::new();
        let err = cycle_time_by_commit(&records, &CycleTimeConfig::default()).unwrap_err();
        assert!(matches!(err, DoraError::EmptyHistory { .. }));
    }

    #[test]
    fn repeated_calls_are_identical() {
        let records = daily("alice", &[(1, 1), (1, 3), (2, 9), (3, 1)]);
        let config = CycleTimeConfig::default();
        let first = cycle_time_by_commit(&records, &config).unwrap();
        let second = cycle_time_by_commit(&records, &config).unwrap();
        assert_eq!(first, second);
    }
}
