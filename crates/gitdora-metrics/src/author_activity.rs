//! Per-author activity: weekly commit counts and each author's percentile
//! rank by total commits.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::branch_cycle::week_start;
use crate::record::CommitRecord;
use crate::stats::{percentile_rank, round_to, STAT_PLACES};

/// Commits by one author in one week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyCommits {
    /// Monday 00:00 UTC.
    pub week_start: DateTime<Utc>,
    pub commits: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorActivity {
    /// Email when the log carried one, otherwise the name.
    pub author: String,
    pub total_commits: usize,
    /// Percentage of authors with this many commits or fewer.
    pub percentile_rank: f64,
    /// Weeks with at least one commit, ascending.
    pub weeks: Vec<WeeklyCommits>,
}

impl AuthorActivity {
    /// The week with the most commits; the earliest wins a tie.
    pub fn busiest_week(&self) -> Option<&WeeklyCommits> {
        self.weeks
            .iter()
            .rev()
            .max_by_key(|week| week.commits)
    }
}

/// Group commits by author and UTC week, then rank authors by total.
///
/// Rows are ordered by total commits, highest first, then by author.
///
/// # Examples
///
/// ```
/// use gitdora_metrics::author_activity::author_activity;
/// use gitdora_metrics::record::ingest;
///
/// let ingested = ingest([
///     "commit cccc\nauthor bob <bob@example.com>\ndate 2023-01-10T00:00:00Z\n",
///     "commit bbbb\nauthor alice <alice@example.com>\ndate 2023-01-03T00:00:00Z\n",
///     "commit aaaa\nauthor alice <alice@example.com>\ndate 2023-01-02T00:00:00Z\n",
/// ])
/// .unwrap();
/// let rows = author_activity(&ingested.records);
/// assert_eq!(rows[0].author, "alice@example.com");
/// assert_eq!(rows[0].weeks[0].commits, 2);
/// assert_eq!(rows[0].percentile_rank, 100.0);
/// assert_eq!(rows[1].percentile_rank, 50.0);
/// ```
pub fn author_activity<'a>(
    records: impl IntoIterator<Item = &'a CommitRecord>,
) -> Vec<AuthorActivity> {
    let mut by_author: BTreeMap<String, BTreeMap<DateTime<Utc>, usize>> = BTreeMap::new();
    for record in records {
        *by_author
            .entry(record.author_key())
            .or_default()
            .entry(week_start(record.utc()))
            .or_default() += 1;
    }

    let totals: Vec<f64> = by_author
        .values()
        .map(|weeks| weeks.values().sum::<usize>() as f64)
        .collect();

    let mut rows: Vec<AuthorActivity> = by_author
        .into_iter()
        .map(|(author, weeks)| {
            let total_commits: usize = weeks.values().sum();
            AuthorActivity {
                author,
                total_commits,
                percentile_rank: round_to(
                    percentile_rank(&totals, total_commits as f64),
                    STAT_PLACES,
                ),
                weeks: weeks
                    .into_iter()
                    .map(|(week_start, commits)| WeeklyCommits {
                        week_start,
                        commits,
                    })
                    .collect(),
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total_commits
            .cmp(&a.total_commits)
            .then_with(|| a.author.cmp(&b.author))
    });

    debug!(authors = rows.len(), "ranked author activity");
    rows
}
