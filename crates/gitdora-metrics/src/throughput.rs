//! Monthly throughput: commits and active authors per calendar month.

use std::collections::{BTreeMap, BTreeSet};

use gitdora_core::YearMonth;
use serde::Serialize;

use crate::record::CommitRecord;
use crate::stats::{round_to, STAT_PLACES};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyThroughput {
    pub month: YearMonth,
    pub commits: usize,
    /// Distinct authors with at least one commit in the month.
    pub active_authors: usize,
    pub commits_per_author: f64,
}

/// Throughput per UTC month, ascending; months without commits are omitted.
///
/// Authors are identified the same way as for commit cycle time: by email
/// when present, otherwise by name.
pub fn monthly_throughput<'a>(
    records: impl IntoIterator<Item = &'a CommitRecord>,
) -> Vec<MonthlyThroughput> {
    let mut by_month: BTreeMap<YearMonth, (usize, BTreeSet<String>)> = BTreeMap::new();
    for record in records {
        let (commits, authors) = by_month.entry(YearMonth::of(&record.utc())).or_default();
        *commits += 1;
        authors.insert(record.author_key());
    }

    by_month
        .into_iter()
        .map(|(month, (commits, authors))| MonthlyThroughput {
            month,
            commits,
            active_authors: authors.len(),
            commits_per_author: round_to(commits as f64 / authors.len() as f64, STAT_PLACES),
        })
        .collect()
}
