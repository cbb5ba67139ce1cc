//! End-to-end analysis: raw log text in, every metric table out.

use gitdora_core::{DoraConfig, Result};
use serde::Serialize;
use tracing::info;

use crate::author_activity::{author_activity, AuthorActivity};
use crate::branch_cycle::{cycle_time_by_branch, BranchCycleReport};
use crate::change_failure::{change_failure_rate, MonthlyFailureRate};
use crate::commit_cycle::{check_window, cycle_time_by_commit, CommitCycleReport};
use crate::graph::CommitGraph;
use crate::record::{ingest, split_blocks};
use crate::throughput::{monthly_throughput, MonthlyThroughput};

/// Everything computed for one history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoraReport {
    /// Records that parsed.
    pub valid: usize,
    /// Blocks skipped as malformed.
    pub rejected: usize,
    /// Parent hashes outside the ingested history.
    pub boundary_parents: usize,
    pub cycle_time: CommitCycleReport,
    pub branches: BranchCycleReport,
    pub failures: Vec<MonthlyFailureRate>,
    pub throughput: Vec<MonthlyThroughput>,
    pub authors: Vec<AuthorActivity>,
}

/// Run the whole pipeline over a `git log` text stream.
///
/// Configuration and window checks run before any metric is computed, so a
/// bad configuration never yields a partial report.
///
/// # Errors
///
/// Returns [`gitdora_core::DoraError::Config`] or
/// [`gitdora_core::DoraError::InvalidWindow`] for an unusable
/// configuration, [`gitdora_core::DoraError::EmptyHistory`] when nothing
/// parses, and the graph errors of [`CommitGraph::build`].
///
/// # Examples
///
/// ```
/// use gitdora_core::DoraConfig;
/// use gitdora_metrics::pipeline::analyze;
///
/// let log = "\
/// commit bbbb
/// author alice
/// date 2023-01-08T00:00:00Z
///
///     fix login
///
/// commit aaaa
/// author alice
/// date 2023-01-01T00:00:00Z
///
///     initial
/// ";
/// let report = analyze(log, &DoraConfig::default()).unwrap();
/// assert_eq!(report.valid, 2);
/// assert_eq!(report.failures[0].failure_rate, 50.0);
/// ```
pub fn analyze(text: &str, config: &DoraConfig) -> Result<DoraReport> {
    config.validate()?;

    let ingested = ingest(split_blocks(text))?;
    check_window(&ingested.records, &config.cycle_time)?;

    let valid = ingested.records.len();
    let rejected = ingested.rejected.len();
    let graph = CommitGraph::build(ingested.records)?;

    let report = DoraReport {
        valid,
        rejected,
        boundary_parents: graph.boundary_parents().len(),
        cycle_time: cycle_time_by_commit(graph.records(), &config.cycle_time)?,
        branches: cycle_time_by_branch(&graph, &config.branches),
        failures: change_failure_rate(graph.records(), &config.change_failure),
        throughput: monthly_throughput(graph.records()),
        authors: author_activity(graph.records()),
    };

    info!(
        months = report.cycle_time.months.len(),
        merged_branches = report.branches.lifetimes.len(),
        open_branches = report.branches.open_branches.len(),
        "analysis complete"
    );
    Ok(report)
}
