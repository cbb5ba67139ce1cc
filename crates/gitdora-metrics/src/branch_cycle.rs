//! Cycle time by branch, reconstructed from commit topology.
//!
//! Branch refs are usually deleted after a merge, so branches are recovered
//! from the shape of the graph instead: the trunk is the first-parent chain
//! from the trunk head, and every non-first parent of a commit starts a line
//! merged by that commit. Lines claim commits as they walk first parents and
//! stop at the first commit another line already owns.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, Utc};
use gitdora_core::BranchConfig;
use serde::Serialize;
use tracing::debug;

use crate::graph::CommitGraph;
use crate::record::CommitRecord;
use crate::stats::Summary;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Elapsed times of one merged branch, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchTimes {
    /// Origin to merge.
    pub cycle_seconds: i64,
    /// Origin to the last own commit before the merge.
    pub work_seconds: i64,
    /// Last own commit to merge.
    pub qa_seconds: i64,
}

/// One reconstructed branch line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchLifetime {
    /// Ref name at the tip, or the name recovered from the merge subject.
    pub name: Option<String>,
    /// Oldest own commit, present only when the line forked off another line.
    pub origin: Option<String>,
    /// The claimed commit on another line this one departed from.
    pub fork_point: Option<String>,
    /// Commits owned by the line, oldest first.
    pub own_commits: Vec<String>,
    /// Commit that merged the line, if any.
    pub merge_commit: Option<String>,
    /// Timestamp of the merge commit.
    pub merged_at: Option<DateTime<Utc>>,
    /// Present for merged lines with an origin.
    pub times: Option<BranchTimes>,
}

impl BranchLifetime {
    /// Whether the line was never merged.
    pub fn is_open(&self) -> bool {
        self.merge_commit.is_none()
    }
}

/// Merged branches pooled by the UTC week of their merge commit.
///
/// Time metrics are in days.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyBranchRow {
    /// Monday 00:00 UTC of the merge week.
    pub week_start: DateTime<Utc>,
    pub branch_count: usize,
    pub commit_count: usize,
    /// Own commits per branch.
    pub commits: Summary,
    pub cycle_time: Summary,
    pub qa_time: Summary,
    pub work_time: Summary,
}

/// Output of [`cycle_time_by_branch`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchCycleReport {
    /// Consecutive weeks from the first to the last merge.
    pub weeks: Vec<WeeklyBranchRow>,
    /// Merged lines in discovery order.
    pub lifetimes: Vec<BranchLifetime>,
    /// Lines reached only from an unmerged branch head.
    pub open_branches: Vec<BranchLifetime>,
}

#[derive(Debug)]
struct Line {
    /// Newest first.
    commits: Vec<String>,
    fork_point: Option<String>,
    merge: Option<String>,
}

/// Reconstruct branches from `graph` and pool merged ones by merge week.
///
/// Lines without a fork point (the trunk, or history truncated at a
/// boundary parent) carry no origin and stay out of the weekly rows.
///
/// # Examples
///
/// ```
/// use gitdora_core::BranchConfig;
/// use gitdora_metrics::branch_cycle::cycle_time_by_branch;
/// use gitdora_metrics::graph::CommitGraph;
/// use gitdora_metrics::record::ingest;
///
/// let ingested = ingest([
///     "commit dddd (main)\nparents aaaa cccc\ndate 2023-01-06T00:00:00Z\n\n    Merge branch 'feature'\n",
///     "commit cccc\nparents bbbb\ndate 2023-01-03T00:00:00Z\n",
///     "commit bbbb\nparents aaaa\ndate 2023-01-01T00:00:00Z\n",
///     "commit aaaa\ndate 2022-12-31T00:00:00Z\n",
/// ])
/// .unwrap();
/// let graph = CommitGraph::build(ingested.records).unwrap();
/// let report = cycle_time_by_branch(&graph, &BranchConfig::default());
///
/// let feature = &report.lifetimes[0];
/// assert_eq!(feature.name.as_deref(), Some("feature"));
/// assert_eq!(feature.own_commits, vec!["bbbb", "cccc"]);
/// assert_eq!(feature.times.unwrap().cycle_seconds, 5 * 86_400);
/// assert_eq!(report.weeks[0].cycle_time.average, 5.0);
/// ```
pub fn cycle_time_by_branch(graph: &CommitGraph, config: &BranchConfig) -> BranchCycleReport {
    let mut claimed: BTreeSet<String> = BTreeSet::new();
    let (trunk_name, trunk_head) = resolve_trunk(graph, config);

    let Some(trunk_head) = trunk_head else {
        return BranchCycleReport {
            weeks: Vec::new(),
            lifetimes: Vec::new(),
            open_branches: Vec::new(),
        };
    };

    let trunk = walk_line(graph, &trunk_head, None, &mut claimed);
    debug!(
        trunk = trunk_name.as_deref().unwrap_or(trunk_head.as_str()),
        commits = trunk.commits.len(),
        "walked trunk"
    );

    let mut lines = Vec::new();
    let mut queue = VecDeque::new();
    enqueue_merged(graph, &trunk, &mut queue);
    drain(graph, &mut queue, &mut claimed, &mut lines);

    for (name, tip) in graph.branch_heads() {
        if Some(name) == trunk_name.as_ref() || claimed.contains(tip) {
            continue;
        }
        debug!(branch = %name, "walking unmerged branch head");
        let line = walk_line(graph, tip, None, &mut claimed);
        enqueue_merged(graph, &line, &mut queue);
        lines.push(line);
        drain(graph, &mut queue, &mut claimed, &mut lines);
    }

    let (open_branches, lifetimes): (Vec<_>, Vec<_>) = lines
        .iter()
        .filter(|line| !line.commits.is_empty())
        .map(|line| lifetime(graph, line))
        .partition(BranchLifetime::is_open);

    debug!(
        merged = lifetimes.len(),
        open = open_branches.len(),
        "reconstructed branches"
    );

    BranchCycleReport {
        weeks: weekly_rows(&lifetimes),
        lifetimes,
        open_branches,
    }
}

/// Recover a branch name from a merge commit subject.
///
/// # Examples
///
/// ```
/// use gitdora_metrics::branch_cycle::merged_branch_name;
///
/// assert_eq!(merged_branch_name("Merge branch 'feature/x' into main").as_deref(), Some("feature/x"));
/// assert_eq!(merged_branch_name("Merge pull request #12 from acme/fix-login").as_deref(), Some("fix-login"));
/// assert_eq!(merged_branch_name("Merge remote-tracking branch 'origin/dev'").as_deref(), Some("dev"));
/// assert_eq!(merged_branch_name("Add parser"), None);
/// ```
pub fn merged_branch_name(subject: &str) -> Option<String> {
    if let Some(rest) = subject.strip_prefix("Merge branch '") {
        return quoted(rest).map(str::to_string);
    }
    if let Some(rest) = subject.strip_prefix("Merge remote-tracking branch '") {
        let full = quoted(rest)?;
        let name = full.split_once('/').map_or(full, |(_, name)| name);
        return Some(name.to_string());
    }
    if let Some(rest) = subject.strip_prefix("Merge pull request ") {
        let (_, source) = rest.split_once(" from ")?;
        let source = source.split_whitespace().next()?;
        let name = source.split_once('/').map_or(source, |(_, name)| name);
        return (!name.is_empty()).then(|| name.to_string());
    }
    None
}

/// Monday 00:00 UTC of the week containing `at`.
pub fn week_start(at: DateTime<Utc>) -> DateTime<Utc> {
    let date = at.date_naive();
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    monday.and_time(NaiveTime::MIN).and_utc()
}

fn quoted(rest: &str) -> Option<&str> {
    let (name, _) = rest.split_once('\'')?;
    (!name.is_empty()).then_some(name)
}

fn resolve_trunk(graph: &CommitGraph, config: &BranchConfig) -> (Option<String>, Option<String>) {
    let heads = graph.branch_heads();
    for name in &config.trunk {
        if let Some(tip) = heads.get(name) {
            return (Some(name.clone()), Some(tip.clone()));
        }
    }
    for name in &config.trunk {
        let suffix = format!("/{name}");
        if let Some((full, tip)) = heads.iter().find(|(full, _)| full.ends_with(&suffix)) {
            return (Some(full.clone()), Some(tip.clone()));
        }
    }
    (None, graph.head().map(|record| record.hash.clone()))
}

fn walk_line(
    graph: &CommitGraph,
    start: &str,
    merge: Option<String>,
    claimed: &mut BTreeSet<String>,
) -> Line {
    let mut line = Line {
        commits: Vec::new(),
        fork_point: None,
        merge,
    };
    let mut current = graph.get(start);
    while let Some(record) = current {
        if !claimed.insert(record.hash.clone()) {
            break;
        }
        line.commits.push(record.hash.clone());

        current = None;
        if let Some(parent) = record.parent_hashes.first() {
            if claimed.contains(parent) {
                line.fork_point = Some(parent.clone());
            } else {
                current = graph.get(parent);
            }
        }
    }
    line
}

fn enqueue_merged(graph: &CommitGraph, line: &Line, queue: &mut VecDeque<(String, String)>) {
    for hash in &line.commits {
        let Some(record) = graph.get(hash) else {
            continue;
        };
        for parent in record.parent_hashes.iter().skip(1) {
            if graph.get(parent).is_some() {
                queue.push_back((parent.clone(), hash.clone()));
            }
        }
    }
}

fn drain(
    graph: &CommitGraph,
    queue: &mut VecDeque<(String, String)>,
    claimed: &mut BTreeSet<String>,
    lines: &mut Vec<Line>,
) {
    while let Some((start, merge)) = queue.pop_front() {
        if claimed.contains(&start) {
            continue;
        }
        let line = walk_line(graph, &start, Some(merge), claimed);
        enqueue_merged(graph, &line, queue);
        lines.push(line);
    }
}

fn lifetime(graph: &CommitGraph, line: &Line) -> BranchLifetime {
    let own: Vec<&CommitRecord> = line.commits.iter().rev().filter_map(|h| graph.get(h)).collect();
    let origin = line
        .fork_point
        .as_ref()
        .and_then(|_| own.first())
        .copied();
    let merge = line.merge.as_deref().and_then(|hash| graph.get(hash));

    let times = match (origin, merge) {
        (Some(origin), Some(merge)) => Some(branch_times(origin, &own, merge)),
        _ => None,
    };

    let name = line
        .commits
        .first()
        .and_then(|tip| graph.branch_at(tip))
        .map(str::to_string)
        .or_else(|| merge.and_then(|m| merged_branch_name(m.subject())));

    BranchLifetime {
        name,
        origin: origin.map(|record| record.hash.clone()),
        fork_point: line.fork_point.clone(),
        own_commits: own.iter().map(|record| record.hash.clone()).collect(),
        merge_commit: merge.map(|record| record.hash.clone()),
        merged_at: merge.map(CommitRecord::utc),
        times,
    }
}

fn branch_times(origin: &CommitRecord, own: &[&CommitRecord], merge: &CommitRecord) -> BranchTimes {
    let last_own = own
        .iter()
        .map(|record| record.timestamp)
        .filter(|at| *at <= merge.timestamp)
        .max()
        .unwrap_or(origin.timestamp);

    let seconds = |from: DateTime<FixedOffset>, to: DateTime<FixedOffset>| {
        (to - from).num_seconds().max(0)
    };
    BranchTimes {
        cycle_seconds: seconds(origin.timestamp, merge.timestamp),
        work_seconds: seconds(origin.timestamp, last_own),
        qa_seconds: seconds(last_own, merge.timestamp),
    }
}

fn weekly_rows(lifetimes: &[BranchLifetime]) -> Vec<WeeklyBranchRow> {
    let mut by_week: BTreeMap<DateTime<Utc>, Vec<(&BranchLifetime, BranchTimes)>> = BTreeMap::new();
    for lifetime in lifetimes {
        if let (Some(at), Some(times)) = (lifetime.merged_at, lifetime.times) {
            by_week.entry(week_start(at)).or_default().push((lifetime, times));
        }
    }

    let (Some(&first), Some(&last)) = (by_week.keys().next(), by_week.keys().next_back()) else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    let mut week = first;
    while week <= last {
        let pooled = by_week.get(&week).map_or(&[][..], Vec::as_slice);
        let days = |pick: fn(&BranchTimes) -> i64| -> Vec<f64> {
            pooled
                .iter()
                .map(|(_, times)| pick(times) as f64 / SECONDS_PER_DAY)
                .collect()
        };
        let commits: Vec<f64> = pooled
            .iter()
            .map(|(lifetime, _)| lifetime.own_commits.len() as f64)
            .collect();

        rows.push(WeeklyBranchRow {
            week_start: week,
            branch_count: pooled.len(),
            commit_count: pooled.iter().map(|(l, _)| l.own_commits.len()).sum(),
            commits: Summary::from_samples(&commits),
            cycle_time: Summary::from_samples(&days(|t| t.cycle_seconds)),
            qa_time: Summary::from_samples(&days(|t| t.qa_seconds)),
            work_time: Summary::from_samples(&days(|t| t.work_seconds)),
        });
        week += Duration::days(7);
    }
    rows
}
