//! Property tests over generated acyclic histories.

use chrono::{Duration, TimeZone, Utc};
use gitdora_core::{BranchConfig, ChangeFailureConfig, CycleTimeConfig, Period};
use gitdora_metrics::branch_cycle::cycle_time_by_branch;
use gitdora_metrics::change_failure::change_failure_rate;
use gitdora_metrics::commit_cycle::{bucket_intervals, cycle_time_by_commit};
use gitdora_metrics::graph::CommitGraph;
use gitdora_metrics::record::{ingest, split_blocks};
use proptest::prelude::*;

const SUBJECTS: [&str; 5] = ["add feature", "fix crash", "refactor", "Revert change", "docs"];
const AUTHORS: [&str; 3] = ["alice", "bob", "carol"];

/// One generated commit: minutes after its predecessor, author, subject and
/// an optional extra parent index (taken modulo the commit's position).
type Step = (u32, usize, usize, Option<usize>);

fn arb_history() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        (1u32..20_000, 0..AUTHORS.len(), 0..SUBJECTS.len(), prop::option::of(0usize..64)),
        1..40,
    )
}

/// Render a generated history as a most-recent-first `git log` stream.
fn render_log(steps: &[Step]) -> String {
    let base = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    let mut at = base;
    let mut blocks = Vec::new();
    for (i, (gap, author, subject, extra)) in steps.iter().enumerate() {
        at += Duration::minutes(i64::from(*gap));
        let mut parents = Vec::new();
        if i > 0 {
            parents.push(format!("{:08x}", i));
        }
        if let Some(extra) = extra {
            if i > 1 {
                let j = extra % (i - 1);
                parents.push(format!("{:08x}", j + 1));
            }
        }
        blocks.push(format!(
            "commit {:08x}\nparents {}\nauthor {}\ndate {}\n\n    {}\n",
            i + 1,
            parents.join(" "),
            AUTHORS[*author],
            at.to_rfc3339(),
            SUBJECTS[*subject],
        ));
    }
    blocks.reverse();
    blocks.join("\n")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn graph_holds_every_parsed_record(steps in arb_history()) {
        let log = render_log(&steps);
        let ingested = ingest(split_blocks(&log)).unwrap();
        prop_assert_eq!(ingested.records.len(), steps.len());
        prop_assert!(ingested.rejected.is_empty());

        let graph = CommitGraph::build(ingested.records).unwrap();
        prop_assert_eq!(graph.len(), steps.len());
        prop_assert!(graph.boundary_parents().is_empty());
    }

    #[test]
    fn buckets_tile_the_history_span(
        offset in 0i64..10_000_000,
        bucket_size in 1i64..6,
        daily in any::<bool>(),
    ) {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let end = start + Duration::seconds(offset);
        let config = CycleTimeConfig {
            period: if daily { Period::Day } else { Period::Week },
            bucket_size,
            window_size: 1,
        };
        let buckets = bucket_intervals(start, end, &config).unwrap();
        prop_assert_eq!(buckets.first().unwrap().start, start);
        prop_assert_eq!(buckets.last().unwrap().end, end);
        for pair in buckets.windows(2) {
            prop_assert_eq!(pair[0].end, pair[1].start);
            prop_assert!(pair[0].start < pair[0].end);
        }
    }

    #[test]
    fn engines_are_idempotent(steps in arb_history()) {
        let log = render_log(&steps);
        let records = ingest(split_blocks(&log)).unwrap().records;

        let cycle = CycleTimeConfig::default();
        prop_assert_eq!(
            cycle_time_by_commit(&records, &cycle).unwrap(),
            cycle_time_by_commit(&records, &cycle).unwrap()
        );

        let failures = ChangeFailureConfig::default();
        prop_assert_eq!(
            change_failure_rate(&records, &failures),
            change_failure_rate(&records, &failures)
        );

        let graph = CommitGraph::build(records).unwrap();
        let branches = BranchConfig::default();
        prop_assert_eq!(
            cycle_time_by_branch(&graph, &branches),
            cycle_time_by_branch(&graph, &branches)
        );
    }

    #[test]
    fn failure_rates_are_percentages(steps in arb_history()) {
        let log = render_log(&steps);
        let records = ingest(split_blocks(&log)).unwrap().records;
        for row in change_failure_rate(&records, &ChangeFailureConfig::default()) {
            prop_assert!(row.total > 0);
            prop_assert!((0.0..=100.0).contains(&row.failure_rate));
        }
    }

    #[test]
    fn branch_times_are_never_negative(steps in arb_history()) {
        let log = render_log(&steps);
        let records = ingest(split_blocks(&log)).unwrap().records;
        let graph = CommitGraph::build(records).unwrap();
        let report = cycle_time_by_branch(&graph, &BranchConfig::default());
        for lifetime in &report.lifetimes {
            if let Some(times) = lifetime.times {
                prop_assert!(times.cycle_seconds >= 0);
                prop_assert!(times.work_seconds >= 0);
                prop_assert!(times.qa_seconds >= 0);
                prop_assert_eq!(times.cycle_seconds, times.work_seconds + times.qa_seconds);
            }
        }
    }
}
