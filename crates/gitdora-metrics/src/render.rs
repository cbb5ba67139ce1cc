//! Human-readable renderings of the metric tables: plain-text tables via
//! [`fmt::Display`] and GitHub-flavored Markdown via `to_markdown`.

use std::fmt;

use crate::author_activity::AuthorActivity;
use crate::branch_cycle::{BranchCycleReport, WeeklyBranchRow};
use crate::change_failure::MonthlyFailureRate;
use crate::commit_cycle::CommitCycleReport;
use crate::pipeline::DoraReport;
use crate::stats::Summary;
use crate::throughput::MonthlyThroughput;

/// One table of a [`DoraReport`].
#[derive(Debug, Clone, Copy)]
pub enum Section<'a> {
    CycleTime(&'a CommitCycleReport),
    Branches(&'a BranchCycleReport),
    Failures(&'a [MonthlyFailureRate]),
    Throughput(&'a [MonthlyThroughput]),
    Authors(&'a [AuthorActivity]),
}

impl Section<'_> {
    fn title(&self) -> &'static str {
        match self {
            Section::CycleTime(_) => "Cycle Time by Commit (minutes)",
            Section::Branches(_) => "Cycle Time by Branch (days)",
            Section::Failures(_) => "Change Failure Rate",
            Section::Throughput(_) => "Throughput",
            Section::Authors(_) => "Author Activity",
        }
    }

    /// Render the section as a markdown string.
    ///
    /// # Examples
    ///
    /// ```
    /// use gitdora_metrics::render::Section;
    ///
    /// let md = Section::Failures(&[]).to_markdown();
    /// assert!(md.starts_with("## Change Failure Rate"));
    /// ```
    pub fn to_markdown(&self) -> String {
        let mut out = format!("## {}\n\n", self.title());
        match self {
            Section::CycleTime(report) => {
                if report.months.is_empty() {
                    out.push_str("No author committed twice.\n\n");
                    return out;
                }
                out.push_str("| Month | Count | Sum | Average | P50 | P75 | Std |\n");
                out.push_str("|-------|-------|-----|---------|-----|-----|-----|\n");
                for row in &report.months {
                    out.push_str(&format!("| {} | {} |\n", row.month, summary_cells(&row.summary)));
                }
                out.push_str("\n### Sliding windows\n\n");
                out.push_str("| Start | End | Count | Sum | Average | P50 | P75 | Std |\n");
                out.push_str("|-------|-----|-------|-----|---------|-----|-----|-----|\n");
                for row in &report.windows {
                    out.push_str(&format!(
                        "| {} | {} | {} |\n",
                        row.interval_start.format("%Y-%m-%d"),
                        row.interval_end.format("%Y-%m-%d"),
                        summary_cells(&row.summary)
                    ));
                }
            }
            Section::Branches(report) => {
                if report.weeks.is_empty() {
                    out.push_str("No merged branches.\n\n");
                } else {
                    let mut header = String::from("| Week | Branches | Commits |");
                    let mut rule = String::from("|------|----------|---------|");
                    for metric in BRANCH_METRICS {
                        for stat in BRANCH_STATS {
                            header.push_str(&format!(" {stat} {metric} |"));
                            rule.push_str("------|");
                        }
                    }
                    out.push_str(&format!("{header}\n{rule}\n"));
                    for row in &report.weeks {
                        out.push_str(&format!(
                            "| {} | {} | {} |",
                            row.week_start.format("%Y-%m-%d"),
                            row.branch_count,
                            row.commit_count
                        ));
                        for summary in branch_summaries(row) {
                            out.push_str(&format!(
                                " {:.2} | {:.2} | {:.2} | {:.2} |",
                                summary.p50, summary.p75, summary.average, summary.std
                            ));
                        }
                        out.push('\n');
                    }
                }
                out.push_str(&format!(
                    "\n**Merged branches:** {} | **Open branches:** {}\n",
                    report.lifetimes.len(),
                    report.open_branches.len()
                ));
            }
            Section::Failures(rows) => {
                out.push_str("| Month | Commits | Failures | Rate |\n");
                out.push_str("|-------|---------|----------|------|\n");
                for row in rows.iter() {
                    out.push_str(&format!(
                        "| {} | {} | {} | {:.1}% |\n",
                        row.month, row.total, row.failures, row.failure_rate
                    ));
                }
            }
            Section::Throughput(rows) => {
                out.push_str("| Month | Commits | Active Authors | Commits/Author |\n");
                out.push_str("|-------|---------|----------------|----------------|\n");
                for row in rows.iter() {
                    out.push_str(&format!(
                        "| {} | {} | {} | {:.2} |\n",
                        row.month, row.commits, row.active_authors, row.commits_per_author
                    ));
                }
            }
            Section::Authors(rows) => {
                out.push_str("| Author | Commits | Active Weeks | Busiest Week | Percentile |\n");
                out.push_str("|--------|---------|--------------|--------------|------------|\n");
                for row in rows.iter() {
                    out.push_str(&format!(
                        "| {} | {} | {} | {} | {:.2} |\n",
                        row.author,
                        row.total_commits,
                        row.weeks.len(),
                        busiest_cell(row),
                        row.percentile_rank
                    ));
                }
            }
        }
        out.push('\n');
        out
    }
}

const BRANCH_METRICS: [&str; 4] = ["Commits", "Cycle", "QA", "Work"];
const BRANCH_STATS: [&str; 4] = ["P50", "P75", "Avg", "Std"];

/// Per-branch statistics of a weekly row, in [`BRANCH_METRICS`] order.
fn branch_summaries(row: &WeeklyBranchRow) -> [&Summary; 4] {
    [&row.commits, &row.cycle_time, &row.qa_time, &row.work_time]
}

fn busiest_cell(row: &AuthorActivity) -> String {
    row.busiest_week()
        .map(|week| format!("{} ({})", week.week_start.format("%Y-%m-%d"), week.commits))
        .unwrap_or_default()
}

fn summary_cells(s: &Summary) -> String {
    format!(
        "{} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2}",
        s.count, s.sum, s.average, s.p50, s.p75, s.std
    )
}

impl fmt::Display for Section<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title())?;
        writeln!(f, "{}", "=".repeat(self.title().len()))?;
        match self {
            Section::CycleTime(report) => {
                writeln!(
                    f,
                    "{:<10} {:>6} {:>12} {:>10} {:>10} {:>10} {:>10}",
                    "Month", "Count", "Sum", "Average", "P50", "P75", "Std"
                )?;
                writeln!(f, "{}", "-".repeat(74))?;
                for row in &report.months {
                    let s = &row.summary;
                    writeln!(
                        f,
                        "{:<10} {:>6} {:>12.2} {:>10.2} {:>10.2} {:>10.2} {:>10.2}",
                        row.month.to_string(),
                        s.count,
                        s.sum,
                        s.average,
                        s.p50,
                        s.p75,
                        s.std
                    )?;
                }
                writeln!(f, "\nSliding windows: {}", report.windows.len())?;
                for row in &report.windows {
                    writeln!(
                        f,
                        "  {} .. {}  count={}  avg={:.2}  p75={:.2}",
                        row.interval_start.format("%Y-%m-%d"),
                        row.interval_end.format("%Y-%m-%d"),
                        row.summary.count,
                        row.summary.average,
                        row.summary.p75
                    )?;
                }
            }
            Section::Branches(report) => {
                write!(f, "{:<10} {:>8} {:>8}", "Week", "Branches", "Commits")?;
                for metric in BRANCH_METRICS {
                    for stat in BRANCH_STATS {
                        write!(f, " {:>11}", format!("{metric} {}", stat.to_lowercase()))?;
                    }
                }
                writeln!(f)?;
                writeln!(f, "{}", "-".repeat(28 + 12 * BRANCH_METRICS.len() * BRANCH_STATS.len()))?;
                for row in &report.weeks {
                    write!(
                        f,
                        "{:<10} {:>8} {:>8}",
                        row.week_start.format("%Y-%m-%d").to_string(),
                        row.branch_count,
                        row.commit_count
                    )?;
                    for summary in branch_summaries(row) {
                        write!(
                            f,
                            " {:>11.2} {:>11.2} {:>11.2} {:>11.2}",
                            summary.p50, summary.p75, summary.average, summary.std
                        )?;
                    }
                    writeln!(f)?;
                }
                writeln!(
                    f,
                    "\nMerged branches: {}, open branches: {}",
                    report.lifetimes.len(),
                    report.open_branches.len()
                )?;
            }
            Section::Failures(rows) => {
                writeln!(f, "{:<10} {:>8} {:>9} {:>7}", "Month", "Commits", "Failures", "Rate")?;
                writeln!(f, "{}", "-".repeat(37))?;
                for row in rows.iter() {
                    writeln!(
                        f,
                        "{:<10} {:>8} {:>9} {:>6.1}%",
                        row.month.to_string(),
                        row.total,
                        row.failures,
                        row.failure_rate
                    )?;
                }
            }
            Section::Throughput(rows) => {
                writeln!(f, "{:<10} {:>8} {:>8} {:>15}", "Month", "Commits", "Authors", "Commits/Author")?;
                writeln!(f, "{}", "-".repeat(44))?;
                for row in rows.iter() {
                    writeln!(
                        f,
                        "{:<10} {:>8} {:>8} {:>15.2}",
                        row.month.to_string(),
                        row.commits,
                        row.active_authors,
                        row.commits_per_author
                    )?;
                }
            }
            Section::Authors(rows) => {
                writeln!(
                    f,
                    "{:<32} {:>8} {:>6} {:>18} {:>10}",
                    "Author", "Commits", "Weeks", "Busiest week", "Percentile"
                )?;
                writeln!(f, "{}", "-".repeat(78))?;
                for row in rows.iter() {
                    writeln!(
                        f,
                        "{:<32} {:>8} {:>6} {:>18} {:>10.2}",
                        row.author,
                        row.total_commits,
                        row.weeks.len(),
                        busiest_cell(row),
                        row.percentile_rank
                    )?;
                }
            }
        }
        Ok(())
    }
}

impl DoraReport {
    /// Every table in report order.
    pub fn sections(&self) -> [Section<'_>; 5] {
        [
            Section::CycleTime(&self.cycle_time),
            Section::Branches(&self.branches),
            Section::Failures(&self.failures),
            Section::Throughput(&self.throughput),
            Section::Authors(&self.authors),
        ]
    }

    /// Render the full report as a markdown string.
    pub fn to_markdown(&self) -> String {
        let mut out = String::from("# DORA Metrics\n\n");
        out.push_str(&format!(
            "**Commits:** {} analyzed, {} rejected, {} boundary parents\n\n",
            self.valid, self.rejected, self.boundary_parents
        ));
        for section in self.sections() {
            out.push_str(&section.to_markdown());
        }
        out
    }
}

impl fmt::Display for DoraReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Commits: {} analyzed, {} rejected, {} boundary parents\n",
            self.valid, self.rejected, self.boundary_parents
        )?;
        for section in self.sections() {
            writeln!(f, "{section}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::analyze;
    use gitdora_core::DoraConfig;

    const LOG: &str = "\
commit bbbb
author alice
date 2023-02-08T00:00:00Z

    bugfix: overflow

commit aaaa
author alice
date 2023-02-01T00:00:00Z

    initial
";

    #[test]
    fn text_report_has_every_section() {
        let report = analyze(LOG, &DoraConfig::default()).unwrap();
        let text = report.to_string();
        assert!(text.contains("Commits: 2 analyzed, 0 rejected"));
        assert!(text.contains("Cycle Time by Commit (minutes)"));
        assert!(text.contains("Cycle Time by Branch (days)"));
        assert!(text.contains("Change Failure Rate"));
        assert!(text.contains("Throughput"));
        assert!(text.contains("Author Activity"));
        assert!(text.contains("2023-02"));
        assert!(text.contains("50.0%"));
    }

    #[test]
    fn markdown_failure_table() {
        let report = analyze(LOG, &DoraConfig::default()).unwrap();
        let md = Section::Failures(&report.failures).to_markdown();
        assert!(md.contains("| Month | Commits | Failures | Rate |"));
        assert!(md.contains("| 2023-02 | 2 | 1 | 50.0% |"));
    }

    #[test]
    fn markdown_report_lists_monthly_cycle_time() {
        let report = analyze(LOG, &DoraConfig::default()).unwrap();
        let md = report.to_markdown();
        assert!(md.starts_with("# DORA Metrics"));
        assert!(md.contains("| 2023-02 | 1 | 10080.00 | 10080.00 | 10080.00 | 10080.00 | 0.00 |"));
        assert!(md.contains("No merged branches."));
    }

    const MERGED: &str = "\
commit dddd (main)
parents aaaa cccc
date 2023-01-06T00:00:00Z

    Merge branch 'feature'

commit cccc
parents bbbb
date 2023-01-03T00:00:00Z

    second

commit bbbb
parents aaaa
date 2023-01-01T00:00:00Z

    first

commit aaaa
date 2022-12-31T00:00:00Z

    initial
";

    #[test]
    fn markdown_branch_table_has_every_statistic() {
        let report = analyze(MERGED, &DoraConfig::default()).unwrap();
        let md = Section::Branches(&report.branches).to_markdown();
        assert!(md.contains(
            "| Week | Branches | Commits | P50 Commits | P75 Commits | Avg Commits | Std Commits | P50 Cycle |"
        ));
        assert!(md.contains("| Std QA | P50 Work | P75 Work | Avg Work | Std Work |"));
        assert!(md.contains(
            "| 2023-01-02 | 1 | 2 | 2.00 | 2.00 | 2.00 | 0.00 | 5.00 | 5.00 | 5.00 | 0.00 | 3.00 | 3.00 | 3.00 | 0.00 | 2.00 | 2.00 | 2.00 | 0.00 |"
        ));
    }

    #[test]
    fn text_branch_table_has_every_statistic() {
        let report = analyze(MERGED, &DoraConfig::default()).unwrap();
        let text = Section::Branches(&report.branches).to_string();
        for column in ["Commits p75", "Cycle std", "QA p50", "QA p75", "Work std"] {
            assert!(text.contains(column), "missing {column}: {text}");
        }
        let row = text.lines().find(|l| l.starts_with("2023-01-02")).unwrap();
        assert_eq!(row.split_whitespace().count(), 3 + 16);
    }

    #[test]
    fn markdown_author_table() {
        let report = analyze(LOG, &DoraConfig::default()).unwrap();
        let md = Section::Authors(&report.authors).to_markdown();
        assert!(md.starts_with("## Author Activity"));
        assert!(md.contains("| alice | 2 | 2 | 2023-01-30 (1) | 100.00 |"));
    }
}
