//! DORA-style delivery metrics mined from a textual git history.
//!
//! Parses `git log` blocks into commit records, assembles them into a commit
//! graph that tolerates truncated history, and computes cycle time between
//! commits, cycle time by branch, change failure rate, monthly throughput and
//! per-author activity.
//! Every engine is a pure function of its input and configuration.

pub mod author_activity;
pub mod branch_cycle;
pub mod change_failure;
pub mod commit_cycle;
pub mod graph;
pub mod pipeline;
pub mod record;
pub mod render;
pub mod stats;
pub mod throughput;
