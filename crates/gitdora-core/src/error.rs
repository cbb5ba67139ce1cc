use std::path::PathBuf;

/// Errors that can occur across the gitdora pipeline.
///
/// Record-level problems ([`DoraError::MalformedRecord`]) are absorbed by the
/// ingestion loop; every other variant aborts the run. Library crates use
/// this type directly; the binary renders it through `miette`.
///
/// # Examples
///
/// ```
/// use gitdora_core::DoraError;
///
/// let err = DoraError::InvalidWindow("window_size 5 exceeds 3 buckets".into());
/// assert!(err.to_string().contains("exceeds 3 buckets"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DoraError {
    /// One raw record failed structural parsing.
    #[error("malformed record: invalid {field}: {detail}")]
    #[diagnostic(code(gitdora::malformed_record))]
    MalformedRecord {
        /// Name of the missing or invalid field.
        field: &'static str,
        /// What was wrong with it.
        detail: String,
    },

    /// No record survived parsing.
    #[error("history is empty: no valid commit records ({rejected} rejected)")]
    #[diagnostic(
        code(gitdora::empty_history),
        help("check that the input is a commit log with `commit`, `author` and `date` headers")
    )]
    EmptyHistory {
        /// Number of blocks that were rejected.
        rejected: usize,
    },

    /// The parent links form a cycle.
    #[error("commit graph contains a cycle through {hash}")]
    #[diagnostic(
        code(gitdora::cycle_detected),
        help("the input history is corrupt; version control history is acyclic")
    )]
    CycleDetected {
        /// A commit that lies on the cycle.
        hash: String,
    },

    /// The same commit hash appeared twice in one history.
    #[error("duplicate commit {0} in history")]
    #[diagnostic(code(gitdora::duplicate_commit))]
    DuplicateCommit(String),

    /// Bucket or window configuration cannot be satisfied.
    #[error("invalid bucket window: {0}")]
    #[diagnostic(
        code(gitdora::invalid_window),
        help("use a positive bucket_size and a window_size no larger than the number of buckets")
    )]
    InvalidWindow(String),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(gitdora::config))]
    Config(String),

    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

impl DoraError {
    /// Whether the error is absorbed at record level instead of aborting a run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DoraError::MalformedRecord { .. })
    }
}
