use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DoraError;

/// Top-level configuration loaded from `.gitdora.toml`.
///
/// Every section is optional; missing values fall back to defaults. The
/// sections are passed explicitly into each engine call.
///
/// # Examples
///
/// ```
/// use gitdora_core::DoraConfig;
///
/// let config = DoraConfig::default();
/// assert_eq!(config.cycle_time.bucket_size, 4);
/// assert_eq!(config.cycle_time.window_size, 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoraConfig {
    /// Cycle time between commits.
    #[serde(default)]
    pub cycle_time: CycleTimeConfig,
    /// Change failure classification.
    #[serde(default)]
    pub change_failure: ChangeFailureConfig,
    /// Branch lifetime reconstruction.
    #[serde(default)]
    pub branches: BranchConfig,
}

impl DoraConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DoraError::FileNotFound`] if `path` does not exist,
    /// [`DoraError::Io`] if it cannot be read, or [`DoraError::Toml`] if the
    /// content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gitdora_core::DoraConfig;
    /// use std::path::Path;
    ///
    /// let config = DoraConfig::from_file(Path::new(".gitdora.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, DoraError> {
        if !path.exists() {
            return Err(DoraError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`DoraError::Toml`] if parsing fails, or the error from
    /// [`DoraConfig::validate`].
    ///
    /// # Examples
    ///
    /// ```
    /// use gitdora_core::{DoraConfig, Period};
    ///
    /// let toml = r#"
    /// [cycle_time]
    /// period = "day"
    /// bucket_size = 7
    /// "#;
    /// let config = DoraConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.cycle_time.period, Period::Day);
    /// assert_eq!(config.cycle_time.bucket_size, 7);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, DoraError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no run could satisfy.
    ///
    /// Whether `window_size` fits the number of buckets depends on the
    /// history span and is checked by the cycle-time engine.
    ///
    /// # Errors
    ///
    /// Returns [`DoraError::InvalidWindow`] for a zero bucket or window
    /// size, and [`DoraError::Config`] for an empty keyword list.
    pub fn validate(&self) -> Result<(), DoraError> {
        self.cycle_time.validate()?;
        if self.change_failure.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(DoraError::Config(
                "change_failure.keywords must contain at least one keyword".into(),
            ));
        }
        Ok(())
    }
}

/// Base period that `bucket_size` counts in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// 24 hours.
    Day,
    /// 7 days.
    #[default]
    Week,
}

impl Period {
    /// Length of one period in seconds.
    pub fn seconds(self) -> i64 {
        match self {
            Period::Day => 86_400,
            Period::Week => 7 * 86_400,
        }
    }
}

/// Bucketing and windowing for cycle time between commits.
///
/// # Examples
///
/// ```
/// use gitdora_core::{CycleTimeConfig, Period};
///
/// let config = CycleTimeConfig::default();
/// assert_eq!(config.period, Period::Week);
/// assert_eq!(config.bucket_width_seconds(), 4 * 7 * 86_400);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleTimeConfig {
    /// Base period (default: week).
    #[serde(default)]
    pub period: Period,
    /// Base periods per bucket (default: 4).
    ///
    /// Signed so that a negative value reaches [`CycleTimeConfig::validate`]
    /// instead of failing inside the TOML parser.
    #[serde(default = "default_bucket_size")]
    pub bucket_size: i64,
    /// Consecutive buckets folded into one sliding window (default: 1).
    #[serde(default = "default_window_size")]
    pub window_size: i64,
}

fn default_bucket_size() -> i64 {
    4
}

fn default_window_size() -> i64 {
    1
}

impl Default for CycleTimeConfig {
    fn default() -> Self {
        Self {
            period: Period::default(),
            bucket_size: default_bucket_size(),
            window_size: default_window_size(),
        }
    }
}

impl CycleTimeConfig {
    /// Width of one bucket in seconds.
    pub fn bucket_width_seconds(&self) -> i64 {
        self.bucket_size.saturating_mul(self.period.seconds())
    }

    /// Check the parts of the configuration that do not depend on the data.
    ///
    /// # Errors
    ///
    /// Returns [`DoraError::InvalidWindow`] if either size is zero or negative.
    pub fn validate(&self) -> Result<(), DoraError> {
        if self.bucket_size <= 0 {
            return Err(DoraError::InvalidWindow(
                "bucket_size must be positive".into(),
            ));
        }
        if self.window_size <= 0 {
            return Err(DoraError::InvalidWindow(
                "window_size must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Keywords marking a commit subject as a failure-remediating fix.
///
/// # Examples
///
/// ```
/// use gitdora_core::ChangeFailureConfig;
///
/// let config = ChangeFailureConfig::default();
/// assert!(config.keywords.iter().any(|k| k == "hotfix"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeFailureConfig {
    /// Case-insensitive substrings searched for in the subject line.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
}

fn default_keywords() -> Vec<String> {
    ["revert", "hotfix", "bugfix", "bug", "fix", "problem", "issue"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for ChangeFailureConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
        }
    }
}

/// Settings for branch reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchConfig {
    /// Candidate trunk branch names, in order of preference.
    #[serde(default = "default_trunk")]
    pub trunk: Vec<String>,
}

fn default_trunk() -> Vec<String> {
    ["main", "master", "trunk", "develop"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl Default for BranchConfig {
    fn default() -> Self {
        Self {
            trunk: default_trunk(),
        }
    }
}
