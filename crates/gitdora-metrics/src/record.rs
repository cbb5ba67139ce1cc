//! Commit record parsing and the ingestion loop.
//!
//! The raw history arrives as text blocks, one per commit:
//!
//! ```text
//! commit 3f2a9c1d (HEAD -> main, origin/main)
//! parents 9b1e22aa 77c0ffee
//! author Alice <alice@example.com>
//! date 2023-01-08T09:30:00+01:00
//! refs feature/login
//!
//!     Merge branch 'feature/login'
//! ```
//!
//! Header keys are case-insensitive and may end in `:`, so `git log
//! --format=fuller --date=iso-strict` output parses too. Unknown headers are
//! ignored.

use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, Utc};
use gitdora_core::{DoraError, Result};
use tracing::{debug, info, warn};

/// One commit from the ingested history.
///
/// # Examples
///
/// ```
/// use gitdora_metrics::record::parse_record;
///
/// let record = parse_record(
///     "commit abc123\nauthor alice <alice@example.com>\ndate 2023-01-01T00:00:00Z\n\n    fix: auth bug\n",
/// ).unwrap();
/// assert_eq!(record.hash, "abc123");
/// assert_eq!(record.subject(), "fix: auth bug");
/// assert!(record.parent_hashes.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Full lowercase commit hash.
    pub hash: String,
    /// Parent hashes in order; the first is the mainline parent.
    pub parent_hashes: Vec<String>,
    /// Author name.
    pub author: String,
    /// Author email, when the log carried one.
    pub email: Option<String>,
    /// Author timestamp with its original offset.
    pub timestamp: DateTime<FixedOffset>,
    /// Full message; the first line is the subject.
    pub message: String,
    /// Branch names pointing at this commit when the log was taken.
    pub branch_refs: BTreeSet<String>,
}

impl CommitRecord {
    /// First line of the message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("").trim()
    }

    /// Whether the commit has two or more parents.
    pub fn is_merge(&self) -> bool {
        self.parent_hashes.len() > 1
    }

    /// Identity used to group commits by author: the lowercase email when
    /// present, otherwise the name.
    pub fn author_key(&self) -> String {
        match &self.email {
            Some(email) => email.to_lowercase(),
            None => self.author.clone(),
        }
    }

    /// Timestamp normalized to UTC.
    pub fn utc(&self) -> DateTime<Utc> {
        self.timestamp.with_timezone(&Utc)
    }
}

/// A block the ingestion loop skipped.
#[derive(Debug)]
pub struct Rejection {
    /// Zero-based position of the block in the input.
    pub index: usize,
    /// Why the block was rejected.
    pub error: DoraError,
}

/// Result of [`ingest`]: the valid records in input order plus the rejects.
#[derive(Debug)]
pub struct Ingested {
    /// Successfully parsed records, most recent first when the log was.
    pub records: Vec<CommitRecord>,
    /// Blocks that failed to parse.
    pub rejected: Vec<Rejection>,
}

/// Parse one raw commit block.
///
/// # Errors
///
/// Returns [`DoraError::MalformedRecord`] naming `hash`, `parents` or
/// `timestamp` when that field is missing or invalid.
pub fn parse_record(block: &str) -> Result<CommitRecord> {
    let mut hash = None;
    let mut parents: Vec<String> = Vec::new();
    let mut inline_parents: Vec<String> = Vec::new();
    let mut author = None;
    let mut email = None;
    let mut date = None;
    let mut branch_refs = BTreeSet::new();
    let mut message_lines = Vec::new();

    let mut in_header = true;
    let mut seen_header = false;
    for line in block.lines() {
        if !in_header {
            message_lines.push(line);
            continue;
        }
        if line.trim().is_empty() {
            if seen_header {
                in_header = false;
            }
            continue;
        }
        // An indented line inside the header starts the message.
        if line.starts_with(char::is_whitespace) {
            in_header = false;
            message_lines.push(line);
            continue;
        }
        seen_header = true;

        let (key, value) = split_header(line);
        match key.as_str() {
            // `Commit:` in fuller output names the committer, not the hash.
            "commit" if !line.starts_with("Commit:") => {
                let (commit_part, decoration) = match value.split_once('(') {
                    Some((head, rest)) => (head, Some(rest.trim_end().trim_end_matches(')'))),
                    None => (value, None),
                };
                let mut tokens = commit_part.split_whitespace();
                if let Some(token) = tokens.next() {
                    hash = Some(parse_hash(token, "hash")?);
                }
                // `git log --parents` prints parents after the commit hash.
                for token in tokens {
                    inline_parents.push(parse_hash(token, "parents")?);
                }
                if let Some(decoration) = decoration {
                    branch_refs.extend(parse_decoration(decoration));
                }
            }
            "parent" | "parents" | "merge" => {
                for token in value.split_whitespace() {
                    parents.push(parse_hash(token, "parents")?);
                }
            }
            "author" => {
                let (name, mail) = parse_author(value);
                author = Some(name);
                email = mail;
            }
            "date" | "authordate" | "author-date" => date = Some(value.trim()),
            "refs" | "branches" => branch_refs.extend(parse_decoration(value)),
            other => debug!(header = other, "ignoring unknown header"),
        }
    }

    let hash = hash.ok_or_else(|| DoraError::MalformedRecord {
        field: "hash",
        detail: "missing commit header".into(),
    })?;
    let raw_date = date.ok_or_else(|| DoraError::MalformedRecord {
        field: "timestamp",
        detail: format!("missing date for commit {hash}"),
    })?;
    let timestamp = parse_timestamp(raw_date)?;

    // `Merge:` abbreviates its hashes; full ones on the commit line win.
    if !inline_parents.is_empty() {
        parents = inline_parents;
    }
    let mut seen = BTreeSet::new();
    parents.retain(|p| seen.insert(p.clone()));

    let author = author
        .filter(|a| !a.is_empty())
        .or_else(|| email.clone())
        .unwrap_or_else(|| "unknown".to_string());

    Ok(CommitRecord {
        hash,
        parent_hashes: parents,
        author,
        email,
        timestamp,
        message: dedent(&message_lines),
        branch_refs,
    })
}

/// Cut a whole log stream into per-commit blocks at `commit <hash>` lines.
///
/// A `commit ` line whose first word is not hex stays in the current block,
/// so unindented message bodies (`--format=%H%n%B`) are not cut. Text before the first header becomes a block of its own so that the
/// ingestion loop can count it as rejected.
///
/// # Examples
///
/// ```
/// use gitdora_metrics::record::split_blocks;
///
/// let log = "commit aaaa\ndate 2023-01-02T00:00:00Z\n\ncommit bbbb\ndate 2023-01-01T00:00:00Z\n";
/// assert_eq!(split_blocks(log).len(), 2);
/// ```
pub fn split_blocks(text: &str) -> Vec<&str> {
    let mut starts = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if starts_block(line) {
            starts.push(offset);
        }
        offset += line.len();
    }
    if starts.first() != Some(&0) {
        starts.insert(0, 0);
    }

    let mut blocks = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        let block = &text[start..end];
        if !block.trim().is_empty() {
            blocks.push(block);
        }
    }
    blocks
}

/// Parse every block, skipping and counting the malformed ones.
///
/// # Errors
///
/// Returns [`DoraError::EmptyHistory`] when no block yields a valid record.
///
/// # Examples
///
/// ```
/// use gitdora_metrics::record::ingest;
///
/// let blocks = [
///     "commit aaaa\nauthor bob\ndate 2023-01-02T00:00:00Z\n",
///     "author nobody\ndate 2023-01-01T00:00:00Z\n",
/// ];
/// let ingested = ingest(blocks).unwrap();
/// assert_eq!(ingested.records.len(), 1);
/// assert_eq!(ingested.rejected.len(), 1);
/// ```
pub fn ingest<I>(blocks: I) -> Result<Ingested>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut records = Vec::new();
    let mut rejected = Vec::new();

    for (index, block) in blocks.into_iter().enumerate() {
        match parse_record(block.as_ref()) {
            Ok(record) => records.push(record),
            Err(error) if error.is_recoverable() => {
                warn!(index, %error, "skipping malformed commit record");
                rejected.push(Rejection { index, error });
            }
            Err(error) => return Err(error),
        }
    }

    if records.is_empty() {
        return Err(DoraError::EmptyHistory {
            rejected: rejected.len(),
        });
    }

    info!(
        valid = records.len(),
        rejected = rejected.len(),
        "ingested commit records"
    );
    Ok(Ingested { records, rejected })
}

fn starts_block(line: &str) -> bool {
    let Some(rest) = line
        .get(..7)
        .filter(|prefix| prefix.eq_ignore_ascii_case("commit "))
        .map(|_| &line[7..])
    else {
        return false;
    };
    rest.split_whitespace()
        .next()
        .is_some_and(|token| parse_hash(token, "hash").is_ok())
}

fn split_header(line: &str) -> (String, &str) {
    let line = line.trim_end();
    let (key, value) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    (key.trim_end_matches(':').to_ascii_lowercase(), value.trim())
}

fn parse_hash(token: &str, field: &'static str) -> Result<String> {
    let valid = (4..=64).contains(&token.len()) && token.chars().all(|c| c.is_ascii_hexdigit());
    if !valid {
        return Err(DoraError::MalformedRecord {
            field,
            detail: format!("{token:?} is not a commit hash"),
        });
    }
    Ok(token.to_ascii_lowercase())
}

fn parse_author(value: &str) -> (String, Option<String>) {
    match value.split_once('<') {
        Some((name, rest)) => {
            let mail = rest.trim_end().trim_end_matches('>').trim();
            let mail = (!mail.is_empty()).then(|| mail.to_string());
            (name.trim().to_string(), mail)
        }
        None => (value.trim().to_string(), None),
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z"))
        .map_err(|e| DoraError::MalformedRecord {
            field: "timestamp",
            detail: format!("{raw:?} is not ISO-8601 with an offset: {e}"),
        })
}

/// Branch names from git decoration syntax (`HEAD -> main, tag: v1, origin/x`).
fn parse_decoration(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|item| {
            let item = item.trim();
            let item = item.strip_prefix("HEAD -> ").unwrap_or(item);
            if item.is_empty()
                || item == "HEAD"
                || item == "grafted"
                || item.starts_with("tag:")
                || item.starts_with("refs/tags/")
            {
                return None;
            }
            let name = item
                .strip_prefix("refs/heads/")
                .or_else(|| item.strip_prefix("refs/remotes/"))
                .unwrap_or(item);
            Some(name.to_string())
        })
        .collect()
}

fn dedent(lines: &[&str]) -> String {
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);

    let body: Vec<&str> = lines
        .iter()
        .map(|l| l.get(indent..).unwrap_or("").trim_end())
        .collect();
    body.join("\n").trim_matches('\n').to_string()
}
