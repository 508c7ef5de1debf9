//! Version-control boundary (spec §6.5): blame and log as an injected capability
//! so the Scorer is testable without a real history store.

use chrono::{DateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug, Clone)]
pub struct BlameEntry {
    pub commit: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub commit: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Injected history capability. Implementations may shell out or use a
/// library; failures degrade Evidence to all-zero (spec §6.5).
pub trait VcsProvider: Send + Sync {
    fn blame(&self, path: &Path, start_line: u32, end_line: u32) -> Result<Vec<BlameEntry>, String>;
    fn log(&self, path: &Path, since: DateTime<Utc>) -> Result<Vec<LogEntry>, String>;
}

/// Shells out to `git`, scoped to a repository root.
pub struct GitVcs {
    repo_root: PathBuf,
}

impl GitVcs {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.repo_root)
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

impl VcsProvider for GitVcs {
    fn blame(&self, path: &Path, start_line: u32, end_line: u32) -> Result<Vec<BlameEntry>, String> {
        let rel = self.relative(path);
        let range = format!("-L{},{}", start_line, end_line);
        let output = Command::new("git")
            .arg("blame")
            .arg("--line-porcelain")
            .arg(&range)
            .arg("--")
            .arg(&rel)
            .current_dir(&self.repo_root)
            .output()
            .map_err(|e| format!("git blame failed to spawn: {e}"))?;

        if !output.status.success() {
            return Err(format!(
                "git blame exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        parse_blame_porcelain(&String::from_utf8_lossy(&output.stdout))
    }

    fn log(&self, path: &Path, since: DateTime<Utc>) -> Result<Vec<LogEntry>, String> {
        let rel = self.relative(path);
        let output = Command::new("git")
            .arg("log")
            .arg(format!("--since={}", since.to_rfc3339()))
            .arg("--format=%H%x01%ae%x01%at%x01%s")
            .arg("--")
            .arg(&rel)
            .current_dir(&self.repo_root)
            .output()
            .map_err(|e| format!("git log failed to spawn: {e}"))?;

        if !output.status.success() {
            return Err(format!(
                "git log exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .filter_map(parse_log_line)
            .collect())
    }
}

fn parse_blame_porcelain(stdout: &str) -> Result<Vec<BlameEntry>, String> {
    let mut entries = Vec::new();
    let mut commit: Option<String> = None;
    let mut author: Option<String> = None;
    let mut timestamp: Option<i64> = None;

    for line in stdout.lines() {
        if let Some(sha) = line.split_whitespace().next() {
            if sha.len() == 40 && sha.bytes().all(|b| b.is_ascii_hexdigit()) {
                commit = Some(sha.to_string());
            }
        }
        if let Some(rest) = line.strip_prefix("author-mail ") {
            author = Some(rest.trim_matches(['<', '>']).to_string());
        } else if let Some(rest) = line.strip_prefix("author-time ") {
            timestamp = rest.trim().parse::<i64>().ok();
        } else if line.starts_with('\t') {
            if let (Some(c), Some(a), Some(t)) = (&commit, &author, timestamp) {
                if let Some(ts) = Utc.timestamp_opt(t, 0).single() {
                    entries.push(BlameEntry {
                        commit: c.clone(),
                        author: a.clone(),
                        timestamp: ts,
                    });
                }
            }
        }
    }

    Ok(entries)
}

fn parse_log_line(line: &str) -> Option<LogEntry> {
    let mut parts = line.splitn(4, '\u{1}');
    let commit = parts.next()?.to_string();
    let author = parts.next()?.to_string();
    let timestamp = parts.next()?.parse::<i64>().ok()?;
    let message = parts.next().unwrap_or_default().to_string();
    Some(LogEntry {
        commit,
        author,
        timestamp: Utc.timestamp_opt(timestamp, 0).single()?,
        message,
    })
}

/// In-memory fake for tests, keyed by file path.
#[derive(Default)]
pub struct FakeVcs {
    pub blames: std::collections::HashMap<PathBuf, Vec<BlameEntry>>,
    pub logs: std::collections::HashMap<PathBuf, Vec<LogEntry>>,
}

impl FakeVcs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blame(mut self, path: impl Into<PathBuf>, entries: Vec<BlameEntry>) -> Self {
        self.blames.insert(path.into(), entries);
        self
    }

    pub fn with_log(mut self, path: impl Into<PathBuf>, entries: Vec<LogEntry>) -> Self {
        self.logs.insert(path.into(), entries);
        self
    }
}

impl VcsProvider for FakeVcs {
    fn blame(&self, path: &Path, _start_line: u32, _end_line: u32) -> Result<Vec<BlameEntry>, String> {
        self.blames
            .get(path)
            .cloned()
            .ok_or_else(|| "no history for path".to_string())
    }

    fn log(&self, path: &Path, since: DateTime<Utc>) -> Result<Vec<LogEntry>, String> {
        Ok(self
            .logs
            .get(path)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|e| e.timestamp >= since)
            .collect())
    }
}
