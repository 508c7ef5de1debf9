//! Evidence: fuse version-control blame/log into a review-evidence score.

pub mod vcs;

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use vcs::VcsProvider;

const COMMIT_SIGNAL_VOCABULARY: &[&str] = &["refactor", "test", "type", "fix", "chore", "feat"];

static COMMIT_SIGNAL_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    COMMIT_SIGNAL_VOCABULARY
        .iter()
        .map(|word| {
            let re = Regex::new(&format!(r"\b{}\b", regex::escape(word))).expect("valid regex");
            (*word, re)
        })
        .collect()
});

/// Per-Unit review evidence (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Evidence {
    pub distinct_authors: usize,
    pub touched_after_creation: bool,
    pub touch_count_30d: usize,
    pub touch_count_90d: usize,
    pub commit_signals: Vec<String>,
    pub review_evidence: u8,
}

/// Normalize an author identity to the e-mail local-part, lowercased, with any
/// `+suffix` tag stripped.
pub fn normalize_author(raw: &str) -> String {
    let local = raw.split('@').next().unwrap_or(raw);
    let local = local.split('+').next().unwrap_or(local);
    local.to_lowercase()
}

fn extract_signals(message: &str) -> Vec<String> {
    let lower = message.to_lowercase();
    COMMIT_SIGNAL_PATTERNS
        .iter()
        .filter(|(_, pattern)| pattern.is_match(&lower))
        .map(|(word, _)| (*word).to_string())
        .collect()
}

/// Compute Evidence for a Unit's span. On history-unavailable, returns
/// all-zero Evidence and a warning message rather than failing the scan.
pub fn compute_evidence(
    vcs: &dyn VcsProvider,
    path: &Path,
    start_line: u32,
    end_line: u32,
    now: DateTime<Utc>,
    window_short_days: i64,
    window_long_days: i64,
) -> (Evidence, Option<String>) {
    let blame = match vcs.blame(path, start_line, end_line) {
        Ok(entries) if !entries.is_empty() => entries,
        Ok(_) => return (Evidence::default(), None),
        Err(e) => return (Evidence::default(), Some(e)),
    };

    let distinct_authors = blame
        .iter()
        .map(|b| normalize_author(&b.author))
        .collect::<std::collections::HashSet<_>>()
        .len();

    let t0 = blame.iter().map(|b| b.timestamp).min().unwrap_or(now);

    let log = match vcs.log(path, t0) {
        Ok(entries) => entries,
        Err(e) => return (Evidence::default(), Some(e)),
    };

    let most_recent = log
        .iter()
        .map(|e| e.timestamp)
        .chain(blame.iter().map(|b| b.timestamp))
        .max()
        .unwrap_or(t0);

    let touched_after_creation = most_recent > t0 + Duration::hours(24);

    let touch_count_30d = log
        .iter()
        .filter(|e| now - e.timestamp <= Duration::days(window_short_days))
        .count();
    let touch_count_90d = log
        .iter()
        .filter(|e| now - e.timestamp <= Duration::days(window_long_days))
        .count();

    let commit_signals: Vec<String> = log.iter().flat_map(|e| extract_signals(&e.message)).collect();

    let mut score: i32 = 0;
    if distinct_authors >= 2 {
        score += 30;
    }
    if touched_after_creation {
        score += 20;
    }
    if touch_count_90d >= 2 {
        score += 20;
    }
    if ["refactor", "test", "type"]
        .iter()
        .any(|s| commit_signals.iter().any(|c| c == s))
    {
        score += 10;
    }

    let review_evidence = score.clamp(0, 100) as u8;

    (
        Evidence {
            distinct_authors,
            touched_after_creation,
            touch_count_30d,
            touch_count_90d,
            commit_signals,
            review_evidence,
        },
        None,
    )
}
