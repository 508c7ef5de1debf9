//! Pipeline: orchestrates full vs incremental scans, fans work out across
//! `rayon`, and assembles the immutable `ScanReport` (spec §4.8, §5).

use crate::cache::{evidence_key, similarity_key, snapshot_key, unit_key, Cache, CacheStore};
use crate::core::config::{Config, COMMIT_SIGNAL_VOCABULARY, REACTIVE_EFFECT_HOOKS, SIDE_EFFECT_CALLEES};
use crate::core::error::{Error, Result};
use crate::evidence::vcs::VcsProvider;
use crate::evidence::{compute_evidence, Evidence};
use crate::extractor::{extract_file, Unit};
use crate::rules::{self, EvalContext, Finding, RuleFile};
use crate::scorer::{self, Aggregates, UnitScores};
use crate::similarity::minhash::MinHashSignature;
use crate::similarity::normalize;
use crate::similarity::{self, Cluster};
use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

const EXTRACTOR_VERSION: &str = "1";
const NORMALIZER_VERSION: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanKind {
    Full,
    Incremental,
}

/// The Engine's input (spec §6.1).
pub struct ScanRequest {
    pub kind: ScanKind,
    pub root: PathBuf,
    pub repo_name: String,
    pub commit: String,
    pub branch: Option<String>,
    pub changed_files: Vec<PathBuf>,
    /// Custom rule file (spec §6.3: "loaded via `--rules <path>` or a bundled
    /// default"); `None` falls back to the embedded default ruleset.
    pub rules_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryCoordinates {
    pub name: String,
    pub commit: String,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    pub kind: String,
    pub path: Option<PathBuf>,
    pub message: String,
}

/// A ranked hotspot: a shadow Unit surfaced in the report's hotspot list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotspot {
    pub unit_id: String,
    pub file: PathBuf,
    pub name: String,
    pub cognitive_load: u8,
    pub review_evidence: u8,
}

/// Immutable snapshot of a completed scan (spec §3, §6.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub scan_id: String,
    pub scan_kind: ScanKind,
    pub repository: RepositoryCoordinates,
    pub timestamp: DateTime<Utc>,
    pub aggregates: Aggregates,
    pub hotspots: Vec<Hotspot>,
    pub clusters: Vec<Cluster>,
    pub findings: Vec<Finding>,
    pub warnings: Vec<ScanWarning>,
}

/// Fatal-error record returned instead of a `ScanReport` (spec §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanFailure {
    pub scan_id: String,
    pub stage: String,
    pub reason: String,
}

struct Deadline {
    start: Instant,
    budget_secs: u64,
}

impl Deadline {
    fn check(&self, stage: &str) -> Result<()> {
        let elapsed = self.start.elapsed();
        if elapsed.as_secs() > self.budget_secs {
            return Err(Error::Deadline {
                stage: stage.to_string(),
                elapsed_ms: elapsed.as_millis(),
            });
        }
        Ok(())
    }
}

struct FileUnits {
    units: Vec<Unit>,
    evidences: HashMap<String, Evidence>,
    warnings: Vec<ScanWarning>,
}

/// A repository's last-known full unit/evidence/cluster state, persisted so an
/// incremental scan can merge its changed-file results back into the whole
/// (spec §4.6/§4.8: "reuse prior ScanReport's clusters for Units not in the
/// changed set; merge with prior clusters by Unit identifier").
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RepoSnapshot {
    units: Vec<Unit>,
    evidences: HashMap<String, Evidence>,
    clusters: Vec<Cluster>,
    /// Unit ids flagged shadow as of this scan, for computing
    /// `shadow_resolved_since_last_scan` on the next one.
    shadow_unit_ids: std::collections::HashSet<String>,
    /// First-seen timestamp of each currently-shadow Unit, for computing
    /// `shadow_created_last_30d` on the next scan.
    shadow_first_seen: HashMap<String, DateTime<Utc>>,
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn span_hash(start_line: u32, end_line: u32) -> String {
    format!("{start_line}:{end_line}")
}

fn process_file(
    path: &Path,
    config: &Config,
    cache: &Cache,
    vcs: &dyn VcsProvider,
    commit: &str,
    now: DateTime<Utc>,
) -> FileUnits {
    let mut warnings = Vec::new();

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warnings.push(ScanWarning {
                kind: "input".to_string(),
                path: Some(path.to_path_buf()),
                message: e.to_string(),
            });
            return FileUnits {
                units: Vec::new(),
                evidences: HashMap::new(),
                warnings,
            };
        }
    };

    let file_hash = content_hash(&content);
    let ukey = unit_key(&file_hash, EXTRACTOR_VERSION);

    let units: Vec<Unit> = if let Some(cached) = cache.get::<Vec<Unit>>(&ukey) {
        cached
    } else {
        let (units, warning) =
            extract_file(path, &content, REACTIVE_EFFECT_HOOKS, SIDE_EFFECT_CALLEES);
        if let Some(w) = warning {
            warnings.push(ScanWarning {
                kind: "parse".to_string(),
                path: Some(w.file),
                message: w.message,
            });
        }
        let _ = cache.put(&ukey, &units, config.cache.full_ttl_secs);
        units
    };

    let mut evidences = HashMap::new();
    for unit in &units {
        let ekey = evidence_key(
            commit,
            &path.to_string_lossy(),
            &span_hash(unit.start_line, unit.end_line),
        );
        let evidence = if let Some(cached) = cache.get::<Evidence>(&ekey) {
            cached
        } else {
            let (evidence, warning) = compute_evidence(
                vcs,
                path,
                unit.start_line,
                unit.end_line,
                now,
                config.evidence.window_short_days as i64,
                config.evidence.window_long_days as i64,
            );
            if let Some(message) = warning {
                warnings.push(ScanWarning {
                    kind: "history".to_string(),
                    path: Some(path.to_path_buf()),
                    message,
                });
            }
            let _ = cache.put(&ekey, &evidence, config.cache.full_ttl_secs);
            evidence
        };
        evidences.insert(unit.id.clone(), evidence);
    }

    FileUnits {
        units,
        evidences,
        warnings,
    }
}

/// Run a scan per the request, consulting the cache, fanning per-file work
/// across `rayon`, then running the clustering and scoring barrier steps.
pub fn run_scan(
    request: &ScanRequest,
    config: &Config,
    store: &dyn CacheStore,
    vcs: &dyn VcsProvider,
    scan_id: String,
    now: DateTime<Utc>,
) -> std::result::Result<ScanReport, ScanFailure> {
    run_scan_from(request, config, store, vcs, scan_id, now, Instant::now())
}

/// Same as [`run_scan`] but takes an explicit clock start, so deadline
/// enforcement can be exercised deterministically in tests.
fn run_scan_from(
    request: &ScanRequest,
    config: &Config,
    store: &dyn CacheStore,
    vcs: &dyn VcsProvider,
    scan_id: String,
    now: DateTime<Utc>,
    start: Instant,
) -> std::result::Result<ScanReport, ScanFailure> {
    let budget_secs = match request.kind {
        ScanKind::Full => config.deadline.full_scan_secs,
        ScanKind::Incremental => config.deadline.incremental_scan_secs,
    };
    let deadline = Deadline { start, budget_secs };
    let cache = Cache::new(store);

    let ingest = crate::ingest::Ingest::new(&request.root, &config.ingest);
    let ingest_result = match request.kind {
        ScanKind::Full => ingest.scan(),
        ScanKind::Incremental => ingest.scan_changed(&request.changed_files),
    };
    let ingest_result = ingest_result.map_err(|e| ScanFailure {
        scan_id: scan_id.clone(),
        stage: "ingest".to_string(),
        reason: e.to_string(),
    })?;

    if let Err(e) = deadline.check("ingest") {
        return Err(ScanFailure {
            scan_id,
            stage: "ingest".to_string(),
            reason: e.to_string(),
        });
    }

    let file_results: Vec<FileUnits> = ingest_result
        .files
        .par_iter()
        .map(|path| process_file(path, config, &cache, vcs, &request.commit, now))
        .collect();

    if let Err(e) = deadline.check("extract") {
        return Err(ScanFailure {
            scan_id,
            stage: "extract".to_string(),
            reason: e.to_string(),
        });
    }

    let mut warnings: Vec<ScanWarning> = ingest_result
        .warnings
        .into_iter()
        .map(|w| ScanWarning {
            kind: "input".to_string(),
            path: Some(w.path),
            message: w.message,
        })
        .collect();

    let processed_files: std::collections::HashSet<PathBuf> =
        ingest_result.files.iter().cloned().collect();

    let mut changed_units: Vec<Unit> = Vec::new();
    let mut changed_evidences: HashMap<String, Evidence> = HashMap::new();
    for mut result in file_results {
        changed_units.append(&mut result.units);
        changed_evidences.extend(result.evidences);
        warnings.extend(result.warnings);
    }
    let changed_ids: std::collections::HashSet<String> =
        changed_units.iter().map(|u| u.id.clone()).collect();

    let snap_key = snapshot_key(&request.repo_name);
    let prior_snapshot: Option<RepoSnapshot> = cache.get(&snap_key);

    // Incremental scans reuse the prior snapshot's Units/Evidence for files
    // that were not reprocessed this scan (spec §4.6/§4.8); a full scan's
    // result is self-contained and never pulls in stale state.
    let (units, evidences, prior_clusters) = match (request.kind, &prior_snapshot) {
        (ScanKind::Incremental, Some(snapshot)) => {
            let mut units = changed_units;
            let mut evidences = changed_evidences;
            for unit in &snapshot.units {
                if !processed_files.contains(&unit.file) {
                    units.push(unit.clone());
                }
            }
            for (id, evidence) in &snapshot.evidences {
                evidences.entry(id.clone()).or_insert_with(|| evidence.clone());
            }
            (units, evidences, snapshot.clusters.clone())
        }
        _ => (changed_units, changed_evidences, Vec::new()),
    };

    // Content grouping for the magic-string-repetition rule operates per file.
    let mut units_by_file: HashMap<PathBuf, Vec<&Unit>> = HashMap::new();
    for unit in &units {
        units_by_file.entry(unit.file.clone()).or_default().push(unit);
    }
    let mut file_string_counts: HashMap<PathBuf, HashMap<String, usize>> = HashMap::new();
    for (file, file_units) in &units_by_file {
        let owned: Vec<Unit> = file_units.iter().map(|u| (*u).clone()).collect();
        file_string_counts.insert(file.clone(), rules::file_string_literal_counts(&owned));
    }

    if let Err(e) = deadline.check("cluster") {
        return Err(ScanFailure {
            scan_id,
            stage: "cluster".to_string(),
            reason: e.to_string(),
        });
    }

    let clusters = match request.kind {
        ScanKind::Incremental if prior_snapshot.is_some() => {
            cluster_units_incremental(&units, &changed_ids, &prior_clusters, config, &cache)
        }
        _ => cluster_units(&units, config, &cache),
    };
    let mut cluster_of: HashMap<String, String> = HashMap::new();
    let mut cluster_members: std::collections::HashSet<String> = std::collections::HashSet::new();
    for (idx, c) in clusters.iter().enumerate() {
        let cluster_id = format!("cluster-{idx}");
        for member in &c.members {
            cluster_of.insert(member.clone(), cluster_id.clone());
            cluster_members.insert(member.clone());
        }
    }

    if let Err(e) = deadline.check("rules") {
        return Err(ScanFailure {
            scan_id,
            stage: "rules".to_string(),
            reason: e.to_string(),
        });
    }

    let loaded_ruleset: RuleFile;
    let ruleset: &RuleFile = match &request.rules_path {
        Some(path) => {
            loaded_ruleset = RuleFile::load(path).map_err(|e| ScanFailure {
                scan_id: scan_id.clone(),
                stage: "rules".to_string(),
                reason: e,
            })?;
            &loaded_ruleset
        }
        None => rules::default_ruleset(),
    };
    let mut findings: Vec<Finding> = Vec::new();
    let mut scores: Vec<UnitScores> = Vec::new();
    let mut hotspot_candidates: Vec<Hotspot> = Vec::new();

    for unit in &units {
        let empty_counts = HashMap::new();
        let counts = file_string_counts.get(&unit.file).unwrap_or(&empty_counts);
        let ctx = EvalContext {
            cluster_members: &cluster_members,
            file_string_literal_counts: counts,
        };
        findings.extend(rules::evaluate(unit, ruleset, &ctx));

        let evidence = evidences.get(&unit.id).cloned().unwrap_or_default();
        let load = scorer::cognitive_load(unit, &config.scoring);
        let shadow = scorer::is_shadow(load, evidence.review_evidence, &config.scoring);
        let fragility = scorer::fragility(load, &evidence);

        scores.push(UnitScores {
            unit_id: unit.id.clone(),
            cognitive_load: load,
            review_evidence: evidence.review_evidence,
            shadow,
            fragility,
            redundancy_cluster_id: cluster_of.get(&unit.id).cloned(),
        });

        if shadow {
            hotspot_candidates.push(Hotspot {
                unit_id: unit.id.clone(),
                file: unit.file.clone(),
                name: unit.name.clone(),
                cognitive_load: load,
                review_evidence: evidence.review_evidence,
            });
        }
    }

    if let Err(e) = deadline.check("score") {
        return Err(ScanFailure {
            scan_id,
            stage: "score".to_string(),
            reason: e.to_string(),
        });
    }

    hotspot_candidates.sort_by_key(|h| std::cmp::Reverse(h.cognitive_load));
    let hotspots = if hotspot_candidates.len() >= 5 {
        hotspot_candidates.into_iter().take(5).collect()
    } else {
        let mut all: Vec<Hotspot> = units
            .iter()
            .map(|u| {
                let evidence = evidences.get(&u.id).cloned().unwrap_or_default();
                Hotspot {
                    unit_id: u.id.clone(),
                    file: u.file.clone(),
                    name: u.name.clone(),
                    cognitive_load: scorer::cognitive_load(u, &config.scoring),
                    review_evidence: evidence.review_evidence,
                }
            })
            .collect();
        all.sort_by_key(|h| std::cmp::Reverse(h.cognitive_load));
        all.into_iter().take(5).collect()
    };

    findings.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.rule_id.cmp(&b.rule_id)));

    let current_shadow_ids: std::collections::HashSet<String> = scores
        .iter()
        .filter(|s| s.shadow)
        .map(|s| s.unit_id.clone())
        .collect();

    // Refactoring Runway is "insufficient data" only on a repo's first scan
    // (spec §4.5); every later scan diffs the shadow-unit set against the
    // persisted snapshot to find what was created or resolved since.
    let (shadow_created_last_30d, shadow_resolved_since_last_scan, shadow_first_seen) =
        match &prior_snapshot {
            Some(snapshot) => {
                let mut first_seen = snapshot.shadow_first_seen.clone();
                for id in &current_shadow_ids {
                    first_seen.entry(id.clone()).or_insert(now);
                }
                first_seen.retain(|id, _| current_shadow_ids.contains(id));

                let thirty_days_ago = now - Duration::days(30);
                let created = current_shadow_ids
                    .iter()
                    .filter(|id| {
                        first_seen.get(id.as_str()).is_some_and(|t| *t > thirty_days_ago)
                    })
                    .count();
                let resolved = snapshot
                    .shadow_unit_ids
                    .iter()
                    .filter(|id| !current_shadow_ids.contains(id.as_str()))
                    .count();
                (Some(created), Some(resolved), first_seen)
            }
            None => {
                let first_seen = current_shadow_ids.iter().map(|id| (id.clone(), now)).collect();
                (None, None, first_seen)
            }
        };

    let aggregates = Aggregates::compute(
        &scores,
        clusters.len(),
        shadow_created_last_30d,
        shadow_resolved_since_last_scan,
    );

    let snapshot = RepoSnapshot {
        units: units.clone(),
        evidences: evidences.clone(),
        clusters: clusters.clone(),
        shadow_unit_ids: current_shadow_ids,
        shadow_first_seen,
    };
    let _ = cache.put(&snap_key, &snapshot, config.cache.full_ttl_secs);

    Ok(ScanReport {
        scan_id,
        scan_kind: request.kind,
        repository: RepositoryCoordinates {
            name: request.repo_name.clone(),
            commit: request.commit.clone(),
            branch: request.branch.clone(),
        },
        timestamp: now,
        aggregates,
        hotspots,
        clusters,
        findings,
        warnings,
    })
}

/// Shingle set and MinHash signature for one Unit, persisted so a rerun
/// over an unchanged Unit skips renormalizing its source (spec §6.2).
#[derive(Serialize, Deserialize)]
struct CachedSignature {
    shingles: Vec<String>,
    signature: Vec<u64>,
}

fn cluster_units(units: &[Unit], config: &Config, cache: &Cache) -> Vec<Cluster> {
    // Similarity clustering is a global barrier (spec §5); shingle caching
    // just spares recomputation of the normalized token stream per unit.
    let mut shingle_sets = Vec::with_capacity(units.len());
    let mut signatures = Vec::with_capacity(units.len());

    for unit in units {
        let key = similarity_key(&unit.id, NORMALIZER_VERSION);
        if let Some(cached) = cache.get::<CachedSignature>(&key) {
            shingle_sets.push(cached.shingles.into_iter().collect());
            signatures.push(MinHashSignature::from_values(cached.signature));
            continue;
        }

        let shingles = normalize::shingles(&unit.source, config.similarity.shingle_size);
        let signature =
            MinHashSignature::compute(&shingles, config.similarity.minhash_permutations);
        let cached = CachedSignature {
            shingles: shingles.iter().cloned().collect(),
            signature: signature.values().to_vec(),
        };
        let _ = cache.put(&key, &cached, config.cache.full_ttl_secs);
        shingle_sets.push(shingles);
        signatures.push(signature);
    }

    similarity::cluster_with_signatures(units, &shingle_sets, &signatures, &config.similarity)
}

/// Incremental clustering (spec §4.6/§4.8): clusters untouched by a changed
/// Unit are reused verbatim; clusters containing a changed Unit, plus any
/// Unit the prior scan never clustered, are recomputed together.
fn cluster_units_incremental(
    units: &[Unit],
    changed_ids: &std::collections::HashSet<String>,
    prior_clusters: &[Cluster],
    config: &Config,
    cache: &Cache,
) -> Vec<Cluster> {
    let unit_by_id: HashMap<&str, &Unit> = units.iter().map(|u| (u.id.as_str(), u)).collect();

    let mut known_ids: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut recompute_ids: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut reused: Vec<Cluster> = Vec::new();

    for cluster in prior_clusters {
        for member in &cluster.members {
            known_ids.insert(member.clone());
        }
        let touched = cluster.members.iter().any(|m| changed_ids.contains(m));
        let survivors: Vec<&String> = cluster
            .members
            .iter()
            .filter(|m| unit_by_id.contains_key(m.as_str()))
            .collect();
        if touched || survivors.len() != cluster.members.len() {
            for member in survivors {
                recompute_ids.insert(member.clone());
            }
        } else {
            reused.push(cluster.clone());
        }
    }

    for id in changed_ids {
        if unit_by_id.contains_key(id.as_str()) {
            recompute_ids.insert(id.clone());
        }
    }

    // Units the prior scan never placed in any cluster are candidates too:
    // they have no prior cluster to anchor a reuse decision and may now
    // match a changed Unit.
    for unit in units {
        if !known_ids.contains(&unit.id) {
            recompute_ids.insert(unit.id.clone());
        }
    }

    if recompute_ids.is_empty() {
        return reused;
    }

    // A changed/new Unit must be compared against reused clusters' members
    // too, or it can never merge into an existing cluster it now matches —
    // so pull those members in as context alongside the recompute set.
    let mut candidate_ids = recompute_ids.clone();
    for cluster in &reused {
        for member in &cluster.members {
            candidate_ids.insert(member.clone());
        }
    }

    let candidate_units: Vec<Unit> = candidate_ids
        .iter()
        .filter_map(|id| unit_by_id.get(id.as_str()).map(|u| (*u).clone()))
        .collect();

    let recomputed = cluster_units(&candidate_units, config, cache);

    let covered_ids: std::collections::HashSet<&String> =
        recomputed.iter().flat_map(|c| c.members.iter()).collect();
    reused.retain(|c| !c.members.iter().any(|m| covered_ids.contains(m)));

    reused.into_iter().chain(recomputed).collect()
}

/// Fixed commit-signal vocabulary, re-exported for CLI `rules` inspection.
pub fn commit_signal_vocabulary() -> &'static [&'static str] {
    COMMIT_SIGNAL_VOCABULARY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::evidence::vcs::FakeVcs;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn empty_repository_scan_has_zero_units() {
        let tmp = TempDir::new().unwrap();
        let config = Config::default();
        let store = MemoryCache::new();
        let vcs = FakeVcs::new();
        let request = ScanRequest {
            kind: ScanKind::Full,
            root: tmp.path().to_path_buf(),
            repo_name: "test".to_string(),
            commit: "deadbeef".to_string(),
            branch: None,
            changed_files: vec![],
            rules_path: None,
        };
        let report = run_scan(&request, &config, &store, &vcs, "scan-1".to_string(), Utc::now())
            .unwrap();
        assert_eq!(report.aggregates.total_units, 0);
        assert_eq!(report.aggregates.shadow_logic_density, 0.0);
        assert_eq!(report.aggregates.refactoring_runway_months, None);
    }

    #[test]
    fn scan_surfaces_parse_warning_for_unreadable_file() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.ts", "export function f() { return 1; }");
        let config = Config::default();
        let store = MemoryCache::new();
        let vcs = FakeVcs::new();
        let request = ScanRequest {
            kind: ScanKind::Full,
            root: tmp.path().to_path_buf(),
            repo_name: "test".to_string(),
            commit: "deadbeef".to_string(),
            branch: None,
            changed_files: vec![],
            rules_path: None,
        };
        let report = run_scan(&request, &config, &store, &vcs, "scan-2".to_string(), Utc::now())
            .unwrap();
        assert_eq!(report.aggregates.total_units, 0);
    }

    #[test]
    fn cache_idempotence_same_commit_yields_same_density() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "a.ts",
            "function refreshTokenIfExpired(x) {\n  if (x) {\n    if (x) {\n      if (x) {\n        if (x) {\n          if (x) {\n            return 1;\n          }\n        }\n      }\n    }\n  }\n  return 0;\n}\n",
        );
        let config = Config::default();
        let vcs = FakeVcs::new();
        let request = ScanRequest {
            kind: ScanKind::Full,
            root: tmp.path().to_path_buf(),
            repo_name: "test".to_string(),
            commit: "c1".to_string(),
            branch: None,
            changed_files: vec![],
            rules_path: None,
        };

        let cold_store = MemoryCache::new();
        let cold = run_scan(&request, &config, &cold_store, &vcs, "s".to_string(), Utc::now()).unwrap();

        let warm_store = MemoryCache::new();
        let _ = run_scan(&request, &config, &warm_store, &vcs, "s".to_string(), Utc::now()).unwrap();
        let warm = run_scan(&request, &config, &warm_store, &vcs, "s".to_string(), Utc::now()).unwrap();

        assert_eq!(cold.aggregates.total_units, warm.aggregates.total_units);
        assert_eq!(cold.aggregates.shadow_logic_density, warm.aggregates.shadow_logic_density);
    }

    #[test]
    fn incremental_scan_over_all_files_matches_full_scan() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.ts", "export function f(x) {\n  if (x) {\n    return 1;\n  }\n  return 0;\n}\n");
        write(tmp.path(), "b.ts", "export function g(x) {\n  if (x) {\n    return 2;\n  }\n  return 0;\n}\n");
        let config = Config::default();
        let vcs = FakeVcs::new();
        let now = Utc::now();

        let full_request = ScanRequest {
            kind: ScanKind::Full,
            root: tmp.path().to_path_buf(),
            repo_name: "test".to_string(),
            commit: "c1".to_string(),
            branch: None,
            changed_files: vec![],
            rules_path: None,
        };
        let full_store = MemoryCache::new();
        let full =
            run_scan(&full_request, &config, &full_store, &vcs, "s".to_string(), now).unwrap();

        let incremental_request = ScanRequest {
            kind: ScanKind::Incremental,
            root: tmp.path().to_path_buf(),
            repo_name: "test".to_string(),
            commit: "c1".to_string(),
            branch: None,
            changed_files: vec![PathBuf::from("a.ts"), PathBuf::from("b.ts")],
            rules_path: None,
        };
        let incremental_store = MemoryCache::new();
        let incremental = run_scan(
            &incremental_request,
            &config,
            &incremental_store,
            &vcs,
            "s".to_string(),
            now,
        )
        .unwrap();

        assert_eq!(full.aggregates.total_units, incremental.aggregates.total_units);
        assert_eq!(
            full.aggregates.shadow_logic_density,
            incremental.aggregates.shadow_logic_density
        );
    }

    #[test]
    fn incremental_scan_over_a_true_subset_keeps_unchanged_units() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.ts", "export function f(x) {\n  if (x) {\n    return 1;\n  }\n  return 0;\n}\n");
        write(tmp.path(), "b.ts", "export function g(x) {\n  if (x) {\n    return 2;\n  }\n  return 0;\n}\n");
        let config = Config::default();
        let vcs = FakeVcs::new();
        let now = Utc::now();
        let store = MemoryCache::new();

        let full_request = ScanRequest {
            kind: ScanKind::Full,
            root: tmp.path().to_path_buf(),
            repo_name: "test".to_string(),
            commit: "c1".to_string(),
            branch: None,
            changed_files: vec![],
            rules_path: None,
        };
        let full = run_scan(&full_request, &config, &store, &vcs, "s1".to_string(), now).unwrap();
        assert_eq!(full.aggregates.total_units, 2);

        // Only a.ts changed: the incremental scan must still report both
        // Units, since b.ts's Unit is untouched and carried over from the
        // prior snapshot.
        let incremental_request = ScanRequest {
            kind: ScanKind::Incremental,
            root: tmp.path().to_path_buf(),
            repo_name: "test".to_string(),
            commit: "c2".to_string(),
            branch: None,
            changed_files: vec![PathBuf::from("a.ts")],
            rules_path: None,
        };
        let incremental =
            run_scan(&incremental_request, &config, &store, &vcs, "s2".to_string(), now).unwrap();

        assert_eq!(incremental.aggregates.total_units, 2);
    }

    #[test]
    fn incremental_cluster_recompute_still_finds_pair_across_changed_and_unchanged_file() {
        let tmp = TempDir::new().unwrap();
        let body = "function formatResponse(payload) {\n  const body = payload.body;\n  const status = payload.status;\n  if (status === 200) {\n    return { body, status, ok: true };\n  }\n  return { body, status, ok: false };\n}\n";
        write(tmp.path(), "format.ts", body);
        write(tmp.path(), "unrelated.ts", "export function noop(x) {\n  if (x) {\n    return x;\n  }\n  return null;\n}\n");
        let config = Config::default();
        let vcs = FakeVcs::new();
        let now = Utc::now();
        let store = MemoryCache::new();

        let full_request = ScanRequest {
            kind: ScanKind::Full,
            root: tmp.path().to_path_buf(),
            repo_name: "test".to_string(),
            commit: "c1".to_string(),
            branch: None,
            changed_files: vec![],
            rules_path: None,
        };
        let full = run_scan(&full_request, &config, &store, &vcs, "s1".to_string(), now).unwrap();
        assert!(full.clusters.is_empty());

        // A new file, near-identical to format.ts, is added and is the only
        // changed file; the incremental scan must still detect the new
        // cross-file cluster even though format.ts itself wasn't reprocessed.
        let transform_body = body.replace("formatResponse", "transformPayload");
        write(tmp.path(), "transform.ts", &transform_body);
        let incremental_request = ScanRequest {
            kind: ScanKind::Incremental,
            root: tmp.path().to_path_buf(),
            repo_name: "test".to_string(),
            commit: "c2".to_string(),
            branch: None,
            changed_files: vec![PathBuf::from("transform.ts")],
            rules_path: None,
        };
        let incremental =
            run_scan(&incremental_request, &config, &store, &vcs, "s2".to_string(), now).unwrap();

        assert_eq!(incremental.aggregates.total_units, 3);
        assert_eq!(incremental.clusters.len(), 1);
        assert_eq!(incremental.clusters[0].members.len(), 2);
    }

    #[test]
    fn incremental_new_unit_merges_into_an_already_existing_reused_cluster() {
        let tmp = TempDir::new().unwrap();
        let body = "function formatResponse(payload) {\n  const body = payload.body;\n  const status = payload.status;\n  if (status === 200) {\n    return { body, status, ok: true };\n  }\n  return { body, status, ok: false };\n}\n";
        write(tmp.path(), "format.ts", body);
        write(tmp.path(), "transform.ts", &body.replace("formatResponse", "transformPayload"));
        let config = Config::default();
        let vcs = FakeVcs::new();
        let now = Utc::now();
        let store = MemoryCache::new();

        let full_request = ScanRequest {
            kind: ScanKind::Full,
            root: tmp.path().to_path_buf(),
            repo_name: "test".to_string(),
            commit: "c1".to_string(),
            branch: None,
            changed_files: vec![],
            rules_path: None,
        };
        let full = run_scan(&full_request, &config, &store, &vcs, "s1".to_string(), now).unwrap();
        assert_eq!(full.clusters.len(), 1);
        assert_eq!(full.clusters[0].members.len(), 2);

        // A third near-duplicate is added and is the only changed file; it
        // must merge into the cluster reused from the prior scan rather than
        // being left out because its members were never recompute candidates.
        write(tmp.path(), "relay.ts", &body.replace("formatResponse", "relayPayload"));
        let incremental_request = ScanRequest {
            kind: ScanKind::Incremental,
            root: tmp.path().to_path_buf(),
            repo_name: "test".to_string(),
            commit: "c2".to_string(),
            branch: None,
            changed_files: vec![PathBuf::from("relay.ts")],
            rules_path: None,
        };
        let incremental =
            run_scan(&incremental_request, &config, &store, &vcs, "s2".to_string(), now).unwrap();

        assert_eq!(incremental.aggregates.total_units, 3);
        assert_eq!(incremental.clusters.len(), 1);
        assert_eq!(incremental.clusters[0].members.len(), 3);
    }

    #[test]
    fn refactoring_runway_is_insufficient_data_only_on_first_scan() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "a.ts",
            "function refreshTokenIfExpired(x) {\n  if (x) {\n    if (x) {\n      if (x) {\n        if (x) {\n          if (x) {\n            return 1;\n          }\n        }\n      }\n    }\n  }\n  return 0;\n}\n",
        );
        let config = Config::default();
        let vcs = FakeVcs::new();
        let store = MemoryCache::new();
        let request = ScanRequest {
            kind: ScanKind::Full,
            root: tmp.path().to_path_buf(),
            repo_name: "test".to_string(),
            commit: "c1".to_string(),
            branch: None,
            changed_files: vec![],
            rules_path: None,
        };

        let first = run_scan(&request, &config, &store, &vcs, "s1".to_string(), Utc::now()).unwrap();
        assert_eq!(first.aggregates.refactoring_runway_months, None);

        let second = run_scan(&request, &config, &store, &vcs, "s2".to_string(), Utc::now()).unwrap();
        assert!(second.aggregates.refactoring_runway_months.is_some());
    }

    #[test]
    fn custom_rules_path_is_used_instead_of_the_embedded_default() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "a.ts",
            "export function f(x) {\n  if (x) {\n    return 1;\n  }\n  return 0;\n}\n",
        );
        let rules_path = tmp.path().join("custom-rules.toml");
        fs::write(
            &rules_path,
            r#"version = "1"

[[rules]]
id = "CUSTOM-001"
name = "always fires"
language = "typescript"
severity = "low"
suggested_action = "investigate"

[rules.matcher]
type = "nesting_depth_at_least"
threshold = 0
"#,
        )
        .unwrap();

        let config = Config::default();
        let store = MemoryCache::new();
        let vcs = FakeVcs::new();
        let request = ScanRequest {
            kind: ScanKind::Full,
            root: tmp.path().to_path_buf(),
            repo_name: "test".to_string(),
            commit: "c1".to_string(),
            branch: None,
            changed_files: vec![],
            rules_path: Some(rules_path),
        };
        let report = run_scan(&request, &config, &store, &vcs, "s".to_string(), Utc::now()).unwrap();

        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].rule_id, "CUSTOM-001");
    }

    #[test]
    fn redundant_pair_scenario_clusters_across_files() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            "format.ts",
            "function formatResponse(payload) {\n  const body = payload.body;\n  const status = payload.status;\n  if (status === 200) {\n    return { body, status, ok: true };\n  }\n  return { body, status, ok: false };\n}\n",
        );
        write(
            tmp.path(),
            "transform.ts",
            "function transformPayload(payload) {\n  const body = payload.body;\n  const status = payload.status;\n  if (status === 200) {\n    return { body, status, ok: true };\n  }\n  return { body, status, ok: false };\n}\n",
        );
        let config = Config::default();
        let store = MemoryCache::new();
        let vcs = FakeVcs::new();
        let request = ScanRequest {
            kind: ScanKind::Full,
            root: tmp.path().to_path_buf(),
            repo_name: "test".to_string(),
            commit: "c1".to_string(),
            branch: None,
            changed_files: vec![],
            rules_path: None,
        };
        let report = run_scan(&request, &config, &store, &vcs, "s".to_string(), Utc::now()).unwrap();

        assert_eq!(report.clusters.len(), 1);
        let cluster = &report.clusters[0];
        assert_eq!(cluster.members.len(), 2);
        assert!(cluster.suggested_name.starts_with("shared"));
    }

    #[test]
    fn deadline_scenario_fails_scan_with_no_partial_report() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.ts", "export function f() { return 1; }");
        let mut config = Config::default();
        config.deadline.full_scan_secs = 0;
        let store = MemoryCache::new();
        let vcs = FakeVcs::new();
        let request = ScanRequest {
            kind: ScanKind::Full,
            root: tmp.path().to_path_buf(),
            repo_name: "test".to_string(),
            commit: "c1".to_string(),
            branch: None,
            changed_files: vec![],
            rules_path: None,
        };
        let backdated_start = Instant::now() - std::time::Duration::from_secs(2);
        let result = run_scan_from(
            &request,
            &config,
            &store,
            &vcs,
            "s".to_string(),
            Utc::now(),
            backdated_start,
        );

        match result {
            Err(failure) => assert_eq!(failure.stage, "ingest"),
            Ok(_) => panic!("expected scan to fail once the deadline has elapsed"),
        }
    }
}
