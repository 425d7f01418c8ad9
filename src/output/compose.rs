//! Assembles stage results into [`PackArtifacts`] and renders them.

use std::collections::{BTreeMap, BTreeSet};

use crate::api_surface::{ApiReport, ApiSection};
use crate::error::{PerFileWarning, Result};
use crate::manifest::{FunnelReport, ManifestCandidate};
use crate::output::dependencies::BuildSystem;
use crate::output::external::{ExternalSection, SectionState};
use crate::processing::LanguageDetector;
use crate::sizing::{SizeRecord, SizeTotals};
use crate::types::{
    compare_paths, parent_of, EnumerationMode, LanguageStat, PackArtifacts, RepoPath, RunSummary,
    TreeEntry,
};

const RULE: &str = "========================================";

/// Reading order for the text artifact.
const GUIDE: &str = "\
This pack is a token-efficient view of a repository. Read it top down:

1. CONTEXT PACK      - counts, enumeration mode, revision, build systems
2. DIRECTORY TREE    - layout, with manifest files marked per directory
3. FILE INDEX        - every kept path, for locating files by name
4. LANGUAGE SNAPSHOT - file counts and sizes per extension
5. MANIFEST CANDIDATES - ranked build and dependency descriptions
6. API SURFACE       - public symbols per language, as path:line:text
7. TOKEN HEATMAP     - the largest files and their estimated token cost
8. DEPENDENCIES      - ecosystem listings for the detected build systems
9. WARNINGS          - files that could not be read or parsed

Tips:
- Start from the manifests to learn how the project builds
- Use the API surface before asking for source files
- Ask for specific files and line ranges; the heatmap shows what is expensive
";

/// Everything the composer needs from one run.
#[derive(Debug, Clone)]
pub struct ComposeInput {
    pub root_name: String,
    pub mode: EnumerationMode,
    pub raw_count: usize,
    pub rejections: BTreeMap<String, usize>,
    /// Filtered, inspected files
    pub files: Vec<RepoPath>,
    pub funnel: FunnelReport,
    pub apis: ApiReport,
    pub heatmap: Vec<SizeRecord>,
    pub totals: SizeTotals,
    pub external: Vec<ExternalSection>,
    /// Checked-out revision, tracked mode only
    pub commit: Option<String>,
    /// Build systems of the accepted manifest candidates
    pub build_systems: Vec<BuildSystem>,
    pub dependencies: Vec<ExternalSection>,
    /// Enumeration and inspection warnings
    pub warnings: Vec<PerFileWarning>,
    pub max_depth: usize,
    pub code_only: bool,
    pub dry_run: bool,
}

/// Directory prefixes up to `max_depth`, with manifest basenames attached.
pub fn build_tree(files: &[String], manifests: &[ManifestCandidate], max_depth: usize) -> Vec<TreeEntry> {
    let mut dirs: BTreeSet<String> = BTreeSet::new();
    for path in files {
        let parent = parent_of(path);
        if parent.is_empty() {
            continue;
        }
        let parts: Vec<&str> = parent.split('/').collect();
        for depth in 1..=parts.len().min(max_depth) {
            dirs.insert(parts[..depth].join("/"));
        }
    }

    let mut annotated: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for candidate in manifests {
        let dir = match parent_of(&candidate.path) {
            "" => ".".to_string(),
            other => other.to_string(),
        };
        let name = candidate.path.rsplit('/').next().unwrap_or(&candidate.path);
        annotated.entry(dir).or_default().push(name.to_string());
    }

    let mut ordered: Vec<String> = dirs.into_iter().collect();
    ordered.sort_by(|a, b| compare_paths(a, b));

    std::iter::once(".".to_string())
        .chain(ordered)
        .map(|dir| {
            let mut manifests = annotated.remove(&dir).unwrap_or_default();
            manifests.sort_by(|a, b| compare_paths(a, b));
            TreeEntry { dir, manifests }
        })
        .collect()
}

/// File and byte counts per snapshot kind, most files first.
pub fn language_snapshot(detector: &LanguageDetector, files: &[RepoPath]) -> Vec<LanguageStat> {
    let mut counts: BTreeMap<String, (usize, u64)> = BTreeMap::new();
    for file in files {
        let entry = counts.entry(detector.snapshot_kind(&file.path)).or_default();
        entry.0 += 1;
        entry.1 += file.size;
    }

    let mut stats: Vec<LanguageStat> = counts
        .into_iter()
        .map(|(kind, (files, bytes))| LanguageStat { kind, files, bytes })
        .collect();
    stats.sort_by(|a, b| b.files.cmp(&a.files).then_with(|| a.kind.cmp(&b.kind)));
    stats
}

/// Build the pack from stage results. Warnings from every stage are merged,
/// sorted, and deduplicated.
pub fn compose(input: ComposeInput) -> PackArtifacts {
    let detector = LanguageDetector::new();

    let mut files: Vec<String> = input.files.iter().map(|f| f.path.clone()).collect();
    files.sort_by(|a, b| compare_paths(a, b));

    let tree = build_tree(&files, &input.funnel.candidates, input.max_depth);
    let languages = language_snapshot(&detector, &input.files);

    let mut warnings = input.warnings;
    warnings.extend(input.funnel.warnings);
    warnings.extend(input.apis.warnings.iter().cloned());
    warnings.sort();
    warnings.dedup();

    let summary = RunSummary {
        root_name: input.root_name,
        mode: input.mode,
        commit: input.commit,
        build_systems: input.build_systems,
        raw_count: input.raw_count,
        filtered_count: files.len(),
        rejections: input.rejections,
        funnel: input.funnel.stats,
        manifest_count: input.funnel.candidates.len(),
        api_symbol_count: input.apis.symbol_count(),
        total_bytes: input.totals.bytes,
        total_tokens: input.totals.tokens,
        warning_count: warnings.len(),
        code_only: input.code_only,
        dry_run: input.dry_run,
        max_depth: input.max_depth,
    };

    PackArtifacts {
        summary,
        tree,
        files,
        languages,
        manifests: input.funnel.candidates,
        apis: input.apis.sections,
        heatmap: input.heatmap,
        dependencies: input.dependencies,
        external: input.external,
        warnings,
    }
}

fn banner(out: &mut String, title: &str) {
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(RULE);
    out.push('\n');
    out.push_str(title);
    out.push('\n');
    out.push_str(RULE);
    out.push_str("\n\n");
}

fn render_summary(out: &mut String, pack: &PackArtifacts, timestamp: Option<&str>) {
    let s = &pack.summary;
    banner(out, &format!("CONTEXT PACK: {}", s.root_name));

    if let Some(ts) = timestamp {
        out.push_str(&format!("Generated: {}\n", ts));
    }
    out.push_str(&format!("Enumeration mode: {}\n", s.mode));
    if let Some(commit) = &s.commit {
        out.push_str(&format!("Git commit: {}\n", commit));
    }
    let systems: Vec<&str> = s.build_systems.iter().map(BuildSystem::as_str).collect();
    out.push_str(&format!("Detected build systems: [{}]\n", systems.join(", ")));
    out.push_str(&format!("Files: {} kept of {} enumerated\n", s.filtered_count, s.raw_count));
    if !s.rejections.is_empty() {
        let parts: Vec<String> = s.rejections.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        out.push_str(&format!("Filtered out: {}\n", parts.join(", ")));
    }
    out.push_str(&format!("Manifest candidates: {}\n", s.manifest_count));
    out.push_str(&format!("API symbols: {}\n", s.api_symbol_count));
    out.push_str(&format!("Total size: {} bytes (~{} tokens)\n", s.total_bytes, s.total_tokens));
    out.push_str(&format!("Warnings: {}\n", s.warning_count));
    out.push_str(&format!(
        "Options: code_only={} dry_run={} max_depth={}\n",
        s.code_only, s.dry_run, s.max_depth
    ));
}

fn render_guide(out: &mut String) {
    banner(out, "PACK GUIDE");
    out.push_str(GUIDE);
}

fn render_tree(out: &mut String, pack: &PackArtifacts) {
    banner(out, "DIRECTORY TREE");
    out.push_str(&format!(
        "Directories (depth <= {}, manifest directories annotated):\n\n",
        pack.summary.max_depth
    ));
    for entry in &pack.tree {
        if entry.manifests.is_empty() {
            out.push_str(&entry.dir);
            out.push('\n');
        } else {
            out.push_str(&format!("{}  <-- [{}]\n", entry.dir, entry.manifests.join(", ")));
        }
    }
}

fn render_files(out: &mut String, pack: &PackArtifacts) {
    banner(out, "FILE INDEX");
    out.push_str(&format!("All files (n = {}):\n\n", pack.files.len()));
    for file in &pack.files {
        out.push_str(file);
        out.push('\n');
    }
}

fn render_languages(out: &mut String, pack: &PackArtifacts) {
    banner(out, "LANGUAGE SNAPSHOT");
    out.push_str("| Extension | Files | Bytes |\n");
    out.push_str("|----------:|------:|------:|\n");
    for stat in &pack.languages {
        out.push_str(&format!("| {} | {} | {} |\n", stat.kind, stat.files, stat.bytes));
    }
    out.push_str(&format!("\nTotal files: {}\n", pack.files.len()));
}

fn render_manifests(out: &mut String, pack: &PackArtifacts) {
    banner(out, "MANIFEST CANDIDATES");
    let f = &pack.summary.funnel;
    out.push_str(&format!(
        "Funnel: examined={} oversized={} entropy_rejected={} density_rejected={} structure_rejected={} cache_hits={} below_threshold={} accepted={}\n\n",
        f.examined,
        f.oversized,
        f.entropy_rejected,
        f.density_rejected,
        f.structure_rejected,
        f.cache_hits,
        f.below_threshold,
        f.accepted
    ));

    if pack.manifests.is_empty() {
        out.push_str("(no manifest candidates found)\n");
        return;
    }
    for c in &pack.manifests {
        out.push_str(&format!(
            "{:.4}  {}  [{}] density={:.4} entropy={:.4} weight={:.2}\n",
            c.confidence, c.path, c.format, c.density, c.entropy, c.multiplier
        ));
        out.push_str(&format!("        evidence: {}\n", c.evidence.join(", ")));
    }
}

fn render_api(out: &mut String, section: &ApiSection) {
    banner(out, &format!("API SURFACE: {}", section.language.title()));
    if !section.roots.is_empty() {
        let roots: Vec<&str> = section
            .roots
            .iter()
            .map(|r| if r.is_empty() { "." } else { r.as_str() })
            .collect();
        out.push_str(&format!("Roots: {}\n\n", roots.join(", ")));
    }
    if let Some(marker) = section.empty_marker() {
        out.push_str(&marker);
        out.push('\n');
        return;
    }
    for symbol in &section.symbols {
        out.push_str(&format!("{}:{}:{}\n", symbol.path, symbol.line, symbol.text));
    }
}

fn render_heatmap(out: &mut String, pack: &PackArtifacts) {
    banner(out, "TOKEN HEATMAP");
    out.push_str(&format!(
        "Size estimates (bytes -> ~tokens via /{}). Top {}:\n\n",
        crate::TOKEN_DIVISOR,
        pack.heatmap.len()
    ));
    for record in &pack.heatmap {
        out.push_str(&format!(
            "{:>12} bytes  ~{:>8} tokens  {}\n",
            record.bytes, record.tokens, record.path
        ));
    }
}

fn render_section(out: &mut String, kind: &str, section: &ExternalSection) {
    banner(out, &format!("{}: {}", kind, section.label));
    out.push_str(&section.content);
    if !section.content.ends_with('\n') {
        out.push('\n');
    }
    if section.status == SectionState::Absent {
        out.push_str("(section unavailable)\n");
    }
}

fn render_warnings(out: &mut String, pack: &PackArtifacts) {
    banner(out, "WARNINGS");
    if pack.warnings.is_empty() {
        out.push_str("(none)\n");
        return;
    }
    for warning in &pack.warnings {
        out.push_str(&format!("{}\n", warning));
    }
}

/// Render the text artifact. `timestamp` is the only run-dependent line.
pub fn render_text(pack: &PackArtifacts, timestamp: Option<&str>) -> String {
    let mut out = String::new();
    render_summary(&mut out, pack, timestamp);
    render_guide(&mut out);
    render_tree(&mut out, pack);
    render_files(&mut out, pack);
    render_languages(&mut out, pack);
    render_manifests(&mut out, pack);
    for section in &pack.apis {
        render_api(&mut out, section);
    }
    render_heatmap(&mut out, pack);
    for section in &pack.dependencies {
        render_section(&mut out, "DEPENDENCIES", section);
    }
    for section in &pack.external {
        render_section(&mut out, "EXTERNAL", section);
    }
    render_warnings(&mut out, pack);
    out
}

/// Render the JSON artifact (pretty-printed, no timestamp).
pub fn render_json(pack: &PackArtifacts) -> Result<String> {
    let mut json = serde_json::to_string_pretty(pack)?;
    json.push('\n');
    Ok(json)
}
