//! Manifest classification funnel.
//!
//! Identifies dependency-declaring files without a fixed filename list:
//!
//! 1. [`lexical`]: entropy ceiling and keyword density floor
//! 2. [`structure`]: the file must parse and match a structural query
//! 3. [`context`]: path rules scale the density into a final confidence
//!
//! Files failing Layer 2 land in the run's [`RejectionCache`].

pub mod cache;
pub mod context;
pub mod lexical;
pub mod structure;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::batch::{BatchConfig, BatchProcessor};
use crate::error::{PerFileWarning, Result, WarningKind};
use crate::processing::{FileProcessor, LanguageDetector};
use crate::types::{compare_paths, CompiledConfig, RepoPath};

pub use cache::RejectionCache;
pub use context::ContextScorer;
pub use lexical::{shannon_entropy, LexicalScorer, LexicalVerdict};
pub use structure::{parse_structure, StructuralValidator, StructureFormat};

/// A file accepted by all three layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestCandidate {
    /// Relative path
    pub path: String,

    /// Layer 1 keyword density
    pub density: f64,

    /// Layer 1 byte entropy
    pub entropy: f64,

    /// Parser used in Layer 2
    pub format: String,

    /// Structural queries that matched (`invocation:<name>` / `binding:<key>`)
    pub evidence: Vec<String>,

    /// Layer 3 path multiplier
    pub multiplier: f64,

    /// `density * multiplier`
    pub confidence: f64,
}

/// Where a file left the funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunnelStage {
    NotText,
    Oversized,
    Unreadable,
    HighEntropy,
    LowDensity,
    CachedRejection,
    StructureRejected,
    BelowThreshold,
    Accepted,
}

/// Per-stage counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunnelStats {
    pub examined: usize,
    pub not_text: usize,
    pub oversized: usize,
    pub unreadable: usize,
    pub entropy_rejected: usize,
    pub density_rejected: usize,
    pub cache_hits: usize,
    pub structure_rejected: usize,
    pub below_threshold: usize,
    pub accepted: usize,
}

impl FunnelStats {
    pub fn record(&mut self, stage: FunnelStage) {
        self.examined += 1;
        match stage {
            FunnelStage::NotText => self.not_text += 1,
            FunnelStage::Oversized => self.oversized += 1,
            FunnelStage::Unreadable => self.unreadable += 1,
            FunnelStage::HighEntropy => self.entropy_rejected += 1,
            FunnelStage::LowDensity => self.density_rejected += 1,
            FunnelStage::CachedRejection => self.cache_hits += 1,
            FunnelStage::StructureRejected => self.structure_rejected += 1,
            FunnelStage::BelowThreshold => self.below_threshold += 1,
            FunnelStage::Accepted => self.accepted += 1,
        }
    }

    pub fn absorb(&mut self, other: &FunnelStats) {
        self.examined += other.examined;
        self.not_text += other.not_text;
        self.oversized += other.oversized;
        self.unreadable += other.unreadable;
        self.entropy_rejected += other.entropy_rejected;
        self.density_rejected += other.density_rejected;
        self.cache_hits += other.cache_hits;
        self.structure_rejected += other.structure_rejected;
        self.below_threshold += other.below_threshold;
        self.accepted += other.accepted;
    }
}

/// Result of one funnel invocation.
#[derive(Debug, Clone, Default)]
pub struct FunnelReport {
    /// Sorted by confidence descending, then path
    pub candidates: Vec<ManifestCandidate>,
    pub stats: FunnelStats,
    pub warnings: Vec<PerFileWarning>,
}

impl FunnelReport {
    fn merge(&mut self, other: FunnelReport) {
        self.candidates.extend(other.candidates);
        self.stats.absorb(&other.stats);
        self.warnings.extend(other.warnings);
    }

    fn finish(mut self) -> Self {
        self.candidates.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| compare_paths(&a.path, &b.path))
        });
        self.warnings.sort();
        self
    }
}

/// Outcome for a single file.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub stage: FunnelStage,
    pub candidate: Option<ManifestCandidate>,
    pub warning: Option<PerFileWarning>,
}

impl Evaluation {
    fn rejected(stage: FunnelStage) -> Self {
        Self {
            stage,
            candidate: None,
            warning: None,
        }
    }

    fn warned(stage: FunnelStage, warning: PerFileWarning) -> Self {
        Self {
            stage,
            candidate: None,
            warning: Some(warning),
        }
    }
}

/// The three-layer manifest funnel, built once per run.
#[derive(Debug, Clone)]
pub struct ManifestFunnel {
    processor: FileProcessor,
    lexical: LexicalScorer,
    validator: StructuralValidator,
    context: ContextScorer,
    final_threshold: f64,
    concurrency: usize,
}

impl ManifestFunnel {
    pub fn new(config: &CompiledConfig) -> Self {
        let funnel = config.funnel();
        Self {
            processor: FileProcessor::new(funnel.max_parse_bytes),
            lexical: LexicalScorer::new(
                config.keyword_pattern.clone(),
                funnel.entropy_threshold,
                funnel.density_threshold,
            ),
            validator: StructuralValidator::new(&funnel.structural_queries),
            context: ContextScorer::new(config.path_rules.clone()),
            final_threshold: funnel.final_threshold,
            concurrency: config.raw.concurrency,
        }
    }

    /// Run every layer for one file.
    pub fn evaluate(
        &self,
        root: &Path,
        file: &RepoPath,
        cache: &RejectionCache,
        detector: &LanguageDetector,
    ) -> Evaluation {
        if !file.is_text() {
            return Evaluation::rejected(FunnelStage::NotText);
        }

        if cache.contains(&file.path) {
            debug!(path = %file.path, "Skipping cached structural rejection");
            return Evaluation::rejected(FunnelStage::CachedRejection);
        }

        let processed = match self.processor.read(root, file) {
            Ok(processed) => processed,
            Err(warning) => {
                let stage = match warning.kind {
                    WarningKind::Oversized => FunnelStage::Oversized,
                    WarningKind::NotText => FunnelStage::NotText,
                    _ => FunnelStage::Unreadable,
                };
                return Evaluation::warned(stage, warning);
            }
        };

        // Layer 1
        let lines = processed.stats().total_lines;
        let (entropy, density) = match self.lexical.score(&processed.bytes, &processed.content, lines) {
            LexicalVerdict::HighEntropy { .. } => return Evaluation::rejected(FunnelStage::HighEntropy),
            LexicalVerdict::LowDensity { .. } => return Evaluation::rejected(FunnelStage::LowDensity),
            LexicalVerdict::Pass { entropy, density } => (entropy, density),
        };

        // Layer 2
        let format = StructureFormat::detect(detector, &file.path, &processed.content);
        let evidence = match parse_structure(format, &processed.content) {
            Ok(doc) => self.validator.evaluate(&doc),
            Err(reason) => {
                cache.insert(&file.path);
                return Evaluation::warned(
                    FunnelStage::StructureRejected,
                    PerFileWarning::new(
                        &file.path,
                        WarningKind::ParseFailure,
                        format!("{} parse failed: {}", format.as_str(), reason),
                    ),
                );
            }
        };
        if evidence.is_empty() {
            cache.insert(&file.path);
            return Evaluation::rejected(FunnelStage::StructureRejected);
        }

        // Layer 3
        let multiplier = self.context.multiplier(&file.path);
        let confidence = density * multiplier;
        if confidence < self.final_threshold {
            return Evaluation::rejected(FunnelStage::BelowThreshold);
        }

        Evaluation {
            stage: FunnelStage::Accepted,
            candidate: Some(ManifestCandidate {
                path: file.path.clone(),
                density,
                entropy,
                format: format.as_str().to_string(),
                evidence,
                multiplier,
                confidence,
            }),
            warning: None,
        }
    }

    /// Classify `files` on the current thread, sharing `cache`.
    pub fn classify(&self, root: &Path, files: &[RepoPath], cache: &RejectionCache) -> FunnelReport {
        let detector = LanguageDetector::new();
        let mut report = FunnelReport::default();

        for file in files {
            let evaluation = self.evaluate(root, file, cache, &detector);
            report.stats.record(evaluation.stage);
            if let Some(warning) = evaluation.warning {
                warn!(path = %warning.path, kind = %warning.kind, detail = %warning.detail, "Funnel skipped file");
                report.warnings.push(warning);
            }
            if let Some(candidate) = evaluation.candidate {
                debug!(path = %candidate.path, confidence = candidate.confidence, "Manifest candidate");
                report.candidates.push(candidate);
            }
        }

        report.finish()
    }

    /// Classify `files` across `concurrency` blocking partitions with a fresh cache.
    pub async fn run(self: Arc<Self>, root: PathBuf, files: Vec<RepoPath>) -> Result<FunnelReport> {
        self.run_with_cache(root, files, Arc::new(RejectionCache::new())).await
    }

    /// Like [`run`](Self::run), with a caller-owned cache.
    pub async fn run_with_cache(
        self: Arc<Self>,
        root: PathBuf,
        files: Vec<RepoPath>,
        cache: Arc<RejectionCache>,
    ) -> Result<FunnelReport> {
        let batch = BatchProcessor::new(BatchConfig::new(self.concurrency));
        let funnel = Arc::clone(&self);
        let shared_root = Arc::new(root);

        let result = batch
            .process("manifest_funnel", files, move |partition: Vec<RepoPath>| {
                funnel.classify(&shared_root, &partition, &cache)
            })
            .await?;

        let mut report = FunnelReport::default();
        for partial in result.outputs {
            report.merge(partial);
        }
        let report = report.finish();

        info!(
            examined = report.stats.examined,
            accepted = report.stats.accepted,
            structure_rejected = report.stats.structure_rejected,
            "Manifest funnel complete"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PackConfig, TextClass};
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) -> RepoPath {
        let full = root.join(rel);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&full, content).unwrap();
        RepoPath::inspect(root, rel).unwrap()
    }

    fn funnel() -> ManifestFunnel {
        ManifestFunnel::new(&PackConfig::default().compile().unwrap())
    }

    const CMAKE: &str = "cmake_minimum_required(VERSION 3.20)\nproject(demo)\nfind_package(Boost REQUIRED)\nadd_executable(app main.cpp)\ntarget_link_libraries(app Boost::boost)\n";

    #[test]
    fn test_accepts_cmake_and_package_json() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let files = vec![
            write(root, "CMakeLists.txt", CMAKE),
            write(root, "web/package.json", "{\n  \"name\": \"web\",\n  \"dependencies\": {\"react\": \"^18\"}\n}\n"),
        ];

        let report = funnel().classify(root, &files, &RejectionCache::new());
        let paths: Vec<_> = report.candidates.iter().map(|c| c.path.as_str()).collect();

        assert_eq!(paths, vec!["CMakeLists.txt", "web/package.json"]);
        assert_eq!(report.stats.accepted, 2);
        assert!(report.candidates[0]
            .evidence
            .contains(&"invocation:find_package".to_string()));
    }

    #[test]
    fn test_high_density_prose_fails_structure() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let notes = write(
            root,
            "notes.txt",
            "We discuss dependency version require import include package module library build install target plugin\n",
        );
        let cache = RejectionCache::new();

        let report = funnel().classify(root, &[notes.clone()], &cache);
        assert!(report.candidates.is_empty());
        assert_eq!(report.stats.structure_rejected, 1);
        assert!(cache.contains("notes.txt"));

        // A revisit is answered from the cache without re-parsing.
        let again = funnel().classify(root, &[notes], &cache);
        assert_eq!(again.stats.cache_hits, 1);
        assert_eq!(again.stats.structure_rejected, 0);
    }

    #[test]
    fn test_readme_and_malformed_pom_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let files = vec![
            write(
                root,
                "README.md",
                "Requirements: a recent version of the build tools.\nDependencies: install the package with pip or npm.\n",
            ),
            write(
                root,
                "pom.xml",
                "<project>\n  <dependencies>\n    <dependency><artifactId>x</artifactId>\n  </dependencies>\n</project>\n",
            ),
        ];

        let report = funnel().classify(root, &files, &RejectionCache::new());
        assert!(report.candidates.is_empty());
        assert_eq!(report.stats.structure_rejected, 2);

        let kinds: Vec<_> = report.warnings.iter().map(|w| (w.path.as_str(), w.kind)).collect();
        assert_eq!(kinds, vec![("pom.xml", WarningKind::ParseFailure)]);
    }

    #[test]
    fn test_down_weighted_path_scores_lower() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let files = vec![
            write(root, "CMakeLists.txt", CMAKE),
            write(root, "docs/CMakeLists.txt", CMAKE),
        ];

        let report = funnel().classify(root, &files, &RejectionCache::new());
        assert_eq!(report.candidates.len(), 2);

        let root_score = report.candidates.iter().find(|c| c.path == "CMakeLists.txt").unwrap();
        let docs_score = report.candidates.iter().find(|c| c.path == "docs/CMakeLists.txt").unwrap();
        assert!(docs_score.confidence < root_score.confidence);
        assert_eq!(root_score.density, docs_score.density);
        assert_eq!(report.candidates[0].path, "CMakeLists.txt");
    }

    #[test]
    fn test_rejections_by_stage() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        let mut cfg = PackConfig::default();
        cfg.funnel.max_parse_bytes = 64;
        let funnel = ManifestFunnel::new(&cfg.compile().unwrap());

        let files = vec![
            write(root, "big/CMakeLists.txt", &"find_package(X)\n".repeat(20)),
            write(root, "src/main.rs", "fn main() {\n    println!(\"hi\");\n}\n"),
            write(root, "broken.json", "{\"dependencies\": "),
            RepoPath::new("blob.dat", 10, TextClass::Binary),
        ];

        let report = funnel.classify(root, &files, &RejectionCache::new());
        assert!(report.candidates.is_empty());
        assert_eq!(report.stats.examined, 4);
        assert_eq!(report.stats.oversized, 1);
        assert_eq!(report.stats.density_rejected, 1);
        assert_eq!(report.stats.structure_rejected, 1);
        assert_eq!(report.stats.not_text, 1);

        let kinds: Vec<_> = report.warnings.iter().map(|w| (w.path.as_str(), w.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("big/CMakeLists.txt", WarningKind::Oversized),
                ("broken.json", WarningKind::ParseFailure),
            ]
        );
    }

    #[tokio::test]
    async fn test_partitioned_run_matches_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let mut files = Vec::new();
        for i in 0..9 {
            files.push(write(root, &format!("mod{}/CMakeLists.txt", i), CMAKE));
            files.push(write(root, &format!("mod{}/README.md", i), "# Title\n\nSome prose.\n"));
        }

        let sequential = funnel().classify(root, &files, &RejectionCache::new());
        let parallel = Arc::new(funnel())
            .run(root.to_path_buf(), files)
            .await
            .unwrap();

        assert_eq!(parallel.candidates, sequential.candidates);
        assert_eq!(parallel.stats, sequential.stats);
        assert_eq!(parallel.candidates.len(), 9);
    }
}
