//! API surface extraction.
//!
//! Lists public declarations per language as `(path, line, text)` units.
//! Languages are described by [`ExtractionRule`] data; the scan roots of
//! marker-based languages come from [`roots::discover_roots`].

pub mod roots;
pub mod rules;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::batch::{BatchConfig, BatchProcessor};
use crate::error::{PerFileWarning, Result};
use crate::processing::FileProcessor;
use crate::types::{compare_paths, CompiledConfig, RepoPath};

pub use roots::{discover_roots, is_under};
pub use rules::{ApiLanguage, ExtractionRule, RootScope, Strategy, SymbolPattern, Visibility};

/// One public declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiSymbol {
    pub language: ApiLanguage,
    /// Relative path
    pub path: String,
    /// 1-based line number
    pub line: usize,
    /// The declaration line, trailing whitespace removed
    pub text: String,
    pub visibility: Visibility,
}

impl ApiSymbol {
    fn triple_cmp(&self, other: &Self) -> std::cmp::Ordering {
        compare_paths(&self.path, &other.path)
            .then_with(|| self.line.cmp(&other.line))
            .then_with(|| self.text.cmp(&other.text))
    }
}

/// Why a section has or lacks symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Symbols,
    /// No in-scope files of this language
    NoSourceFiles,
    /// Files were scanned but nothing public was found
    NoMatches,
}

/// The API listing for one language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSection {
    pub language: ApiLanguage,
    pub status: SectionStatus,
    /// Scan roots (`""` is the repository root)
    pub roots: Vec<String>,
    /// Files scanned
    pub files_scanned: usize,
    /// Sorted by path, line, text; no duplicate triples
    pub symbols: Vec<ApiSymbol>,
}

impl ApiSection {
    /// Marker line rendered in place of an empty listing.
    pub fn empty_marker(&self) -> Option<String> {
        match self.status {
            SectionStatus::Symbols => None,
            SectionStatus::NoSourceFiles => Some(format!("(no {} source files found)", self.language)),
            SectionStatus::NoMatches => Some(format!("(no public {} items found)", self.language)),
        }
    }
}

/// Result of one extraction run.
#[derive(Debug, Clone, Default)]
pub struct ApiReport {
    /// One section per [`ApiLanguage`], in [`ApiLanguage::ALL`] order
    pub sections: Vec<ApiSection>,
    pub warnings: Vec<PerFileWarning>,
}

impl ApiReport {
    pub fn symbol_count(&self) -> usize {
        self.sections.iter().map(|s| s.symbols.len()).sum()
    }
}

/// A file paired with the rule that applies to it.
#[derive(Debug, Clone)]
struct ScanJob {
    rule: usize,
    file: RepoPath,
}

#[derive(Debug, Default)]
struct PartialScan {
    symbols: Vec<ApiSymbol>,
    warnings: Vec<PerFileWarning>,
}

/// Extracts public API symbols, built once per run.
#[derive(Debug, Clone)]
pub struct ApiExtractor {
    rules: Vec<ExtractionRule>,
    processor: FileProcessor,
    concurrency: usize,
}

impl ApiExtractor {
    pub fn new(config: &CompiledConfig) -> Self {
        Self {
            rules: ExtractionRule::defaults(),
            processor: FileProcessor::new(config.funnel().max_parse_bytes),
            concurrency: config.raw.concurrency,
        }
    }

    /// Replace the rule set.
    pub fn with_rules(mut self, rules: Vec<ExtractionRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    /// Roots per rule and the files each rule will scan.
    fn plan(&self, files: &[RepoPath]) -> (Vec<Vec<String>>, Vec<ScanJob>) {
        let paths: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
        let roots: Vec<Vec<String>> = self
            .rules
            .iter()
            .map(|rule| discover_roots(rule.scope, &paths))
            .collect();

        let mut jobs = Vec::new();
        for file in files.iter().filter(|f| f.is_text()) {
            let matching = self.rules.iter().enumerate().find(|(idx, rule)| {
                rule.applies_to(&file.path) && roots[*idx].iter().any(|root| is_under(&file.path, root))
            });
            if let Some((rule, _)) = matching {
                jobs.push(ScanJob {
                    rule,
                    file: file.clone(),
                });
            }
        }
        (roots, jobs)
    }

    fn scan(&self, root: &Path, jobs: &[ScanJob]) -> PartialScan {
        let mut out = PartialScan::default();
        for job in jobs {
            let rule = &self.rules[job.rule];
            let processed = match self.processor.read(root, &job.file) {
                Ok(processed) => processed,
                Err(warning) => {
                    warn!(path = %warning.path, kind = %warning.kind, detail = %warning.detail, "API extraction skipped file");
                    out.warnings.push(warning);
                    continue;
                }
            };

            for (idx, line) in processed.content.lines().enumerate() {
                if let Some(visibility) = rule.match_line(line) {
                    out.symbols.push(ApiSymbol {
                        language: rule.language,
                        path: job.file.path.clone(),
                        line: idx + 1,
                        text: line.trim_end().to_string(),
                        visibility,
                    });
                }
            }
        }
        out
    }

    fn assemble(&self, roots: Vec<Vec<String>>, jobs: &[ScanJob], mut scan: PartialScan) -> ApiReport {
        scan.symbols.sort_by(|a, b| a.language.cmp(&b.language).then_with(|| a.triple_cmp(b)));
        scan.symbols
            .dedup_by(|a, b| a.language == b.language && a.path == b.path && a.line == b.line && a.text == b.text);
        scan.warnings.sort();

        let mut sections = Vec::with_capacity(self.rules.len());
        for (idx, (rule, roots)) in self.rules.iter().zip(roots).enumerate() {
            let files_scanned = jobs.iter().filter(|j| j.rule == idx).count();
            let symbols: Vec<ApiSymbol> = scan
                .symbols
                .iter()
                .filter(|s| s.language == rule.language)
                .cloned()
                .collect();
            let status = if files_scanned == 0 {
                SectionStatus::NoSourceFiles
            } else if symbols.is_empty() {
                SectionStatus::NoMatches
            } else {
                SectionStatus::Symbols
            };
            debug!(language = %rule.language, files_scanned, symbols = symbols.len(), "API section");
            sections.push(ApiSection {
                language: rule.language,
                status,
                roots,
                files_scanned,
                symbols,
            });
        }

        ApiReport {
            sections,
            warnings: scan.warnings,
        }
    }

    /// Extract on the current thread.
    pub fn extract(&self, root: &Path, files: &[RepoPath]) -> ApiReport {
        let (roots, jobs) = self.plan(files);
        let scan = self.scan(root, &jobs);
        self.assemble(roots, &jobs, scan)
    }

    /// Extract across `concurrency` blocking partitions.
    pub async fn run(self: Arc<Self>, root: PathBuf, files: Vec<RepoPath>) -> Result<ApiReport> {
        let (roots, jobs) = self.plan(&files);
        let batch = BatchProcessor::new(BatchConfig::new(self.concurrency));
        let extractor = Arc::clone(&self);
        let shared_root = Arc::new(root);

        let result = batch
            .process("api_surface", jobs.clone(), move |partition: Vec<ScanJob>| {
                extractor.scan(&shared_root, &partition)
            })
            .await?;

        let mut merged = PartialScan::default();
        for partial in result.outputs {
            merged.symbols.extend(partial.symbols);
            merged.warnings.extend(partial.warnings);
        }
        let report = self.assemble(roots, &jobs, merged);

        info!(
            files_scanned = jobs.len(),
            symbols = report.symbol_count(),
            "API extraction complete"
        );

        Ok(report)
    }
}
