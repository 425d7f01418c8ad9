//! Pipeline orchestration.
//!
//! Enumeration and filtering run first, in order. Every file that survives
//! is inspected once; the manifest funnel, the API extractor, the size
//! estimator and any external sources then run concurrently. Dependency
//! listers for the build systems among the accepted manifests follow. The composed
//! pack is rendered and, unless `dry_run` is set, written to the output
//! directory. Fatal errors surface before the output directory is touched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api_surface::ApiExtractor;
use crate::error::{PackError, PerFileWarning, Result, WarningKind};
use crate::manifest::ManifestFunnel;
use crate::output::{
    self, CommandSource, ComposeInput, ExternalSource, RenderedPack, WrittenArtifacts,
};
use crate::processing::FileFilter;
use crate::sizing::SizeEstimator;
use crate::source::{SourceAdapter, VersionControl};
use crate::types::{CompiledConfig, PackArtifacts, PackConfig, RepoPath};

/// Result of [`ContextPack::generate`].
#[derive(Debug, Clone)]
pub struct PackRun {
    pub artifacts: PackArtifacts,
    pub rendered: RenderedPack,
    /// `None` for dry runs
    pub written: Option<WrittenArtifacts>,
}

/// A configured pack run over one repository root.
pub struct ContextPack {
    root: PathBuf,
    config: Arc<CompiledConfig>,
    adapter: Arc<SourceAdapter>,
    external: Vec<Arc<dyn ExternalSource>>,
}

impl ContextPack {
    /// Validate `config` and prepare a run. Invalid configuration fails here.
    pub fn new(root: impl Into<PathBuf>, config: PackConfig) -> Result<Self> {
        Ok(Self::from_compiled(root, config.compile()?))
    }

    pub fn from_compiled(root: impl Into<PathBuf>, config: CompiledConfig) -> Self {
        let root = root.into();
        let adapter = SourceAdapter::new(&config, &root);
        let external: Vec<Arc<dyn ExternalSource>> = config
            .raw
            .external_tools
            .iter()
            .map(|tool| Arc::new(CommandSource::from_config(tool)) as Arc<dyn ExternalSource>)
            .collect();

        Self {
            root,
            config: Arc::new(config),
            adapter: Arc::new(adapter),
            external,
        }
    }

    /// Replace the version-control backend.
    pub fn with_vcs(mut self, vcs: Box<dyn VersionControl>) -> Self {
        self.adapter = Arc::new(SourceAdapter::new(&self.config, &self.root).with_vcs(vcs));
        self
    }

    /// Append an external section source.
    pub fn with_external_source(mut self, source: Arc<dyn ExternalSource>) -> Self {
        self.external.push(source);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &CompiledConfig {
        &self.config
    }

    /// Output directory resolved against the root.
    pub fn output_dir(&self) -> PathBuf {
        self.config.output_dir(&self.root)
    }

    fn root_name(&self) -> String {
        let resolved = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        resolved
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| resolved.display().to_string())
    }

    /// Compute the pack without rendering or writing anything.
    pub async fn build(&self) -> Result<PackArtifacts> {
        let config = &self.config.raw;
        let root = self.root.clone();

        info!(root = %root.display(), mode = %config.mode, "Starting pack run");

        // Source adapter
        let adapter = Arc::clone(&self.adapter);
        let mode = config.mode;
        let enum_root = root.clone();
        let enumeration = tokio::task::spawn_blocking(move || adapter.enumerate(&enum_root, mode)).await??;
        let raw_count = enumeration.paths.len();

        // Security and noise filter
        let outcome = FileFilter::new(&self.config).apply(enumeration.paths);
        info!(
            raw = raw_count,
            kept = outcome.filtered_count(),
            "Filter applied"
        );

        // Inspect each surviving path once
        let inspect_root = root.clone();
        let kept = outcome.kept.clone();
        let (files, mut warnings) = tokio::task::spawn_blocking(move || inspect_all(&inspect_root, &kept)).await?;
        warnings.extend(enumeration.warnings);

        // Funnel, extractor, sizing and external sources run concurrently
        let funnel = Arc::new(ManifestFunnel::new(&self.config));
        let extractor = Arc::new(ApiExtractor::new(&self.config));
        let estimator = SizeEstimator::new(config.heatmap_top_n);
        let sizing_files = files.clone();
        let external = self.external.clone();
        let external_root = root.clone();

        let (funnel_report, api_report, (heatmap, totals), external_sections) = tokio::try_join!(
            funnel.run(root.clone(), files.clone()),
            extractor.run(root.clone(), files.clone()),
            async {
                tokio::task::spawn_blocking(move || estimator.heatmap(&sizing_files))
                    .await
                    .map_err(PackError::from)
            },
            async {
                tokio::task::spawn_blocking(move || output::external::collect_all(&external, &external_root))
                    .await
                    .map_err(PackError::from)
            },
        )?;

        // Dependency sections for the build systems the funnel found
        let build_systems = output::detect_build_systems(&funnel_report.candidates);
        let dependency_sources =
            output::dependency_sources(&build_systems, &funnel_report.candidates, config.dependency_tools);
        info!(
            systems = ?build_systems,
            sources = dependency_sources.len(),
            "Collecting dependency sections"
        );
        let deps_root = root.clone();
        let dependencies =
            tokio::task::spawn_blocking(move || output::external::collect_all(&dependency_sources, &deps_root)).await?;

        let artifacts = output::compose(ComposeInput {
            root_name: self.root_name(),
            mode: enumeration.mode,
            raw_count,
            rejections: outcome.rejection_counts(),
            files,
            funnel: funnel_report,
            apis: api_report,
            heatmap,
            totals,
            external: external_sections,
            commit: enumeration.commit,
            build_systems,
            dependencies,
            warnings,
            max_depth: config.max_depth,
            code_only: config.code_only,
            dry_run: config.dry_run,
        });

        info!(
            files = artifacts.summary.filtered_count,
            manifests = artifacts.summary.manifest_count,
            api_symbols = artifacts.summary.api_symbol_count,
            warnings = artifacts.summary.warning_count,
            "Pack assembled"
        );

        Ok(artifacts)
    }

    /// Build, render, and write the pack. `timestamp` goes into `PACK.txt` only.
    pub async fn generate(&self, timestamp: Option<String>) -> Result<PackRun> {
        let artifacts = self.build().await?;
        let rendered = RenderedPack {
            text: output::render_text(&artifacts, timestamp.as_deref()),
            json: output::render_json(&artifacts)?,
        };

        let written = if self.config.raw.dry_run {
            info!("Dry run, nothing written");
            None
        } else {
            Some(output::write_artifacts(&self.output_dir(), &rendered).await?)
        };

        Ok(PackRun {
            artifacts,
            rendered,
            written,
        })
    }
}

/// Inspect every path, turning unreadable ones into warnings and flagging
/// binary content.
fn inspect_all(root: &Path, paths: &[String]) -> (Vec<RepoPath>, Vec<PerFileWarning>) {
    let mut files = Vec::with_capacity(paths.len());
    let mut warnings = Vec::new();

    for path in paths {
        match RepoPath::inspect(root, path) {
            Ok(file) => {
                if !file.is_text() {
                    debug!(path = %file.path, "Binary content, excluded from content stages");
                    warnings.push(PerFileWarning::new(
                        &file.path,
                        WarningKind::NotText,
                        "binary content detected",
                    ));
                }
                files.push(file);
            }
            Err(warning) => {
                warn!(path = %warning.path, detail = %warning.detail, "File could not be inspected");
                warnings.push(warning);
            }
        }
    }

    (files, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EnumerationMode;
    use std::fs;

    fn traversal_config() -> PackConfig {
        PackConfig {
            mode: EnumerationMode::Traversal,
            dependency_tools: false,
            ..PackConfig::default()
        }
    }

    #[test]
    fn test_invalid_config_fails_at_construction() {
        let mut cfg = traversal_config();
        cfg.max_depth = 0;
        let err = ContextPack::new("/nonexistent", cfg).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_inspect_all_flags_binary() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "hello\n").unwrap();
        fs::write(dir.path().join("blob.dat"), [0u8, 1, 2, 3]).unwrap();

        let paths = vec!["a.txt".to_string(), "blob.dat".to_string(), "gone.txt".to_string()];
        let (files, warnings) = inspect_all(dir.path(), &paths);

        assert_eq!(files.len(), 2);
        assert!(files[0].is_text());
        assert!(!files[1].is_text());
        let kinds: Vec<_> = warnings.iter().map(|w| w.kind).collect();
        assert_eq!(kinds, vec![WarningKind::NotText, WarningKind::Unreadable]);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.py"), "def run():\n    pass\n").unwrap();

        let mut cfg = traversal_config();
        cfg.dry_run = true;
        let pack = ContextPack::new(dir.path(), cfg).unwrap();
        let run = pack.generate(Some("2030-01-01T00:00:00Z".into())).await.unwrap();

        assert!(run.written.is_none());
        assert!(!pack.output_dir().exists());
        assert_eq!(run.artifacts.summary.api_symbol_count, 1);
        assert!(run.rendered.text.contains("Generated: 2030-01-01T00:00:00Z"));
        assert!(!run.rendered.json.contains("2030-01-01"));
    }

    #[tokio::test]
    async fn test_cmake_dependencies_from_accepted_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("CMakeLists.txt"),
            "cmake_minimum_required(VERSION 3.20)\nproject(demo)\nfind_package(Boost REQUIRED)\nfind_package(ZLIB)\nadd_executable(app main.cpp)\n",
        )
        .unwrap();

        let mut cfg = traversal_config();
        cfg.dry_run = true;
        let artifacts = ContextPack::new(dir.path(), cfg).unwrap().build().await.unwrap();

        assert_eq!(artifacts.summary.build_systems, vec![output::BuildSystem::CMake]);
        assert_eq!(artifacts.dependencies.len(), 1);
        assert_eq!(artifacts.dependencies[0].label, "cmake");
        assert!(artifacts.dependencies[0].content.contains("- Boost\n- ZLIB"));
        assert_eq!(artifacts.summary.commit, None);
    }
}
