//! Dependency sections chosen from the accepted manifest candidates.
//!
//! Each build system found among the candidates selects its ecosystem's
//! lister (`cargo tree`, `npm ls`, `pipdeptree`, `go mod graph`). CMake has
//! no lister; its `find_package` calls are read straight from the accepted
//! files.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::manifest::ManifestCandidate;
use crate::output::external::{clamp, scrub, CommandSource, ExternalSection, ExternalSource, SectionState};
use crate::types::{compare_paths, parent_of};

lazy_static! {
    static ref FIND_PACKAGE_RE: Regex =
        Regex::new(r"(?im)^\s*find_package\s*\(\s*([A-Za-z0-9_.+:-]+)").expect("find_package regex");
}

/// An ecosystem recognized from a manifest file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildSystem {
    Rust,
    Node,
    Python,
    Go,
    CMake,
    Conan,
}

impl BuildSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildSystem::Rust => "Rust",
            BuildSystem::Node => "Node",
            BuildSystem::Python => "Python",
            BuildSystem::Go => "Go",
            BuildSystem::CMake => "CMake",
            BuildSystem::Conan => "Conan",
        }
    }

    /// The build system a manifest belongs to, by base name.
    pub fn from_manifest(path: &str) -> Option<Self> {
        let name = path.rsplit('/').next().unwrap_or(path);
        let lower = name.to_lowercase();
        match name {
            "Cargo.toml" => Some(BuildSystem::Rust),
            "package.json" => Some(BuildSystem::Node),
            "pyproject.toml" | "Pipfile" | "setup.py" | "setup.cfg" => Some(BuildSystem::Python),
            "go.mod" => Some(BuildSystem::Go),
            "CMakeLists.txt" => Some(BuildSystem::CMake),
            "conanfile.txt" | "conanfile.py" => Some(BuildSystem::Conan),
            _ if lower.starts_with("requirements") && lower.ends_with(".txt") => Some(BuildSystem::Python),
            _ if lower.ends_with(".cmake") => Some(BuildSystem::CMake),
            _ => None,
        }
    }
}

impl fmt::Display for BuildSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build systems present among `candidates`, in a fixed order.
pub fn detect_build_systems(candidates: &[ManifestCandidate]) -> Vec<BuildSystem> {
    candidates
        .iter()
        .filter_map(|c| BuildSystem::from_manifest(&c.path))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Tries each command in turn; the first present section wins.
#[derive(Debug, Clone)]
pub struct FallbackSource {
    label: String,
    commands: Vec<CommandSource>,
}

impl FallbackSource {
    pub fn new(label: impl Into<String>, commands: Vec<CommandSource>) -> Self {
        Self {
            label: label.into(),
            commands,
        }
    }
}

impl ExternalSource for FallbackSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn collect(&self, root: &Path) -> ExternalSection {
        for command in &self.commands {
            let section = command.collect(root);
            if section.status == SectionState::Present {
                return ExternalSection::present(&self.label, section.content);
            }
        }
        let tried: Vec<&str> = self.commands.iter().map(CommandSource::program).collect();
        ExternalSection::absent(
            &self.label,
            format!("(tool not found or not installed: {})", tried.join("|")),
        )
    }
}

/// `find_package` names from accepted CMake files.
#[derive(Debug, Clone)]
pub struct CMakePackages {
    manifests: Vec<String>,
}

impl CMakePackages {
    pub fn new(manifests: Vec<String>) -> Self {
        Self { manifests }
    }
}

/// Package names in `find_package(...)` calls, in file order, without repeats.
pub fn find_packages(content: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    FIND_PACKAGE_RE
        .captures_iter(content)
        .map(|cap| cap[1].to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

impl ExternalSource for CMakePackages {
    fn label(&self) -> &str {
        "cmake"
    }

    fn collect(&self, root: &Path) -> ExternalSection {
        let mut blocks = Vec::new();
        for path in &self.manifests {
            let content = match std::fs::read_to_string(root.join(path)) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path, error = %e, "CMake manifest unreadable");
                    continue;
                }
            };
            let packages = find_packages(&content);
            if packages.is_empty() {
                continue;
            }
            let lines: Vec<String> = packages.iter().map(|p| format!("- {}", p)).collect();
            blocks.push(format!("Dependencies from: {}\n{}\n", path, lines.join("\n")));
        }

        if blocks.is_empty() {
            return ExternalSection::absent(self.label(), "(no find_package dependencies found in CMake files)");
        }
        let text = blocks.join("\n");
        ExternalSection::present(self.label(), scrub(&clamp(&text, self.label())))
    }
}

/// Directory of the shallowest candidate for `system`, `""` for the root.
fn primary_dir(system: BuildSystem, candidates: &[ManifestCandidate]) -> Option<String> {
    candidates
        .iter()
        .filter(|c| BuildSystem::from_manifest(&c.path) == Some(system))
        .map(|c| parent_of(&c.path).to_string())
        .min_by(|a, b| {
            let depth = |d: &str| if d.is_empty() { 0 } else { d.split('/').count() };
            depth(a).cmp(&depth(b)).then_with(|| compare_paths(a, b))
        })
}

fn args(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Sources for the dependency sections of the detected build systems.
///
/// CMake packages are always read. The command listers run only when
/// `run_tools` is set; each runs in the directory of its shallowest manifest.
pub fn dependency_sources(
    systems: &[BuildSystem],
    candidates: &[ManifestCandidate],
    run_tools: bool,
) -> Vec<Arc<dyn ExternalSource>> {
    let mut sources: Vec<Arc<dyn ExternalSource>> = Vec::new();

    for &system in systems {
        let dir = primary_dir(system, candidates).unwrap_or_default();
        let source: Option<Arc<dyn ExternalSource>> = match system {
            BuildSystem::CMake => {
                let mut manifests: Vec<String> = candidates
                    .iter()
                    .filter(|c| BuildSystem::from_manifest(&c.path) == Some(BuildSystem::CMake))
                    .map(|c| c.path.clone())
                    .collect();
                manifests.sort_by(|a, b| compare_paths(a, b));
                Some(Arc::new(CMakePackages::new(manifests)))
            }
            BuildSystem::Rust if run_tools => Some(Arc::new(
                CommandSource::new("cargo", "cargo", args(&["tree", "-e", "normal,build", "--depth", "2"]))
                    .with_working_dir(dir),
            )),
            BuildSystem::Node if run_tools => Some(Arc::new(FallbackSource::new(
                "node",
                vec![
                    CommandSource::new("npm", "npm", args(&["ls", "--depth", "2"])),
                    CommandSource::new("pnpm", "pnpm", args(&["list", "--depth", "2"])),
                    CommandSource::new("yarn", "yarn", args(&["list", "--depth=2"])),
                ]
                .into_iter()
                .map(|c| c.with_working_dir(dir.clone()).with_any_status())
                .collect(),
            ))),
            BuildSystem::Python if run_tools => Some(Arc::new(FallbackSource::new(
                "python",
                vec![
                    CommandSource::new("pipdeptree", "pipdeptree", args(&["--json-tree", "-w", "silence"]))
                        .with_any_status(),
                    CommandSource::new("pip", "pip", args(&["list"])),
                ]
                .into_iter()
                .map(|c| c.with_working_dir(dir.clone()))
                .collect(),
            ))),
            BuildSystem::Go if run_tools => Some(Arc::new(
                CommandSource::new("go", "go", args(&["mod", "graph"]))
                    .with_working_dir(dir)
                    .with_any_status(),
            )),
            _ => None,
        };
        if let Some(source) = source {
            debug!(system = %system, label = source.label(), "Dependency source selected");
            sources.push(source);
        }
    }

    sources
}
