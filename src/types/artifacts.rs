//! The assembled context pack and its run summary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::api_surface::ApiSection;
use crate::error::PerFileWarning;
use crate::manifest::{FunnelStats, ManifestCandidate};
use crate::output::dependencies::BuildSystem;
use crate::output::external::ExternalSection;
use crate::sizing::SizeRecord;
use crate::types::EnumerationMode;

/// Everything a pack run produces, before rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackArtifacts {
    pub summary: RunSummary,

    /// Directories up to the configured depth, sorted
    pub tree: Vec<TreeEntry>,

    /// Every filtered path, sorted
    pub files: Vec<String>,

    /// File counts per extension (or recognized build-file name)
    pub languages: Vec<LanguageStat>,

    /// Ranked manifest candidates
    pub manifests: Vec<ManifestCandidate>,

    /// One section per supported language, empty ones included
    pub apis: Vec<ApiSection>,

    /// Largest files first
    pub heatmap: Vec<SizeRecord>,

    /// Dependency listings for the detected build systems
    #[serde(default)]
    pub dependencies: Vec<ExternalSection>,

    /// Optional external tool sections
    pub external: Vec<ExternalSection>,

    pub warnings: Vec<PerFileWarning>,
}

/// A directory in the structure section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Directory path (`.` for the root)
    pub dir: String,
    /// Basenames of accepted manifest candidates directly inside it
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manifests: Vec<String>,
}

/// One row of the language snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageStat {
    /// Lowercased extension, bare build-file name, or `(noext)`
    pub kind: String,
    pub files: usize,
    pub bytes: u64,
}

/// Counts describing one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Name of the root directory
    pub root_name: String,

    /// Enumeration mode actually used (never `auto`)
    pub mode: EnumerationMode,

    /// Checked-out revision when enumerated from version control
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,

    /// Build systems of the accepted manifest candidates
    #[serde(default)]
    pub build_systems: Vec<BuildSystem>,

    /// Paths returned by enumeration
    pub raw_count: usize,

    /// Paths that survived the security and noise filter
    pub filtered_count: usize,

    /// Rejections per filter predicate
    pub rejections: BTreeMap<String, usize>,

    /// Per-stage manifest funnel counts
    pub funnel: FunnelStats,

    pub manifest_count: usize,
    pub api_symbol_count: usize,
    pub total_bytes: u64,
    pub total_tokens: u64,
    pub warning_count: usize,

    pub code_only: bool,
    pub dry_run: bool,
    pub max_depth: usize,
}
