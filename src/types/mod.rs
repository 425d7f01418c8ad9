//! Core types for the pack pipeline.

mod artifacts;
mod config;
mod repo_path;

pub use artifacts::{LanguageStat, PackArtifacts, RunSummary, TreeEntry};
pub use config::{
    CompiledConfig, CompiledPathRule, EnumerationMode, ExternalToolConfig, FunnelConfig,
    PackConfig, PathRule, StructuralQuery, DEFAULT_CONFIG_FILE, ENV_PREFIX,
};
pub(crate) use config::keyword_regex;
pub use repo_path::{compare_paths, extension_of, parent_of, RepoPath, TextClass};

pub(crate) use config::normalize_words;
