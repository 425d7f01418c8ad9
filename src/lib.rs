//! ctxpack library
//!
//! Converts a source repository into a bounded "context pack": directory
//! structure, ranked dependency-manifest candidates, per-language public API
//! surfaces and a size heatmap. The pipeline is read-only with respect to the
//! inspected tree and deterministic for a given tree and configuration.

pub mod api_surface;
pub mod ast_engine;
pub mod batch;
pub mod error;
pub mod manifest;
pub mod output;
pub mod pack;
pub mod processing;
pub mod sizing;
pub mod source;
pub mod types;

pub use error::{PackError, PerFileWarning, Result, WarningKind};
pub use pack::ContextPack;
pub use types::{CompiledConfig, EnumerationMode, PackArtifacts, PackConfig, RepoPath};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api_surface::{ApiExtractor, ApiSection, ApiSymbol, Visibility};
    pub use crate::manifest::{ManifestCandidate, ManifestFunnel, RejectionCache};
    pub use crate::pack::ContextPack;
    pub use crate::sizing::{SizeEstimator, SizeRecord};
    pub use crate::types::*;
}

/// Default output directory, relative to the repository root.
pub const DEFAULT_OUTPUT_DIR: &str = "ai-pack";

/// Default Shannon entropy ceiling (bits/byte) for manifest candidates.
pub const DEFAULT_ENTROPY_THRESHOLD: f64 = 6.0;

/// Default minimum lexical density for manifest candidates.
pub const DEFAULT_DENSITY_THRESHOLD: f64 = 0.05;

/// Default minimum final confidence for manifest candidates.
pub const DEFAULT_FINAL_THRESHOLD: f64 = 0.05;

/// Files above this size are never read by the funnel or the extractor (4MB).
pub const DEFAULT_MAX_PARSE_BYTES: u64 = 4 * 1024 * 1024;

/// Default number of heatmap rows.
pub const DEFAULT_HEATMAP_TOP_N: usize = 50;

/// Default directory tree depth.
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Bytes per estimated token.
pub const TOKEN_DIVISOR: f64 = 3.5;
