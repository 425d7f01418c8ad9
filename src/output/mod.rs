//! Artifact composition, rendering, and writing.

pub mod compose;
pub mod dependencies;
pub mod external;
pub mod writer;

pub use compose::{build_tree, compose, language_snapshot, render_json, render_text, ComposeInput};
pub use dependencies::{detect_build_systems, dependency_sources, BuildSystem};
pub use external::{CommandSource, ExternalSection, ExternalSource, SectionState};
pub use writer::{write_artifacts, RenderedPack, WrittenArtifacts, JSON_ARTIFACT, TEXT_ARTIFACT};
