//! Writes rendered artifacts to the output directory.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{PackError, Result};

pub const TEXT_ARTIFACT: &str = "PACK.txt";
pub const JSON_ARTIFACT: &str = "PACK.json";

/// Rendered artifact contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPack {
    pub text: String,
    pub json: String,
}

/// Paths written by one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifacts {
    pub text: PathBuf,
    pub json: PathBuf,
}

/// Create `dir` if needed and overwrite both artifacts.
pub async fn write_artifacts(dir: &Path, rendered: &RenderedPack) -> Result<WrittenArtifacts> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| PackError::io(dir, e))?;

    let text = dir.join(TEXT_ARTIFACT);
    tokio::fs::write(&text, &rendered.text)
        .await
        .map_err(|e| PackError::io(&text, e))?;

    let json = dir.join(JSON_ARTIFACT);
    tokio::fs::write(&json, &rendered.json)
        .await
        .map_err(|e| PackError::io(&json, e))?;

    info!(
        dir = %dir.display(),
        text_bytes = rendered.text.len(),
        json_bytes = rendered.json.len(),
        "Artifacts written"
    );

    Ok(WrittenArtifacts { text, json })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_writes_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/ai-pack");

        let first = RenderedPack {
            text: "first run with a longer body\n".into(),
            json: "{}\n".into(),
        };
        write_artifacts(&out, &first).await.unwrap();

        let second = RenderedPack {
            text: "second\n".into(),
            json: "{\"a\": 1}\n".into(),
        };
        let written = write_artifacts(&out, &second).await.unwrap();

        assert_eq!(std::fs::read_to_string(written.text).unwrap(), "second\n");
        assert_eq!(std::fs::read_to_string(written.json).unwrap(), "{\"a\": 1}\n");
    }
}
