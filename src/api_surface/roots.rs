//! Project-root discovery from the filtered path list.

use super::rules::RootScope;
use crate::types::parent_of;

/// Conventional JavaScript/TypeScript source directories, in preference order.
pub const FRONTEND_DIRS: &[&str] = &["app", "frontend", "web", "client", "ui", "src"];

/// Conventional Rust source directory when no `Cargo.toml` is present.
pub const RUST_FALLBACK_DIR: &str = "src";

/// Whether `path` lies under `root` (`""` is the repository root).
pub fn is_under(path: &str, root: &str) -> bool {
    root.is_empty()
        || path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}

fn push_unique(roots: &mut Vec<String>, root: String) {
    if !roots.contains(&root) {
        roots.push(root);
    }
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Scan roots for `scope`, deduplicated in discovery order.
///
/// `files` is the sorted filtered list. `AllFiles` yields the single root
/// `""`. Marker-based scopes fall back to the first conventional directory
/// that holds at least one filtered file, and yield nothing otherwise.
pub fn discover_roots(scope: RootScope, files: &[String]) -> Vec<String> {
    let (marker, fallback): (&str, &[&str]) = match scope {
        RootScope::AllFiles => return vec![String::new()],
        RootScope::CargoCrates => ("Cargo.toml", &[RUST_FALLBACK_DIR]),
        RootScope::PackageDirs => ("package.json", FRONTEND_DIRS),
    };

    let mut roots = Vec::new();
    for path in files.iter().filter(|p| basename(p) == marker) {
        let dir = parent_of(path);
        let root = match scope {
            RootScope::CargoCrates => join(dir, "src"),
            _ => dir.to_string(),
        };
        push_unique(&mut roots, root);
    }

    if roots.is_empty() {
        if let Some(dir) = fallback
            .iter()
            .find(|dir| files.iter().any(|p| is_under(p, dir)))
        {
            roots.push(dir.to_string());
        }
    }

    roots
}
