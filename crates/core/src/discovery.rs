//! Source file discovery with gitignore-aware filtering
//!
//! Uses the `ignore` crate (from ripgrep) to respect `.gitignore`, `.ignore`
//! and `.git/info/exclude`, and `glob` patterns to select files.

use anyhow::Result;
use glob::{MatchOptions, Pattern};
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Directories never entered, whatever the configuration says
pub const ALWAYS_EXCLUDED: &[&str] = &["node_modules", "dist", "build", "out", "coverage", ".next"];

/// Discover files under `root` whose root-relative path matches any of the
/// `include` globs, skipping any directory named in `exclude_dirs` (and
/// [`ALWAYS_EXCLUDED`]) at any depth.
///
/// Returns absolute paths sorted alphabetically.
pub fn discover_sources(
    root: &Path,
    include: &[String],
    exclude_dirs: &[String],
    respect_gitignore: bool,
) -> Result<Vec<PathBuf>> {
    let root = root.canonicalize()?;

    let patterns: Vec<Pattern> = include
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                warn!(glob = %glob, error = %e, "Skipping invalid include pattern");
                None
            }
        })
        .collect();

    let excluded: Vec<String> = exclude_dirs
        .iter()
        .cloned()
        .chain(ALWAYS_EXCLUDED.iter().map(|d| d.to_string()))
        .collect();

    let mut builder = WalkBuilder::new(&root);
    builder
        .hidden(true) // skip hidden files/dirs
        .git_ignore(respect_gitignore)
        .git_global(respect_gitignore)
        .git_exclude(respect_gitignore)
        .ignore(respect_gitignore)
        .require_git(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            if !is_dir || entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !excluded.iter().any(|dir| dir.as_str() == name)
        });

    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };

    let mut files = Vec::new();

    for entry in builder.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };

        // Only collect files, not directories
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }

        let path = entry.into_path();
        let path = if path.is_absolute() { path } else { root.join(path) };
        let Ok(relative) = path.strip_prefix(&root) else {
            continue;
        };

        if patterns.iter().any(|p| p.matches_path_with(relative, options)) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}
