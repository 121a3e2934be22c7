//! Collects the files named on the command line.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

/// A readable UTF-8 file to analyze.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path as shown in output; forward slashes.
    pub display: String,
    pub path: PathBuf,
    pub text: String,
}

/// Expand `paths` into files. Directories are walked respecting
/// `.gitignore`; files that are not UTF-8 are skipped with a warning.
pub fn collect(paths: &[PathBuf]) -> Vec<SourceFile> {
    let mut files = Vec::new();
    for root in paths {
        if root.is_file() {
            push_file(&mut files, root, display_path(root, None));
            continue;
        }

        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !matches!(
                    name.as_ref(),
                    ".git" | "node_modules" | "target" | "__pycache__" | ".venv" | "venv"
                )
            })
            .build();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    tracing::warn!("Skipping unreadable entry under {}: {err}", root.display());
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let display = display_path(entry.path(), Some(root));
            push_file(&mut files, entry.path(), display);
        }
    }

    files.sort_by(|a, b| a.display.cmp(&b.display));
    files.dedup_by(|a, b| a.display == b.display);
    files
}

fn push_file(files: &mut Vec<SourceFile>, path: &Path, display: String) {
    match std::fs::read_to_string(path) {
        Ok(text) => files.push(SourceFile {
            display,
            path: path.to_path_buf(),
            text,
        }),
        Err(err) => {
            tracing::warn!("Skipping {}: {err}", path.display());
        }
    }
}

fn display_path(path: &Path, root: Option<&Path>) -> String {
    let shown = match root {
        Some(root) if root == Path::new(".") => path.strip_prefix(root).unwrap_or(path),
        _ => path,
    };
    shown.to_string_lossy().replace('\\', "/")
}
