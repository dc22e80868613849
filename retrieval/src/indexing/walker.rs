//! File discovery for indexing.
//!
//! Recursive walk from the project root, skipping dot-directories, the
//! built-in directory skip-list, vendor/minified artifacts and user glob
//! exclusions. Only files with a supported source extension survive.

use std::path::Path;
use std::path::PathBuf;

use crate::types::Language;

/// Directories never worth indexing, on top of any dot-directory.
const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "vendor",
    ".git",
    crate::config::STATE_DIR,
    "__pycache__",
    "target",
    "dist",
    "build",
    ".idea",
    ".vscode",
    ".bundle",
    "coverage",
    "tmp",
    "log",
    "logs",
    "cache",
];

/// Path suffixes (relative, forward slashes) that are always generated.
const SKIP_PATH_SUFFIXES: &[&str] = &[
    "public/assets",
    "public/packs",
    "assets/builds",
];

/// Basename fragments marking bundled or minified artifacts.
const SKIP_NAME_FRAGMENTS: &[&str] = &[".min.", ".bundle.", ".standalone.", ".packed."];

/// Common vendored libraries that drown an index in noise.
const VENDOR_NAMES: &[&str] = &[
    "jquery",
    "bootstrap",
    "lodash",
    "underscore",
    "chart.js",
    "three.js",
    "moment",
    "angular",
    "react.production",
    "vue.global",
];

/// Walks the project tree and yields indexable files.
pub struct FileWalker {
    root: PathBuf,
    exclude_globs: Vec<String>,
}

impl FileWalker {
    /// `exclude_globs` are user-supplied, matched against the
    /// project-relative path with `*` as a free wildcard.
    pub fn new(root: &Path, exclude_globs: &[String]) -> Self {
        Self {
            root: root.to_path_buf(),
            exclude_globs: exclude_globs.to_vec(),
        }
    }

    /// Collect all indexable files, sorted by relative path.
    ///
    /// Returns `(relative, absolute)` pairs; relative paths use forward
    /// slashes regardless of platform.
    pub fn walk(&self) -> Vec<(String, PathBuf)> {
        let mut files = Vec::new();
        self.walk_dir(&self.root, &mut files);
        files.sort_by(|a, b| a.0.cmp(&b.0));
        files
    }

    fn walk_dir(&self, dir: &Path, out: &mut Vec<(String, PathBuf)>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if path.is_dir() {
                if self.should_skip_dir(name, &path) {
                    continue;
                }
                self.walk_dir(&path, out);
            } else if self.should_include_file(name, &path) {
                let rel = self.relative(&path);
                out.push((rel, path));
            }
        }
    }

    fn should_skip_dir(&self, name: &str, path: &Path) -> bool {
        if name.starts_with('.') {
            return true;
        }
        if SKIP_DIRS.contains(&name) {
            return true;
        }
        let rel = self.relative(path);
        if SKIP_PATH_SUFFIXES.iter().any(|suffix| rel.ends_with(suffix)) {
            return true;
        }
        self.matches_exclude(&rel)
    }

    fn should_include_file(&self, name: &str, path: &Path) -> bool {
        let lower = name.to_lowercase();
        if SKIP_NAME_FRAGMENTS.iter().any(|frag| lower.contains(frag)) {
            return false;
        }
        if VENDOR_NAMES.iter().any(|vendor| lower.starts_with(vendor)) {
            return false;
        }

        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        if !Language::supported_extensions().contains(&ext.to_lowercase().as_str()) {
            return false;
        }

        !self.matches_exclude(&self.relative(path))
    }

    /// Classify an absolute path from a file-system event.
    ///
    /// Returns the project-relative path when the file would be picked up
    /// by a walk, applying the same directory and file rules to each
    /// component. Paths outside the root are rejected.
    pub fn indexable_rel(&self, abs: &Path) -> Option<String> {
        let rel_path = abs.strip_prefix(&self.root).ok()?;

        let components: Vec<&str> = rel_path
            .iter()
            .filter_map(|c| c.to_str())
            .collect();
        let (dirs, file) = components.split_at(components.len().checked_sub(1)?);

        let mut prefix = String::new();
        for dir in dirs {
            if dir.starts_with('.') || SKIP_DIRS.contains(dir) {
                return None;
            }
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(dir);
            if SKIP_PATH_SUFFIXES.iter().any(|s| prefix.ends_with(s)) {
                return None;
            }
            if self.matches_exclude(&prefix) {
                return None;
            }
        }

        if !self.should_include_file(file.first()?, abs) {
            return None;
        }
        Some(self.relative(abs))
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn matches_exclude(&self, rel: &str) -> bool {
        self.exclude_globs.iter().any(|glob| glob_match(glob, rel))
    }
}

/// Minimal glob: `*` matches any run of characters, `?` exactly one.
///
/// Good enough for the path exclusions this tool accepts; not a full
/// gitignore implementation.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    // Iterative wildcard match with backtracking.
    let (mut pi, mut ti) = (0usize, 0usize);
    let (mut star, mut mark) = (None::<usize>, 0usize);

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
#[path = "walker.test.rs"]
mod tests;
