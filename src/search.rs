use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::warn;

use crate::{
    error::{Error, Result},
    extract::Extractor,
};

/// Extensions searched when the caller does not narrow them.
pub const DEFAULT_TARGET_EXTENSIONS: &[&str] =
    &[".html", ".htm", ".tex", ".inp", ".op"];

/// Hard cap on snippet length, in characters.
pub const MAX_SNIPPET_LENGTH: usize = 300;

/// Characters of context kept on each side of the first match.
pub const SNIPPET_CONTEXT_WINDOW: usize = 100;

/// One search invocation's inputs. Immutable per call; no state outlives
/// the call.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Substring to look for, matched case-insensitively.
    pub query: String,
    /// Absolute directory the search is scoped to. All relative paths in
    /// results are computed against it.
    pub root_dir: PathBuf,
    /// Absolute paths whose subtrees are never traversed or matched.
    pub exclusions: Vec<PathBuf>,
    /// Lower-cased, dot-prefixed extensions to inspect.
    pub target_extensions: Vec<String>,
    /// Optional walk starting point, always relative to `root_dir`.
    pub sub_directory: Option<PathBuf>,
}

impl SearchOptions {
    pub fn new(query: impl Into<String>, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            query: query.into(),
            root_dir: root_dir.into(),
            exclusions: Vec::new(),
            target_extensions: DEFAULT_TARGET_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            sub_directory: None,
        }
    }
}

/// One matched file.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    /// Fully resolved path on the local filesystem. Must never be
    /// forwarded off-box; consumers relaying results to a remote model
    /// send only the other three fields.
    pub absolute_path: PathBuf,
    /// Path relative to the original root directory, even when a
    /// sub-directory narrowed the walk.
    pub relative_path: PathBuf,
    pub file_name: String,
    /// Bounded excerpt of normalized text around the first match.
    pub snippet: String,
}

/// Search a directory tree for a case-insensitive substring.
///
/// The walk is sequential and depth-first, in directory-listing order.
/// An empty query or a missing effective root yields an empty result set
/// rather than an error; a failure to enumerate a directory mid-walk
/// surfaces as [`Error::Walk`] so callers can tell "no matches" from
/// "search could not complete".
pub fn search(options: &SearchOptions) -> Result<Vec<SearchResult>> {
    let query = options.query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }

    let effective_root = match &options.sub_directory {
        Some(sub) => {
            if !descends_from_root(sub) {
                warn!(
                    "sub-directory escapes the root, refusing: {}",
                    sub.display()
                );
                return Ok(Vec::new());
            }
            options.root_dir.join(sub)
        }
        None => options.root_dir.clone(),
    };
    if !effective_root.is_dir() {
        warn!(
            "effective root is not a directory: {}",
            effective_root.display()
        );
        return Ok(Vec::new());
    }

    let target_extensions: Vec<String> = options
        .target_extensions
        .iter()
        .map(|e| normalize_extension(e))
        .collect();

    let mut results = Vec::new();
    walk_dir(
        &effective_root,
        options,
        query,
        &target_extensions,
        &mut results,
    )?;
    Ok(results)
}

fn walk_dir(
    dir: &Path,
    options: &SearchOptions,
    query: &str,
    target_extensions: &[String],
    results: &mut Vec<SearchResult>,
) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|source| Error::Walk {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| Error::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();

        // Prune before descending: an excluded subtree is never read.
        if is_excluded(&path, &options.exclusions) {
            continue;
        }

        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(e) => {
                warn!("skipping {}: {e}", path.display());
                continue;
            }
        };

        if file_type.is_dir() {
            walk_dir(&path, options, query, target_extensions, results)?;
        } else if file_type.is_file() {
            let ext = match file_extension(&path) {
                Some(e) => e,
                None => continue,
            };
            if !target_extensions.contains(&ext) {
                continue;
            }
            match process_file(&path, &ext, options, query) {
                Ok(Some(result)) => results.push(result),
                Ok(None) => {}
                Err(e) => warn!("skipping {}: {e}", path.display()),
            }
        }
    }

    Ok(())
}

fn process_file(
    path: &Path,
    ext: &str,
    options: &SearchOptions,
    query: &str,
) -> Result<Option<SearchResult>> {
    let content = std::fs::read_to_string(path)?;
    let text = Extractor::for_extension(ext).extract(&content);

    let (match_start, match_end) = match find_ignore_case(&text, query) {
        Some(range) => range,
        None => return Ok(None),
    };

    // The walk starts inside root_dir, so every file strips cleanly; a
    // file that does not is dropped rather than reported by its absolute
    // path.
    let relative_path = match path.strip_prefix(&options.root_dir) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => {
            warn!("skipping {}: outside the search root", path.display());
            return Ok(None);
        }
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(Some(SearchResult {
        absolute_path: path.to_path_buf(),
        relative_path,
        file_name,
        snippet: build_snippet(&text, match_start, match_end),
    }))
}

/// A sub-directory may only descend from the root. `Path::join` replaces
/// the root entirely when given an absolute path, and `..` walks out of
/// it, so any component other than a plain name is rejected up front.
/// The value can come from a remote model's tool call and is never
/// trusted.
fn descends_from_root(sub: &Path) -> bool {
    sub.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Segment-anchored exclusion test: a path is excluded when it equals an
/// exclusion entry or lies under one. `/foo/bar-extra` must not match the
/// exclusion `/foo/bar`, so this is never a plain string-prefix check.
fn is_excluded(path: &Path, exclusions: &[PathBuf]) -> bool {
    exclusions.iter().any(|ex| path.starts_with(ex))
}

/// Lower-cased, dot-prefixed extension of a file, if it has one.
fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// Find the first case-insensitive occurrence of `needle` in `haystack`,
/// returning its byte range. Comparison is per-char Unicode lowercasing,
/// so offsets always land on char boundaries of the original text.
fn find_ignore_case(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    if needle.is_empty() {
        return None;
    }
    for (start, _) in haystack.char_indices() {
        if let Some(len) = match_at_ignore_case(&haystack[start..], needle) {
            return Some((start, start + len));
        }
    }
    None
}

fn match_at_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let mut hay = haystack.char_indices();
    let mut matched = 0;
    for nc in needle.chars() {
        let (i, hc) = hay.next()?;
        if !hc.to_lowercase().eq(nc.to_lowercase()) {
            return None;
        }
        matched = i + hc.len_utf8();
    }
    Some(matched)
}

/// Build the context snippet around a match.
///
/// Takes up to [`SNIPPET_CONTEXT_WINDOW`] characters on each side of the
/// match, marks truncated ends with `...`, and hard-caps the whole
/// snippet at [`MAX_SNIPPET_LENGTH`] characters.
fn build_snippet(text: &str, match_start: usize, match_end: usize) -> String {
    let prefix = &text[..match_start];
    let suffix = &text[match_end..];

    let start = prefix
        .char_indices()
        .rev()
        .nth(SNIPPET_CONTEXT_WINDOW - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let end = suffix
        .char_indices()
        .nth(SNIPPET_CONTEXT_WINDOW)
        .map(|(i, _)| match_end + i)
        .unwrap_or(text.len());

    let mut snippet = String::new();
    if start > 0 {
        snippet.push_str("...");
    }
    snippet.push_str(&text[start..end]);
    if end < text.len() {
        snippet.push_str("...");
    }

    if snippet.chars().count() > MAX_SNIPPET_LENGTH {
        snippet = snippet
            .chars()
            .take(MAX_SNIPPET_LENGTH - 3)
            .collect::<String>();
        snippet.push_str("...");
    }

    snippet
}
