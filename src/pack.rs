//! Gathering files from disk into archive entries.
//!
//! This is the collaborator side of [`build_zip`](crate::build_zip): it picks
//! the files, decides their entry names and loads their contents. Directory
//! walks are sorted by name so the same tree always produces the same archive.

use anyhow::{Context, Result};
use log::debug;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::zip::FileEntry;

/// How input paths are turned into entries.
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    /// Store only the file name, dropping directory components.
    pub junk_paths: bool,
    /// Glob patterns; files whose entry name or base name match are skipped.
    pub exclude: Vec<String>,
}

/// A file selected for packing and the entry name it will be stored under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackSource {
    pub path: PathBuf,
    pub name: String,
}

/// Expand `inputs` into the list of files to archive, in order.
///
/// Files are named by their path relative to the input's parent directory,
/// joined with `/`. Directories are walked recursively.
pub fn collect_sources(inputs: &[PathBuf], options: &PackOptions) -> Result<Vec<PackSource>> {
    let mut sources = Vec::new();

    for input in inputs {
        let metadata = std::fs::metadata(input)
            .with_context(|| format!("Cannot read {}", input.display()))?;

        if metadata.is_dir() {
            let root_name = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned());

            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry.with_context(|| format!("Cannot walk {}", input.display()))?;
                if !entry.file_type().is_file() {
                    continue;
                }

                let relative = entry.path().strip_prefix(input)?;
                let mut name = join_components(relative);
                if let Some(root) = &root_name {
                    name = format!("{}/{}", root, name);
                }
                sources.push(PackSource {
                    path: entry.path().to_path_buf(),
                    name,
                });
            }
        } else {
            let name = input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| join_components(input));
            sources.push(PackSource {
                path: input.clone(),
                name,
            });
        }
    }

    if options.junk_paths {
        for source in &mut sources {
            if let Some((_, base)) = source.name.rsplit_once('/') {
                source.name = base.to_string();
            }
        }
    }

    sources.retain(|source| {
        let excluded = is_excluded(&source.name, &options.exclude);
        if excluded {
            debug!("excluding {}", source.name);
        }
        !excluded
    });

    Ok(sources)
}

/// Read every source into a [`FileEntry`].
pub async fn load_entries(sources: &[PackSource]) -> Result<Vec<FileEntry>> {
    let mut entries = Vec::with_capacity(sources.len());
    for source in sources {
        let data = tokio::fs::read(&source.path)
            .await
            .with_context(|| format!("Cannot read {}", source.path.display()))?;
        entries.push(FileEntry::new(source.name.clone(), data));
    }
    Ok(entries)
}

/// Join the normal components of `path` with `/`.
fn join_components(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_excluded(name: &str, patterns: &[String]) -> bool {
    let basename = name.rsplit('/').next().unwrap_or(name);
    patterns
        .iter()
        .any(|p| glob_match(p, name) || glob_match(p, basename))
}

/// Glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
///
/// Only the most recent `*` is ever retried, so matching takes at most
/// `pattern.len() * text.len()` steps.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position of the last `*` and the text position it currently swallows up to
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    p = star_p + 1;
                    t = star_t + 1;
                    star = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
