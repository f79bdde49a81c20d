use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use glob::Pattern;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::WalkBuilder;
use scf_common::{PackRequest, PackSummary, Packager, Result, ScfError};
use tracing::{debug, info, warn};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Zips a source tree, honouring the root `.gitignore` and the request's
/// include / exclude globs. A source that is a single file is archived alone
/// under its file name.
///
/// `exclude` always wins. `include` brings back files the `.gitignore` would
/// drop; it does not restrict the archive to the matching files.
#[derive(Debug, Clone)]
pub struct ZipPackager {
    use_gitignore: bool,
}

impl Default for ZipPackager {
    fn default() -> Self {
        Self {
            use_gitignore: true,
        }
    }
}

impl ZipPackager {
    pub fn new(use_gitignore: bool) -> Self {
        Self { use_gitignore }
    }
}

#[async_trait]
impl Packager for ZipPackager {
    async fn pack(&self, request: &PackRequest) -> Result<PackSummary> {
        let request = request.clone();
        let use_gitignore = self.use_gitignore;
        let summary = tokio::task::spawn_blocking(move || pack_blocking(&request, use_gitignore))
            .await
            .map_err(|e| ScfError::Packaging(format!("Packaging task failed: {e}")))??;

        info!(files = summary.count, path = %summary.path.display(), "Packed code");
        Ok(summary)
    }
}

fn packaging_error(action: &str, path: &Path, err: impl std::fmt::Display) -> ScfError {
    ScfError::Packaging(format!("Failed to {action} {}: {err}", path.display()))
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p.trim_start_matches("./"))
                .map_err(|e| ScfError::Packaging(format!("Invalid pattern {p}: {e}")))
        })
        .collect()
}

/// True when the path or any of its parent directories matches.
fn matches_any(patterns: &[Pattern], relative: &Path) -> bool {
    relative
        .ancestors()
        .filter(|p| !p.as_os_str().is_empty())
        .any(|p| patterns.iter().any(|pattern| pattern.matches_path(p)))
}

fn load_gitignore(root: &Path) -> Option<Gitignore> {
    let gitignore_path = root.join(".gitignore");
    if !gitignore_path.exists() {
        return None;
    }
    let mut builder = GitignoreBuilder::new(root);
    if let Some(e) = builder.add(&gitignore_path) {
        warn!("Failed to parse .gitignore: {}", e);
        return None;
    }
    match builder.build() {
        Ok(gitignore) => Some(gitignore),
        Err(e) => {
            warn!("Failed to parse .gitignore: {}", e);
            None
        }
    }
}

fn collect_files(
    request: &PackRequest,
    use_gitignore: bool,
    output: &Path,
) -> Result<Vec<(PathBuf, String)>> {
    let source = &request.source;
    let include = compile(&request.include)?;
    let exclude = compile(&request.exclude)?;

    // A single file is archived alone under its own name.
    if source.is_file() {
        let Some(name) = source.file_name() else {
            return Ok(Vec::new());
        };
        if matches_any(&exclude, Path::new(name)) {
            return Ok(Vec::new());
        }
        return Ok(vec![(source.clone(), name.to_string_lossy().into_owned())]);
    }

    let gitignore = if use_gitignore {
        load_gitignore(source)
    } else {
        None
    };

    let walker = WalkBuilder::new(source)
        .standard_filters(false)
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| packaging_error("walk", source, e))?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let path = entry.path();
        if path.canonicalize().ok().as_deref() == Some(output) {
            continue;
        }
        let Ok(relative) = path.strip_prefix(source) else {
            continue;
        };

        let ignored = gitignore
            .as_ref()
            .is_some_and(|g| g.matched_path_or_any_parents(relative, false).is_ignore());
        if ignored && !matches_any(&include, relative) {
            continue;
        }
        if matches_any(&exclude, relative) {
            debug!(file = %relative.display(), "Excluded from package");
            continue;
        }

        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((path.to_path_buf(), name));
    }
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

fn pack_blocking(request: &PackRequest, use_gitignore: bool) -> Result<PackSummary> {
    let source = &request.source;
    if !source.exists() {
        return Err(packaging_error("find source", source, "no such file or directory"));
    }
    std::fs::create_dir_all(&request.output_dir)
        .map_err(|e| packaging_error("create", &request.output_dir, e))?;

    let output_dir = request
        .output_dir
        .canonicalize()
        .map_err(|e| packaging_error("resolve", &request.output_dir, e))?;
    let output = output_dir.join(&request.output_name);
    let files = collect_files(request, use_gitignore, &output)?;

    let temp_path = output.with_extension("zip.tmp");
    let archive = File::create(&temp_path).map_err(|e| packaging_error("create", &temp_path, e))?;
    let mut writer = ZipWriter::new(archive);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (path, name) in &files {
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| packaging_error("add", path, e))?;
        let mut file = File::open(path).map_err(|e| packaging_error("open", path, e))?;
        io::copy(&mut file, &mut writer).map_err(|e| packaging_error("read", path, e))?;
    }
    writer
        .finish()
        .map_err(|e| packaging_error("finish", &temp_path, e))?;
    std::fs::rename(&temp_path, &output).map_err(|e| packaging_error("write", &output, e))?;

    Ok(PackSummary {
        count: files.len(),
        path: output,
    })
}
