use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use glob::{glob, Pattern};
use tracing::{debug, info, warn};

/// Fails unless `input_dir` is a directory whose entries can be listed.
pub fn check_input_root(input_dir: &Path) -> Result<()> {
    if !input_dir.is_dir() {
        bail!("Input directory {} does not exist", input_dir.display());
    }
    fs::read_dir(input_dir)
        .with_context(|| format!("Cannot read input directory {}", input_dir.display()))?;
    Ok(())
}

/// Every non-empty `*.gz` file below `<input_dir>/<entity>`, sorted by path so
/// the chunk partition is reproducible. `limit` keeps only the first files.
///
/// `None` means the snapshot has no directory for `entity` at all.
pub fn find_entity_files(
    input_dir: &Path,
    entity: &str,
    limit: Option<usize>,
) -> Result<Option<Vec<PathBuf>>> {
    check_input_root(input_dir)?;
    let root = input_dir.join(entity);
    if !root.is_dir() {
        warn!("No input directory for {} at {}, skipping", entity, root.display());
        return Ok(None);
    }

    let root_str = root
        .to_str()
        .with_context(|| format!("Input path is not valid UTF-8: {}", root.display()))?;
    let pattern = format!("{}/**/*.gz", Pattern::escape(root_str));
    info!("Searching for {} files with pattern: {}", entity, pattern);

    let mut files = Vec::new();
    for entry in glob(&pattern)? {
        match entry {
            Ok(path) => match path.metadata() {
                Ok(meta) if meta.is_file() && meta.len() > 0 => files.push(path),
                Ok(_) => debug!("Skipping {}", path.display()),
                Err(e) => warn!("Cannot stat {}: {}", path.display(), e),
            },
            Err(e) => warn!("Error reading glob entry: {}", e),
        }
    }

    files.sort();
    if let Some(limit) = limit {
        files.truncate(limit);
    }
    info!("Found {} {} files", files.len(), entity);
    Ok(Some(files))
}
