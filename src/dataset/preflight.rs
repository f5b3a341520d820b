/// Overwrite gate run before a live build
///
/// If the output folder already holds files that look like a previous run
/// (same prefix, image or caption extension) the user has to confirm before
/// anything gets written. Confirming overwrites by name without further
/// checks.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use super::asset::{list_assets, AssetKind};
use crate::config::ImageExtensions;
use crate::error::{DatasetError, Result};

const PROMPT: &str = "Existing files found in the output folder. Do you want to overwrite them? [y/N] ";

/// Files in `output_dir` that a run with `prefix` could overwrite
///
/// A missing output folder has no conflicts.
pub fn existing_outputs(
    output_dir: &Path,
    prefix: &str,
    image_extensions: &ImageExtensions,
) -> Result<Vec<PathBuf>> {
    if !output_dir.exists() {
        return Ok(Vec::new());
    }

    let conflicts = list_assets(output_dir, image_extensions)?
        .into_iter()
        .filter(|asset| matches!(asset.kind, AssetKind::Image | AssetKind::Caption))
        .filter(|asset| asset.file_name().starts_with(prefix))
        .map(|asset| asset.path)
        .collect();

    Ok(conflicts)
}

/// Ask for confirmation on `output` and read the answer from `input`
///
/// Anything other than `y`/`yes` (case-insensitive) declines, including an
/// empty line or end of input.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<bool> {
    output
        .write_all(PROMPT.as_bytes())
        .and_then(|_| output.flush())
        .map_err(|e| DatasetError::io("<stdout>", e))?;

    let mut answer = String::new();
    input
        .read_line(&mut answer)
        .map_err(|e| DatasetError::io("<stdin>", e))?;

    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Gate a live run on `output_dir`
///
/// Returns `Err(DatasetError::Cancelled)` when the user declines.
pub fn check_overwrite(
    output_dir: &Path,
    prefix: &str,
    image_extensions: &ImageExtensions,
    assume_yes: bool,
) -> Result<()> {
    let conflicts = existing_outputs(output_dir, prefix, image_extensions)?;
    if conflicts.is_empty() || assume_yes {
        return Ok(());
    }

    tracing::warn!(
        "{} existing file(s) in {} match prefix '{}'",
        conflicts.len(),
        output_dir.display(),
        prefix
    );

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    if confirm(&mut stdin.lock(), &mut stdout)? {
        Ok(())
    } else {
        Err(DatasetError::Cancelled)
    }
}
