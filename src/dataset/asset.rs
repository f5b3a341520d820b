/// Directory listing and file classification

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{ImageExtensions, CAPTION_EXTENSION};
use crate::error::{DatasetError, Result};

/// Extension of the RAW format handled by the normalizer
pub const RAW_EXTENSION: &str = "cr2";

/// What a directory entry is, derived from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Caption,
    Raw,
    Other,
}

/// A file found while listing a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAsset {
    pub path: PathBuf,
    pub kind: AssetKind,
}

impl SourceAsset {
    /// File name only (e.g., "DSC_0001.jpg")
    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }
}

/// Classify a path by its extension
///
/// Recognized image extensions take precedence over the RAW kind, so a
/// `.cr2` listed in the image formats counts as an image.
pub fn classify(path: &Path, image_extensions: &ImageExtensions) -> AssetKind {
    let ext = match path.extension() {
        Some(ext) => ext.to_string_lossy().to_lowercase(),
        None => return AssetKind::Other,
    };

    if image_extensions.contains(&ext) {
        AssetKind::Image
    } else if ext == CAPTION_EXTENSION {
        AssetKind::Caption
    } else if ext == RAW_EXTENSION {
        AssetKind::Raw
    } else {
        AssetKind::Other
    }
}

/// List the files directly inside `directory` (no recursion)
///
/// Entries come back sorted by file name, ascending, so every caller sees
/// the same deterministic order.
pub fn list_assets(directory: &Path, image_extensions: &ImageExtensions) -> Result<Vec<SourceAsset>> {
    if !directory.is_dir() {
        return Err(DatasetError::DirectoryNotFound(directory.to_path_buf()));
    }

    let mut assets = Vec::new();
    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(directory).to_path_buf();
            match e.into_io_error() {
                Some(source) => DatasetError::io(path, source),
                None => DatasetError::Config(format!("filesystem loop at {}", path.display())),
            }
        })?;

        // Only files, directories named like images are skipped
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        let kind = classify(&path, image_extensions);
        assets.push(SourceAsset { path, kind });
    }

    Ok(assets)
}

/// Paths of every asset of `kind`, keeping the listing order
pub fn paths_of_kind(assets: &[SourceAsset], kind: AssetKind) -> Vec<PathBuf> {
    assets
        .iter()
        .filter(|asset| asset.kind == kind)
        .map(|asset| asset.path.clone())
        .collect()
}

/// Lossy file name of a path, empty if it has none
pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}
