/// File pairing and renumbering
///
/// Images and captions in one directory are sorted by name and paired by
/// position: the i-th image goes with the i-th caption whether or not their
/// base names match. Pairing stops at the shorter list, leftover files are
/// not touched. Each pair then gets the next sequence number.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use super::asset::{file_name_of, list_assets, paths_of_kind, AssetKind};
use super::materialize::copy_with_metadata;
use super::sequence::{caption_name, image_name, Numbering};
use crate::config::{ImageExtensions, SortOrder};
use crate::error::{DatasetError, Result};

/// One rename operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameEntry {
    pub old: PathBuf,
    pub new: PathBuf,
}

/// An image and the caption paired with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePair {
    pub number: i64,
    pub image: RenameEntry,
    pub caption: RenameEntry,
}

/// Every rename to perform, computed before anything is moved
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenamePlan {
    pub pairs: Vec<RenamePair>,
}

/// A pair that could not be fully renamed
#[derive(Debug)]
pub struct RenameFailure {
    pub number: i64,
    pub error: DatasetError,
}

/// Outcome of executing a plan
#[derive(Debug, Default)]
pub struct RenameReport {
    /// Files renamed (or that would be renamed in a dry run)
    pub renamed: usize,
    pub failures: Vec<RenameFailure>,
}

/// Build the rename plan for `directory`
///
/// # Arguments
/// * `directory` - Folder holding the images and captions; renamed files stay in it
/// * `prefix` - Name prefix, joined to the number with `_`
/// * `start` - Lowest sequence number
/// * `order` - Numbering and pairing direction
/// * `image_extensions` - Extensions that count as images
///
/// # Returns
/// * `Ok(RenamePlan)` - Every rename, nothing moved yet
/// * `Err(DatasetError)` - Unreadable directory or a sequence that overflows
pub fn plan_rename(
    directory: &Path,
    prefix: &str,
    start: i64,
    order: SortOrder,
    image_extensions: &ImageExtensions,
) -> Result<RenamePlan> {
    // Listing comes back sorted by file name
    let assets = list_assets(directory, image_extensions)?;
    let images = paths_of_kind(&assets, AssetKind::Image);
    let captions = paths_of_kind(&assets, AssetKind::Caption);

    plan_pairs(directory, images, captions, prefix, start, order)
}

/// Same as `plan_rename` over explicit image and caption lists
///
/// The files do not have to exist yet, which lets a dry run plan the
/// renames of files it has not staged. Both lists are sorted by file name
/// before pairing.
pub fn plan_pairs(
    directory: &Path,
    mut images: Vec<PathBuf>,
    mut captions: Vec<PathBuf>,
    prefix: &str,
    start: i64,
    order: SortOrder,
) -> Result<RenamePlan> {
    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    captions.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let numbering = Numbering::arrange(&mut images, start, order)?;
    if order == SortOrder::Descending {
        captions.reverse();
    }

    // zip stops at the shorter list
    let pairs = images
        .into_iter()
        .zip(captions)
        .enumerate()
        .map(|(position, (image, caption))| {
            let number = numbering.number_at(position);
            let new_image = directory.join(image_name(prefix, number, &image));
            let new_caption = directory.join(caption_name(prefix, number));
            RenamePair {
                number,
                image: RenameEntry {
                    old: image,
                    new: new_image,
                },
                caption: RenameEntry {
                    old: caption,
                    new: new_caption,
                },
            }
        })
        .collect();

    Ok(RenamePlan { pairs })
}

/// Copy the captions of `input_dir` into `output_dir`
///
/// Rename-only runs over two folders rename the pairs in `output_dir`, so
/// the captions have to travel with the normalized images. In a dry run
/// nothing is copied and the would-be paths are returned.
pub fn stage_captions(
    input_dir: &Path,
    output_dir: &Path,
    image_extensions: &ImageExtensions,
    dry_run: bool,
) -> Result<Vec<PathBuf>> {
    let assets = list_assets(input_dir, image_extensions)?;
    let mut staged = Vec::new();

    for source in paths_of_kind(&assets, AssetKind::Caption) {
        let name = file_name_of(&source);
        let target = output_dir.join(&name);
        if dry_run {
            info!("Would copy {} to {}", name, file_name_of(&target));
        } else {
            copy_with_metadata(&source, &target)?;
        }
        staged.push(target);
    }

    Ok(staged)
}

impl RenamePair {
    /// Image first, then caption
    pub fn entries(&self) -> [&RenameEntry; 2] {
        [&self.image, &self.caption]
    }
}

impl RenamePlan {
    /// All entries in execution order: image then caption for each pair
    pub fn entries(&self) -> impl Iterator<Item = &RenameEntry> {
        self.pairs.iter().flat_map(RenamePair::entries)
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Perform the renames, or only report them when `dry_run` is set
    ///
    /// A failed rename ends its pair (the caption stays put when its image
    /// could not be moved) and execution carries on with the next pair.
    /// Renames that already happened are kept.
    pub fn execute(&self, dry_run: bool) -> RenameReport {
        let mut report = RenameReport::default();

        for pair in &self.pairs {
            for entry in pair.entries() {
                let old_name = file_name_of(&entry.old);
                let new_name = file_name_of(&entry.new);

                if dry_run {
                    info!("Would rename '{}' to '{}'", old_name, new_name);
                    report.renamed += 1;
                    continue;
                }

                match rename_no_clobber(&entry.old, &entry.new) {
                    Ok(()) => {
                        info!("Renamed '{}' to '{}'", old_name, new_name);
                        report.renamed += 1;
                    }
                    Err(e) => {
                        error!("Failed to rename '{}' to '{}': {}", old_name, new_name, e);
                        report.failures.push(RenameFailure {
                            number: pair.number,
                            error: e,
                        });
                        break;
                    }
                }
            }
        }

        if dry_run {
            info!("Dry run completed. No files were actually renamed.");
        } else {
            info!("Renamed {} files successfully.", report.renamed);
        }

        report
    }
}

/// Rename within a directory, refusing to replace a different file
fn rename_no_clobber(old: &Path, new: &Path) -> Result<()> {
    if old == new {
        return Ok(());
    }
    if new.exists() {
        return Err(DatasetError::TargetExists(new.to_path_buf()));
    }
    fs::rename(old, new).map_err(|e| DatasetError::io(old, e))
}
