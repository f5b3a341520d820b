/// Dataset materializer
///
/// Generates a caption for every image of a folder and writes the image
/// plus a `.txt` caption under sequential names into the output folder.
/// Numbers are assigned up front, so an image whose caption fails leaves a
/// gap instead of shifting the following items.

use std::fs::{self, File, FileTimes};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::asset::{file_name_of, list_assets, paths_of_kind, AssetKind};
use super::sequence::{caption_name, image_name, Numbering};
use crate::caption::{CaptionError, Captioner};
use crate::config::{ImageExtensions, SortOrder};
use crate::error::{DatasetError, Result};

/// Where one source image ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetItem {
    pub source: PathBuf,
    pub image: PathBuf,
    pub caption: PathBuf,
}

/// Outcome of a dataset build
#[derive(Debug, Default)]
pub struct DatasetReport {
    /// Every item in processing order, whether or not it succeeded
    pub planned: Vec<DatasetItem>,
    /// Items with both image and caption written (always 0 in a dry run)
    pub processed: usize,
    /// Source images that were skipped
    pub skipped: Vec<PathBuf>,
}

/// Naming and numbering options of a build
#[derive(Debug, Clone)]
pub struct NamingOptions<'a> {
    pub prefix: &'a str,
    pub start: i64,
    pub order: SortOrder,
}

/// Builds a captioned dataset with an injected captioner
pub struct DatasetMaterializer<C> {
    captioner: C,
    trigger: String,
}

impl<C: Captioner> DatasetMaterializer<C> {
    /// `trigger` is prepended (followed by one space) to every caption
    pub fn new(captioner: C, trigger: impl Into<String>) -> Self {
        DatasetMaterializer {
            captioner,
            trigger: trigger.into(),
        }
    }

    /// Caption every recognized image of `input_dir` into `output_dir`
    ///
    /// # Arguments
    /// * `input_dir` - Folder scanned (not recursively) for images
    /// * `output_dir` - Destination, created on a live run
    /// * `naming` - Prefix, start number and order of the output names
    /// * `image_extensions` - Extensions that count as images
    /// * `dry_run` - Only log and plan, touch nothing and call no backend
    ///
    /// # Returns
    /// * `Ok(DatasetReport)` - Planned items, processed count and skipped sources
    /// * `Err(DatasetError)` - Unreadable input, overflowing numbers or an
    ///   output folder that cannot be created; per-image failures are skipped
    pub async fn build_dataset(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        naming: &NamingOptions<'_>,
        image_extensions: &ImageExtensions,
        dry_run: bool,
    ) -> Result<DatasetReport> {
        // Existing captions are not consulted, they get regenerated
        let assets = list_assets(input_dir, image_extensions)?;
        let images = paths_of_kind(&assets, AssetKind::Image);
        self.materialize(images, output_dir, naming, dry_run).await
    }

    /// Same as `build_dataset` over an explicit list of images
    ///
    /// The list is sorted by file name before numbering, so callers may pass
    /// paths in any order.
    pub async fn materialize(
        &self,
        mut images: Vec<PathBuf>,
        output_dir: &Path,
        naming: &NamingOptions<'_>,
        dry_run: bool,
    ) -> Result<DatasetReport> {
        images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        let numbering = Numbering::arrange(&mut images, naming.start, naming.order)?;
        debug!(
            "{} image(s), sequence starts at {}",
            images.len(),
            numbering.effective_start()
        );

        if !dry_run {
            fs::create_dir_all(output_dir).map_err(|e| DatasetError::io(output_dir, e))?;
        }

        let mut report = DatasetReport::default();

        for (position, source) in images.into_iter().enumerate() {
            let number = numbering.number_at(position);
            let item = DatasetItem {
                image: output_dir.join(image_name(naming.prefix, number, &source)),
                caption: output_dir.join(caption_name(naming.prefix, number)),
                source,
            };
            let source_name = file_name_of(&item.source);

            if dry_run {
                info!(
                    "Would process {} -> {}, {}",
                    source_name,
                    file_name_of(&item.image),
                    file_name_of(&item.caption)
                );
                report.planned.push(item);
                continue;
            }

            match self.process_item(&item).await {
                Ok(()) => {
                    info!(
                        "Processed {} -> {}, {}",
                        source_name,
                        file_name_of(&item.image),
                        file_name_of(&item.caption)
                    );
                    report.processed += 1;
                }
                Err(ItemError::Caption(e)) => {
                    warn!(
                        "Skipping {} due to caption generation failure: {}",
                        source_name, e
                    );
                    report.skipped.push(item.source.clone());
                }
                Err(ItemError::Write(e)) => {
                    error!("Skipping {}: {}", source_name, e);
                    report.skipped.push(item.source.clone());
                }
            }
            report.planned.push(item);
        }

        if dry_run {
            info!("Dry run completed. No files were actually processed or renamed.");
        } else {
            info!(
                "Processed {} of {} files successfully.",
                report.processed,
                report.planned.len()
            );
        }

        Ok(report)
    }

    /// Caption one image, then write the image copy and the caption file
    async fn process_item(&self, item: &DatasetItem) -> std::result::Result<(), ItemError> {
        let bytes = tokio::fs::read(&item.source)
            .await
            .map_err(|e| ItemError::Caption(CaptionError::Io(e)))?;

        let caption = self
            .captioner
            .caption(&bytes)
            .await
            .map_err(ItemError::Caption)?;
        if caption.is_empty() {
            return Err(ItemError::Caption(CaptionError::Empty));
        }

        copy_with_metadata(&item.source, &item.image).map_err(ItemError::Write)?;

        let text = format!("{} {}", self.trigger, caption);
        if let Err(e) = fs::write(&item.caption, text) {
            // No image without its caption
            let _ = fs::remove_file(&item.image);
            return Err(ItemError::Write(DatasetError::io(&item.caption, e)));
        }

        Ok(())
    }
}

/// Why a single item was skipped
enum ItemError {
    Caption(CaptionError),
    Write(DatasetError),
}

/// Copy a file, keeping its timestamps and permissions
///
/// # Arguments
/// * `source` - File to copy
/// * `target` - Destination, replaced if it exists
///
/// # Returns
/// * `Err(DatasetError::Io)` - Nothing is left at `target` after a failure
pub fn copy_with_metadata(source: &Path, target: &Path) -> Result<()> {
    let mut reader = File::open(source).map_err(|e| DatasetError::io(source, e))?;
    let metadata = reader.metadata().map_err(|e| DatasetError::io(source, e))?;

    let mut times = FileTimes::new();
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }

    let mut writer = File::create(target).map_err(|e| DatasetError::io(target, e))?;

    // Times through the open handle, permissions last: a read-only source
    // must not lock the copy before it is complete
    let copied = io::copy(&mut reader, &mut writer)
        .and_then(|_| writer.set_times(times))
        .and_then(|_| fs::set_permissions(target, metadata.permissions()));

    if let Err(e) = copied {
        drop(writer);
        let _ = fs::remove_file(target);
        return Err(DatasetError::io(target, e));
    }
    Ok(())
}
