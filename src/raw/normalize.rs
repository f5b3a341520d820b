/// Format normalizer
///
/// Populates a working folder with standard images: `.cr2` files are decoded
/// and re-encoded as JPEG, JPEG/PNG files are copied as they are, anything
/// else is ignored. Each converted file is read back before it counts as
/// produced.

use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

use super::decode::{RawDecoder, RgbFrame};
use crate::config::ImageExtensions;
use crate::dataset::asset::{file_name_of, list_assets, AssetKind};
use crate::dataset::materialize::copy_with_metadata;
use crate::error::{DatasetError, Result};

/// JPEG quality used for converted RAW files (0 - 100)
pub const JPEG_QUALITY: u8 = 95;

/// Formats passed through unchanged
const STANDARD_FORMATS: &str = "jpg,jpeg,png";

/// A file of the working folder and the input file it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedImage {
    pub source: PathBuf,
    pub path: PathBuf,
}

/// Outcome of normalizing a folder
#[derive(Debug, Default)]
pub struct NormalizeReport {
    /// Files written to the output folder (or that would be, in a dry run)
    pub produced: Vec<NormalizedImage>,
    /// Input files that could not be converted or copied
    pub failures: Vec<(PathBuf, DatasetError)>,
}

impl NormalizeReport {
    /// Produced files whose *source* has one of `image_extensions`
    ///
    /// A `.cr2` listed by the user selects the JPEG it was converted to.
    pub fn recognized(&self, image_extensions: &ImageExtensions) -> Vec<PathBuf> {
        self.produced
            .iter()
            .filter(|image| {
                image
                    .source
                    .extension()
                    .map(|ext| image_extensions.contains(&ext.to_string_lossy()))
                    .unwrap_or(false)
            })
            .map(|image| image.path.clone())
            .collect()
    }
}

/// Normalize `input_dir` into `output_dir`
///
/// Runs the blocking conversion on tokio's blocking pool so the decode
/// buffers never sit on the async executor.
///
/// # Arguments
/// * `input_dir` - Folder scanned (not recursively) for RAW and standard images
/// * `output_dir` - Working folder, created on a live run
/// * `decoder` - RAW decoder used for `.cr2` files
/// * `dry_run` - Only log and report the would-be files
///
/// # Returns
/// * `Ok(NormalizeReport)` - Produced files and per-file failures
/// * `Err(DatasetError)` - The input cannot be listed or the output not created
pub async fn normalize_folder(
    input_dir: PathBuf,
    output_dir: PathBuf,
    decoder: Arc<dyn RawDecoder>,
    dry_run: bool,
) -> Result<NormalizeReport> {
    tokio::task::spawn_blocking(move || {
        normalize_folder_blocking(&input_dir, &output_dir, decoder.as_ref(), dry_run)
    })
    .await
    .map_err(|e| DatasetError::Config(format!("normalizer task failed: {}", e)))?
}

/// Blocking implementation of `normalize_folder`
pub fn normalize_folder_blocking(
    input_dir: &Path,
    output_dir: &Path,
    decoder: &dyn RawDecoder,
    dry_run: bool,
) -> Result<NormalizeReport> {
    let standard = ImageExtensions::parse(STANDARD_FORMATS)?;
    let assets = list_assets(input_dir, &standard)?;

    if !dry_run {
        fs::create_dir_all(output_dir).map_err(|e| DatasetError::io(output_dir, e))?;
    }

    let mut report = NormalizeReport::default();
    // x.cr2 and x.jpg both want x.jpg; the first one in name order keeps it
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    for asset in assets {
        let name = asset.file_name();
        let target = match asset.kind {
            AssetKind::Raw => {
                let stem = asset
                    .path
                    .file_stem()
                    .unwrap_or_default()
                    .to_string_lossy()
                    .to_string();
                output_dir.join(format!("{}.jpg", stem))
            }
            AssetKind::Image => output_dir.join(&name),
            // Captions and unknown formats are not part of the working folder
            AssetKind::Caption | AssetKind::Other => continue,
        };

        let result = if claimed.contains(&target) {
            Err(DatasetError::TargetExists(target.clone()))
        } else if dry_run {
            let verb = if asset.kind == AssetKind::Raw { "convert" } else { "copy" };
            info!("Would {} {} to {}", verb, name, file_name_of(&target));
            Ok(())
        } else if asset.kind == AssetKind::Raw {
            convert_raw(&asset.path, &target, decoder)
                .map(|_| info!("Converted {} to {}", name, file_name_of(&target)))
        } else {
            copy_standard(&asset.path, &target)
        };

        match result {
            Ok(()) => {
                claimed.insert(target.clone());
                report.produced.push(NormalizedImage {
                    source: asset.path,
                    path: target,
                });
            }
            Err(e) => {
                error!("Error converting {}: {}", name, e);
                report.failures.push((asset.path, e));
            }
        }
    }

    Ok(report)
}

/// Decode, encode as JPEG, then read the result back
fn convert_raw(source: &Path, target: &Path, decoder: &dyn RawDecoder) -> Result<()> {
    let frame = decoder.decode(source)?;
    let (width, height) = (frame.width, frame.height);
    let image = to_rgb_image(frame, target)?;

    write_or_remove(target, || {
        write_jpeg(&image, target)?;
        verify_image(target, width, height)
    })
}

/// Run `write`; when it fails, whatever it left at `target` is deleted
fn write_or_remove<F>(target: &Path, write: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    write().inspect_err(|_| {
        let _ = fs::remove_file(target);
    })
}

/// Lay the frame out as the encoder's RGB buffer
fn to_rgb_image(frame: RgbFrame, target: &Path) -> Result<RgbImage> {
    let RgbFrame {
        width,
        height,
        pixels,
    } = frame;
    RgbImage::from_raw(width, height, pixels).ok_or_else(|| DatasetError::Encode {
        path: target.to_path_buf(),
        reason: format!("pixel buffer does not match {}x{}", width, height),
    })
}

fn write_jpeg(image: &RgbImage, target: &Path) -> Result<()> {
    let encode_error = |reason: String| DatasetError::Encode {
        path: target.to_path_buf(),
        reason,
    };

    let file = File::create(target).map_err(|e| DatasetError::io(target, e))?;
    let mut writer = BufWriter::new(file);

    let encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
    image
        .write_with_encoder(encoder)
        .map_err(|e| encode_error(e.to_string()))?;
    writer.flush().map_err(|e| DatasetError::io(target, e))
}

/// Re-open a written image and check its dimensions
pub fn verify_image(path: &Path, width: u32, height: u32) -> Result<()> {
    let verify_error = |reason: String| DatasetError::VerifyFailed {
        path: path.to_path_buf(),
        reason,
    };

    let written = image::open(path).map_err(|e| verify_error(e.to_string()))?;
    if written.width() != width || written.height() != height {
        return Err(verify_error(format!(
            "expected {}x{}, read {}x{}",
            width,
            height,
            written.width(),
            written.height()
        )));
    }
    Ok(())
}

/// Byte copy with metadata; copying a file onto itself is a no-op
fn copy_standard(source: &Path, target: &Path) -> Result<()> {
    if is_same_file(source, target) {
        return Ok(());
    }
    copy_with_metadata(source, target)
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::decode::RawloaderDecoder;
    use tempfile::TempDir;

    /// Returns a fixed gradient for any path
    struct GradientDecoder;

    impl RawDecoder for GradientDecoder {
        fn decode(&self, _path: &Path) -> Result<RgbFrame> {
            let (width, height) = (16u32, 8u32);
            let pixels = (0..width * height)
                .flat_map(|i| [(i % 256) as u8, 128, 255 - (i % 256) as u8])
                .collect();
            Ok(RgbFrame {
                width,
                height,
                pixels,
            })
        }
    }

    /// Claims a size that does not match its pixels
    struct LyingDecoder;

    impl RawDecoder for LyingDecoder {
        fn decode(&self, _path: &Path) -> Result<RgbFrame> {
            Ok(RgbFrame {
                width: 10,
                height: 10,
                pixels: vec![0; 3],
            })
        }
    }

    fn produced(report: &NormalizeReport) -> Vec<PathBuf> {
        report.produced.iter().map(|image| image.path.clone()).collect()
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn dry_run_reports_conversion_without_writing() {
        let input = TempDir::new().unwrap();
        fs::write(input.path().join("photo.cr2"), b"raw bytes").unwrap();
        let output = input.path().join("out");

        let report =
            normalize_folder_blocking(input.path(), &output, &RawloaderDecoder, true).unwrap();

        assert_eq!(produced(&report), vec![output.join("photo.jpg")]);
        assert!(report.failures.is_empty());
        assert!(!output.exists());
        assert!(!input.path().join("photo.jpg").exists());
    }

    #[test]
    fn converts_raw_and_copies_standard_images() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        fs::write(input.path().join("shot.CR2"), b"raw bytes").unwrap();
        fs::write(input.path().join("b.png"), b"png bytes").unwrap();
        fs::write(input.path().join("notes.txt"), b"ignored").unwrap();
        fs::write(input.path().join("clip.mov"), b"ignored").unwrap();

        let report =
            normalize_folder_blocking(input.path(), output.path(), &GradientDecoder, false)
                .unwrap();

        assert!(report.failures.is_empty());
        assert_eq!(
            produced(&report),
            vec![output.path().join("b.png"), output.path().join("shot.jpg")]
        );
        assert_eq!(report.produced[1].source, input.path().join("shot.CR2"));
        assert_eq!(names(output.path()), ["b.png", "shot.jpg"]);
        assert_eq!(fs::read(output.path().join("b.png")).unwrap(), b"png bytes");

        let jpeg = image::open(output.path().join("shot.jpg")).unwrap();
        assert_eq!((jpeg.width(), jpeg.height()), (16, 8));
    }

    #[test]
    fn undecodable_raw_is_reported_and_skipped() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        fs::write(input.path().join("broken.cr2"), b"not a raw file").unwrap();
        fs::write(input.path().join("ok.jpg"), b"jpeg bytes").unwrap();

        let report =
            normalize_folder_blocking(input.path(), output.path(), &RawloaderDecoder, false)
                .unwrap();

        assert_eq!(produced(&report), vec![output.path().join("ok.jpg")]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, input.path().join("broken.cr2"));
        assert!(matches!(report.failures[0].1, DatasetError::Decode { .. }));
        assert_eq!(names(output.path()), ["ok.jpg"]);
    }

    #[test]
    fn mismatched_frame_is_an_encode_error() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        fs::write(input.path().join("a.cr2"), b"raw").unwrap();

        let report =
            normalize_folder_blocking(input.path(), output.path(), &LyingDecoder, false).unwrap();

        assert!(report.produced.is_empty());
        assert!(matches!(report.failures[0].1, DatasetError::Encode { .. }));
        assert!(names(output.path()).is_empty());
    }

    #[test]
    fn unreadable_output_fails_verification() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.jpg");
        fs::write(&path, b"not really a jpeg").unwrap();

        assert!(matches!(
            verify_image(&path, 1, 1),
            Err(DatasetError::VerifyFailed { .. })
        ));
    }

    #[test]
    fn copying_into_the_same_folder_keeps_files_intact() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.jpg"), b"jpeg bytes").unwrap();

        let report =
            normalize_folder_blocking(dir.path(), dir.path(), &GradientDecoder, false).unwrap();

        assert_eq!(produced(&report), vec![dir.path().join("a.jpg")]);
        assert_eq!(fs::read(dir.path().join("a.jpg")).unwrap(), b"jpeg bytes");
    }

    #[tokio::test]
    async fn async_wrapper_runs_the_blocking_pass() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        fs::write(input.path().join("x.cr2"), b"raw").unwrap();

        let report = normalize_folder(
            input.path().to_path_buf(),
            output.path().to_path_buf(),
            Arc::new(GradientDecoder),
            false,
        )
        .await
        .unwrap();

        assert_eq!(produced(&report), vec![output.path().join("x.jpg")]);
    }

    #[test]
    fn raw_and_jpeg_with_one_stem_keep_the_conversion() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        fs::write(input.path().join("x.cr2"), b"raw").unwrap();
        fs::write(input.path().join("x.jpg"), b"jpeg bytes").unwrap();

        let planned =
            normalize_folder_blocking(input.path(), output.path(), &GradientDecoder, true)
                .unwrap();
        let report =
            normalize_folder_blocking(input.path(), output.path(), &GradientDecoder, false)
                .unwrap();

        // The dry run plans exactly what the live run produces
        assert_eq!(produced(&planned), produced(&report));
        assert_eq!(produced(&report), vec![output.path().join("x.jpg")]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, input.path().join("x.jpg"));
        assert!(matches!(report.failures[0].1, DatasetError::TargetExists(_)));

        let jpeg = image::open(output.path().join("x.jpg")).unwrap();
        assert_eq!((jpeg.width(), jpeg.height()), (16, 8));
    }

    #[test]
    fn recognized_selects_by_source_extension() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        fs::write(input.path().join("photo.cr2"), b"raw").unwrap();
        fs::write(input.path().join("other.jpg"), b"jpeg bytes").unwrap();

        let report =
            normalize_folder_blocking(input.path(), output.path(), &GradientDecoder, false)
                .unwrap();

        let raw_only = ImageExtensions::parse(".cr2").unwrap();
        assert_eq!(
            report.recognized(&raw_only),
            vec![output.path().join("photo.jpg")]
        );
        let jpeg_only = ImageExtensions::parse(".jpg").unwrap();
        assert_eq!(
            report.recognized(&jpeg_only),
            vec![output.path().join("other.jpg")]
        );
    }

    #[test]
    fn failed_write_removes_the_partial_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("shot.jpg");

        let result = write_or_remove(&target, || {
            fs::write(&target, b"\xFF\xD8 truncated").unwrap();
            Err(DatasetError::io(&target, std::io::Error::other("disk full")))
        });

        assert!(matches!(result, Err(DatasetError::Io { .. })));
        assert!(!target.exists());
    }

    #[test]
    fn successful_write_is_kept() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("shot.jpg");

        write_or_remove(&target, || {
            fs::write(&target, b"complete").unwrap();
            Ok(())
        })
        .unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"complete");
    }
}
