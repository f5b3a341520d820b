/// lora-prep command line entry point

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

use lora_prep::caption::OllamaCaptioner;
use lora_prep::cli::Cli;
use lora_prep::config::{CaptionConfig, Settings};
use lora_prep::dataset::asset::{list_assets, paths_of_kind, AssetKind};
use lora_prep::dataset::materialize::DatasetReport;
use lora_prep::dataset::rename::{plan_pairs, stage_captions, RenameReport};
use lora_prep::dataset::{plan_rename, preflight, DatasetMaterializer, NamingOptions};
use lora_prep::error::DatasetError;
use lora_prep::logging;
use lora_prep::raw::{normalize_folder, RawDecoder, RawloaderDecoder};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(logging::DEFAULT_LOG_LEVEL) {
        eprintln!("{:#}", e);
    }

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let settings = cli.settings().context("invalid arguments")?;

    info!("Processing images...");
    info!("Input folder: {}", settings.input_dir.display());
    info!("Output folder: {}", settings.output_dir.display());
    info!("File prefix: {}", settings.prefix);
    info!("Dry run: {}", if settings.dry_run { "Yes" } else { "No" });

    // Nothing is touched before the user agreed to overwrite
    if !settings.dry_run {
        match preflight::check_overwrite(
            &settings.output_dir,
            &settings.prefix,
            &settings.image_extensions,
            settings.assume_yes,
        ) {
            Ok(()) => {}
            Err(DatasetError::Cancelled) => {
                info!("Operation cancelled.");
                return Ok(());
            }
            Err(e) => return Err(e).context("could not inspect the output folder"),
        }
    }

    let decoder: Arc<dyn RawDecoder> = Arc::new(RawloaderDecoder);

    if settings.rename_only {
        info!("Renaming images only...");
        rename_only(&settings, decoder).await?;
    } else {
        info!("Creating LoRA dataset with captions...");
        let caption_config = cli
            .caption_config()
            .context("could not load caption settings")?;
        create_dataset(&settings, caption_config, decoder).await?;
    }

    info!("Operation completed.");
    Ok(())
}

/// Renumber the pairs of the output folder, staging the input there first
async fn rename_only(settings: &Settings, decoder: Arc<dyn RawDecoder>) -> Result<RenameReport> {
    let plan = if same_folder(&settings.input_dir, &settings.output_dir) {
        plan_rename(
            &settings.output_dir,
            &settings.prefix,
            settings.start,
            settings.order,
            &settings.image_extensions,
        )
    } else {
        let (images, captions) = stage_pairs(settings, decoder).await?;
        plan_pairs(
            &settings.output_dir,
            images,
            captions,
            &settings.prefix,
            settings.start,
            settings.order,
        )
    }
    .context("could not plan renames")?;

    if plan.is_empty() {
        info!("No image/caption pairs found in the output folder.");
    }

    let report = plan.execute(settings.dry_run);
    for failure in &report.failures {
        warn!("Pair {:04} was not renamed: {}", failure.number, failure.error);
    }
    Ok(report)
}

/// Normalize the input images into the output folder and copy the captions
///
/// Returns the images and captions the output folder holds afterwards, or
/// would hold in a dry run, including what was already there.
async fn stage_pairs(
    settings: &Settings,
    decoder: Arc<dyn RawDecoder>,
) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let output = &settings.output_dir;
    let existing = if output.is_dir() {
        list_assets(output, &settings.image_extensions)
            .context("could not read the output folder")?
    } else {
        Vec::new()
    };
    let mut images = paths_of_kind(&existing, AssetKind::Image);
    let mut captions = paths_of_kind(&existing, AssetKind::Caption);

    let report = normalize_folder(
        settings.input_dir.clone(),
        output.clone(),
        decoder,
        settings.dry_run,
    )
    .await
    .context("could not prepare the output folder")?;
    log_normalize_failures(report.failures.len());
    images.extend(report.recognized(&settings.image_extensions));

    let staged = stage_captions(
        &settings.input_dir,
        output,
        &settings.image_extensions,
        settings.dry_run,
    )
    .context("could not copy the captions")?;
    captions.extend(staged);

    for paths in [&mut images, &mut captions] {
        paths.sort();
        paths.dedup();
    }
    Ok((images, captions))
}

/// Normalize into a scratch folder and caption everything found there
async fn create_dataset(
    settings: &Settings,
    caption_config: CaptionConfig,
    decoder: Arc<dyn RawDecoder>,
) -> Result<DatasetReport> {
    let naming = NamingOptions {
        prefix: &settings.prefix,
        start: settings.start,
        order: settings.order,
    };
    let trigger = caption_config.trigger.clone();
    let captioner =
        OllamaCaptioner::new(caption_config).context("could not set up the caption client")?;
    let materializer = DatasetMaterializer::new(captioner, trigger);

    if settings.dry_run {
        // Plan from the names the normalizer would produce
        let report = normalize_folder(
            settings.input_dir.clone(),
            settings.input_dir.clone(),
            decoder,
            true,
        )
        .await
        .context("could not read the input folder")?;
        log_normalize_failures(report.failures.len());

        let images = report.recognized(&settings.image_extensions);
        return materializer
            .materialize(images, &settings.output_dir, &naming, true)
            .await
            .context("could not plan the dataset");
    }

    let working = tempfile::Builder::new()
        .prefix("lora-prep-")
        .tempdir()
        .context("could not create a working folder")?;

    let report = normalize_folder(
        settings.input_dir.clone(),
        working.path().to_path_buf(),
        decoder,
        false,
    )
    .await
    .context("could not prepare the working folder")?;
    log_normalize_failures(report.failures.len());

    // Selected by source format, so a listed .cr2 brings its JPEG along
    let images = report.recognized(&settings.image_extensions);
    let report = materializer
        .materialize(images, &settings.output_dir, &naming, false)
        .await
        .context("could not build the dataset")?;

    if !report.skipped.is_empty() {
        warn!("{} image(s) skipped", report.skipped.len());
    }
    Ok(report)
}

fn log_normalize_failures(count: usize) {
    if count > 0 {
        warn!("{} file(s) could not be converted or copied", count);
    }
}

fn same_folder(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
