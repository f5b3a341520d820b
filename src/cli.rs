/// Command line surface

use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};

use crate::config::{
    CaptionConfig, ImageExtensions, Settings, SortOrder, DEFAULT_IMAGE_FORMATS,
};
use crate::error::Result;

/// Process images: rename or create a LoRA dataset with captions.
#[derive(Debug, Parser)]
#[command(name = "lora-prep", version, about)]
pub struct Cli {
    /// Path to the input folder containing images
    #[arg(long, default_value = "input")]
    pub input_folder: PathBuf,

    /// Path to the output folder for the dataset
    #[arg(long, default_value = "output")]
    pub output_folder: PathBuf,

    /// Prefix for output file names
    #[arg(long, default_value = "xxx_")]
    pub prefix: String,

    /// Only rename images without generating captions
    #[arg(long)]
    pub rename_only: bool,

    /// Starting number for renaming
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    pub start: i64,

    /// Renaming order (ascending or descending)
    #[arg(long, value_enum, default_value_t = OrderArg::Asc)]
    pub order: OrderArg,

    /// Comma-separated list of image formats to process
    #[arg(long, default_value = DEFAULT_IMAGE_FORMATS)]
    pub image_formats: String,

    /// Perform a dry run without actually renaming files or generating captions
    #[arg(long)]
    pub dry_run: bool,

    /// Overwrite existing output files without asking
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// JSON file with captioning settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Captioning endpoint (Ollama /api/generate)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Vision model used for captions
    #[arg(long)]
    pub model: Option<String>,

    /// Token prepended to every caption
    #[arg(long)]
    pub trigger: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderArg {
    Asc,
    Desc,
}

impl From<OrderArg> for SortOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Asc => SortOrder::Ascending,
            OrderArg::Desc => SortOrder::Descending,
        }
    }
}

impl Cli {
    /// Per-run settings with the folders resolved to absolute paths
    pub fn settings(&self) -> Result<Settings> {
        Ok(Settings {
            input_dir: absolute(&self.input_folder),
            output_dir: absolute(&self.output_folder),
            prefix: self.prefix.clone(),
            start: self.start,
            order: self.order.into(),
            image_extensions: ImageExtensions::parse(&self.image_formats)?,
            rename_only: self.rename_only,
            dry_run: self.dry_run,
            assume_yes: self.yes,
        })
    }

    /// Caption settings: defaults, then the config file, then flags
    pub fn caption_config(&self) -> Result<CaptionConfig> {
        let mut config = CaptionConfig::load(self.config.as_deref())?;
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(trigger) = &self.trigger {
            config.trigger = trigger.clone();
        }
        Ok(config)
    }
}

/// Absolute form of `path` without requiring it to exist
fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
