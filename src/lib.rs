/// lora-prep: rename image/caption pairs or build a captioned LoRA dataset
///
/// - `dataset` - listing, numbering, renaming and caption generation
/// - `raw` - RAW decoding and the JPEG working folder
/// - `caption` - the captioning backend

pub mod caption;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod raw;
