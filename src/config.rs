/// Run configuration
///
/// `Settings` holds the per-run options coming from the command line.
/// `CaptionConfig` holds the captioning backend settings, the system prompt
/// and the trigger token. It starts from built-in defaults, can be overlaid
/// by a JSON file, and finally by command line flags.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DatasetError, Result};

/// Default Ollama generate endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_MODEL: &str = "minicpm-v";
pub const DEFAULT_PROMPT: &str = "Give a concise caption of this image.";
pub const DEFAULT_TRIGGER: &str = "[trigger]";
pub const DEFAULT_IMAGE_FORMATS: &str = ".jpg,.png,.jpeg,.cr2";

/// Extension used for caption files (without the dot)
pub const CAPTION_EXTENSION: &str = "txt";

const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an AI assistant specialized in generating captions for images of people. These captions will be used to train an AI text-to-image model. Your task is to create detailed, natural language descriptions of the images while following these guidelines:

Use natural, conversational language in your descriptions.
Focus on describing:
The person's pose and body language
Facial expressions and emotions
The direction they're facing
The background setting and lighting
Any actions the person is performing

Avoid describing the following attributes of the person, as these should be learned by the model:
Hairstyle and color
Clothing and accessories
Specific physical features (e.g., eye color, skin tone)
Do not use known concepts, tokens, or celebrity names in your descriptions.
If the image contains a celebrity, use a generic description (e.g., "a woman" instead of "Jennifer Lawrence").
Provide context and atmosphere in your descriptions, but keep the focus on the person.
Use varied and rich vocabulary to describe emotions, actions, and settings.
Keep your descriptions between 2-4 sentences long.

Example caption:
'A person gazes upward with a look of wonder, their eyes wide and lips slightly parted as if captivated by something above. Warm, glowing lights in the background add a soft, ambient glow to the scene, highlighting their features. The subject stands in a relaxed pose, hands resting at their sides.'
Remember, your goal is to create captions that will help the AI model learn to generate diverse and accurate images of people without fixating on specific attributes or identities."#;

/// Numbering direction for renamed files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Set of recognized image extensions
///
/// Stored lowercased and without the leading dot, so `".JPG"` and `"jpg"`
/// on the command line mean the same thing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageExtensions(Vec<String>);

impl ImageExtensions {
    /// Parse a comma-separated list such as `.jpg,.png,.jpeg,.cr2`
    pub fn parse(list: &str) -> Result<Self> {
        let extensions: Vec<String> = list
            .split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        if extensions.is_empty() {
            return Err(DatasetError::Config(format!(
                "no image extensions in '{}'",
                list
            )));
        }

        Ok(ImageExtensions(extensions))
    }

    /// Case-insensitive membership test for an extension without the dot
    pub fn contains(&self, extension: &str) -> bool {
        let ext = extension.to_lowercase();
        self.0.iter().any(|known| *known == ext)
    }
}

impl Default for ImageExtensions {
    fn default() -> Self {
        // The default list is known to be valid
        ImageExtensions(
            DEFAULT_IMAGE_FORMATS
                .split(',')
                .map(|ext| ext.trim_start_matches('.').to_string())
                .collect(),
        )
    }
}

/// Immutable per-run settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub prefix: String,
    pub start: i64,
    pub order: SortOrder,
    pub image_extensions: ImageExtensions,
    pub rename_only: bool,
    pub dry_run: bool,
    /// Answer the overwrite gate with "yes" without prompting
    pub assume_yes: bool,
}

/// Captioning backend settings
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CaptionConfig {
    pub endpoint: String,
    pub model: String,
    pub prompt: String,
    pub system_prompt: String,
    /// Token prepended to every caption written to disk
    pub trigger: String,
    pub temperature: f32,
    pub num_predict: u32,
    /// Request timeout; `None` keeps the transport default (no timeout)
    pub timeout_secs: Option<u64>,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        CaptionConfig {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            trigger: DEFAULT_TRIGGER.to_string(),
            temperature: 0.0,
            num_predict: 160,
            timeout_secs: None,
        }
    }
}

impl CaptionConfig {
    /// Load the caption config from an explicit file, or from the user config
    /// directory if a file exists there, falling back to defaults.
    ///
    /// An explicit path that does not exist is an error; a missing file in
    /// the user config directory is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Read a JSON config file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| DatasetError::io(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| DatasetError::Config(format!("{}: {}", path.display(), e)))
    }

    /// `<config_dir>/lora-prep/config.json`
    /// - Linux: ~/.config/lora-prep/config.json
    /// - macOS: ~/Library/Application Support/lora-prep/config.json
    /// - Windows: %APPDATA%\lora-prep\config.json
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("lora-prep");
        path.push("config.json");
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_extension_list_case_insensitively() {
        let exts = ImageExtensions::parse(".JPG, png,.jpeg").unwrap();
        assert!(exts.contains("jpg"));
        assert!(exts.contains("PNG"));
        assert!(exts.contains("jpeg"));
        assert!(!exts.contains("cr2"));
    }

    #[test]
    fn rejects_empty_extension_list() {
        assert!(matches!(
            ImageExtensions::parse(" , "),
            Err(DatasetError::Config(_))
        ));
    }

    #[test]
    fn default_extensions_include_raw() {
        let exts = ImageExtensions::default();
        assert_eq!(exts, ImageExtensions::parse(".jpg,.png,.jpeg,.cr2").unwrap());
        assert!(exts.contains("cr2"));
    }

    #[test]
    fn partial_config_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "model": "llava", "trigger": "ohwx" }"#).unwrap();

        let config = CaptionConfig::from_file(&path).unwrap();
        assert_eq!(config.model, "llava");
        assert_eq!(config.trigger, "ohwx");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.num_predict, 160);
        assert_eq!(config.timeout_secs, None);
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = CaptionConfig::load(Some(&dir.path().join("nope.json")));
        assert!(matches!(result, Err(DatasetError::Io { .. })));
    }

    #[test]
    fn malformed_config_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            CaptionConfig::from_file(&path),
            Err(DatasetError::Config(_))
        ));
    }
}
