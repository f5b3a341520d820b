/// Image captioning
///
/// The materializer only needs "image bytes in, caption out". `Captioner`
/// is that seam; `OllamaCaptioner` is the HTTP implementation used by the
/// command line tool and tests plug in scripted captioners.

pub mod ollama;

pub use ollama::OllamaCaptioner;

use std::future::Future;
use thiserror::Error;

/// Why a caption could not be produced
///
/// Callers treat every variant the same way ("caption unavailable"); the
/// variants only make the log line more useful.
#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend answered with status {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("backend returned an empty caption")]
    Empty,

    #[error("could not read image: {0}")]
    Io(#[from] std::io::Error),
}

/// Something that turns image bytes into a caption
pub trait Captioner {
    fn caption(&self, image: &[u8]) -> impl Future<Output = Result<String, CaptionError>> + Send;
}
