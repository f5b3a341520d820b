/// RAW handling
///
/// - `decode` - RAW sensor data to an RGB frame (rawloader)
/// - `normalize` - fills a working folder with JPEG/PNG images

pub mod decode;
pub mod normalize;

pub use decode::{RawDecoder, RawloaderDecoder};
pub use normalize::normalize_folder;
