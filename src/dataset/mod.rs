/// Dataset layout: listing, numbering, renaming and caption generation
///
/// - `asset` - flat directory listing and extension classification
/// - `sequence` - sequence numbers and `{prefix}_{NNNN}` names
/// - `rename` - positional image/caption pairing and in-place renames
/// - `materialize` - captioned dataset generation into an output folder
/// - `preflight` - overwrite confirmation before a live run

pub mod asset;
pub mod materialize;
pub mod preflight;
pub mod rename;
pub mod sequence;

pub use materialize::{DatasetMaterializer, NamingOptions};
pub use rename::plan_rename;
