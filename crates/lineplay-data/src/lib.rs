//! Record sources and playback configuration for Lineplay.
//!
//! - [`feed`]: line-oriented event feed reader (header line plus one record
//!   per line)
//! - [`loader`]: data-file format detection and deserialization
//! - [`presets`]: named playback presets and their resolution into run
//!   parameters

pub mod feed;
pub mod loader;
pub mod presets;

pub use feed::{FeedError, FeedReader};
pub use loader::DataLoadError;
pub use presets::{Preset, PresetError, PresetFile};
