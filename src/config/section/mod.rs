//! Configuration section definitions.

mod assets;
mod build;
mod manifest;
mod meta;
mod serve;

pub use assets::AssetsConfig;
pub use build::BuildConfig;
pub use manifest::ManifestConfig;
pub use meta::MetaFilePattern;
pub use serve::ServeConfig;
pub use tests::{TestSuite, TestsConfig};
