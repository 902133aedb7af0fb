//! File watching and change orchestration.
//!
//! ```text
//! notify → event (debounce) → watcher (batching, source split)
//!        → classifier → dev / test_runner (decisions)
//! ```

pub mod classifier;
pub mod dev;
pub mod event;
pub mod test_runner;
pub mod watcher;

pub use classifier::{FileClassification, FileClassifier};
pub use dev::{DevOptions, DevSession, SessionExit};
pub use event::{WatchEvent, WatchEventKind};
pub use test_runner::{TestOptions, TestSession};
pub use watcher::WatchSession;
