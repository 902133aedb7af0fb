//! Managed child-process machinery.
//!
//! - [`port`]: session port allocation
//! - [`message`]: structured IPC messages emitted by the child
//! - [`runner`]: raw spawn + stdio streaming
//! - [`managed`]: restart semantics on top of the runner

pub mod managed;
pub mod message;
pub mod port;
pub mod runner;

pub use managed::{ManagedEvent, ManagedProcess, ProcessState, RunMode};
pub use message::{HotReloadKind, ProcessMessage};
pub use port::PortAllocator;
pub use runner::{ChildEvent, ProcessRunner, SpawnSpec};
