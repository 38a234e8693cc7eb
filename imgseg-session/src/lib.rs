//! Session layer for imgseg
//!
//! Holds the interactive state (image, mode, points, masks), dispatches
//! backend and local-decoder work, and routes exports to injected sinks.

pub mod completion;
pub mod notify;
pub mod path;
pub mod sink;
pub mod state;
pub mod store;
pub mod workspace;

pub use completion::{Completion, RemoteOutcome};
pub use notify::{Notification, NotificationQueue};
pub use path::{DispatchPath, PathState, PathTracker};
pub use sink::{ClipboardSink, FileSink, MemorySink, ResultSink};
pub use state::SessionState;
pub use store::MaskStore;
pub use workspace::{ExportSinks, Workspace, COPIED_MESSAGE};
