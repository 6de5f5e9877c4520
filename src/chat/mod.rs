//! Conversation orchestration — turn handling, session/thread lifecycle,
//! reply splitting, and attachments.

pub mod orchestrator;
pub mod splitter;
pub mod threads;
pub mod uploads;

pub use orchestrator::ChatOrchestrator;
pub use splitter::{SplitReply, split};
pub use threads::ThreadLifecycle;
pub use uploads::{Attachment, UploadStore};
