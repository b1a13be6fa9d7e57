pub(crate) mod notification;
pub(crate) mod normalize;
pub(crate) mod presentation;
pub(crate) mod severity;
pub(crate) mod sync;
pub(crate) mod types;

pub use presentation::ReportFormatter;
pub use sync::{run_sync, SyncError};
