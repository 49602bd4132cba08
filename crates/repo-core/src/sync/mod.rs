//! Upload and download
//!
//! - **engine**: turns diff entries into writes on the destination
//! - **report**: the ordered events a sync produces

mod engine;
mod report;

pub use engine::{SyncEngine, SyncOptions};
pub use report::{SyncEvent, SyncReport};
