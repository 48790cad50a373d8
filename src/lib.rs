//! Batch image resizer.
//!
//! Loads images, resizes them to a target size (stretch, keep-ratio with white
//! padding, or center crop) on a worker pool, and writes the results next to
//! a per-batch report.

pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod files;
pub mod logging;
pub mod pool;
pub mod processor;
pub mod report;

pub use batch::{run_batch, BatchJob, CancelToken, FileStatus, ProgressEvent};
pub use error::{ResizeError, Result};
pub use processor::{Filter, ResizeMode, ResizeOptions};
pub use report::{BatchReport, FailedFile};
