//! Batch pipeline.
//!
//! - **validate**: pre-decode checks (existence, size limit, magic bytes)
//! - **discovery**: find image files in folders
//! - **cancel**: cooperative cancellation token
//! - **processor**: runs watermarking across a bounded worker pool

pub mod cancel;
pub mod discovery;
pub mod processor;
pub mod validate;

pub use cancel::CancelToken;
pub use discovery::{DiscoveredFile, FileDiscovery};
pub use processor::{output_filename, BatchProcessor, BatchState};
pub use validate::Validator;
