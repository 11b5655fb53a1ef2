//! Stamp Core - embeddable batch watermarking library.
//!
//! Stamp applies text and logo watermarks to batches of images, writing
//! watermarked copies to an output directory.
//!
//! # Architecture
//!
//! ```text
//! File → Validate → Decode (RGBA) → EXIF → Text overlays → Logo overlays → Resize → Encode
//! ```
//!
//! Files run concurrently on a bounded worker pool. A failing file becomes a
//! failed result and never aborts the batch.
//!
//! # Usage
//!
//! ```rust,ignore
//! use stamp_core::{BatchProcessConfig, Config, Stamp, TextWatermarkConfig};
//!
//! #[tokio::main]
//! async fn main() -> stamp_core::Result<()> {
//!     let stamp = Stamp::new(Config::load()?);
//!     let batch = BatchProcessConfig {
//!         text_watermarks: vec![TextWatermarkConfig::copyright("Jane Doe", None)],
//!         ..Default::default()
//!     };
//!
//!     let result = stamp
//!         .process_folder("./photos", &batch, "./output", |done, total, name| {
//!             println!("[{done}/{total}] {name}");
//!         })
//!         .await?;
//!     println!("{} of {} succeeded", result.successful, result.total_files);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod exif;
pub mod output;
pub mod pipeline;
pub mod profile;
pub mod types;
pub mod watermark;

pub use config::Config;
pub use engine::{FontCache, FontHandle, ImageSource, WatermarkEngine};
pub use error::{ConfigError, PipelineError, PipelineResult, Result, StampError};
pub use exif::{ExifExtractor, ExifFields, ExifRational};
pub use output::{OutputWriter, ReportFormat, ReportSummary};
pub use pipeline::{output_filename, BatchProcessor, BatchState, CancelToken, DiscoveredFile, FileDiscovery};
pub use profile::WatermarkProfile;
pub use types::{
    BatchOutcome, BatchProcessConfig, BatchProcessingResult, ImageWatermarkConfig, OutputFormat,
    ProcessingResult, ResizeConfig, Rgb, TextWatermarkConfig, WatermarkPosition,
};
pub use watermark::{LogoWatermark, TextWatermark, Watermark};

use std::path::{Path, PathBuf};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Entry point tying configuration to a batch processor.
pub struct Stamp {
    config: Config,
    processor: BatchProcessor,
}

impl Stamp {
    pub fn new(config: Config) -> Self {
        tracing::debug!("Initializing Stamp v{}", VERSION);
        let processor = BatchProcessor::new(&config);
        Self { config, processor }
    }

    /// Load the config file (or defaults) and build a processor from it.
    pub fn with_defaults() -> Result<Self> {
        Ok(Self::new(Config::load()?))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn processor(&self) -> &BatchProcessor {
        &self.processor
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.processor.cancel_token()
    }

    /// Watermark explicit input files.
    pub async fn process_files<F>(
        &self,
        inputs: &[PathBuf],
        batch: &BatchProcessConfig,
        output_dir: impl AsRef<Path>,
        on_progress: F,
    ) -> Result<BatchProcessingResult>
    where
        F: FnMut(usize, usize, &str),
    {
        self.processor
            .process_batch(inputs, batch, output_dir.as_ref(), on_progress)
            .await
    }

    /// Watermark every supported image in a folder, recursing when the
    /// `[processing] recursive` setting is on.
    pub async fn process_folder<F>(
        &self,
        folder: impl AsRef<Path>,
        batch: &BatchProcessConfig,
        output_dir: impl AsRef<Path>,
        on_progress: F,
    ) -> Result<BatchProcessingResult>
    where
        F: FnMut(usize, usize, &str),
    {
        self.processor
            .process_folder(
                folder.as_ref(),
                batch,
                output_dir.as_ref(),
                self.config.processing.recursive,
                on_progress,
            )
            .await
    }
}
