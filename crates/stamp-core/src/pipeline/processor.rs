//! Batch orchestration: fans watermarking out across a bounded worker pool.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::RgbaImage;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::cancel::CancelToken;
use super::discovery::FileDiscovery;
use super::validate::Validator;
use crate::config::Config;
use crate::engine::{resize, ImageSource, WatermarkEngine};
use crate::error::{PipelineError, PipelineResult, Result};
use crate::exif::{ExifExtractor, ExifFields};
use crate::types::{BatchOutcome, BatchProcessConfig, BatchProcessingResult, OutputFormat, ProcessingResult};
use crate::watermark::{build_watermarks, Watermark};

/// Rough per-image cost used by [`BatchProcessor::estimate_processing_time`].
const BASE_SECS_PER_IMAGE: f64 = 0.5;
const SECS_PER_WATERMARK: f64 = 0.1;

/// Lifecycle of the most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl BatchState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            2 => Self::Completed,
            3 => Self::Cancelled,
            _ => Self::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Completed => 2,
            Self::Cancelled => 3,
        }
    }
}

/// Applies a [`BatchProcessConfig`] to many files concurrently.
///
/// Each file is processed independently: a failure becomes a failed
/// [`ProcessingResult`] and never stops its siblings. Results are recorded in
/// completion order and `on_progress` fires once per recorded result.
pub struct BatchProcessor {
    engine: WatermarkEngine,
    validator: Validator,
    discovery: FileDiscovery,
    max_workers: usize,
    cancel: CancelToken,
    state: AtomicU8,
}

/// Everything a worker needs, shared read-only across tasks.
struct Job {
    engine: WatermarkEngine,
    validator: Validator,
    watermarks: Vec<Box<dyn Watermark>>,
    config: BatchProcessConfig,
    output_dir: PathBuf,
}

impl BatchProcessor {
    pub fn new(config: &Config) -> Self {
        Self::with_engine(config, WatermarkEngine::new(config))
    }

    /// Processor reusing an existing engine (and its font cache).
    pub fn with_engine(config: &Config, engine: WatermarkEngine) -> Self {
        Self {
            engine,
            validator: Validator::new(config.limits.clone()),
            discovery: FileDiscovery::new(config.processing.clone()),
            max_workers: config.processing.max_workers.max(1),
            cancel: CancelToken::new(),
            state: AtomicU8::new(BatchState::Idle.as_u8()),
        }
    }

    pub fn engine(&self) -> &WatermarkEngine {
        &self.engine
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn state(&self) -> BatchState {
        BatchState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: BatchState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    /// Token that cancels the current run from another task.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Watermark `inputs` into `output_dir`.
    ///
    /// The config is validated first; an invalid config fails the whole call
    /// before any file is touched. Inputs with unsupported extensions are
    /// dropped and not counted.
    pub async fn process_batch<F>(
        &self,
        inputs: &[PathBuf],
        config: &BatchProcessConfig,
        output_dir: &Path,
        mut on_progress: F,
    ) -> Result<BatchProcessingResult>
    where
        F: FnMut(usize, usize, &str),
    {
        config.validate()?;

        let files: Vec<PathBuf> = inputs
            .iter()
            .filter(|path| self.discovery.is_supported(path))
            .cloned()
            .collect();
        let total = files.len();
        if total < inputs.len() {
            tracing::debug!("Skipping {} input(s) with unsupported extensions", inputs.len() - total);
        }

        std::fs::create_dir_all(output_dir).map_err(|e| PipelineError::io(output_dir, e))?;

        self.cancel.reset();
        self.set_state(BatchState::Running);
        let start = Instant::now();
        tracing::info!(
            total,
            workers = self.max_workers,
            watermarks = config.watermark_count(),
            "Starting batch"
        );

        let job = Arc::new(Job {
            engine: self.engine.clone(),
            validator: self.validator.clone(),
            watermarks: build_watermarks(config),
            config: config.clone(),
            output_dir: output_dir.to_path_buf(),
        });
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks = JoinSet::new();

        for path in files {
            let job = job.clone();
            let semaphore = semaphore.clone();
            let cancel = self.cancel.clone();

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok()?;
                if cancel.is_cancelled() {
                    return None;
                }
                let name = file_name(&path);
                match tokio::task::spawn_blocking(move || job.process_file(&path)).await {
                    Ok(result) => Some(result),
                    Err(e) => {
                        tracing::error!("Worker for {name} panicked: {e}");
                        Some(ProcessingResult::failed(name, format!("worker panicked: {e}"), 0.0))
                    }
                }
            });
        }

        let mut batch = BatchProcessingResult::new(total);
        let mut cancelled = false;

        while let Some(joined) = tasks.join_next().await {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let result = match joined {
                Ok(Some(result)) => result,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!("Batch task failed: {e}");
                    continue;
                }
            };
            batch.push(result);
            let completed = batch.results.len();
            if let Some(last) = batch.results.last() {
                on_progress(completed, total, &last.input_file);
            }
        }

        if cancelled {
            // Files already inside a codec finish; queued ones see the flag and skip.
            while tasks.join_next().await.is_some() {}
        }

        batch.total_time_ms = millis(start.elapsed());
        batch.outcome = if cancelled {
            BatchOutcome::Cancelled
        } else {
            BatchOutcome::Completed
        };
        self.set_state(if cancelled {
            BatchState::Cancelled
        } else {
            BatchState::Completed
        });

        tracing::info!(
            successful = batch.successful,
            failed = batch.failed,
            elapsed_ms = batch.total_time_ms as u64,
            "Batch {}",
            if cancelled { "cancelled" } else { "completed" }
        );

        Ok(batch)
    }

    /// Discover supported images under `folder` and process them.
    pub async fn process_folder<F>(
        &self,
        folder: &Path,
        config: &BatchProcessConfig,
        output_dir: &Path,
        recursive: bool,
        on_progress: F,
    ) -> Result<BatchProcessingResult>
    where
        F: FnMut(usize, usize, &str),
    {
        if !folder.exists() {
            return Err(PipelineError::FileNotFound(folder.to_path_buf()).into());
        }
        let inputs: Vec<PathBuf> = self
            .discovery
            .discover(folder, recursive)
            .into_iter()
            .map(|f| f.path)
            .collect();
        tracing::debug!("Found {} image(s) in {:?}", inputs.len(), folder);
        self.process_batch(&inputs, config, output_dir, on_progress).await
    }

    /// Rough wall-clock estimate for `file_count` images.
    pub fn estimate_processing_time(&self, file_count: usize, config: &BatchProcessConfig) -> Duration {
        if file_count == 0 {
            return Duration::ZERO;
        }
        let per_image = BASE_SECS_PER_IMAGE + SECS_PER_WATERMARK * config.watermark_count() as f64;
        let lanes = file_count.min(self.max_workers).max(1);
        Duration::from_secs_f64(file_count as f64 * per_image / lanes as f64)
    }
}

impl Job {
    fn process_file(&self, path: &Path) -> ProcessingResult {
        let start = Instant::now();
        let name = file_name(path);

        match self.watermark_file(path) {
            Ok((output_file, original_size, output_size)) => {
                let elapsed = millis(start.elapsed());
                tracing::debug!("Watermarked {} in {:.1}ms", name, elapsed);
                ProcessingResult {
                    input_file: name,
                    output_file: Some(output_file),
                    success: true,
                    error: None,
                    processing_time_ms: elapsed,
                    original_size: Some(original_size),
                    output_size: Some(output_size),
                }
            }
            Err(e) => {
                tracing::error!("Failed: {:?} - {}", path, e);
                ProcessingResult::failed(name, e, millis(start.elapsed()))
            }
        }
    }

    /// Load, watermark, resize and save one file.
    fn watermark_file(&self, path: &Path) -> PipelineResult<(String, (u32, u32), (u32, u32))> {
        self.validator.validate(path)?;
        let bytes = std::fs::read(path).map_err(|e| PipelineError::io(path, e))?;

        let mut image = self.engine.decode(&bytes, path)?;
        let original_size = image.dimensions();
        tracing::trace!("  Decoded {:?} ({}x{})", path, original_size.0, original_size.1);

        let exif = self.exif_for(path, &bytes, &image);
        for watermark in &self.watermarks {
            watermark.apply_to(&self.engine, &mut image, &exif)?;
            tracing::trace!("  Applied {} watermark", watermark.kind());
        }

        if let Some(target) = &self.config.resize {
            image = resize(image, target.width, target.height, target.maintain_aspect_ratio);
        }
        let output_size = image.dimensions();

        let format = self.config.output_format;
        let output_file = output_filename(path, &self.config.prefix, &self.config.suffix, format);
        let raw_exif = if self.config.preserve_exif {
            ExifExtractor::raw_exif(&bytes)
        } else {
            None
        };
        self.engine.save(
            &image,
            &self.output_dir.join(&output_file),
            format,
            self.config.output_quality,
            raw_exif.as_deref(),
        )?;

        Ok((output_file, original_size, output_size))
    }

    /// EXIF fields for placeholders. Extraction problems never fail the file.
    fn exif_for(&self, path: &Path, bytes: &[u8], image: &RgbaImage) -> ExifFields {
        let mut fields = match ExifExtractor::extract(ImageSource::Bytes(bytes), false) {
            Ok(fields) => fields,
            Err(e) => {
                tracing::warn!("EXIF extraction failed for {:?}: {}", path, e);
                ExifFields {
                    width: image.width(),
                    height: image.height(),
                    ..ExifFields::default()
                }
            }
        };
        fields.filename = file_name(path);
        fields
    }
}

/// `{prefix}{stem}{suffix}{ext}` for an input path.
pub fn output_filename(input: &Path, prefix: &str, suffix: &str, format: OutputFormat) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    format!("{prefix}{stem}{suffix}{}", format.extension())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TextWatermarkConfig;
    use image::Rgba;

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbaImage::from_pixel(width, height, Rgba([30, 90, 150, 255]))
            .save(path)
            .unwrap();
    }

    fn text_config() -> BatchProcessConfig {
        BatchProcessConfig {
            text_watermarks: vec![TextWatermarkConfig::new("sample")],
            output_format: OutputFormat::Png,
            ..BatchProcessConfig::default()
        }
    }

    #[test]
    fn test_output_filename() {
        let path = Path::new("/photos/IMG_0001.JPG");
        assert_eq!(
            output_filename(path, "wm_", "_final", OutputFormat::Webp),
            "wm_IMG_0001_final.webp"
        );
        assert_eq!(
            output_filename(path, "", "_watermarked", OutputFormat::Jpeg),
            "IMG_0001_watermarked.jpg"
        );
    }

    #[test]
    fn test_state_roundtrip() {
        for state in [
            BatchState::Idle,
            BatchState::Running,
            BatchState::Completed,
            BatchState::Cancelled,
        ] {
            assert_eq!(BatchState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn test_estimate_processing_time() {
        let mut config = Config::default();
        config.processing.max_workers = 4;
        let processor = BatchProcessor::new(&config);
        let batch = text_config();

        assert_eq!(processor.estimate_processing_time(0, &batch), Duration::ZERO);
        // 8 files * 0.6s / 4 lanes
        let estimate = processor.estimate_processing_time(8, &batch);
        assert!((estimate.as_secs_f64() - 1.2).abs() < 1e-9);
        // Fewer files than workers: one lane per file
        let estimate = processor.estimate_processing_time(2, &batch);
        assert!((estimate.as_secs_f64() - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_process_batch_writes_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.png");
        write_png(&input, 120, 80);
        let out = dir.path().join("out");

        let processor = BatchProcessor::new(&Config::default());
        assert_eq!(processor.state(), BatchState::Idle);

        let result = processor
            .process_batch(&[input], &text_config(), &out, |_, _, _| {})
            .await
            .unwrap();

        assert_eq!(result.successful, 1);
        assert_eq!(processor.state(), BatchState::Completed);
        let record = &result.results[0];
        assert_eq!(record.input_file, "photo.png");
        assert_eq!(record.output_file.as_deref(), Some("photo_watermarked.png"));
        assert_eq!(record.original_size, Some((120, 80)));
        assert!(out.join("photo_watermarked.png").exists());
    }

    #[tokio::test]
    async fn test_batch_preserves_exif() {
        use crate::exif::{fixtures, ExifExtractor};

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("camera.jpg");
        std::fs::write(&input, fixtures::camera_jpeg()).unwrap();
        let processor = BatchProcessor::new(&Config::default());

        for format in [OutputFormat::Jpeg, OutputFormat::Png] {
            let out = dir.path().join(format!("out{}", format.extension()));
            let config = BatchProcessConfig {
                output_format: format,
                ..text_config()
            };
            let result = processor
                .process_batch(std::slice::from_ref(&input), &config, &out, |_, _, _| {})
                .await
                .unwrap();
            assert_eq!(result.successful, 1);

            let written = out.join(result.results[0].output_file.as_deref().unwrap());
            let fields = ExifExtractor::extract(ImageSource::Path(&written), false).unwrap();
            assert_eq!(fields.camera_make.as_deref(), Some("Canon"));
            assert_eq!(fields.date.as_deref(), Some("2024-06-01"));
        }

        let config = BatchProcessConfig {
            preserve_exif: false,
            ..text_config()
        };
        let out = dir.path().join("stripped");
        let result = processor
            .process_batch(&[input], &config, &out, |_, _, _| {})
            .await
            .unwrap();
        let written = out.join(result.results[0].output_file.as_deref().unwrap());
        let bytes = std::fs::read(written).unwrap();
        assert!(ExifExtractor::raw_exif(&bytes).is_none());
    }

    #[tokio::test]
    async fn test_unsupported_extensions_are_not_counted() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.png");
        write_png(&input, 40, 40);
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "hi").unwrap();

        let processor = BatchProcessor::new(&Config::default());
        let result = processor
            .process_batch(&[input, notes], &text_config(), &dir.path().join("out"), |_, _, _| {})
            .await
            .unwrap();
        assert_eq!(result.total_files, 1);
        assert_eq!(result.successful, 1);
    }

    #[tokio::test]
    async fn test_resize_is_applied_after_watermarks() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("wide.png");
        write_png(&input, 800, 600);

        let config = BatchProcessConfig {
            resize: Some(crate::types::ResizeConfig {
                width: Some(400),
                height: None,
                maintain_aspect_ratio: true,
            }),
            ..text_config()
        };
        let processor = BatchProcessor::new(&Config::default());
        let result = processor
            .process_batch(&[input], &config, &dir.path().join("out"), |_, _, _| {})
            .await
            .unwrap();
        assert_eq!(result.results[0].output_size, Some((400, 300)));
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected_before_processing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let mut config = text_config();
        config.text_watermarks[0].opacity = 1.5;

        let processor = BatchProcessor::new(&Config::default());
        let err = processor
            .process_batch(&[dir.path().join("a.png")], &config, &out, |_, _, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::StampError::Config(_)));
        assert!(!out.exists());
        assert_eq!(processor.state(), BatchState::Idle);
    }

    #[tokio::test]
    async fn test_process_folder_missing() {
        let processor = BatchProcessor::new(&Config::default());
        let err = processor
            .process_folder(
                Path::new("/nonexistent/folder"),
                &text_config(),
                Path::new("/tmp/unused"),
                false,
                |_, _, _| {},
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::StampError::Pipeline(PipelineError::FileNotFound(_))
        ));
    }
}
