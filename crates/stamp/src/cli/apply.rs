//! The `stamp apply` command: run a watermark batch with a progress bar.

use clap::Args;
use console::Style;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use stamp_core::{
    BatchOutcome, BatchProcessConfig, BatchProcessingResult, BatchProcessor, Config, FileDiscovery,
    OutputWriter, ReportFormat, WatermarkProfile,
};

use super::profile::resolve_profile_path;
use super::watermark_args::WatermarkArgs;

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Input images or folders
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Output directory (defaults to `[general] output_dir`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Start from a saved profile (name or path); flags add to it
    #[arg(long)]
    pub profile: Option<String>,

    /// Recurse into sub-folders
    #[arg(short, long)]
    pub recursive: bool,

    /// Number of parallel workers (defaults to `[processing] max_workers`)
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,

    /// Write a batch report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Report format: json or jsonl (defaults to `[output] format`)
    #[arg(long, value_parser = parse_report_format)]
    pub report_format: Option<ReportFormat>,

    /// Print what would be processed and an estimate, then exit
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub watermark: WatermarkArgs,
}

/// Execute the apply command.
pub async fn execute(args: ApplyArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(workers) = args.workers {
        config.processing.max_workers = workers.max(1);
    }
    let batch = build_batch_config(&args, &config)?;
    batch.validate()?;

    let inputs = collect_inputs(&args.inputs, &config, args.recursive || config.processing.recursive);
    if inputs.is_empty() {
        anyhow::bail!("No supported images found in the given inputs");
    }

    let output_dir = args.output.clone().unwrap_or_else(|| config.output_dir());
    let processor = BatchProcessor::new(&config);
    let estimate = processor.estimate_processing_time(inputs.len(), &batch);
    tracing::info!(
        "Watermarking {} image(s) into {:?} (estimated {:.1}s)",
        inputs.len(),
        output_dir,
        estimate.as_secs_f64()
    );

    if args.dry_run {
        for input in &inputs {
            println!("{}", input.display());
        }
        eprintln!(
            "{} image(s), {} watermark(s), estimated {:.1}s with {} worker(s)",
            inputs.len(),
            batch.watermark_count(),
            estimate.as_secs_f64(),
            processor.max_workers()
        );
        return Ok(());
    }

    // Ctrl-C cancels; files already being written still finish.
    let token = processor.cancel_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight files");
            token.cancel();
        }
    });

    let progress = create_progress_bar(inputs.len() as u64);
    let result = processor
        .process_batch(&inputs, &batch, &output_dir, |done, _total, name| {
            progress.set_position(done as u64);
            progress.set_message(name.to_string());
        })
        .await;
    ctrl_c.abort();
    progress.finish_and_clear();
    let result = result?;

    for failure in result.failures() {
        tracing::error!(
            "Failed: {} - {}",
            failure.input_file,
            failure.error.as_deref().unwrap_or("unknown error")
        );
    }

    if let Some(path) = &args.report {
        let format = args
            .report_format
            .or_else(|| ReportFormat::parse(&config.output.format))
            .unwrap_or(ReportFormat::Json);
        write_report(path, &result, format, config.output.pretty)?;
        tracing::info!("Report written to {:?}", path);
    }

    print_summary(&result, &output_dir);

    if result.outcome == BatchOutcome::Cancelled {
        anyhow::bail!("Batch cancelled after {} file(s)", result.results.len());
    }
    Ok(())
}

/// Profile settings (if any) plus command-line watermarks.
fn build_batch_config(args: &ApplyArgs, config: &Config) -> anyhow::Result<BatchProcessConfig> {
    let base = match &args.profile {
        Some(name) => {
            let path = resolve_profile_path(name, config);
            WatermarkProfile::load(&path)
                .map_err(|e| anyhow::anyhow!("Cannot load profile {:?}: {e}", path))?
                .config
        }
        None => BatchProcessConfig::default(),
    };
    let batch = args.watermark.merge_into(base);
    if batch.watermark_count() == 0 {
        anyhow::bail!("No watermark configured. Use --text, --copyright, --logo or --profile.");
    }
    Ok(batch)
}

/// Expand folders into their supported images; files pass through as given.
fn collect_inputs(inputs: &[PathBuf], config: &Config, recursive: bool) -> Vec<PathBuf> {
    let discovery = FileDiscovery::new(config.processing.clone());
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            files.extend(discovery.discover(input, recursive).into_iter().map(|f| f.path));
        } else {
            files.push(input.clone());
        }
    }
    files
}

fn write_report(
    path: &Path,
    result: &BatchProcessingResult,
    format: ReportFormat,
    pretty: bool,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = OutputWriter::new(BufWriter::new(file), format, pretty);
    writer.write_report(result)?;
    writer.flush()?;
    Ok(())
}

fn parse_report_format(s: &str) -> Result<ReportFormat, String> {
    ReportFormat::parse(s).ok_or_else(|| format!("unknown report format '{s}' (expected json or jsonl)"))
}

fn create_progress_bar(total: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
    ) {
        pb.set_style(style.progress_chars("##-"));
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("starting...");
    pb
}

fn print_summary(result: &BatchProcessingResult, output_dir: &Path) {
    let green = Style::new().for_stderr().green();
    let red = Style::new().for_stderr().red();
    let yellow = Style::new().for_stderr().yellow();
    let seconds = result.total_time_ms / 1000.0;
    let rate = if seconds > 0.0 {
        result.successful as f64 / seconds
    } else {
        0.0
    };

    eprintln!();
    eprintln!("  ====================================");
    eprintln!("               Summary");
    eprintln!("  ====================================");
    eprintln!("    Succeeded:    {}", green.apply_to(format!("{:>8}", result.successful)));
    if result.failed > 0 {
        eprintln!("    Failed:       {}", red.apply_to(format!("{:>8}", result.failed)));
    }
    let unprocessed = result.total_files.saturating_sub(result.results.len());
    if unprocessed > 0 {
        eprintln!("    Not run:      {}", yellow.apply_to(format!("{:>8}", unprocessed)));
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Total:        {:>8}", result.total_files);
    eprintln!("    Duration:     {:>7.1}s", seconds);
    eprintln!("    Rate:         {:>7.1} img/sec", rate);
    eprintln!("    Output:       {}", output_dir.display());
    eprintln!("  ====================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        apply: ApplyArgs,
    }

    fn parse(args: &[&str]) -> ApplyArgs {
        let mut argv = vec!["stamp"];
        argv.extend_from_slice(args);
        TestCli::parse_from(argv).apply
    }

    #[test]
    fn test_requires_a_watermark() {
        let args = parse(&["photo.jpg"]);
        assert!(build_batch_config(&args, &Config::default()).is_err());

        let args = parse(&["photo.jpg", "--text", "hi"]);
        let batch = build_batch_config(&args, &Config::default()).unwrap();
        assert_eq!(batch.text_watermarks.len(), 1);
    }

    #[test]
    fn test_profile_is_extended_by_flags() {
        let dir = tempfile::tempdir().unwrap();
        let profile_path = dir.path().join("proofs.json");
        let base = BatchProcessConfig {
            text_watermarks: vec![stamp_core::TextWatermarkConfig::new("PROOF")],
            ..BatchProcessConfig::default()
        };
        WatermarkProfile::new("proofs", base).save(&profile_path).unwrap();

        let args = parse(&[
            "photo.jpg",
            "--profile",
            profile_path.to_str().unwrap(),
            "--text",
            "extra",
        ]);
        let batch = build_batch_config(&args, &Config::default()).unwrap();
        let texts: Vec<_> = batch.text_watermarks.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["PROOF", "extra"]);
    }

    #[test]
    fn test_collect_inputs_expands_folders() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("b.txt"), b"x").unwrap();
        let loose = PathBuf::from("/elsewhere/c.png");

        let files = collect_inputs(
            &[dir.path().to_path_buf(), loose.clone()],
            &Config::default(),
            false,
        );
        assert_eq!(files, vec![dir.path().join("a.jpg"), loose]);
    }

    #[test]
    fn test_write_report_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/run.jsonl");
        let mut result = BatchProcessingResult::new(1);
        result.push(stamp_core::ProcessingResult::failed("a.jpg", "boom", 1.0));

        write_report(&path, &result, ReportFormat::JsonLines, true).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }
}
