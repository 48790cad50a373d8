use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;

use image_resizer::cli::{Cli, Commands, ResizeArgs};
use image_resizer::config::AppConfig;
use image_resizer::files::{
    create_output_directory, expand_inputs, validate_files, DEFAULT_OUTPUT_FOLDER,
};
use image_resizer::logging::init_logging;
use image_resizer::processor::image_info;
use image_resizer::{run_batch, BatchJob, CancelToken, FileStatus};

// Failures listed in the end-of-batch summary
const SUMMARY_FAILURES: usize = 5;

const EXIT_FATAL: u8 = 1;
const EXIT_PARTIAL: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Commands::Resize(args) = &cli.command {
        args.apply(&mut config);
    }
    let _guard = init_logging(&config.logging)?;

    match cli.command {
        Commands::Resize(args) => resize(&config, &args),
        Commands::Info { files } => info(&files),
        Commands::Scan { inputs, recursive } => scan(&inputs, recursive || config.batch.recursive),
        Commands::GenerateConfig { output_path } => generate_config(output_path.as_deref()),
    }
}

fn resize(config: &AppConfig, args: &ResizeArgs) -> Result<ExitCode> {
    let options = config.resize.to_options()?;
    let workers = config.batch.worker_count()?;

    let files = expand_inputs(&args.inputs, config.batch.recursive)?;
    if files.is_empty() {
        warn!("No supported images found");
        println!("No supported images found");
        return Ok(ExitCode::from(EXIT_PARTIAL));
    }

    let output_dir = match &config.output.dir {
        Some(dir) => dir.clone(),
        None => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            create_output_directory(&cwd, DEFAULT_OUTPUT_FOLDER)?
        }
    };

    let job = BatchJob {
        files,
        output_dir,
        options,
        suffix: config.output.suffix.clone(),
        overwrite: config.output.overwrite,
        workers,
    };
    let cancel = CancelToken::new();
    let fail_fast = config.batch.fail_fast;

    println!(
        "Resizing {} file(s) to {}x{} ({}) -> {}",
        job.files.len(),
        options.width,
        options.height,
        options.mode,
        job.output_dir.display()
    );

    let report = run_batch(&job, &cancel, |event| {
        let mark = match event.status {
            FileStatus::Resized => "ok",
            FileStatus::Failed => "FAILED",
            FileStatus::Skipped => "skipped",
        };
        println!(
            "[{:>3.0}%] {}/{} {} {}",
            event.percent, event.completed, event.total, event.file_name, mark
        );
        if fail_fast && event.status == FileStatus::Failed {
            cancel.cancel();
        }
    })?;

    println!();
    for line in report.summary_lines(SUMMARY_FAILURES) {
        println!("{line}");
    }

    if let Some(path) = &args.report {
        report.write_json(path)?;
        println!("Report written to {}", path.display());
    }

    Ok(if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_PARTIAL)
    })
}

fn info(files: &[PathBuf]) -> Result<ExitCode> {
    let mut all_ok = true;

    for path in files {
        match image_info(path) {
            Ok(info) => println!(
                "{}: {}x{} {} {} {:.2} MB",
                path.display(),
                info.width,
                info.height,
                info.format,
                info.color,
                info.size_mb
            ),
            Err(e) => {
                all_ok = false;
                eprintln!("{}: {}", path.display(), e);
            }
        }
    }

    Ok(if all_ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_PARTIAL)
    })
}

fn scan(inputs: &[PathBuf], recursive: bool) -> Result<ExitCode> {
    let files = expand_inputs(inputs, recursive)?;
    let validation = validate_files(&files);

    println!("{validation}");
    for path in &validation.invalid_files {
        println!("  invalid: {}", path.display());
    }

    Ok(if validation.invalid_count == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_PARTIAL)
    })
}

fn generate_config(output_path: Option<&Path>) -> Result<ExitCode> {
    let text = AppConfig::template()?;
    match output_path {
        Some(path) => {
            fs::write(path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Configuration written to {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(ExitCode::SUCCESS)
}
