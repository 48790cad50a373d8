//! Command-line interface definitions using clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::AppConfig;
use crate::processor::{Filter, ResizeMode};

/// Image Resizer - batch resize images to a target size
#[derive(Parser, Debug)]
#[command(name = "image_resizer")]
#[command(version)]
#[command(about = "Batch resize images to a target size", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resize image files and every supported image inside the given folders
    Resize(ResizeArgs),

    /// Show dimensions, format, color type and size of images
    Info {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Check which inputs exist and how much data they hold
    Scan {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Descend into sub-folders
        #[arg(long, short = 'r')]
        recursive: bool,
    },

    /// Write the default configuration file
    GenerateConfig {
        /// Output path (default: stdout)
        output_path: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default)]
pub struct ResizeArgs {
    /// Image files or folders
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Target width in pixels
    #[arg(long, short = 'W')]
    pub width: Option<u32>,

    /// Target height in pixels
    #[arg(long, short = 'H')]
    pub height: Option<u32>,

    /// How to reach the target size
    #[arg(long, short = 'm', value_enum)]
    pub mode: Option<ResizeMode>,

    /// JPEG quality, 1-100
    #[arg(long, short = 'q', value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,

    /// Resampling filter
    #[arg(long, value_enum)]
    pub filter: Option<Filter>,

    /// Output folder (default: ./resized_images)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Appended to each output file name
    #[arg(long)]
    pub suffix: Option<String>,

    /// Replace existing output files instead of numbering new ones
    #[arg(long)]
    pub overwrite: bool,

    /// Number of worker threads
    #[arg(long, short = 'j')]
    pub workers: Option<usize>,

    /// Descend into sub-folders
    #[arg(long, short = 'r')]
    pub recursive: bool,

    /// Skip the remaining files after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Write a JSON report of the batch to this path
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl ResizeArgs {
    /// Command-line flags win over the configuration file.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(width) = self.width {
            config.resize.width = Some(width);
        }
        if let Some(height) = self.height {
            config.resize.height = Some(height);
        }
        if let Some(mode) = self.mode {
            config.resize.mode = mode;
        }
        if let Some(quality) = self.quality {
            config.resize.quality = quality;
        }
        if let Some(filter) = self.filter {
            config.resize.filter = filter;
        }
        if let Some(output) = &self.output {
            config.output.dir = Some(output.clone());
        }
        if let Some(suffix) = &self.suffix {
            config.output.suffix = suffix.clone();
        }
        if let Some(workers) = self.workers {
            config.batch.workers = Some(workers);
        }
        config.output.overwrite |= self.overwrite;
        config.batch.recursive |= self.recursive;
        config.batch.fail_fast |= self.fail_fast;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    #[test]
    fn resize_flags_parse() {
        let cli = parse(&[
            "image_resizer",
            "resize",
            "a.jpg",
            "photos",
            "-W",
            "800",
            "-H",
            "600",
            "-m",
            "crop",
            "-q",
            "70",
            "--filter",
            "catmull-rom",
            "-j",
            "2",
            "--overwrite",
        ]);
        let Commands::Resize(args) = cli.command else {
            panic!("expected resize");
        };
        assert_eq!(args.inputs, vec![PathBuf::from("a.jpg"), PathBuf::from("photos")]);
        assert_eq!(args.width, Some(800));
        assert_eq!(args.height, Some(600));
        assert_eq!(args.mode, Some(ResizeMode::Crop));
        assert_eq!(args.quality, Some(70));
        assert_eq!(args.filter, Some(Filter::CatmullRom));
        assert_eq!(args.workers, Some(2));
        assert!(args.overwrite);
    }

    #[test]
    fn quality_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["image_resizer", "resize", "a.jpg", "-q", "0"]).is_err());
        assert!(Cli::try_parse_from(["image_resizer", "resize", "a.jpg", "-q", "101"]).is_err());
    }

    #[test]
    fn resize_needs_inputs() {
        assert!(Cli::try_parse_from(["image_resizer", "resize", "-W", "10"]).is_err());
    }

    #[test]
    fn global_config_flag() {
        let cli = parse(&["image_resizer", "scan", "dir", "-c", "custom.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Commands::Scan { recursive: false, .. }));
    }

    #[test]
    fn flags_override_config() {
        let mut config = AppConfig::default();
        config.resize.width = Some(100);
        config.resize.height = Some(100);
        config.batch.recursive = true;

        let args = ResizeArgs {
            inputs: vec![PathBuf::from("x")],
            width: Some(640),
            mode: Some(ResizeMode::Stretch),
            suffix: Some("_small".to_string()),
            output: Some(PathBuf::from("out")),
            ..Default::default()
        };
        args.apply(&mut config);

        assert_eq!(config.resize.width, Some(640));
        assert_eq!(config.resize.height, Some(100));
        assert_eq!(config.resize.mode, ResizeMode::Stretch);
        assert_eq!(config.output.suffix, "_small");
        assert_eq!(config.output.dir, Some(PathBuf::from("out")));
        // unset boolean flags leave the file's value alone
        assert!(config.batch.recursive);
    }
}
