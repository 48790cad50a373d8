//! Input discovery, validation and output naming.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ResizeError, Result};
use crate::processor::is_supported_format;

pub const DEFAULT_SUFFIX: &str = "_resized";
pub const DEFAULT_OUTPUT_FOLDER: &str = "resized_images";

const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Supported images directly inside `dir` (or below it when `recursive`), sorted.
pub fn collect_images(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_into(dir, recursive, &mut files)?;
    files.sort();
    Ok(files)
}

// Symlinked directories are not descended into, so link cycles cannot recurse.
fn collect_into(dir: &Path, recursive: bool, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| ResizeError::io(dir, e))?;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                warn!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };

        let path = entry.path();
        if file_type.is_dir() {
            if recursive {
                collect_into(&path, recursive, files)?;
            }
        } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
            if is_supported_format(&path) {
                files.push(path);
            }
        } else if file_type.is_symlink() {
            debug!("Not following link {}", path.display());
        }
    }
    Ok(())
}

/// Expands directories into their images and drops duplicate paths,
/// keeping the order in which paths were first given.
pub fn expand_inputs(inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for input in inputs {
        let found = if input.is_dir() {
            let images = collect_images(input, recursive)?;
            debug!("Found {} images in {}", images.len(), input.display());
            images
        } else {
            vec![input.clone()]
        };

        for path in found {
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }

    Ok(files)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileValidation {
    pub valid_files: Vec<PathBuf>,
    pub invalid_files: Vec<PathBuf>,
    pub total_count: usize,
    pub valid_count: usize,
    pub invalid_count: usize,
    pub total_size_mb: f64,
}

pub fn validate_files(paths: &[PathBuf]) -> FileValidation {
    let mut validation = FileValidation {
        total_count: paths.len(),
        ..Default::default()
    };
    let mut total_bytes = 0u64;

    for path in paths {
        match fs::metadata(path) {
            Ok(meta) if meta.is_file() => {
                total_bytes += meta.len();
                validation.valid_files.push(path.clone());
            }
            _ => validation.invalid_files.push(path.clone()),
        }
    }

    validation.valid_count = validation.valid_files.len();
    validation.invalid_count = validation.invalid_files.len();
    validation.total_size_mb = total_bytes as f64 / (1024.0 * 1024.0);
    validation
}

impl fmt::Display for FileValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total_count == 0 {
            return write!(f, "No files selected");
        }
        writeln!(f, "Total files: {}", self.total_count)?;
        writeln!(f, "Valid files: {}", self.valid_count)?;
        writeln!(f, "Invalid files: {}", self.invalid_count)?;
        write!(f, "Total size: {:.2} MB", self.total_size_mb)
    }
}

pub fn create_output_directory(base: &Path, folder: &str) -> Result<PathBuf> {
    let dir = base.join(folder);
    fs::create_dir_all(&dir).map_err(|e| ResizeError::io(&dir, e))?;
    Ok(dir)
}

/// Hands out output paths for a batch. A path is never returned twice, and
/// unless overwriting is allowed it never points at an existing file.
#[derive(Debug)]
pub struct OutputPlanner {
    output_dir: PathBuf,
    suffix: String,
    overwrite: bool,
    reserved: HashSet<PathBuf>,
}

impl OutputPlanner {
    pub fn new(output_dir: impl Into<PathBuf>, suffix: impl Into<String>, overwrite: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            suffix: suffix.into(),
            overwrite,
            reserved: HashSet::new(),
        }
    }

    pub fn plan(&mut self, input: &Path) -> Result<PathBuf> {
        for counter in 0..=MAX_NAME_ATTEMPTS {
            let path = self.candidate(input, counter);
            if !self.reserved.contains(&path) && (self.overwrite || !path.exists()) {
                self.reserved.insert(path.clone());
                return Ok(path);
            }
        }

        Err(ResizeError::NameExhausted(input.to_path_buf()))
    }

    fn candidate(&self, input: &Path, counter: u32) -> PathBuf {
        let mut name = input
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_else(|| OsString::from("output"));
        name.push(&self.suffix);
        if counter > 0 {
            name.push(format!("_{counter}"));
        }
        if let Some(ext) = input.extension() {
            name.push(".");
            name.push(ext);
        }
        self.output_dir.join(name)
    }
}
