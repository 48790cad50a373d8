//! Core image operations: probing, loading, resizing and saving a single image.

use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::{self, FilterType};
use image::metadata::Orientation;
use image::{
    ColorType, DynamicImage, GenericImageView, ImageDecoder, ImageFormat, ImageReader, Rgb,
    RgbImage,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ResizeError, Result};

pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tiff", "webp"];

pub const DEFAULT_QUALITY: u8 = 85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeMode {
    /// Resize exactly to the target size, ignoring aspect ratio
    Stretch,
    /// Shrink to fit inside the target and pad with white
    #[default]
    KeepRatio,
    /// Fill the target and cut off whatever overflows, centered
    Crop,
}

impl std::fmt::Display for ResizeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResizeMode::Stretch => write!(f, "stretch"),
            ResizeMode::KeepRatio => write!(f, "keep-ratio"),
            ResizeMode::Crop => write!(f, "crop"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Filter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    #[default]
    Lanczos3,
}

impl From<Filter> for FilterType {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Nearest => FilterType::Nearest,
            Filter::Triangle => FilterType::Triangle,
            Filter::CatmullRom => FilterType::CatmullRom,
            Filter::Gaussian => FilterType::Gaussian,
            Filter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeOptions {
    pub width: u32,
    pub height: u32,
    pub mode: ResizeMode,
    pub quality: u8,
    pub filter: Filter,
}

impl ResizeOptions {
    pub fn new(width: u32, height: u32, mode: ResizeMode) -> Self {
        Self {
            width,
            height,
            mode,
            quality: DEFAULT_QUALITY,
            filter: Filter::default(),
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ResizeError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if !(1..=100).contains(&self.quality) {
            return Err(ResizeError::InvalidQuality(self.quality));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub color: String,
    pub size_mb: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessedFile {
    pub input: PathBuf,
    pub output: PathBuf,
    pub input_dims: (u32, u32),
    pub output_dims: (u32, u32),
    pub duration_secs: f32,
}

pub fn is_supported_format(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn open_reader(path: &Path) -> Result<ImageReader<std::io::BufReader<File>>> {
    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| ResizeError::io(path, e))
}

fn decode_error(path: &Path) -> impl Fn(image::ImageError) -> ResizeError + '_ {
    move |source| ResizeError::Decode {
        path: path.to_path_buf(),
        source,
    }
}

/// Reads dimensions, format and color type from the image header without
/// decoding pixel data.
pub fn image_info(path: &Path) -> Result<ImageInfo> {
    let size = fs::metadata(path)
        .map_err(|e| ResizeError::io(path, e))?
        .len();
    let reader = open_reader(path)?;
    let format = reader
        .format()
        .map(|f| format!("{f:?}").to_uppercase())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let decoder = reader.into_decoder().map_err(decode_error(path))?;
    let (width, height) = decoder.dimensions();

    Ok(ImageInfo {
        width,
        height,
        format,
        color: format!("{:?}", decoder.color_type()),
        size_mb: size as f64 / (1024.0 * 1024.0),
    })
}

/// Decodes an image, applies its EXIF orientation and drops any alpha channel.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let mut decoder = open_reader(path)?
        .into_decoder()
        .map_err(decode_error(path))?;
    // Broken EXIF blocks are common; keep the pixels as stored.
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder).map_err(decode_error(path))?;
    img.apply_orientation(orientation);

    if img.color().has_alpha() {
        img = DynamicImage::ImageRgb8(img.to_rgb8());
    }
    Ok(img)
}

/// Largest size with the image's aspect ratio that fits inside the box.
/// Images that already fit are returned unchanged.
pub fn fit_within(width: u32, height: u32, box_w: u32, box_h: u32) -> (u32, u32) {
    if width <= box_w && height <= box_h {
        return (width, height);
    }

    let aspect = width as f64 / height as f64;
    let (bw, bh) = (box_w as f64, box_h as f64);

    if bw / bh >= aspect {
        let w = round_aspect(bh * aspect, |n| (aspect - n / bh).abs());
        (w, box_h)
    } else {
        let h = round_aspect(bw / aspect, |n| {
            if n == 0.0 {
                0.0
            } else {
                (aspect - bw / n).abs()
            }
        });
        (box_w, h)
    }
}

// Picks floor or ceil, whichever keeps the aspect ratio closer; floor wins ties.
fn round_aspect(value: f64, key: impl Fn(f64) -> f64) -> u32 {
    let (lo, hi) = (value.floor(), value.ceil());
    let best = if key(hi) < key(lo) { hi } else { lo };
    (best as u32).max(1)
}

pub fn resize_image(img: DynamicImage, options: &ResizeOptions) -> DynamicImage {
    let (target_w, target_h) = (options.width, options.height);
    let filter = FilterType::from(options.filter);

    match options.mode {
        ResizeMode::Stretch => img.resize_exact(target_w, target_h, filter),
        ResizeMode::KeepRatio => {
            let (w, h) = fit_within(img.width(), img.height(), target_w, target_h);
            let fitted = if (w, h) == img.dimensions() {
                img
            } else {
                img.resize_exact(w, h, filter)
            };

            let mut canvas = RgbImage::from_pixel(target_w, target_h, Rgb([255, 255, 255]));
            let x = (target_w - w) / 2;
            let y = (target_h - h) / 2;
            imageops::replace(&mut canvas, &fitted.to_rgb8(), x as i64, y as i64);
            DynamicImage::ImageRgb8(canvas)
        }
        ResizeMode::Crop => img.resize_to_fill(target_w, target_h, filter),
    }
}

// Converts to 8-bit RGB when the encoder cannot take the current pixel layout.
fn encodable(img: &DynamicImage, format: ImageFormat) -> Cow<'_, DynamicImage> {
    let color = img.color();
    let accepted = match format {
        ImageFormat::Jpeg => matches!(color, ColorType::L8 | ColorType::Rgb8),
        ImageFormat::WebP => matches!(color, ColorType::Rgb8 | ColorType::Rgba8),
        ImageFormat::Bmp => matches!(
            color,
            ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8
        ),
        ImageFormat::Tiff => matches!(
            color,
            ColorType::L8
                | ColorType::L16
                | ColorType::Rgb8
                | ColorType::Rgb16
                | ColorType::Rgba8
                | ColorType::Rgba16
        ),
        _ => true,
    };

    if accepted {
        Cow::Borrowed(img)
    } else {
        Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8()))
    }
}

/// Writes the image in the format implied by the path's extension.
/// `quality` applies to JPEG; PNG is written with maximum compression.
pub fn save_image(img: &DynamicImage, path: &Path, quality: u8) -> Result<()> {
    let encode_error = |source| ResizeError::Encode {
        path: path.to_path_buf(),
        source,
    };

    let format = ImageFormat::from_path(path).map_err(encode_error)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ResizeError::io(parent, e))?;
    }

    let file = File::create(path).map_err(|e| ResizeError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let img = encodable(img, format);

    match format {
        ImageFormat::Jpeg => img
            .write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality))
            .map_err(encode_error)?,
        ImageFormat::Png => img
            .write_with_encoder(PngEncoder::new_with_quality(
                &mut writer,
                CompressionType::Best,
                PngFilter::Adaptive,
            ))
            .map_err(encode_error)?,
        ImageFormat::WebP => img
            .write_with_encoder(WebPEncoder::new_lossless(&mut writer))
            .map_err(encode_error)?,
        other => img.write_to(&mut writer, other).map_err(encode_error)?,
    }

    writer.flush().map_err(|e| ResizeError::io(path, e))
}

pub fn process_single_image(
    input: &Path,
    output: &Path,
    options: &ResizeOptions,
) -> Result<ProcessedFile> {
    let start = Instant::now();

    let img = load_image(input)?;
    let input_dims = img.dimensions();
    debug!(
        "Loaded {} ({}x{})",
        input.display(),
        input_dims.0,
        input_dims.1
    );

    let resized = resize_image(img, options);
    let output_dims = resized.dimensions();
    save_image(&resized, output, options.quality)?;

    let duration_secs = start.elapsed().as_secs_f32();
    debug!(
        "Saved {} ({}x{}) in {:.2}s",
        output.display(),
        output_dims.0,
        output_dims.1,
        duration_secs
    );

    Ok(ProcessedFile {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        input_dims,
        output_dims,
        duration_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, Rgba};
    use tempfile::tempdir;

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    fn noise(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let v = (x.wrapping_mul(31) ^ y.wrapping_mul(17)).wrapping_mul(2654435761);
            Rgb([(v >> 8) as u8, (v >> 16) as u8, (v >> 24) as u8])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn supported_format_is_case_insensitive() {
        assert!(is_supported_format(Path::new("photo.JPG")));
        assert!(is_supported_format(Path::new("dir/scan.tiff")));
        assert!(is_supported_format(Path::new("a.WebP")));
        assert!(!is_supported_format(Path::new("anim.gif")));
        assert!(!is_supported_format(Path::new("README")));
        assert!(!is_supported_format(Path::new("notes.txt")));
    }

    #[test]
    fn fit_within_leaves_small_images_alone() {
        assert_eq!(fit_within(50, 40, 100, 100), (50, 40));
        assert_eq!(fit_within(100, 100, 100, 100), (100, 100));
    }

    #[test]
    fn fit_within_scales_limiting_side() {
        assert_eq!(fit_within(400, 200, 100, 100), (100, 50));
        assert_eq!(fit_within(100, 400, 200, 200), (50, 200));
        // 12.5 rounds to whichever side keeps 8:1 closer
        assert_eq!(fit_within(400, 50, 100, 100), (100, 13));
    }

    #[test]
    fn fit_within_never_returns_zero() {
        assert_eq!(fit_within(10_000, 1, 100, 100), (100, 1));
    }

    #[test]
    fn stretch_hits_exact_size() {
        let options = ResizeOptions::new(64, 10, ResizeMode::Stretch);
        let out = resize_image(solid(300, 200, [10, 20, 30]), &options);
        assert_eq!(out.dimensions(), (64, 10));
    }

    #[test]
    fn crop_keeps_the_center() {
        // red | green | blue, the green band twice as wide as the others
        let bands = RgbImage::from_fn(400, 100, |x, _| match x {
            0..=99 => Rgb([255, 0, 0]),
            100..=299 => Rgb([0, 255, 0]),
            _ => Rgb([0, 0, 255]),
        });
        let options = ResizeOptions::new(100, 100, ResizeMode::Crop);
        let out = resize_image(DynamicImage::ImageRgb8(bands), &options);
        assert_eq!(out.dimensions(), (100, 100));

        let rgb = out.to_rgb8();
        for (x, y) in [(0, 0), (99, 0), (50, 50), (0, 99), (99, 99)] {
            let px = rgb.get_pixel(x, y).0;
            assert!(
                px[1] > 240 && px[0] < 15 && px[2] < 15,
                "({x}, {y}) should be green, got {px:?}"
            );
        }
    }

    #[test]
    fn keep_ratio_pads_with_white() {
        let options = ResizeOptions::new(100, 100, ResizeMode::KeepRatio);
        let out = resize_image(solid(400, 200, [255, 0, 0]), &options);
        assert_eq!(out.dimensions(), (100, 100));

        let rgb = out.to_rgb8();
        // 100x50 band centered vertically at y = 25..75
        assert_eq!(rgb.get_pixel(0, 0).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(99, 99).0, [255, 255, 255]);
        let center = rgb.get_pixel(50, 50).0;
        assert!(center[0] > 250 && center[1] < 5 && center[2] < 5);
    }

    #[test]
    fn keep_ratio_does_not_enlarge_small_images() {
        let options = ResizeOptions::new(100, 80, ResizeMode::KeepRatio);
        let out = resize_image(solid(20, 10, [0, 0, 0]), &options);
        let rgb = out.to_rgb8();
        assert_eq!(out.dimensions(), (100, 80));
        // source sits at (40, 35)..(60, 45)
        assert_eq!(rgb.get_pixel(40, 35).0, [0, 0, 0]);
        assert_eq!(rgb.get_pixel(59, 44).0, [0, 0, 0]);
        assert_eq!(rgb.get_pixel(39, 35).0, [255, 255, 255]);
        assert_eq!(rgb.get_pixel(60, 44).0, [255, 255, 255]);
    }

    #[test]
    fn keep_ratio_converts_grayscale_to_rgb() {
        let gray = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(30, 30, Luma([128u8])));
        let options = ResizeOptions::new(10, 10, ResizeMode::KeepRatio);
        assert_eq!(resize_image(gray, &options).color(), ColorType::Rgb8);
    }

    #[test]
    fn validate_rejects_bad_options() {
        assert!(ResizeOptions::new(0, 10, ResizeMode::Crop).validate().is_err());
        assert!(ResizeOptions::new(10, 0, ResizeMode::Crop).validate().is_err());
        assert!(ResizeOptions::new(10, 10, ResizeMode::Crop)
            .with_quality(0)
            .validate()
            .is_err());
        assert!(ResizeOptions::new(10, 10, ResizeMode::Crop)
            .with_quality(101)
            .validate()
            .is_err());
        assert!(ResizeOptions::new(10, 10, ResizeMode::Crop)
            .with_quality(100)
            .validate()
            .is_ok());
    }

    #[test]
    fn load_flattens_alpha() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("alpha.png");
        let rgba = ImageBuffer::from_pixel(8, 8, Rgba([10u8, 20, 30, 128]));
        DynamicImage::ImageRgba8(rgba).save(&path).unwrap();

        let img = load_image(&path).unwrap();
        assert_eq!(img.color(), ColorType::Rgb8);
        assert_eq!(img.to_rgb8().get_pixel(0, 0).0, [10, 20, 30]);
    }

    // Baseline JPEG with an APP1 segment spliced in right after SOI.
    fn jpeg_with_app1(img: &DynamicImage, app1_payload: &[u8]) -> Vec<u8> {
        let mut encoded = Vec::new();
        img.write_with_encoder(JpegEncoder::new_with_quality(&mut encoded, 95))
            .unwrap();
        assert_eq!(&encoded[..2], &[0xFF, 0xD8]);

        let len = u16::try_from(app1_payload.len() + 2).unwrap();
        let mut out = vec![0xFF, 0xD8, 0xFF, 0xE1];
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(app1_payload);
        out.extend_from_slice(&encoded[2..]);
        out
    }

    fn exif_orientation(value: u16) -> Vec<u8> {
        let mut exif = b"Exif\0\0".to_vec();
        // big-endian TIFF header, first IFD at offset 8
        exif.extend_from_slice(&[b'M', b'M', 0, 42, 0, 0, 0, 8]);
        // one entry: tag 0x0112 (Orientation), SHORT, count 1
        exif.extend_from_slice(&[0, 1, 0x01, 0x12, 0, 3, 0, 0, 0, 1]);
        exif.extend_from_slice(&value.to_be_bytes());
        exif.extend_from_slice(&[0, 0]);
        // no next IFD
        exif.extend_from_slice(&[0, 0, 0, 0]);
        exif
    }

    fn red_left_blue_right(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn load_applies_exif_rotation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rotated.jpg");
        // left half red, right half blue; orientation 6 turns it 90 degrees clockwise
        let src = red_left_blue_right(32, 16);
        fs::write(&path, jpeg_with_app1(&src, &exif_orientation(6))).unwrap();

        let img = load_image(&path).unwrap();
        assert_eq!(img.dimensions(), (16, 32));

        let rgb = img.to_rgb8();
        let top = rgb.get_pixel(8, 4).0;
        let bottom = rgb.get_pixel(8, 27).0;
        assert!(top[0] > 200 && top[2] < 60, "top should be red, got {top:?}");
        assert!(bottom[2] > 200 && bottom[0] < 60, "bottom should be blue, got {bottom:?}");
    }

    #[test]
    fn load_ignores_broken_exif() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken_exif.jpg");
        let mut payload = b"Exif\0\0".to_vec();
        payload.extend_from_slice(b"not a tiff header");
        fs::write(&path, jpeg_with_app1(&red_left_blue_right(32, 16), &payload)).unwrap();

        let mut decoder = ImageReader::open(&path)
            .unwrap()
            .with_guessed_format()
            .unwrap()
            .into_decoder()
            .unwrap();
        assert_eq!(
            decoder.orientation().unwrap_or(Orientation::NoTransforms),
            Orientation::NoTransforms
        );
        assert_eq!(load_image(&path).unwrap().dimensions(), (32, 16));
    }

    #[test]
    fn webp_output_is_lossless() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.webp");
        let img = noise(24, 18);

        save_image(&img, &path, 10).unwrap();
        let back = image::open(&path).unwrap();
        assert_eq!(back.dimensions(), (24, 18));
        assert_eq!(back.to_rgb8(), img.to_rgb8());
    }

    #[test]
    fn jpeg_quality_changes_file_size() {
        let dir = tempdir().unwrap();
        let low = dir.path().join("low.jpg");
        let high = dir.path().join("high.jpg");
        let img = noise(128, 128);

        save_image(&img, &low, 10).unwrap();
        save_image(&img, &high, 95).unwrap();

        let low_size = fs::metadata(&low).unwrap().len();
        let high_size = fs::metadata(&high).unwrap().len();
        assert!(low_size < high_size, "{low_size} >= {high_size}");
    }

    #[test]
    fn save_converts_rgba_for_jpeg_and_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.jpeg");
        let rgba = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(4, 4, Rgba([1u8, 2, 3, 4])));

        save_image(&rgba, &path, 90).unwrap();
        assert_eq!(image::open(&path).unwrap().dimensions(), (4, 4));
    }

    #[test]
    fn save_rejects_unknown_extension() {
        let dir = tempdir().unwrap();
        let err = save_image(&solid(2, 2, [0, 0, 0]), &dir.path().join("x.unknown"), 90)
            .unwrap_err();
        assert!(matches!(err, ResizeError::Encode { .. }));
    }

    #[test]
    fn image_info_reads_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("info.png");
        solid(33, 21, [1, 2, 3]).save(&path).unwrap();

        let info = image_info(&path).unwrap();
        assert_eq!((info.width, info.height), (33, 21));
        assert_eq!(info.format, "PNG");
        assert_eq!(info.color, "Rgb8");
        assert!(info.size_mb > 0.0);
    }

    #[test]
    fn process_single_image_reports_dimensions() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("in.bmp");
        let output = dir.path().join("out/in_resized.bmp");
        solid(120, 60, [9, 9, 9]).save(&input).unwrap();

        let options = ResizeOptions::new(30, 30, ResizeMode::Crop);
        let result = process_single_image(&input, &output, &options).unwrap();
        assert_eq!(result.input_dims, (120, 60));
        assert_eq!(result.output_dims, (30, 30));
        assert_eq!(image::open(&output).unwrap().dimensions(), (30, 30));
    }

    #[test]
    fn corrupt_input_is_a_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.png");
        fs::write(&path, b"definitely not a png").unwrap();

        let err = load_image(&path).unwrap_err();
        assert!(matches!(err, ResizeError::Decode { .. }), "{err:?}");
    }
}
