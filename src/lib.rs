//! Image to packed 1-bit bitmap converter.
//!
//! Turns a raster image (or a sprite sheet) into MSB-first monochrome
//! bitmaps and emits them as a C header with dimension constants.

pub mod frame;
pub mod header;
pub mod options;
pub mod pack;
pub mod threshold;

pub use frame::{Frame, SpriteGrid};
pub use header::ConversionArtifact;
pub use options::{ConvertOptions, DEFAULT_HEIGHT, DEFAULT_WIDTH};
pub use pack::PackedBitmap;
pub use threshold::{BinaryImage, ThresholdMode, ThresholdScope};

use image::DynamicImage;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BitspriteError {
    #[error("Input file not found: {}", path.display())]
    InputNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unsupported image format in {}: {source}", path.display())]
    UnsupportedFormat {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Invalid sprite grid: {0}")]
    InvalidGrid(String),
    #[error("Threshold must be \"auto\" or between 0 and 255, got {0}")]
    InvalidThreshold(String),
    #[error("Invalid size {width}x{height}: width and height must be at least 1")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("Invalid array name {0:?}: must be a C identifier")]
    InvalidName(String),
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BitspriteError>;

/// Opens and decodes an image file.
pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage> {
    let path = path.as_ref();
    let not_found = |source| BitspriteError::InputNotFound { path: path.to_path_buf(), source };

    let image = image::ImageReader::open(path)
        .map_err(not_found)?
        .with_guessed_format()
        .map_err(not_found)?
        .decode()
        .map_err(|source| BitspriteError::UnsupportedFormat { path: path.to_path_buf(), source })?;

    let known_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png") || e.eq_ignore_ascii_case("bmp"));
    if !known_extension {
        warn!("Input file doesn't have .png or .bmp extension");
    }

    info!(
        "Loaded image: {}x{} pixels, color type {:?}",
        image.width(),
        image.height(),
        image.color()
    );
    Ok(image)
}

/// Packs binarized frames, keeping their order.
pub fn pack_all(frames: &[BinaryImage]) -> Vec<PackedBitmap> {
    frames.par_iter().map(pack::pack).collect()
}

/// Runs the whole pipeline: grayscale, frame preparation, thresholding and
/// packing.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    options: ConvertOptions,
}

impl Converter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(options: ConvertOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.options.width = width;
        self.options.height = height;
        self
    }

    pub fn with_threshold(mut self, threshold: ThresholdMode) -> Self {
        self.options.threshold = threshold;
        self
    }

    pub fn with_threshold_scope(mut self, scope: ThresholdScope) -> Self {
        self.options.threshold_scope = scope;
        self
    }

    pub fn with_resize(mut self, enabled: bool) -> Self {
        self.options.resize = enabled;
        self
    }

    pub fn with_sprite_grid(mut self, grid: Option<SpriteGrid>) -> Self {
        self.options.sprite = grid;
        self
    }

    pub fn with_frame_size(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.options.frame_width = width;
        self.options.frame_height = height;
        self
    }

    /// Prepares and binarizes every frame, in frame-index order.
    pub fn binarize(&self, image: &DynamicImage) -> Result<Vec<BinaryImage>> {
        let options = &self.options;
        options.validate()?;

        let gray = frame::to_grayscale(image);
        let frames = frame::prepare(
            &gray,
            options.width,
            options.height,
            options.resize,
            options.sprite,
            (options.frame_width, options.frame_height),
        )?;
        info!(
            "Prepared {} frame(s) of {}x{}",
            frames.len(),
            frames[0].image.width(),
            frames[0].image.height()
        );

        // Sheets share one threshold taken before slicing unless scoped per frame.
        let mode = options.threshold;
        let shared = match (mode, options.sprite, options.threshold_scope) {
            (ThresholdMode::Auto, Some(_), ThresholdScope::PerFrame) => None,
            (_, Some(_), _) => Some(mode.resolve(&gray)),
            (_, None, _) => Some(mode.resolve(&frames[0].image)),
        };
        match (mode, shared) {
            (ThresholdMode::Fixed(level), _) => info!("Using custom threshold {level}"),
            (ThresholdMode::Auto, Some(level)) => info!("Calculated optimal threshold: {level}"),
            (ThresholdMode::Auto, None) => info!("Calculating threshold per frame"),
        }

        Ok(frames
            .par_iter()
            .map(|frame| {
                let level = shared.unwrap_or_else(|| mode.resolve(&frame.image));
                debug!("Frame {} binarized at threshold {level}", frame.index);
                threshold::apply_threshold(&frame.image, level)
            })
            .collect())
    }

    /// Packed bitmaps for every frame, in frame-index order.
    pub fn convert(&self, image: &DynamicImage) -> Result<Vec<PackedBitmap>> {
        let bitmaps = pack_all(&self.binarize(image)?);
        info!(
            "Generated {} bytes across {} frame(s)",
            bitmaps.iter().map(PackedBitmap::len).sum::<usize>(),
            bitmaps.len()
        );
        Ok(bitmaps)
    }

    /// Converts `image` into a ready-to-emit artifact named `base_name`.
    pub fn convert_artifact(
        &self,
        image: &DynamicImage,
        base_name: &str,
        source_name: &str,
    ) -> Result<ConversionArtifact> {
        let bitmaps = self.convert(image)?;
        ConversionArtifact::new(base_name, source_name, self.options.sprite, bitmaps)
    }
}
