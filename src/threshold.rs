//! Threshold selection and binarization.
//!
//! The automatic threshold is Otsu's method: the cut that maximizes the
//! between-class variance of the 256-bin intensity histogram.

use crate::{BitspriteError, Result};
use image::GrayImage;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Threshold used when the histogram has no valid two-class split.
pub const FALLBACK_THRESHOLD: u8 = 128;

/// How the cut value is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "ThresholdSetting", into = "ThresholdSetting")]
pub enum ThresholdMode {
    /// Otsu's method over the image histogram
    #[default]
    Auto,
    /// Caller-supplied cut, used verbatim for every frame
    Fixed(u8),
}

/// Which pixels feed the automatic threshold of a sliced sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdScope {
    /// One threshold from the whole sheet before slicing
    #[default]
    Sheet,
    /// An independent threshold per prepared frame
    PerFrame,
}

impl ThresholdMode {
    /// Validates a raw level against [0, 255].
    pub fn fixed(level: i64) -> Result<Self> {
        u8::try_from(level)
            .map(Self::Fixed)
            .map_err(|_| BitspriteError::InvalidThreshold(level.to_string()))
    }

    /// Reads a config value: `"auto"`, a numeric string, or an integer.
    pub fn from_json_value(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::String(text) => text.parse(),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(level) => Self::fixed(level),
                None => Err(BitspriteError::InvalidThreshold(number.to_string())),
            },
            other => Err(BitspriteError::InvalidThreshold(other.to_string())),
        }
    }

    /// Resolves the mode to a concrete cut for `image`.
    pub fn resolve(&self, image: &GrayImage) -> u8 {
        match *self {
            Self::Fixed(level) => level,
            Self::Auto => compute_threshold(image),
        }
    }
}

impl FromStr for ThresholdMode {
    type Err = BitspriteError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        let level: i64 = s
            .parse()
            .map_err(|_| BitspriteError::InvalidThreshold(s.to_string()))?;
        Self::fixed(level)
    }
}

impl fmt::Display for ThresholdMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Fixed(level) => write!(f, "{level}"),
        }
    }
}

// Config files spell the threshold as `"auto"` or a bare integer.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ThresholdSetting {
    Level(i64),
    Keyword(String),
}

impl TryFrom<ThresholdSetting> for ThresholdMode {
    type Error = BitspriteError;

    fn try_from(setting: ThresholdSetting) -> Result<Self> {
        match setting {
            ThresholdSetting::Level(level) => Self::fixed(level),
            ThresholdSetting::Keyword(word) => word.parse(),
        }
    }
}

impl From<ThresholdMode> for ThresholdSetting {
    fn from(mode: ThresholdMode) -> Self {
        match mode {
            ThresholdMode::Auto => Self::Keyword("auto".to_string()),
            ThresholdMode::Fixed(level) => Self::Level(i64::from(level)),
        }
    }
}

/// Otsu threshold of `image`, or [`FALLBACK_THRESHOLD`] when every candidate
/// split leaves one class empty (e.g. a single-intensity image).
pub fn compute_threshold(image: &GrayImage) -> u8 {
    let mut counts = [0u64; 256];
    for pixel in image.pixels() {
        counts[pixel.0[0] as usize] += 1;
    }

    let total: u64 = counts.iter().sum();
    if total == 0 {
        warn!("Empty image, using fallback threshold {FALLBACK_THRESHOLD}");
        return FALLBACK_THRESHOLD;
    }
    let hist: Vec<f64> = counts.iter().map(|&c| c as f64 / total as f64).collect();

    let mut best = FALLBACK_THRESHOLD;
    let mut max_variance = 0.0;
    let mut found = false;

    for t in 1..255usize {
        let w0: f64 = hist[..t].iter().sum();
        let w1: f64 = hist[t..].iter().sum();
        if w0 == 0.0 || w1 == 0.0 {
            continue;
        }

        let mu0 = hist[..t].iter().enumerate().map(|(i, p)| p * i as f64).sum::<f64>() / w0;
        let mu1 = hist[t..]
            .iter()
            .enumerate()
            .map(|(i, p)| p * (i + t) as f64)
            .sum::<f64>()
            / w1;

        let variance = w0 * w1 * (mu0 - mu1).powi(2);
        if variance > max_variance {
            max_variance = variance;
            best = t as u8;
            found = true;
        }
    }

    if found {
        debug!("Otsu threshold {best} (between-class variance {max_variance:.3})");
    } else {
        warn!("No two-class split in histogram, using fallback threshold {FALLBACK_THRESHOLD}");
    }
    best
}

/// A same-sized image whose pixels are 0 (black) or 1 (white).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl BinaryImage {
    /// All-black image.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height, pixels: vec![0; width as usize * height as usize] }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.pixels[self.offset(x, y)]
    }

    /// Sets pixel (x, y); any non-zero `bit` is stored as 1.
    pub fn set(&mut self, x: u32, y: u32, bit: u8) {
        let idx = self.offset(x, y);
        self.pixels[idx] = u8::from(bit != 0);
    }

    /// Row-major pixel bits.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Expands to a displayable grayscale image (0 → 0, 1 → 255).
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| image::Luma([self.get(x, y) * 255]))
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}

/// Binarizes `image`: white (1) iff intensity is strictly greater than
/// `threshold`, so a pixel equal to the threshold is black.
pub fn apply_threshold(image: &GrayImage, threshold: u8) -> BinaryImage {
    BinaryImage {
        width: image.width(),
        height: image.height(),
        pixels: image.pixels().map(|p| u8::from(p.0[0] > threshold)).collect(),
    }
}
