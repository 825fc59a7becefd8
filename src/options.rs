//! Conversion options and their JSON config form.

use crate::frame::{self, SpriteGrid};
use crate::threshold::{ThresholdMode, ThresholdScope};
use crate::{BitspriteError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Width of the reference display.
pub const DEFAULT_WIDTH: u32 = 144;
/// Height of the reference display.
pub const DEFAULT_HEIGHT: u32 = 168;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertOptions {
    pub width: u32,
    pub height: u32,
    pub threshold: ThresholdMode,
    pub threshold_scope: ThresholdScope,
    pub resize: bool,
    pub sprite: Option<SpriteGrid>,
    /// Per-frame resize target; defaults to `width / cols`
    pub frame_width: Option<u32>,
    /// Per-frame resize target; defaults to `height / rows`
    pub frame_height: Option<u32>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            threshold: ThresholdMode::Auto,
            threshold_scope: ThresholdScope::Sheet,
            resize: true,
            sprite: None,
            frame_width: None,
            frame_height: None,
        }
    }
}

impl ConvertOptions {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Parses and validates a JSON config. A bad threshold is reported as
    /// `InvalidThreshold`, not as a parse error.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let mut value: serde_json::Value = serde_json::from_str(text)?;
        let threshold = value
            .as_object_mut()
            .and_then(|fields| fields.remove("threshold"))
            .map(|raw| ThresholdMode::from_json_value(&raw))
            .transpose()?;

        let mut options: Self = serde_json::from_value(value)?;
        if let Some(threshold) = threshold {
            options.threshold = threshold;
        }
        options.validate()?;
        Ok(options)
    }

    /// Rejects option combinations before any image work happens.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(BitspriteError::InvalidDimensions { width: self.width, height: self.height });
        }
        if let Some(grid) = self.sprite {
            SpriteGrid::new(grid.cols, grid.rows)?;
            if self.resize {
                self.frame_size()?;
            }
        }
        Ok(())
    }

    /// Resize target of each output frame.
    pub fn frame_size(&self) -> Result<(u32, u32)> {
        frame::frame_target(
            (self.width, self.height),
            self.sprite,
            (self.frame_width, self.frame_height),
        )
    }
}
