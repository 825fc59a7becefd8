//! Frame preparation: grayscale conversion, aspect-preserving fit onto a
//! white canvas, and sprite-sheet slicing.

use crate::{BitspriteError, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};
use log::debug;
use serde::{Deserialize, Serialize};

/// Canvas fill around a resized image.
const BACKGROUND: Luma<u8> = Luma([255]);

/// Column/row layout of a sprite sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteGrid {
    pub cols: u32,
    pub rows: u32,
}

impl SpriteGrid {
    pub fn new(cols: u32, rows: u32) -> Result<Self> {
        if cols == 0 || rows == 0 {
            return Err(BitspriteError::InvalidGrid(format!(
                "columns and rows must be at least 1, got {cols}x{rows}"
            )));
        }
        Ok(Self { cols, rows })
    }

    /// Builds a grid from optional raw counts. Both must be given or neither.
    pub fn from_parts(cols: Option<i64>, rows: Option<i64>) -> Result<Option<Self>> {
        match (cols, rows) {
            (None, None) => Ok(None),
            (Some(cols), Some(rows)) => {
                let to_count = |n: i64| {
                    u32::try_from(n).map_err(|_| {
                        BitspriteError::InvalidGrid(format!(
                            "columns and rows must be at least 1, got {cols}x{rows}"
                        ))
                    })
                };
                Self::new(to_count(cols)?, to_count(rows)?).map(Some)
            }
            _ => Err(BitspriteError::InvalidGrid(
                "sprite columns and rows must be specified together".to_string(),
            )),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }
}

/// One prepared image, tagged with its row-major position in the sheet.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: usize,
    pub image: GrayImage,
}

/// Collapses any color or indexed input to 8-bit intensity.
pub fn to_grayscale(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}

/// Scales `image` to fit inside `target_width`×`target_height` keeping its
/// aspect ratio, then centers it on a white canvas of exactly that size.
/// An odd leftover pixel goes to the right/bottom edge.
pub fn fit_to_canvas(image: &GrayImage, target_width: u32, target_height: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if (width, height) == (target_width, target_height) {
        return image.clone();
    }

    let mut canvas = GrayImage::from_pixel(target_width, target_height, BACKGROUND);
    if width == 0 || height == 0 || target_width == 0 || target_height == 0 {
        return canvas;
    }

    let img_ratio = f64::from(width) / f64::from(height);
    let target_ratio = f64::from(target_width) / f64::from(target_height);

    let (new_width, new_height) = if img_ratio > target_ratio {
        (target_width, (f64::from(target_width) / img_ratio).round() as u32)
    } else {
        ((f64::from(target_height) * img_ratio).round() as u32, target_height)
    };
    let new_width = new_width.clamp(1, target_width);
    let new_height = new_height.clamp(1, target_height);

    let paste_x = (target_width - new_width) / 2;
    let paste_y = (target_height - new_height) / 2;
    debug!(
        "Resizing {width}x{height} to {new_width}x{new_height} at ({paste_x}, {paste_y}) on {target_width}x{target_height} canvas"
    );

    let resized = imageops::resize(image, new_width, new_height, FilterType::Lanczos3);
    imageops::replace(&mut canvas, &resized, i64::from(paste_x), i64::from(paste_y));
    canvas
}

/// Cuts a sheet into `cols * rows` frames of `floor(W/cols)`×`floor(H/rows)`,
/// indexed row-major. Remainder pixels at the right/bottom are dropped.
pub fn slice_sheet(image: &GrayImage, grid: SpriteGrid) -> Result<Vec<Frame>> {
    let grid = SpriteGrid::new(grid.cols, grid.rows)?;
    let (width, height) = image.dimensions();
    let frame_width = width / grid.cols;
    let frame_height = height / grid.rows;

    if frame_width == 0 || frame_height == 0 {
        return Err(BitspriteError::InvalidGrid(format!(
            "{}x{} grid leaves empty frames on a {width}x{height} sheet",
            grid.cols, grid.rows
        )));
    }

    debug!(
        "Slicing {width}x{height} sheet into {}x{} frames of {frame_width}x{frame_height}",
        grid.cols, grid.rows
    );

    let mut frames = Vec::with_capacity(grid.frame_count());
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let left = col * frame_width;
            let top = row * frame_height;
            frames.push(Frame {
                index: (row * grid.cols + col) as usize,
                image: imageops::crop_imm(image, left, top, frame_width, frame_height).to_image(),
            });
        }
    }
    Ok(frames)
}

/// Resize target of each output frame. Without a grid it is the overall
/// target; with one it is the target divided by the grid, unless
/// `frame_override` pins an axis.
pub fn frame_target(
    target: (u32, u32),
    grid: Option<SpriteGrid>,
    frame_override: (Option<u32>, Option<u32>),
) -> Result<(u32, u32)> {
    let (width, height) = match grid {
        None => target,
        Some(grid) => {
            let grid = SpriteGrid::new(grid.cols, grid.rows)?;
            (
                frame_override.0.unwrap_or(target.0 / grid.cols),
                frame_override.1.unwrap_or(target.1 / grid.rows),
            )
        }
    };
    if width == 0 || height == 0 {
        return Err(BitspriteError::InvalidDimensions { width, height });
    }
    Ok((width, height))
}

/// Normalizes a grayscale image into the frames to binarize.
///
/// Without a grid the whole image is one frame, fitted to the target when
/// `resize` is set. With a grid the sheet is sliced first, on the original
/// pixels, and each frame is then fitted to its [`frame_target`].
pub fn prepare(
    image: &GrayImage,
    target_width: u32,
    target_height: u32,
    resize: bool,
    grid: Option<SpriteGrid>,
    frame_override: (Option<u32>, Option<u32>),
) -> Result<Vec<Frame>> {
    let frame_size = if resize {
        Some(frame_target((target_width, target_height), grid, frame_override)?)
    } else {
        None
    };

    let frames = match grid {
        None => vec![Frame { index: 0, image: image.clone() }],
        Some(grid) => slice_sheet(image, grid)?,
    };

    let Some((frame_width, frame_height)) = frame_size else {
        return Ok(frames);
    };
    Ok(frames
        .into_iter()
        .map(|frame| Frame {
            index: frame.index,
            image: fit_to_canvas(&frame.image, frame_width, frame_height),
        })
        .collect())
}
