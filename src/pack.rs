//! MSB-first 1-bit packing.
//!
//! Rows are packed top to bottom, `ceil(width / 8)` bytes each. Bit 7 of a
//! byte is its leftmost pixel; 1 is white, 0 is black. Bits past the right
//! edge of the row are always 0.

use crate::threshold::BinaryImage;

/// Row stride of the packed format.
pub fn bytes_per_row(width: u32) -> usize {
    (width as usize).div_ceil(8)
}

/// Packed bytes together with the dimensions they were packed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedBitmap {
    width: u32,
    height: u32,
    bytes: Vec<u8>,
}

impl PackedBitmap {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

pub fn pack(image: &BinaryImage) -> PackedBitmap {
    let (width, height) = (image.width(), image.height());
    let stride = bytes_per_row(width);
    let mut bytes = vec![0u8; stride * height as usize];

    for y in 0..height {
        let row = &mut bytes[y as usize * stride..(y as usize + 1) * stride];
        for x in 0..width {
            if image.get(x, y) != 0 {
                row[x as usize / 8] |= 0x80 >> (x % 8);
            }
        }
    }

    PackedBitmap { width, height, bytes }
}

/// Reads the bits back out in packing order.
pub fn unpack(bitmap: &PackedBitmap) -> BinaryImage {
    let stride = bytes_per_row(bitmap.width);
    let mut image = BinaryImage::new(bitmap.width, bitmap.height);
    for y in 0..bitmap.height {
        for x in 0..bitmap.width {
            let byte = bitmap.bytes[y as usize * stride + x as usize / 8];
            image.set(x, y, (byte >> (7 - x % 8)) & 1);
        }
    }
    image
}
