//! Byte-width strategies for packed pixels.
//!
//! Every engine walks raw bytes with `offset = row * pitch + col * bytes_per_pixel`.
//! The per-pixel copy and store differ by width: 1, 2 and 4-byte pixels move as
//! native-endian scalars, 3-byte pixels move as explicit byte triplets because
//! there is no portable 3-byte scalar and a 4-byte store would clobber the
//! neighbouring pixel.
//!
//! The width is matched once per call with [`with_pixel_width!`], which
//! monomorphizes the kernel for one of [`Px1`], [`Px2`], [`Px3`] or [`Px4`].

use crate::error::{Result, TransformError};

/// Supported pixel depths, in bytes per pixel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PixelDepth {
    One = 1,
    Two = 2,
    Three = 3,
    Four = 4,
}

impl PixelDepth {
    /// Validates a raw bytes-per-pixel value.
    pub fn from_bytes_per_pixel(bytes_per_pixel: u8) -> Result<Self> {
        match bytes_per_pixel {
            1 => Ok(PixelDepth::One),
            2 => Ok(PixelDepth::Two),
            3 => Ok(PixelDepth::Three),
            4 => Ok(PixelDepth::Four),
            _ => Err(TransformError::UnsupportedFormat { bytes_per_pixel }),
        }
    }

    /// Returns the number of bytes one pixel occupies.
    pub fn bytes(self) -> usize {
        self as usize
    }
}

/// Per-width pixel load/store used by the transform kernels.
pub(crate) trait PixelWidth {
    const BYTES: usize;

    /// Reads the pixel starting at `offset` as a native pixel value.
    fn load(bytes: &[u8], offset: usize) -> u32;

    /// Writes `value` as one pixel starting at `offset`.
    fn store(bytes: &mut [u8], offset: usize, value: u32);

    #[inline(always)]
    fn copy(src: &[u8], src_offset: usize, dst: &mut [u8], dst_offset: usize) {
        Self::store(dst, dst_offset, Self::load(src, src_offset));
    }
}

pub(crate) struct Px1;
pub(crate) struct Px2;
pub(crate) struct Px3;
pub(crate) struct Px4;

impl PixelWidth for Px1 {
    const BYTES: usize = 1;

    #[inline(always)]
    fn load(bytes: &[u8], offset: usize) -> u32 {
        bytes[offset] as u32
    }

    #[inline(always)]
    fn store(bytes: &mut [u8], offset: usize, value: u32) {
        bytes[offset] = value as u8;
    }

    #[inline(always)]
    fn copy(src: &[u8], src_offset: usize, dst: &mut [u8], dst_offset: usize) {
        dst[dst_offset] = src[src_offset];
    }
}

impl PixelWidth for Px2 {
    const BYTES: usize = 2;

    #[inline(always)]
    fn load(bytes: &[u8], offset: usize) -> u32 {
        u16::from_ne_bytes([bytes[offset], bytes[offset + 1]]) as u32
    }

    #[inline(always)]
    fn store(bytes: &mut [u8], offset: usize, value: u32) {
        bytes[offset..offset + 2].copy_from_slice(&(value as u16).to_ne_bytes());
    }
}

impl PixelWidth for Px3 {
    const BYTES: usize = 3;

    // Packed in memory order: the first byte is the low byte on little-endian
    // targets and the high byte on big-endian ones.
    #[inline(always)]
    fn load(bytes: &[u8], offset: usize) -> u32 {
        let b0 = bytes[offset] as u32;
        let b1 = bytes[offset + 1] as u32;
        let b2 = bytes[offset + 2] as u32;
        if cfg!(target_endian = "little") {
            b0 | (b1 << 8) | (b2 << 16)
        } else {
            b2 | (b1 << 8) | (b0 << 16)
        }
    }

    #[inline(always)]
    fn store(bytes: &mut [u8], offset: usize, value: u32) {
        let lo = value as u8;
        let mid = (value >> 8) as u8;
        let hi = (value >> 16) as u8;
        if cfg!(target_endian = "little") {
            bytes[offset] = lo;
            bytes[offset + 1] = mid;
            bytes[offset + 2] = hi;
        } else {
            bytes[offset] = hi;
            bytes[offset + 1] = mid;
            bytes[offset + 2] = lo;
        }
    }

    #[inline(always)]
    fn copy(src: &[u8], src_offset: usize, dst: &mut [u8], dst_offset: usize) {
        dst[dst_offset] = src[src_offset];
        dst[dst_offset + 1] = src[src_offset + 1];
        dst[dst_offset + 2] = src[src_offset + 2];
    }
}

impl PixelWidth for Px4 {
    const BYTES: usize = 4;

    #[inline(always)]
    fn load(bytes: &[u8], offset: usize) -> u32 {
        u32::from_ne_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    #[inline(always)]
    fn store(bytes: &mut [u8], offset: usize, value: u32) {
        bytes[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
    }
}

/// Runs `$body` with `$px` bound to the [`PixelWidth`] type matching `$depth`.
macro_rules! with_pixel_width {
    ($depth:expr, $px:ident => $body:expr) => {
        match $depth {
            $crate::pixel::PixelDepth::One => {
                type $px = $crate::pixel::Px1;
                $body
            }
            $crate::pixel::PixelDepth::Two => {
                type $px = $crate::pixel::Px2;
                $body
            }
            $crate::pixel::PixelDepth::Three => {
                type $px = $crate::pixel::Px3;
                $body
            }
            $crate::pixel::PixelDepth::Four => {
                type $px = $crate::pixel::Px4;
                $body
            }
        }
    };
}

pub(crate) use with_pixel_width;
