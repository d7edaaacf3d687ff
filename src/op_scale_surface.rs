//! Nearest-neighbor scaling with integer error accumulation.
//!
//! Each axis is walked Bresenham-style: an error term starts at
//! `2 * src - 2 * dst`, every output step emits the current source index and
//! then advances the source cursor while the error is non-negative. No
//! division or floating point is involved per pixel, the mapping is monotonic,
//! and every index read stays within `[0, src)`.
//!
//! Scaling is destructive: shrinking drops rows/columns, so scaling back up
//! does not recover the source.

use log::debug;

use crate::error::{Result, TransformError};
use crate::pixel::{PixelWidth, with_pixel_width};
use crate::surface::Surface;

/// Nearest-neighbor resize operator.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OpScaleSurface {
    width: usize,
    height: usize,
}

impl OpScaleSurface {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Sets the target size in pixels. Both extents must be at least 1 when applied.
    pub fn set_size(&mut self, width: usize, height: usize) -> &mut Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn compute_output_dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Returns a resized copy of `src` in the same format.
    pub fn apply(&self, src: &Surface) -> Result<Surface> {
        src.format().depth()?;
        if self.width == 0 || self.height == 0 {
            return Err(TransformError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        let mut dst = Surface::allocate_like(src, self.width, self.height)?;
        self.apply_to_preallocated(src, &mut dst)?;
        Ok(dst)
    }

    /// Resizes `src` into `dst`, which must have the target size and the
    /// source's format.
    pub fn apply_to_preallocated(&self, src: &Surface, dst: &mut Surface) -> Result<()> {
        let depth = src.format().depth()?;
        Surface::check_destination(src, dst, self.width, self.height)?;
        debug!(
            "scale {}x{} -> {}x{} ({} bytes/pixel)",
            src.width(),
            src.height(),
            dst.width(),
            dst.height(),
            depth.bytes()
        );
        with_pixel_width!(depth, P => stretch::<P>(src, dst));
        Ok(())
    }
}

/// Returns a copy of `src` resized to `width` x `height` by nearest neighbor.
pub fn scale(src: &Surface, width: usize, height: usize) -> Result<Surface> {
    OpScaleSurface::new(width, height).apply(src)
}

/// Error-accumulation cursor along one axis.
#[derive(Clone, Debug)]
struct NearestStepper {
    position: usize,
    error: i64,
    src2: i64,
    dst2: i64,
}

impl NearestStepper {
    fn new(src_extent: usize, dst_extent: usize) -> Self {
        let src2 = 2 * src_extent as i64;
        let dst2 = 2 * dst_extent as i64;
        Self {
            position: 0,
            error: src2 - dst2,
            src2,
            dst2,
        }
    }

    #[inline(always)]
    fn position(&self) -> usize {
        self.position
    }

    /// Moves to the source index for the next output step.
    #[inline(always)]
    fn advance(&mut self) {
        while self.error >= 0 {
            self.position += 1;
            self.error -= self.dst2;
        }
        self.error += self.src2;
    }
}

fn stretch<P: PixelWidth>(src: &Surface, dst: &mut Surface) {
    let src_width = src.width();
    let src_pitch = src.pitch();
    let dst_width = dst.width();
    let dst_height = dst.height();
    let dst_pitch = dst.pitch();
    let src_data = src.pixels();
    let dst_data = dst.pixels_mut();

    let mut rows = NearestStepper::new(src.height(), dst_height);
    for y in 0..dst_height {
        let src_row = rows.position() * src_pitch;
        let dst_row = y * dst_pitch;
        let mut cols = NearestStepper::new(src_width, dst_width);
        for x in 0..dst_width {
            P::copy(
                src_data,
                src_row + cols.position() * P::BYTES,
                dst_data,
                dst_row + x * P::BYTES,
            );
            cols.advance();
        }
        rows.advance();
    }
}
