//! Axis mirroring.
//!
//! Mirroring is a pure permutation of pixels, so it is lossless and
//! self-inverse: flipping twice on the same axes restores the source exactly.
//! Rows are always copied whole when only the vertical axis is involved;
//! column reversal moves whole pixels so 3-byte pixels keep their channel order.

use log::debug;

use crate::error::Result;
use crate::pixel::{PixelWidth, with_pixel_width};
use crate::surface::Surface;

/// Mirror operator for horizontal and/or vertical flips.
///
/// `flip_x` mirrors left/right (reverses columns), `flip_y` mirrors top/bottom
/// (reverses rows).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct OpFlipSurface {
    flip_x: bool,
    flip_y: bool,
}

impl OpFlipSurface {
    pub fn new(flip_x: bool, flip_y: bool) -> Self {
        Self { flip_x, flip_y }
    }

    pub fn set_axes(&mut self, flip_x: bool, flip_y: bool) -> &mut Self {
        self.flip_x = flip_x;
        self.flip_y = flip_y;
        self
    }

    pub fn flip_x(&self) -> bool {
        self.flip_x
    }

    pub fn flip_y(&self) -> bool {
        self.flip_y
    }

    /// Returns a mirrored copy of `src` in the same format.
    pub fn apply(&self, src: &Surface) -> Result<Surface> {
        src.format().depth()?;
        let mut dst = Surface::allocate_like(src, src.width(), src.height())?;
        self.apply_to_preallocated(src, &mut dst)?;
        Ok(dst)
    }

    /// Mirrors `src` into `dst`, which must have the source's size and format.
    pub fn apply_to_preallocated(&self, src: &Surface, dst: &mut Surface) -> Result<()> {
        let depth = src.format().depth()?;
        Surface::check_destination(src, dst, src.width(), src.height())?;
        debug!(
            "flip {}x{} ({} bytes/pixel), flip_x={}, flip_y={}",
            src.width(),
            src.height(),
            depth.bytes(),
            self.flip_x,
            self.flip_y
        );

        if self.flip_x {
            with_pixel_width!(depth, P => reverse_columns::<P>(src, dst, self.flip_y));
        } else {
            copy_rows(src, dst, self.flip_y);
        }
        Ok(())
    }
}

/// Returns a copy of `src` mirrored on the requested axes.
pub fn flip(src: &Surface, flip_x: bool, flip_y: bool) -> Result<Surface> {
    OpFlipSurface::new(flip_x, flip_y).apply(src)
}

#[inline]
fn source_row(y: usize, height: usize, flip_y: bool) -> usize {
    if flip_y { height - 1 - y } else { y }
}

/// Bulk row copy, optionally in reversed row order.
fn copy_rows(src: &Surface, dst: &mut Surface, flip_y: bool) {
    let height = src.height();
    for y in 0..height {
        dst.row_mut(y).copy_from_slice(src.row(source_row(y, height, flip_y)));
    }
}

/// Per-pixel copy with column order reversed, optionally in reversed row order.
fn reverse_columns<P: PixelWidth>(src: &Surface, dst: &mut Surface, flip_y: bool) {
    let width = src.width();
    let height = src.height();
    let src_pitch = src.pitch();
    let dst_pitch = dst.pitch();
    let src_data = src.pixels();
    let dst_data = dst.pixels_mut();

    for y in 0..height {
        let src_row = source_row(y, height, flip_y) * src_pitch;
        let dst_row = y * dst_pitch;
        for x in 0..width {
            P::copy(
                src_data,
                src_row + (width - 1 - x) * P::BYTES,
                dst_data,
                dst_row + x * P::BYTES,
            );
        }
    }
}
