//! Arbitrary-angle rotation with 16.16 fixed-point inverse mapping.
//!
//! # Algorithm Overview
//!
//! 1. **Setup**: The angle is normalized to (-180°, 180°] and converted once to
//!    fixed-point steps `isin = round(sin * 65536)` and `icos = round(cos * 65536)`.
//!    This is the only floating point work of a call.
//!
//! 2. **Bounds**: The source half extents are projected through the snapped
//!    rotation; the destination is twice the ceiling of the largest projection
//!    on each axis (at least 1), so it is always even-sized.
//!
//! 3. **Inverse mapping**: Every destination pixel center is mapped back onto
//!    the source. Each row starts from a base coordinate derived from its offset
//!    to the destination center and then advances by `icos`/`isin` per column,
//!    so the pixel loop is pure integer arithmetic and no destination pixel is
//!    skipped or written twice.
//!
//! 4. **Sampling**: Coordinates carry a one-pixel bias. After the shift to
//!    whole pixels, anything outside `[1, width] x [1, height]` takes the
//!    background color; everything else copies the nearest source pixel.
//!
//! For even-sized sources, exact multiples of 90° come out as a pure
//! permutation of the source with no background area, without a dedicated code
//! path.

use log::debug;

use crate::error::{Result, TransformError};
use crate::pixel::{PixelDepth, PixelWidth, with_pixel_width};
use crate::surface::Surface;

/// Fractional bits of the fixed-point coordinates.
const FIXED_SHIFT: u32 = 16;
const FIXED_ONE: i64 = 1 << FIXED_SHIFT;

/// Direction of rotation on screen (y axis pointing down).
///
/// - `Ccw`: Counter-clockwise rotation (positive angle rotates top toward left)
/// - `Cw`: Clockwise rotation (positive angle rotates top toward right)
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum RotateDirection {
    Cw,
    #[default]
    Ccw,
}

/// Arbitrary-angle nearest-neighbor rotation.
///
/// # Background Color
///
/// Uncovered destination pixels are filled with the source color key when one
/// is set. Otherwise the top-left source pixel is used with its alpha bits
/// cleared, so the fill is transparent on formats with alpha.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OpRotateSurface {
    angle: f32,
    direction: RotateDirection,
}

impl Default for OpRotateSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl OpRotateSurface {
    pub fn new() -> Self {
        Self {
            angle: 0.0,
            direction: RotateDirection::Ccw,
        }
    }

    /// Sets the rotation angle in degrees and its direction.
    ///
    /// The angle is normalized to the range (-180°, 180°] and stored as a
    /// counter-clockwise angle.
    pub fn set_rotation(&mut self, angle_degrees: f32, direction: RotateDirection) -> &mut Self {
        let mut angle = normalize_angle(angle_degrees);
        self.direction = direction;
        if self.direction == RotateDirection::Cw {
            angle = -angle;
        }
        self.angle = angle;
        self
    }

    /// Returns the normalized counter-clockwise angle in degrees.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn direction(&self) -> RotateDirection {
        self.direction
    }

    /// Returns the size of the surface [`apply`](Self::apply) would produce.
    pub fn compute_output_dimensions(&self, src: &Surface) -> Result<(usize, usize)> {
        let steps = self.fixed_steps()?;
        Ok(steps.output_dimensions(src.width(), src.height()))
    }

    /// Returns a rotated copy of `src` in the same format.
    pub fn apply(&self, src: &Surface) -> Result<Surface> {
        src.format().depth()?;
        let steps = self.fixed_steps()?;
        let (out_w, out_h) = steps.output_dimensions(src.width(), src.height());
        let mut dst = Surface::allocate_like(src, out_w, out_h)?;
        self.rotate_into(src, &mut dst, steps)?;
        Ok(dst)
    }

    /// Rotates `src` into `dst`, which must have the source's format and the
    /// size reported by [`compute_output_dimensions`](Self::compute_output_dimensions).
    pub fn apply_to_preallocated(&self, src: &Surface, dst: &mut Surface) -> Result<()> {
        src.format().depth()?;
        let steps = self.fixed_steps()?;
        let (out_w, out_h) = steps.output_dimensions(src.width(), src.height());
        Surface::check_destination(src, dst, out_w, out_h)?;
        self.rotate_into(src, dst, steps)
    }

    fn fixed_steps(&self) -> Result<FixedSteps> {
        if !self.angle.is_finite() {
            return Err(TransformError::NonFiniteAngle);
        }
        Ok(FixedSteps::from_degrees(self.angle as f64))
    }

    fn rotate_into(&self, src: &Surface, dst: &mut Surface, steps: FixedSteps) -> Result<()> {
        let depth = src.format().depth()?;
        let background = background_color(src, depth);
        debug!(
            "rotate {}x{} by {}° -> {}x{} ({} bytes/pixel, isin={}, icos={}, background={:#x})",
            src.width(),
            src.height(),
            self.angle,
            dst.width(),
            dst.height(),
            depth.bytes(),
            steps.isin,
            steps.icos,
            background
        );

        let sampler = InverseSampler::new(src, dst, steps);
        with_pixel_width!(depth, P => rotate_pixels::<P>(src, dst, &sampler, background));
        Ok(())
    }
}

/// Returns a copy of `src` rotated counter-clockwise by `angle_degrees`.
///
/// Negative angles rotate clockwise. Unless the angle is a multiple of 90°
/// the result is larger than the source; see [`OpRotateSurface`] for how the
/// uncovered area is filled.
pub fn rotate(src: &Surface, angle_degrees: f32) -> Result<Surface> {
    let mut op = OpRotateSurface::new();
    op.set_rotation(angle_degrees, RotateDirection::Ccw);
    op.apply(src)
}

fn normalize_angle(angle_degrees: f32) -> f32 {
    angle_degrees - (angle_degrees / 360.0 - 0.5).ceil() * 360.0
}

/// Fixed-point sine and cosine of the rotation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct FixedSteps {
    isin: i64,
    icos: i64,
}

impl FixedSteps {
    fn from_degrees(angle_degrees: f64) -> Self {
        let radians = angle_degrees.to_radians();
        Self {
            isin: (radians.sin() * FIXED_ONE as f64).round() as i64,
            icos: (radians.cos() * FIXED_ONE as f64).round() as i64,
        }
    }

    /// Half extents of the rotated bounding box, at least 1 each.
    ///
    /// Uses the snapped fixed-point values so the box agrees with the sampler
    /// and right angles do not pick up rounding noise from `sin`/`cos`.
    fn half_extents(&self, width: usize, height: usize) -> (usize, usize) {
        let sin = self.isin as f64 / FIXED_ONE as f64;
        let cos = self.icos as f64 / FIXED_ONE as f64;
        let x = width as f64 / 2.0;
        let y = height as f64 / 2.0;

        let cx = cos * x;
        let cy = cos * y;
        let sx = sin * x;
        let sy = sin * y;

        let max_abs = |values: [f64; 4]| values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        let nx = max_abs([cx + sy, cx - sy, -cx + sy, -cx - sy]).ceil() as usize;
        let ny = max_abs([sx + cy, sx - cy, -sx + cy, -sx - cy]).ceil() as usize;
        (nx.max(1), ny.max(1))
    }

    fn output_dimensions(&self, width: usize, height: usize) -> (usize, usize) {
        let (half_w, half_h) = self.half_extents(width, height);
        (half_w * 2, half_h * 2)
    }
}

/// Per-row starting coordinates of the inverse mapping, in biased 16.16 units.
///
/// For destination pixel `(x, y)` the source coordinate is
///
/// ```text
/// u = src_w / 2 + 1 + cos * (x + 0.5 - half_w) - sin * (y + 0.5 - half_h)
/// v = src_h / 2 + 1 + sin * (x + 0.5 - half_w) + cos * (y + 0.5 - half_h)
/// ```
///
/// which is linear in `x`, so a row only needs its value at `x = 0`.
#[derive(Copy, Clone, Debug)]
struct InverseSampler {
    steps: FixedSteps,
    origin_u: i64,
    origin_v: i64,
    column_offset: i64,
    half_h: i64,
}

impl InverseSampler {
    fn new(src: &Surface, dst: &Surface, steps: FixedSteps) -> Self {
        let half_w = (dst.width() / 2) as i64;
        let half_h = (dst.height() / 2) as i64;
        Self {
            steps,
            origin_u: ((src.width() as i64) << (FIXED_SHIFT - 1)) + FIXED_ONE,
            origin_v: ((src.height() as i64) << (FIXED_SHIFT - 1)) + FIXED_ONE,
            // Doubled offset of the first column's center from the destination center.
            column_offset: 1 - 2 * half_w,
            half_h,
        }
    }

    #[inline]
    fn row_start(&self, y: usize) -> (i64, i64) {
        let FixedSteps { isin, icos } = self.steps;
        let row_offset = 2 * y as i64 + 1 - 2 * self.half_h;
        let u = self.origin_u + ((icos * self.column_offset - isin * row_offset) >> 1);
        let v = self.origin_v + ((isin * self.column_offset + icos * row_offset) >> 1);
        (u, v)
    }
}

/// Fill color for destination pixels that map outside the source.
fn background_color(src: &Surface, depth: PixelDepth) -> u32 {
    if let Some(key) = src.color_key() {
        return key;
    }
    let top_left = with_pixel_width!(depth, P => P::load(src.pixels(), 0));
    top_left & !src.format().masks().a
}

fn rotate_pixels<P: PixelWidth>(
    src: &Surface,
    dst: &mut Surface,
    sampler: &InverseSampler,
    background: u32,
) {
    let FixedSteps { isin, icos } = sampler.steps;
    let src_w = src.width() as i64;
    let src_h = src.height() as i64;
    let src_pitch = src.pitch();
    let dst_w = dst.width();
    let dst_h = dst.height();
    let dst_pitch = dst.pitch();
    let src_data = src.pixels();
    let dst_data = dst.pixels_mut();

    for y in 0..dst_h {
        let (mut u, mut v) = sampler.row_start(y);
        let dst_row = y * dst_pitch;
        for x in 0..dst_w {
            let dst_offset = dst_row + x * P::BYTES;
            let px = u >> FIXED_SHIFT;
            let py = v >> FIXED_SHIFT;
            if px < 1 || py < 1 || px > src_w || py > src_h {
                P::store(dst_data, dst_offset, background);
            } else {
                let src_offset = (py - 1) as usize * src_pitch + (px - 1) as usize * P::BYTES;
                P::copy(src_data, src_offset, dst_data, dst_offset);
            }
            u += icos;
            v += isin;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{ChannelMasks, PixelFormat};

    fn assert_close_pct(expected: f32, actual: f32, pct: f32) {
        let tol = expected.abs() * (pct / 100.0);
        let diff = (expected - actual).abs();
        assert!(
            diff <= tol,
            "expected {expected}, got {actual}, diff {diff} > tol {tol}"
        );
    }

    fn numbered(format: &PixelFormat, width: usize, height: usize) -> Surface {
        let mut surface = Surface::allocate(format, width, height).expect("allocate");
        for y in 0..height {
            for x in 0..width {
                surface.set_pixel(x, y, (y * width + x + 1) as u32);
            }
        }
        surface
    }

    #[test]
    fn test_normalization() {
        assert_close_pct(45.0, normalize_angle(405.0), 0.01);
        assert_close_pct(-90.0, normalize_angle(270.0), 0.01);
        assert_close_pct(180.0, normalize_angle(-180.0), 0.01);
    }

    #[test]
    fn test_direction_negates_angle() {
        let mut rotate = OpRotateSurface::new();
        rotate.set_rotation(30.0, RotateDirection::Ccw);
        assert_close_pct(30.0, rotate.angle(), 0.01);

        rotate.set_rotation(30.0, RotateDirection::Cw);
        assert_close_pct(-30.0, rotate.angle(), 0.01);
        assert_eq!(rotate.direction(), RotateDirection::Cw);
    }

    #[test]
    fn test_fixed_steps_right_angles_are_exact() {
        assert_eq!(FixedSteps::from_degrees(0.0), FixedSteps { isin: 0, icos: 65536 });
        assert_eq!(FixedSteps::from_degrees(90.0), FixedSteps { isin: 65536, icos: 0 });
        assert_eq!(FixedSteps::from_degrees(180.0), FixedSteps { isin: 0, icos: -65536 });
    }

    #[test]
    fn test_output_dimensions() {
        let zero = FixedSteps::from_degrees(0.0);
        assert_eq!(zero.output_dimensions(2, 2), (2, 2));
        assert_eq!(zero.output_dimensions(3, 5), (4, 6));
        assert_eq!(zero.output_dimensions(1, 1), (2, 2));

        let quarter = FixedSteps::from_degrees(90.0);
        assert_eq!(quarter.output_dimensions(4, 2), (2, 4));

        let expected = (500.0_f32 * std::f32::consts::SQRT_2) as usize;
        let (w, h) = FixedSteps::from_degrees(45.0).output_dimensions(500, 500);
        assert_eq!(w, h);
        assert_close_pct(expected as f32, w as f32, 0.5);
    }

    #[test]
    fn test_zero_degrees_is_identity_on_even_sizes() {
        let src = numbered(&PixelFormat::argb8888(), 2, 2);
        let out = rotate(&src, 0.0).expect("rotate");
        assert_eq!(out, src);
    }

    #[test]
    fn test_zero_degrees_odd_size_adds_background_edge() {
        let src = numbered(&PixelFormat::rgb565(), 3, 3);
        let out = rotate(&src, 0.0).expect("rotate");
        assert_eq!((out.width(), out.height()), (4, 4));
        let background = src.get_pixel(0, 0);
        for y in 0..4 {
            for x in 0..4 {
                let expected = if x < 3 && y < 3 {
                    src.get_pixel(x, y)
                } else {
                    background
                };
                assert_eq!(out.get_pixel(x, y), expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_quarter_turn_is_counter_clockwise_permutation() {
        let src = numbered(&PixelFormat::rgb888(), 4, 2);
        let out = rotate(&src, 90.0).expect("rotate");
        assert_eq!((out.width(), out.height()), (2, 4));
        for y in 0..4 {
            for x in 0..2 {
                assert_eq!(out.get_pixel(x, y), src.get_pixel(3 - y, x));
            }
        }
    }

    #[test]
    fn test_half_turn_reverses_both_axes() {
        let src = numbered(&PixelFormat::indexed(Vec::new()), 4, 4);
        let out = rotate(&src, 180.0).expect("rotate");
        assert_eq!((out.width(), out.height()), (4, 4));
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(out.get_pixel(x, y), src.get_pixel(3 - x, 3 - y));
            }
        }
    }

    #[test]
    fn test_background_clears_alpha_of_top_left() {
        let mut src = Surface::allocate(&PixelFormat::argb8888(), 4, 4).expect("allocate");
        src.fill(0xFF80_4020);
        src.set_pixel(0, 0, 0x8011_2233);
        let out = rotate(&src, 45.0).expect("rotate");
        assert_eq!(out.get_pixel(0, 0), 0x0011_2233);
        assert_eq!(out.get_pixel(out.width() - 1, out.height() - 1), 0x0011_2233);
    }

    #[test]
    fn test_background_uses_color_key() {
        let format = PixelFormat::rgb888().with_color_key(0x00FF_00FF);
        let mut src = Surface::allocate(&format, 4, 4).expect("allocate");
        src.fill(0x0012_3456);
        let out = rotate(&src, 30.0).expect("rotate");
        assert_eq!(out.color_key(), Some(0x00FF_00FF));
        assert_eq!(out.get_pixel(0, 0), 0x00FF_00FF);
    }

    #[test]
    fn test_triplet_background_does_not_touch_padding() {
        let mut src = Surface::allocate(&PixelFormat::rgb888(), 5, 5).expect("allocate");
        src.fill(0x00AB_CDEF);
        let out = rotate(&src, 10.0).expect("rotate");
        assert_eq!((out.width(), out.height()), (6, 6));
        assert_eq!(out.pitch(), 20);
        for y in 0..out.height() {
            let row = &out.pixels()[y * out.pitch()..(y + 1) * out.pitch()];
            assert!(row[out.row_bytes()..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_rejects_unsupported_depth_and_bad_angle() {
        let format = PixelFormat::new(8, ChannelMasks::default());
        let src = Surface::from_raw(format, 1, 1, 8, vec![0; 8]).expect("from_raw");
        assert_eq!(
            rotate(&src, 10.0).unwrap_err(),
            TransformError::UnsupportedFormat { bytes_per_pixel: 8 }
        );

        let src = Surface::allocate(&PixelFormat::argb8888(), 2, 2).expect("allocate");
        assert_eq!(rotate(&src, f32::NAN).unwrap_err(), TransformError::NonFiniteAngle);
    }

    #[test]
    fn test_apply_to_preallocated_matches_apply() {
        let src = numbered(&PixelFormat::argb8888(), 5, 3);
        let mut op = OpRotateSurface::new();
        op.set_rotation(33.0, RotateDirection::Cw);
        let (w, h) = op.compute_output_dimensions(&src).expect("dimensions");
        let mut dst = Surface::allocate(src.format(), w, h).expect("allocate");
        op.apply_to_preallocated(&src, &mut dst).expect("rotate");
        assert_eq!(dst, op.apply(&src).expect("rotate"));
    }

    #[test]
    fn test_odd_sizes_use_real_half_extents() {
        let quarter_diag = FixedSteps::from_degrees(45.0);
        assert_eq!(quarter_diag.output_dimensions(3, 3), (6, 6));
        assert_eq!(FixedSteps::from_degrees(30.0).output_dimensions(5, 5), (8, 8));
        assert_eq!(FixedSteps::from_degrees(10.0).output_dimensions(7, 3), (8, 6));

        let src = numbered(&PixelFormat::argb8888(), 3, 3);
        let out = rotate(&src, 45.0).expect("rotate");
        assert_eq!((out.width(), out.height()), (6, 6));
        assert_eq!(out.get_pixel(3, 3), src.get_pixel(1, 2));
    }

    #[test]
    fn test_preallocated_destination_must_match() {
        let src = numbered(&PixelFormat::argb8888(), 4, 4);
        let mut op = OpRotateSurface::new();
        op.set_rotation(45.0, RotateDirection::Ccw);

        let mut same_size = Surface::allocate(src.format(), 4, 4).expect("allocate");
        assert_eq!(
            op.apply_to_preallocated(&src, &mut same_size).unwrap_err(),
            TransformError::DestinationSize {
                expected_width: 6,
                expected_height: 6,
                width: 4,
                height: 4,
            }
        );

        let mut keyed = Surface::allocate(&PixelFormat::argb8888().with_color_key(9), 6, 6)
            .expect("allocate");
        assert!(matches!(
            op.apply_to_preallocated(&src, &mut keyed),
            Err(TransformError::DestinationFormat { .. })
        ));
    }
}
