//! Shared helpers for benchmark drivers.

use crate::{PixelFormat, Surface};

pub const BENCH_SIZES: [usize; 5] = [256, 512, 1024, 2048, 4096];
pub const BENCH_BYTES_PER_PIXEL: [u8; 4] = [1, 2, 3, 4];
pub const BENCH_ANGLES: [f32; 7] = [15.0, 30.0, 45.0, 60.0, 90.0, 180.0, 270.0];
pub const BENCH_SCALE_FACTORS: [f32; 4] = [0.25, 0.5, 2.0, 3.5];

/// Returns the benchmark format for a pixel depth.
pub fn bench_format(bytes_per_pixel: u8) -> PixelFormat {
    match bytes_per_pixel {
        1 => PixelFormat::indexed(Vec::new()),
        2 => PixelFormat::rgb565(),
        3 => PixelFormat::rgb888(),
        _ => PixelFormat::argb8888(),
    }
}

pub fn create_test_surface(width: usize, height: usize, bytes_per_pixel: u8) -> Surface {
    let mut surface =
        Surface::allocate(&bench_format(bytes_per_pixel), width, height).expect("bench surface");
    for y in 0..height {
        let row = surface.row_mut(y);
        for (x, byte) in row.iter_mut().enumerate() {
            *byte = ((x + y * 3) % 251) as u8;
        }
    }
    surface
}

pub fn format_to_string(bytes_per_pixel: u8) -> &'static str {
    match bytes_per_pixel {
        1 => "INDEX8",
        2 => "RGB565",
        3 => "RGB888",
        4 => "ARGB8888",
        _ => "UNKNOWN",
    }
}
