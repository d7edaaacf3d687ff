//! Geometric transforms for packed pixel surfaces.
//!
//! Rotate, scale and mirror surfaces of 1, 2, 3 or 4 bytes per pixel directly
//! on their packed bytes, without converting to a canonical pixel format.
//!
//! # Operations
//!
//! - **Mirror** ([`OpFlipSurface`], [`flip`]): Lossless row/column reversal.
//! - **Scale** ([`OpScaleSurface`], [`scale`]): Nearest-neighbor resize driven
//!   by integer error accumulation.
//! - **Rotate** ([`OpRotateSurface`], [`rotate`]): Arbitrary angles through
//!   16.16 fixed-point inverse mapping, uncovered area filled with a
//!   background color derived from the source.
//!
//! Every operation allocates a new [`Surface`] with exactly the source's
//! [`PixelFormat`] (depth, masks, palette, color key) and writes each of its
//! pixels once. Sources are never modified.
//!
//! # Example
//!
//! ```
//! use surface_transform::{PixelFormat, Surface, flip, rotate, scale};
//!
//! let mut src = Surface::allocate(&PixelFormat::argb8888(), 64, 48)?;
//! src.fill(0xFF20_4080);
//!
//! let mirrored = flip(&src, true, false)?;
//! let doubled = scale(&src, 128, 96)?;
//! let tilted = rotate(&src, 30.0)?;
//!
//! assert_eq!(mirrored, src);
//! assert_eq!((doubled.width(), doubled.height()), (128, 96));
//! assert!(tilted.width() > src.width());
//! # Ok::<(), surface_transform::TransformError>(())
//! ```

#[doc(hidden)]
pub mod bench_utils;
mod error;
mod op_flip_surface;
mod op_rotate_surface;
mod op_scale_surface;
mod pixel;
mod surface;

pub use crate::error::{Result, TransformError};
pub use crate::op_flip_surface::{OpFlipSurface, flip};
pub use crate::op_rotate_surface::{OpRotateSurface, RotateDirection, rotate};
pub use crate::op_scale_surface::{OpScaleSurface, scale};
pub use crate::pixel::PixelDepth;
pub use crate::surface::{ChannelMasks, PaletteColor, PixelFormat, Surface, SurfaceAllocation};
