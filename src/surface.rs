//! Packed pixel surfaces and the allocator every transform writes into.
//!
//! # Memory Layout
//!
//! Pixels are stored as raw bytes in row-major order with an explicit pitch:
//!
//! ```text
//! pixels[y * pitch + x * bytes_per_pixel + byte]
//! ```
//!
//! `pitch` may exceed `width * bytes_per_pixel`; the padding bytes at the end of
//! each row belong to no pixel and are never compared or copied by the engines.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;
use std::slice;

use log::{debug, trace};

use crate::error::{Result, TransformError};
use crate::pixel::{PixelDepth, PixelWidth, with_pixel_width};

/// Row alignment used for surfaces created by the allocator.
const PITCH_ALIGN: usize = 4;

/// Bit masks locating each channel inside a pixel value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChannelMasks {
    pub r: u32,
    pub g: u32,
    pub b: u32,
    pub a: u32,
}

impl ChannelMasks {
    pub const fn new(r: u32, g: u32, b: u32, a: u32) -> Self {
        Self { r, g, b, a }
    }
}

/// One palette entry of an indexed surface.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct PaletteColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl PaletteColor {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Pixel layout shared by a source surface and everything derived from it.
///
/// The depth is stored as given so that surfaces handed over by a host can be
/// represented even when no engine supports them; the transforms reject such
/// depths with [`TransformError::UnsupportedFormat`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelFormat {
    bytes_per_pixel: u8,
    masks: ChannelMasks,
    palette: Option<Vec<PaletteColor>>,
    color_key: Option<u32>,
}

impl PixelFormat {
    /// Creates a direct-color format.
    pub fn new(bytes_per_pixel: u8, masks: ChannelMasks) -> Self {
        Self {
            bytes_per_pixel,
            masks,
            palette: None,
            color_key: None,
        }
    }

    /// Creates an 8-bit indexed format with the given palette.
    pub fn indexed(palette: Vec<PaletteColor>) -> Self {
        Self {
            bytes_per_pixel: 1,
            masks: ChannelMasks::default(),
            palette: Some(palette),
            color_key: None,
        }
    }

    /// 16-bit 5-6-5 color without alpha.
    pub fn rgb565() -> Self {
        Self::new(2, ChannelMasks::new(0xF800, 0x07E0, 0x001F, 0))
    }

    /// 24-bit packed color without alpha.
    pub fn rgb888() -> Self {
        Self::new(3, ChannelMasks::new(0xFF_0000, 0x00_FF00, 0x00_00FF, 0))
    }

    /// 32-bit color with alpha in the high byte.
    pub fn argb8888() -> Self {
        Self::new(
            4,
            ChannelMasks::new(0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0xFF00_0000),
        )
    }

    /// Returns a copy of this format with a color key set.
    pub fn with_color_key(mut self, key: u32) -> Self {
        self.color_key = Some(key);
        self
    }

    pub fn bytes_per_pixel(&self) -> u8 {
        self.bytes_per_pixel
    }

    pub fn bits_per_pixel(&self) -> u32 {
        self.bytes_per_pixel as u32 * 8
    }

    pub fn masks(&self) -> ChannelMasks {
        self.masks
    }

    pub fn palette(&self) -> Option<&[PaletteColor]> {
        self.palette.as_deref()
    }

    pub fn color_key(&self) -> Option<u32> {
        self.color_key
    }

    /// Returns true if the alpha mask selects any bits.
    pub fn has_alpha(&self) -> bool {
        self.masks.a != 0
    }

    /// Validates the depth for use by the transform engines.
    pub fn depth(&self) -> Result<PixelDepth> {
        PixelDepth::from_bytes_per_pixel(self.bytes_per_pixel)
    }

    /// Format descriptor for a surface allocated from this one: depth, masks,
    /// color key and, for 1-byte surfaces, the palette.
    fn replicate(&self) -> Self {
        Self {
            bytes_per_pixel: self.bytes_per_pixel,
            masks: self.masks,
            palette: if self.bytes_per_pixel == 1 {
                self.palette.clone()
            } else {
                None
            },
            color_key: self.color_key,
        }
    }
}

/// Allocation strategy for surface pixel buffers.
///
/// The default uses huge pages on macOS/Linux and standard pages elsewhere.
/// `HugePages` is best-effort: it falls back to standard pages if the OS
/// cannot satisfy the request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SurfaceAllocation {
    Standard,
    HugePages,
}

impl Default for SurfaceAllocation {
    fn default() -> Self {
        if cfg!(any(target_os = "macos", target_os = "linux")) {
            SurfaceAllocation::HugePages
        } else {
            SurfaceAllocation::Standard
        }
    }
}

/// Internal byte buffer backed by the heap or by an anonymous mapping.
pub(crate) enum SurfaceBuffer {
    Vec(Vec<u8>),
    Mmap { ptr: NonNull<u8>, len: usize, bytes: usize },
}

// SAFETY: the mapping is exclusively owned by the buffer, like the `Vec` case.
unsafe impl Send for SurfaceBuffer {}
// SAFETY: shared access only hands out `&[u8]`.
unsafe impl Sync for SurfaceBuffer {}

impl SurfaceBuffer {
    fn new(len: usize, allocation: SurfaceAllocation) -> std::result::Result<Self, String> {
        if allocation == SurfaceAllocation::HugePages {
            if let Some(buffer) = try_huge_pages(len) {
                return Ok(buffer);
            }
            if len >= HUGE_PAGE_MIN_BYTES {
                debug!("huge page mapping of {len} bytes unavailable, using the heap");
            }
        }
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|err| err.to_string())?;
        data.resize(len, 0);
        Ok(SurfaceBuffer::Vec(data))
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        match self {
            SurfaceBuffer::Vec(data) => data.as_slice(),
            SurfaceBuffer::Mmap { ptr, len, .. } => unsafe {
                slice::from_raw_parts(ptr.as_ptr(), *len)
            },
        }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            SurfaceBuffer::Vec(data) => data.as_mut_slice(),
            SurfaceBuffer::Mmap { ptr, len, .. } => unsafe {
                slice::from_raw_parts_mut(ptr.as_ptr(), *len)
            },
        }
    }
}

impl Deref for SurfaceBuffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl DerefMut for SurfaceBuffer {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl fmt::Debug for SurfaceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceBuffer::Vec(data) => write!(f, "Vec({} bytes)", data.len()),
            SurfaceBuffer::Mmap { len, bytes, .. } => {
                write!(f, "Mmap({len} bytes, {bytes} mapped)")
            }
        }
    }
}

impl Drop for SurfaceBuffer {
    fn drop(&mut self) {
        if let SurfaceBuffer::Mmap { ptr, bytes, .. } = self {
            #[cfg(any(target_os = "macos", target_os = "linux"))]
            unsafe {
                libc::munmap(ptr.as_ptr() as *mut libc::c_void, *bytes);
            }
        }
    }
}

const HUGE_PAGE_MIN_BYTES: usize = 2 * 1024 * 1024;

#[cfg(any(target_os = "macos", target_os = "linux"))]
fn align_up(value: usize, alignment: usize) -> Option<usize> {
    if alignment == 0 {
        return None;
    }
    let rem = value % alignment;
    if rem == 0 {
        Some(value)
    } else {
        value.checked_add(alignment - rem)
    }
}

#[cfg(target_os = "linux")]
fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as usize } else { 4096 }
}

#[cfg(target_os = "macos")]
const VM_FLAGS_SUPERPAGE_SIZE_2MB: libc::c_int = 0x00020000;

#[cfg(target_os = "macos")]
fn try_huge_pages(len: usize) -> Option<SurfaceBuffer> {
    if len < HUGE_PAGE_MIN_BYTES {
        return None;
    }
    let alloc_bytes = align_up(len, HUGE_PAGE_MIN_BYTES)?;
    let map_ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            alloc_bytes,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANON,
            VM_FLAGS_SUPERPAGE_SIZE_2MB,
            0,
        )
    };
    mapped_buffer(map_ptr, len, alloc_bytes)
}

#[cfg(target_os = "linux")]
fn try_huge_pages(len: usize) -> Option<SurfaceBuffer> {
    if len < HUGE_PAGE_MIN_BYTES {
        return None;
    }
    let alloc_bytes = align_up(len, page_size())?;
    let map_ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            alloc_bytes,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if map_ptr != libc::MAP_FAILED {
        unsafe {
            libc::madvise(map_ptr, alloc_bytes, libc::MADV_HUGEPAGE);
        }
    }
    mapped_buffer(map_ptr, len, alloc_bytes)
}

#[cfg(any(target_os = "macos", target_os = "linux"))]
fn mapped_buffer(map_ptr: *mut libc::c_void, len: usize, bytes: usize) -> Option<SurfaceBuffer> {
    if map_ptr == libc::MAP_FAILED {
        return None;
    }
    match NonNull::new(map_ptr as *mut u8) {
        Some(ptr) => Some(SurfaceBuffer::Mmap { ptr, len, bytes }),
        None => {
            unsafe {
                libc::munmap(map_ptr, bytes);
            }
            None
        }
    }
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn try_huge_pages(_len: usize) -> Option<SurfaceBuffer> {
    None
}

/// A rectangular grid of packed pixels with an explicit row pitch.
///
/// A surface owns its bytes exclusively. Transforms borrow the source
/// immutably for the whole call and return a freshly allocated surface whose
/// [`PixelFormat`] equals the source's; only width, height and pitch differ.
pub struct Surface {
    width: usize,
    height: usize,
    pitch: usize,
    format: PixelFormat,
    allocation: SurfaceAllocation,
    pub(crate) data: SurfaceBuffer,
}

impl Surface {
    /// Allocates a surface replicating `format` with the default strategy.
    ///
    /// Pixel contents start zeroed; the transforms overwrite every pixel.
    pub fn allocate(format: &PixelFormat, width: usize, height: usize) -> Result<Surface> {
        Self::allocate_with(format, width, height, SurfaceAllocation::default())
    }

    /// Allocates a surface replicating `format` with an explicit strategy.
    ///
    /// Rows are padded to a 4-byte pitch.
    pub fn allocate_with(
        format: &PixelFormat,
        width: usize,
        height: usize,
        allocation: SurfaceAllocation,
    ) -> Result<Surface> {
        let depth = format.depth()?;
        if width == 0 || height == 0 {
            return Err(TransformError::InvalidDimensions { width, height });
        }
        let allocation_error = |reason: String| TransformError::Allocation {
            width,
            height,
            reason,
        };
        let pitch = width
            .checked_mul(depth.bytes())
            .and_then(|row| row.checked_next_multiple_of(PITCH_ALIGN))
            .ok_or_else(|| allocation_error("row size overflows usize".to_string()))?;
        let len = pitch
            .checked_mul(height)
            .ok_or_else(|| allocation_error("buffer size overflows usize".to_string()))?;
        let data = SurfaceBuffer::new(len, allocation).map_err(allocation_error)?;
        trace!("allocated {width}x{height} surface, pitch {pitch}, {data:?}");

        Ok(Surface {
            width,
            height,
            pitch,
            format: format.replicate(),
            allocation,
            data,
        })
    }

    /// Allocates a destination for a transform of `src`: same format and
    /// allocation strategy, new size.
    pub(crate) fn allocate_like(src: &Surface, width: usize, height: usize) -> Result<Surface> {
        Self::allocate_with(src.format(), width, height, src.allocation())
    }

    /// Checks that `dst` can receive a transform of `src` producing a
    /// `width` x `height` surface.
    pub(crate) fn check_destination(
        src: &Surface,
        dst: &Surface,
        width: usize,
        height: usize,
    ) -> Result<()> {
        if dst.format != src.format.replicate() {
            return Err(TransformError::DestinationFormat {
                expected_bytes_per_pixel: src.format.bytes_per_pixel,
                bytes_per_pixel: dst.format.bytes_per_pixel,
            });
        }
        if (dst.width, dst.height) != (width, height) {
            return Err(TransformError::DestinationSize {
                expected_width: width,
                expected_height: height,
                width: dst.width,
                height: dst.height,
            });
        }
        Ok(())
    }

    /// Wraps existing pixel bytes.
    ///
    /// `pixels` must hold at least `pitch * height` bytes and `pitch` must
    /// cover a full row. The depth is not validated here; transforms do that.
    pub fn from_raw(
        format: PixelFormat,
        width: usize,
        height: usize,
        pitch: usize,
        pixels: Vec<u8>,
    ) -> Result<Surface> {
        if width == 0 || height == 0 {
            return Err(TransformError::InvalidDimensions { width, height });
        }
        let row_bytes = width.saturating_mul(format.bytes_per_pixel as usize);
        let layout_error = TransformError::InvalidLayout {
            row_bytes,
            pitch,
            height,
            len: pixels.len(),
        };
        if pitch < row_bytes {
            return Err(layout_error);
        }
        match pitch.checked_mul(height) {
            Some(needed) if needed <= pixels.len() => {}
            _ => return Err(layout_error),
        }

        Ok(Surface {
            width,
            height,
            pitch,
            format,
            allocation: SurfaceAllocation::Standard,
            data: SurfaceBuffer::Vec(pixels),
        })
    }

    /// Returns the width in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Returns the height in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns the byte distance between the starts of consecutive rows.
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn format(&self) -> &PixelFormat {
        &self.format
    }

    pub fn bytes_per_pixel(&self) -> usize {
        self.format.bytes_per_pixel as usize
    }

    pub fn color_key(&self) -> Option<u32> {
        self.format.color_key
    }

    pub fn palette(&self) -> Option<&[PaletteColor]> {
        self.format.palette()
    }

    /// Returns the allocation strategy this surface was requested with.
    ///
    /// Surfaces derived by the transforms request the same strategy. A
    /// `HugePages` request may still be served from the heap; see
    /// [`uses_huge_pages`](Self::uses_huge_pages).
    pub fn allocation(&self) -> SurfaceAllocation {
        self.allocation
    }

    /// Returns true if the pixels live in a huge-page mapping.
    pub fn uses_huge_pages(&self) -> bool {
        matches!(self.data, SurfaceBuffer::Mmap { .. })
    }

    /// Returns every byte of the surface, row padding included.
    pub fn pixels(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Returns every byte of the surface mutably, row padding included.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        self.data.as_mut_slice()
    }

    /// Number of bytes that carry pixels in each row.
    pub fn row_bytes(&self) -> usize {
        self.width * self.bytes_per_pixel()
    }

    /// Returns the pixel bytes of row `y`, without padding.
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.pitch;
        let end = start + self.row_bytes();
        &self.data[start..end]
    }

    /// Returns mutable pixel bytes of row `y`, without padding.
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.pitch;
        let end = start + self.row_bytes();
        &mut self.data[start..end]
    }

    /// Returns the bytes of the pixel at (x, y).
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let bpp = self.bytes_per_pixel();
        let start = y * self.pitch + x * bpp;
        &self.data[start..start + bpp]
    }

    /// Returns mutable bytes of the pixel at (x, y).
    pub fn pixel_mut(&mut self, x: usize, y: usize) -> &mut [u8] {
        let bpp = self.bytes_per_pixel();
        let start = y * self.pitch + x * bpp;
        &mut self.data[start..start + bpp]
    }

    /// Reads the pixel at (x, y) as a native pixel value.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds or the depth is unsupported.
    pub fn get_pixel(&self, x: usize, y: usize) -> u32 {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        let depth = self.supported_depth();
        let offset = y * self.pitch + x * depth.bytes();
        with_pixel_width!(depth, P => P::load(&self.data, offset))
    }

    /// Writes a native pixel value at (x, y).
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are out of bounds or the depth is unsupported.
    pub fn set_pixel(&mut self, x: usize, y: usize, value: u32) {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        let depth = self.supported_depth();
        let offset = y * self.pitch + x * depth.bytes();
        with_pixel_width!(depth, P => P::store(&mut self.data, offset, value))
    }

    /// Sets every pixel to `value`.
    ///
    /// # Panics
    ///
    /// Panics if the depth is unsupported.
    pub fn fill(&mut self, value: u32) {
        let depth = self.supported_depth();
        with_pixel_width!(depth, P => fill_rows::<P>(self, value))
    }

    fn supported_depth(&self) -> PixelDepth {
        match self.format.depth() {
            Ok(depth) => depth,
            Err(err) => panic!("{err}"),
        }
    }
}

fn fill_rows<P: PixelWidth>(surface: &mut Surface, value: u32) {
    let pitch = surface.pitch;
    let width = surface.width;
    for y in 0..surface.height {
        let row_start = y * pitch;
        for x in 0..width {
            P::store(&mut surface.data, row_start + x * P::BYTES, value);
        }
    }
}

impl Clone for Surface {
    fn clone(&self) -> Self {
        Self {
            width: self.width,
            height: self.height,
            pitch: self.pitch,
            format: self.format.clone(),
            allocation: self.allocation,
            data: SurfaceBuffer::Vec(self.data.to_vec()),
        }
    }
}

/// Surfaces are equal when their geometry, format and visible pixel bytes
/// match; pitch and row padding are ignored.
impl PartialEq for Surface {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.format == other.format
            && (0..self.height).all(|y| self.row(y) == other.row(y))
    }
}

impl Eq for Surface {}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pitch", &self.pitch)
            .field("format", &self.format)
            .field("allocation", &self.allocation)
            .field("data", &self.data)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_pads_pitch() {
        let surface = Surface::allocate(&PixelFormat::rgb888(), 3, 2).expect("allocate");
        assert_eq!(surface.pitch(), 12);
        assert_eq!(surface.row_bytes(), 9);
        assert_eq!(surface.pixels().len(), 24);

        let surface = Surface::allocate(&PixelFormat::argb8888(), 3, 2).expect("allocate");
        assert_eq!(surface.pitch(), 12);
    }

    #[test]
    fn test_allocate_rejects_bad_depth_before_size() {
        let format = PixelFormat::new(5, ChannelMasks::default());
        assert_eq!(
            Surface::allocate(&format, 0, 0).unwrap_err(),
            TransformError::UnsupportedFormat { bytes_per_pixel: 5 }
        );
    }

    #[test]
    fn test_allocate_overflow_is_allocation_error() {
        let err = Surface::allocate(&PixelFormat::argb8888(), usize::MAX / 2, 2).unwrap_err();
        assert!(matches!(err, TransformError::Allocation { .. }));
    }

    #[test]
    fn test_replicate_drops_palette_for_direct_color() {
        let mut format = PixelFormat::argb8888();
        format.palette = Some(vec![PaletteColor::new(1, 2, 3, 4)]);
        assert_eq!(format.replicate().palette(), None);

        let indexed = PixelFormat::indexed(vec![PaletteColor::new(1, 2, 3, 4)]).with_color_key(0);
        assert_eq!(indexed.replicate(), indexed);
    }

    #[test]
    fn test_huge_page_allocation_is_zeroed() {
        let surface = Surface::allocate_with(
            &PixelFormat::argb8888(),
            1024,
            1024,
            SurfaceAllocation::HugePages,
        )
        .expect("allocate");
        assert_eq!(surface.allocation(), SurfaceAllocation::HugePages);
        assert!(surface.pixels().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_small_huge_page_request_is_served_from_heap() {
        let surface = Surface::allocate_with(
            &PixelFormat::argb8888(),
            16,
            16,
            SurfaceAllocation::HugePages,
        )
        .expect("allocate");
        assert!(surface.pixels().len() < HUGE_PAGE_MIN_BYTES);
        assert_eq!(surface.allocation(), SurfaceAllocation::HugePages);
        assert!(!surface.uses_huge_pages());

        let standard = Surface::allocate_with(
            &PixelFormat::argb8888(),
            1024,
            1024,
            SurfaceAllocation::Standard,
        )
        .expect("allocate");
        assert!(!standard.uses_huge_pages());
        assert!(!standard.clone().uses_huge_pages());
    }

    #[test]
    fn test_check_destination_rejects_mismatches() {
        let src = Surface::allocate(&PixelFormat::argb8888(), 4, 3).expect("src");
        let good = Surface::allocate(src.format(), 4, 3).expect("dst");
        assert_eq!(Surface::check_destination(&src, &good, 4, 3), Ok(()));

        let small = Surface::allocate(src.format(), 2, 2).expect("dst");
        assert_eq!(
            Surface::check_destination(&src, &small, 4, 3),
            Err(TransformError::DestinationSize {
                expected_width: 4,
                expected_height: 3,
                width: 2,
                height: 2,
            })
        );

        let keyed = Surface::allocate(&PixelFormat::argb8888().with_color_key(1), 4, 3)
            .expect("dst");
        assert_eq!(
            Surface::check_destination(&src, &keyed, 4, 3),
            Err(TransformError::DestinationFormat {
                expected_bytes_per_pixel: 4,
                bytes_per_pixel: 4,
            })
        );
    }
}
