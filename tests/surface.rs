use surface_transform::{
    ChannelMasks, PixelDepth, PixelFormat, Surface, SurfaceAllocation, TransformError,
};

#[test]
fn test_format_depths() {
    let cases = [
        (PixelFormat::indexed(Vec::new()), 8, Some(PixelDepth::One)),
        (PixelFormat::rgb565(), 16, Some(PixelDepth::Two)),
        (PixelFormat::rgb888(), 24, Some(PixelDepth::Three)),
        (PixelFormat::argb8888(), 32, Some(PixelDepth::Four)),
        (PixelFormat::new(6, ChannelMasks::default()), 48, None),
    ];

    for (format, bits, depth) in cases {
        assert_eq!(format.bits_per_pixel(), bits);
        assert_eq!(format.depth().ok(), depth);
    }
    assert!(PixelFormat::argb8888().has_alpha());
    assert!(!PixelFormat::rgb888().has_alpha());
}

#[test]
fn test_allocate_pads_rows_and_zeroes() {
    for (bpp_format, width, pitch) in [
        (PixelFormat::indexed(Vec::new()), 5, 8),
        (PixelFormat::rgb565(), 3, 8),
        (PixelFormat::rgb888(), 3, 12),
        (PixelFormat::rgb888(), 5, 16),
        (PixelFormat::argb8888(), 7, 28),
    ] {
        let surface = Surface::allocate_with(&bpp_format, width, 3, SurfaceAllocation::Standard)
            .expect("allocate");
        assert_eq!(surface.pitch(), pitch);
        assert_eq!(surface.pixels().len(), pitch * 3);
        assert!(surface.pixels().iter().all(|&b| b == 0));
        assert_eq!(surface.allocation(), SurfaceAllocation::Standard);
    }
}

#[test]
fn test_allocate_rejects_bad_requests() {
    assert_eq!(
        Surface::allocate(&PixelFormat::rgb888(), 0, 3).err(),
        Some(TransformError::InvalidDimensions {
            width: 0,
            height: 3
        })
    );
    assert_eq!(
        Surface::allocate(&PixelFormat::new(0, ChannelMasks::default()), 4, 4).err(),
        Some(TransformError::UnsupportedFormat { bytes_per_pixel: 0 })
    );
    assert!(matches!(
        Surface::allocate(&PixelFormat::argb8888(), usize::MAX / 2, 2),
        Err(TransformError::Allocation { .. })
    ));
}

#[test]
fn test_from_raw_validates_layout() {
    let format = PixelFormat::rgb565();
    assert!(matches!(
        Surface::from_raw(format.clone(), 4, 2, 6, vec![0; 16]),
        Err(TransformError::InvalidLayout { row_bytes: 8, .. })
    ));
    assert!(matches!(
        Surface::from_raw(format.clone(), 4, 2, 8, vec![0; 15]),
        Err(TransformError::InvalidLayout { len: 15, .. })
    ));
    assert!(matches!(
        Surface::from_raw(format.clone(), 4, 0, 8, Vec::new()),
        Err(TransformError::InvalidDimensions { .. })
    ));

    let surface = Surface::from_raw(format, 4, 2, 8, vec![0; 16]).expect("raw surface");
    assert_eq!(surface.row_bytes(), 8);
    assert_eq!(surface.allocation(), SurfaceAllocation::Standard);
}

#[test]
fn test_pixel_access_follows_pitch() {
    let mut surface = Surface::from_raw(PixelFormat::rgb565(), 2, 2, 6, vec![0; 12])
        .expect("raw surface");
    surface.set_pixel(1, 1, 0xABCD);

    assert_eq!(surface.get_pixel(1, 1), 0xABCD);
    assert_eq!(surface.pixel(1, 1), 0xABCD_u16.to_ne_bytes().as_slice());
    assert_eq!(&surface.pixels()[8..10], 0xABCD_u16.to_ne_bytes().as_slice());
    assert_eq!(surface.row(1).len(), 4);
}

#[test]
fn test_equality_ignores_row_padding() {
    let mut padded = vec![0xAA; 16];
    let mut tight = vec![0; 12];
    for y in 0..2 {
        for i in 0..6 {
            let value = (y * 6 + i) as u8;
            padded[y * 8 + i] = value;
            tight[y * 6 + i] = value;
        }
    }
    let a = Surface::from_raw(PixelFormat::rgb888(), 2, 2, 8, padded).expect("padded");
    let b = Surface::from_raw(PixelFormat::rgb888(), 2, 2, 6, tight).expect("tight");
    assert_eq!(a, b);

    let mut c = b.clone();
    c.pixel_mut(0, 0)[0] ^= 1;
    assert_ne!(c, b);
    assert_eq!(b.pixel(0, 0)[0], 0);
}

#[test]
fn test_fill_writes_every_pixel() {
    let mut surface = Surface::allocate(&PixelFormat::rgb888(), 3, 2).expect("allocate");
    surface.fill(0x12_3456);
    for y in 0..2 {
        for x in 0..3 {
            assert_eq!(surface.get_pixel(x, y), 0x12_3456);
        }
    }
    // Padding bytes stay untouched.
    assert_eq!(surface.pitch(), 12);
    assert!(surface.pixels()[9..12].iter().all(|&b| b == 0));
}
