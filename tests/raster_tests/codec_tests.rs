//! Tests for the raster codec
//!
//! These tests verify:
//! - Empty raster creation, header layout and size limits
//! - Pixel get/set with bounds checks and `as`-style conversions
//! - Serialize/deserialize round trips for every pixel type
//! - Rejection of short, mistagged and mis-sized buffers
//! - Typed `Raster<P>` access, fill and fill_band

use tilevault::raster::{PixelType, Raster, RasterBlock, HEADER_LEN};
use tilevault::VaultError;

// =============================================================================
// Helper Functions
// =============================================================================

/// Raster where each sample holds (x + 10*y + 100*band) converted to its type
fn patterned(width: u32, height: u32, bands: u32, pixel_type: PixelType) -> RasterBlock {
    let mut raster = RasterBlock::create_empty(width, height, bands, pixel_type).unwrap();
    for y in 0..height {
        for x in 0..width {
            for b in 0..bands {
                let value = (x + 10 * y + 100 * b) as i32;
                raster.set_pixel(x, y, b, value).unwrap();
            }
        }
    }
    raster
}

// =============================================================================
// Creation Tests
// =============================================================================

#[test]
fn test_create_empty_layout() {
    for pixel_type in PixelType::ALL {
        let raster = RasterBlock::create_empty(3, 2, 2, pixel_type).unwrap();
        let bytes = raster.as_bytes();

        assert_eq!(raster.pixel_type(), pixel_type);
        assert_eq!(raster.data_len(), HEADER_LEN + 3 * 2 * 2 * pixel_type.bytes_per_pixel());
        assert_eq!(&bytes[0..4], &3u32.to_be_bytes());
        assert_eq!(&bytes[4..8], &2u32.to_be_bytes());
        assert_eq!(&bytes[8..12], &2u32.to_be_bytes());
        assert_eq!(&bytes[12..16], &pixel_type.tag().to_be_bytes());
        assert!(bytes[HEADER_LEN..].iter().all(|&b| b == 0));
    }
}

#[test]
fn test_pixel_type_tags() {
    let expected = [
        (PixelType::Byte, 0, 1),
        (PixelType::UShort, 1, 2),
        (PixelType::Short, 2, 2),
        (PixelType::Int, 3, 4),
        (PixelType::Float, 4, 4),
        (PixelType::Double, 5, 8),
    ];
    for (pixel_type, tag, bytes) in expected {
        assert_eq!(pixel_type.tag(), tag);
        assert_eq!(pixel_type.bytes_per_pixel(), bytes);
        assert_eq!(PixelType::from_tag(tag), Some(pixel_type));
    }
    assert_eq!(PixelType::from_tag(6), None);
}

#[test]
fn test_create_too_large() {
    let err = RasterBlock::create_empty(u32::MAX, u32::MAX, u32::MAX, PixelType::Double).unwrap_err();
    match err {
        VaultError::RasterTooLarge {
            width,
            height,
            bands,
            bytes_per_pixel,
            ..
        } => {
            assert_eq!((width, height, bands), (u32::MAX, u32::MAX, u32::MAX));
            assert_eq!(bytes_per_pixel, 8);
        }
        other => panic!("expected RasterTooLarge, got {:?}", other),
    }
}

#[test]
fn test_create_zero_sized() {
    let mut raster = RasterBlock::create_empty(0, 0, 1, PixelType::Float).unwrap();
    assert_eq!(raster.data_len(), HEADER_LEN);
    raster.fill(1.0f64);
    raster.fill_band(0, 2.0f64).unwrap();

    let decoded = RasterBlock::deserialize(&raster.serialize()).unwrap();
    assert_eq!(decoded, raster);
}

// =============================================================================
// Pixel Access Tests
// =============================================================================

#[test]
fn test_set_get_native_values() {
    let mut raster = RasterBlock::create_empty(2, 2, 1, PixelType::Byte).unwrap();
    raster.set_pixel(1, 1, 0, 200u8).unwrap();
    assert_eq!(raster.get_pixel::<u8>(1, 1, 0).unwrap(), 200);

    let mut raster = RasterBlock::create_empty(2, 2, 1, PixelType::Double).unwrap();
    raster.set_pixel(0, 1, 0, -1234.5678f64).unwrap();
    assert_eq!(raster.get_pixel::<f64>(0, 1, 0).unwrap(), -1234.5678);

    let mut raster = RasterBlock::create_empty(2, 2, 1, PixelType::Short).unwrap();
    raster.set_pixel(1, 0, 0, -300i16).unwrap();
    assert_eq!(raster.get_pixel::<i16>(1, 0, 0).unwrap(), -300);
}

#[test]
fn test_offset_formula_big_endian() {
    let mut raster = RasterBlock::create_empty(2, 2, 3, PixelType::UShort).unwrap();
    raster.set_pixel(1, 1, 2, 0xABCDu16).unwrap();

    // 16 + ((1 * 2 + 1) * 3 + 2) * 2 = 38
    let bytes = raster.as_bytes();
    assert_eq!(&bytes[38..40], &[0xAB, 0xCD]);
    assert_eq!(bytes.iter().filter(|&&b| b != 0).count(), 4 + 2);
}

#[test]
fn test_conversions_follow_as_semantics() {
    // float → int truncates toward zero
    let mut ints = RasterBlock::create_empty(1, 1, 1, PixelType::Int).unwrap();
    ints.set_pixel(0, 0, 0, -2.7f64).unwrap();
    assert_eq!(ints.get_pixel::<i32>(0, 0, 0).unwrap(), -2);

    // int → narrower int keeps the low bits
    let mut bytes = RasterBlock::create_empty(1, 1, 1, PixelType::Byte).unwrap();
    bytes.set_pixel(0, 0, 0, 300i32).unwrap();
    assert_eq!(bytes.get_pixel::<u8>(0, 0, 0).unwrap(), 44);

    // float → int saturates, NaN → 0
    let mut ushorts = RasterBlock::create_empty(1, 2, 1, PixelType::UShort).unwrap();
    ushorts.set_pixel(0, 0, 0, 1e10f64).unwrap();
    ushorts.set_pixel(0, 1, 0, f64::NAN).unwrap();
    assert_eq!(ushorts.get_pixel::<u16>(0, 0, 0).unwrap(), u16::MAX);
    assert_eq!(ushorts.get_pixel::<u16>(0, 1, 0).unwrap(), 0);

    // unsigned → wider signed zero-extends, → same-width signed wraps
    assert_eq!(ushorts.get_pixel::<i32>(0, 0, 0).unwrap(), 65535);
    assert_eq!(ushorts.get_pixel::<i16>(0, 0, 0).unwrap(), -1);

    // float storage read back as int
    let mut floats = RasterBlock::create_empty(1, 1, 1, PixelType::Float).unwrap();
    floats.set_pixel(0, 0, 0, 3.9f64).unwrap();
    assert_eq!(floats.get_pixel::<i32>(0, 0, 0).unwrap(), 3);
    assert_eq!(floats.get_pixel::<f32>(0, 0, 0).unwrap(), 3.9f32);
}

#[test]
fn test_pixel_out_of_range() {
    let mut raster = RasterBlock::create_empty(3, 2, 1, PixelType::Int).unwrap();

    assert!(matches!(
        raster.get_pixel::<i32>(3, 0, 0),
        Err(VaultError::PixelOutOfRange { x: 3, y: 0, band: 0, .. })
    ));
    assert!(matches!(
        raster.get_pixel::<i32>(0, 2, 0),
        Err(VaultError::PixelOutOfRange { y: 2, .. })
    ));
    assert!(matches!(
        raster.set_pixel(0, 0, 1, 5i32),
        Err(VaultError::PixelOutOfRange { band: 1, .. })
    ));
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_round_trip_every_type() {
    for pixel_type in PixelType::ALL {
        let raster = patterned(4, 3, 2, pixel_type);
        let decoded = RasterBlock::deserialize(&raster.serialize()).unwrap();

        assert_eq!(decoded, raster, "round trip failed for {}", pixel_type);
        assert_eq!(decoded.get_pixel::<i32>(3, 2, 1).unwrap(), 3 + 20 + 100);
    }
}

#[test]
fn test_round_trip_single_pixel() {
    let mut raster = RasterBlock::create_empty(1, 1, 1, PixelType::Double).unwrap();
    raster.set_pixel(0, 0, 0, f64::MIN_POSITIVE).unwrap();

    let decoded = RasterBlock::deserialize(&raster.clone().into_bytes()).unwrap();
    assert_eq!(decoded.get_pixel::<f64>(0, 0, 0).unwrap(), f64::MIN_POSITIVE);
    assert_eq!((decoded.width(), decoded.height(), decoded.bands()), (1, 1, 1));
}

#[test]
fn test_deserialize_rejects_bad_buffers() {
    let raster = patterned(2, 2, 1, PixelType::Int);
    let bytes = raster.serialize();

    // Shorter than a header
    assert!(matches!(
        RasterBlock::deserialize(&bytes[..10]),
        Err(VaultError::CorruptRaster(_))
    ));

    // Truncated pixel data
    assert!(matches!(
        RasterBlock::deserialize(&bytes[..bytes.len() - 1]),
        Err(VaultError::CorruptRaster(_))
    ));

    // Unknown type tag
    let mut bad_tag = bytes.to_vec();
    bad_tag[12..16].copy_from_slice(&9u32.to_be_bytes());
    assert!(matches!(
        RasterBlock::deserialize(&bad_tag),
        Err(VaultError::CorruptRaster(_))
    ));

    // Header describing an impossible size
    let mut huge = vec![0u8; HEADER_LEN];
    huge[0..4].copy_from_slice(&u32::MAX.to_be_bytes());
    huge[4..8].copy_from_slice(&u32::MAX.to_be_bytes());
    huge[8..12].copy_from_slice(&u32::MAX.to_be_bytes());
    huge[12..16].copy_from_slice(&PixelType::Double.tag().to_be_bytes());
    assert!(matches!(
        RasterBlock::deserialize(&huge),
        Err(VaultError::RasterTooLarge { .. })
    ));
}

// =============================================================================
// Typed Raster Tests
// =============================================================================

#[test]
fn test_typed_raster_fill_and_samples() {
    let mut raster = Raster::<f32>::new(4, 4, 1).unwrap();
    raster.fill(1.5f32);

    assert_eq!(raster.samples().count(), 16);
    assert!(raster.samples().all(|s| s == 1.5));
    assert_eq!(raster.get_raw(3, 3, 0).unwrap(), 1.5);

    let block: RasterBlock = raster.into();
    assert_eq!(block.pixel_type(), PixelType::Float);
}

#[test]
fn test_typed_raster_rejects_other_tag() {
    let ushorts = RasterBlock::create_empty(2, 2, 1, PixelType::UShort).unwrap();
    assert!(matches!(
        Raster::<u8>::deserialize(ushorts.as_bytes()),
        Err(VaultError::CorruptRaster(_))
    ));
    assert!(Raster::<u16>::deserialize(ushorts.as_bytes()).is_ok());
}

#[test]
fn test_fill_band() {
    let mut raster = RasterBlock::create_empty(2, 2, 3, PixelType::Byte).unwrap();
    raster.fill_band(1, 7u8).unwrap();

    for y in 0..2 {
        for x in 0..2 {
            assert_eq!(raster.get_pixel::<u8>(x, y, 0).unwrap(), 0);
            assert_eq!(raster.get_pixel::<u8>(x, y, 1).unwrap(), 7);
            assert_eq!(raster.get_pixel::<u8>(x, y, 2).unwrap(), 0);
        }
    }

    assert!(matches!(
        raster.fill_band(3, 1u8),
        Err(VaultError::PixelOutOfRange { band: 3, .. })
    ));
}
