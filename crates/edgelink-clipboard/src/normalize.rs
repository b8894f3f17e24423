//! Image normalisation.
//!
//! Every image that crosses the link is PNG. Outbound clipboard images are
//! decoded from whatever the platform handed us (PNG, JPEG, BMP, or a raw
//! Windows DIB) and re-encoded; inbound images are validated the same way
//! before they reach the backend.

use std::io::Cursor;

use edgelink_types::{ClipboardKind, ClipboardPayload};
use image::{DynamicImage, ImageFormat};
use tracing::{debug, warn};

use crate::error::ClipboardError;

/// The eight-byte PNG file signature.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Shortest byte string worth handing to a decoder.
pub const MIN_IMAGE_LEN: usize = PNG_SIGNATURE.len();

const BMP_FILE_HEADER_LEN: usize = 14;
const BITMAPINFOHEADER_LEN: usize = 40;

// DIB compression values that append colour masks after a 40-byte header.
const BI_BITFIELDS: u32 = 3;
const BI_ALPHABITFIELDS: u32 = 6;

/// Decode image bytes in any supported format.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ClipboardError> {
    if bytes.len() < MIN_IMAGE_LEN {
        return Err(ClipboardError::TooSmall(bytes.len()));
    }
    match image::load_from_memory(bytes) {
        Ok(img) => Ok(img),
        Err(e) => {
            // Windows clipboards hold DIBs: BMP files without the file header.
            let from_dib = dib_to_bmp(bytes).and_then(|bmp| {
                image::load_from_memory_with_format(&bmp, ImageFormat::Bmp)
                    .map_err(|e| ClipboardError::ImageDecode(e.to_string()))
            });
            from_dib.map_err(|_| ClipboardError::ImageDecode(e.to_string()))
        }
    }
}

/// Encode an image as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ClipboardError> {
    let mut png = Vec::new();
    img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| ClipboardError::ImageEncode(e.to_string()))?;
    Ok(png)
}

/// Decode `bytes` and re-encode them as PNG.
pub fn to_png(bytes: &[u8]) -> Result<Vec<u8>, ClipboardError> {
    let img = decode(bytes)?;
    debug!(width = img.width(), height = img.height(), "normalising image to PNG");
    encode_png(&img)
}

/// Normalise a payload before it is sent.
///
/// Images that cannot be converted are forwarded as they are.
#[must_use]
pub fn prepare_outbound(payload: ClipboardPayload) -> ClipboardPayload {
    if payload.kind != ClipboardKind::Image {
        return payload;
    }
    match to_png(&payload.bytes) {
        Ok(png) => ClipboardPayload::image(png),
        Err(e) => {
            warn!(error = %e, size = payload.size(), "image conversion failed; sending raw bytes");
            payload
        }
    }
}

/// Prepend a BMP file header to a DIB.
pub fn dib_to_bmp(dib: &[u8]) -> Result<Vec<u8>, ClipboardError> {
    if dib.len() < BITMAPINFOHEADER_LEN {
        return Err(ClipboardError::ImageDecode("DIB too small".to_string()));
    }
    let header_len = read_u32(dib, 0) as usize;
    if header_len < BITMAPINFOHEADER_LEN || header_len > dib.len() {
        return Err(ClipboardError::ImageDecode(format!(
            "unsupported DIB header size {header_len}"
        )));
    }
    let bit_count = u16::from_le_bytes([dib[14], dib[15]]);
    let compression = read_u32(dib, 16);
    let colors_used = read_u32(dib, 32) as usize;

    let masks = match (header_len, compression) {
        (BITMAPINFOHEADER_LEN, BI_BITFIELDS) => 12,
        (BITMAPINFOHEADER_LEN, BI_ALPHABITFIELDS) => 16,
        _ => 0,
    };
    let palette_entries = match bit_count {
        1..=8 if colors_used == 0 => 1usize << bit_count,
        _ => colors_used,
    };
    let pixel_offset = BMP_FILE_HEADER_LEN
        .saturating_add(header_len)
        .saturating_add(masks)
        .saturating_add(palette_entries.saturating_mul(4));

    let too_large = || ClipboardError::ImageDecode("DIB too large".to_string());
    let file_size = u32::try_from(BMP_FILE_HEADER_LEN + dib.len()).map_err(|_| too_large())?;
    let pixel_offset = u32::try_from(pixel_offset).map_err(|_| too_large())?;

    let mut bmp = Vec::with_capacity(BMP_FILE_HEADER_LEN + dib.len());
    bmp.extend_from_slice(b"BM");
    bmp.extend_from_slice(&file_size.to_le_bytes());
    bmp.extend_from_slice(&[0; 4]);
    bmp.extend_from_slice(&pixel_offset.to_le_bytes());
    bmp.extend_from_slice(dib);
    Ok(bmp)
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(format: ImageFormat) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            6,
            4,
            image::Rgb([10, 120, 230]),
        ));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), format).unwrap();
        out
    }

    fn assert_png(bytes: &[u8], width: u32, height: u32) {
        assert_eq!(&bytes[..8], &PNG_SIGNATURE);
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Png).unwrap();
        assert_eq!((img.width(), img.height()), (width, height));
    }

    #[test]
    fn png_is_revalidated() {
        assert_png(&to_png(&sample(ImageFormat::Png)).unwrap(), 6, 4);
    }

    #[test]
    fn bmp_becomes_png() {
        assert_png(&to_png(&sample(ImageFormat::Bmp)).unwrap(), 6, 4);
    }

    #[test]
    fn jpeg_becomes_png() {
        assert_png(&to_png(&sample(ImageFormat::Jpeg)).unwrap(), 6, 4);
    }

    #[test]
    fn headerless_dib_becomes_png() {
        let bmp = sample(ImageFormat::Bmp);
        let dib = &bmp[BMP_FILE_HEADER_LEN..];
        assert_png(&to_png(dib).unwrap(), 6, 4);
    }

    #[test]
    fn dib_header_synthesis() {
        let bmp = sample(ImageFormat::Bmp);
        let rebuilt = dib_to_bmp(&bmp[BMP_FILE_HEADER_LEN..]).unwrap();
        assert_eq!(&rebuilt[..2], b"BM");
        assert_eq!(read_u32(&rebuilt, 2) as usize, bmp.len());
        assert_eq!(rebuilt.len(), bmp.len());
    }

    #[test]
    fn short_input_is_too_small() {
        assert!(matches!(
            to_png(&[0x89, b'P', b'N']),
            Err(ClipboardError::TooSmall(3))
        ));
    }

    #[test]
    fn garbage_is_decode_error() {
        let garbage = vec![0x42; 64];
        assert!(matches!(to_png(&garbage), Err(ClipboardError::ImageDecode(_))));
    }

    #[test]
    fn outbound_falls_back_to_raw_bytes() {
        let raw = ClipboardPayload::image(vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(prepare_outbound(raw.clone()), raw);

        let text = ClipboardPayload::text("unchanged");
        assert_eq!(prepare_outbound(text.clone()), text);

        let bmp = ClipboardPayload::image(sample(ImageFormat::Bmp));
        let out = prepare_outbound(bmp);
        assert_eq!(out.kind, ClipboardKind::Image);
        assert_png(&out.bytes, 6, 4);
    }
}
