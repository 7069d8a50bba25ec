//! # Codec Module
//!
//! The pixel-level capability boundary of the pipeline.
//!
//! The scheduling core treats decode/resample/encode as a black box behind
//! the [`Codec`] trait; [`BuiltinCodec`] is the default implementation
//! (image crate + rawloader + fast_image_resize + kamadak-exif). Tests
//! substitute stub codecs to inject failures, slowness and memory pressure.

mod builtin;

pub use builtin::BuiltinCodec;

use crate::core::discover::SourceFormat;
use crate::error::CodecError;
use std::path::Path;
use std::sync::Arc;

/// Decoded image pixels, interleaved RGB8
#[derive(Debug, Clone)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RasterImage {
    /// Construct from an RGB8 buffer. Length must be `width * height * 3`.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 3);
        Self {
            width,
            height,
            pixels,
        }
    }
}

/// Resize target for a conversion run
#[derive(Debug, Clone, Copy)]
pub struct ResizeTarget {
    /// Longest allowed output side in pixels
    pub max_side: u32,
    /// JPEG quality, 1-100
    pub quality: u8,
}

/// Pixel-level capability consumed by workers.
///
/// Implementations must be shareable across worker threads.
pub trait Codec: Send + Sync {
    /// Whether this codec can decode the given source at all.
    ///
    /// Probing is cheap (extension/signature level); a `true` answer does
    /// not guarantee decode success on a corrupt file.
    fn probe(&self, path: &Path, format: SourceFormat) -> bool;

    /// Decode a source file into RGB8 pixels
    fn decode(&self, path: &Path, format: SourceFormat) -> Result<RasterImage, CodecError>;

    /// Resample to fit within the target's max side.
    ///
    /// Returns the input unchanged when it already fits.
    fn resample(&self, image: RasterImage, target: ResizeTarget) -> Result<RasterImage, CodecError>;

    /// Encode to the output format's bytes
    fn encode(&self, image: &RasterImage, target: ResizeTarget) -> Result<Vec<u8>, CodecError>;
}

/// Shared handle to a codec
pub type CodecHandle = Arc<dyn Codec>;

/// EXIF orientation values 1-8; anything else is treated as 1 (upright).
///
/// Read failures degrade to upright rather than failing the job.
pub fn read_orientation(path: &Path) -> u16 {
    let file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(_) => return 1,
    };
    let mut reader = std::io::BufReader::new(&file);
    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(r) => r,
        Err(_) => return 1,
    };

    match exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY) {
        Some(field) => match field.value {
            exif::Value::Short(ref v) => v.first().copied().unwrap_or(1),
            _ => 1,
        },
        None => 1,
    }
}

/// Apply an EXIF orientation to decoded pixels.
///
/// Values follow the EXIF spec: 1 upright, 2 mirrored, 3 rotated 180,
/// 4 flipped, 5-8 the transposed variants. Unknown values are a no-op.
pub fn apply_orientation(image: RasterImage, orientation: u16) -> RasterImage {
    match orientation {
        2 => flip_horizontal(image),
        3 => rotate_180(image),
        4 => flip_vertical(image),
        5 => flip_horizontal(rotate_90(image)),
        6 => rotate_90(image),
        7 => flip_horizontal(rotate_270(image)),
        8 => rotate_270(image),
        _ => image,
    }
}

fn flip_horizontal(image: RasterImage) -> RasterImage {
    let (w, h) = (image.width as usize, image.height as usize);
    let mut out = vec![0u8; image.pixels.len()];
    for y in 0..h {
        for x in 0..w {
            let src = (y * w + x) * 3;
            let dst = (y * w + (w - 1 - x)) * 3;
            out[dst..dst + 3].copy_from_slice(&image.pixels[src..src + 3]);
        }
    }
    RasterImage::new(image.width, image.height, out)
}

fn flip_vertical(image: RasterImage) -> RasterImage {
    let (w, h) = (image.width as usize, image.height as usize);
    let mut out = vec![0u8; image.pixels.len()];
    for y in 0..h {
        let src = y * w * 3;
        let dst = (h - 1 - y) * w * 3;
        out[dst..dst + w * 3].copy_from_slice(&image.pixels[src..src + w * 3]);
    }
    RasterImage::new(image.width, image.height, out)
}

fn rotate_180(image: RasterImage) -> RasterImage {
    flip_vertical(flip_horizontal(image))
}

/// 90 degrees clockwise; width and height swap
fn rotate_90(image: RasterImage) -> RasterImage {
    let (w, h) = (image.width as usize, image.height as usize);
    let mut out = vec![0u8; image.pixels.len()];
    for y in 0..h {
        for x in 0..w {
            let src = (y * w + x) * 3;
            let dst = (x * h + (h - 1 - y)) * 3;
            out[dst..dst + 3].copy_from_slice(&image.pixels[src..src + 3]);
        }
    }
    RasterImage::new(image.height, image.width, out)
}

/// 270 degrees clockwise; width and height swap
fn rotate_270(image: RasterImage) -> RasterImage {
    let (w, h) = (image.width as usize, image.height as usize);
    let mut out = vec![0u8; image.pixels.len()];
    for y in 0..h {
        for x in 0..w {
            let src = (y * w + x) * 3;
            let dst = ((w - 1 - x) * h + y) * 3;
            out[dst..dst + 3].copy_from_slice(&image.pixels[src..src + 3]);
        }
    }
    RasterImage::new(image.height, image.width, out)
}

/// Compute the scaled dimensions that fit `max_side`, or None when the
/// image already fits.
///
/// Scaled dimensions are rounded up to even values; odd dimensions trip
/// chroma-subsampling artifacts in some JPEG encoders.
pub fn fit_within(width: u32, height: u32, max_side: u32) -> Option<(u32, u32)> {
    let longest = width.max(height);
    if longest <= max_side || max_side == 0 {
        return None;
    }

    let ratio = max_side as f64 / longest as f64;
    let new_w = round_even((width as f64 * ratio).round() as u32);
    let new_h = round_even((height as f64 * ratio).round() as u32);
    Some((new_w.max(2), new_h.max(2)))
}

fn round_even(v: u32) -> u32 {
    if v % 2 == 0 {
        v
    } else {
        v + 1
    }
}
