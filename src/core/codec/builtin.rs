//! Default codec backed by the image crate, rawloader and fast_image_resize.
//!
//! Standard raster formats decode through the image crate; camera RAW files
//! decode through rawloader with a half-resolution demosaic, which is plenty
//! for downscaled output and a fraction of the memory of a full demosaic.

use super::{fit_within, Codec, RasterImage, ResizeTarget};
use crate::core::discover::SourceFormat;
use crate::error::CodecError;
use fast_image_resize::{images::Image, PixelType, ResizeOptions, Resizer};
use image::ImageEncoder;
use std::path::Path;
use std::sync::Mutex;

/// Production codec used when no custom capability is injected
pub struct BuiltinCodec {
    // Resizer holds SIMD scratch buffers; reuse across jobs
    resizer: Mutex<Resizer>,
}

impl BuiltinCodec {
    pub fn new() -> Self {
        Self {
            resizer: Mutex::new(Resizer::new()),
        }
    }

    fn decode_standard(&self, path: &Path) -> Result<RasterImage, CodecError> {
        let decoded = image::open(path).map_err(|e| match e {
            image::ImageError::Unsupported(_) => CodecError::Unsupported {
                path: path.to_path_buf(),
            },
            other => CodecError::Decode {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        })?;

        // Flatten alpha onto a white background; photographic output is
        // always opaque JPEG.
        let rgb = match decoded {
            image::DynamicImage::ImageRgb8(buf) => buf,
            other => {
                let rgba = other.to_rgba8();
                let (w, h) = (rgba.width(), rgba.height());
                let mut flat = image::RgbImage::from_pixel(w, h, image::Rgb([255, 255, 255]));
                for (x, y, px) in rgba.enumerate_pixels() {
                    let a = px[3] as u32;
                    let bg = flat.get_pixel_mut(x, y);
                    for c in 0..3 {
                        bg[c] = ((px[c] as u32 * a + bg[c] as u32 * (255 - a)) / 255) as u8;
                    }
                }
                flat
            }
        };

        let (width, height) = (rgb.width(), rgb.height());
        Ok(RasterImage::new(width, height, rgb.into_raw()))
    }

    fn decode_raw(&self, path: &Path) -> Result<RasterImage, CodecError> {
        let raw = rawloader::decode_file(path).map_err(|e| CodecError::Decode {
            path: path.to_path_buf(),
            reason: format!("{:?}", e),
        })?;

        // Normalize white balance against green
        let g_ref = raw.wb_coeffs[1].max(0.001);
        let wb = [raw.wb_coeffs[0] / g_ref, 1.0, raw.wb_coeffs[2] / g_ref];
        let black = raw.blacklevels[0] as f32;
        let white = (raw.whitelevels[0] as f32 - black).max(1.0);

        let data: Vec<u16> = match raw.data {
            rawloader::RawImageData::Integer(values) => values,
            rawloader::RawImageData::Float(values) => values
                .iter()
                .map(|&v| (v * 65535.0).clamp(0.0, 65535.0) as u16)
                .collect(),
        };

        if raw.cpp == 3 {
            return rgb16_to_raster(path, &data, raw.width, raw.height);
        }

        half_demosaic(path, &data, raw.width, raw.height, &raw.cfa, wb, black, white)
    }
}

impl Default for BuiltinCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for BuiltinCodec {
    fn probe(&self, path: &Path, format: SourceFormat) -> bool {
        match format {
            SourceFormat::Raw => true,
            SourceFormat::Jpeg => true,
            SourceFormat::Other => {
                // HEIC and friends carry a raster extension we cannot decode
                matches!(
                    image::ImageFormat::from_path(path),
                    Ok(image::ImageFormat::Jpeg
                        | image::ImageFormat::Png
                        | image::ImageFormat::Gif
                        | image::ImageFormat::Bmp
                        | image::ImageFormat::Tiff
                        | image::ImageFormat::WebP)
                )
            }
        }
    }

    fn decode(&self, path: &Path, format: SourceFormat) -> Result<RasterImage, CodecError> {
        if !self.probe(path, format) {
            return Err(CodecError::Unsupported {
                path: path.to_path_buf(),
            });
        }
        match format {
            SourceFormat::Raw => self.decode_raw(path),
            SourceFormat::Jpeg | SourceFormat::Other => self.decode_standard(path),
        }
    }

    fn resample(
        &self,
        image: RasterImage,
        target: ResizeTarget,
    ) -> Result<RasterImage, CodecError> {
        let (dst_w, dst_h) = match fit_within(image.width, image.height, target.max_side) {
            Some(dims) => dims,
            None => return Ok(image),
        };

        let src = Image::from_vec_u8(image.width, image.height, image.pixels, PixelType::U8x3)
            .map_err(|e| CodecError::Decode {
                path: Default::default(),
                reason: format!("resample source: {}", e),
            })?;
        let mut dst = Image::new(dst_w, dst_h, PixelType::U8x3);

        let options = ResizeOptions::new().resize_alg(fast_image_resize::ResizeAlg::Convolution(
            fast_image_resize::FilterType::Lanczos3,
        ));

        self.resizer
            .lock()
            .expect("resizer lock poisoned")
            .resize(&src, &mut dst, &options)
            .map_err(|e| CodecError::Decode {
                path: Default::default(),
                reason: format!("resample: {}", e),
            })?;

        Ok(RasterImage::new(dst_w, dst_h, dst.into_vec()))
    }

    fn encode(&self, image: &RasterImage, target: ResizeTarget) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, target.quality);
        encoder
            .write_image(
                &image.pixels,
                image.width,
                image.height,
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| CodecError::Encode {
                path: Default::default(),
                reason: e.to_string(),
            })?;
        Ok(out)
    }
}

fn rgb16_to_raster(
    path: &Path,
    data: &[u16],
    width: usize,
    height: usize,
) -> Result<RasterImage, CodecError> {
    let mut pixels = Vec::new();
    pixels
        .try_reserve_exact(width * height * 3)
        .map_err(|_| CodecError::OutOfMemory {
            path: path.to_path_buf(),
        })?;
    for chunk in data.chunks_exact(3).take(width * height) {
        for &c in chunk {
            pixels.push((c >> 8) as u8);
        }
    }
    Ok(RasterImage::new(width as u32, height as u32, pixels))
}

/// Half-resolution demosaic: each 2x2 CFA block collapses to one RGB pixel.
///
/// Black/white levels and camera white balance are applied, then a 2.2
/// gamma curve. No sharpening, no noise reduction; the result feeds the
/// resampler anyway.
#[allow(clippy::too_many_arguments)]
fn half_demosaic(
    path: &Path,
    data: &[u16],
    width: usize,
    height: usize,
    cfa: &rawloader::CFA,
    wb: [f32; 3],
    black: f32,
    white: f32,
) -> Result<RasterImage, CodecError> {
    let out_w = width / 2;
    let out_h = height / 2;
    if out_w == 0 || out_h == 0 || data.len() < width * height {
        return Err(CodecError::Decode {
            path: path.to_path_buf(),
            reason: "sensor data truncated".to_string(),
        });
    }

    let mut pixels = Vec::new();
    pixels
        .try_reserve_exact(out_w * out_h * 3)
        .map_err(|_| CodecError::OutOfMemory {
            path: path.to_path_buf(),
        })?;

    for by in 0..out_h {
        for bx in 0..out_w {
            // Accumulate each CFA color present in the 2x2 block
            let mut sums = [0.0f32; 3];
            let mut counts = [0u32; 3];
            for dy in 0..2 {
                for dx in 0..2 {
                    let y = by * 2 + dy;
                    let x = bx * 2 + dx;
                    let color = cfa.color_at(y, x).min(3);
                    // Second green shares the green channel
                    let channel = if color == 3 { 1 } else { color };
                    let value = (data[y * width + x] as f32 - black).max(0.0) / white;
                    sums[channel] += value;
                    counts[channel] += 1;
                }
            }

            for channel in 0..3 {
                let mean = if counts[channel] > 0 {
                    sums[channel] / counts[channel] as f32
                } else {
                    0.0
                };
                let balanced = (mean * wb[channel]).clamp(0.0, 1.0);
                let gamma = balanced.powf(1.0 / 2.2);
                pixels.push((gamma * 255.0).round() as u8);
            }
        }
    }

    Ok(RasterImage::new(out_w as u32, out_h as u32, pixels))
}
