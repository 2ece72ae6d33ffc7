//! Raster image decoding and page-region compositing.

use image::imageops::FilterType;
use image::{ImageFormat, Rgb, RgbImage};
use lopdf::{Document as LopdfDocument, Object, Stream};

use crate::error::{Error, Result};
use crate::model::BBox;

use super::interpreter::{resolve, stream_data};

/// Upper bound on rendered canvas pixels (about 100 MP).
const MAX_CANVAS_PIXELS: u64 = 100_000_000;

/// Colour space of an image XObject's samples.
#[derive(Debug, Clone, PartialEq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette lookup into a base space; samples above `hival` clamp to it.
    Indexed {
        base: Box<ColorSpace>,
        hival: u8,
        palette: Vec<u8>,
    },
}

impl ColorSpace {
    /// Resolve a `/ColorSpace` entry.
    fn from_object(doc: &LopdfDocument, obj: &Object) -> Result<Self> {
        let obj = resolve(doc, obj);
        if let Ok(name) = obj.as_name() {
            return Self::from_name(name);
        }
        let arr = obj
            .as_array()
            .map_err(|_| Error::ImageExtract("invalid /ColorSpace".to_string()))?;
        let family = arr
            .first()
            .and_then(|o| resolve(doc, o).as_name().ok())
            .ok_or_else(|| Error::ImageExtract("invalid /ColorSpace array".to_string()))?;

        match family {
            b"ICCBased" => {
                let n = arr
                    .get(1)
                    .map(|o| resolve(doc, o))
                    .and_then(|o| o.as_stream().ok())
                    .and_then(|s| s.dict.get(b"N").ok())
                    .and_then(|o| o.as_i64().ok());
                match n {
                    Some(1) => Ok(ColorSpace::Gray),
                    Some(3) => Ok(ColorSpace::Rgb),
                    Some(4) => Ok(ColorSpace::Cmyk),
                    other => Err(Error::ImageExtract(format!(
                        "unsupported ICC component count {:?}",
                        other
                    ))),
                }
            }
            b"Indexed" | b"I" => {
                let base = arr
                    .get(1)
                    .ok_or_else(|| Error::ImageExtract("indexed space without base".to_string()))
                    .and_then(|o| Self::from_object(doc, o))?;
                if matches!(base, ColorSpace::Indexed { .. }) {
                    return Err(Error::ImageExtract("nested indexed space".to_string()));
                }
                let hival = arr
                    .get(2)
                    .and_then(|o| resolve(doc, o).as_i64().ok())
                    .filter(|v| (0..=255).contains(v))
                    .ok_or_else(|| Error::ImageExtract("invalid indexed hival".to_string()))?
                    as u8;
                let palette = match arr.get(3).map(|o| resolve(doc, o)) {
                    Some(Object::String(bytes, _)) => bytes.clone(),
                    Some(Object::Stream(stream)) => stream_data(stream)?,
                    _ => return Err(Error::ImageExtract("missing indexed lookup".to_string())),
                };
                Ok(ColorSpace::Indexed {
                    base: Box::new(base),
                    hival,
                    palette,
                })
            }
            b"CalGray" => Ok(ColorSpace::Gray),
            b"CalRGB" => Ok(ColorSpace::Rgb),
            other => Self::from_name(other),
        }
    }

    fn from_name(name: &[u8]) -> Result<Self> {
        match name {
            b"DeviceGray" | b"G" | b"CalGray" => Ok(ColorSpace::Gray),
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Ok(ColorSpace::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(ColorSpace::Cmyk),
            other => Err(Error::ImageExtract(format!(
                "unsupported colour space {}",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    /// Samples per pixel.
    fn components(&self) -> usize {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }

    /// Convert one pixel's samples to RGB.
    fn to_rgb(&self, samples: &[u8]) -> [u8; 3] {
        match self {
            ColorSpace::Gray => [samples[0]; 3],
            ColorSpace::Rgb => [samples[0], samples[1], samples[2]],
            ColorSpace::Cmyk => cmyk_to_rgb(samples[0], samples[1], samples[2], samples[3]),
            ColorSpace::Indexed {
                base,
                hival,
                palette,
            } => {
                let n = base.components();
                let start = usize::from(samples[0].min(*hival)) * n;
                match palette.get(start..start + n) {
                    Some(entry) => base.to_rgb(entry),
                    None => [0, 0, 0],
                }
            }
        }
    }
}

/// Decode an image XObject into RGB pixels.
///
/// Supports DCT (JPEG) streams and 8-bit Gray, RGB, CMYK, ICC-based and
/// Indexed samples behind any filter lopdf can undo.
pub(crate) fn decode_image_xobject(doc: &LopdfDocument, stream: &Stream) -> Result<RgbImage> {
    let dict = &stream.dict;
    let dim = |key: &[u8]| -> Result<u32> {
        dict.get(key)
            .ok()
            .and_then(|o| o.as_i64().ok())
            .filter(|v| *v > 0 && *v <= i64::from(u32::MAX))
            .map(|v| v as u32)
            .ok_or_else(|| {
                Error::ImageExtract(format!("missing /{}", String::from_utf8_lossy(key)))
            })
    };
    let width = dim(b"Width")?;
    let height = dim(b"Height")?;

    let filters: Vec<&[u8]> = match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.as_slice()],
        Ok(Object::Array(arr)) => arr.iter().filter_map(|o| o.as_name().ok()).collect(),
        _ => Vec::new(),
    };

    match filters.as_slice() {
        [b"DCTDecode"] => {
            let img = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                .map_err(|e| Error::ImageExtract(e.to_string()))?;
            return Ok(img.to_rgb8());
        }
        f if f
            .iter()
            .any(|n| matches!(*n, b"DCTDecode" | b"JPXDecode" | b"JBIG2Decode" | b"CCITTFaxDecode")) =>
        {
            let names: Vec<String> = f.iter().map(|n| String::from_utf8_lossy(n).into_owned()).collect();
            return Err(Error::ImageExtract(format!(
                "unsupported image filter chain {:?}",
                names
            )));
        }
        _ => {}
    }

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);
    if bits != 8 {
        return Err(Error::ImageExtract(format!(
            "{} bits per component not supported",
            bits
        )));
    }

    let space = dict
        .get(b"ColorSpace")
        .map_err(|_| Error::ImageExtract("missing /ColorSpace".to_string()))
        .and_then(|o| ColorSpace::from_object(doc, o))?;

    let data = stream_data(stream)?;
    let components = space.components();
    let needed = (width as usize)
        .checked_mul(height as usize)
        .and_then(|p| p.checked_mul(components))
        .ok_or_else(|| Error::ImageExtract("image too large".to_string()))?;
    if data.len() < needed {
        return Err(Error::ImageExtract("truncated image data".to_string()));
    }

    let rgb: Vec<u8> = data[..needed]
        .chunks_exact(components)
        .flat_map(|samples| space.to_rgb(samples))
        .collect();
    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| Error::ImageExtract("image buffer size mismatch".to_string()))
}

fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let k = 255 - u16::from(k);
    let channel = |v: u8| ((255 - u16::from(v)) * k / 255) as u8;
    [channel(c), channel(m), channel(y)]
}

/// A white canvas covering `region` at `scale` pixels per page unit.
pub(crate) struct Canvas {
    region: BBox,
    scale: f32,
    pub image: RgbImage,
}

impl Canvas {
    pub(crate) fn new(region: BBox, dpi: u32) -> Result<Self> {
        if region.is_degenerate() {
            return Err(Error::ImageExtract("empty render region".to_string()));
        }
        let scale = dpi as f32 / 72.0;
        let width = (region.width() * scale).ceil().max(1.0) as u32;
        let height = (region.height() * scale).ceil().max(1.0) as u32;
        if u64::from(width) * u64::from(height) > MAX_CANVAS_PIXELS {
            return Err(Error::ImageExtract(format!(
                "render region too large: {}x{} px",
                width, height
            )));
        }
        Ok(Self {
            region,
            scale,
            image: RgbImage::from_pixel(width, height, Rgb([255, 255, 255])),
        })
    }

    /// Scale `source` into `placement` and draw it over the canvas.
    pub(crate) fn draw(&mut self, source: &RgbImage, placement: BBox) {
        let width = (placement.width() * self.scale).round().max(1.0) as u32;
        let height = (placement.height() * self.scale).round().max(1.0) as u32;
        if u64::from(width) * u64::from(height) > MAX_CANVAS_PIXELS {
            log::warn!("Skipping oversized placement {}x{} px", width, height);
            return;
        }
        let resized = image::imageops::resize(source, width, height, FilterType::Triangle);
        let x = ((placement.x0 - self.region.x0) * self.scale).round() as i64;
        let y = ((placement.top - self.region.top) * self.scale).round() as i64;
        image::imageops::overlay(&mut self.image, &resized, x, y);
    }

    /// Fill `placement` with a flat color.
    pub(crate) fn fill(&mut self, placement: BBox, color: Rgb<u8>) {
        let block = RgbImage::from_pixel(1, 1, color);
        self.draw(&block, placement);
    }
}
