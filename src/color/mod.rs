//! Color samples and pixel buffers: the input side of sonification.

pub mod mapper;
pub mod notes;

pub use mapper::{
    brightness_to_frequency, clamp_audible, frequency, map_color, map_color_in_range,
    nearest_note, quantize_in_range, quantize_to_nearest_note, MappingStrategy, ToneMapping,
};
pub use notes::{Note, NOTE_TABLE};

use image::imageops::FilterType;
use image::RgbaImage;
use thiserror::Error;

/// One RGBA pixel read from a buffer, optionally tagged with its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorSample {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
    pub position: Option<(u32, u32)>,
}

impl ColorSample {
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Opaque color with no position.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r,
            g,
            b,
            a: 255,
            position: None,
        }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r,
            g,
            b,
            a,
            position: None,
        }
    }

    /// Tag this sample with its source position.
    pub fn at(mut self, x: u32, y: u32) -> Self {
        self.position = Some((x, y));
        self
    }

    /// Average of the three color channels, 0–255.
    pub fn luma(&self) -> f64 {
        (self.r as f64 + self.g as f64 + self.b as f64) / 3.0
    }

    /// Luma normalized to [0, 1].
    pub fn luma_unit(&self) -> f64 {
        self.luma() / 255.0
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Convert to HSL: hue in degrees [0, 360), saturation and lightness in [0, 1].
    pub fn to_hsl(&self) -> (f64, f64, f64) {
        let r = self.r as f64 / 255.0;
        let g = self.g as f64 / 255.0;
        let b = self.b as f64 / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let lightness = (max + min) / 2.0;

        if max == min {
            return (0.0, 0.0, lightness);
        }

        let delta = max - min;
        let saturation = if lightness > 0.5 {
            delta / (2.0 - max - min)
        } else {
            delta / (max + min)
        };

        let sector = if max == r {
            (g - b) / delta + if g < b { 6.0 } else { 0.0 }
        } else if max == g {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };

        let hue = (sector * 60.0).rem_euclid(360.0);
        (hue, saturation, lightness)
    }
}

/// Errors building a [`PixelBuffer`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PixelBufferError {
    /// RGBA data length does not match `width * height * 4`.
    #[error("pixel data has {actual} bytes, expected {expected} for the given dimensions")]
    DataLength { expected: usize, actual: usize },
}

/// Read-only RGBA snapshot of a drawing surface or image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA bytes (row-major, 4 bytes per pixel).
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PixelBufferError> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(PixelBufferError::DataLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a buffer from a list of colors laid out row by row.
    pub fn from_colors(
        width: u32,
        height: u32,
        colors: &[ColorSample],
    ) -> Result<Self, PixelBufferError> {
        let data = colors.iter().flat_map(|c| [c.r, c.g, c.b, c.a]).collect();
        Self::new(width, height, data)
    }

    /// A buffer where every pixel has the same color.
    pub fn filled(width: u32, height: u32, color: ColorSample) -> Self {
        let count = width as usize * height as usize;
        let data = std::iter::repeat([color.r, color.g, color.b, color.a])
            .take(count)
            .flatten()
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_rgba_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the buffer has no pixels at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pixel at a row-major index, tagged with its position.
    pub fn pixel_at_index(&self, index: usize) -> Option<ColorSample> {
        let o = index.checked_mul(4)?;
        let px = self.data.get(o..o + 4)?;
        let x = (index % self.width as usize) as u32;
        let y = (index / self.width as usize) as u32;
        Some(ColorSample::rgba(px[0], px[1], px[2], px[3]).at(x, y))
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<ColorSample> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixel_at_index(y as usize * self.width as usize + x as usize)
    }

    /// Mean color of the opaque pixels inside `[x0, x1) × [y0, y1)`.
    ///
    /// Returns `None` when the region holds no opaque pixel.
    pub fn average_color(&self, x0: u32, y0: u32, x1: u32, y1: u32) -> Option<ColorSample> {
        let (x1, y1) = (x1.min(self.width), y1.min(self.height));
        let mut sum = [0u64; 4];
        let mut count = 0u64;
        for y in y0..y1 {
            for x in x0..x1 {
                let Some(px) = self.pixel(x, y) else { continue };
                if px.is_transparent() {
                    continue;
                }
                sum[0] += px.r as u64;
                sum[1] += px.g as u64;
                sum[2] += px.b as u64;
                sum[3] += px.a as u64;
                count += 1;
            }
        }
        if count == 0 {
            return None;
        }
        let avg = |s: u64| (s as f64 / count as f64).round() as u8;
        Some(ColorSample::rgba(avg(sum[0]), avg(sum[1]), avg(sum[2]), avg(sum[3])))
    }

    /// Mean color of the whole buffer (opaque pixels only).
    pub fn mean_color(&self) -> Option<ColorSample> {
        self.average_color(0, 0, self.width, self.height)
    }

    /// Scale down to at most `max_width` pixels wide, preserving aspect ratio.
    ///
    /// Buffers already narrow enough are returned unchanged.
    pub fn downsample(&self, max_width: u32) -> Self {
        if self.width <= max_width || max_width == 0 || self.is_empty() {
            return self.clone();
        }
        let Some(image) = RgbaImage::from_raw(self.width, self.height, self.data.clone()) else {
            return self.clone();
        };
        let height = ((self.height as u64 * max_width as u64) / self.width as u64).max(1) as u32;
        let resized = image::imageops::resize(&image, max_width, height, FilterType::Triangle);
        Self::from_rgba_image(resized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn luma_extremes() {
        assert_eq!(ColorSample::BLACK.luma(), 0.0);
        assert_eq!(ColorSample::WHITE.luma(), 255.0);
        assert_approx_eq!(ColorSample::rgb(255, 0, 0).luma_unit(), 1.0 / 3.0);
    }

    #[test]
    fn hsl_primaries() {
        let (h, s, l) = ColorSample::rgb(255, 0, 0).to_hsl();
        assert_approx_eq!(h, 0.0);
        assert_approx_eq!(s, 1.0);
        assert_approx_eq!(l, 0.5);

        let (h, _, _) = ColorSample::rgb(0, 255, 0).to_hsl();
        assert_approx_eq!(h, 120.0);

        let (h, _, _) = ColorSample::rgb(0, 0, 255).to_hsl();
        assert_approx_eq!(h, 240.0);

        let (h, _, _) = ColorSample::rgb(255, 0, 255).to_hsl();
        assert_approx_eq!(h, 300.0);
    }

    #[test]
    fn hsl_gray_has_no_saturation() {
        let (h, s, l) = ColorSample::rgb(128, 128, 128).to_hsl();
        assert_eq!(h, 0.0);
        assert_eq!(s, 0.0);
        assert_approx_eq!(l, 128.0 / 255.0);
    }

    #[test]
    fn buffer_rejects_bad_length() {
        let err = PixelBuffer::new(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(
            err,
            PixelBufferError::DataLength {
                expected: 16,
                actual: 15
            }
        );
    }

    #[test]
    fn pixel_lookup_carries_position() {
        let buf = PixelBuffer::from_colors(
            2,
            2,
            &[
                ColorSample::BLACK,
                ColorSample::WHITE,
                ColorSample::rgb(1, 2, 3),
                ColorSample::rgb(4, 5, 6),
            ],
        )
        .unwrap();
        let px = buf.pixel(0, 1).unwrap();
        assert_eq!((px.r, px.g, px.b), (1, 2, 3));
        assert_eq!(px.position, Some((0, 1)));
        assert!(buf.pixel(2, 0).is_none());
    }

    #[test]
    fn average_skips_transparent() {
        let buf = PixelBuffer::from_colors(
            3,
            1,
            &[
                ColorSample::WHITE,
                ColorSample::rgba(0, 0, 0, 0),
                ColorSample::rgb(100, 100, 100),
            ],
        )
        .unwrap();
        let avg = buf.mean_color().unwrap();
        assert_eq!(avg.r, 178);

        let clear = PixelBuffer::filled(2, 2, ColorSample::rgba(9, 9, 9, 0));
        assert!(clear.mean_color().is_none());
    }

    #[test]
    fn downsample_limits_width() {
        let buf = PixelBuffer::filled(512, 256, ColorSample::rgb(10, 20, 30));
        let small = buf.downsample(128);
        assert_eq!(small.width(), 128);
        assert_eq!(small.height(), 64);
        let px = small.pixel(5, 5).unwrap();
        assert_eq!((px.r, px.g, px.b), (10, 20, 30));
    }

    #[test]
    fn downsample_keeps_narrow_buffers() {
        let buf = PixelBuffer::filled(64, 64, ColorSample::WHITE);
        assert_eq!(buf.downsample(128), buf);
    }
}
