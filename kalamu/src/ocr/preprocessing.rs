use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, GrayImage, ImageEncoder, ImageReader, Luma, Rgb, RgbImage};
use imageproc::filter::gaussian_blur_f32;
use tracing::debug;

use crate::config::PreprocessConfig;
use crate::error::{KalamuError, Result};

/// Non-local-means filter strength.
const DENOISE_STRENGTH: f32 = 10.0;
const DENOISE_TEMPLATE_WINDOW: u32 = 7;
const DENOISE_SEARCH_WINDOW: u32 = 21;
/// Output rows denoised per pass.
const DENOISE_BAND_ROWS: i64 = 64;

/// Adaptive threshold neighbourhood. Tuned for scanned letters; keep in sync
/// with `THRESHOLD_SIGMA`.
const THRESHOLD_BLOCK_SIZE: u32 = 31;
/// Gaussian sigma whose kernel spans `THRESHOLD_BLOCK_SIZE` pixels.
const THRESHOLD_SIGMA: f32 = 0.3 * ((THRESHOLD_BLOCK_SIZE as f32 - 1.0) * 0.5 - 1.0) + 0.8;
const THRESHOLD_OFFSET: i16 = 8;

/// A decoded upload, always 3-channel RGB.
#[derive(Debug, Clone)]
pub struct DocumentImage {
    pixels: RgbImage,
}

impl DocumentImage {
    pub fn from_rgb(pixels: RgbImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbImage {
        &self.pixels
    }

    /// Overwrite pixel memory before the buffer is released.
    pub(crate) fn wipe(&mut self) {
        self.pixels.fill(0);
    }
}

/// Output of [`enhance`]: single-channel whenever grayscale or binarize ran.
#[derive(Debug, Clone)]
pub enum PreparedImage {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl PreparedImage {
    pub fn channels(&self) -> u8 {
        match self {
            PreparedImage::Gray(_) => 1,
            PreparedImage::Rgb(_) => 3,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            PreparedImage::Gray(img) => img.dimensions(),
            PreparedImage::Rgb(img) => img.dimensions(),
        }
    }

    /// PNG encoding handed to the OCR engine.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let (width, height) = self.dimensions();
        let (raw, color) = match self {
            PreparedImage::Gray(img) => (img.as_raw().as_slice(), ExtendedColorType::L8),
            PreparedImage::Rgb(img) => (img.as_raw().as_slice(), ExtendedColorType::Rgb8),
        };

        let mut output = Vec::new();
        PngEncoder::new(&mut output)
            .write_image(raw, width, height, color)
            .map_err(|e| KalamuError::Processing(format!("Failed to encode image: {e}")))?;
        Ok(output)
    }

    pub(crate) fn wipe(&mut self) {
        match self {
            PreparedImage::Gray(img) => img.fill(0),
            PreparedImage::Rgb(img) => img.fill(0),
        }
    }
}

/// Decode raw upload bytes (PNG, JPEG, ...) into an RGB buffer.
pub fn decode_image(bytes: &[u8]) -> Result<DocumentImage> {
    let reader = ImageReader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| KalamuError::Decode(format!("Failed to read image: {e}")))?;

    let img = reader
        .decode()
        .map_err(|e| KalamuError::Decode(format!("Failed to decode image: {e}")))?;

    Ok(DocumentImage::from_rgb(img.to_rgb8()))
}

/// Clean up a document photo for OCR.
///
/// Steps run in a fixed order when enabled:
/// 1. Grayscale (BT.601 luma)
/// 2. Non-local-means denoising
/// 3. Gaussian adaptive threshold
///
/// Binarization needs a single channel, so it converts to grayscale first
/// even when `to_grayscale` is off.
pub fn enhance(image: &DocumentImage, config: &PreprocessConfig) -> PreparedImage {
    debug!(
        width = image.width(),
        height = image.height(),
        grayscale = config.to_grayscale,
        denoise = config.denoise,
        binarize = config.binarize,
        "Preprocessing document image"
    );

    if !config.to_grayscale && !config.binarize {
        let rgb = if config.denoise {
            denoise_rgb(image.pixels())
        } else {
            image.pixels().clone()
        };
        return PreparedImage::Rgb(rgb);
    }

    let mut gray = to_luma(image.pixels());

    if config.denoise {
        gray = non_local_means(
            &gray,
            DENOISE_STRENGTH,
            DENOISE_TEMPLATE_WINDOW,
            DENOISE_SEARCH_WINDOW,
        );
    }

    if config.binarize {
        gray = adaptive_threshold(&gray);
    }

    PreparedImage::Gray(gray)
}

fn to_luma(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let Rgb([r, g, b]) = *rgb.get_pixel(x, y);
        let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

fn denoise_rgb(rgb: &RgbImage) -> RgbImage {
    let channels: Vec<GrayImage> = (0..3)
        .map(|c| {
            let plane = GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                Luma([rgb.get_pixel(x, y)[c]])
            });
            non_local_means(
                &plane,
                DENOISE_STRENGTH,
                DENOISE_TEMPLATE_WINDOW,
                DENOISE_SEARCH_WINDOW,
            )
        })
        .collect();

    RgbImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        Rgb([
            channels[0].get_pixel(x, y)[0],
            channels[1].get_pixel(x, y)[0],
            channels[2].get_pixel(x, y)[0],
        ])
    })
}

/// Non-local-means denoising.
///
/// Every pixel becomes a weighted mean of the pixels in its search window,
/// weighted by how similar their surrounding templates are. Template
/// distances are computed per search offset with an integral image so the
/// cost does not grow with the template size. Output rows are produced in
/// bands of `DENOISE_BAND_ROWS`, so working memory depends on the image
/// width and not on the page size.
fn non_local_means(gray: &GrayImage, strength: f32, template: u32, search: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return gray.clone();
    }

    let w = width as i64;
    let h = height as i64;
    let tr = (template / 2) as i64;
    let sr = (search / 2) as i64;
    let span = (2 * tr + 1) as usize;
    let area = (span * span) as f32;
    let h2 = strength * strength;

    let pad = tr + sr;
    let padded_w = w + 2 * pad;
    let pixel = |x: i64, y: i64| -> f32 {
        gray.get_pixel(x.clamp(0, w - 1) as u32, y.clamp(0, h - 1) as u32)[0] as f32
    };

    let pw = (w + 2 * tr) as usize;
    let stride = pw + 1;
    let mut output = GrayImage::new(width, height);

    let mut band_start = 0;
    while band_start < h {
        let band_h = DENOISE_BAND_ROWS.min(h - band_start);

        // Edge-replicated rows covering every template and search lookup of the band.
        let source: Vec<f32> = (0..band_h + 2 * pad)
            .flat_map(|row| (0..padded_w).map(move |col| pixel(col - pad, band_start + row - pad)))
            .collect();
        let at = |x: i64, y: i64| -> f32 { source[((y + pad) * padded_w + x + pad) as usize] };

        // Squared differences reach 255² per pixel, so the running sums stay f64.
        let ph = (band_h + 2 * tr) as usize;
        let mut integral = vec![0f64; stride * (ph + 1)];

        let count = (band_h * w) as usize;
        let mut weight_sum = vec![0f32; count];
        let mut value_sum = vec![0f32; count];

        for dy in -sr..=sr {
            for dx in -sr..=sr {
                for py in 0..ph {
                    let y = py as i64 - tr;
                    let mut row = 0f64;
                    for px in 0..pw {
                        let x = px as i64 - tr;
                        let diff = f64::from(at(x, y) - at(x + dx, y + dy));
                        row += diff * diff;
                        integral[(py + 1) * stride + px + 1] = integral[py * stride + px + 1] + row;
                    }
                }

                for y in 0..band_h as usize {
                    for x in 0..w as usize {
                        let sum = integral[(y + span) * stride + x + span]
                            - integral[y * stride + x + span]
                            - integral[(y + span) * stride + x]
                            + integral[y * stride + x];
                        let weight = (-(sum as f32 / area) / h2).exp();
                        let idx = y * w as usize + x;
                        weight_sum[idx] += weight;
                        value_sum[idx] += weight * at(x as i64 + dx, y as i64 + dy);
                    }
                }
            }
        }

        for y in 0..band_h {
            for x in 0..w {
                let idx = (y * w + x) as usize;
                let value = value_sum[idx] / weight_sum[idx];
                output.put_pixel(
                    x as u32,
                    (band_start + y) as u32,
                    Luma([value.round().clamp(0.0, 255.0) as u8]),
                );
            }
        }

        band_start += band_h;
    }

    output
}

/// Gaussian-weighted local mean threshold: ink is whatever is darker than its
/// neighbourhood by more than `THRESHOLD_OFFSET`.
fn adaptive_threshold(gray: &GrayImage) -> GrayImage {
    let local_mean = gaussian_blur_f32(gray, THRESHOLD_SIGMA);

    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let value = gray.get_pixel(x, y)[0] as i16;
        let mean = local_mean.get_pixel(x, y)[0] as i16;
        if value > mean - THRESHOLD_OFFSET {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}
