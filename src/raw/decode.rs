/// RAW sensor data to RGB
///
/// Uses rawloader to read the sensor data (not the embedded JPEG) and turns
/// it into an 8-bit RGB frame: black/white level scaling, as-shot white
/// balance, a small neighbourhood demosaic and gamma 1/2.2.

use std::path::Path;
use tracing::debug;

use crate::error::{DatasetError, Result};

/// Interleaved 8-bit RGB pixels, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Turns a RAW file into RGB pixels
pub trait RawDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<RgbFrame>;
}

/// `RawDecoder` backed by rawloader
#[derive(Debug, Clone, Copy, Default)]
pub struct RawloaderDecoder;

impl RawDecoder for RawloaderDecoder {
    fn decode(&self, path: &Path) -> Result<RgbFrame> {
        let decode_error = |reason: String| DatasetError::Decode {
            path: path.to_path_buf(),
            reason,
        };

        let raw = rawloader::decode_file(path).map_err(|e| decode_error(format!("{:?}", e)))?;

        let width = raw.width;
        let height = raw.height;
        if width == 0 || height == 0 {
            return Err(decode_error("image has no pixels".to_string()));
        }

        // Normalize every sample to 0.0 - 1.0 using the per-color levels
        let samples: Vec<f32> = match &raw.data {
            rawloader::RawImageData::Integer(values) => {
                let color_of = |index: usize| -> usize {
                    if raw.cpp == 3 {
                        index % 3
                    } else {
                        let pixel = index / raw.cpp.max(1);
                        raw.cfa.color_at(pixel / width, pixel % width)
                    }
                };
                values
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| {
                        let c = color_of(i).min(3);
                        let black = raw.blacklevels[c] as f32;
                        let white = (raw.whitelevels[c] as f32).max(black + 1.0);
                        ((v as f32 - black) / (white - black)).clamp(0.0, 1.0)
                    })
                    .collect()
            }
            rawloader::RawImageData::Float(values) => {
                values.iter().map(|&v| v.clamp(0.0, 1.0)).collect()
            }
        };

        let expected = width * height * raw.cpp;
        if samples.len() < expected {
            return Err(decode_error(format!(
                "expected {} samples, found {}",
                expected,
                samples.len()
            )));
        }

        let wb = white_balance(raw.wb_coeffs);
        debug!(
            "Decoded {}x{} RAW (cpp {}), WB R={:.3} G={:.3} B={:.3}",
            width, height, raw.cpp, wb[0], wb[1], wb[2]
        );

        let linear = if raw.cpp == 3 {
            samples
        } else {
            demosaic(&samples, width, height, |row, col| {
                raw.cfa.color_at(row, col)
            })
        };

        let crop = Crop::from_rawloader(raw.crops, width, height);
        Ok(to_frame(&linear, width, &crop, wb))
    }
}

/// Normalize as-shot white balance so green is 1.0
///
/// Falls back to neutral when the camera did not record usable values.
pub fn white_balance(coeffs: [f32; 4]) -> [f32; 3] {
    let usable = |v: f32| v.is_finite() && v > 0.0;
    if !(usable(coeffs[0]) && usable(coeffs[1]) && usable(coeffs[2])) {
        return [1.0, 1.0, 1.0];
    }

    let g_ref = coeffs[1].max(0.001);
    [coeffs[0] / g_ref, 1.0, coeffs[2] / g_ref]
}

/// Map a CFA color index to an RGB channel
///
/// rawloader uses 0 = red, 1 = green, 2 = blue; a fourth color (second
/// green, emerald) is folded into green.
fn channel_of(color: usize) -> usize {
    match color {
        0 => 0,
        2 => 2,
        _ => 1,
    }
}

/// Fill in the missing colors of a single-channel mosaic
///
/// Each output channel is the mean of the same-colored samples in the 3x3
/// neighbourhood. Output is interleaved RGB, same size as the input.
pub fn demosaic<F>(samples: &[f32], width: usize, height: usize, color_at: F) -> Vec<f32>
where
    F: Fn(usize, usize) -> usize,
{
    let mut rgb = vec![0.0f32; width * height * 3];

    for row in 0..height {
        let rows = row.saturating_sub(1)..=(row + 1).min(height - 1);
        for col in 0..width {
            let cols = col.saturating_sub(1)..=(col + 1).min(width - 1);

            let mut sum = [0.0f32; 3];
            let mut count = [0u32; 3];
            for r in rows.clone() {
                for c in cols.clone() {
                    let channel = channel_of(color_at(r, c));
                    sum[channel] += samples[r * width + c];
                    count[channel] += 1;
                }
            }

            let out = (row * width + col) * 3;
            for channel in 0..3 {
                if count[channel] > 0 {
                    rgb[out + channel] = sum[channel] / count[channel] as f32;
                }
            }
        }
    }

    rgb
}

/// Visible area of the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Crop {
    top: usize,
    left: usize,
    width: usize,
    height: usize,
}

impl Crop {
    /// rawloader crops are [top, right, bottom, left] margins
    fn from_rawloader(crops: [usize; 4], width: usize, height: usize) -> Self {
        let [top, right, bottom, left] = crops;
        if top + bottom >= height || left + right >= width {
            return Crop {
                top: 0,
                left: 0,
                width,
                height,
            };
        }

        Crop {
            top,
            left,
            width: width - left - right,
            height: height - top - bottom,
        }
    }
}

/// Apply white balance, gamma and crop, quantize to 8 bits
fn to_frame(linear: &[f32], full_width: usize, crop: &Crop, wb: [f32; 3]) -> RgbFrame {
    // Gamma lookup over 4096 linear steps
    const STEPS: usize = 4096;
    let lut: Vec<u8> = (0..STEPS)
        .map(|i| {
            let v = i as f32 / (STEPS - 1) as f32;
            (v.powf(1.0 / 2.2) * 255.0).round() as u8
        })
        .collect();

    let mut pixels = Vec::with_capacity(crop.width * crop.height * 3);
    for row in crop.top..crop.top + crop.height {
        for col in crop.left..crop.left + crop.width {
            let base = (row * full_width + col) * 3;
            for channel in 0..3 {
                let v = (linear[base + channel] * wb[channel]).clamp(0.0, 1.0);
                pixels.push(lut[(v * (STEPS - 1) as f32).round() as usize]);
            }
        }
    }

    RgbFrame {
        width: crop.width as u32,
        height: crop.height as u32,
        pixels,
    }
}
