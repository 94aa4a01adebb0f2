//! Interpolation kernels over a square channel-last grid.
//!
//! The source is a flat `[y][x][c]` buffer of side `in_size` and depth
//! `channels`; the output has side `out_size`. Index math mirrors PyTorch's
//! `F.interpolate` for each mode (`align_corners=False`, no antialiasing):
//!
//! - `nearest`: `src = floor(dst * scale)`
//! - `nearest-exact`: `src = floor((dst + 0.5) * scale)`
//! - `bilinear`/`bicubic`: half-pixel transform `src = (dst + 0.5) * scale - 0.5`
//! - `area`: adaptive average over `[floor(i*in/out), ceil((i+1)*in/out))`

use super::DownsampleMode;

pub(crate) fn resample(
    src: &[f32],
    in_size: usize,
    channels: usize,
    out_size: usize,
    mode: DownsampleMode,
) -> Vec<f32> {
    debug_assert_eq!(src.len(), in_size * in_size * channels);
    match mode {
        DownsampleMode::Nearest => nearest(src, in_size, channels, out_size, false),
        DownsampleMode::NearestExact => nearest(src, in_size, channels, out_size, true),
        DownsampleMode::Bilinear => bilinear(src, in_size, channels, out_size),
        DownsampleMode::Bicubic => bicubic(src, in_size, channels, out_size),
        DownsampleMode::Area => area(src, in_size, channels, out_size),
    }
}

#[inline]
fn pixel(src: &[f32], in_size: usize, channels: usize, y: usize, x: usize) -> &[f32] {
    let base = (y * in_size + x) * channels;
    &src[base..base + channels]
}

fn nearest(src: &[f32], in_size: usize, channels: usize, out_size: usize, exact: bool) -> Vec<f32> {
    let scale = in_size as f64 / out_size as f64;
    let index = |o: usize| -> usize {
        let pos = if exact {
            (o as f64 + 0.5) * scale
        } else {
            o as f64 * scale
        };
        (pos.floor() as usize).min(in_size - 1)
    };

    let mut out = Vec::with_capacity(out_size * out_size * channels);
    for oy in 0..out_size {
        let sy = index(oy);
        for ox in 0..out_size {
            let sx = index(ox);
            out.extend_from_slice(pixel(src, in_size, channels, sy, sx));
        }
    }
    out
}

fn bilinear(src: &[f32], in_size: usize, channels: usize, out_size: usize) -> Vec<f32> {
    let scale = in_size as f64 / out_size as f64;
    let clamp = |i: i64| -> usize { i.clamp(0, in_size as i64 - 1) as usize };

    let mut out = vec![0f32; out_size * out_size * channels];
    for oy in 0..out_size {
        let fy = (oy as f64 + 0.5) * scale - 0.5;
        let y0 = fy.floor();
        let wy = fy - y0;
        let (y0, y1) = (clamp(y0 as i64), clamp(y0 as i64 + 1));
        for ox in 0..out_size {
            let fx = (ox as f64 + 0.5) * scale - 0.5;
            let x0 = fx.floor();
            let wx = fx - x0;
            let (x0, x1) = (clamp(x0 as i64), clamp(x0 as i64 + 1));

            let w00 = ((1.0 - wy) * (1.0 - wx)) as f32;
            let w01 = ((1.0 - wy) * wx) as f32;
            let w10 = (wy * (1.0 - wx)) as f32;
            let w11 = (wy * wx) as f32;

            let p00 = pixel(src, in_size, channels, y0, x0);
            let p01 = pixel(src, in_size, channels, y0, x1);
            let p10 = pixel(src, in_size, channels, y1, x0);
            let p11 = pixel(src, in_size, channels, y1, x1);

            let base = (oy * out_size + ox) * channels;
            for c in 0..channels {
                out[base + c] = w00 * p00[c] + w01 * p01[c] + w10 * p10[c] + w11 * p11[c];
            }
        }
    }
    out
}

/// Cubic convolution weight with `a = -0.75` (the PyTorch/OpenCV constant).
fn cubic_weight(x: f64) -> f64 {
    const A: f64 = -0.75;
    let x = x.abs();
    if x <= 1.0 {
        ((A + 2.0) * x - (A + 3.0)) * x * x + 1.0
    } else if x < 2.0 {
        ((A * x - 5.0 * A) * x + 8.0 * A) * x - 4.0 * A
    } else {
        0.0
    }
}

fn bicubic(src: &[f32], in_size: usize, channels: usize, out_size: usize) -> Vec<f32> {
    let scale = in_size as f64 / out_size as f64;
    let clamp = |i: i64| -> usize { i.clamp(0, in_size as i64 - 1) as usize };

    let mut out = vec![0f32; out_size * out_size * channels];
    let mut acc = vec![0f64; channels];
    for oy in 0..out_size {
        let fy = (oy as f64 + 0.5) * scale - 0.5;
        let y0 = fy.floor();
        let ty = fy - y0;
        for ox in 0..out_size {
            let fx = (ox as f64 + 0.5) * scale - 0.5;
            let x0 = fx.floor();
            let tx = fx - x0;

            acc.iter_mut().for_each(|v| *v = 0.0);
            for ky in 0..4 {
                let wy = cubic_weight(ty + 1.0 - ky as f64);
                let sy = clamp(y0 as i64 - 1 + ky);
                for kx in 0..4 {
                    let w = wy * cubic_weight(tx + 1.0 - kx as f64);
                    let sx = clamp(x0 as i64 - 1 + kx);
                    let p = pixel(src, in_size, channels, sy, sx);
                    for c in 0..channels {
                        acc[c] += w * p[c] as f64;
                    }
                }
            }

            let base = (oy * out_size + ox) * channels;
            for c in 0..channels {
                out[base + c] = acc[c] as f32;
            }
        }
    }
    out
}

fn area(src: &[f32], in_size: usize, channels: usize, out_size: usize) -> Vec<f32> {
    // Adaptive pooling windows; for divisible sizes this is the exact mean
    // over factor x factor blocks.
    let start = |o: usize| o * in_size / out_size;
    let end = |o: usize| ((o + 1) * in_size).div_ceil(out_size);

    let mut out = vec![0f32; out_size * out_size * channels];
    let mut acc = vec![0f64; channels];
    for oy in 0..out_size {
        let (y0, y1) = (start(oy), end(oy));
        for ox in 0..out_size {
            let (x0, x1) = (start(ox), end(ox));
            let count = ((y1 - y0) * (x1 - x0)) as f64;

            acc.iter_mut().for_each(|v| *v = 0.0);
            for sy in y0..y1 {
                for sx in x0..x1 {
                    let p = pixel(src, in_size, channels, sy, sx);
                    for c in 0..channels {
                        acc[c] += p[c] as f64;
                    }
                }
            }

            let base = (oy * out_size + ox) * channels;
            for c in 0..channels {
                out[base + c] = (acc[c] / count) as f32;
            }
        }
    }
    out
}
