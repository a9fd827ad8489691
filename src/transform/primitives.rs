//! Pure transform building blocks shared by every worker.

use std::f64::consts::PI;

use super::cancel::CancelToken;
use crate::error::{Result, TransformError};

/// Reverse the low `width` bits of `value`.
pub fn reverse_bits(mut value: usize, width: u32) -> usize {
    let mut result = 0;
    for _ in 0..width {
        result = (result << 1) | (value & 1);
        value >>= 1;
    }
    result
}

/// Frequency in Hz of FFT output index `i` for a transform of `len` points.
pub fn index_to_frequency(i: usize, sample_rate_hz: f64, len: usize) -> f64 {
    i as f64 * (sample_rate_hz / len as f64)
}

/// Integral frequency label of output index `i` (truncated toward zero).
pub fn frequency_bin(i: usize, sample_rate_hz: u32, len: usize) -> u32 {
    index_to_frequency(i, sample_rate_hz as f64, len) as u32
}

/// True when index `i` truncates to the same label as index `i - 1`.
///
/// Only the first index carrying a given label is kept.
pub fn is_duplicate_bin(i: usize, sample_rate_hz: u32, len: usize) -> bool {
    i > 0 && frequency_bin(i - 1, sample_rate_hz, len) == frequency_bin(i, sample_rate_hz, len)
}

/// Magnitude of the real part of the direct DFT at bin `k`:
/// `|sum x[n] * cos(2*pi*k*n / sample_rate)|`.
///
/// Cancellation is polled once per sample.
pub fn dft_term(samples: &[f64], k: u32, sample_rate_hz: u32, cancel: &CancelToken) -> Result<f64> {
    let rate = sample_rate_hz as u64;
    let step = 2.0 * PI / sample_rate_hz as f64;
    let mut sum = 0.0;

    for (n, &x) in samples.iter().enumerate() {
        cancel.check()?;
        // k*n is reduced modulo the rate to keep the cosine argument small.
        let phase = (k as u64 * n as u64) % rate;
        sum += x * (step * phase as f64).cos();
    }

    Ok(sum.abs())
}

/// Number of radix-2 levels needed to cover `n` points, i.e. `ceil(log2(n))`.
pub fn level_count(n: usize) -> u32 {
    n.max(1).next_power_of_two().trailing_zeros()
}

/// Zero-pad both vectors to the next power of two. Returns the level count.
pub fn pad_to_power_of_two(real: &mut Vec<f64>, imag: &mut Vec<f64>) -> u32 {
    let n = real.len().max(1).next_power_of_two();
    if n != real.len() {
        log::debug!("Padded FFT input from {} to {} points", real.len(), n);
        real.resize(n, 0.0);
        imag.resize(n, 0.0);
    }
    level_count(n)
}

/// In-place radix-2 decimation-in-time FFT (Cooley–Tukey).
///
/// Pads both vectors to a power of two first. Returns the level count of the
/// padded length. Cancellation is polled during twiddle table construction,
/// the bit-reversal pass and every butterfly.
pub fn cooley_tukey(real: &mut Vec<f64>, imag: &mut Vec<f64>, cancel: &CancelToken) -> Result<u32> {
    if real.len() != imag.len() {
        return Err(TransformError::InvalidInput {
            real: real.len(),
            imag: imag.len(),
        });
    }

    let levels = pad_to_power_of_two(real, imag);
    let n = real.len();

    // Twiddle factors e^{-2*pi*i*k/n}, stored as cos/sin pairs
    cancel.check()?;
    let mut cos_table = Vec::with_capacity(n / 2);
    let mut sin_table = Vec::with_capacity(n / 2);
    for i in 0..n / 2 {
        let angle = 2.0 * PI * i as f64 / n as f64;
        cos_table.push(angle.cos());
        sin_table.push(angle.sin());
    }

    for i in 0..n {
        cancel.check()?;
        let j = reverse_bits(i, levels);
        if j > i {
            real.swap(i, j);
            imag.swap(i, j);
        }
    }

    let mut size = 2;
    while size <= n {
        let half = size / 2;
        let table_step = n / size;
        for start in (0..n).step_by(size) {
            for (j, k) in (start..start + half).zip((0..).step_by(table_step)) {
                cancel.check()?;
                let l = j + half;
                let tpre = real[l] * cos_table[k] + imag[l] * sin_table[k];
                let tpim = -real[l] * sin_table[k] + imag[l] * cos_table[k];
                real[l] = real[j] - tpre;
                imag[l] = imag[j] - tpim;
                real[j] += tpre;
                imag[j] += tpim;
            }
        }
        size *= 2;
    }

    Ok(levels)
}
