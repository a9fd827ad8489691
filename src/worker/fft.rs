use std::ops::Range;

use super::SpectrumWorker;
use crate::audio::format::AudioFormat;
use crate::error::{Result, TransformError};
use crate::transform::primitives::{cooley_tukey, frequency_bin, is_duplicate_bin};
use crate::transform::spectrum::normalize;
use crate::transform::{Band, CancelToken, SpectrumPoint};

/// Radix-2 FFT over the whole buffer on a single worker, normalized locally.
#[derive(Clone, Copy, Debug)]
pub struct Fft {
    pub format: AudioFormat,
    pub band: Band,
}

impl Fft {
    pub fn new(format: AudioFormat, band: Band) -> Self {
        Self { format, band }
    }
}

impl SpectrumWorker for Fft {
    fn compute(&self, samples: &[f64], cancel: &CancelToken) -> Result<Vec<SpectrumPoint>> {
        if samples.is_empty() {
            return Err(TransformError::EmptyInput);
        }
        log::debug!("FFT: {} samples", samples.len());

        let mut real = samples.to_vec();
        let mut imag = vec![0.0; real.len()];
        cooley_tukey(&mut real, &mut imag, cancel)?;

        let n = real.len();
        let (mut points, max) = band_points(
            0..n,
            n,
            self.format.sample_rate_hz,
            self.band,
            |i| Ok(real[i].hypot(imag[i])),
        )?;
        normalize(&mut points, max);
        Ok(points)
    }
}

/// Output indices of an `n`-point transform whose labels can fall in `band`.
pub(crate) fn band_index_range(band: Band, sample_rate_hz: u32, n: usize) -> Range<usize> {
    let rate = sample_rate_hz.max(1) as u64;
    let lo = (band.min_hz as u64 * n as u64 / rate) as usize;
    let hi = (band.max_hz as u64 * n as u64).div_ceil(rate) as usize + 1;
    lo.saturating_sub(1).min(n)..hi.min(n)
}

/// Walk `indices` in order, keeping the first index of each in-band label.
///
/// Returns the kept points with raw magnitudes and the largest kept magnitude.
pub(crate) fn band_points(
    indices: Range<usize>,
    n: usize,
    sample_rate_hz: u32,
    band: Band,
    mut magnitude: impl FnMut(usize) -> Result<f64>,
) -> Result<(Vec<SpectrumPoint>, f64)> {
    let mut points = Vec::with_capacity(band.span());
    let mut max = 0.0f64;

    for i in indices {
        let hz = frequency_bin(i, sample_rate_hz, n);
        if hz >= band.max_hz {
            break;
        }
        if hz < band.min_hz || is_duplicate_bin(i, sample_rate_hz, n) {
            continue;
        }
        let value = magnitude(i)?;
        max = max.max(value);
        points.push(SpectrumPoint::new(hz as f64, value));
    }

    Ok((points, max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tone::Tone;
    use std::time::Duration;

    fn tone_samples(hz: f64, rate: u32, millis: u64) -> Vec<f64> {
        Tone::new(hz, rate, Duration::from_millis(millis))
            .samples()
            .into_iter()
            .map(f64::from)
            .collect()
    }

    #[test]
    fn one_second_440_hz_tone() {
        let samples = tone_samples(440.0, 8000, 1000);
        let worker = Fft::new(AudioFormat::mono_s16(8000), Band::new(100, 1000));
        let points = worker.compute(&samples, &CancelToken::new()).unwrap();

        let peak = points
            .iter()
            .max_by(|a, b| a.amplitude.total_cmp(&b.amplitude))
            .unwrap();
        assert!((432.0..=448.0).contains(&peak.frequency_hz), "peak at {}", peak.frequency_hz);
        assert_eq!(peak.amplitude, 1.0);

        // 8000 / 8192 Hz per index: every integral label in the band is present once.
        assert_eq!(points.first().unwrap().frequency_hz, 100.0);
        assert_eq!(points.last().unwrap().frequency_hz, 999.0);
        assert_eq!(points.len(), 900);
        for pair in points.windows(2) {
            assert!(pair[0].frequency_hz < pair[1].frequency_hz);
        }
    }

    #[test]
    fn coarse_resolution_skips_labels() {
        // 1000 samples -> 1024 points at 8000 Hz: 7.8 Hz per index.
        let samples = tone_samples(300.0, 8000, 125);
        let worker = Fft::new(AudioFormat::mono_s16(8000), Band::new(100, 1000));
        let points = worker.compute(&samples, &CancelToken::new()).unwrap();

        assert!(points.len() < 200);
        assert!(points.iter().all(|p| (100.0..1000.0).contains(&p.frequency_hz)));
        let peak = points
            .iter()
            .max_by(|a, b| a.amplitude.total_cmp(&b.amplitude))
            .unwrap();
        assert!((peak.frequency_hz - 300.0).abs() <= 8.0);
    }

    #[test]
    fn band_index_range_covers_band_labels() {
        let (rate, n) = (8000, 8192);
        let band = Band::new(100, 1000);
        let range = band_index_range(band, rate, n);
        for i in 0..n {
            if band.contains(frequency_bin(i, rate, n)) {
                assert!(range.contains(&i), "index {i} outside {range:?}");
            }
        }
    }

    #[test]
    fn empty_and_cancelled() {
        let worker = Fft::new(AudioFormat::mono_s16(8000), Band::new(100, 1000));
        assert_eq!(
            worker.compute(&[], &CancelToken::new()),
            Err(TransformError::EmptyInput)
        );

        let token = CancelToken::new();
        token.cancel();
        assert_eq!(
            worker.compute(&[1.0; 64], &token),
            Err(TransformError::Cancelled)
        );
    }
}
