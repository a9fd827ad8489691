use std::ops::Range;

use super::SpectrumWorker;
use crate::audio::format::AudioFormat;
use crate::error::{Result, TransformError};
use crate::transform::primitives::dft_term;
use crate::transform::spectrum::normalize;
use crate::transform::{Band, CancelToken, SpectrumPoint};

/// Direct DFT over the whole band on a single worker, normalized locally.
#[derive(Clone, Copy, Debug)]
pub struct DirectDft {
    pub format: AudioFormat,
    pub band: Band,
}

impl DirectDft {
    pub fn new(format: AudioFormat, band: Band) -> Self {
        Self { format, band }
    }
}

impl SpectrumWorker for DirectDft {
    fn compute(&self, samples: &[f64], cancel: &CancelToken) -> Result<Vec<SpectrumPoint>> {
        if samples.is_empty() {
            return Err(TransformError::EmptyInput);
        }
        log::debug!("Direct DFT: {} samples, {} bins", samples.len(), self.band.span());

        let bins = self.band.min_hz as usize..self.band.max_hz as usize;
        let (mut points, max) = dft_points(samples, bins, self.format.sample_rate_hz, cancel)?;
        normalize(&mut points, max);
        Ok(points)
    }
}

/// Raw DFT magnitudes for every integral bin in `bins`, plus their maximum.
pub(crate) fn dft_points(
    samples: &[f64],
    bins: Range<usize>,
    sample_rate_hz: u32,
    cancel: &CancelToken,
) -> Result<(Vec<SpectrumPoint>, f64)> {
    let mut points = Vec::with_capacity(bins.len());
    let mut max = 0.0f64;

    for k in bins {
        let magnitude = dft_term(samples, k as u32, sample_rate_hz, cancel)?;
        max = max.max(magnitude);
        points.push(SpectrumPoint::new(k as f64, magnitude));
    }

    Ok((points, max))
}
