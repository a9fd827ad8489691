use super::dft::dft_points;
use super::shard::{ShardAssignment, SharedPeak};
use super::SpectrumWorker;
use crate::audio::format::AudioFormat;
use crate::error::{Result, TransformError};
use crate::transform::{Band, CancelToken, SpectrumPoint};

/// One shard of a direct DFT. Owns a contiguous slice of the band's bins and
/// sums over every sample for each of them.
#[derive(Clone, Debug)]
pub struct DistributedDft {
    pub format: AudioFormat,
    pub assignment: ShardAssignment,
    peak: SharedPeak,
}

impl DistributedDft {
    pub fn new(format: AudioFormat, band: Band, shard: usize, shards: usize, peak: SharedPeak) -> Self {
        let bins = band.min_hz as usize..band.max_hz as usize;
        Self {
            format,
            assignment: ShardAssignment::split(shard, shards, bins),
            peak,
        }
    }
}

impl SpectrumWorker for DistributedDft {
    fn compute(&self, samples: &[f64], cancel: &CancelToken) -> Result<Vec<SpectrumPoint>> {
        if samples.is_empty() {
            return Err(TransformError::EmptyInput);
        }
        log::debug!(
            "DFT shard {}: bins [{}, {}) over {} samples",
            self.assignment.shard,
            self.assignment.start,
            self.assignment.end,
            samples.len()
        );

        let (points, max) = dft_points(
            samples,
            self.assignment.range(),
            self.format.sample_rate_hz,
            cancel,
        )?;
        self.peak.update(max);
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::dft::DirectDft;

    #[test]
    fn shards_reassemble_direct_dft() {
        let samples: Vec<f64> = (0..600).map(|n| ((n * 7919) % 201) as f64 - 100.0).collect();
        let format = AudioFormat::mono_s16(4000);
        let band = Band::new(100, 400);
        let token = CancelToken::new();

        let peak = SharedPeak::new();
        let mut combined = Vec::new();
        for shard in 0..7 {
            let worker = DistributedDft::new(format, band, shard, 7, peak.clone());
            combined.extend(worker.compute(&samples, &token).unwrap());
        }
        crate::transform::spectrum::normalize(&mut combined, peak.get());

        let single = DirectDft::new(format, band).compute(&samples, &token).unwrap();
        assert_eq!(combined.len(), single.len());
        for (a, b) in combined.iter().zip(&single) {
            assert_eq!(a.frequency_hz, b.frequency_hz);
            assert!((a.amplitude - b.amplitude).abs() <= 1e-12);
        }
    }
}
