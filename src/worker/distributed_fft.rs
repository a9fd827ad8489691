use std::f64::consts::PI;
use std::sync::{Arc, OnceLock};

use rustfft::num_complex::Complex;

use super::fft::{band_index_range, band_points};
use super::shard::{PhaseGate, ShardAssignment, SharedPeak};
use super::SpectrumWorker;
use crate::audio::format::AudioFormat;
use crate::error::{Result, TransformError};
use crate::transform::primitives::{cooley_tukey, reverse_bits};
use crate::transform::{Band, CancelToken, SpectrumPoint};

/// Per-run state shared by the shards of a distributed FFT.
///
/// The padded input of length `n` is split into `W` decimated subsequences
/// `x[r + W*m]`. Laid out in bit-reversed order these are the contiguous
/// blocks `[s*n/W, (s+1)*n/W)` with `r = reverse_bits(s, log2 W)`, so each
/// shard owns one contiguous block of sample indices.
#[derive(Debug)]
pub struct FftExchange {
    shards: usize,
    shard_bits: u32,
    padded_len: usize,
    /// Sub-spectra indexed by residue `r`
    blocks: Vec<OnceLock<Vec<Complex<f64>>>>,
    gate: PhaseGate,
}

impl FftExchange {
    pub fn new(sample_count: usize, shards: usize) -> Result<Self> {
        if shards == 0 || !shards.is_power_of_two() {
            return Err(TransformError::InvalidConfig(format!(
                "distributed FFT needs a power-of-two shard count, got {shards}"
            )));
        }
        let padded_len = sample_count.max(shards).next_power_of_two();
        Ok(Self {
            shards,
            shard_bits: shards.trailing_zeros(),
            padded_len,
            blocks: (0..shards).map(|_| OnceLock::new()).collect(),
            gate: PhaseGate::new(shards),
        })
    }

    pub fn padded_len(&self) -> usize {
        self.padded_len
    }

    pub fn block_len(&self) -> usize {
        self.padded_len / self.shards
    }

    /// Release shards waiting at the phase gate without a full quorum.
    pub fn abandon(&self) {
        self.gate.abandon();
    }
}

/// One shard of a two-phase radix-2 FFT.
///
/// Phase one transforms the shard's block of samples. After every shard has
/// arrived at the exchange gate, phase two recombines all sub-spectra for a
/// contiguous slice of in-band output indices.
#[derive(Debug)]
pub struct DistributedFft {
    pub format: AudioFormat,
    pub band: Band,
    pub shard: usize,
    exchange: Arc<FftExchange>,
    peak: SharedPeak,
}

impl DistributedFft {
    pub fn new(
        format: AudioFormat,
        band: Band,
        shard: usize,
        exchange: Arc<FftExchange>,
        peak: SharedPeak,
    ) -> Self {
        Self {
            format,
            band,
            shard,
            exchange,
            peak,
        }
    }

    fn transform_block(&self, samples: &[f64], cancel: &CancelToken) -> Result<()> {
        let ex = &self.exchange;
        let block_len = ex.block_len();
        let residue = reverse_bits(self.shard, ex.shard_bits);

        log::debug!(
            "FFT shard {}: bit-reversed samples [{}, {}) = x[{} + {}*m]",
            self.shard,
            self.shard * block_len,
            (self.shard + 1) * block_len,
            residue,
            ex.shards
        );

        let mut real: Vec<f64> = (0..block_len)
            .map(|m| samples.get(residue + ex.shards * m).copied().unwrap_or(0.0))
            .collect();
        let mut imag = vec![0.0; block_len];
        cooley_tukey(&mut real, &mut imag, cancel)?;

        let block = real
            .into_iter()
            .zip(imag)
            .map(|(re, im)| Complex::new(re, im))
            .collect();
        ex.blocks[residue]
            .set(block)
            .map_err(|_| TransformError::ShardFailed {
                shard: self.shard,
                reason: format!("sub-spectrum {residue} computed twice"),
            })
    }

    fn combine(&self, cancel: &CancelToken) -> Result<Vec<SpectrumPoint>> {
        let ex = &self.exchange;
        let n = ex.padded_len;
        let block_len = ex.block_len();

        let mut blocks = Vec::with_capacity(ex.shards);
        for (residue, slot) in ex.blocks.iter().enumerate() {
            match slot.get() {
                Some(block) => blocks.push(block.as_slice()),
                None => {
                    cancel.check()?;
                    return Err(TransformError::ShardFailed {
                        shard: self.shard,
                        reason: format!("sub-spectrum {residue} missing"),
                    });
                }
            }
        }

        let rate = self.format.sample_rate_hz;
        let indices = band_index_range(self.band, rate, n);
        let assignment = ShardAssignment::split(self.shard, ex.shards, indices);

        let (points, max) = band_points(assignment.range(), n, rate, self.band, |i| {
            let mut sum = Complex::new(0.0, 0.0);
            for (residue, block) in blocks.iter().enumerate() {
                cancel.check()?;
                let turn = (residue * i) % n;
                let twiddle = Complex::from_polar(1.0, -2.0 * PI * turn as f64 / n as f64);
                sum += twiddle * block[i % block_len];
            }
            Ok(sum.norm())
        })?;

        self.peak.update(max);
        Ok(points)
    }
}

impl SpectrumWorker for DistributedFft {
    fn compute(&self, samples: &[f64], cancel: &CancelToken) -> Result<Vec<SpectrumPoint>> {
        // Every shard must reach the gate, even on failure, or its siblings are released early.
        let ticket = self.exchange.gate.ticket();

        let phase_one = if samples.is_empty() {
            Err(TransformError::EmptyInput)
        } else {
            self.transform_block(samples, cancel)
        };

        let released = ticket.arrive();
        phase_one?;
        if !released {
            return Err(TransformError::ShardFailed {
                shard: self.shard,
                reason: "exchange abandoned by a sibling shard".into(),
            });
        }
        cancel.check()?;

        self.combine(cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::spectrum::normalize;
    use crate::worker::fft::Fft;
    use std::thread;

    fn run_shards(samples: Vec<f64>, format: AudioFormat, band: Band, shards: usize) -> Vec<SpectrumPoint> {
        let samples: Arc<[f64]> = samples.into();
        let exchange = Arc::new(FftExchange::new(samples.len(), shards).unwrap());
        let peak = SharedPeak::new();

        let handles: Vec<_> = (0..shards)
            .map(|shard| {
                let worker = DistributedFft::new(format, band, shard, exchange.clone(), peak.clone());
                let samples = samples.clone();
                thread::spawn(move || worker.compute(&samples, &CancelToken::new()))
            })
            .collect();

        let mut combined = Vec::new();
        for h in handles {
            combined.extend(h.join().unwrap().unwrap());
        }
        normalize(&mut combined, peak.get());
        combined
    }

    #[test]
    fn matches_single_worker_fft() {
        let samples: Vec<f64> = (0..3000)
            .map(|n| {
                let t = n as f64 / 8000.0;
                1000.0 * (2.0 * PI * 440.0 * t).cos() + 300.0 * (2.0 * PI * 910.0 * t).sin()
            })
            .collect();
        let format = AudioFormat::mono_s16(8000);
        let band = Band::new(100, 1000);

        let single = Fft::new(format, band)
            .compute(&samples, &CancelToken::new())
            .unwrap();
        let combined = run_shards(samples, format, band, 8);

        assert_eq!(combined.len(), single.len());
        for (a, b) in combined.iter().zip(&single) {
            assert_eq!(a.frequency_hz, b.frequency_hz);
            assert!((a.amplitude - b.amplitude).abs() < 1e-9);
        }
    }

    #[test]
    fn rejects_non_power_of_two_shards() {
        assert!(FftExchange::new(100, 6).is_err());
        assert!(FftExchange::new(100, 0).is_err());
        let exchange = FftExchange::new(100, 8).unwrap();
        assert_eq!(exchange.padded_len(), 128);
        assert_eq!(exchange.block_len(), 16);
    }

    #[test]
    fn short_input_pads_to_shard_count() {
        let exchange = FftExchange::new(3, 8).unwrap();
        assert_eq!(exchange.padded_len(), 8);
        assert_eq!(exchange.block_len(), 1);
    }

    #[test]
    fn empty_input_releases_every_shard() {
        let exchange = Arc::new(FftExchange::new(0, 4).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|shard| {
                let worker = DistributedFft::new(
                    AudioFormat::mono_s16(8000),
                    Band::new(100, 1000),
                    shard,
                    exchange.clone(),
                    SharedPeak::new(),
                );
                thread::spawn(move || worker.compute(&[], &CancelToken::new()))
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), Err(TransformError::EmptyInput));
        }
    }
}
