use std::f64::consts::PI;
use std::time::Duration;

use super::buffer::DataSink;
use super::format::AudioFormat;
use crate::error::Result;

/// A pure cosine tone rendered as 16-bit mono PCM.
///
/// Starts at phase zero, so the real part of a DFT correlates fully with it.
#[derive(Clone, Copy, Debug)]
pub struct Tone {
    pub frequency_hz: f64,
    pub sample_rate_hz: u32,
    pub duration: Duration,
    /// Peak level as a fraction of full scale (0.0-1.0)
    pub level: f64,
}

impl Tone {
    pub fn new(frequency_hz: f64, sample_rate_hz: u32, duration: Duration) -> Self {
        Self {
            frequency_hz,
            sample_rate_hz,
            duration,
            level: 0.8,
        }
    }

    pub fn format(&self) -> AudioFormat {
        AudioFormat::mono_s16(self.sample_rate_hz)
    }

    pub fn sample_count(&self) -> usize {
        (self.duration.as_secs_f64() * self.sample_rate_hz as f64).round() as usize
    }

    pub fn samples(&self) -> Vec<i16> {
        let amplitude = self.level.clamp(0.0, 1.0) * i16::MAX as f64;
        let step = 2.0 * PI * self.frequency_hz / self.sample_rate_hz as f64;
        (0..self.sample_count())
            .map(|n| (amplitude * (step * n as f64).cos()).round() as i16)
            .collect()
    }

    /// Append the rendered samples to `sink` and return their format.
    pub fn write_to(&self, sink: &DataSink) -> Result<AudioFormat> {
        sink.append_i16(&self.samples())?;
        Ok(self.format())
    }
}
