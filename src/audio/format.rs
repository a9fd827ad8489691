use std::fmt;
use std::time::Duration;

use crate::error::{Result, TransformError};

/// PCM layout of the bytes held in a [`SampleBuffer`](super::buffer::SampleBuffer).
///
/// 16- and 32-bit samples are little-endian signed integers; 8-bit samples
/// are unsigned with a midpoint of 128. Interleaved by channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate_hz: u32,
    pub sample_size_bits: u16,
    pub channel_count: u16,
}

impl AudioFormat {
    pub fn new(sample_rate_hz: u32, sample_size_bits: u16, channel_count: u16) -> Self {
        Self {
            sample_rate_hz,
            sample_size_bits,
            channel_count,
        }
    }

    /// 16-bit mono at the given rate.
    pub fn mono_s16(sample_rate_hz: u32) -> Self {
        Self::new(sample_rate_hz, 16, 1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate_hz == 0 {
            return Err(TransformError::UnsupportedFormat(
                "sample rate must be non-zero".into(),
            ));
        }
        if self.channel_count == 0 {
            return Err(TransformError::UnsupportedFormat(
                "channel count must be non-zero".into(),
            ));
        }
        match self.sample_size_bits {
            8 | 16 | 32 => Ok(()),
            bits => Err(TransformError::UnsupportedFormat(format!(
                "{bits}-bit samples"
            ))),
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.sample_size_bits as usize / 8
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.bytes_per_sample() * self.channel_count as usize
    }

    pub fn nyquist_frequency(&self) -> f64 {
        self.sample_rate_hz as f64 / 2.0
    }

    pub fn duration_of_bytes(&self, bytes: usize) -> Duration {
        let bytes_per_second = self.sample_rate_hz as u64 * self.bytes_per_frame() as u64;
        if bytes_per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(bytes as u64 * 1_000_000 / bytes_per_second)
    }

    /// Byte length of `duration` worth of audio, rounded down to a whole frame.
    pub fn bytes_for_duration(&self, duration: Duration) -> usize {
        let frame = self.bytes_per_frame() as u128;
        let bytes = self.sample_rate_hz as u128 * frame * duration.as_micros() / 1_000_000;
        if frame == 0 {
            return 0;
        }
        (bytes - bytes % frame) as usize
    }

    /// Decode raw bytes into mono samples, averaging interleaved channels.
    ///
    /// A trailing partial frame is ignored.
    pub fn decode_mono(&self, bytes: &[u8]) -> Result<Vec<f64>> {
        self.validate()?;
        let width = self.bytes_per_sample();
        let channels = self.channel_count as usize;

        let samples = bytes
            .chunks_exact(self.bytes_per_frame())
            .map(|frame| {
                let sum: f64 = frame
                    .chunks_exact(width)
                    .map(|raw| match width {
                        1 => raw[0] as f64 - 128.0,
                        2 => i16::from_le_bytes([raw[0], raw[1]]) as f64,
                        _ => i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as f64,
                    })
                    .sum();
                sum / channels as f64
            })
            .collect();

        Ok(samples)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let channels = match self.channel_count {
            1 => "mono".to_string(),
            2 => "stereo".to_string(),
            n => format!("{n} channels"),
        };
        let encoding = if self.sample_size_bits == 8 { "unsigned" } else { "signed LE" };
        write!(
            f,
            "{} Hz {} bit {} {}",
            self.sample_rate_hz, self.sample_size_bits, encoding, channels
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_depths() {
        assert!(AudioFormat::new(8000, 24, 1).validate().is_err());
        assert!(AudioFormat::new(0, 16, 1).validate().is_err());
        assert!(AudioFormat::new(8000, 16, 0).validate().is_err());
        assert!(AudioFormat::new(44100, 32, 2).validate().is_ok());
    }

    #[test]
    fn decodes_s16_and_downmixes() {
        let mono = AudioFormat::mono_s16(8000);
        let bytes: Vec<u8> = [1000i16, -2000, 3]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        assert_eq!(mono.decode_mono(&bytes).unwrap(), vec![1000.0, -2000.0, 3.0]);

        let stereo = AudioFormat::new(8000, 16, 2);
        // Two full frames plus a dangling half frame.
        let bytes: Vec<u8> = [100i16, 300, -50, -150, 7]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        assert_eq!(stereo.decode_mono(&bytes).unwrap(), vec![200.0, -100.0]);
    }

    #[test]
    fn decodes_unsigned_8_bit() {
        let format = AudioFormat::new(8000, 8, 1);
        assert_eq!(
            format.decode_mono(&[128, 255, 0]).unwrap(),
            vec![0.0, 127.0, -128.0]
        );
    }

    #[test]
    fn duration_arithmetic() {
        let format = AudioFormat::new(8000, 16, 2);
        assert_eq!(format.bytes_for_duration(Duration::from_secs(1)), 32000);
        assert_eq!(format.duration_of_bytes(16000), Duration::from_millis(500));
        assert_eq!(format.nyquist_frequency(), 4000.0);
    }

    #[test]
    fn display() {
        assert_eq!(
            AudioFormat::mono_s16(8000).to_string(),
            "8000 Hz 16 bit signed LE mono"
        );
        assert_eq!(
            AudioFormat::new(48000, 32, 6).to_string(),
            "48000 Hz 32 bit signed LE 6 channels"
        );
        assert_eq!(
            AudioFormat::new(8000, 8, 2).to_string(),
            "8000 Hz 8 bit unsigned stereo"
        );
    }
}
