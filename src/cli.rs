use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use spectra::TransformMode;

#[derive(Parser, Debug)]
#[command(name = "spectra", about = "Time DFT and FFT spectrum analysis, single-threaded and sharded")]
pub struct Cli {
    /// Input audio file (WAV, MP3, FLAC, OGG). A generated tone is used when omitted.
    pub input: Option<PathBuf>,

    /// Transform to run; every mode when omitted
    #[arg(short, long, value_enum)]
    pub mode: Option<Mode>,

    /// Trials per mode
    #[arg(short = 'n', long)]
    pub trials: Option<usize>,

    /// Strongest points to print per mode
    #[arg(long)]
    pub top: Option<usize>,

    /// Print the last spectrum of each mode as JSON
    #[arg(long)]
    pub json: bool,

    /// Config file (defaults to spectra.toml or the per-user config)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Tone frequency in Hz
    #[arg(long, default_value_t = 440.0)]
    pub tone: f64,

    /// Tone duration in seconds
    #[arg(long, default_value_t = 1.0)]
    pub duration: f64,

    /// Tone sample rate in Hz
    #[arg(long, default_value_t = 8000)]
    pub sample_rate: u32,

    /// Lowest reported frequency in Hz
    #[arg(long)]
    pub min_frequency: Option<u32>,

    /// Reported frequencies stay below this value in Hz
    #[arg(long)]
    pub max_frequency: Option<u32>,

    /// Shards for the distributed DFT
    #[arg(long)]
    pub dft_workers: Option<usize>,

    /// Shards for the distributed FFT (power of two)
    #[arg(long)]
    pub fft_workers: Option<usize>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Direct DFT on one worker
    Dft,
    /// Direct DFT sharded by frequency bin
    DistributedDft,
    /// Radix-2 FFT on one worker
    Fft,
    /// Radix-2 FFT sharded by sample block
    DistributedFft,
}

impl From<Mode> for TransformMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Dft => TransformMode::Dft,
            Mode::DistributedDft => TransformMode::DistributedDft,
            Mode::Fft => TransformMode::Fft,
            Mode::DistributedFft => TransformMode::DistributedFft,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mode_names() {
        let cli = Cli::try_parse_from(["spectra", "--mode", "distributed-fft", "-n", "3"]).unwrap();
        assert_eq!(cli.mode.map(TransformMode::from), Some(TransformMode::DistributedFft));
        assert_eq!(cli.trials, Some(3));

        let cli = Cli::try_parse_from(["spectra"]).unwrap();
        assert!(cli.mode.is_none());
        assert!(Cli::try_parse_from(["spectra", "--mode", "all"]).is_err());
    }
}
